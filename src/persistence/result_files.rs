//! Result files read by later CI steps

use crate::core::results::ResultAccumulator;
use anyhow::{Context, Result};
use std::path::Path;

pub const FAILED_TESTS_FILE: &str = "failed_tests.txt";
pub const SKIPPED_TESTS_FILE: &str = "skipped_tests.txt";
pub const SKIPPED_INTEGRATIONS_FILE: &str = "skipped_integrations.txt";

/// Write failed ids, skipped tests with their reasons and skipped
/// integrations, one per line
pub fn write_result_files(results_dir: &Path, results: &ResultAccumulator) -> Result<()> {
    std::fs::create_dir_all(results_dir)
        .with_context(|| format!("Failed to create {}", results_dir.display()))?;

    let skipped: Vec<String> = results.skipped.iter().map(ToString::to_string).collect();
    let skipped_integrations: Vec<&str> = results
        .skipped_integrations
        .iter()
        .map(String::as_str)
        .collect();

    write_lines(&results_dir.join(FAILED_TESTS_FILE), &results.failed)?;
    write_lines(&results_dir.join(SKIPPED_TESTS_FILE), &skipped)?;
    write_lines(&results_dir.join(SKIPPED_INTEGRATIONS_FILE), &skipped_integrations)?;
    Ok(())
}

fn write_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> Result<()> {
    let content = lines
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join("\n");
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}
