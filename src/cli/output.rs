//! CLI output formatting

use crate::{
    branch_guard::UndeterminedCause,
    core::results::{SkipReason, TestsDataKeeper},
    execution::RunEvent,
    persistence::{RunStatus, RunSummary},
    server::PlaybookStatus,
};
use chrono::{DateTime, Local};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar over the queued tests
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    if let Ok(progress_style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        progress.set_style(progress_style.progress_chars("#>-"));
    }
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

fn timestamp(at: &DateTime<Local>) -> String {
    style(at.format("[%H:%M:%S]").to_string()).dim().to_string()
}

/// Start marker of a test
pub fn start_marker(message: &str) -> String {
    format!("------ Test {} start ------", message)
}

/// End marker of a test
pub fn end_marker(message: &str) -> String {
    format!("------ Test {} end ------", message)
}

/// Format a run event for display
///
/// Returns `None` for events that print nothing.
pub fn format_run_event(event: &RunEvent) -> Option<String> {
    let line = match event {
        RunEvent::WorkerStarted {
            server_url, queued, ..
        } => format!(
            "{} Running private tests on {} ({} queued)",
            ROCKET,
            style(server_url).bold(),
            style(queued).cyan()
        ),
        RunEvent::NoTestsConfigured { .. } => "no integrations are configured for test".to_string(),
        RunEvent::TestStarted { message, at } => format!(
            "{} {} (Private Build Test)",
            timestamp(at),
            start_marker(message)
        ),
        RunEvent::TestFinished { message, at } => {
            format!("{} {}\n", timestamp(at), end_marker(message))
        }
        RunEvent::TestPassed {
            message,
            status: PlaybookStatus::NotSupportedVersion,
        } => format!("PASS: {} skipped - not supported version", message),
        RunEvent::TestPassed { message, .. } => {
            style(format!("PASS: {} succeed", message)).green().to_string()
        }
        RunEvent::TestFailed { message, error } => {
            let line = style(format!("Failed: {} failed", message)).red().to_string();
            match error {
                Some(error) => format!("{}\n{}", line, style(error).dim()),
                None => line,
            }
        }
        RunEvent::TestSkipped {
            message,
            reason: SkipReason::VersionMismatch { from, to },
            ..
        } => {
            let now = Local::now();
            format!(
                "\n{} {}\n{}\n{} {}\n",
                timestamp(&now),
                start_marker(message),
                style(format!(
                    "Test {} ignored due to version mismatch (test versions: {}-{})",
                    message, from, to
                ))
                .yellow(),
                timestamp(&now),
                end_marker(message)
            )
        }
        RunEvent::TestSkipped { reason: SkipReason::Filtered, .. } => return None,
        RunEvent::TestSkipped {
            playbook_id, reason, ..
        } => format!(
            "{} Skipping {} - reason: {}",
            WARN,
            style(playbook_id).dim(),
            reason
        ),
        RunEvent::ParamsBindingFailed { error, .. } => style(error).red().to_string(),
        RunEvent::RoundCompleted { cooldown_secs } => format!(
            "all tests in the queue were executed, sleeping for {} seconds to let locked tests get unlocked.",
            cooldown_secs
        ),
        RunEvent::ThreadFailed {
            thread_index,
            error,
        } => style(format!("~~ Thread {} failed ~~\n{}", thread_index + 1, error))
            .red()
            .to_string(),
    };
    Some(line)
}

/// Warning for a base branch that could not be read
pub fn format_undetermined(cause: UndeterminedCause, pr_number: u64) -> String {
    let text = match cause {
        UndeterminedCause::FetchFailed => format!("Unable to fetch PR num {}", pr_number),
        UndeterminedCause::NoBaseBranch => {
            format!("PR num {} has no base branch in the API answer", pr_number)
        }
    };
    style(text).yellow().to_string()
}

/// Render the final summary of all outcome classes
pub fn format_test_summary(keeper: &TestsDataKeeper, is_ami: bool) -> String {
    let results = &keeper.results;
    let mut lines = vec![
        style("TEST RESULTS:").bold().to_string(),
        format!("\t Number of playbooks tested - {}", results.tested_count()),
        style(format!(
            "\t Number of succeeded tests - {}",
            results.succeeded.len()
        ))
        .green()
        .to_string(),
    ];

    if !results.failed.is_empty() {
        lines.push(
            style(format!("\t Number of failed tests - {}:", results.failed.len()))
                .red()
                .to_string(),
        );
        lines.extend(
            results
                .failed
                .iter()
                .map(|id| style(format!("\t - {}", id)).red().to_string()),
        );
    }

    if !results.skipped.is_empty() {
        lines.push(
            style(format!("\t Number of skipped tests - {}:", results.skipped.len()))
                .yellow()
                .to_string(),
        );
        lines.extend(
            results
                .skipped
                .iter()
                .map(|skipped| style(format!("\t - {}", skipped)).yellow().to_string()),
        );
    }

    if !results.skipped_integrations.is_empty() {
        lines.push(
            style(format!(
                "\t Number of skipped integrations - {}:",
                results.skipped_integrations.len()
            ))
            .yellow()
            .to_string(),
        );
        lines.extend(
            results
                .skipped_integrations
                .iter()
                .map(|entry| style(format!("\t - {}", entry)).yellow().to_string()),
        );
    }

    if is_ami && !results.unmockable_integrations.is_empty() {
        lines.push(format!(
            "\t Number of unmockable integrations - {}:",
            results.unmockable_integrations.len()
        ));
        lines.extend(
            results
                .unmockable_integrations
                .iter()
                .map(|(name, reason)| format!("\t - {} - {}", name, reason)),
        );
    }

    lines.join("\n")
}

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Passed => style("PASSED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format a run summary for display
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        RunStatus::Passed => CHECK,
        RunStatus::Failed => CROSS,
    };

    format!(
        "{} {} - {} #{} - {} - {} ({} passed, {} failed, {} skipped)",
        status_icon,
        style(&summary.run_id.to_string()[..8]).dim(),
        style(&summary.build_name).bold(),
        summary.build_number,
        summary.server_version,
        format_status(summary.status),
        style(summary.succeeded).green(),
        style(summary.failed).red(),
        style(summary.skipped).yellow()
    )
}
