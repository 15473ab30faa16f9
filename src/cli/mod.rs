//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{CheckBaseBranchCommand, HistoryCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Playbook test runner for private content builds
#[derive(Debug, Parser, Clone)]
#[command(name = "playbook-runner")]
#[command(version)]
#[command(about = "Runs content playbook tests against server instances", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the playbook tests of a build
    Run(RunCommand),

    /// Fail when an external pull request targets the mainline branch
    CheckBaseBranch(CheckBaseBranchCommand),

    /// Load a conf file and show what a run would do with each test
    Validate(ValidateCommand),

    /// Show previous runs
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
