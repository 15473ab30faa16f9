//! playbook-runner - runs content playbook tests against server instances

pub mod branch_guard;
pub mod cli;
pub mod core;
pub mod execution;
pub mod notify;
pub mod persistence;
pub mod server;

// Re-export commonly used types
pub use core::{ContentConf, ExecutionSettings, ResultAccumulator, TestDescriptor, TestsDataKeeper};
pub use execution::{Decision, RunEvent, SkipFilter, TestRunner};
pub use server::{ClientError, ErrorKind, ServerClient, SubprocessServerClient};
