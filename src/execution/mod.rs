//! Test scheduling and execution

pub mod engine;
pub mod executor;
pub mod round;
pub mod scheduler;

pub use engine::{build_queue, DrainStats, EventHandler, RunContext, RunEvent, TestRunner};
pub use executor::{ExecutionResult, PreparedTest, TestExecutor};
pub use round::RoundTracker;
pub use scheduler::{Decision, SkipFilter};
