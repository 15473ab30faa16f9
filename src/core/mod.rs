//! Core domain models
//!
//! Test descriptors, conf files, settings and result bookkeeping shared by
//! the scheduler, the executor and the reporter.

pub mod config;
pub mod descriptor;
pub mod instances;
pub mod params;
pub mod results;
pub mod settings;
pub mod version;

pub use config::{ContentConf, RunnerConfig, SecretConf, TestFilter};
pub use descriptor::{TestDescriptor, TestOptions};
pub use results::{ResultAccumulator, SkipReason, TestsDataKeeper};
pub use settings::ExecutionSettings;
pub use version::LooseVersion;
