//! Runtime handle, configuration, errors, and the testing engine.

pub mod config;
pub(crate) mod controlled;
pub mod engine;
pub mod errors;
pub mod options;

pub use config::{Configuration, ConfigurationBuilder, StrategyKind};
pub use controlled::Runtime;
pub use engine::{BugReport, TestReport, TestingEngine};
pub use errors::{BlockedOperation, DeadlockInfo, RuntimeError};
pub use options::{CreateOptions, GroupChoice, SendOptions};
