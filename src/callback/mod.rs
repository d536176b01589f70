//! Callback system for run events.
//!
//! Callbacks implement [`EventSink`](crate::traits::EventSink) and receive
//! group, task and result notifications from the executor.
//!
//! # Available Plugins
//!
//! - [`DefaultCallback`] - Standard line-per-result output with colors
//! - [`AssertiveCallback`] - Assertion-aware output plus an optional YAML report
//!
//! # Example
//!
//! ```rust,ignore
//! use assertive::callback::prelude::*;
//!
//! let callback = AssertiveCallback::from_env();
//! let executor = Executor::new(ExecutorConfig::default(), Arc::new(callback));
//! ```

pub mod plugins;
pub mod report;
pub mod types;

pub use plugins::{AssertiveCallback, DefaultCallback, DefaultCallbackConfig};
pub use report::{AssertionStats, Report, TestStatus};
pub use types::{HostStats, Outcome, RunStats, TaskEvent};

/// Convenient imports for writing and wiring callbacks.
pub mod prelude {
    pub use super::plugins::{AssertiveCallback, DefaultCallback, DefaultCallbackConfig};
    pub use super::report::{AssertionStats, Group, Report, TestEntry, TestStatus};
    pub use super::types::{HostStats, Outcome, RunStats, TaskEvent};
    pub use crate::traits::EventSink;
}
