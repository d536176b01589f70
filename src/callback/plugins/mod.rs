//! Callback plugins controlling how run progress is displayed.
//!
//! - [`DefaultCallback`] - Standard output with colors and a final recap
//! - [`AssertiveCallback`] - Wraps the default output and reports every
//!   assertion, optionally writing a YAML test report

pub mod assertive;
pub mod default;

pub use assertive::AssertiveCallback;
pub use default::{DefaultCallback, DefaultCallbackConfig};
