//! # Assertive - Assertion Reporting for Playbook Runs
//!
//! Assertive runs YAML playbooks made of condition checks (`assert`),
//! messages (`debug`) and host facts (`set_fact`) and reports every
//! evaluated assertion, both on the terminal and as a structured YAML
//! test report.
//!
//! ## Core Concepts
//!
//! - **Playbooks**: Ordered plays, each targeting a list of hosts
//! - **Tasks**: One action per task, with optional `when`, `loop` and `vars`
//! - **Assertions**: Expressions evaluated by the `assert` task
//! - **Callbacks**: Event sinks receiving every task result
//! - **Report**: Per-group, per-host record of every assertion outcome
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         CLI Interface                        │
//! └──────────────────────────────────────────────────────────────┘
//!                                │
//!                                ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │              Executor (plays, hosts, loops, forks)           │
//! └──────────────────────────────────────────────────────────────┘
//!          │                     │                      │
//!          ▼                     ▼                      ▼
//! ┌─────────────────┐  ┌───────────────────┐  ┌──────────────────┐
//! │ Module Registry │  │  Template Engine  │  │   Event Sink     │
//! │ (assert, debug, │  │  (minijinja)      │  │ (default output, │
//! │  set_fact)      │  │                   │  │  assertive)      │
//! └─────────────────┘  └───────────────────┘  └──────────────────┘
//!                                                       │
//!                                                       ▼
//!                                             ┌──────────────────┐
//!                                             │ YAML test report │
//!                                             └──────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use assertive::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let playbook = Parser::new().parse_playbook("checks.yml")?;
//!     let callback = Arc::new(AssertiveCallback::new().with_record(Some("report.yml".into())));
//!
//!     let executor = Executor::new(ExecutorConfig::default(), callback.clone());
//!     let summary = executor.run(&playbook).await;
//!
//!     println!("{}", callback.stats());
//!     std::process::exit(summary.exit_code());
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.
    //!
    //! [`callback::prelude`]: crate::callback::prelude

    // Error handling
    pub use crate::error::{Error, Result};

    // Execution engine
    pub use crate::executor::{Executor, ExecutorConfig, RunSummary};

    // Modules
    pub use crate::modules::assert::{AssertArgs, AssertModule, AssertResult, MessageSpec};
    pub use crate::modules::{Module, ModuleContext, ModuleOutput, ModuleRegistry};

    // Parsing
    pub use crate::parser::{Parser, Play, Playbook, Task};

    // Templates
    pub use crate::template::TemplateEngine;

    // Traits
    pub use crate::traits::{ConditionCheckHandler, ConditionEvaluator, EventSink, Variables};

    // Callbacks
    pub use crate::callback::{AssertiveCallback, DefaultCallback, Report, RunStats, TaskEvent};

    // Configuration
    pub use crate::config::Config;
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases.
///
/// This module provides the main [`Error`](error::Error) enum covering
/// playbook parsing, module arguments, expression evaluation and report
/// writing, together with the process exit code for each.
pub mod error;

/// Core traits at the seams between the runtime and its plug-ins.
pub mod traits;

/// Jinja2-compatible expression evaluation via minijinja.
pub mod template;

// ============================================================================
// Playbook Components
// ============================================================================

/// Playbook and variable file parsing.
pub mod parser;

/// Task modules: `assert`, `debug` and `set_fact`.
pub mod modules;

/// Playbook execution engine.
///
/// Runs tasks across hosts with bounded concurrency and delivers every
/// result to an event sink.
pub mod executor;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration management.
///
/// Handles loading and merging configuration from multiple sources:
/// environment variables, config files, and command-line arguments.
pub mod config;

// ============================================================================
// Reporting and Output
// ============================================================================

/// Terminal output primitives shared by the callbacks.
pub mod output;

/// Callback plugin system for execution event handling.
///
/// # Built-in Callbacks
///
/// - [`DefaultCallback`](callback::DefaultCallback): Standard output formatting
/// - [`AssertiveCallback`](callback::AssertiveCallback): Assertion lines and YAML report
pub mod callback;

// ============================================================================
// Version Information
// ============================================================================

/// Returns the current version of Assertive.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
