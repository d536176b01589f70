//! Shared test utilities for the Assertive test suite.
//!
//! This module provides:
//! - A deterministic clock for the assertive callback
//! - A harness running a playbook string through the executor
//! - Fixture path helpers
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};

use assertive::callback::plugins::assertive::Clock;
use assertive::callback::AssertiveCallback;
use assertive::executor::{Executor, ExecutorConfig, RunSummary};
use assertive::output::BufferDisplay;
use assertive::parser::Parser;
use assertive::traits::EventSink;

/// Clock starting at 2024-01-01T00:00:00Z and advancing one second per call.
pub fn ticking_clock() -> Clock {
    let ticks = Arc::new(AtomicI64::new(0));
    Arc::new(move || {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        base + chrono::Duration::seconds(ticks.fetch_add(1, Ordering::SeqCst))
    })
}

/// Everything a finished test run leaves behind.
pub struct Harness {
    pub summary: RunSummary,
    pub callback: Arc<AssertiveCallback>,
    pub output: BufferDisplay,
}

impl Harness {
    /// Captured terminal output.
    pub fn lines(&self) -> Vec<String> {
        self.output.lines()
    }
}

/// Parse `yaml` and run it with an assertive callback capturing output.
pub async fn run_yaml(yaml: &str) -> Harness {
    run_yaml_with(yaml, None, ExecutorConfig::default()).await
}

/// Like [`run_yaml`] with an optional record path and executor settings.
pub async fn run_yaml_with(yaml: &str, record: Option<PathBuf>, config: ExecutorConfig) -> Harness {
    let playbook = Parser::new()
        .parse_playbook_str(yaml)
        .expect("test playbook should parse");

    let output = BufferDisplay::new();
    let callback = Arc::new(
        AssertiveCallback::new()
            .with_display(Arc::new(output.clone()))
            .with_no_color(true)
            .with_clock(ticking_clock())
            .with_record(record),
    );
    let sink: Arc<dyn EventSink> = callback.clone();

    let summary = Executor::new(config, sink).run(&playbook).await;
    Harness {
        summary,
        callback,
        output,
    }
}

/// Path of a file under `tests/fixtures`.
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}
