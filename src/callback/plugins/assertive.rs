//! Assertive callback plugin.
//!
//! Folds `assert` results into a hierarchical [`Report`] and prints one line
//! per assertion. Every other task type is handed to the wrapped
//! [`DefaultCallback`], so the run output otherwise looks the same as the
//! default output.
//!
//! # Example Output
//!
//! ```text
//! TASK [Check config] ************************************************************
//! passed: [web1]  ASSERT(port == 8080)
//! failed: [web1]  ASSERT(workers > 4)
//! failed: Assertion failed
//! ```
//!
//! Assert results never reach the wrapped default callback, so the task's
//! `quiet` flag and its `verbose_always` field have no visible effect here:
//! the per-assertion lines above are printed regardless. They stay in the
//! result record for other event sinks.
//!
//! When a record path is configured the report is written once, at run end,
//! as a YAML document with top-level `stats`, `groups` and `timing` keys.
//! The file is written to a temporary sibling and renamed into place.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use tracing::{debug, error, info};

use crate::callback::plugins::default::{DefaultCallback, DefaultCallbackConfig};
use crate::callback::report::{
    AssertionRecord, AssertionStats, Group, Report, TestEntry, TestStatus,
};
use crate::callback::types::{RunStats, TaskEvent};
use crate::error::Error;
use crate::modules::assert::MessageSpec;
use crate::output::{colors, no_color_requested, paint, Display, StdoutDisplay};
use crate::traits::EventSink;

/// Environment variable naming the report destination.
pub const RECORD_ENV: &str = "ASSERTIVE_RECORD";

/// Expression text shown for a record that carries no assertions.
pub const PLACEHOLDER_TEST: &str = "(skipped)";

/// Source of filing timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Mutable aggregation state, guarded by one mutex.
#[derive(Debug)]
struct AggregatorState {
    current: Option<Group>,
    closed: Vec<Group>,
    stats: AssertionStats,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    last_stamp: Option<DateTime<Utc>>,
    finished: bool,
    write_error: Option<Error>,
}

impl AggregatorState {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            current: None,
            closed: Vec::new(),
            stats: AssertionStats::default(),
            started_at,
            finished_at: None,
            last_stamp: None,
            finished: false,
            write_error: None,
        }
    }

    /// Move the current group to the closed list, dropping it if empty.
    fn close_group(&mut self) {
        if let Some(group) = self.current.take() {
            if group.is_empty() {
                debug!(group = ?group.name, "Dropping group without assertions");
            } else {
                self.closed.push(group);
            }
        }
    }

    /// Filing stamp that never steps backwards.
    fn stamp(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let stamp = match self.last_stamp {
            Some(last) if now < last => last,
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    fn file(&mut self, host: &str, entry: TestEntry) {
        let delta = self
            .current
            .get_or_insert_with(|| Group::new(None))
            .file(host, entry);
        self.stats = self.stats + delta;
    }

    fn snapshot(&self) -> Report {
        let mut groups = self.closed.clone();
        if let Some(current) = self.current.as_ref().filter(|g| !g.is_empty()) {
            groups.push(current.clone());
        }
        let mut report = Report::new(format_time(self.started_at));
        report.stats = self.stats;
        report.groups = groups;
        report.timing.test_finished_at = self.finished_at.map(format_time);
        report
    }
}

/// Result aggregator for condition-check tasks.
///
/// # Thread Safety
///
/// Every handler takes the state mutex once for its whole update and never
/// holds it across an `.await`, so events for different hosts may arrive
/// interleaved from concurrent execution.
pub struct AssertiveCallback {
    state: Mutex<AggregatorState>,
    inner: DefaultCallback,
    display: Arc<dyn Display>,
    record: Option<PathBuf>,
    use_color: bool,
    clock: Clock,
}

impl AssertiveCallback {
    /// Create an aggregator printing to stdout without a record file.
    pub fn new() -> Self {
        let clock = system_clock();
        let started_at = clock();
        Self {
            state: Mutex::new(AggregatorState::new(started_at)),
            inner: DefaultCallback::new(),
            display: Arc::new(StdoutDisplay),
            record: None,
            use_color: !no_color_requested(),
            clock,
        }
    }

    /// Create an aggregator whose record path comes from `ASSERTIVE_RECORD`.
    pub fn from_env() -> Self {
        let record = std::env::var_os(RECORD_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        Self::new().with_record(record)
    }

    /// Write the report to `record` at run end.
    pub fn with_record(mut self, record: Option<PathBuf>) -> Self {
        self.record = record;
        self
    }

    /// Route all output, including delegated output, through `display`.
    pub fn with_display(mut self, display: Arc<dyn Display>) -> Self {
        self.inner = self.inner.with_display(Arc::clone(&display));
        self.display = display;
        self
    }

    /// Configure the wrapped default callback.
    pub fn with_default_config(mut self, config: DefaultCallbackConfig) -> Self {
        let no_color = config.no_color;
        self.inner = DefaultCallback::with_config(config).with_display(Arc::clone(&self.display));
        self.use_color = !no_color && !no_color_requested();
        self
    }

    pub fn with_no_color(mut self, no_color: bool) -> Self {
        self.inner = self.inner.with_no_color(no_color);
        self.use_color = self.inner.use_color();
        self
    }

    /// Replace the timestamp source. Restarts the run clock.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.state = Mutex::new(AggregatorState::new(clock()));
        self.clock = clock;
        self
    }

    /// Destination of the report, if any.
    pub fn record_path(&self) -> Option<&Path> {
        self.record.as_deref()
    }

    /// Snapshot of the report as it stands.
    pub fn report(&self) -> Report {
        self.state.lock().snapshot()
    }

    /// Run-level counters.
    pub fn stats(&self) -> AssertionStats {
        self.state.lock().stats
    }

    /// Takes the error from a failed report write, if one happened.
    pub fn take_write_error(&self) -> Option<Error> {
        self.state.lock().write_error.take()
    }

    fn paint(&self, text: &str, color: colored::Color) -> String {
        paint(text, color, self.use_color)
    }

    /// Build and file one test entry, printing a line per assertion.
    fn process_assert_result(&self, event: &TaskEvent, skipped: bool) {
        if event.is_loop_container() {
            debug!(host = %event.host, "Ignoring loop container result");
            return;
        }

        let mut lines = Vec::new();
        let mut records = Vec::new();
        for (expression, evaluated_to) in parse_assertions(event) {
            let status = if skipped {
                TestStatus::Skipped
            } else {
                TestStatus::from_outcome(evaluated_to)
            };
            lines.push(format!(
                "{}  ASSERT({})",
                self.paint(&format!("{}: [{}]", status, event.host), status.color()),
                expression
            ));
            records.push(AssertionRecord::new(expression, status));
        }

        let msg = event.msg().map(parse_message);
        let entry = TestEntry::new(records, String::new())
            .with_name(event.task_name.clone())
            .with_item(event.item().cloned())
            .with_msg(msg);
        if entry.testresult == TestStatus::Failed {
            if let Some(msg) = &entry.msg {
                lines.push(self.paint(&format!("failed: {}", msg), colors::ERROR));
            }
        }

        let now = (self.clock)();
        {
            let mut state = self.state.lock();
            if state.finished {
                debug!(host = %event.host, "Ignoring result delivered after run end");
                return;
            }
            let stamp = state.stamp(now);
            let entry = TestEntry {
                testtime: format_time(stamp),
                ..entry
            };
            debug!(
                host = %event.host,
                task = ?entry.name,
                result = %entry.testresult,
                assertions = entry.assertions.len(),
                "Filed test entry"
            );
            state.file(&event.host, entry);
            for line in &lines {
                self.display.display(line);
            }
        }
    }

    /// Close the last group and stamp the finish time. Returns `None` if
    /// the run was already finished.
    fn finish(&self) -> Option<Report> {
        let now = (self.clock)();
        let mut state = self.state.lock();
        if state.finished {
            return None;
        }
        state.close_group();
        let floor = state.last_stamp.unwrap_or(state.started_at).max(state.started_at);
        state.finished_at = Some(now.max(floor));
        state.finished = true;
        Some(state.snapshot())
    }

    fn write_report(&self, report: &Report, path: &Path) {
        self.display
            .display(&format!("Writing test results to {}", path.display()));
        match report.write_to(path) {
            Ok(()) => info!(path = %path.display(), "Wrote assertion report"),
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to write assertion report");
                self.display.display(&self.paint(&e.to_string(), colors::ERROR));
                self.state.lock().write_error = Some(e);
            }
        }
    }
}

impl Default for AssertiveCallback {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AssertiveCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssertiveCallback")
            .field("record", &self.record)
            .field("use_color", &self.use_color)
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

/// Extract `(expression, evaluated_to)` pairs, defaulting to one placeholder.
fn parse_assertions(event: &TaskEvent) -> Vec<(String, bool)> {
    let parsed: Vec<(String, bool)> = event
        .result
        .get("assertions")
        .and_then(JsonValue::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    let expression = item
                        .get("assertion")
                        .and_then(JsonValue::as_str)
                        .unwrap_or(PLACEHOLDER_TEST)
                        .to_string();
                    let evaluated_to = item
                        .get("evaluated_to")
                        .and_then(JsonValue::as_bool)
                        .unwrap_or(true);
                    (expression, evaluated_to)
                })
                .collect()
        })
        .unwrap_or_default();

    if parsed.is_empty() {
        vec![(PLACEHOLDER_TEST.to_string(), true)]
    } else {
        parsed
    }
}

fn parse_message(value: &JsonValue) -> MessageSpec {
    serde_json::from_value(value.clone()).unwrap_or_else(|_| MessageSpec::Single(value.to_string()))
}

#[async_trait]
impl EventSink for AssertiveCallback {
    async fn on_group_start(&self, name: &str) {
        self.inner.on_group_start(name).await;
        let mut state = self.state.lock();
        state.close_group();
        state.current = Some(Group::new(Some(name.to_string())));
        info!(group = %name, "Started assertion group");
    }

    async fn on_task_start(&self, name: &str) {
        self.inner.on_task_start(name).await;
    }

    async fn on_ok(&self, event: &TaskEvent) {
        if event.is_assert() {
            self.process_assert_result(event, false);
        } else {
            self.inner.on_ok(event).await;
        }
    }

    async fn on_item_ok(&self, event: &TaskEvent) {
        if event.is_assert() {
            self.process_assert_result(event, false);
        } else {
            self.inner.on_item_ok(event).await;
        }
    }

    async fn on_failed(&self, event: &TaskEvent, ignore_errors: bool) {
        if ignore_errors {
            self.display.display(&self.paint(
                &format!("failed (ignored): [{}]", event.host),
                colors::CHANGED,
            ));
        } else {
            self.inner.on_failed(event, ignore_errors).await;
        }
    }

    async fn on_item_failed(&self, event: &TaskEvent) {
        self.inner.on_item_failed(event).await;
    }

    async fn on_skipped(&self, event: &TaskEvent) {
        if event.is_assert() {
            self.process_assert_result(event, true);
        } else {
            self.inner.on_skipped(event).await;
        }
    }

    async fn on_item_skipped(&self, event: &TaskEvent) {
        if event.is_assert() {
            self.process_assert_result(event, true);
        } else {
            self.inner.on_item_skipped(event).await;
        }
    }

    async fn on_run_end(&self, stats: &RunStats) {
        let Some(report) = self.finish() else {
            debug!("Run already finished; ignoring repeated run end");
            return;
        };
        self.inner.on_run_end(stats).await;

        let summary = format!("ASSERTIONS: {}", report.stats);
        let color = if report.stats.assertions_failed > 0 {
            colors::ERROR
        } else {
            colors::OK
        };
        self.display.display(&self.paint(&summary, color));

        if let Some(path) = self.record.as_deref() {
            self.write_report(&report, path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::BufferDisplay;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn fixed_clock(offsets: Arc<AtomicI64>) -> Clock {
        Arc::new(move || {
            let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            base + chrono::Duration::seconds(offsets.load(Ordering::SeqCst))
        })
    }

    fn aggregator() -> (AssertiveCallback, BufferDisplay) {
        let display = BufferDisplay::new();
        let callback = AssertiveCallback::new()
            .with_no_color(true)
            .with_display(Arc::new(display.clone()));
        (callback, display)
    }

    fn assert_event(host: &str, outcomes: &[(&str, bool)]) -> TaskEvent {
        let assertions: Vec<JsonValue> = outcomes
            .iter()
            .map(|(expr, ok)| json!({"assertion": expr, "evaluated_to": ok}))
            .collect();
        let failed = outcomes.iter().any(|(_, ok)| !ok);
        TaskEvent::new(host, "assert")
            .with_task_name("check")
            .with_field("assertions", JsonValue::Array(assertions))
            .with_field("changed", json!(failed))
            .with_field(
                "msg",
                json!(if failed { "Assertion failed" } else { "All assertions passed" }),
            )
    }

    #[tokio::test]
    async fn test_files_passed_and_failed_assertions() {
        let (callback, display) = aggregator();
        callback.on_group_start("play").await;
        callback
            .on_ok(&assert_event("localhost", &[("1 == 1", true), ("1 == 2", false)]))
            .await;

        let report = callback.report();
        assert_eq!(report.stats.assertions, 2);
        assert_eq!(report.stats.assertions_passed, 1);
        assert_eq!(report.stats.assertions_failed, 1);

        let entry = &report.groups[0].hosts["localhost"].tests[0];
        assert_eq!(entry.testresult, TestStatus::Failed);
        assert_eq!(entry.name.as_deref(), Some("check"));

        assert!(display.contains("passed: [localhost]  ASSERT(1 == 1)"));
        assert!(display.contains("failed: [localhost]  ASSERT(1 == 2)"));
        assert!(display.contains("failed: Assertion failed"));
    }

    #[tokio::test]
    async fn test_skipped_assertions_only_count_as_skipped() {
        let (callback, display) = aggregator();
        callback.on_group_start("play").await;
        callback
            .on_skipped(
                &TaskEvent::new("h1", "assert")
                    .with_field("assertions", json!([{"assertion": "x == 1"}, {"assertion": "y"}])),
            )
            .await;
        callback
            .on_skipped(&TaskEvent::new("h1", "assert").with_field("skipped", json!(true)))
            .await;

        let stats = callback.stats();
        assert_eq!(stats.assertions, 3);
        assert_eq!(stats.assertions_skipped, 3);
        assert_eq!(stats.assertions_passed + stats.assertions_failed, 0);

        let tests = &callback.report().groups[0].hosts["h1"].tests;
        assert!(tests.iter().all(|t| t.testresult == TestStatus::Skipped));
        assert_eq!(tests[1].assertions[0].test, PLACEHOLDER_TEST);
        assert!(display.contains("skipped: [h1]  ASSERT(x == 1)"));
        assert!(display.contains("skipped: [h1]  ASSERT((skipped))"));
    }

    #[tokio::test]
    async fn test_loop_container_is_not_filed() {
        let (callback, _display) = aggregator();
        callback
            .on_item_ok(&assert_event("h1", &[("item > 0", true)]).with_field("item", json!(1)))
            .await;
        callback
            .on_ok(&TaskEvent::new("h1", "assert").with_field("results", json!([{}])))
            .await;

        let report = callback.report();
        assert_eq!(report.stats.assertions, 1);
        let entry = &report.groups[0].hosts["h1"].tests[0];
        assert_eq!(entry.item, Some(json!(1)));
    }

    #[tokio::test]
    async fn test_events_before_group_file_into_unnamed_group() {
        let (callback, _display) = aggregator();
        callback.on_ok(&assert_event("h1", &[("true", true)])).await;
        callback.on_group_start("second").await;
        callback.on_ok(&assert_event("h1", &[("true", true)])).await;

        let report = callback.report();
        assert_eq!(report.groups.len(), 2);
        assert_eq!(report.groups[0].name, None);
        assert_eq!(report.groups[1].name.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_empty_groups_are_dropped() {
        let (callback, _display) = aggregator();
        callback.on_group_start("empty").await;
        callback.on_group_start("full").await;
        callback.on_ok(&assert_event("h1", &[("true", true)])).await;
        callback.on_group_start("trailing").await;
        callback.on_run_end(&RunStats::new()).await;

        let names: Vec<_> = callback
            .report()
            .groups
            .iter()
            .map(|g| g.name.clone())
            .collect();
        assert_eq!(names, vec![Some("full".to_string())]);
    }

    #[tokio::test]
    async fn test_ignored_failure_is_muted_and_uncounted() {
        let (callback, display) = aggregator();
        callback.on_group_start("play").await;
        callback
            .on_failed(&assert_event("h1", &[("false", false)]), true)
            .await;

        assert_eq!(callback.stats(), AssertionStats::default());
        assert!(display.contains("failed (ignored): [h1]"));
    }

    #[tokio::test]
    async fn test_fatal_failure_is_delegated() {
        let (callback, display) = aggregator();
        callback
            .on_failed(&assert_event("h1", &[("false", false)]).with_field("failed", json!(true)), false)
            .await;

        assert_eq!(callback.stats().assertions, 0);
        assert!(display.contains("fatal: [h1]: FAILED!"));
    }

    #[tokio::test]
    async fn test_non_assert_events_are_delegated() {
        let (callback, display) = aggregator();
        callback
            .on_ok(&TaskEvent::new("h1", "debug").with_field("msg", json!("hi")))
            .await;
        callback
            .on_skipped(&TaskEvent::new("h1", "set_fact").with_field("skipped", json!(true)))
            .await;

        assert_eq!(callback.stats().assertions, 0);
        assert_eq!(display.lines(), vec!["ok: [h1] => hi", "skipping: [h1]"]);
    }

    #[tokio::test]
    async fn test_testtime_never_steps_backwards() {
        let offset = Arc::new(AtomicI64::new(10));
        let (callback, _display) = aggregator();
        let callback = callback.with_clock(fixed_clock(Arc::clone(&offset)));

        callback.on_group_start("play").await;
        callback.on_ok(&assert_event("h1", &[("true", true)])).await;
        offset.store(5, Ordering::SeqCst);
        callback.on_ok(&assert_event("h2", &[("true", true)])).await;

        let report = callback.report();
        let group = &report.groups[0];
        let first = &group.hosts["h1"].tests[0].testtime;
        let second = &group.hosts["h2"].tests[0].testtime;
        assert_eq!(first, second);
        assert_eq!(first, "2024-01-01T00:00:10.000000Z");
    }

    #[tokio::test]
    async fn test_finish_time_not_before_last_entry() {
        let offset = Arc::new(AtomicI64::new(0));
        let (callback, _display) = aggregator();
        let callback = callback.with_clock(fixed_clock(Arc::clone(&offset)));

        offset.store(30, Ordering::SeqCst);
        callback.on_ok(&assert_event("h1", &[("true", true)])).await;
        offset.store(10, Ordering::SeqCst);
        callback.on_run_end(&RunStats::new()).await;

        let report = callback.report();
        let testtime = &report.groups[0].hosts["h1"].tests[0].testtime;
        assert_eq!(testtime, "2024-01-01T00:00:30.000000Z");
        assert_eq!(
            report.timing.test_finished_at.as_deref(),
            Some("2024-01-01T00:00:30.000000Z")
        );
    }

    #[tokio::test]
    async fn test_run_end_writes_report_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.yml");
        let (callback, display) = aggregator();
        let callback = callback.with_record(Some(path.clone()));

        callback.on_group_start("play").await;
        callback.on_ok(&assert_event("h1", &[("true", true)])).await;
        callback.on_run_end(&RunStats::new()).await;

        let written = Report::load(&path).unwrap();
        assert_eq!(written.stats.assertions, 1);
        assert!(written.timing.test_finished_at.is_some());
        assert!(display.contains("Writing test results to"));
        assert!(display.contains("ASSERTIONS: assertions=1 passed=1 failed=0 skipped=0"));

        std::fs::remove_file(&path).unwrap();
        callback.on_run_end(&RunStats::new()).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("results.yml");
        let (callback, _display) = aggregator();
        let callback = callback.with_record(Some(path));

        callback.on_run_end(&RunStats::new()).await;
        assert!(callback.take_write_error().is_some());
        assert!(callback.take_write_error().is_none());
    }

    #[tokio::test]
    async fn test_no_record_writes_nothing() {
        let (callback, display) = aggregator();
        callback.on_run_end(&RunStats::new()).await;
        assert!(!display.contains("Writing test results"));
        assert!(callback.record_path().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_filing_keeps_stats_consistent() {
        let (callback, _display) = aggregator();
        let callback = Arc::new(callback);
        callback.on_group_start("play").await;

        let mut handles = Vec::new();
        for i in 0..16 {
            let callback = Arc::clone(&callback);
            handles.push(tokio::spawn(async move {
                let host = format!("host{}", i % 4);
                callback
                    .on_ok(&assert_event(&host, &[("a", true), ("b", i % 3 != 0)]))
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let report = callback.report();
        assert_eq!(report.stats.assertions, 32);
        assert!(report.stats.is_consistent());
        let group_sum: AssertionStats = report.groups.iter().map(|g| g.stats).sum();
        assert_eq!(group_sum, report.stats);
        let host_sum: AssertionStats = report.groups[0].hosts.values().map(|h| h.stats).sum();
        assert_eq!(host_sum, report.stats);
    }
}
