//! Default Callback Plugin
//!
//! Produces Ansible-like colored terminal output:
//! - Play and task headers padded with asterisks
//! - Colored status per host (ok/changed/failed/skipping)
//! - Final recap with per-host statistics
//! - `NO_COLOR` support for CI environments
//!
//! # Example Output
//!
//! ```text
//! PLAY [webservers] **************************************************************
//!
//! TASK [Check config] ************************************************************
//! ok: [web1]
//! changed: [web2] => Assertion failed
//!
//! PLAY RECAP *********************************************************************
//! web1                           : ok=1    changed=0    failed=0    skipped=0    ignored=0
//! web2                           : ok=0    changed=1    failed=0    skipped=0    ignored=0
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use colored::{Color, Colorize};
use serde_json::Value as JsonValue;

use crate::callback::types::{HostStats, RunStats, TaskEvent};
use crate::output::{colors, no_color_requested, Display, StdoutDisplay};
use crate::traits::EventSink;

/// The default width for output formatting (Ansible standard)
const OUTPUT_WIDTH: usize = 80;

/// Configuration for the DefaultCallback plugin
#[derive(Debug, Clone)]
pub struct DefaultCallbackConfig {
    /// Verbosity level (number of -v flags)
    pub verbosity: u8,
    /// Whether to disable colored output
    pub no_color: bool,
    /// Whether to show skipped tasks
    pub show_skipped: bool,
    /// Whether to show ok tasks
    pub show_ok: bool,
}

impl Default for DefaultCallbackConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            no_color: false,
            show_skipped: true,
            show_ok: true,
        }
    }
}

/// Default callback plugin producing Ansible-like colored output.
///
/// Holds no run state of its own: headers are printed as the executor
/// announces them and the recap is built from the [`RunStats`] handed to
/// `on_run_end`.
pub struct DefaultCallback {
    config: DefaultCallbackConfig,
    use_color: bool,
    display: Arc<dyn Display>,
}

impl DefaultCallback {
    /// Create a new DefaultCallback printing to stdout.
    pub fn new() -> Self {
        Self::with_config(DefaultCallbackConfig::default())
    }

    /// Create a new DefaultCallback with custom configuration.
    pub fn with_config(config: DefaultCallbackConfig) -> Self {
        let use_color = !config.no_color && !no_color_requested();
        Self {
            config,
            use_color,
            display: Arc::new(StdoutDisplay),
        }
    }

    /// Route output through another display service.
    pub fn with_display(mut self, display: Arc<dyn Display>) -> Self {
        self.display = display;
        self
    }

    pub fn with_verbosity(mut self, level: u8) -> Self {
        self.config.verbosity = level;
        self
    }

    pub fn with_no_color(mut self, no_color: bool) -> Self {
        self.use_color = !no_color && !no_color_requested();
        self.config.no_color = no_color;
        self
    }

    /// Returns true if colored output is enabled.
    pub fn use_color(&self) -> bool {
        self.use_color
    }

    // ========================================================================
    // Output Helpers
    // ========================================================================

    fn emit(&self, line: &str) {
        self.display.display(line);
    }

    fn colorize(&self, text: &str, color: Color) -> String {
        if self.use_color {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    /// Print a header line with asterisks.
    ///
    /// Format: `PREFIX [name] ******...`
    fn print_header(&self, header: &str) {
        let padding = OUTPUT_WIDTH.saturating_sub(header.len() + 1);
        let stars = "*".repeat(padding);

        self.emit("");
        if self.use_color {
            self.emit(&format!(
                "{} {}",
                header.bright_white().bold(),
                stars.color(colors::MUTED)
            ));
        } else {
            self.emit(&format!("{} {}", header, stars));
        }
    }

    /// Format a stat value for recap (dimmed if zero)
    fn format_stat(&self, label: &str, value: u32, color: Color) -> String {
        let text = format!("{}={}", label, value);
        if !self.use_color {
            text
        } else if value > 0 {
            text.color(color).to_string()
        } else {
            text.dimmed().to_string()
        }
    }

    fn format_recap_host(&self, host: &str, stats: &HostStats) -> String {
        let padded = format!("{:<30}", host);
        if !self.use_color {
            padded
        } else if stats.has_failures() {
            padded.red().bold().to_string()
        } else if stats.has_changes() {
            padded.color(colors::CHANGED).to_string()
        } else {
            padded.color(colors::OK).to_string()
        }
    }

    /// Whether the result's message should follow the status line.
    fn shows_message(&self, event: &TaskEvent) -> bool {
        self.config.verbosity > 0
            || event.action == "debug"
            || event
                .result
                .get("verbose_always")
                .and_then(JsonValue::as_bool)
                .unwrap_or(false)
    }

    fn item_label(event: &TaskEvent) -> Option<String> {
        event.item().map(|item| match item {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    fn status_line(&self, status: &str, color: Color, event: &TaskEvent, item: bool) -> String {
        let mut line = format!("{}: [{}]", status, event.host);
        if item {
            if let Some(label) = Self::item_label(event) {
                line.push_str(&format!(" => (item={})", label));
            }
        }
        if self.shows_message(event) {
            if let Some(msg) = event.msg_text() {
                line.push_str(&format!(" => {}", msg));
            }
        }
        self.colorize(&line, color)
    }

    fn print_result(&self, event: &TaskEvent, item: bool) {
        let (status, color) = if event.is_changed() {
            ("changed", colors::CHANGED)
        } else {
            ("ok", colors::OK)
        };
        if !event.is_changed() && !self.config.show_ok {
            return;
        }
        self.emit(&self.status_line(status, color, event, item));
    }

    fn print_failure(&self, event: &TaskEvent, ignore_errors: bool, item: bool) {
        let mut line = format!("fatal: [{}]", event.host);
        if item {
            if let Some(label) = Self::item_label(event) {
                line.push_str(&format!(" (item={})", label));
            }
        }
        line.push_str(": FAILED!");
        if let Some(msg) = event.msg_text() {
            line.push_str(&format!(" => {}", msg));
        }
        self.emit(&self.colorize(&line, colors::ERROR));
        if ignore_errors {
            self.emit(&self.colorize("...ignoring", colors::SKIP));
        }
    }

    fn print_skip(&self, event: &TaskEvent, item: bool) {
        if !self.config.show_skipped {
            return;
        }
        let mut line = format!("skipping: [{}]", event.host);
        if item {
            if let Some(label) = Self::item_label(event) {
                line.push_str(&format!(" => (item={})", label));
            }
        }
        self.emit(&self.colorize(&line, colors::SKIP));
    }
}

impl Default for DefaultCallback {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DefaultCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultCallback")
            .field("config", &self.config)
            .field("use_color", &self.use_color)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// EventSink Implementation
// ============================================================================

#[async_trait]
impl EventSink for DefaultCallback {
    async fn on_group_start(&self, name: &str) {
        self.print_header(&format!("PLAY [{}]", name));
    }

    async fn on_task_start(&self, name: &str) {
        self.print_header(&format!("TASK [{}]", name));
    }

    async fn on_ok(&self, event: &TaskEvent) {
        if event.is_loop_container() {
            return;
        }
        self.print_result(event, false);
    }

    async fn on_item_ok(&self, event: &TaskEvent) {
        self.print_result(event, true);
    }

    async fn on_failed(&self, event: &TaskEvent, ignore_errors: bool) {
        self.print_failure(event, ignore_errors, false);
    }

    async fn on_item_failed(&self, event: &TaskEvent) {
        self.print_failure(event, false, true);
    }

    async fn on_skipped(&self, event: &TaskEvent) {
        if event.is_loop_container() {
            return;
        }
        self.print_skip(event, false);
    }

    async fn on_item_skipped(&self, event: &TaskEvent) {
        self.print_skip(event, true);
    }

    async fn on_run_end(&self, stats: &RunStats) {
        self.print_header("PLAY RECAP");

        for (host, host_stats) in stats.hosts() {
            let ok = self.format_stat("ok", host_stats.ok, colors::OK);
            let changed = self.format_stat("changed", host_stats.changed, colors::CHANGED);
            let failed = self.format_stat("failed", host_stats.failed, colors::ERROR);
            let skipped = self.format_stat("skipped", host_stats.skipped, colors::SKIP);
            let ignored = self.format_stat("ignored", host_stats.ignored, Color::Blue);

            self.emit(&format!(
                "{} : {}    {}    {}    {}    {}",
                self.format_recap_host(host, host_stats),
                ok,
                changed,
                failed,
                skipped,
                ignored
            ));
        }
        self.emit("");
    }
}
