//! Display service used by the callbacks.
//!
//! Callbacks never print directly: they hand finished lines to a
//! [`Display`], which lets tests capture output with [`BufferDisplay`].

use std::sync::Arc;

use colored::{Color, Colorize};
use parking_lot::Mutex;

/// Status colors shared by every callback.
pub mod colors {
    use colored::Color;

    /// Successful, unchanged results and passed assertions.
    pub const OK: Color = Color::Green;
    /// Changed results and ignored failures.
    pub const CHANGED: Color = Color::Yellow;
    /// Failures.
    pub const ERROR: Color = Color::Red;
    /// Skipped results and skipped assertions.
    pub const SKIP: Color = Color::Cyan;
    /// Headers and other chrome.
    pub const MUTED: Color = Color::BrightBlack;
}

/// Sink for human-readable output lines.
pub trait Display: Send + Sync {
    /// Emits one line.
    fn display(&self, line: &str);
}

/// Display writing to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutDisplay;

impl Display for StdoutDisplay {
    fn display(&self, line: &str) {
        println!("{}", line);
    }
}

/// Display capturing lines in memory.
#[derive(Debug, Default, Clone)]
pub struct BufferDisplay {
    lines: Arc<Mutex<Vec<String>>>,
}

impl BufferDisplay {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every captured line.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Returns the captured output joined with newlines.
    pub fn contents(&self) -> String {
        self.lines.lock().join("\n")
    }

    /// Returns true if any captured line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|line| line.contains(needle))
    }
}

impl Display for BufferDisplay {
    fn display(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

/// Applies `color` to `text` unless color output is disabled.
pub fn paint(text: &str, color: Color, use_color: bool) -> String {
    if use_color {
        text.color(color).to_string()
    } else {
        text.to_string()
    }
}

/// Returns true when the environment asks for plain output.
pub fn no_color_requested() -> bool {
    std::env::var_os("NO_COLOR").is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_display_captures_lines() {
        let display = BufferDisplay::new();
        display.display("first");
        display.display("second");

        assert_eq!(display.lines(), vec!["first", "second"]);
        assert!(display.contains("sec"));
        assert_eq!(display.contents(), "first\nsecond");
    }

    #[test]
    fn test_buffer_display_clones_share_lines() {
        let display = BufferDisplay::new();
        let clone = display.clone();
        clone.display("shared");
        assert_eq!(display.lines(), vec!["shared"]);
    }

    #[test]
    fn test_paint_without_color_is_identity() {
        assert_eq!(paint("passed", colors::OK, false), "passed");
    }
}
