//! Hierarchical assertion report.
//!
//! ```text
//! Report ── stats, timing
//!   └─ Group (one per play) ── stats
//!        └─ HostRecord ── stats
//!             └─ TestEntry (one per task invocation and loop item)
//!                  └─ AssertionRecord
//! ```
//!
//! Counters are plain [`AssertionStats`] values. Each level adds the stats
//! of the entries filed below it, so run, group and host totals always agree.

use std::fmt;
use std::io::Write;
use std::iter::Sum;
use std::ops::Add;
use std::path::Path;

use colored::Color;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::modules::assert::MessageSpec;
use crate::output::colors;

/// Outcome of a single assertion or of a whole test entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

impl TestStatus {
    /// Display color for this status.
    pub fn color(self) -> Color {
        match self {
            TestStatus::Passed => colors::OK,
            TestStatus::Failed => colors::ERROR,
            TestStatus::Skipped => colors::SKIP,
        }
    }

    /// Status of an evaluated assertion.
    pub fn from_outcome(evaluated_to: bool) -> Self {
        if evaluated_to {
            TestStatus::Passed
        } else {
            TestStatus::Failed
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Skipped => "skipped",
        };
        f.write_str(text)
    }
}

/// Assertion counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionStats {
    pub assertions: u64,
    pub assertions_passed: u64,
    pub assertions_skipped: u64,
    pub assertions_failed: u64,
}

impl AssertionStats {
    /// Stats for exactly one assertion with the given status.
    pub fn single(status: TestStatus) -> Self {
        let mut stats = Self {
            assertions: 1,
            ..Self::default()
        };
        match status {
            TestStatus::Passed => stats.assertions_passed = 1,
            TestStatus::Failed => stats.assertions_failed = 1,
            TestStatus::Skipped => stats.assertions_skipped = 1,
        }
        stats
    }

    /// Returns true when the outcome counters add up to the total.
    pub fn is_consistent(&self) -> bool {
        self.assertions_passed + self.assertions_failed + self.assertions_skipped
            == self.assertions
    }
}

impl Add for AssertionStats {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            assertions: self.assertions + other.assertions,
            assertions_passed: self.assertions_passed + other.assertions_passed,
            assertions_skipped: self.assertions_skipped + other.assertions_skipped,
            assertions_failed: self.assertions_failed + other.assertions_failed,
        }
    }
}

impl Sum for AssertionStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a AssertionStats> for AssertionStats {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for AssertionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "assertions={} passed={} failed={} skipped={}",
            self.assertions, self.assertions_passed, self.assertions_failed, self.assertions_skipped
        )
    }
}

/// One filed assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionRecord {
    /// Expression text
    pub test: String,
    /// Outcome
    pub testresult: TestStatus,
}

impl AssertionRecord {
    pub fn new(test: impl Into<String>, testresult: TestStatus) -> Self {
        Self {
            test: test.into(),
            testresult,
        }
    }
}

/// One task invocation (or loop item) on one host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestEntry {
    pub assertions: Vec<AssertionRecord>,
    /// RFC 3339 UTC timestamp of filing
    pub testtime: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<MessageSpec>,
    pub testresult: TestStatus,
}

impl TestEntry {
    /// Build an entry; the overall status is derived from `assertions`.
    pub fn new(assertions: Vec<AssertionRecord>, testtime: impl Into<String>) -> Self {
        let testresult = Self::status_of(&assertions);
        Self {
            assertions,
            testtime: testtime.into(),
            name: None,
            item: None,
            msg: None,
            testresult,
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn with_item(mut self, item: Option<JsonValue>) -> Self {
        self.item = item;
        self
    }

    pub fn with_msg(mut self, msg: Option<MessageSpec>) -> Self {
        self.msg = msg;
        self
    }

    /// Failed if any assertion failed, skipped if all were skipped, else passed.
    pub fn status_of(assertions: &[AssertionRecord]) -> TestStatus {
        if assertions
            .iter()
            .any(|a| a.testresult == TestStatus::Failed)
        {
            TestStatus::Failed
        } else if !assertions.is_empty()
            && assertions
                .iter()
                .all(|a| a.testresult == TestStatus::Skipped)
        {
            TestStatus::Skipped
        } else {
            TestStatus::Passed
        }
    }

    pub fn stats(&self) -> AssertionStats {
        self.assertions
            .iter()
            .map(|a| AssertionStats::single(a.testresult))
            .sum()
    }
}

/// Tests filed for one host within a group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostRecord {
    pub stats: AssertionStats,
    pub tests: Vec<TestEntry>,
}

impl HostRecord {
    fn push(&mut self, entry: TestEntry) -> AssertionStats {
        let delta = entry.stats();
        self.stats = self.stats + delta;
        self.tests.push(entry);
        delta
    }
}

/// All tests filed during one play.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub stats: AssertionStats,
    pub hosts: IndexMap<String, HostRecord>,
}

impl Group {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// File `entry` under `host`, returning the stats it added.
    pub fn file(&mut self, host: &str, entry: TestEntry) -> AssertionStats {
        let delta = self.hosts.entry(host.to_string()).or_default().push(entry);
        self.stats = self.stats + delta;
        delta
    }

    /// Returns true if no test entry was filed.
    pub fn is_empty(&self) -> bool {
        self.hosts.values().all(|host| host.tests.is_empty())
    }
}

/// Run start and end stamps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    pub test_started_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_finished_at: Option<String>,
}

/// The persisted report document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub stats: AssertionStats,
    pub groups: Vec<Group>,
    pub timing: Timing,
}

impl Report {
    /// Start an empty report.
    pub fn new(started_at: impl Into<String>) -> Self {
        Self {
            stats: AssertionStats::default(),
            groups: Vec::new(),
            timing: Timing {
                test_started_at: started_at.into(),
                test_finished_at: None,
            },
        }
    }

    /// Serialize to a YAML document.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write the report to `path`, replacing any existing file atomically.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let yaml = self.to_yaml()?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| Error::report_write(path, e.to_string()))?;
        file.write_all(yaml.as_bytes())
            .and_then(|_| file.as_file().sync_all())
            .map_err(|e| Error::report_write(path, e.to_string()))?;
        file.persist(path)
            .map_err(|e| Error::report_write(path, e.error.to_string()))?;
        Ok(())
    }

    /// Read a report back from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }
}
