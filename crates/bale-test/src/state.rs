//! Per-test and per-file outcomes.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    Todo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCase {
    /// Suite path and test name joined with ` > `.
    pub name: String,
    pub status: TestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Lifecycle of one test file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum FileState {
    Pending,
    Running,
    Passed,
    /// A test failed, the process crashed, or it ran past the file timeout.
    Failed(String),
    /// Every test was skipped, or the file declared none.
    Skipped,
}

impl FileState {
    pub fn is_failed(&self) -> bool {
        matches!(self, FileState::Failed(_))
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self, FileState::Pending | FileState::Running)
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileState::Pending => f.write_str("pending"),
            FileState::Running => f.write_str("running"),
            FileState::Passed => f.write_str("passed"),
            FileState::Failed(reason) => write!(f, "failed: {reason}"),
            FileState::Skipped => f.write_str("skipped"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    /// Path relative to the project root.
    pub display: String,
    pub state: FileState,
    pub tests: Vec<TestCase>,
    /// stdout lines that were not part of the TAP stream.
    pub output: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    #[serde(with = "crate::duration_ms")]
    pub duration: Duration,
}

/// Counts across every file of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TestSummary {
    pub files: usize,
    pub failed_files: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub todo: usize,
}

impl TestSummary {
    pub fn from_files(files: &[FileReport]) -> Self {
        let mut summary = TestSummary {
            files: files.len(),
            ..Default::default()
        };
        for file in files {
            if file.state.is_failed() {
                summary.failed_files += 1;
            }
            for test in &file.tests {
                match test.status {
                    TestStatus::Passed => summary.passed += 1,
                    TestStatus::Failed => summary.failed += 1,
                    TestStatus::Skipped => summary.skipped += 1,
                    TestStatus::Todo => summary.todo += 1,
                }
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.todo
    }

    pub fn success(&self) -> bool {
        self.failed == 0 && self.failed_files == 0
    }
}
