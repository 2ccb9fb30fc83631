//! # bale-test
//!
//! Runs a library's test files under `node --test`, several at a time, and
//! gates the run on V8 coverage.
//!
//! ```no_run
//! use bale_config::ConfigLoader;
//! use bale_test::TestRunner;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let root = std::env::current_dir()?;
//! let config = ConfigLoader::new(&root).load()?;
//! let report = TestRunner::new(config, root).run().await?;
//! println!("{} passed, {} failed", report.summary.passed, report.summary.failed);
//! # Ok(()) }
//! ```

pub mod coverage;
pub mod discovery;
pub mod executor;
pub mod report;
pub mod runner;
pub mod state;
pub mod tap;

use std::path::PathBuf;

use bale_config::ConfigError;

pub use coverage::{
    CoverageMap, CoveragePhase, CoverageProvider, CoverageScope, FileCoverage, FileSummary,
    Metric, MetricKind, ThresholdFailure, V8Provider,
};
pub use discovery::FileMatcher;
pub use executor::{FileJob, NodeExecutor, ProcessOutput, TestExecutor};
pub use report::{CoverageReporter, ReportContext, ReportOutput};
pub use runner::{CoverageOutcome, RunReport, TestRunner};
pub use state::{FileReport, FileState, TestCase, TestStatus, TestSummary};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid glob '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    #[error("could not scan '{}': {message}", path.display())]
    Discovery { path: PathBuf, message: String },

    #[error("no test files matched {patterns}")]
    NoTestFiles { patterns: String },

    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not read coverage from '{}': {message}", path.display())]
    CoverageRead { path: PathBuf, message: String },

    #[error("could not write report '{}': {source}", path.display())]
    WriteReport {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Clearing this directory would delete the project.
    #[error("refusing to clear reports directory '{}'", .0.display())]
    UnsafeReportsDir(PathBuf),

    #[error("report failed: {0}")]
    Report(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("test task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn hint(&self) -> Option<String> {
        match self {
            Error::Config(e) => e.hint(),
            Error::InvalidGlob { .. } => {
                Some("Check the pattern syntax in `test.include` and `test.coverage`".into())
            }
            Error::NoTestFiles { .. } => Some(
                "Adjust `test.include` or set `test.pass_with_no_tests = true`".into(),
            ),
            Error::Spawn { program, .. } => Some(format!(
                "Install Node.js 22.6 or newer, or point `test.node` at it (tried '{program}')"
            )),
            Error::UnsafeReportsDir(_) => {
                Some("Point `test.coverage.reports_dir` at a dedicated directory".into())
            }
            _ => None,
        }
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::Config(_) => "bale::config",
            Error::InvalidGlob { .. } => "bale::test::glob",
            Error::Discovery { .. } | Error::NoTestFiles { .. } => "bale::test::discovery",
            Error::Spawn { .. } => "bale::test::spawn",
            Error::CoverageRead { .. } => "bale::test::coverage",
            Error::WriteReport { .. } | Error::UnsafeReportsDir(_) | Error::Report(_) => {
                "bale::test::report"
            }
            Error::Io(_) => "bale::io",
            Error::Task(_) => "bale::internal",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        self.hint()
            .map(|hint| Box::new(hint) as Box<dyn std::fmt::Display>)
    }
}

pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u128(duration.as_millis())
    }
}
