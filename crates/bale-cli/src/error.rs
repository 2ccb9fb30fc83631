//! CLI error type.
//!
//! Library errors convert into [`CliError`] via `From`. A failed test run and
//! a missed coverage threshold are errors too, so every unsuccessful command
//! exits non-zero.

mod diagnostic;

use std::path::PathBuf;

use bale_config::ConfigError;
use bale_test::ThresholdFailure;
use thiserror::Error;

pub use diagnostic::cli_error_to_miette;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] bale_bundler::Error),

    #[error(transparent)]
    Test(#[from] bale_test::Error),

    /// At least one test file failed.
    #[error("{failed} of {files} test files failed")]
    TestsFailed { failed: usize, files: usize },

    #[error("coverage thresholds not met:\n{}", format_failures(.0))]
    ThresholdFailed(Vec<ThresholdFailure>),

    #[error("working directory not found: {}", .0.display())]
    CwdNotFound(PathBuf),

    #[error("could not render configuration: {0}")]
    Render(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

impl CliError {
    pub fn hint(&self) -> Option<String> {
        match self {
            CliError::Config(e) => e.hint(),
            CliError::Build(e) => e.hint(),
            CliError::Test(e) => e.hint(),
            CliError::TestsFailed { .. } => {
                Some("Failing tests are listed above; rerun with --verbose for node output".into())
            }
            CliError::ThresholdFailed(_) => Some(
                "Add tests for the uncovered lines or lower `test.coverage.thresholds`".into(),
            ),
            CliError::CwdNotFound(_) => Some("Pass an existing directory to --cwd".into()),
            _ => None,
        }
    }
}

fn format_failures(failures: &[ThresholdFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("  {f}"))
        .collect::<Vec<_>>()
        .join("\n")
}
