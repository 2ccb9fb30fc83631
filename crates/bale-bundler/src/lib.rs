//! # bale-bundler
//!
//! Library builds on top of rolldown: one bundle per output format, a merged
//! `.d.ts`, and an all-or-nothing publish into the output directory.
//!
//! ```no_run
//! use bale_bundler::LibraryBuilder;
//! use bale_config::ConfigLoader;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let root = std::env::current_dir()?;
//! let config = ConfigLoader::new(&root).load()?;
//! let report = LibraryBuilder::new(config, root).build().await?;
//! for artifact in &report.artifacts {
//!     println!("{} ({} bytes)", artifact.file_name, artifact.size);
//! }
//! # Ok(()) }
//! ```

pub mod artifact;
pub mod builder;
pub mod bundle;
pub mod diagnostics;
pub mod dts;
pub mod output;
pub mod stage;

use std::path::PathBuf;

use bale_config::{ConfigError, Format};
use bale_graph::GraphError;

pub use artifact::{Artifact, ArtifactKind, ArtifactSet};
pub use builder::{ArtifactSummary, BuildReport, LibraryBuilder};
pub use bundle::BundleStage;
pub use diagnostics::{DiagnosticKind, DiagnosticSeverity, ExtractedDiagnostic};
pub use dts::{DeclarationError, DeclarationStage, bundle_declarations, generate_dts};
pub use stage::{GraphStage, Stage, StageContext, StagePhase, StageRegistry};

/// Error types for library builds.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Rolldown rejected the build for one format.
    #[error("{format} bundle failed: {}", diagnostics::format_diagnostics(.diagnostics))]
    Bundler {
        format: Format,
        diagnostics: Vec<ExtractedDiagnostic>,
    },

    #[error("external dependency '{package}' was bundled into the {format} output (via {module})")]
    ExternalInlined {
        package: String,
        format: Format,
        module: String,
    },

    #[error("rolldown produced no entry chunk for the {format} output")]
    MissingArtifact { format: Format },

    #[error("two artifacts would be written to '{0}'")]
    DuplicateArtifact(String),

    #[error(transparent)]
    Declaration(#[from] DeclarationError),

    /// Invalid output path (e.g., directory traversal attempt).
    #[error("invalid output path: {0}")]
    InvalidOutputPath(String),

    #[error("write failure: {0}")]
    WriteFailure(String),

    #[error("could not lock output directory '{path}': {message}")]
    Lock { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A background task panicked or was cancelled.
    #[error("build task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap a rolldown error for one output format.
    pub fn from_rolldown_batch(format: Format, error: &dyn std::fmt::Debug) -> Self {
        Error::Bundler {
            format,
            diagnostics: diagnostics::extract_from_rolldown_error(error),
        }
    }

    pub fn hint(&self) -> Option<String> {
        match self {
            Error::Config(e) => e.hint(),
            Error::Graph(e) => e.hint(),
            Error::Declaration(e) => e.hint(),
            Error::Bundler { diagnostics, .. } => match diagnostics.as_slice() {
                [single] => single.help.clone(),
                _ => None,
            },
            Error::ExternalInlined { package, .. } => Some(format!(
                "Make sure every import of '{package}' uses a specifier covered by `build.external`"
            )),
            Error::InvalidOutputPath(_) => {
                Some("Keep `build.file_name` a plain file name without `..` or separators".into())
            }
            Error::WriteFailure(_) => Some("Check disk space and permissions".into()),
            Error::Lock { .. } => Some(
                "Another bale build is writing to this directory. Wait for it or delete the stale lock file"
                    .into(),
            ),
            _ => None,
        }
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::Config(_) => "bale::config",
            Error::Graph(GraphError::Unresolved { .. }) => "bale::unresolved_import",
            Error::Graph(GraphError::Circular { .. }) => "bale::circular_import",
            Error::Graph(_) => "bale::graph",
            Error::Bundler { .. } => "bale::bundler",
            Error::ExternalInlined { .. } => "bale::external_inlined",
            Error::MissingArtifact { .. } | Error::DuplicateArtifact(_) => "bale::artifact",
            Error::Declaration(_) => "bale::declarations",
            Error::InvalidOutputPath(_) => "bale::invalid_output_path",
            Error::WriteFailure(_) | Error::Io(_) => "bale::io",
            Error::Lock { .. } => "bale::lock",
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
