//! Error types for configuration validation and loading.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    // Filesystem validation errors
    #[error("entry path not found: {0}")]
    EntryNotFound(PathBuf),

    #[error("setup file not found: {0}")]
    SetupFileNotFound(PathBuf),

    #[error("tsconfig not found: {0}")]
    TsconfigNotFound(PathBuf),

    #[error("refusing to empty output directory {out_dir}: {reason}")]
    UnsafeOutDir { out_dir: PathBuf, reason: String },

    // Config parsing/loading errors
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid config value for `{field}`: {message}")]
    InvalidValue { field: String, message: String },

    // Schema validation errors (no filesystem checks)
    #[error("no output formats specified")]
    NoFormats,

    #[error("UMD output requires a library name")]
    MissingLibraryName,

    #[error("UMD output requires a global name for external `{external}`")]
    MissingGlobal { external: String },

    #[error("schema validation failed: {}", .0.join("; "))]
    SchemaValidation(Vec<String>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// A short remediation hint for the user, when one applies.
    pub fn hint(&self) -> Option<String> {
        match self {
            ConfigError::EntryNotFound(_) => {
                Some("Set `build.entry` to an existing file, relative to the project root".into())
            }
            ConfigError::SetupFileNotFound(_) => {
                Some("Remove the path from `test.setup_files` or create the file".into())
            }
            ConfigError::TsconfigNotFound(_) => {
                Some("Fix `build.tsconfig` or remove it to use ./tsconfig.json".into())
            }
            ConfigError::UnsafeOutDir { .. } => Some(
                "Point `build.out_dir` at a dedicated directory such as `dist`, or set `build.empty_out_dir = false`"
                    .into(),
            ),
            ConfigError::NoFormats => {
                Some("Add at least one of \"es\", \"cjs\" or \"umd\" to `build.formats`".into())
            }
            ConfigError::MissingLibraryName => {
                Some("Set `build.name` to the global variable the UMD bundle should define".into())
            }
            ConfigError::MissingGlobal { external } => Some(format!(
                "Add `{external} = \"...\"` under [build.globals] so the UMD bundle can find it at runtime"
            )),
            ConfigError::SchemaValidation(_) | ConfigError::Parse { .. } => {
                Some("Run `bale config schema` to see every accepted option".into())
            }
            _ => None,
        }
    }
}
