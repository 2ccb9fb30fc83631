use std::path::PathBuf;

/// Error that can occur while building the module graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("entry module not found: {0}")]
    EntryNotFound(PathBuf),

    #[error("failed to read '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse '{path}': {}", messages.join("; "))]
    Parse { path: PathBuf, messages: Vec<String> },

    #[error("failed to resolve '{specifier}' from '{importer}': {reason}\n  import chain: {chain}")]
    Unresolved {
        specifier: String,
        importer: PathBuf,
        chain: String,
        reason: String,
    },

    #[error("circular import: {cycle}")]
    Circular { cycle: String },
}

impl GraphError {
    pub fn hint(&self) -> Option<String> {
        match self {
            GraphError::Unresolved { specifier, .. } if !crate::is_path_specifier(specifier) => {
                Some(format!(
                    "Install '{specifier}' or list it under `build.external`"
                ))
            }
            GraphError::Unresolved { .. } => {
                Some("Check the relative path and the file extension".to_string())
            }
            GraphError::Circular { .. } => Some(
                "Break the cycle or set `build.allow_circular = true` to continue with a warning"
                    .to_string(),
            ),
            _ => None,
        }
    }
}
