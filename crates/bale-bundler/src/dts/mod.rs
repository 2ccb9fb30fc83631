//! Declaration generation: one `.d.ts` for the whole library.
//!
//! Each reachable TypeScript module goes through isolated declarations, local
//! `.d.ts` files are read as they are, and the results are merged into a
//! single file by [`bundle_declarations`].

mod aggregate;
mod analyze;
mod emit;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::artifact::Artifact;
use crate::stage::{Stage, StageContext, StagePhase};
use crate::{Error, Result};

pub use aggregate::bundle_declarations;
pub use emit::generate_dts;

/// Error raised while generating or merging declarations.
#[derive(Debug, thiserror::Error)]
pub enum DeclarationError {
    #[error("failed to parse declarations of '{path}': {}", messages.join("; "))]
    Parse { path: PathBuf, messages: Vec<String> },

    #[error("cannot generate declarations for '{path}': {}", messages.join("; "))]
    Isolated { path: PathBuf, messages: Vec<String> },

    #[error("'{path}' uses a namespace import or re-export of local module '{specifier}'")]
    NamespaceImport { path: PathBuf, specifier: String },

    #[error("'{path}' uses `export =`, which cannot be merged into an ES module declaration")]
    ExportAssignment { path: PathBuf },

    #[error("'{path}' has a default export that is not a function, class, interface or name")]
    UnsupportedDefault { path: PathBuf },

    #[error("'{path}' has no types but is referenced from the declarations of '{importer}'")]
    UntypedModule { path: PathBuf, importer: PathBuf },

    #[error("entry '{0}' is not a TypeScript module")]
    UntypedEntry(PathBuf),

    #[error("'{path}' imports '{specifier}', which is not part of the module graph")]
    Unresolved { path: PathBuf, specifier: String },

    #[error("'{path}' uses {what}, which is not supported in bundled declarations")]
    Unsupported { path: PathBuf, what: String },

    #[error("'{name}' is not exported by '{path}'")]
    MissingExport { name: String, path: PathBuf },
}

impl DeclarationError {
    /// The module the error points at.
    pub fn path(&self) -> &Path {
        match self {
            DeclarationError::Parse { path, .. }
            | DeclarationError::Isolated { path, .. }
            | DeclarationError::NamespaceImport { path, .. }
            | DeclarationError::ExportAssignment { path }
            | DeclarationError::UnsupportedDefault { path }
            | DeclarationError::UntypedModule { path, .. }
            | DeclarationError::UntypedEntry(path)
            | DeclarationError::Unresolved { path, .. }
            | DeclarationError::Unsupported { path, .. }
            | DeclarationError::MissingExport { path, .. } => path,
        }
    }

    pub fn hint(&self) -> Option<String> {
        match self {
            DeclarationError::Isolated { .. } => Some(
                "Add explicit type annotations to exported functions and constants".to_string(),
            ),
            DeclarationError::NamespaceImport { specifier, .. } => Some(format!(
                "Import the names you need from '{specifier}' instead of the whole namespace"
            )),
            DeclarationError::ExportAssignment { .. } => {
                Some("Replace `export =` with `export default` or named exports".to_string())
            }
            DeclarationError::UntypedModule { .. } => Some(
                "Convert the module to TypeScript or add a .d.ts file next to it".to_string(),
            ),
            DeclarationError::UntypedEntry(_) => {
                Some("Set `build.dts = false` for JavaScript-only libraries".to_string())
            }
            _ => None,
        }
    }
}

/// Emits `<file_name>.d.ts` from the module graph.
pub struct DeclarationStage;

#[async_trait]
impl Stage for DeclarationStage {
    fn name(&self) -> &'static str {
        "declarations"
    }

    fn phase(&self) -> StagePhase {
        StagePhase::Declarations
    }

    async fn run(&self, ctx: &mut StageContext) -> Result<()> {
        if !ctx.config.dts {
            debug!("declaration output disabled");
            return Ok(());
        }

        let graph = Arc::clone(ctx.graph()?);
        let strip_internal = ctx.tsconfig.strip_internal;
        let text =
            tokio::task::spawn_blocking(move || bundle_declarations(&graph, strip_internal))
                .await
                .map_err(|e| Error::Task(e.to_string()))??;

        let file_name = format!("{}.d.ts", ctx.config.file_name);
        debug!(file = %file_name, bytes = text.len(), "declarations generated");
        ctx.artifacts.insert(Artifact::declarations(file_name, text))?;
        Ok(())
    }
}
