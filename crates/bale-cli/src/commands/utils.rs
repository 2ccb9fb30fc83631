use std::path::{Path, PathBuf};

use bale_config::{ConfigLoader, LibraryConfig, Overrides};
use tracing::debug;

use crate::cli::GlobalArgs;
use crate::error::{CliError, Result};

/// `--cwd` resolved against the current directory, or the current directory.
pub fn project_root(cwd: Option<&Path>) -> Result<PathBuf> {
    let current = std::env::current_dir()?;
    let root = match cwd {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => current.join(dir),
        None => current,
    };
    if !root.is_dir() {
        return Err(CliError::CwdNotFound(root));
    }
    Ok(root)
}

/// Load the layered configuration with the command's overrides on top.
pub fn load_config(global: &GlobalArgs, overrides: &Overrides) -> Result<(PathBuf, LibraryConfig)> {
    let root = project_root(global.cwd.as_deref())?;
    let mut loader = ConfigLoader::new(&root);
    if let Some(file) = &global.config {
        loader = loader.with_file(file);
    }
    let config = loader.load_with(overrides)?;
    debug!(root = %root.display(), "configuration loaded");
    Ok((root, config))
}
