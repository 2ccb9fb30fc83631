//! Path validation and writing artifacts into a directory.
//!
//! Artifact file names come from configuration (`build.file_name`) and from
//! rolldown, so each one is checked to stay inside the target directory
//! before anything is written.

use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use tracing::trace;

use crate::artifact::ArtifactSet;
use crate::{Error, Result};

/// Make `dir` absolute and free of `.` and `..` components.
pub fn validate_and_normalize_dir(dir: &Path) -> Result<PathBuf> {
    let cleaned = dir.clean();
    if cleaned.is_absolute() {
        return Ok(cleaned);
    }
    let cwd = std::env::current_dir().map_err(|e| {
        Error::InvalidOutputPath(format!("failed to get current directory: {e}"))
    })?;
    Ok(cwd.join(cleaned).clean())
}

/// Join `file_name` onto `base_dir`, refusing anything that escapes it.
pub fn validate_output_path(base_dir: &Path, file_name: &str) -> Result<PathBuf> {
    if file_name.contains('\0') {
        return Err(Error::InvalidOutputPath(
            "file name contains a null byte".to_string(),
        ));
    }
    if file_name.is_empty() {
        return Err(Error::InvalidOutputPath("empty file name".to_string()));
    }

    let full_path = base_dir.join(Path::new(file_name).clean()).clean();
    if !full_path.starts_with(base_dir) || full_path == base_dir {
        return Err(Error::InvalidOutputPath(format!(
            "'{}' escapes output directory '{}' (resolved to '{}')",
            file_name,
            base_dir.display(),
            full_path.display()
        )));
    }
    Ok(full_path)
}

/// Write every artifact under `dir`, which must be a fresh directory.
///
/// Returns the artifact file names in write order.
pub fn write_artifacts(dir: &Path, artifacts: &ArtifactSet) -> Result<Vec<String>> {
    // validate everything before the first write
    let mut targets = Vec::with_capacity(artifacts.len());
    for artifact in artifacts.iter() {
        let path = validate_output_path(dir, &artifact.file_name)?;
        targets.push((path, artifact));
    }

    let mut written = Vec::with_capacity(targets.len());
    for (path, artifact) in targets {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::WriteFailure(format!(
                    "failed to create directory '{}': {e}",
                    parent.display()
                ))
            })?;
        }
        fs::write(&path, &artifact.contents).map_err(|e| {
            Error::WriteFailure(format!("failed to write '{}': {e}", path.display()))
        })?;
        trace!(file = %path.display(), bytes = artifact.size(), "staged");
        written.push(artifact.file_name.clone());
    }
    Ok(written)
}
