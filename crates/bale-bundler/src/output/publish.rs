//! All-or-nothing publication of a build's artifacts.
//!
//! Artifacts are first written into a staging directory created beside the
//! output directory, so the final moves are same-filesystem renames. If any
//! move fails, everything already moved is put back.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::artifact::ArtifactSet;
use crate::output::writer::{validate_and_normalize_dir, write_artifacts};
use crate::{Error, Result};

/// How the output directory is treated on publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    /// The output directory ends up holding exactly this build's artifacts.
    Replace,
    /// Artifacts overwrite same-named files; other files are kept.
    Merge,
}

impl PublishMode {
    pub fn from_empty_out_dir(empty_out_dir: bool) -> Self {
        if empty_out_dir {
            PublishMode::Replace
        } else {
            PublishMode::Merge
        }
    }
}

/// Move `artifacts` into `out_dir`.
///
/// On error the output directory is left as it was before the call.
pub fn publish(out_dir: &Path, artifacts: &ArtifactSet, mode: PublishMode) -> Result<Vec<String>> {
    let out_dir = validate_and_normalize_dir(out_dir)?;
    let parent = out_dir.parent().ok_or_else(|| {
        Error::InvalidOutputPath(format!("'{}' has no parent directory", out_dir.display()))
    })?;
    fs::create_dir_all(parent)?;

    let staging = tempfile::Builder::new()
        .prefix(".bale-stage")
        .tempdir_in(parent)?;
    let written = write_artifacts(staging.path(), artifacts)?;
    debug!(staging = %staging.path().display(), files = written.len(), "artifacts staged");

    match mode {
        PublishMode::Replace => replace_dir(staging, &out_dir, parent)?,
        PublishMode::Merge => merge_into(staging.path(), &out_dir, &written, parent)?,
    }
    Ok(written)
}

fn replace_dir(staging: TempDir, out_dir: &Path, parent: &Path) -> Result<()> {
    if !out_dir.exists() {
        rename(staging.path(), out_dir)?;
        // the TempDir's own cleanup finds nothing left to remove
        return Ok(());
    }

    if !out_dir.is_dir() {
        return Err(Error::WriteFailure(format!(
            "'{}' exists and is not a directory",
            out_dir.display()
        )));
    }

    // keep the previous output until the new one is in place
    let backup = tempfile::Builder::new()
        .prefix(".bale-old")
        .tempdir_in(parent)?;
    let previous = backup.path().join("previous");
    rename(out_dir, &previous)?;

    if let Err(e) = rename(staging.path(), out_dir) {
        if let Err(restore) = fs::rename(&previous, out_dir) {
            warn!(
                backup = %previous.display(),
                error = %restore,
                "failed to restore previous output"
            );
            // leave the backup on disk so nothing is lost
            let _ = backup.keep();
        }
        return Err(e);
    }
    Ok(())
}

fn merge_into(staging: &Path, out_dir: &Path, files: &[String], parent: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)?;
    let backup = tempfile::Builder::new()
        .prefix(".bale-old")
        .tempdir_in(parent)?;

    // (published path, backed-up previous file if there was one)
    let mut moved: Vec<(PathBuf, Option<PathBuf>)> = Vec::with_capacity(files.len());
    for (index, file) in files.iter().enumerate() {
        let target = out_dir.join(file);
        let result = (|| -> Result<()> {
            let saved = if target.is_file() {
                let saved = backup.path().join(index.to_string());
                rename(&target, &saved)?;
                Some(saved)
            } else {
                None
            };
            moved.push((target.clone(), saved));
            if let Some(dir) = target.parent() {
                fs::create_dir_all(dir)?;
            }
            rename(&staging.join(file), &target)
        })();

        if let Err(e) = result {
            roll_back(&moved);
            return Err(e);
        }
    }
    Ok(())
}

fn roll_back(moved: &[(PathBuf, Option<PathBuf>)]) {
    for (target, saved) in moved.iter().rev() {
        let _ = fs::remove_file(target);
        if let Some(saved) = saved {
            if let Err(e) = fs::rename(saved, target) {
                warn!(file = %target.display(), error = %e, "failed to restore file");
            }
        }
    }
}

fn rename(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to).map_err(|e| {
        Error::WriteFailure(format!(
            "failed to move '{}' to '{}': {e}",
            from.display(),
            to.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use bale_config::Format;

    use super::*;
    use crate::artifact::Artifact;

    fn artifacts() -> ArtifactSet {
        let mut set = ArtifactSet::default();
        set.insert(Artifact::bundle(Format::Es, "index.js".into(), "export {};\n".into()))
            .unwrap();
        set.insert(Artifact::declarations("index.d.ts".into(), "export {};\n".into()))
            .unwrap();
        set
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(".bale-"))
            .collect()
    }

    #[test]
    fn replace_removes_stale_files() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("dist");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("old.js"), "stale").unwrap();

        let written = publish(&out, &artifacts(), PublishMode::Replace).unwrap();

        assert_eq!(written.len(), 2);
        assert!(out.join("index.js").exists());
        assert!(out.join("index.d.ts").exists());
        assert!(!out.join("old.js").exists());
        assert!(leftovers(temp.path()).is_empty());
    }

    #[test]
    fn replace_creates_missing_dir() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("nested").join("dist");

        publish(&out, &artifacts(), PublishMode::Replace).unwrap();
        assert!(out.join("index.js").exists());
    }

    #[test]
    fn merge_keeps_unrelated_files() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("dist");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("README.md"), "keep").unwrap();
        fs::write(out.join("index.js"), "old").unwrap();

        publish(&out, &artifacts(), PublishMode::Merge).unwrap();

        assert_eq!(fs::read_to_string(out.join("README.md")).unwrap(), "keep");
        assert_eq!(fs::read_to_string(out.join("index.js")).unwrap(), "export {};\n");
        assert!(leftovers(temp.path()).is_empty());
    }

    #[test]
    fn invalid_artifact_name_leaves_output_untouched() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("dist");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("index.js"), "previous").unwrap();

        let mut set = artifacts();
        set.insert(Artifact::declarations("../escape.d.ts".into(), String::new()))
            .unwrap();

        let err = publish(&out, &set, PublishMode::Replace).unwrap_err();
        assert!(matches!(err, Error::InvalidOutputPath(_)));
        assert_eq!(fs::read_to_string(out.join("index.js")).unwrap(), "previous");
        assert!(!temp.path().join("escape.d.ts").exists());
        assert!(leftovers(temp.path()).is_empty());
    }

    #[test]
    fn merge_rollback_restores_previous_files() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("dist");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("index.js"), "previous").unwrap();

        let staging = temp.path().join("staging");
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("index.js"), "new").unwrap();
        // "missing.js" is not in staging, so its move fails
        let files = vec!["index.js".to_string(), "missing.js".to_string()];

        let err = merge_into(&staging, &out, &files, temp.path()).unwrap_err();
        assert!(matches!(err, Error::WriteFailure(_)));
        assert_eq!(fs::read_to_string(out.join("index.js")).unwrap(), "previous");
        assert!(!out.join("missing.js").exists());
    }
}
