//! Serializes builds that publish into the same output directory.
//!
//! Builds in this process queue on an in-memory mutex keyed by directory.
//! Builds in other processes are kept out by a lock file created next to the
//! directory with `create_new`.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use once_cell::sync::Lazy;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::{Error, Result};

static DIR_LOCKS: Lazy<DashMap<PathBuf, Arc<Mutex<()>>>> = Lazy::new(DashMap::new);

#[derive(Debug, Clone, Copy)]
pub struct LockOptions {
    /// Give up waiting after this long.
    pub timeout: Duration,
    /// A lock file older than this is left over from a crashed build.
    pub stale_after: Duration,
    pub poll_interval: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            stale_after: Duration::from_secs(600),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Exclusive access to one output directory. Released on drop.
#[derive(Debug)]
pub struct OutputLock {
    dir: PathBuf,
    file: PathBuf,
    guard: Option<OwnedMutexGuard<()>>,
}

impl OutputLock {
    /// Wait for exclusive access to `out_dir`.
    pub async fn acquire(out_dir: &Path, options: LockOptions) -> Result<Self> {
        let file = lock_file_path(out_dir)?;
        let mutex = Arc::clone(
            DIR_LOCKS
                .entry(out_dir.to_path_buf())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );

        let started = tokio::time::Instant::now();
        let guard = tokio::time::timeout(options.timeout, mutex.lock_owned())
            .await
            .map_err(|_| Error::Lock {
                path: out_dir.to_path_buf(),
                message: format!(
                    "timed out after {}s waiting for another build in this process",
                    options.timeout.as_secs()
                ),
            })?;

        let remaining = options.timeout.saturating_sub(started.elapsed());
        if let Err(e) = acquire_file(&file, out_dir, remaining, options).await {
            drop(guard);
            forget_if_idle(out_dir);
            return Err(e);
        }
        debug!(lock = %file.display(), "output directory locked");

        Ok(Self {
            dir: out_dir.to_path_buf(),
            file,
            guard: Some(guard),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file
    }
}

impl Drop for OutputLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.file) {
            if e.kind() != ErrorKind::NotFound {
                warn!(lock = %self.file.display(), error = %e, "failed to remove lock file");
            }
        }
        drop(self.guard.take());
        forget_if_idle(&self.dir);
    }
}

/// Drop the directory's mutex once nothing else holds or waits on it.
fn forget_if_idle(out_dir: &Path) {
    // waiters keep their own clone of the Arc, so only the map's copy is left when idle
    DIR_LOCKS.remove_if(out_dir, |_, mutex| Arc::strong_count(mutex) == 1);
}

/// `<parent>/.<dir>.bale.lock`
fn lock_file_path(out_dir: &Path) -> Result<PathBuf> {
    let (Some(parent), Some(name)) = (out_dir.parent(), out_dir.file_name()) else {
        return Err(Error::InvalidOutputPath(format!(
            "'{}' has no parent directory",
            out_dir.display()
        )));
    };
    Ok(parent.join(format!(".{}.bale.lock", name.to_string_lossy())))
}

async fn acquire_file(
    file: &Path,
    out_dir: &Path,
    timeout: Duration,
    options: LockOptions,
) -> Result<()> {
    let lock_error = |message: String| Error::Lock {
        path: out_dir.to_path_buf(),
        message,
    };

    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)?;
    }

    let deadline = tokio::time::Instant::now() + timeout;
    let mut announced = false;
    loop {
        match OpenOptions::new().write(true).create_new(true).open(file) {
            Ok(mut handle) => {
                // informational only; ownership is the file's existence
                let _ = writeln!(handle, "{}", std::process::id());
                return Ok(());
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if is_stale(file, options.stale_after) {
                    warn!(lock = %file.display(), "removing stale lock file");
                    let _ = fs::remove_file(file);
                    continue;
                }
                if tokio::time::Instant::now() >= deadline {
                    return Err(lock_error(format!(
                        "lock file '{}' is held by another build",
                        file.display()
                    )));
                }
                if !announced {
                    info!(lock = %file.display(), "waiting for another build to finish");
                    announced = true;
                }
                tokio::time::sleep(options.poll_interval).await;
            }
            Err(e) => {
                return Err(lock_error(format!(
                    "failed to create '{}': {e}",
                    file.display()
                )));
            }
        }
    }
}

fn is_stale(file: &Path, stale_after: Duration) -> bool {
    fs::metadata(file)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > stale_after)
}
