//! Coverage collection, aggregation and threshold checks.

mod model;
mod source;
mod thresholds;
mod untested;
mod v8;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::Result;
use crate::discovery::{FileMatcher, display_path};

pub use model::{
    BranchCoverage, CoverageMap, FileCoverage, FileSummary, FunctionCoverage, Metric, MetricKind,
};
pub use source::{ExecutableLine, SourceText};
pub use thresholds::{ThresholdFailure, check_thresholds};
pub use untested::zero_coverage;
pub use v8::V8Provider;

/// Turns raw per-process coverage into a [`CoverageMap`].
pub trait CoverageProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Merge the raw output of every test process.
    ///
    /// Unreadable or malformed output is an error; a missing directory is
    /// not, since a killed process writes nothing.
    fn collect(&self, raw_dirs: &[PathBuf], scope: &CoverageScope) -> Result<CoverageMap>;

    /// Coverage for a file that no test loaded.
    fn untested(&self, path: &Path, source: &SourceText) -> FileCoverage;
}

/// Which files coverage is reported for.
#[derive(Debug, Clone)]
pub struct CoverageScope {
    root: PathBuf,
    matcher: FileMatcher,
}

impl CoverageScope {
    pub fn new(root: &Path, matcher: FileMatcher) -> Self {
        Self {
            root: root.to_path_buf(),
            matcher,
        }
    }

    /// Root-relative display path when `path` is in scope.
    pub fn display(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        if relative.components().any(|c| c.as_os_str() == "node_modules") {
            return None;
        }
        self.matcher
            .is_match(relative)
            .then(|| display_path(&self.root, path))
    }

    /// Every in-scope file on disk.
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        self.matcher.walk(&self.root)
    }
}

/// Add zero-coverage entries for in-scope files that never ran.
pub fn include_untested(
    provider: &dyn CoverageProvider,
    scope: &CoverageScope,
    map: &mut CoverageMap,
) -> Result<usize> {
    let mut added = 0;
    for path in scope.files()? {
        let Some(display) = scope.display(&path) else {
            continue;
        };
        if map.contains(&display) || !is_script(&path) {
            continue;
        }
        let text = fs::read_to_string(&path)?;
        let source = SourceText::new(text);
        map.add(display, provider.untested(&path, &source));
        added += 1;
    }
    debug!(files = added, "added untested files");
    Ok(added)
}

fn is_script(path: &Path) -> bool {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    if name.ends_with(".d.ts") || name.ends_with(".d.mts") || name.ends_with(".d.cts") {
        return false;
    }
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("ts" | "tsx" | "mts" | "cts" | "js" | "jsx" | "mjs" | "cjs")
    )
}

/// Where the coverage pass of a run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoveragePhase {
    Collecting,
    Aggregating,
    Reporting,
    ThresholdMet,
    ThresholdFailed,
}

impl CoveragePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, CoveragePhase::ThresholdMet | CoveragePhase::ThresholdFailed)
    }
}

impl fmt::Display for CoveragePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CoveragePhase::Collecting => "collecting",
            CoveragePhase::Aggregating => "aggregating",
            CoveragePhase::Reporting => "reporting",
            CoveragePhase::ThresholdMet => "threshold met",
            CoveragePhase::ThresholdFailed => "threshold failed",
        })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn untested_files_are_added_only_when_missing() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("used.ts"), "export const a = 1;\n").unwrap();
        fs::write(src.join("unused.ts"), "export const b = 2;\n").unwrap();
        fs::write(src.join("types.d.ts"), "export type T = 1;\n").unwrap();
        fs::write(src.join("data.json"), "{}").unwrap();

        let scope = CoverageScope::new(
            dir.path(),
            FileMatcher::new(&["src/**".to_string()], &[]).unwrap(),
        );
        let mut map = CoverageMap::default();
        let mut used = FileCoverage::new(src.join("used.ts"));
        used.lines.insert(1, 3);
        map.add("src/used.ts".into(), used);

        let added = include_untested(&V8Provider, &scope, &mut map).unwrap();
        assert_eq!(added, 1);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("src/used.ts").unwrap().lines[&1], 3);
        assert_eq!(map.get("src/unused.ts").unwrap().lines[&1], 0);
    }

    #[test]
    fn scope_rejects_paths_outside_root() {
        let scope = CoverageScope::new(
            Path::new("/p"),
            FileMatcher::new(&["**".to_string()], &[]).unwrap(),
        );
        assert_eq!(scope.display(Path::new("/p/src/a.ts")).as_deref(), Some("src/a.ts"));
        assert!(scope.display(Path::new("/other/a.ts")).is_none());
        assert!(scope.display(Path::new("/p/node_modules/x/a.js")).is_none());
    }
}
