//! Import chains, used to explain resolution failures and cycles.

use std::path::{Path, PathBuf};

/// A path through the graph, from the entry (or the start of a cycle) onward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyChain {
    pub path: Vec<PathBuf>,
}

impl DependencyChain {
    pub fn new(path: Vec<PathBuf>) -> Self {
        Self { path }
    }

    pub fn depth(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// Format the chain relative to `root`.
    ///
    /// Example: "src/index.ts -> src/schemas.ts -> src/util.ts"
    pub fn format_chain(&self, root: &Path) -> String {
        self.path
            .iter()
            .map(|p| display_relative(root, p))
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// `path` relative to `root` with forward slashes, or as-is outside it.
pub fn display_relative(root: &Path, path: &Path) -> String {
    let shown = path.strip_prefix(root).unwrap_or(path);
    shown.to_string_lossy().replace('\\', "/")
}
