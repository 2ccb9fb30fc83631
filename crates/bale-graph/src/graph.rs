//! The resolved module graph of a library entry.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::chain::display_relative;
use crate::module::{Module, ModuleId, ResolvedImport};

/// Something worth telling the user that does not stop the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphWarning {
    /// A bare dependency is not external and will be copied into the bundle.
    InlinedDependency { package: String, importer: PathBuf },
    /// A cycle was found but `allow_circular` is set.
    CircularImport { cycle: String },
}

impl std::fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphWarning::InlinedDependency { package, importer } => write!(
                f,
                "'{package}' (imported by {}) is not external and will be bundled",
                importer.display()
            ),
            GraphWarning::CircularImport { cycle } => write!(f, "circular import: {cycle}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModuleGraph {
    pub(crate) root: PathBuf,
    pub(crate) entry: ModuleId,
    pub(crate) modules: Vec<Module>,
    pub(crate) by_path: FxHashMap<PathBuf, ModuleId>,
    pub(crate) warnings: Vec<GraphWarning>,
}

impl ModuleGraph {
    /// Project root the graph was walked from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry(&self) -> &Module {
        &self.modules[self.entry.0]
    }

    pub fn entry_id(&self) -> ModuleId {
        self.entry
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0]
    }

    pub fn get(&self, path: &Path) -> Option<&Module> {
        self.by_path.get(path).map(|id| &self.modules[id.0])
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn warnings(&self) -> &[GraphWarning] {
        &self.warnings
    }

    /// Module path relative to the project root, with forward slashes.
    pub fn relative_path(&self, id: ModuleId) -> String {
        display_relative(&self.root, &self.modules[id.0].path)
    }

    /// Modules in breadth-first order from the entry.
    pub fn bfs_order(&self) -> Vec<ModuleId> {
        let mut order = Vec::with_capacity(self.modules.len());
        let mut seen = vec![false; self.modules.len()];
        let mut queue = VecDeque::from([self.entry]);
        seen[self.entry.0] = true;

        while let Some(id) = queue.pop_front() {
            order.push(id);
            for dep in self.modules[id.0].local_dependencies() {
                if !seen[dep.0] {
                    seen[dep.0] = true;
                    queue.push_back(dep);
                }
            }
        }
        order
    }

    /// Every specifier left external, e.g. `zod` and `zod/v4`.
    pub fn external_specifiers(&self) -> BTreeSet<String> {
        self.modules
            .iter()
            .flat_map(|m| &m.imports)
            .filter(|r| matches!(r.resolved, Some(ResolvedImport::External { .. })))
            .map(|r| r.specifier.clone())
            .collect()
    }

    /// External packages imported at runtime, with the specifiers used for each.
    pub fn runtime_externals(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut externals: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for record in self.modules.iter().flat_map(|m| &m.imports) {
            if record.type_only {
                continue;
            }
            if let Some(ResolvedImport::External { package }) = &record.resolved {
                externals
                    .entry(package.clone())
                    .or_default()
                    .insert(record.specifier.clone());
            }
        }
        externals
    }

    /// Bare dependencies that will be copied into the bundle.
    pub fn inlined_packages(&self) -> BTreeSet<String> {
        self.modules
            .iter()
            .flat_map(|m| &m.imports)
            .filter(|r| !r.type_only)
            .filter_map(|r| match &r.resolved {
                Some(ResolvedImport::Inlined { package, .. }) => Some(package.clone()),
                _ => None,
            })
            .collect()
    }
}
