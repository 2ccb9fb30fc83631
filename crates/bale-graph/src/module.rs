//! Modules and the import records that connect them.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Index of a module inside its [`ModuleGraph`](crate::ModuleGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ModuleId(pub usize);

impl ModuleId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What kind of source a module is, decided by its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModuleKind {
    TypeScript,
    /// `.d.ts`, `.d.mts`, `.d.cts`
    Declaration,
    JavaScript,
    Json,
    Other,
}

impl ModuleKind {
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        if name.ends_with(".d.ts") || name.ends_with(".d.mts") || name.ends_with(".d.cts") {
            return ModuleKind::Declaration;
        }

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("ts" | "tsx" | "mts" | "cts") => ModuleKind::TypeScript,
            Some("js" | "jsx" | "mjs" | "cjs") => ModuleKind::JavaScript,
            Some("json") => ModuleKind::Json,
            _ => ModuleKind::Other,
        }
    }

    /// Whether imports can be collected from this kind of module.
    pub fn is_script(self) -> bool {
        matches!(
            self,
            ModuleKind::TypeScript | ModuleKind::Declaration | ModuleKind::JavaScript
        )
    }

    /// Whether the module contributes types to the declaration bundle.
    pub fn has_types(self) -> bool {
        matches!(self, ModuleKind::TypeScript | ModuleKind::Declaration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportKind {
    /// `import ... from "x"` and side-effect imports
    Static,
    /// `export ... from "x"`
    ReExport,
    /// `import("x")`
    Dynamic,
    /// `require("x")`
    Require,
}

impl ImportKind {
    /// Whether an edge of this kind takes part in cycle detection.
    pub fn is_eager(self) -> bool {
        !matches!(self, ImportKind::Dynamic)
    }
}

/// Where an import specifier ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ResolvedImport {
    /// A project source file.
    Local(ModuleId),
    /// Left out of the bundle: configured external or a node built-in.
    External { package: String },
    /// A bare dependency that resolved into `node_modules` and gets bundled.
    Inlined { package: String, path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRecord {
    pub specifier: String,
    pub kind: ImportKind,
    /// `import type`, `export type`, or every named specifier is a type.
    pub type_only: bool,
    /// Byte offset of the specifier in the importer.
    pub offset: u32,
    /// Filled in by the walker.
    pub resolved: Option<ResolvedImport>,
}

impl ImportRecord {
    pub fn new(specifier: impl Into<String>, kind: ImportKind, type_only: bool, offset: u32) -> Self {
        Self {
            specifier: specifier.into(),
            kind,
            type_only,
            offset,
            resolved: None,
        }
    }

    pub fn local(&self) -> Option<ModuleId> {
        match self.resolved {
            Some(ResolvedImport::Local(id)) => Some(id),
            _ => None,
        }
    }

    /// Whether the specifier is a relative or absolute path rather than a package.
    pub fn is_relative(&self) -> bool {
        is_path_specifier(&self.specifier)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Module {
    pub id: ModuleId,
    pub path: PathBuf,
    pub kind: ModuleKind,
    #[serde(skip)]
    pub source: String,
    pub imports: Vec<ImportRecord>,
}

impl Module {
    /// Local modules this one depends on, in source order, without duplicates.
    pub fn local_dependencies(&self) -> Vec<ModuleId> {
        let mut seen = Vec::new();
        for id in self.imports.iter().filter_map(ImportRecord::local) {
            if !seen.contains(&id) {
                seen.push(id);
            }
        }
        seen
    }
}

pub fn is_path_specifier(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
        || specifier.starts_with('/')
}

/// Package name of a bare specifier: `@scope/pkg/sub` gives `@scope/pkg`.
pub fn package_name(specifier: &str) -> &str {
    let mut parts = specifier.splitn(3, '/');
    let first = parts.next().unwrap_or_default();
    if first.starts_with('@') {
        match parts.next() {
            Some(second) => &specifier[..first.len() + 1 + second.len()],
            None => specifier,
        }
    } else {
        first
    }
}
