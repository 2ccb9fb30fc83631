//! Depth-first graph walker.
//!
//! The walk keeps the current import chain on an explicit stack so a
//! resolution failure can name how the failing module was reached. Cycles are
//! looked for afterwards, over runtime edges only.

use std::fs;
use std::path::{Path, PathBuf};

use bale_config::{BuildConfig, Platform};
use path_clean::PathClean;
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::chain::{DependencyChain, display_relative};
use crate::error::GraphError;
use crate::graph::{GraphWarning, ModuleGraph};
use crate::imports::collect_imports;
use crate::module::{Module, ModuleId, ModuleKind, ResolvedImport};
use crate::resolver::{ModuleResolver, Resolution};

/// Inputs for one walk.
#[derive(Debug, Clone)]
pub struct GraphOptions {
    pub root: PathBuf,
    pub entry: PathBuf,
    pub external: Vec<String>,
    pub platform: Platform,
    pub allow_circular: bool,
}

impl GraphOptions {
    pub fn from_config(build: &BuildConfig, root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            entry: build.entry_path(root),
            external: build.external.clone(),
            platform: build.platform,
            allow_circular: build.allow_circular,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    New,
    OnStack,
    Done,
}

struct Frame {
    id: ModuleId,
    next_import: usize,
}

pub struct GraphWalker {
    options: GraphOptions,
    resolver: ModuleResolver,
}

impl GraphWalker {
    pub fn new(options: GraphOptions) -> Self {
        let resolver = ModuleResolver::new(options.platform, options.external.clone());
        Self { options, resolver }
    }

    /// Walk every module reachable from the entry.
    ///
    /// Files are read synchronously; async callers should run this on a
    /// blocking thread.
    pub fn walk(&self) -> Result<ModuleGraph, GraphError> {
        let root = canonical(&self.options.root);
        let entry_path = self.options.entry.clean();
        if !entry_path.is_file() {
            return Err(GraphError::EntryNotFound(entry_path));
        }
        let entry_path = canonical(&entry_path);

        let mut graph = ModuleGraph {
            root,
            entry: ModuleId(0),
            modules: Vec::new(),
            by_path: FxHashMap::default(),
            warnings: Vec::new(),
        };

        let entry = load(&mut graph, entry_path)?;
        let mut stack = vec![Frame {
            id: entry,
            next_import: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let id = frame.id;
            let index = frame.next_import;
            if index >= graph.modules[id.0].imports.len() {
                stack.pop();
                continue;
            }
            frame.next_import += 1;

            let importer = graph.modules[id.0].path.clone();
            let record = graph.modules[id.0].imports[index].clone();
            trace!(specifier = %record.specifier, importer = %importer.display(), "resolving");

            let resolution = match self.resolver.resolve(&record.specifier, &importer) {
                Ok(resolution) => resolution,
                // types from a package without runtime code, e.g. @types/*
                Err(_) if record.type_only && !record.is_relative() => Resolution::External {
                    package: crate::package_name(&record.specifier).to_string(),
                },
                Err(reason) => {
                    let chain = stack
                        .iter()
                        .map(|f| graph.modules[f.id.0].path.clone())
                        .collect();
                    return Err(GraphError::Unresolved {
                        specifier: record.specifier,
                        importer,
                        chain: DependencyChain::new(chain).format_chain(&graph.root),
                        reason,
                    });
                }
            };

            let resolved = match resolution {
                Resolution::External { package } => ResolvedImport::External { package },
                Resolution::Inlined { package, path } => {
                    if !record.type_only {
                        let warning = GraphWarning::InlinedDependency {
                            package: package.clone(),
                            importer: PathBuf::from(display_relative(&graph.root, &importer)),
                        };
                        if !graph.warnings.contains(&warning) {
                            warn!("{warning}");
                            graph.warnings.push(warning);
                        }
                    }
                    ResolvedImport::Inlined { package, path }
                }
                Resolution::Local(path) => {
                    let path = canonical(&path);
                    let child = match graph.by_path.get(&path) {
                        Some(&existing) => existing,
                        None => {
                            let child = load(&mut graph, path)?;
                            stack.push(Frame {
                                id: child,
                                next_import: 0,
                            });
                            child
                        }
                    };
                    ResolvedImport::Local(child)
                }
            };

            graph.modules[id.0].imports[index].resolved = Some(resolved);
        }

        for cycle in find_cycles(&graph) {
            if !self.options.allow_circular {
                return Err(GraphError::Circular { cycle });
            }
            let warning = GraphWarning::CircularImport { cycle };
            warn!("{warning}");
            graph.warnings.push(warning);
        }

        debug!(
            modules = graph.modules.len(),
            externals = graph.external_specifiers().len(),
            "module graph built"
        );
        Ok(graph)
    }
}

/// Read and parse a module, then add it to the graph.
fn load(graph: &mut ModuleGraph, path: PathBuf) -> Result<ModuleId, GraphError> {
    let kind = ModuleKind::from_path(&path);
    let source = if kind.is_script() || kind == ModuleKind::Json {
        fs::read_to_string(&path).map_err(|source| GraphError::ReadFile {
            path: path.clone(),
            source,
        })?
    } else {
        String::new()
    };
    let imports = collect_imports(&path, &source, kind)?;

    let id = ModuleId(graph.modules.len());
    trace!(module = %path.display(), imports = imports.len(), "loaded");
    graph.by_path.insert(path.clone(), id);
    graph.modules.push(Module {
        id,
        path,
        kind,
        source,
        imports,
    });
    Ok(id)
}

/// Cycles through runtime edges only. Type-only and dynamic imports never
/// form a cycle at load time.
fn find_cycles(graph: &ModuleGraph) -> Vec<String> {
    let eager_deps = |id: ModuleId| -> Vec<ModuleId> {
        let mut deps = Vec::new();
        for record in &graph.modules[id.0].imports {
            if record.type_only || !record.kind.is_eager() {
                continue;
            }
            if let Some(dep) = record.local() {
                if !deps.contains(&dep) {
                    deps.push(dep);
                }
            }
        }
        deps
    };

    let mut cycles = Vec::new();
    let mut state = vec![VisitState::New; graph.modules.len()];
    let mut stack: Vec<(ModuleId, Vec<ModuleId>, usize)> = Vec::new();

    state[graph.entry.0] = VisitState::OnStack;
    stack.push((graph.entry, eager_deps(graph.entry), 0));

    while let Some((id, deps, next)) = stack.last_mut() {
        let Some(&dep) = deps.get(*next) else {
            state[id.0] = VisitState::Done;
            stack.pop();
            continue;
        };
        *next += 1;

        match state[dep.0] {
            VisitState::New => {
                state[dep.0] = VisitState::OnStack;
                let deps = eager_deps(dep);
                stack.push((dep, deps, 0));
            }
            VisitState::OnStack => {
                let start = stack.iter().position(|(m, _, _)| *m == dep).unwrap_or(0);
                let mut path: Vec<PathBuf> = stack[start..]
                    .iter()
                    .map(|(m, _, _)| graph.modules[m.0].path.clone())
                    .collect();
                path.push(graph.modules[dep.0].path.clone());
                cycles.push(DependencyChain::new(path).format_chain(&graph.root));
            }
            VisitState::Done => {}
        }
    }

    cycles
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf().clean())
}

/// Walk the graph for a build configuration.
pub fn build_graph(build: &BuildConfig, root: &Path) -> Result<ModuleGraph, GraphError> {
    GraphWalker::new(GraphOptions::from_config(build, root)).walk()
}
