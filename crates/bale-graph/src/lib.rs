//! # bale-graph
//!
//! Module dependency graph of a library entry point.
//!
//! The walker parses every local module reachable from the entry with oxc,
//! resolves each import with `oxc_resolver`, and classifies it as local,
//! external, or an inlined `node_modules` dependency. The bundler uses the
//! graph to validate externals before bundling and the declaration
//! aggregator uses it to order modules.
//!
//! ```no_run
//! use bale_config::BuildConfig;
//! use std::path::Path;
//!
//! let graph = bale_graph::build_graph(&BuildConfig::default(), Path::new("."))?;
//! for id in graph.bfs_order() {
//!     println!("{}", graph.relative_path(id));
//! }
//! # Ok::<(), bale_graph::GraphError>(())
//! ```

mod chain;
mod error;
mod graph;
mod imports;
mod module;
mod resolver;
mod walker;

pub use chain::{DependencyChain, display_relative};
pub use error::GraphError;
pub use graph::{GraphWarning, ModuleGraph};
pub use imports::collect_imports;
pub use module::{
    ImportKind, ImportRecord, Module, ModuleId, ModuleKind, ResolvedImport, is_path_specifier,
    package_name,
};
pub use resolver::{EXTENSIONS, ModuleResolver, Resolution, is_node_builtin};
pub use walker::{GraphOptions, GraphWalker, build_graph};
