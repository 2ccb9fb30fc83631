//! Analysis of one module's declaration text.
//!
//! Everything the aggregator needs is copied out of the AST here, so the
//! allocator can be dropped before the next module is parsed.

use std::path::PathBuf;

use bale_graph::{Module, ModuleGraph, ModuleId, ResolvedImport};
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Declaration, ExportDefaultDeclarationKind, ImportDeclarationSpecifier, ModuleExportName,
    Statement, TSModuleDeclarationName,
};
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::{GetSpan, SourceType, Span};
use rustc_hash::FxHashMap;

use super::DeclarationError;

/// Local name given to an anonymous `export default` declaration.
pub(crate) const DEFAULT_NAME: &str = "_default";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum Imported {
    Named(String),
    Default,
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Source {
    Local(ModuleId),
    External(String),
}

#[derive(Debug, Clone)]
pub(crate) struct ImportBinding {
    pub local: String,
    pub source: Source,
    pub imported: Imported,
}

#[derive(Debug, Clone)]
pub(crate) enum ExportTarget {
    /// A root binding of this module: a declaration or an import.
    Binding(String),
    /// `export { name } from "./local"`
    Module { module: ModuleId, name: String },
    /// `export { name } from "pkg"`, `export * as ns from "pkg"`
    External { source: String, imported: Imported },
}

/// A top-level statement kept in the bundle.
#[derive(Debug, Clone)]
pub(crate) struct KeptStatement {
    pub span: Span,
    /// JSDoc block directly above the statement.
    pub doc: Option<Span>,
    pub needs_declare: bool,
    /// Where an anonymous default declaration receives its name.
    pub insert_default_name: Option<u32>,
}

#[derive(Debug)]
pub(crate) struct DeclModule {
    pub id: ModuleId,
    pub path: PathBuf,
    pub code: String,
    pub statements: Vec<KeptStatement>,
    /// Declared root names, in source order.
    pub declared: Vec<String>,
    pub imports: Vec<ImportBinding>,
    pub exports: Vec<(String, ExportTarget)>,
    pub local_stars: Vec<ModuleId>,
    pub external_stars: Vec<String>,
    /// Every identifier span that names a root binding: declarations and references.
    pub occurrences: FxHashMap<String, Vec<Span>>,
    /// Names used but never declared, i.e. globals.
    pub globals: Vec<String>,
}

impl DeclModule {
    pub fn import(&self, local: &str) -> Option<&ImportBinding> {
        self.imports.iter().find(|i| i.local == local)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.declared.iter().any(|d| d == name)
    }

    /// Local modules this module's declarations depend on.
    pub fn local_dependencies(&self) -> Vec<ModuleId> {
        let mut deps = Vec::new();
        let from_imports = self.imports.iter().filter_map(|i| match i.source {
            Source::Local(id) => Some(id),
            Source::External(_) => None,
        });
        let from_exports = self.exports.iter().filter_map(|(_, t)| match t {
            ExportTarget::Module { module, .. } => Some(*module),
            _ => None,
        });
        for id in from_imports
            .chain(from_exports)
            .chain(self.local_stars.iter().copied())
        {
            if !deps.contains(&id) {
                deps.push(id);
            }
        }
        deps
    }
}

/// Parse declaration text and extract its bindings, imports and exports.
pub(crate) fn analyze(
    graph: &ModuleGraph,
    module: &Module,
    code: String,
) -> Result<DeclModule, DeclarationError> {
    let mut analyzed = collect(graph, module, &code)?;
    analyzed.code = code;
    Ok(analyzed)
}

fn collect(
    graph: &ModuleGraph,
    module: &Module,
    code: &str,
) -> Result<DeclModule, DeclarationError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, SourceType::d_ts()).parse();
    if ret.panicked || !ret.errors.is_empty() {
        return Err(DeclarationError::Parse {
            path: module.path.clone(),
            messages: ret.errors.iter().map(|e| e.to_string()).collect(),
        });
    }
    let program = &ret.program;

    let mut out = DeclModule {
        id: module.id,
        path: module.path.clone(),
        code: String::new(),
        statements: Vec::new(),
        declared: Vec::new(),
        imports: Vec::new(),
        exports: Vec::new(),
        local_stars: Vec::new(),
        external_stars: Vec::new(),
        occurrences: FxHashMap::default(),
        globals: Vec::new(),
    };
    let resolve = |specifier: &str| resolve_source(graph, module, specifier);
    let mut bindings: Vec<(String, Span)> = Vec::new();
    let mut previous_end = 0u32;

    for stmt in &program.body {
        let doc = doc_comment(code, previous_end, stmt.span().start);
        previous_end = stmt.span().end;

        match stmt {
            Statement::ImportDeclaration(decl) => {
                // side-effect imports carry no types
                let Some(specifiers) = &decl.specifiers else {
                    continue;
                };
                let source = resolve(decl.source.value.as_str())?;
                for spec in specifiers {
                    let (local, imported) = match spec {
                        ImportDeclarationSpecifier::ImportSpecifier(s) => (
                            s.local.name.to_string(),
                            Imported::Named(s.imported.name().to_string()),
                        ),
                        ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                            (s.local.name.to_string(), Imported::Default)
                        }
                        ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                            if matches!(source, Source::Local(_)) {
                                return Err(DeclarationError::NamespaceImport {
                                    path: module.path.clone(),
                                    specifier: decl.source.value.to_string(),
                                });
                            }
                            (s.local.name.to_string(), Imported::Namespace)
                        }
                    };
                    out.imports.push(ImportBinding {
                        local,
                        source: source.clone(),
                        imported,
                    });
                }
            }
            Statement::ExportNamedDeclaration(decl) => {
                if let Some(declaration) = &decl.declaration {
                    let names = declaration_names(declaration);
                    for (name, _) in &names {
                        out.exports
                            .push((name.clone(), ExportTarget::Binding(name.clone())));
                    }
                    bindings.extend(names);
                    out.statements.push(KeptStatement {
                        span: declaration.span(),
                        doc,
                        needs_declare: needs_declare(declaration),
                        insert_default_name: None,
                    });
                    continue;
                }

                let source = match &decl.source {
                    Some(src) => Some(resolve(src.value.as_str())?),
                    None => None,
                };
                for spec in &decl.specifiers {
                    let exported = spec.exported.name().to_string();
                    let local = export_local_name(&spec.local);
                    let target = match &source {
                        None => ExportTarget::Binding(local),
                        Some(Source::Local(module)) => ExportTarget::Module {
                            module: *module,
                            name: local,
                        },
                        Some(Source::External(source)) => ExportTarget::External {
                            source: source.clone(),
                            imported: if local == "default" {
                                Imported::Default
                            } else {
                                Imported::Named(local)
                            },
                        },
                    };
                    out.exports.push((exported, target));
                }
            }
            Statement::ExportAllDeclaration(decl) => {
                let source = resolve(decl.source.value.as_str())?;
                match (&decl.exported, source) {
                    (Some(_), Source::Local(_)) => {
                        return Err(DeclarationError::NamespaceImport {
                            path: module.path.clone(),
                            specifier: decl.source.value.to_string(),
                        });
                    }
                    (Some(exported), Source::External(source)) => out.exports.push((
                        exported.name().to_string(),
                        ExportTarget::External {
                            source,
                            imported: Imported::Namespace,
                        },
                    )),
                    (None, Source::Local(id)) => out.local_stars.push(id),
                    (None, Source::External(source)) => {
                        if !out.external_stars.contains(&source) {
                            out.external_stars.push(source);
                        }
                    }
                }
            }
            Statement::ExportDefaultDeclaration(decl) => {
                let span = decl.declaration.span();
                let (local, insert, needs_declare) = match &decl.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(func) => match &func.id {
                        Some(id) => (id.name.to_string(), None, true),
                        None => (
                            DEFAULT_NAME.to_string(),
                            keyword_end(code, span, "function"),
                            true,
                        ),
                    },
                    ExportDefaultDeclarationKind::ClassDeclaration(class) => match &class.id {
                        Some(id) => (id.name.to_string(), None, true),
                        None => (
                            DEFAULT_NAME.to_string(),
                            keyword_end(code, span, "class"),
                            true,
                        ),
                    },
                    ExportDefaultDeclarationKind::TSInterfaceDeclaration(iface) => {
                        (iface.id.name.to_string(), None, false)
                    }
                    ExportDefaultDeclarationKind::Identifier(ident) => {
                        out.exports.push((
                            "default".to_string(),
                            ExportTarget::Binding(ident.name.to_string()),
                        ));
                        continue;
                    }
                    _ => {
                        return Err(DeclarationError::UnsupportedDefault {
                            path: module.path.clone(),
                        });
                    }
                };

                let binding_span = match &decl.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(f) => {
                        f.id.as_ref().map(|id| id.span)
                    }
                    ExportDefaultDeclarationKind::ClassDeclaration(c) => {
                        c.id.as_ref().map(|id| id.span)
                    }
                    ExportDefaultDeclarationKind::TSInterfaceDeclaration(i) => Some(i.id.span),
                    _ => None,
                };
                if let Some(binding_span) = binding_span {
                    bindings.push((local.clone(), binding_span));
                } else if !out.declares(&local) {
                    out.declared.push(local.clone());
                }
                out.exports
                    .push(("default".to_string(), ExportTarget::Binding(local)));
                out.statements.push(KeptStatement {
                    span,
                    doc,
                    needs_declare,
                    insert_default_name: insert,
                });
            }
            Statement::TSExportAssignment(_) => {
                return Err(DeclarationError::ExportAssignment {
                    path: module.path.clone(),
                });
            }
            Statement::TSImportEqualsDeclaration(_) => {
                return Err(DeclarationError::Unsupported {
                    path: module.path.clone(),
                    what: "`import x = require(...)`".to_string(),
                });
            }
            // `export as namespace X` only matters for script consumers
            Statement::TSNamespaceExportDeclaration(_) => {}
            other => {
                if let Some(declaration) = other.as_declaration() {
                    bindings.extend(declaration_names(declaration));
                    out.statements.push(KeptStatement {
                        span: declaration.span(),
                        doc,
                        needs_declare: needs_declare(declaration),
                        insert_default_name: None,
                    });
                } else if !matches!(other, Statement::EmptyStatement(_)) {
                    out.statements.push(KeptStatement {
                        span: other.span(),
                        doc,
                        needs_declare: false,
                        insert_default_name: None,
                    });
                }
            }
        }
    }

    for (name, span) in &bindings {
        if !out.declares(name) {
            out.declared.push(name.clone());
        }
        out.occurrences.entry(name.clone()).or_default().push(*span);
    }

    let semantic = SemanticBuilder::new().build(program).semantic;
    let scoping = semantic.scoping();
    let root_names: Vec<String> = out
        .declared
        .iter()
        .chain(out.imports.iter().map(|i| &i.local))
        .cloned()
        .collect();
    for name in root_names {
        let Some(symbol) = scoping.get_root_binding(&name) else {
            continue;
        };
        let spans = out.occurrences.entry(name).or_default();
        for &reference_id in scoping.get_resolved_reference_ids(symbol) {
            let node_id = scoping.get_reference(reference_id).node_id();
            spans.push(semantic.nodes().get_node(node_id).kind().span());
        }
    }
    for spans in out.occurrences.values_mut() {
        spans.sort_by_key(|s| s.start);
        spans.dedup();
    }

    let mut globals: Vec<String> = scoping
        .root_unresolved_references()
        .keys()
        .map(|name| name.to_string())
        .collect();
    globals.sort();
    out.globals = globals;

    Ok(out)
}

fn resolve_source(
    graph: &ModuleGraph,
    module: &Module,
    specifier: &str,
) -> Result<Source, DeclarationError> {
    let record = module.imports.iter().find(|r| r.specifier == specifier);
    match record.and_then(|r| r.resolved.as_ref()) {
        Some(ResolvedImport::Local(id)) => {
            let target = graph.module(*id);
            if !target.kind.has_types() {
                return Err(DeclarationError::UntypedModule {
                    path: target.path.clone(),
                    importer: module.path.clone(),
                });
            }
            Ok(Source::Local(*id))
        }
        Some(ResolvedImport::External { .. } | ResolvedImport::Inlined { .. }) => {
            Ok(Source::External(specifier.to_string()))
        }
        None if !bale_graph::is_path_specifier(specifier) => {
            Ok(Source::External(specifier.to_string()))
        }
        None => Err(DeclarationError::Unresolved {
            path: module.path.clone(),
            specifier: specifier.to_string(),
        }),
    }
}

fn declaration_names(declaration: &Declaration<'_>) -> Vec<(String, Span)> {
    match declaration {
        Declaration::VariableDeclaration(var) => var
            .declarations
            .iter()
            .filter_map(|d| d.id.get_binding_identifier())
            .map(|id| (id.name.to_string(), id.span))
            .collect(),
        Declaration::FunctionDeclaration(func) => func
            .id
            .iter()
            .map(|id| (id.name.to_string(), id.span))
            .collect(),
        Declaration::ClassDeclaration(class) => class
            .id
            .iter()
            .map(|id| (id.name.to_string(), id.span))
            .collect(),
        Declaration::TSTypeAliasDeclaration(alias) => {
            vec![(alias.id.name.to_string(), alias.id.span)]
        }
        Declaration::TSInterfaceDeclaration(iface) => {
            vec![(iface.id.name.to_string(), iface.id.span)]
        }
        Declaration::TSEnumDeclaration(decl) => vec![(decl.id.name.to_string(), decl.id.span)],
        Declaration::TSModuleDeclaration(decl) => match &decl.id {
            TSModuleDeclarationName::Identifier(id) if id.name.as_str() != "global" => {
                vec![(id.name.to_string(), id.span)]
            }
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Value-space declarations need `declare` once `export` is removed.
fn needs_declare(declaration: &Declaration<'_>) -> bool {
    matches!(
        declaration,
        Declaration::VariableDeclaration(_)
            | Declaration::FunctionDeclaration(_)
            | Declaration::ClassDeclaration(_)
            | Declaration::TSEnumDeclaration(_)
            | Declaration::TSModuleDeclaration(_)
    )
}

fn export_local_name(name: &ModuleExportName<'_>) -> String {
    name.name().to_string()
}

/// Offset just past the first `keyword` inside `span`.
fn keyword_end(code: &str, span: Span, keyword: &str) -> Option<u32> {
    let text = code.get(span.start as usize..span.end as usize)?;
    text.find(keyword)
        .map(|at| span.start + (at + keyword.len()) as u32)
}

/// The `/** ... */` block that ends right before `start`, if any.
fn doc_comment(code: &str, from: u32, start: u32) -> Option<Span> {
    let gap = code.get(from as usize..start as usize)?;
    let open = gap.rfind("/**")?;
    let close = gap[open..].find("*/")? + open + 2;
    if !gap[close..].trim().is_empty() {
        return None;
    }
    Some(Span::new(from + open as u32, from + close as u32))
}
