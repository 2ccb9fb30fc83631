//! Merging per-module declarations into a single file.
//!
//! Every module reachable through declaration imports is kept whole. Local
//! imports and re-exports are dissolved into direct references, external
//! imports are hoisted to the top, and top-level names that collide across
//! modules get a `$n` suffix. The entry's export surface becomes one final
//! `export { ... }` list.

use std::collections::{BTreeMap, VecDeque};

use bale_graph::{ModuleGraph, ModuleId, ModuleKind};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use super::DeclarationError;
use super::analyze::{
    DEFAULT_NAME, DeclModule, ExportTarget, Imported, KeptStatement, Source, analyze,
};
use super::emit::generate_dts;

type Result<T> = std::result::Result<T, DeclarationError>;

/// A top-level symbol of the merged file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SymbolKey {
    Local { module: ModuleId, name: String },
    External { source: String, imported: Imported },
}

/// Build the merged declaration text for the graph's entry.
pub fn bundle_declarations(graph: &ModuleGraph, strip_internal: bool) -> Result<String> {
    let (order, modules) = load_modules(graph, strip_internal)?;
    debug!(modules = order.len(), "merging declarations");

    let mut merger = Merger {
        entry: graph.entry_id(),
        order,
        modules,
        names: FxHashMap::default(),
        aliases: FxHashMap::default(),
        taken: FxHashSet::default(),
    };
    merger.render()
}

/// Emit and analyze every module reachable from the entry, breadth first.
fn load_modules(
    graph: &ModuleGraph,
    strip_internal: bool,
) -> Result<(Vec<ModuleId>, FxHashMap<ModuleId, DeclModule>)> {
    let mut order = Vec::new();
    let mut modules = FxHashMap::default();
    let mut seen = FxHashSet::default();
    let mut queue = VecDeque::from([graph.entry_id()]);
    seen.insert(graph.entry_id());

    while let Some(id) = queue.pop_front() {
        let module = graph.module(id);
        let code = match module.kind {
            ModuleKind::TypeScript => generate_dts(&module.source, &module.path, strip_internal)?,
            ModuleKind::Declaration => module.source.clone(),
            _ => return Err(DeclarationError::UntypedEntry(module.path.clone())),
        };
        trace!(module = %graph.relative_path(id), "declarations emitted");

        let decl = analyze(graph, module, code)?;
        for dep in decl.local_dependencies() {
            if seen.insert(dep) {
                queue.push_back(dep);
            }
        }
        order.push(id);
        modules.insert(id, decl);
    }

    Ok((order, modules))
}

struct Merger {
    entry: ModuleId,
    order: Vec<ModuleId>,
    modules: FxHashMap<ModuleId, DeclModule>,
    /// Final name of every symbol in the merged file.
    names: FxHashMap<SymbolKey, String>,
    /// What each module's import bindings point at.
    aliases: FxHashMap<(ModuleId, String), SymbolKey>,
    taken: FxHashSet<String>,
}

impl Merger {
    fn module(&self, id: ModuleId) -> &DeclModule {
        &self.modules[&id]
    }

    fn missing(&self, id: ModuleId, name: &str) -> DeclarationError {
        DeclarationError::MissingExport {
            name: name.to_string(),
            path: self.module(id).path.clone(),
        }
    }

    /// Follow a module-level name to the symbol that declares it.
    fn resolve_binding(
        &self,
        id: ModuleId,
        local: &str,
        visited: &mut Vec<(ModuleId, String)>,
    ) -> Result<SymbolKey> {
        let module = self.module(id);
        if module.declares(local) {
            return Ok(SymbolKey::Local {
                module: id,
                name: local.to_string(),
            });
        }
        let Some(import) = module.import(local) else {
            return Err(self.missing(id, local));
        };

        match (&import.source, &import.imported) {
            (Source::External(source), imported) => Ok(SymbolKey::External {
                source: source.clone(),
                imported: imported.clone(),
            }),
            (Source::Local(target), Imported::Named(name)) => self
                .resolve_export(*target, name, visited)?
                .ok_or_else(|| self.missing(*target, name)),
            (Source::Local(target), Imported::Default) => self
                .resolve_export(*target, "default", visited)?
                .ok_or_else(|| self.missing(*target, "default")),
            (Source::Local(_), Imported::Namespace) => Err(DeclarationError::Unsupported {
                path: module.path.clone(),
                what: "a namespace import of a local module".to_string(),
            }),
        }
    }

    /// Find the symbol behind an exported name.
    ///
    /// Local `export *` chains are searched first. Only when no local module
    /// provides the name is it attributed to an external `export *`.
    fn resolve_export(
        &self,
        id: ModuleId,
        name: &str,
        visited: &mut Vec<(ModuleId, String)>,
    ) -> Result<Option<SymbolKey>> {
        if let Some(key) = self.lookup_export(id, name, visited, false)? {
            return Ok(Some(key));
        }
        self.lookup_export(id, name, &mut Vec::new(), true)
    }

    fn lookup_export(
        &self,
        id: ModuleId,
        name: &str,
        visited: &mut Vec<(ModuleId, String)>,
        external_stars: bool,
    ) -> Result<Option<SymbolKey>> {
        if visited.iter().any(|(m, n)| *m == id && n == name) {
            return Ok(None);
        }
        visited.push((id, name.to_string()));
        let module = self.module(id);

        if let Some((_, target)) = module.exports.iter().find(|(exported, _)| exported == name) {
            let key = match target {
                ExportTarget::Binding(local) => self.resolve_binding(id, local, visited)?,
                ExportTarget::Module { module, name } => self
                    .resolve_export(*module, name, visited)?
                    .ok_or_else(|| self.missing(*module, name))?,
                ExportTarget::External { source, imported } => SymbolKey::External {
                    source: source.clone(),
                    imported: imported.clone(),
                },
            };
            return Ok(Some(key));
        }

        // `export *` never forwards a default export
        if name == "default" {
            return Ok(None);
        }
        for &star in &module.local_stars {
            if let Some(key) = self.lookup_export(star, name, visited, external_stars)? {
                return Ok(Some(key));
            }
        }
        if external_stars {
            if let Some(source) = module.external_stars.first() {
                return Ok(Some(SymbolKey::External {
                    source: source.clone(),
                    imported: Imported::Named(name.to_string()),
                }));
            }
        }
        Ok(None)
    }

    /// Names exported by a module, following local `export *`, plus the
    /// external sources reached through `export *`.
    fn export_names(
        &self,
        id: ModuleId,
        include_default: bool,
        visited: &mut FxHashSet<ModuleId>,
        names: &mut Vec<String>,
        stars: &mut Vec<String>,
    ) {
        if !visited.insert(id) {
            return;
        }
        let module = self.module(id);
        for (name, _) in &module.exports {
            if (include_default || name != "default") && !names.contains(name) {
                names.push(name.clone());
            }
        }
        for source in &module.external_stars {
            if !stars.contains(source) {
                stars.push(source.clone());
            }
        }
        for &star in &module.local_stars {
            self.export_names(star, false, visited, names, stars);
        }
    }

    fn reserve(&mut self, key: SymbolKey, natural: &str) {
        if self.names.contains_key(&key) {
            return;
        }
        let mut candidate = natural.to_string();
        let mut suffix = 1;
        while self.taken.contains(&candidate) {
            candidate = format!("{natural}${suffix}");
            suffix += 1;
        }
        if candidate != natural {
            trace!(from = natural, to = %candidate, "renamed colliding declaration");
        }
        self.taken.insert(candidate.clone());
        self.names.insert(key, candidate);
    }

    /// Give every symbol its final name. Returns the entry's exports and the
    /// external sources it re-exports wholesale.
    fn assign_names(&mut self) -> Result<(Vec<(String, SymbolKey)>, Vec<String>)> {
        for id in &self.order {
            for global in &self.modules[id].globals {
                self.taken.insert(global.clone());
            }
        }

        let mut export_names = Vec::new();
        let mut stars = Vec::new();
        self.export_names(
            self.entry,
            true,
            &mut FxHashSet::default(),
            &mut export_names,
            &mut stars,
        );
        let mut exports = Vec::with_capacity(export_names.len());
        for name in export_names {
            let key = self
                .resolve_export(self.entry, &name, &mut Vec::new())?
                .ok_or_else(|| self.missing(self.entry, &name))?;
            exports.push((name, key));
        }

        // exported symbols keep their own names when they can
        for (_, key) in &exports {
            if let SymbolKey::Local { name, .. } = key {
                self.reserve(key.clone(), name);
            }
        }

        let mut imports = Vec::new();
        for &id in &self.order {
            for import in &self.module(id).imports {
                let key = self.resolve_binding(id, &import.local, &mut Vec::new())?;
                imports.push((id, import.local.clone(), key));
            }
        }
        for (id, local, key) in imports {
            if matches!(key, SymbolKey::External { .. }) {
                self.reserve(key.clone(), &local);
            }
            self.aliases.insert((id, local), key);
        }
        for (exported, key) in &exports {
            if let SymbolKey::External { imported, .. } = key {
                let natural = match imported {
                    Imported::Named(name) if name != "default" => name.as_str(),
                    _ if exported == "default" => DEFAULT_NAME,
                    _ => exported.as_str(),
                };
                self.reserve(key.clone(), natural);
            }
        }

        let locals: Vec<(ModuleId, String)> = self
            .order
            .iter()
            .flat_map(|id| self.module(*id).declared.iter().map(|name| (*id, name.clone())))
            .collect();
        for (module, name) in locals {
            self.reserve(
                SymbolKey::Local {
                    module,
                    name: name.clone(),
                },
                &name,
            );
        }

        Ok((exports, stars))
    }

    fn final_name(&self, id: ModuleId, local: &str) -> Option<&str> {
        let key = if self.module(id).declares(local) {
            SymbolKey::Local {
                module: id,
                name: local.to_string(),
            }
        } else {
            self.aliases.get(&(id, local.to_string()))?.clone()
        };
        self.names.get(&key).map(String::as_str)
    }

    fn render(&mut self) -> Result<String> {
        let (exports, stars) = self.assign_names()?;
        let mut out = String::new();

        let mut by_source: BTreeMap<&str, Vec<(&Imported, &str)>> = BTreeMap::new();
        for (key, name) in &self.names {
            if let SymbolKey::External { source, imported } = key {
                by_source
                    .entry(source.as_str())
                    .or_default()
                    .push((imported, name.as_str()));
            }
        }
        for (source, mut bindings) in by_source {
            bindings.sort();
            let mut named = Vec::new();
            for (imported, local) in bindings {
                match imported {
                    Imported::Default => {
                        out.push_str(&format!("import {local} from \"{source}\";\n"))
                    }
                    Imported::Namespace => {
                        out.push_str(&format!("import * as {local} from \"{source}\";\n"))
                    }
                    Imported::Named(name) if name == local => named.push(name.clone()),
                    Imported::Named(name) => named.push(format!("{name} as {local}")),
                }
            }
            if !named.is_empty() {
                out.push_str(&format!(
                    "import {{ {} }} from \"{source}\";\n",
                    named.join(", ")
                ));
            }
        }
        if !out.is_empty() {
            out.push('\n');
        }

        // dependencies first, entry last
        for id in self.order.iter().rev() {
            let module = self.module(*id);
            for stmt in &module.statements {
                out.push_str(&self.render_statement(module, stmt));
                out.push('\n');
            }
        }

        for source in &stars {
            out.push_str(&format!("export * from \"{source}\";\n"));
        }

        let mut specifiers: Vec<(&str, &str)> = exports
            .iter()
            .filter_map(|(exported, key)| {
                self.names
                    .get(key)
                    .map(|name| (exported.as_str(), name.as_str()))
            })
            .collect();
        specifiers.sort_by(|a, b| (a.0 == "default", a.0).cmp(&(b.0 == "default", b.0)));
        let list: Vec<String> = specifiers
            .into_iter()
            .map(|(exported, name)| {
                if exported == name {
                    name.to_string()
                } else {
                    format!("{name} as {exported}")
                }
            })
            .collect();
        if list.is_empty() {
            out.push_str("export {};\n");
        } else {
            out.push_str(&format!("export {{ {} }};\n", list.join(", ")));
        }

        Ok(out)
    }

    fn render_statement(&self, module: &DeclModule, stmt: &KeptStatement) -> String {
        let mut edits: Vec<(u32, u32, String)> = Vec::new();
        for (local, spans) in &module.occurrences {
            let Some(name) = self.final_name(module.id, local) else {
                continue;
            };
            if name == local {
                continue;
            }
            for span in spans {
                if span.start >= stmt.span.start && span.end <= stmt.span.end {
                    edits.push((span.start, span.end, name.to_string()));
                }
            }
        }
        if let Some(at) = stmt.insert_default_name {
            let name = self.final_name(module.id, DEFAULT_NAME).unwrap_or(DEFAULT_NAME);
            edits.push((at, at, format!(" {name}")));
        }
        edits.sort_by_key(|(start, _, _)| *start);

        let code = module.code.as_str();
        let mut body = String::new();
        let mut cursor = stmt.span.start;
        for (start, end, replacement) in edits {
            if start < cursor {
                continue;
            }
            body.push_str(slice(code, cursor, start));
            body.push_str(&replacement);
            cursor = end;
        }
        body.push_str(slice(code, cursor, stmt.span.end));

        let mut text = String::new();
        if let Some(doc) = stmt.doc {
            text.push_str(slice(code, doc.start, doc.end));
            text.push('\n');
        }
        if stmt.needs_declare && !body.starts_with("declare ") {
            text.push_str("declare ");
        }
        text.push_str(&body);
        text
    }
}

fn slice(code: &str, start: u32, end: u32) -> &str {
    code.get(start as usize..end as usize).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use bale_config::BuildConfig;
    use tempfile::TempDir;

    use super::*;

    fn project(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (rel, contents) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
        dir
    }

    fn bundle(root: &Path, external: &[&str]) -> Result<String> {
        let config = BuildConfig {
            external: external.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        let graph = bale_graph::build_graph(&config, root).unwrap();
        bundle_declarations(&graph, false)
    }

    #[test]
    fn colliding_names_are_renamed_with_references() {
        let dir = project(&[
            (
                "src/index.ts",
                "export * from './a';\nexport { makeB } from './b';\n",
            ),
            (
                "src/a.ts",
                "export interface Options { a: string }\nexport function makeA(o: Options): void {}\n",
            ),
            (
                "src/b.ts",
                "export interface Options { b: number }\nexport function makeB(o: Options): void {}\n",
            ),
        ]);

        let dts = bundle(dir.path(), &[]).unwrap();
        assert!(dts.contains("interface Options {"), "{dts}");
        assert!(dts.contains("interface Options$1 {"), "{dts}");
        assert!(dts.contains("makeB(o: Options$1): void;"), "{dts}");
        assert!(dts.contains("makeA(o: Options): void;"), "{dts}");
        assert!(dts.contains("export { Options, makeA, makeB };"), "{dts}");
        assert!(!dts.contains("./a"), "{dts}");
    }

    #[test]
    fn external_imports_are_hoisted_once() {
        let dir = project(&[
            ("src/index.ts", "export * from './a';\nexport * from './b';\n"),
            (
                "src/a.ts",
                "import { z } from 'zod';\nexport const A: z.ZodString = z.string();\n",
            ),
            (
                "src/b.ts",
                "import { z as zz } from 'zod';\nexport const B: zz.ZodNumber = zz.number();\n",
            ),
        ]);

        let dts = bundle(dir.path(), &["zod"]).unwrap();
        assert_eq!(dts.matches("from \"zod\"").count(), 1, "{dts}");
        assert!(dts.contains("import { z } from \"zod\";"), "{dts}");
        assert!(dts.contains("declare const B: z.ZodNumber;"), "{dts}");
        assert!(dts.contains("export { A, B };"), "{dts}");
    }

    #[test]
    fn anonymous_default_export_gets_a_name() {
        let dir = project(&[(
            "src/index.ts",
            "export default function (a: number): string { return String(a); }\n",
        )]);

        let dts = bundle(dir.path(), &[]).unwrap();
        assert!(dts.contains("declare function _default(a: number): string;"), "{dts}");
        assert!(dts.contains("export { _default as default };"), "{dts}");
    }

    #[test]
    fn local_declaration_files_are_inlined() {
        let dir = project(&[
            (
                "src/index.ts",
                "import type { Env } from './env';\nexport const mode: Env = 'prod';\n",
            ),
            ("src/env.d.ts", "export type Env = 'dev' | 'prod';\n"),
        ]);

        let dts = bundle(dir.path(), &[]).unwrap();
        assert!(dts.contains("type Env = 'dev' | 'prod';"), "{dts}");
        assert!(dts.contains("declare const mode: Env;"), "{dts}");
        assert!(!dts.contains("import"), "{dts}");
        assert!(dts.contains("export { mode };"), "{dts}");
    }

    #[test]
    fn namespace_reexport_of_local_module_is_rejected() {
        let dir = project(&[
            ("src/index.ts", "export * as util from './util';\n"),
            ("src/util.ts", "export const n: number = 1;\n"),
        ]);

        let err = bundle(dir.path(), &[]).unwrap_err();
        assert!(matches!(err, DeclarationError::NamespaceImport { .. }), "{err}");
    }

    #[test]
    fn javascript_modules_cannot_provide_types() {
        let dir = project(&[
            ("src/index.ts", "export { helper } from './helper.js';\n"),
            ("src/helper.js", "export function helper() { return 1; }\n"),
        ]);

        let err = bundle(dir.path(), &[]).unwrap_err();
        match err {
            DeclarationError::UntypedModule { path, .. } => {
                assert!(path.ends_with("src/helper.js"))
            }
            other => panic!("expected UntypedModule, got {other}"),
        }
    }

    #[test]
    fn external_star_reexports_are_kept() {
        let dir = project(&[
            ("src/index.ts", "export * from 'zod';\nexport const n: number = 1;\n"),
        ]);

        let dts = bundle(dir.path(), &["zod"]).unwrap();
        assert!(dts.contains("export * from \"zod\";"), "{dts}");
        assert!(dts.contains("export { n };"), "{dts}");
    }
}
