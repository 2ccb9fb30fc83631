//! Import extraction from a parsed module.

use std::path::Path;

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, CallExpression, Expression, ImportDeclarationSpecifier, ImportExpression, Program,
    Statement,
};
use oxc_ast_visit::{Visit, walk};
use oxc_parser::Parser;
use oxc_span::SourceType;

use crate::error::GraphError;
use crate::module::{ImportKind, ImportRecord, ModuleKind};

/// Parse `source` and collect every import it makes.
///
/// Declaration files contribute no runtime edges, so all of their imports are
/// marked type-only.
pub fn collect_imports(
    path: &Path,
    source: &str,
    kind: ModuleKind,
) -> Result<Vec<ImportRecord>, GraphError> {
    if !kind.is_script() {
        return Ok(Vec::new());
    }

    let allocator = Allocator::default();
    let source_type = SourceType::from_path(path).unwrap_or_else(|_| SourceType::mjs());
    let ret = Parser::new(&allocator, source, source_type).parse();

    if ret.panicked || !ret.errors.is_empty() {
        return Err(GraphError::Parse {
            path: path.to_path_buf(),
            messages: ret.errors.iter().map(|e| e.to_string()).collect(),
        });
    }

    let mut records = statement_imports(&ret.program);

    let mut visitor = ExpressionImports::default();
    visitor.visit_program(&ret.program);
    records.extend(visitor.records);
    records.sort_by_key(|r| r.offset);

    if kind == ModuleKind::Declaration {
        for record in &mut records {
            record.type_only = true;
        }
    }

    Ok(records)
}

fn statement_imports(program: &Program<'_>) -> Vec<ImportRecord> {
    let mut records = Vec::new();

    for stmt in &program.body {
        match stmt {
            Statement::ImportDeclaration(decl) => {
                let type_only = decl.import_kind.is_type()
                    || decl.specifiers.as_ref().is_some_and(|specifiers| {
                        !specifiers.is_empty()
                            && specifiers.iter().all(|s| match s {
                                ImportDeclarationSpecifier::ImportSpecifier(s) => {
                                    s.import_kind.is_type()
                                }
                                _ => false,
                            })
                    });
                records.push(ImportRecord::new(
                    decl.source.value.as_str(),
                    ImportKind::Static,
                    type_only,
                    decl.source.span.start,
                ));
            }
            Statement::ExportNamedDeclaration(decl) => {
                if let Some(source) = &decl.source {
                    let type_only = decl.export_kind.is_type()
                        || (!decl.specifiers.is_empty()
                            && decl.specifiers.iter().all(|s| s.export_kind.is_type()));
                    records.push(ImportRecord::new(
                        source.value.as_str(),
                        ImportKind::ReExport,
                        type_only,
                        source.span.start,
                    ));
                }
            }
            Statement::ExportAllDeclaration(decl) => {
                records.push(ImportRecord::new(
                    decl.source.value.as_str(),
                    ImportKind::ReExport,
                    decl.export_kind.is_type(),
                    decl.source.span.start,
                ));
            }
            _ => {}
        }
    }

    records
}

/// Finds `import("x")` and `require("x")` with literal specifiers.
#[derive(Default)]
struct ExpressionImports {
    records: Vec<ImportRecord>,
}

impl<'a> Visit<'a> for ExpressionImports {
    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        if let Expression::StringLiteral(lit) = &expr.source {
            self.records.push(ImportRecord::new(
                lit.value.as_str(),
                ImportKind::Dynamic,
                false,
                lit.span.start,
            ));
        }
        walk::walk_import_expression(self, expr);
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        let is_require =
            matches!(&call.callee, Expression::Identifier(id) if id.name.as_str() == "require");
        if is_require && call.arguments.len() == 1 {
            if let Some(Argument::StringLiteral(lit)) = call.arguments.first() {
                self.records.push(ImportRecord::new(
                    lit.value.as_str(),
                    ImportKind::Require,
                    false,
                    lit.span.start,
                ));
            }
        }
        walk::walk_call_expression(self, call);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(source: &str) -> Vec<ImportRecord> {
        collect_imports(Path::new("mod.ts"), source, ModuleKind::TypeScript).unwrap()
    }

    #[test]
    fn collects_every_import_form() {
        let records = collect(
            r#"
import { z } from "zod";
import "./side-effect";
export { Foo } from "./foo";
export * from "./bar";
const lazy = () => import("./lazy");
const legacy = require("./legacy");
"#,
        );
        let found: Vec<_> = records
            .iter()
            .map(|r| (r.specifier.as_str(), r.kind))
            .collect();
        assert_eq!(
            found,
            vec![
                ("zod", ImportKind::Static),
                ("./side-effect", ImportKind::Static),
                ("./foo", ImportKind::ReExport),
                ("./bar", ImportKind::ReExport),
                ("./lazy", ImportKind::Dynamic),
                ("./legacy", ImportKind::Require),
            ]
        );
    }

    #[test]
    fn detects_type_only_imports() {
        let records = collect(
            r#"
import type { A } from "./a";
import { type B, type C } from "./b";
import { type D, e } from "./d";
export type { F } from "./f";
export type * from "./g";
"#,
        );
        let type_only: Vec<_> = records
            .iter()
            .map(|r| (r.specifier.as_str(), r.type_only))
            .collect();
        assert_eq!(
            type_only,
            vec![
                ("./a", true),
                ("./b", true),
                ("./d", false),
                ("./f", true),
                ("./g", true),
            ]
        );
    }

    #[test]
    fn non_literal_dynamic_imports_are_skipped() {
        let records = collect("const name = './x'; import(name); require(name);");
        assert!(records.is_empty());
    }

    #[test]
    fn declaration_imports_are_type_only() {
        let records = collect_imports(
            Path::new("env.d.ts"),
            "import { X } from './x'; export declare const y: X;",
            ModuleKind::Declaration,
        )
        .unwrap();
        assert!(records.iter().all(|r| r.type_only));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let err = collect_imports(Path::new("bad.ts"), "export const = ;", ModuleKind::TypeScript)
            .unwrap_err();
        assert!(matches!(err, GraphError::Parse { .. }));
    }

    #[test]
    fn json_has_no_imports() {
        let records =
            collect_imports(Path::new("data.json"), "{\"a\": 1}", ModuleKind::Json).unwrap();
        assert!(records.is_empty());
    }
}
