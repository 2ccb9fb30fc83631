//! Zero coverage for files no test loaded.
//!
//! Functions and branch points are found with an oxc pass so an untested
//! file weighs on every metric, not just lines.

use std::path::Path;

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    ArrowFunctionExpression, BindingPatternKind, ConditionalExpression, Expression, Function,
    IfStatement, LogicalExpression, SwitchCase, VariableDeclarator,
};
use oxc_ast_visit::{Visit, walk};
use oxc_parser::Parser;
use oxc_semantic::ScopeFlags;
use oxc_span::{GetSpan, SourceType};
use tracing::warn;

use crate::coverage::model::{BranchCoverage, FileCoverage, FunctionCoverage};
use crate::coverage::source::SourceText;

pub fn zero_coverage(path: &Path, source: &SourceText) -> FileCoverage {
    let mut coverage = FileCoverage::new(path.to_path_buf());
    for line in source.executable_lines() {
        coverage.lines.insert(line.line, 0);
    }

    let allocator = Allocator::default();
    let source_type = SourceType::from_path(path).unwrap_or_else(|_| SourceType::mjs());
    let ret = Parser::new(&allocator, source.text(), source_type).parse();
    if ret.panicked {
        warn!(file = %path.display(), "could not parse untested file; counting lines only");
        return coverage;
    }

    let mut collector = Collector {
        source,
        coverage: &mut coverage,
        pending_name: None,
        anonymous: 0,
    };
    collector.visit_program(&ret.program);
    coverage
}

struct Collector<'s> {
    source: &'s SourceText,
    coverage: &'s mut FileCoverage,
    /// Name of the variable the next function expression is assigned to.
    pending_name: Option<String>,
    anonymous: usize,
}

impl Collector<'_> {
    fn function(&mut self, own_name: Option<String>, start: u32) {
        let name = own_name
            .or_else(|| self.pending_name.take())
            .unwrap_or_else(|| {
                self.anonymous += 1;
                format!("(anonymous_{})", self.anonymous)
            });
        self.coverage.functions.insert(
            start,
            FunctionCoverage {
                name,
                line: self.source.line_of_byte(start),
                hits: 0,
            },
        );
    }

    fn branch(&mut self, start: u32) {
        self.coverage.branches.insert(
            start,
            BranchCoverage {
                line: self.source.line_of_byte(start),
                hits: 0,
            },
        );
    }
}

impl<'a> Visit<'a> for Collector<'_> {
    fn visit_variable_declarator(&mut self, decl: &VariableDeclarator<'a>) {
        if let (BindingPatternKind::BindingIdentifier(id), Some(init)) = (&decl.id.kind, &decl.init)
        {
            if matches!(
                init,
                Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_)
            ) {
                self.pending_name = Some(id.name.to_string());
            }
        }
        walk::walk_variable_declarator(self, decl);
        self.pending_name = None;
    }

    fn visit_function(&mut self, func: &Function<'a>, flags: ScopeFlags) {
        // overloads and `declare function` have no body to run
        if func.body.is_some() {
            let own = func.id.as_ref().map(|id| id.name.to_string());
            self.function(own, func.span.start);
        }
        self.pending_name = None;
        walk::walk_function(self, func, flags);
    }

    fn visit_arrow_function_expression(&mut self, expr: &ArrowFunctionExpression<'a>) {
        self.function(None, expr.span.start);
        self.pending_name = None;
        walk::walk_arrow_function_expression(self, expr);
    }

    fn visit_if_statement(&mut self, stmt: &IfStatement<'a>) {
        self.branch(stmt.consequent.span().start);
        match &stmt.alternate {
            Some(alternate) => self.branch(alternate.span().start),
            // the implicit else
            None => self.branch(stmt.span.end),
        }
        walk::walk_if_statement(self, stmt);
    }

    fn visit_conditional_expression(&mut self, expr: &ConditionalExpression<'a>) {
        self.branch(expr.consequent.span().start);
        self.branch(expr.alternate.span().start);
        walk::walk_conditional_expression(self, expr);
    }

    fn visit_logical_expression(&mut self, expr: &LogicalExpression<'a>) {
        self.branch(expr.right.span().start);
        walk::walk_logical_expression(self, expr);
    }

    fn visit_switch_case(&mut self, case: &SwitchCase<'a>) {
        self.branch(case.span.start);
        walk::walk_switch_case(self, case);
    }
}
