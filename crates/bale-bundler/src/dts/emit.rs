//! Per-module declaration emit with oxc isolated declarations.

use std::path::Path;

use oxc_allocator::Allocator;
use oxc_codegen::Codegen;
use oxc_isolated_declarations::{IsolatedDeclarations, IsolatedDeclarationsOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;

use super::DeclarationError;

/// Generate `.d.ts` text for one TypeScript module.
///
/// Fails on parse errors and on anything isolated declarations cannot infer,
/// such as an exported function without a return type annotation.
pub fn generate_dts(
    source: &str,
    path: &Path,
    strip_internal: bool,
) -> Result<String, DeclarationError> {
    let allocator = Allocator::default();
    let source_type = SourceType::from_path(path).map_err(|e| DeclarationError::Parse {
        path: path.to_path_buf(),
        messages: vec![e.to_string()],
    })?;

    let parse_result = Parser::new(&allocator, source, source_type).parse();
    if parse_result.panicked || !parse_result.errors.is_empty() {
        return Err(DeclarationError::Parse {
            path: path.to_path_buf(),
            messages: parse_result.errors.iter().map(|e| e.to_string()).collect(),
        });
    }

    let options = IsolatedDeclarationsOptions { strip_internal };
    let dts_result = IsolatedDeclarations::new(&allocator, options).build(&parse_result.program);
    if !dts_result.errors.is_empty() {
        return Err(DeclarationError::Isolated {
            path: path.to_path_buf(),
            messages: dts_result.errors.iter().map(|e| e.to_string()).collect(),
        });
    }

    Ok(Codegen::new().build(&dts_result.program).code)
}
