//! Pluggable config validation strategies
//!
//! Separates filesystem validation (for CLI use) from schema validation (for library use).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use path_clean::PathClean;

use crate::config::{Format, LibraryConfig, TestEnvironment};
use crate::error::{ConfigError, Result};

/// Trait for pluggable config validation strategies
pub trait ConfigValidator {
    fn validate(&self, config: &LibraryConfig) -> Result<()>;
}

/// Structural validation with no filesystem access.
pub struct SchemaValidator;

impl ConfigValidator for SchemaValidator {
    fn validate(&self, config: &LibraryConfig) -> Result<()> {
        let build = &config.build;

        if build.entry.as_os_str().is_empty() {
            return Err(ConfigError::invalid("build.entry", "entry cannot be empty"));
        }

        if build.file_name.is_empty() || build.file_name.contains(['/', '\\']) {
            return Err(ConfigError::invalid(
                "build.file_name",
                format!("'{}' must be a plain file name", build.file_name),
            ));
        }

        if build.formats.is_empty() {
            return Err(ConfigError::NoFormats);
        }

        let mut seen = HashSet::new();
        for format in &build.formats {
            if !seen.insert(format) {
                return Err(ConfigError::invalid(
                    "build.formats",
                    format!("format '{format}' is listed more than once"),
                ));
            }
        }

        for external in &build.external {
            if external.trim().is_empty() {
                return Err(ConfigError::invalid(
                    "build.external",
                    "external package names cannot be empty",
                ));
            }
        }

        for (dependency, global) in &build.globals {
            parse_global(global)
                .map_err(|msg| ConfigError::invalid(format!("build.globals.{dependency}"), msg))?;
        }

        if build.formats.contains(&Format::Umd) {
            let name = build.name.as_deref().ok_or(ConfigError::MissingLibraryName)?;
            parse_global(name).map_err(|msg| ConfigError::invalid("build.name", msg))?;

            for external in &build.external {
                if !build.globals.contains_key(external) {
                    return Err(ConfigError::MissingGlobal {
                        external: external.clone(),
                    });
                }
            }
        }

        let test = &config.test;
        if test.environment != TestEnvironment::Node {
            return Err(ConfigError::invalid(
                "test.environment",
                format!(
                    "environment '{}' is not supported; tests run in node",
                    test.environment
                ),
            ));
        }
        if test.test_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "test.test_timeout_ms",
                "timeout must be greater than zero",
            ));
        }
        if test.file_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "test.file_timeout_ms",
                "timeout must be greater than zero",
            ));
        }
        if test.max_workers == Some(0) {
            return Err(ConfigError::invalid(
                "test.max_workers",
                "at least one worker is required",
            ));
        }

        let coverage = &test.coverage;
        if coverage.enabled && coverage.reporters.is_empty() {
            return Err(ConfigError::invalid(
                "test.coverage.reporters",
                "coverage is enabled but no reporter is configured",
            ));
        }

        let thresholds = [
            ("lines", coverage.thresholds.lines),
            ("functions", coverage.thresholds.functions),
            ("branches", coverage.thresholds.branches),
            ("statements", coverage.thresholds.statements),
        ];
        for (metric, value) in thresholds {
            if let Some(value) = value {
                if !(0.0..=100.0).contains(&value) {
                    return Err(ConfigError::invalid(
                        format!("test.coverage.thresholds.{metric}"),
                        format!("{value} is outside 0..=100"),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Filesystem validation relative to a project root.
pub struct FsValidator {
    root: PathBuf,
}

impl FsValidator {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf().clean(),
        }
    }
}

impl ConfigValidator for FsValidator {
    fn validate(&self, config: &LibraryConfig) -> Result<()> {
        let entry = config.build.entry_path(&self.root);
        if !entry.is_file() {
            return Err(ConfigError::EntryNotFound(entry));
        }

        if let Some(tsconfig) = &config.build.tsconfig {
            let path = crate::resolve_path(&self.root, tsconfig);
            if !path.is_file() {
                return Err(ConfigError::TsconfigNotFound(path));
            }
        }

        for setup in &config.test.setup_files {
            let path = crate::resolve_path(&self.root, setup);
            if !path.is_file() {
                return Err(ConfigError::SetupFileNotFound(path));
            }
        }

        if config.build.empty_out_dir {
            check_out_dir(&self.root, &config.build.out_dir_path(&self.root), &entry)?;
        }

        Ok(())
    }
}

/// Refuse output directories whose clearing would destroy sources.
fn check_out_dir(root: &Path, out_dir: &Path, entry: &Path) -> Result<()> {
    let unsafe_dir = |reason: &str| ConfigError::UnsafeOutDir {
        out_dir: out_dir.to_path_buf(),
        reason: reason.to_string(),
    };

    if out_dir.parent().is_none() {
        return Err(unsafe_dir("it is the filesystem root"));
    }
    if out_dir == root {
        return Err(unsafe_dir("it is the project root"));
    }
    if root.starts_with(out_dir) {
        return Err(unsafe_dir("it contains the project root"));
    }
    if entry.starts_with(out_dir) {
        return Err(unsafe_dir("it contains the library entry"));
    }
    Ok(())
}

/// Validate a global variable name such as `Zod` or `MyOrg.Schemas`.
pub fn parse_global(s: &str) -> std::result::Result<String, String> {
    if s.is_empty() {
        return Err("Global name cannot be empty".to_string());
    }

    for segment in s.split('.') {
        let mut chars = segment.chars();
        let Some(first) = chars.next() else {
            return Err(format!("Global name has an empty segment: '{s}'"));
        };
        if !first.is_alphabetic() && first != '_' && first != '$' {
            return Err(format!(
                "Global name must start with a letter, underscore, or dollar sign: '{s}'"
            ));
        }
        if chars.any(|c| !c.is_alphanumeric() && c != '_' && c != '$') {
            return Err(format!(
                "Global name can only contain letters, numbers, underscores, or dollar signs: '{s}'"
            ));
        }
        if RESERVED_WORDS.contains(&segment) {
            return Err(format!("Global name uses a reserved word: '{segment}'"));
        }
    }

    Ok(s.to_string())
}

const RESERVED_WORDS: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "export", "extends", "false", "finally", "for", "function", "if", "import", "in",
    "instanceof", "new", "null", "return", "super", "switch", "this", "throw", "true", "try",
    "typeof", "var", "void", "while", "with", "yield", "let", "static", "enum", "await",
];

pub fn validate_schema(config: &LibraryConfig) -> Result<()> {
    SchemaValidator.validate(config)
}

pub fn validate_fs(config: &LibraryConfig, root: impl AsRef<Path>) -> Result<()> {
    FsValidator::new(root).validate(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_global_accepts_identifier_paths() {
        assert_eq!(parse_global("Zod").unwrap(), "Zod");
        assert_eq!(parse_global("_lib$").unwrap(), "_lib$");
        assert_eq!(parse_global("MyOrg.Schemas").unwrap(), "MyOrg.Schemas");
    }

    #[test]
    fn parse_global_rejects_bad_names() {
        assert!(parse_global("").is_err());
        assert!(parse_global("123abc").is_err());
        assert!(parse_global("my-lib").is_err());
        assert!(parse_global("a..b").is_err());
        assert!(parse_global("class").is_err());
    }

    #[test]
    fn out_dir_guard() {
        let root = Path::new("/work/project");
        let entry = Path::new("/work/project/src/index.ts");
        assert!(check_out_dir(root, Path::new("/work/project/dist"), entry).is_ok());
        assert!(check_out_dir(root, root, entry).is_err());
        assert!(check_out_dir(root, Path::new("/work"), entry).is_err());
        assert!(check_out_dir(root, Path::new("/work/project/src"), entry).is_err());
        assert!(check_out_dir(root, Path::new("/"), entry).is_err());
    }
}
