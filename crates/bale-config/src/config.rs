//! The configuration model.
//!
//! `LibraryConfig` is immutable once loaded and is passed explicitly into the
//! builder and the test runner. Paths are stored as written and resolved
//! against the project root on use.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use path_clean::PathClean;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Root configuration: `[build]` and `[test]` tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct LibraryConfig {
    pub build: BuildConfig,
    pub test: TestConfig,
}

/// Module format of an emitted bundle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// ES module (`import`/`export`)
    Es,
    /// CommonJS (`require`/`module.exports`)
    Cjs,
    /// Universal module definition, usable as a browser global
    Umd,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Es, Format::Cjs, Format::Umd];

    /// File extension (without the leading dot) for this format.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Es => "js",
            Format::Cjs => "cjs",
            Format::Umd => "umd.js",
        }
    }

    /// Artifact file name for a given base name, e.g. `index.cjs`.
    pub fn file_name(self, base: &str) -> String {
        format!("{base}.{}", self.extension())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Format::Es => "es",
            Format::Cjs => "cjs",
            Format::Umd => "umd",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "es" | "esm" => Ok(Format::Es),
            "cjs" | "commonjs" => Ok(Format::Cjs),
            "umd" => Ok(Format::Umd),
            other => Err(format!(
                "unsupported format '{other}' (expected es, cjs or umd)"
            )),
        }
    }
}

/// Resolution platform: selects export conditions and node built-in handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Browser,
    Node,
    #[default]
    Neutral,
}

/// `[build]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Library entry point, relative to the project root.
    pub entry: PathBuf,

    /// Global variable name defined by the UMD bundle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Base name of every artifact (`index` gives `index.js`, `index.cjs`, ...).
    pub file_name: String,

    pub formats: Vec<Format>,

    pub out_dir: PathBuf,

    /// Dependencies left out of the bundle. A name also covers its subpaths.
    pub external: Vec<String>,

    /// External dependency name to UMD global variable.
    pub globals: BTreeMap<String, String>,

    pub sourcemap: bool,

    /// Clear `out_dir` so it holds exactly this build's artifacts.
    pub empty_out_dir: bool,

    /// Emit the aggregated `<file_name>.d.ts`.
    pub dts: bool,

    /// Explicit tsconfig path; `./tsconfig.json` is used when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tsconfig: Option<PathBuf>,

    pub platform: Platform,

    /// Downgrade circular local imports from an error to a warning.
    pub allow_circular: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            entry: PathBuf::from("src/index.ts"),
            name: None,
            file_name: "index".to_string(),
            formats: vec![Format::Es, Format::Cjs],
            out_dir: PathBuf::from("dist"),
            external: Vec::new(),
            globals: BTreeMap::new(),
            sourcemap: true,
            empty_out_dir: true,
            dts: true,
            tsconfig: None,
            platform: Platform::Neutral,
            allow_circular: false,
        }
    }
}

impl BuildConfig {
    pub fn entry_path(&self, root: &Path) -> PathBuf {
        resolve_path(root, &self.entry)
    }

    pub fn out_dir_path(&self, root: &Path) -> PathBuf {
        resolve_path(root, &self.out_dir)
    }

    /// Whether `specifier` names one of the configured externals or a subpath of one.
    pub fn is_external(&self, specifier: &str) -> bool {
        self.external.iter().any(|ext| {
            specifier == ext
                || specifier
                    .strip_prefix(ext.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

/// Test environment. Only `node` can be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum TestEnvironment {
    #[default]
    Node,
    Jsdom,
    HappyDom,
}

impl fmt::Display for TestEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TestEnvironment::Node => "node",
            TestEnvironment::Jsdom => "jsdom",
            TestEnvironment::HappyDom => "happy-dom",
        })
    }
}

/// `[test]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct TestConfig {
    /// Globs selecting test files, relative to the project root.
    pub include: Vec<String>,
    pub exclude: Vec<String>,

    /// Expose `describe`/`it`/`test`/hooks as globals.
    pub globals: bool,

    pub environment: TestEnvironment,

    /// Modules imported before every test file.
    pub setup_files: Vec<PathBuf>,

    /// Per-test timeout handed to the test runner.
    pub test_timeout_ms: u64,

    /// Hard limit for one test file; the process is killed past it.
    pub file_timeout_ms: u64,

    /// Concurrent test files. Defaults to the available parallelism.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,

    /// Node executable.
    pub node: String,

    /// Extra arguments placed before the test file.
    pub node_args: Vec<String>,

    /// Succeed when no test file matches.
    pub pass_with_no_tests: bool,

    pub coverage: CoverageConfig,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            include: vec!["**/*.{test,spec}.{ts,mts,cts,js,mjs,cjs}".to_string()],
            exclude: vec!["node_modules/**".to_string(), "dist/**".to_string()],
            globals: true,
            environment: TestEnvironment::Node,
            setup_files: Vec::new(),
            test_timeout_ms: 5_000,
            file_timeout_ms: 300_000,
            max_workers: None,
            node: "node".to_string(),
            node_args: Vec::new(),
            pass_with_no_tests: false,
            coverage: CoverageConfig::default(),
        }
    }
}

impl TestConfig {
    pub fn workers(&self) -> usize {
        self.max_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CoverageProviderKind {
    #[default]
    V8,
}

/// Coverage report format.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Reporter {
    Text,
    Json,
    Html,
    Lcov,
}

impl fmt::Display for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Reporter::Text => "text",
            Reporter::Json => "json",
            Reporter::Html => "html",
            Reporter::Lcov => "lcov",
        })
    }
}

impl FromStr for Reporter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Reporter::Text),
            "json" => Ok(Reporter::Json),
            "html" => Ok(Reporter::Html),
            "lcov" => Ok(Reporter::Lcov),
            other => Err(format!(
                "unsupported reporter '{other}' (expected text, json, html or lcov)"
            )),
        }
    }
}

/// `[test.coverage]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct CoverageConfig {
    pub enabled: bool,
    pub provider: CoverageProviderKind,
    pub reporters: Vec<Reporter>,
    pub reports_dir: PathBuf,

    /// Score matched files that no test executed at 0% instead of omitting them.
    pub all: bool,

    pub include: Vec<String>,

    /// Applied after `include`: a file matching both is excluded.
    pub exclude: Vec<String>,

    /// Write reports even when a test failed.
    pub report_on_failure: bool,

    pub thresholds: Thresholds,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: CoverageProviderKind::V8,
            reporters: vec![
                Reporter::Text,
                Reporter::Json,
                Reporter::Html,
                Reporter::Lcov,
            ],
            reports_dir: PathBuf::from("coverage"),
            all: true,
            include: vec!["src/**".to_string()],
            exclude: vec![
                "**/*.test.*".to_string(),
                "**/*.spec.*".to_string(),
                "**/*.d.ts".to_string(),
                "dist/**".to_string(),
                "node_modules/**".to_string(),
            ],
            report_on_failure: false,
            thresholds: Thresholds::default(),
        }
    }
}

/// Minimum percentages. Unset metrics are not enforced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct Thresholds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub functions: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branches: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statements: Option<f64>,
    /// Check every file instead of the aggregate.
    pub per_file: bool,
}

impl Thresholds {
    pub fn is_empty(&self) -> bool {
        self.lines.is_none()
            && self.functions.is_none()
            && self.branches.is_none()
            && self.statements.is_none()
    }
}

/// Resolve a possibly relative path against the project root.
pub fn resolve_path(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf().clean()
    } else {
        root.join(path).clean()
    }
}
