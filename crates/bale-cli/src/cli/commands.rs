use std::path::PathBuf;

use bale_config::{BuildOverrides, CoverageOverrides, Format, Reporter, TestOverrides};
use clap::{Args, Subcommand};

use crate::cli::validation::parse_global_pair;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bundle the library
    ///
    /// Writes one bundle per format, source maps and index.d.ts into the
    /// output directory. Nothing is written unless every format succeeds.
    Build(BuildArgs),

    /// Run the test files under node
    ///
    /// Files run concurrently, each in its own process. With --coverage the
    /// run also fails when a coverage threshold is not met.
    Test(TestArgs),

    /// Inspect the resolved configuration
    Config(ConfigArgs),
}

/// Arguments for `bale build`. Each one overrides the config file.
#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Library entry point
    #[arg(value_name = "ENTRY")]
    pub entry: Option<PathBuf>,

    /// Output format (es, cjs, umd). Repeatable
    ///
    /// Examples:
    ///   bale build -f es -f cjs
    ///   bale build --format es,umd
    #[arg(short = 'f', long = "format", value_name = "FORMAT", value_delimiter = ',')]
    pub formats: Vec<Format>,

    /// Output directory
    #[arg(short = 'd', long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Dependency to leave out of the bundle. Repeatable
    #[arg(short, long, value_name = "PACKAGE", value_delimiter = ',')]
    pub external: Vec<String>,

    /// UMD global for an external, as `package=Global`. Repeatable
    #[arg(short, long = "global", value_name = "PACKAGE=GLOBAL", value_parser = parse_global_pair)]
    pub globals: Vec<(String, String)>,

    /// Global variable name of the UMD bundle
    #[arg(short, long, value_name = "NAME")]
    pub name: Option<String>,

    /// Emit source maps
    #[arg(long, overrides_with = "no_sourcemap")]
    pub sourcemap: bool,

    /// Do not emit source maps
    #[arg(long, overrides_with = "sourcemap")]
    pub no_sourcemap: bool,

    /// Keep files already in the output directory
    #[arg(long)]
    pub no_empty_out_dir: bool,

    /// Skip index.d.ts
    #[arg(long)]
    pub no_dts: bool,
}

impl BuildArgs {
    pub fn overrides(&self) -> BuildOverrides {
        BuildOverrides {
            entry: self.entry.clone(),
            name: self.name.clone(),
            formats: (!self.formats.is_empty()).then(|| self.formats.clone()),
            out_dir: self.out_dir.clone(),
            external: (!self.external.is_empty()).then(|| self.external.clone()),
            globals: (!self.globals.is_empty()).then(|| self.globals.iter().cloned().collect()),
            sourcemap: flag_pair(self.sourcemap, self.no_sourcemap),
            empty_out_dir: self.no_empty_out_dir.then_some(false),
            dts: self.no_dts.then_some(false),
        }
    }
}

/// Arguments for `bale test`.
#[derive(Args, Debug, Default)]
pub struct TestArgs {
    /// Globs selecting test files, replacing `test.include`
    #[arg(value_name = "PATTERN")]
    pub include: Vec<String>,

    /// Collect coverage and enforce thresholds
    #[arg(long)]
    pub coverage: bool,

    /// Coverage reporter (text, json, html, lcov). Repeatable
    #[arg(short, long = "reporter", value_name = "REPORTER", value_delimiter = ',')]
    pub reporters: Vec<Reporter>,

    /// Score files no test loaded at 0%
    #[arg(long, overrides_with = "no_all")]
    pub all: bool,

    /// Only report files that some test loaded
    #[arg(long, overrides_with = "all")]
    pub no_all: bool,

    /// Directory for coverage reports
    #[arg(long, value_name = "DIR")]
    pub reports_dir: Option<PathBuf>,

    /// Test files run at the same time
    #[arg(short = 'w', long, value_name = "N", value_parser = clap::value_parser!(usize))]
    pub max_workers: Option<usize>,

    /// Per-test timeout in milliseconds
    #[arg(short, long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Per-file timeout in milliseconds; the process is killed past it
    #[arg(long, value_name = "MS")]
    pub file_timeout: Option<u64>,
}

impl TestArgs {
    pub fn overrides(&self) -> TestOverrides {
        TestOverrides {
            include: (!self.include.is_empty()).then(|| self.include.clone()),
            max_workers: self.max_workers,
            file_timeout_ms: self.file_timeout,
            test_timeout_ms: self.timeout,
            coverage: CoverageOverrides {
                enabled: self.coverage.then_some(true),
                reporters: (!self.reporters.is_empty()).then(|| self.reporters.clone()),
                all: flag_pair(self.all, self.no_all),
                reports_dir: self.reports_dir.clone(),
            },
        }
    }
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the fully resolved configuration as TOML
    Show,

    /// Print the JSON Schema of the configuration file
    Schema,
}

/// `--x` / `--no-x` to an optional override.
fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}
