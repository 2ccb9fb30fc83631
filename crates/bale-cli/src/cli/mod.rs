//! Command-line interface definition.
//!
//! - `bale build` - bundle the library into every configured format
//! - `bale test` - run the test files, optionally gated on coverage
//! - `bale config` - print the resolved configuration or its JSON Schema

mod commands;
mod tests;
mod validation;

use std::path::PathBuf;

use clap::Parser;

pub use commands::{BuildArgs, Command, ConfigArgs, ConfigCommand, TestArgs};
pub use validation::parse_global_pair;

/// bale - package a TypeScript library and gate it on its tests
#[derive(Parser, Debug)]
#[command(
    name = "bale",
    version,
    about = "Package a TypeScript library and gate it on its tests",
    long_about = "bale bundles a library entry point into ES, CommonJS and UMD outputs with\n\
                  source maps and a single index.d.ts, and runs its tests under node with\n\
                  coverage thresholds."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    ///
    /// Also hides the spinner. Coverage tables and config output still go
    /// to stdout.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Project root. Defaults to the current directory
    #[arg(long, global = true, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Configuration file to use instead of bale.toml / package.json#bale
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags every subcommand shares.
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub quiet: bool,
    pub cwd: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn global(&self) -> GlobalArgs {
        GlobalArgs {
            quiet: self.quiet,
            cwd: self.cwd.clone(),
            config: self.config.clone(),
        }
    }
}
