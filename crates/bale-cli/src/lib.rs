//! bale CLI.
//!
//! - [`cli`] - clap definitions for `build`, `test` and `config`
//! - `commands` - one module per subcommand
//! - [`error`] - `CliError` and the conversion to miette reports
//! - [`logger`] - tracing subscriber setup
//! - [`ui`] - status lines, spinner and summaries on stderr

pub mod cli;
pub mod commands;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{CliError, Result};
