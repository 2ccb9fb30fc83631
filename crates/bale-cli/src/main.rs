//! bale - build, test and coverage-gate TypeScript libraries.

use bale_cli::{cli, commands, error, logger, ui};
use clap::Parser;
use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    logger::init_logger(args.verbose, args.quiet, args.no_color);
    ui::init(args.quiet, args.no_color);

    let global = args.global();
    let result = match args.command {
        cli::Command::Build(build_args) => commands::build_execute(&global, build_args).await,
        cli::Command::Test(test_args) => commands::test_execute(&global, test_args).await,
        cli::Command::Config(config_args) => commands::config_execute(&global, config_args),
    };

    result.map_err(error::cli_error_to_miette)
}
