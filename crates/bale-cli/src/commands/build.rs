//! `bale build`

use bale_bundler::LibraryBuilder;
use bale_config::Overrides;

use crate::cli::{BuildArgs, GlobalArgs};
use crate::commands::utils;
use crate::error::Result;
use crate::ui;

/// Load the config, build every format and print the artifact table.
///
/// The output directory is left as it was when anything fails.
pub async fn execute(global: &GlobalArgs, args: BuildArgs) -> Result<()> {
    let overrides = Overrides {
        build: args.overrides(),
        ..Default::default()
    };
    let (root, config) = utils::load_config(global, &overrides)?;

    let formats: Vec<&str> = config.build.formats.iter().map(|f| f.as_str()).collect();
    let spinner = ui::Spinner::new(&format!(
        "Building {} ({})",
        config.build.entry.display(),
        formats.join(", ")
    ));

    let report = match LibraryBuilder::new(config, root).build().await {
        Ok(report) => report,
        Err(e) => {
            spinner.fail("Build failed");
            return Err(e.into());
        }
    };
    spinner.clear();

    for warning in &report.warnings {
        ui::warning(warning);
    }
    ui::print_build_summary(&report);
    ui::success(&format!(
        "Built {} files in {}",
        report.artifacts.len(),
        ui::format_duration(report.duration)
    ));
    Ok(())
}
