//! `bale test`

use bale_config::{Overrides, resolve_path};
use bale_test::TestRunner;

use crate::cli::{GlobalArgs, TestArgs};
use crate::commands::utils;
use crate::error::{CliError, Result};
use crate::ui;

/// Run the tests, print results and the coverage table, then gate.
///
/// Failing tests take precedence over a missed threshold in the exit error.
pub async fn execute(global: &GlobalArgs, args: TestArgs) -> Result<()> {
    let overrides = Overrides {
        test: args.overrides(),
        ..Default::default()
    };
    let (root, config) = utils::load_config(global, &overrides)?;
    let reports_dir = resolve_path(&root, &config.test.coverage.reports_dir);

    let spinner = ui::Spinner::new("Running tests");
    let result = TestRunner::new(config, root).run().await;
    spinner.clear();
    let report = result?;

    if report.files.is_empty() {
        ui::info("No test files found");
        return Ok(());
    }
    ui::print_test_results(&report);

    if let Some(coverage) = &report.coverage {
        match &coverage.reports {
            Some(reports) => {
                if let Some(table) = &reports.console {
                    print!("{table}");
                }
                if !reports.files.is_empty() {
                    ui::info(&format!("Coverage reports written to {}", reports_dir.display()));
                }
            }
            None => ui::warning("Coverage reports skipped because tests failed"),
        }
    }

    let summary = report.summary;
    if !summary.success() {
        return Err(CliError::TestsFailed {
            failed: summary.failed_files,
            files: summary.files,
        });
    }
    if let Some(coverage) = report.coverage {
        if !coverage.failures.is_empty() {
            return Err(CliError::ThresholdFailed(coverage.failures));
        }
    }

    ui::success("All tests passed");
    Ok(())
}
