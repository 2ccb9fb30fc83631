//! Per-file test results and the run summary.

use bale_test::{FileReport, FileState, RunReport, TestStatus};
use owo_colors::Style;

use crate::ui::{format_duration, is_quiet, paint};

/// Lines of stderr shown for a file that crashed or timed out.
const STDERR_TAIL: usize = 20;

/// Failures always print; passing and skipped files only without `--quiet`.
pub fn print_test_results(report: &RunReport) {
    for file in &report.files {
        print_file(file);
    }

    let summary = &report.summary;
    if is_quiet() && summary.success() {
        return;
    }
    let mut parts = vec![paint(
        &format!("{} passed", summary.passed),
        Style::new().green(),
    )];
    if summary.failed > 0 {
        parts.push(paint(&format!("{} failed", summary.failed), Style::new().red()));
    }
    if summary.skipped > 0 {
        parts.push(paint(&format!("{} skipped", summary.skipped), Style::new().yellow()));
    }
    if summary.todo > 0 {
        parts.push(format!("{} todo", summary.todo));
    }
    eprintln!(
        "\n{} {} ({} files) in {}",
        paint("Tests", Style::new().bold()),
        parts.join(" | "),
        summary.files,
        format_duration(report.duration)
    );
}

fn print_file(file: &FileReport) {
    let duration = format_duration(file.duration);
    match &file.state {
        FileState::Failed(reason) => {
            eprintln!(
                "{} {} {}",
                paint("✗", Style::new().red().bold()),
                file.display,
                paint(reason, Style::new().red())
            );
            let failed: Vec<_> = file
                .tests
                .iter()
                .filter(|t| t.status == TestStatus::Failed)
                .collect();
            for test in &failed {
                eprintln!("    {} {}", paint("✗", Style::new().red()), test.name);
                if let Some(error) = &test.error {
                    for line in error.lines() {
                        eprintln!("        {}", paint(line, Style::new().dimmed()));
                    }
                }
            }
            if failed.is_empty() {
                let lines: Vec<&str> = file.stderr.lines().collect();
                let start = lines.len().saturating_sub(STDERR_TAIL);
                for line in &lines[start..] {
                    eprintln!("    {}", paint(line, Style::new().dimmed()));
                }
            }
        }
        FileState::Skipped if !is_quiet() => {
            eprintln!(
                "{} {} {}",
                paint("○", Style::new().yellow()),
                file.display,
                paint("(skipped)", Style::new().dimmed())
            );
        }
        _ if !is_quiet() => {
            let passed = file
                .tests
                .iter()
                .filter(|t| t.status == TestStatus::Passed)
                .count();
            eprintln!(
                "{} {} {}",
                paint("✓", Style::new().green()),
                file.display,
                paint(&format!("({passed} tests, {duration})"), Style::new().dimmed())
            );
        }
        _ => {}
    }
}
