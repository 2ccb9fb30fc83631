//! Sizes, durations and the build summary.

use std::time::Duration;

use bale_bundler::BuildReport;
use console::Term;
use owo_colors::Style;

use crate::ui::{is_quiet, paint};

/// Format a byte count with binary units.
///
/// # Arguments
///
/// * `bytes` - Size in bytes
///
/// # Returns
///
/// Whole bytes below 1 KB, otherwise two decimals (e.g. "1.50 KB")
///
/// # Examples
///
/// ```
/// use bale_cli::ui::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(500), "500 B");
/// assert_eq!(format_size(1536), "1.50 KB");
/// assert_eq!(format_size(2 * 1_048_576), "2.00 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.2} {}", UNITS[unit])
    }
}

/// Format a duration for build and test summaries.
///
/// # Arguments
///
/// * `duration` - Duration to format
///
/// # Returns
///
/// Milliseconds below a second, seconds below a minute, then minutes
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use bale_cli::ui::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else if ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// Print the artifact table to stderr: name, size and kind, then the total.
///
/// Nothing is printed with `--quiet`.
///
/// # Arguments
///
/// * `report` - Report returned by `LibraryBuilder::build`
pub fn print_build_summary(report: &BuildReport) {
    if is_quiet() {
        return;
    }
    let width = usize::from(Term::stderr().size().1).clamp(40, 80);
    let name_width = report
        .artifacts
        .iter()
        .map(|a| a.file_name.len())
        .max()
        .unwrap_or(0);

    eprintln!(
        "\n{} {}",
        paint("Output", Style::new().bold().underline()),
        paint(&report.out_dir.display().to_string(), Style::new().dimmed())
    );
    eprintln!("{}", "─".repeat(width));
    for artifact in &report.artifacts {
        eprintln!(
            "  {} {} {} {}",
            paint("▸", Style::new().blue()),
            paint(
                &format!("{:<name_width$}", artifact.file_name),
                Style::new().bright_white().bold()
            ),
            paint(&format!("{:>10}", format_size(artifact.size as u64)), Style::new().dimmed()),
            paint(&artifact.kind.label(), Style::new().dimmed()),
        );
    }
    eprintln!("{}", "─".repeat(width));
    eprintln!(
        "  {} {} in {}",
        paint("Total:", Style::new().bold()),
        paint(&format_size(report.total_size() as u64), Style::new().green()),
        paint(&format_duration(report.duration), Style::new().green())
    );
}
