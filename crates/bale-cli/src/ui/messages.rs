//! Status lines. Everything but errors is dropped with `--quiet`.

use owo_colors::Style;

use crate::ui::{is_quiet, paint};

/// Print a success line to stderr.
///
/// # Arguments
///
/// * `message` - Message to display
///
/// # Examples
///
/// ```no_run
/// use bale_cli::ui::success;
///
/// success("Build completed");
/// ```
pub fn success(message: &str) {
    if !is_quiet() {
        eprintln!("{} {}", paint("✓", Style::new().green().bold()), message);
    }
}

/// Print an info line to stderr.
///
/// # Arguments
///
/// * `message` - Message to display
///
/// # Examples
///
/// ```no_run
/// use bale_cli::ui::info;
///
/// info("Coverage reports written to coverage/");
/// ```
pub fn info(message: &str) {
    if !is_quiet() {
        eprintln!("{} {}", paint("ℹ", Style::new().blue().bold()), message);
    }
}

/// Print a warning line to stderr.
///
/// # Arguments
///
/// * `message` - Message to display
///
/// # Examples
///
/// ```no_run
/// use bale_cli::ui::warning;
///
/// warning("Coverage reports skipped because tests failed");
/// ```
pub fn warning(message: &str) {
    if !is_quiet() {
        eprintln!(
            "{} {}",
            paint("⚠", Style::new().yellow().bold()),
            paint(message, Style::new().yellow())
        );
    }
}

/// Print an error line to stderr.
///
/// Unlike the other status lines this one is printed under `--quiet`.
///
/// # Arguments
///
/// * `message` - Message to display
///
/// # Examples
///
/// ```no_run
/// use bale_cli::ui::error;
///
/// error("Build failed");
/// ```
pub fn error(message: &str) {
    eprintln!(
        "{} {}",
        paint("✗", Style::new().red().bold()),
        paint(message, Style::new().red())
    );
}
