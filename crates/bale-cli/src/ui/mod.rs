//! Terminal output on stderr: status lines, a spinner and summaries.
//!
//! Output degrades in CI and when stderr is not a terminal: no spinner, and
//! no colors unless `FORCE_COLOR` is set.

mod format;
mod messages;
mod results;
mod spinner;

use std::sync::atomic::{AtomicBool, Ordering};

use owo_colors::{OwoColorize, Style};

pub use format::{format_duration, format_size, print_build_summary};
pub use messages::{error, info, success, warning};
pub use results::print_test_results;
pub use spinner::Spinner;

static QUIET: AtomicBool = AtomicBool::new(false);
static COLOR: AtomicBool = AtomicBool::new(true);

/// Apply the global flags. Call once, before any output.
pub fn init(quiet: bool, no_color: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
    COLOR.store(!no_color && should_use_color(), Ordering::Relaxed);
}

pub fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

/// Detects GitHub Actions, GitLab CI, CircleCI, Travis and generic `CI`.
pub fn is_ci() -> bool {
    ["CI", "GITHUB_ACTIONS", "GITLAB_CI", "CIRCLECI", "TRAVIS"]
        .iter()
        .any(|var| std::env::var_os(var).is_some())
}

/// `NO_COLOR` beats `FORCE_COLOR`; otherwise color when stderr is a terminal.
pub fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::user_attended_stderr()
}

/// Whether animated output makes sense right now.
pub fn interactive() -> bool {
    !is_quiet() && !is_ci() && console::user_attended_stderr()
}

pub(crate) fn paint(text: &str, style: Style) -> String {
    if COLOR.load(Ordering::Relaxed) {
        text.style(style).to_string()
    } else {
        text.to_string()
    }
}
