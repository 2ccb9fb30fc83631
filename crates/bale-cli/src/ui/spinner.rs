use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::Style;

use crate::ui::{interactive, paint};

/// Spinner for work of unknown length. Hidden in CI, with `--quiet`, and when
/// stderr is not a terminal.
pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    /// Start spinning with `message`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use bale_cli::ui::Spinner;
    ///
    /// let spinner = Spinner::new("Bundling");
    /// spinner.finish("Bundled");
    /// ```
    pub fn new(message: &str) -> Self {
        if !interactive() {
            return Self {
                pb: ProgressBar::hidden(),
            };
        }
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["◐", "◓", "◑", "◒", "●"]);
        pb.set_style(style);
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { pb }
    }

    pub fn set_message(&self, message: &str) {
        self.pb.set_message(message.to_string());
    }

    /// Stop and leave a ✓ line behind.
    pub fn finish(&self, message: &str) {
        self.pb.finish_with_message(format!(
            "{} {}",
            paint("✓", Style::new().green()),
            message
        ));
    }

    /// Stop and leave a ✗ line behind.
    pub fn fail(&self, message: &str) {
        self.pb
            .finish_with_message(format!("{} {}", paint("✗", Style::new().red()), message));
    }

    /// Remove the spinner line without a message.
    pub fn clear(&self) {
        self.pb.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_lifecycle() {
        let spinner = Spinner::new("Building...");
        spinner.set_message("Bundling es");
        spinner.finish("Built");
        Spinner::new("Testing...").fail("Failed");
    }
}
