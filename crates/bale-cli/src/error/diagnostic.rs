//! Conversion from [`CliError`] to miette reports.

use miette::Report;

use crate::error::CliError;

/// Library errors keep their own diagnostic codes; the rest get one here.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Build(e) => Report::new(e),
        CliError::Test(e) => Report::new(e),
        other => {
            let code = match &other {
                CliError::Config(_) => "bale::config",
                CliError::TestsFailed { .. } => "bale::test::failed",
                CliError::ThresholdFailed(_) => "bale::coverage::threshold",
                CliError::Render(_) => "bale::config",
                _ => "bale::io",
            };
            match other.hint() {
                Some(hint) => miette::miette!(code = code, help = hint, "{}", other),
                None => miette::miette!(code = code, "{}", other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bale_config::ConfigError;

    use super::*;

    #[test]
    fn config_errors_carry_code_and_help() {
        let report = cli_error_to_miette(CliError::Config(ConfigError::NoFormats));
        assert_eq!(report.code().unwrap().to_string(), "bale::config");
        assert!(report.help().unwrap().to_string().contains("build.formats"));
    }

    #[test]
    fn library_diagnostics_are_kept() {
        let report = cli_error_to_miette(CliError::Test(bale_test::Error::NoTestFiles {
            patterns: "**/*.test.ts".into(),
        }));
        assert_eq!(report.code().unwrap().to_string(), "bale::test::discovery");
    }
}
