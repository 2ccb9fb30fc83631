//! Logging setup on top of `tracing-subscriber`.
//!
//! Log lines go to stderr so that stdout stays machine-readable for
//! `bale config show` and the coverage table.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CRATES: [&str; 5] = ["bale_cli", "bale_config", "bale_graph", "bale_bundler", "bale_test"];

/// Filter directives for every bale crate at `level`.
fn bale_filter(level: &str) -> String {
    CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Pick the filter for the global flags.
///
/// 1. `--verbose`: debug for bale crates
/// 2. `--quiet`: errors only
/// 3. `RUST_LOG`, when set
/// 4. info for bale crates
pub fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(bale_filter("debug"))
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(bale_filter("info")))
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color && crate::ui::should_use_color())
        .compact();

    let _ = tracing_subscriber::registry()
        .with(filter_for(verbose, quiet))
        .with(fmt_layer)
        .try_init();
}
