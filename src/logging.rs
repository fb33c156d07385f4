//! Diagnostic logging to stderr

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Takes precedence over `RUST_LOG`
pub const LOG_ENV: &str = "REQCHAIN_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Filter directive for `-v` repetitions
pub fn level_for_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn build_filter(verbose: u8) -> EnvFilter {
    let from_env = std::env::var(LOG_ENV)
        .ok()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .filter(|v| !v.trim().is_empty());

    // Explicit -v wins over the environment
    match from_env {
        Some(directives) if verbose == 0 => EnvFilter::try_new(directives)
            .unwrap_or_else(|_| EnvFilter::new(level_for_verbosity(0))),
        _ => EnvFilter::new(level_for_verbosity(verbose)),
    }
}

/// Install the global subscriber; later calls are no-ops
pub fn init(verbose: u8, format: LogFormat) {
    let registry = tracing_subscriber::registry().with(build_filter(verbose));
    let result = match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    // Already installed (tests, repeated init)
    result.ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for_verbosity(0), "warn");
        assert_eq!(level_for_verbosity(1), "info");
        assert_eq!(level_for_verbosity(2), "debug");
        assert_eq!(level_for_verbosity(9), "trace");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(0, LogFormat::Text);
        init(2, LogFormat::Json);
    }
}
