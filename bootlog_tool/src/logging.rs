//! Diagnostic log setup for the tool itself

use bootlog_common::config::LogLevel;
use tracing_subscriber::EnvFilter;

/// Default filter directive: the configured level, raised to at least
/// `debug` by `--verbose`.
pub fn filter_directive(configured: LogLevel, verbose: bool) -> &'static str {
    match configured {
        LogLevel::Trace => configured.as_str(),
        _ if verbose => LogLevel::Debug.as_str(),
        _ => configured.as_str(),
    }
}

/// `RUST_LOG` if set, otherwise [`filter_directive`]
pub fn env_filter(configured: LogLevel, verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(configured, verbose)))
}

/// Install the global subscriber on stderr, JSON-formatted if requested.
pub fn setup_tracing(configured: LogLevel, verbose: bool, json: bool) {
    let filter = env_filter(configured, verbose);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
