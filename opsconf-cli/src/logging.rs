//! Structured logging initialization
//!
//! Logs always go to stderr so generated configs printed on stdout stay clean.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use opsconf_core::config::GeneralConfig;

use crate::error::CliError;

/// Pick the filter directive: `RUST_LOG`, then `--log-level`, then settings.
pub fn filter_directive(
    rust_log: Option<String>,
    cli_level: Option<&str>,
    config: &GeneralConfig,
) -> String {
    rust_log
        .filter(|v| !v.trim().is_empty())
        .or_else(|| cli_level.map(str::to_owned))
        .unwrap_or_else(|| config.log_level.clone())
}

/// Initialize the global tracing subscriber.
///
/// Must be called once, before any tracing macros are used.
///
/// # Formats
///
/// * `"json"` - Machine-parseable JSON lines
/// * `"pretty"` - Human-readable colored output
pub fn init_tracing(cli_level: Option<&str>, config: &GeneralConfig) -> Result<(), CliError> {
    let directive = filter_directive(std::env::var("RUST_LOG").ok(), cli_level, config);
    let env_filter = EnvFilter::try_new(&directive)
        .map_err(|e| CliError::Config(format!("invalid log filter '{directive}': {e}")))?;

    match config.log_format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .map_err(|e| {
                CliError::Command(format!("failed to initialize JSON tracing subscriber: {e}"))
            }),
        "pretty" => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .map_err(|e| {
                CliError::Command(format!("failed to initialize pretty tracing subscriber: {e}"))
            }),
        other => Err(CliError::Config(format!(
            "unknown log format '{other}', expected 'json' or 'pretty'"
        ))),
    }
}
