//! Subscriber setup with format selection.

use anyhow::{Context, Result};
use tracing::Dispatch;
use tracing::dispatcher::DefaultGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

use super::{TracingConfig, config::LogFormat};

/// Guard that keeps the subscriber installed.
///
/// The subscriber is the default for the current thread only and is removed
/// when the guard is dropped.
pub struct TracingGuard {
    _default: DefaultGuard,
}

/// Build a log dispatcher for the given configuration.
///
/// The returned [`Dispatch`] is not installed anywhere; pass it to
/// [`init_tracing`] or to `tracing::dispatcher::with_default`.
pub fn build_dispatch(config: &TracingConfig) -> Result<Dispatch> {
    let filter = EnvFilter::try_new(config.log_filter())
        .with_context(|| format!("Invalid log filter '{}'", config.log_filter()))?;

    let dispatch = match config.log_format() {
        LogFormat::Json => Dispatch::new(
            tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .json()
                    .with_file(config.include_location())
                    .with_line_number(config.include_location())
                    .with_target(config.include_target())
                    .with_current_span(true)
                    .flatten_event(true),
            ),
        ),
        LogFormat::Pretty => Dispatch::new(
            tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .pretty()
                    .with_ansi(config.ansi())
                    .with_file(config.include_location())
                    .with_line_number(config.include_location())
                    .with_target(config.include_target()),
            ),
        ),
        LogFormat::Compact => Dispatch::new(
            tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .compact()
                    .with_ansi(config.ansi())
                    .with_file(config.include_location())
                    .with_line_number(config.include_location())
                    .with_target(config.include_target()),
            ),
        ),
    };

    Ok(dispatch)
}

/// Install logging for the current thread.
///
/// Returns a guard that must be kept alive for the duration of the program.
///
/// ```ignore
/// let _guard = init_tracing(&TracingConfig::from_env())?;
/// ```
pub fn init_tracing(config: &TracingConfig) -> Result<TracingGuard> {
    let dispatch = build_dispatch(config)?;
    Ok(TracingGuard {
        _default: tracing::dispatcher::set_default(&dispatch),
    })
}
