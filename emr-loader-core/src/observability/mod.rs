//! Logging setup for emr-loader.
//!
//! Components never reach for a global logger. The orchestrator owns a root
//! [`tracing::Span`] and hands every component a child span built with
//! [`instrument_component!`]; all events a component emits are recorded
//! inside that span, so each line carries the cluster and component it
//! belongs to.
//!
//! # Configuration
//!
//! The output format is controlled via `EMR_LOADER_LOG_FORMAT`:
//! - `json` - one JSON object per line
//! - `pretty` - multi-line colored output (default for TTY)
//! - `compact` - one line per event (default for non-TTY)
//!
//! ```ignore
//! use emr_loader_core::observability::{TracingConfig, init_tracing};
//!
//! let _guard = init_tracing(&TracingConfig::from_env())?;
//! ```

mod config;
mod tracing_setup;

pub use config::{LogFormat, TracingConfig, TracingConfigBuilder};
pub use tracing_setup::{TracingGuard, build_dispatch, init_tracing};

/// Create the span handed to a pipeline component, nested under `$parent`.
#[macro_export]
macro_rules! instrument_component {
    ($parent:expr, $component:expr) => {
        tracing::info_span!(parent: $parent, "component", component = $component)
    };
}
