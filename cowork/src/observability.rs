//! Tracing init.
//!
//! Uses cowork_core::config::ObservabilityConfig for COWORK_QUIET, COWORK_LOG_LEVEL and
//! COWORK_LOG_JSON. `RUST_LOG` wins when set.

use cowork_core::config::ObservabilityConfig;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Tracing initialization mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingMode {
    /// Use COWORK_LOG_LEVEL / COWORK_QUIET as configured
    Default,
    /// Chat: agent-internal warnings would interleave with the conversation, keep errors only
    Chat,
}

fn filter_directives(cfg: &ObservabilityConfig, mode: TracingMode) -> String {
    let mut level = if cfg.quiet {
        "cowork=warn".to_string()
    } else {
        cfg.log_level.clone()
    };
    if mode == TracingMode::Chat {
        level = format!("{},cowork_agent=error", level);
    }
    level
}

/// Initialize tracing. Call once at process startup; later calls are no-ops.
pub fn init_tracing(mode: TracingMode) {
    let cfg = ObservabilityConfig::from_env();
    let level = filter_directives(cfg, mode);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    // stdout carries replies; logs go to stderr.
    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}
