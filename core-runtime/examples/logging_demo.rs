//! Logging system demonstration
//!
//! Shows how bridge lifecycle events look in each output format.
//!
//! Run with:
//! ```bash
//! # Pretty format (default in debug)
//! cargo run -p core-runtime --example logging_demo
//!
//! # JSON format
//! cargo run -p core-runtime --example logging_demo -- json
//!
//! # Compact format with a custom filter
//! cargo run -p core-runtime --example logging_demo -- compact "core_bridge=trace"
//! ```

use bridge_traits::log::{ConsoleLogger, LogLevel};
use core_runtime::config::BridgeConfig;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use std::env;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::default(),
    };

    let mut logging = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Trace)
        .with_spans(true)
        .with_thread_info(true)
        .with_logger_sink(Arc::new(ConsoleLogger {
            min_level: LogLevel::Warn,
        }));

    if let Some(filter) = args.get(2) {
        logging = logging.with_filter(filter.clone());
    }

    let config = BridgeConfig::builder().logging(logging).build()?;
    if let Some(logging) = config.logging.clone() {
        init_logging(logging)?;
    }

    info!(?format, workers = config.worker_threads, "Logging initialized");

    let span = info_span!(target: "core_bridge::bridge", "fallibleMe", handle = "native#1");
    let _entered = span.enter();
    debug!(target: "core_bridge::registry", handle = "native#1", "handle allocated");
    debug!(target: "core_bridge::bridge", handle = "native#1", outcome = "failed", "call settled");
    warn!(target: "core_bridge::registry", handle = "native#1", "handle released twice");

    Ok(())
}
