//! Observability for the bot team runtime.
//!
//! - **logging**: human-readable or JSON output via `tracing-subscriber`
//! - **metrics**: counters, gauges and histograms with Prometheus and JSON export

pub mod logging;
pub mod metrics;
