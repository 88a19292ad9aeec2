//! Telemetry: structured logging and metrics recording.

mod logging;
pub mod metrics;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
