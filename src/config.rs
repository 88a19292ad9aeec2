//! Engine configuration loading from environment variables.
//!
//! All values are loaded from `HELPLINE_*` environment variables with
//! sensible defaults. Invalid values fall back to defaults without
//! crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `HELPLINE_MAX_STREAMING_SLOTS` | 2 | Streaming GPU slots |
//! | `HELPLINE_MAX_BATCH_SLOTS` | 4 | Batch GPU slots |
//! | `HELPLINE_MAX_QUEUE_SIZE` | 100 | Max queued requests |
//! | `HELPLINE_CLEANUP_MAX_AGE_HOURS` | 24 | Age before terminal requests are purged |
//! | `HELPLINE_STALE_PROCESSING_SECS` | 600 | Processing age swept to TIMEOUT |
//! | `HELPLINE_LOG_LEVEL` | info | Tracing filter |
//! | `HELPLINE_LOG_FORMAT` | json | `json` or `pretty` |

use crate::telemetry::{LogConfig, LogFormat};

/// Slot pool sizes for the resource manager.
#[derive(Debug, Clone)]
pub struct ResourcePoolConfig {
    pub max_streaming_slots: usize,
    pub max_batch_slots: usize,
}

impl Default for ResourcePoolConfig {
    fn default() -> Self {
        Self { max_streaming_slots: 2, max_batch_slots: 4 }
    }
}

/// All engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub resources: ResourcePoolConfig,
    pub max_queue_size: usize,
    pub cleanup_max_age_hours: i64,
    pub stale_processing_secs: i64,
    pub log: LogConfig,
}

/// Summary of all effective values, for startup logging.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub max_streaming_slots: usize,
    pub max_batch_slots: usize,
    pub max_queue_size: usize,
    pub cleanup_max_age_hours: i64,
    pub stale_processing_secs: i64,
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse an `i64` env var, returning `default` on missing or invalid.
fn parse_i64(key: &str, default: i64) -> i64 {
    match std::env::var(key) {
        Ok(val) => val.parse::<i64>().unwrap_or(default),
        Err(_) => default,
    }
}

fn load_log_config() -> LogConfig {
    let level = std::env::var("HELPLINE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let format = match std::env::var("HELPLINE_LOG_FORMAT").as_deref() {
        Ok("pretty") => LogFormat::Pretty,
        _ => LogFormat::Json,
    };
    LogConfig { format, level, output_path: None }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without
/// panicking. Slot counts may legitimately be zero (pool disabled);
/// queue size and ages have a floor of 1.
pub fn load() -> EnvConfig {
    let resources = ResourcePoolConfig {
        max_streaming_slots: parse_usize("HELPLINE_MAX_STREAMING_SLOTS", 2),
        max_batch_slots: parse_usize("HELPLINE_MAX_BATCH_SLOTS", 4),
    };
    let max_queue_size = parse_usize("HELPLINE_MAX_QUEUE_SIZE", 100).max(1);
    let cleanup_max_age_hours = parse_i64("HELPLINE_CLEANUP_MAX_AGE_HOURS", 24).max(1);
    let stale_processing_secs = parse_i64("HELPLINE_STALE_PROCESSING_SECS", 600).max(1);

    EnvConfig {
        resources,
        max_queue_size,
        cleanup_max_age_hours,
        stale_processing_secs,
        log: load_log_config(),
    }
}

impl EnvConfig {
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            max_streaming_slots: self.resources.max_streaming_slots,
            max_batch_slots: self.resources.max_batch_slots,
            max_queue_size: self.max_queue_size,
            cleanup_max_age_hours: self.cleanup_max_age_hours,
            stale_processing_secs: self.stale_processing_secs,
        }
    }
}
