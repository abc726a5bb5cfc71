use std::path::PathBuf;
use std::time::Duration;

use crate::printing::RetryPolicy;

/// Server configuration
///
/// # Environment variables
///
/// Every knob can be overridden through the environment:
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | /var/lib/comanda | Working directory (job database, logs) |
/// | HTTP_PORT | 3000 | HTTP API port |
/// | ENVIRONMENT | development | development \| staging \| production |
/// | PAPER_WIDTH | 48 | Default paper width in columns |
/// | WORKER_COUNT | 4 | Concurrent print workers |
/// | MAX_RETRIES | 5 | Dispatch attempts before terminal failure |
/// | RETRY_BASE_MS | 2000 | Backoff base delay |
/// | RETRY_MAX_MS | 60000 | Backoff cap |
/// | POLL_INTERVAL_MS | 500 | Worker scan interval |
/// | SWEEP_INTERVAL_MS | 30000 | Stale sweep interval |
/// | STALE_AFTER_MS | 60000 | Printing considered stale (network transport) |
/// | RELAY_GRACE_MS | 120000 | Confirmation grace (relay transport) |
/// | CONNECT_TIMEOUT_MS | 5000 | Printer connect timeout |
/// | WRITE_TIMEOUT_MS | 5000 | Printer write timeout |
///
/// # Example
///
/// ```ignore
/// WORK_DIR=/data/comanda HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory, holds the job database and log files
    pub work_dir: String,
    /// HTTP API port
    pub http_port: u16,
    /// Runtime environment: development | staging | production
    pub environment: String,

    // === Rendering ===
    /// Default paper width in columns (58mm = 32, 80mm = 48)
    pub paper_width: usize,

    // === Dispatch ===
    /// Number of concurrent print workers
    pub worker_count: usize,
    /// Dispatch attempts before a job is terminally failed
    pub max_retries: u32,
    /// Backoff base delay (doubles per attempt)
    pub retry_base_ms: u64,
    /// Backoff cap
    pub retry_max_ms: u64,
    /// Worker scan interval
    pub poll_interval_ms: u64,
    /// Stale sweep interval
    pub sweep_interval_ms: u64,
    /// A network-transport job stuck in printing longer than this is presumed
    /// to have lost its worker
    pub stale_after_ms: u64,
    /// A relay-transport job unconfirmed longer than this is reclaimed
    pub relay_grace_ms: u64,
    /// Printer connect timeout
    pub connect_timeout_ms: u64,
    /// Printer write timeout
    pub write_timeout_ms: u64,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from the environment
    ///
    /// Unset variables fall back to the defaults above.
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/comanda".into()),
            http_port: env_parse("HTTP_PORT", 3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),

            paper_width: env_parse("PAPER_WIDTH", 48),

            worker_count: env_parse("WORKER_COUNT", 4),
            max_retries: env_parse("MAX_RETRIES", 5),
            retry_base_ms: env_parse("RETRY_BASE_MS", 2_000),
            retry_max_ms: env_parse("RETRY_MAX_MS", 60_000),
            poll_interval_ms: env_parse("POLL_INTERVAL_MS", 500),
            sweep_interval_ms: env_parse("SWEEP_INTERVAL_MS", 30_000),
            stale_after_ms: env_parse("STALE_AFTER_MS", 60_000),
            relay_grace_ms: env_parse("RELAY_GRACE_MS", 120_000),
            connect_timeout_ms: env_parse("CONNECT_TIMEOUT_MS", 5_000),
            write_timeout_ms: env_parse("WRITE_TIMEOUT_MS", 5_000),
        }
    }

    /// Override selected values
    ///
    /// Mostly used by tests.
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    /// Path of the job database inside the working directory
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("print_jobs.redb")
    }

    /// Retry policy derived from the configured limits
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_ms),
            max_delay: Duration::from_millis(self.retry_max_ms),
        }
    }

    /// Whether this is a production deployment
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Whether this is a development deployment
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
