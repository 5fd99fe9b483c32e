//! Ledger configuration from environment variables

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound for `LEDGER_FLUSH_INTERVAL_MS` (one day)
pub const MAX_FLUSH_INTERVAL_MS: u64 = 86_400_000;

/// Upper bound for `LEDGER_COOLDOWN_MS` (one week)
pub const MAX_COOLDOWN_MS: u64 = 604_800_000;

/// Configuration for the ledger runtime
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Path to SQLite database file
    pub db_path: String,

    /// Directory holding the `*.sql` migrations
    pub schema_dir: String,

    /// Flush period in milliseconds
    pub flush_interval_ms: u64,

    /// Per-actor cooldown in milliseconds
    pub cooldown_ms: u64,

    /// Inbound channel buffer size (events)
    pub channel_buffer: usize,

    /// JSONL event file; stdin when unset
    pub events_path: Option<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            db_path: "activity_ledger.db".to_string(),
            schema_dir: "sql".to_string(),
            flush_interval_ms: 60_000,
            cooldown_ms: 60_000,
            channel_buffer: 10_000,
            events_path: None,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `LEDGER_DB_PATH` (default: activity_ledger.db)
    /// - `LEDGER_SCHEMA_DIR` (default: sql)
    /// - `LEDGER_FLUSH_INTERVAL_MS` (default: 60000)
    /// - `LEDGER_COOLDOWN_MS` (default: 60000)
    /// - `LEDGER_CHANNEL_BUFFER` (default: 10000)
    /// - `LEDGER_EVENTS_PATH` (default: unset, read stdin)
    ///
    /// Unparsable or zero numbers fall back to the default. The flush interval
    /// and cooldown are capped at `MAX_FLUSH_INTERVAL_MS` / `MAX_COOLDOWN_MS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            db_path: env::var("LEDGER_DB_PATH").unwrap_or(defaults.db_path),
            schema_dir: env::var("LEDGER_SCHEMA_DIR").unwrap_or(defaults.schema_dir),
            flush_interval_ms: positive_var("LEDGER_FLUSH_INTERVAL_MS")
                .map(|ms: u64| ms.min(MAX_FLUSH_INTERVAL_MS))
                .unwrap_or(defaults.flush_interval_ms),
            cooldown_ms: positive_var("LEDGER_COOLDOWN_MS")
                .map(|ms: u64| ms.min(MAX_COOLDOWN_MS))
                .unwrap_or(defaults.cooldown_ms),
            channel_buffer: positive_var("LEDGER_CHANNEL_BUFFER").unwrap_or(defaults.channel_buffer),
            events_path: env::var("LEDGER_EVENTS_PATH").ok().filter(|p| !p.trim().is_empty()),
        }
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms.min(MAX_FLUSH_INTERVAL_MS))
    }

    pub fn cooldown(&self) -> chrono::Duration {
        let ms = self.cooldown_ms.min(MAX_COOLDOWN_MS);
        chrono::Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
    }
}

fn positive_var<T>(name: &str) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
{
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .filter(|v| *v > T::default())
}
