//! # Activity Ledger Pipeline
//!
//! Write-behind batching for user activity events:
//! - Per-actor cooldown gate decides which events are admitted
//! - Admitted events accumulate in an in-memory buffer
//! - A periodic flush atomically drains the buffer, scores each actor from
//!   its group's role multipliers, and commits one batch to SQLite
//! - Shutdown stops the timer and runs one last flush so nothing buffered is
//!   abandoned
//!
//! ## Delivery
//!
//! Best-effort, at-most-once. A failed commit drops that cycle's batch, and a
//! killed process loses whatever was buffered since the last flush.
//!
//! ## Memory
//!
//! Neither the rate gate nor the buffer is bounded. The gate keeps one
//! timestamp per actor ever seen; the buffer holds everything admitted since
//! the last flush.
//!
//! ## Module Organization
//!
//! - `types` - Core data structures (ActivityEvent, PersistedRecord, GroupConfig)
//! - `rate_gate` - Per-actor cooldown
//! - `buffer` - Event buffer with atomic drain
//! - `scorer` - Role multiplier resolution
//! - `flush` - One flush cycle
//! - `scheduler` - Flush timer and shutdown
//! - `ingestion` - Event filters and channel ingestion loop
//! - `settings` / `roster` - Group settings and membership lookups
//! - `db` - Batch sink and schema migrations
//! - `notify` - Points notifications
//! - `source` - JSONL event source
//! - `engine` - Wiring

pub mod types;
pub mod error;
pub mod rate_gate;
pub mod buffer;
pub mod scorer;
pub mod flush;
pub mod scheduler;
pub mod ingestion;
pub mod settings;
pub mod roster;
pub mod db;
pub mod notify;
pub mod source;
pub mod engine;
pub mod config;

// Re-export commonly used types
pub use types::{ActivityEvent, GroupConfig, InboundEvent, PersistedRecord, RoleMultiplierTable};
pub use rate_gate::RateGate;
pub use buffer::EventBuffer;
pub use scorer::{ScoreResolver, DEFAULT_SCORE};
pub use flush::{FlushCycle, FlushReport};
pub use scheduler::FlushScheduler;
pub use ingestion::{IngestOutcome, IngestPipeline};
pub use settings::{InMemorySettings, SettingsProvider, SqliteSettingsStore};
pub use roster::{MemberRoster, RosterProvider};
pub use db::{BatchSink, MemorySink, SqliteBatchSink};
pub use notify::{ChannelNotifier, Notifier, PointsEvent};
pub use engine::{LedgerEngine, RunningLedger};
pub use config::LedgerConfig;
