//! Durable sink for scored activity records
//!
//! Table written (see `sql/01_user_messages.sql`):
//! - `user_messages` - INSERT (append-only, one row per persisted event)
//!
//! A batch is committed in a single transaction. From the flush cycle's point
//! of view a commit either lands completely or not at all.

use super::error::SinkError;
use super::types::PersistedRecord;
use crate::sqlite_pragma::apply_optimized_pragmas;
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Bulk-insert target for flushed records
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Commit `records` as one all-or-nothing operation
    async fn commit_batch(&self, records: Vec<PersistedRecord>) -> Result<(), SinkError>;

    /// Sink name for logging
    fn sink_type(&self) -> &'static str;
}

/// Run schema migrations from SQL files
///
/// Reads all .sql files from `schema_dir`, sorted by file name, and executes
/// them. Every file must use `IF NOT EXISTS` so reruns are no-ops.
pub fn run_schema_migrations(conn: &mut Connection, schema_dir: &str) -> Result<(), SinkError> {
    let schema_path = Path::new(schema_dir);

    if !schema_path.exists() {
        return Err(SinkError::Unavailable(format!(
            "Schema directory not found: {}",
            schema_dir
        )));
    }

    apply_optimized_pragmas(conn)?;
    log::info!("📊 Enabled WAL mode for SQLite database");

    let mut sql_files: Vec<_> = fs::read_dir(schema_path)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();

    sql_files.sort_by_key(|entry| entry.file_name());

    log::info!("🔧 Running schema migrations from: {}", schema_dir);

    for entry in sql_files {
        let path = entry.path();
        let filename = entry.file_name().to_string_lossy().into_owned();

        log::info!("   ├─ Executing: {}", filename);
        let sql_content = fs::read_to_string(&path)?;
        conn.execute_batch(&sql_content)?;
        log::info!("   └─ ✅ Success: {}", filename);
    }

    log::info!("✅ All schema migrations completed successfully");
    Ok(())
}

/// SQLite implementation of `BatchSink`
pub struct SqliteBatchSink {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBatchSink {
    /// Open the sink
    ///
    /// The database must already carry the `user_messages` table; run
    /// `run_schema_migrations` first.
    pub fn new(db_path: &str) -> Result<Self, SinkError> {
        let conn = Connection::open(db_path)?;
        apply_optimized_pragmas(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl BatchSink for SqliteBatchSink {
    async fn commit_batch(&self, records: Vec<PersistedRecord>) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO user_messages (timestamp, user_id, guild_id, channel_id, points)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for record in &records {
                stmt.execute(params![
                    record.timestamp.timestamp_millis(),
                    record.actor_id,
                    record.group_id,
                    record.channel_id,
                    record.score,
                ])?;
            }
        }

        tx.commit()?;

        log::debug!("✅ Committed {} records to SQLite", records.len());
        Ok(())
    }

    fn sink_type(&self) -> &'static str {
        "SQLite"
    }
}

/// In-memory sink that keeps every committed batch
///
/// Used for dry runs and tests.
#[derive(Default, Clone)]
pub struct MemorySink {
    batches: Arc<Mutex<Vec<Vec<PersistedRecord>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<Vec<PersistedRecord>> {
        self.batches.lock().clone()
    }

    pub fn records(&self) -> Vec<PersistedRecord> {
        self.batches.lock().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl BatchSink for MemorySink {
    async fn commit_batch(&self, records: Vec<PersistedRecord>) -> Result<(), SinkError> {
        self.batches.lock().push(records);
        Ok(())
    }

    fn sink_type(&self) -> &'static str {
        "memory"
    }
}
