//! Shared SQLite PRAGMA tuning for ledger connections

use rusqlite::Connection;

/// WAL checkpoint threshold in pages
pub const WAL_AUTOCHECKPOINT_PAGES: i64 = 1000;

/// Apply write-heavy PRAGMAs: WAL journal, NORMAL sync, in-memory temp store,
/// 5s busy timeout, periodic WAL checkpoints
pub fn apply_optimized_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    conn.pragma_update(None, "wal_autocheckpoint", WAL_AUTOCHECKPOINT_PAGES)?;
    Ok(())
}
