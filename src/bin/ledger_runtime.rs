//! Ledger Runtime
//!
//! Reads activity events as JSONL (file or stdin), runs them through the
//! ingest pipeline, and flushes scored batches to SQLite on a timer.
//!
//! Usage:
//!   cargo run --release --bin ledger_runtime < events.jsonl
//!
//! Environment variables:
//!   LEDGER_DB_PATH - SQLite database path (default: activity_ledger.db)
//!   LEDGER_SCHEMA_DIR - Migration directory (default: sql)
//!   LEDGER_FLUSH_INTERVAL_MS - Flush interval (default: 60000)
//!   LEDGER_COOLDOWN_MS - Per-actor cooldown (default: 60000)
//!   LEDGER_CHANNEL_BUFFER - Inbound channel size (default: 10000)
//!   LEDGER_EVENTS_PATH - JSONL event file (default: stdin)

use activity_ledger::pipeline::{
    config::LedgerConfig,
    db::{run_schema_migrations, BatchSink, SqliteBatchSink},
    engine::LedgerEngine,
    ingestion::start_ingestion,
    notify::ChannelNotifier,
    roster::MemberRoster,
    settings::SqliteSettingsStore,
    source::read_events_jsonl,
    types::InboundEvent,
};
use dotenv::dotenv;
use log::{error, info, warn};
use rusqlite::Connection;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    info!("🚀 Activity Ledger Runtime");

    let config = LedgerConfig::from_env();
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Flush interval: {}ms", config.flush_interval_ms);
    info!("   ├─ Cooldown: {}ms", config.cooldown_ms);
    info!("   ├─ Channel buffer: {} events", config.channel_buffer);
    info!(
        "   └─ Events: {}",
        config.events_path.as_deref().unwrap_or("stdin")
    );

    // Initialize database
    info!("🔧 Initializing database...");
    let mut conn = Connection::open(&config.db_path)?;
    run_schema_migrations(&mut conn, &config.schema_dir)?;
    drop(conn);

    let sink: Arc<dyn BatchSink> = Arc::new(SqliteBatchSink::new(&config.db_path)?);
    let settings = Arc::new(SqliteSettingsStore::new(&config.db_path)?);
    let roster = Arc::new(MemberRoster::new());
    info!("✅ Database initialized");

    // Points notifications are consumed here until another collaborator
    // subscribes
    let (notifier, mut notifications) = ChannelNotifier::new();
    tokio::spawn(async move {
        while let Some(event) = notifications.recv().await {
            log::debug!("🔔 {} {:?}", event.kind(), event);
        }
    });

    let engine = LedgerEngine::new(
        settings,
        roster.clone(),
        sink,
        Arc::new(notifier),
        config.cooldown(),
    );
    let pipeline = engine.pipeline();
    let running = engine.start(config.flush_interval());

    let (tx, rx) = mpsc::channel::<InboundEvent>(config.channel_buffer);

    let ingestion_handle = tokio::spawn(start_ingestion(rx, pipeline, roster));

    let events_path = config.events_path.clone();
    let mut source_handle = tokio::spawn(async move {
        match events_path {
            Some(path) => {
                let file = tokio::fs::File::open(&path).await?;
                read_events_jsonl(BufReader::new(file), tx).await
            }
            None => read_events_jsonl(BufReader::new(tokio::io::stdin()), tx).await,
        }
    });

    info!("🔄 Press CTRL+C to shutdown gracefully");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("⚠️  Received CTRL+C, shutting down..."),
                Err(err) => error!("❌ Failed to listen for CTRL+C: {}", err),
            }
            // Dropping the source closes the channel once queued events drain
            source_handle.abort();
        }
        result = &mut source_handle => {
            match result {
                Ok(Ok(sent)) => info!("📖 Event source exhausted after {} events, shutting down...", sent),
                Ok(Err(e)) => error!("❌ Event source failed: {}", e),
                Err(e) => error!("❌ Event source task panicked: {}", e),
            }
        }
    }

    match ingestion_handle.await {
        Ok(stats) => info!(
            "📊 Ingested {} events ({} buffered)",
            stats.received, stats.buffered
        ),
        Err(e) => warn!("⚠️  Ingestion task ended abnormally: {}", e),
    }

    let report = running.shutdown().await;
    info!(
        "✅ Ledger runtime stopped (final flush: {} committed, {} skipped)",
        report.committed, report.skipped
    );

    Ok(())
}
