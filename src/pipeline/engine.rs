//! Ledger engine - wiring for the write-behind batching core
//!
//! ## Architecture
//!
//! ```text
//! InboundEvent
//!     ↓
//! IngestPipeline::on_event()   (filters → RateGate → EventBuffer → notify)
//!     ↓
//! EventBuffer
//!     ↓  every flush interval, and once more at shutdown
//! FlushCycle::run_once()       (drain → ScoreResolver → BatchSink)
//! ```
//!
//! The engine owns the buffer and the rate gate. `start` spawns the flush
//! timer; `RunningLedger::shutdown` stops it and performs the final flush.

use super::buffer::EventBuffer;
use super::db::BatchSink;
use super::flush::{FlushCycle, FlushReport};
use super::ingestion::IngestPipeline;
use super::notify::Notifier;
use super::rate_gate::RateGate;
use super::roster::RosterProvider;
use super::scheduler::FlushScheduler;
use super::scorer::ScoreResolver;
use super::settings::SettingsProvider;
use std::sync::Arc;
use std::time::Duration;

pub struct LedgerEngine {
    buffer: Arc<EventBuffer>,
    pipeline: Arc<IngestPipeline>,
    cycle: Arc<FlushCycle>,
}

impl LedgerEngine {
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        roster: Arc<dyn RosterProvider>,
        sink: Arc<dyn BatchSink>,
        notifier: Arc<dyn Notifier>,
        cooldown: chrono::Duration,
    ) -> Self {
        let buffer = Arc::new(EventBuffer::new());

        let pipeline = Arc::new(IngestPipeline::new(
            settings.clone(),
            RateGate::new(cooldown),
            buffer.clone(),
            notifier,
        ));

        let resolver = ScoreResolver::new(settings, roster);
        let cycle = Arc::new(FlushCycle::new(buffer.clone(), resolver, sink));

        Self {
            buffer,
            pipeline,
            cycle,
        }
    }

    pub fn pipeline(&self) -> Arc<IngestPipeline> {
        self.pipeline.clone()
    }

    pub fn buffer(&self) -> Arc<EventBuffer> {
        self.buffer.clone()
    }

    /// Run a flush now, outside the timer
    ///
    /// Only for use before `start`; the scheduler owns flushing afterwards.
    pub async fn flush_now(&self) -> FlushReport {
        self.cycle.run_once().await
    }

    /// Spawn the periodic flush timer
    pub fn start(self, flush_interval: Duration) -> RunningLedger {
        let scheduler = FlushScheduler::spawn(self.cycle, flush_interval);

        RunningLedger {
            buffer: self.buffer,
            pipeline: self.pipeline,
            scheduler,
        }
    }
}

/// Engine with a live flush timer
pub struct RunningLedger {
    buffer: Arc<EventBuffer>,
    pipeline: Arc<IngestPipeline>,
    scheduler: FlushScheduler,
}

impl RunningLedger {
    pub fn pipeline(&self) -> Arc<IngestPipeline> {
        self.pipeline.clone()
    }

    pub fn buffer(&self) -> Arc<EventBuffer> {
        self.buffer.clone()
    }

    /// Stop the timer and flush everything still buffered
    ///
    /// Stop feeding `pipeline()` before calling this; events appended after the
    /// final drain are not flushed.
    pub async fn shutdown(self) -> FlushReport {
        let report = self.scheduler.shutdown().await;

        if !self.buffer.is_empty() {
            log::warn!(
                "⚠️  {} events arrived after the final flush and were not persisted",
                self.buffer.len()
            );
        }

        report
    }
}
