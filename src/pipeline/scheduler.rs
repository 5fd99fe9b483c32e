//! Periodic flush scheduling and graceful shutdown
//!
//! The timer task awaits each flush inside its loop, so at most one flush is
//! ever in flight. Late ticks are delayed rather than bursted.

use super::flush::{FlushCycle, FlushReport};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

/// Longest accepted flush period; longer requests are clamped
pub const MAX_FLUSH_PERIOD: Duration = Duration::from_secs(86_400);

const MIN_FLUSH_PERIOD: Duration = Duration::from_millis(1);

pub struct FlushScheduler {
    cycle: Arc<FlushCycle>,
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl FlushScheduler {
    /// Spawn the timer task; the first flush fires one `period` from now
    ///
    /// `period` is clamped to `1ms..=MAX_FLUSH_PERIOD`.
    pub fn spawn(cycle: Arc<FlushCycle>, period: Duration) -> Self {
        let period = period.clamp(MIN_FLUSH_PERIOD, MAX_FLUSH_PERIOD);
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(flush_loop(cycle.clone(), period, stop_rx));

        Self {
            cycle,
            stop_tx,
            handle,
        }
    }

    /// Stop the timer, then run one final flush and wait for it
    ///
    /// A flush already running when this is called finishes first. The final
    /// flush follows the normal cycle; a commit failure there is logged and
    /// shutdown still completes.
    pub async fn shutdown(self) -> FlushReport {
        log::info!("🛑 Stopping flush timer");
        let _ = self.stop_tx.send(());

        if let Err(e) = self.handle.await {
            log::error!("❌ Flush timer task ended abnormally: {}", e);
        }

        log::info!("🔄 Performing final flush...");
        let report = self.cycle.run_once().await;

        if report.commit_failed() {
            log::error!(
                "❌ Final flush lost {} records, shutting down anyway",
                report.attempted
            );
        } else {
            log::info!("✅ Final flush complete ({} records)", report.committed);
        }

        report
    }
}

async fn flush_loop(cycle: Arc<FlushCycle>, period: Duration, mut stop_rx: oneshot::Receiver<()>) {
    log::info!("⏰ Starting flush scheduler (interval: {}ms)", period.as_millis());

    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            // Fires on explicit stop and when the scheduler is dropped
            _ = &mut stop_rx => break,

            _ = timer.tick() => {
                cycle.run_once().await;
            }
        }
    }

    log::info!("⏰ Flush scheduler stopped");
}
