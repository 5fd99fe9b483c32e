//! Event ingestion: filter, rate-gate, buffer, notify
//!
//! Filters short-circuit in this order:
//! 1. groupless (direct) interactions
//! 2. ids the sink cannot store (above `i64::MAX`)
//! 3. actor holds a blacklisted role
//! 4. channel is blacklisted
//! 5. actor is still cooling down
//!
//! A rejection is a decision, not an error; nothing propagates to the source.

use super::buffer::EventBuffer;
use super::notify::{Notifier, PointsEvent};
use super::rate_gate::RateGate;
use super::roster::MemberRoster;
use super::settings::SettingsProvider;
use super::types::{ActivityEvent, InboundEvent, RoleId};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Decision taken for one inbound event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Buffered,
    NotMemberContext,
    UnstorableId,
    SettingsUnavailable,
    BlacklistedRole,
    BlacklistedChannel,
    RateLimited,
}

pub struct IngestPipeline {
    settings: Arc<dyn SettingsProvider>,
    gate: RateGate,
    buffer: Arc<EventBuffer>,
    notifier: Arc<dyn Notifier>,

    /// Decision-time clock (for testing with mock time)
    now_fn: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl IngestPipeline {
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        gate: RateGate,
        buffer: Arc<EventBuffer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::new_with_clock(settings, gate, buffer, notifier, Box::new(Utc::now))
    }

    pub fn new_with_clock(
        settings: Arc<dyn SettingsProvider>,
        gate: RateGate,
        buffer: Arc<EventBuffer>,
        notifier: Arc<dyn Notifier>,
        now_fn: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
    ) -> Self {
        Self {
            settings,
            gate,
            buffer,
            notifier,
            now_fn,
        }
    }

    /// Handle one event with the roles the actor held when it happened
    ///
    /// Group settings are read fresh for every call. The cooldown is checked
    /// against the pipeline clock, not `event.occurred_at`.
    pub fn on_event(&self, event: ActivityEvent, actor_roles: &HashSet<RoleId>) -> IngestOutcome {
        let Some(group_id) = event.group_id else {
            return IngestOutcome::NotMemberContext;
        };

        if !event.has_storable_ids() {
            log::warn!(
                "⚠️  Rejecting event with out-of-range id (actor {}, group {}, channel {})",
                event.actor_id,
                group_id,
                event.channel_id
            );
            return IngestOutcome::UnstorableId;
        }

        let config = match self.settings.group_config(group_id) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("⚠️  Rejecting event, settings unavailable for group {}: {}", group_id, e);
                return IngestOutcome::SettingsUnavailable;
            }
        };

        if !config.blacklisted_roles.is_disjoint(actor_roles) {
            return IngestOutcome::BlacklistedRole;
        }

        if config.blacklisted_channels.contains(&event.channel_id) {
            return IngestOutcome::BlacklistedChannel;
        }

        if !self.gate.admit(event.actor_id, (self.now_fn)()) {
            return IngestOutcome::RateLimited;
        }

        let actor_id = event.actor_id;
        self.buffer.append(event);
        self.notifier.notify(PointsEvent::PointsEligible { actor_id, group_id });

        IngestOutcome::Buffered
    }

    pub fn gate(&self) -> &RateGate {
        &self.gate
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

/// Counters returned when the inbound channel closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub received: u64,
    pub buffered: u64,
}

/// Feed inbound events through the pipeline until the channel closes
///
/// Each event first refreshes the member roster with the roles it carries, so
/// flush-time scoring sees the latest observed membership. Every event
/// already queued when the senders drop is still processed.
pub async fn start_ingestion(
    mut rx: mpsc::Receiver<InboundEvent>,
    pipeline: Arc<IngestPipeline>,
    roster: Arc<MemberRoster>,
) -> IngestStats {
    log::info!("🚀 Starting event ingestion");

    let mut stats = IngestStats::default();
    let mut window_count = 0u64;
    let mut last_log_time = Instant::now();

    while let Some(inbound) = rx.recv().await {
        let roles = inbound.role_set();
        let event = inbound.event;

        if let Some(group_id) = event.group_id {
            roster.upsert_member(group_id, event.actor_id, roles.clone());
        }

        let actor_id = event.actor_id;
        let outcome = pipeline.on_event(event, &roles);
        if outcome == IngestOutcome::Buffered {
            stats.buffered += 1;
        } else {
            log::debug!("Event from {} not buffered: {:?}", actor_id, outcome);
        }

        stats.received += 1;
        window_count += 1;

        if last_log_time.elapsed().as_secs() >= 10 {
            let events_per_sec = window_count as f64 / last_log_time.elapsed().as_secs_f64();
            log::info!(
                "📊 Ingestion rate: {:.1} events/sec (buffered: {}, tracked actors: {})",
                events_per_sec,
                pipeline.buffered(),
                pipeline.gate().tracked_actors()
            );
            last_log_time = Instant::now();
            window_count = 0;
        }
    }

    log::info!(
        "✅ Event ingestion stopped ({} received, {} buffered)",
        stats.received,
        stats.buffered
    );
    stats
}
