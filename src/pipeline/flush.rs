//! Flush cycle: drain the buffer, score, commit
//!
//! One cycle:
//! 1. Atomically drain `EventBuffer` (empty → log and return)
//! 2. Drop events from automated actors, groupless contexts, and ids the
//!    sink cannot store
//! 3. Resolve one score per distinct (actor, group) pair
//! 4. Build a `PersistedRecord` per remaining event
//! 5. Commit the batch to the sink in one call
//!
//! Scoring and the commit happen after the buffer lock is released, so a slow
//! sink never blocks ingestion. A failed commit drops the batch: no retry and
//! no re-buffering.

use super::buffer::EventBuffer;
use super::db::BatchSink;
use super::scorer::{ScoreResolver, DEFAULT_SCORE};
use super::types::{ActivityEvent, ActorId, GroupId, PersistedRecord};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Outcome of one flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Events taken out of the buffer
    pub drained: usize,
    /// Drained events that are never persisted (bots, groupless, unstorable ids)
    pub skipped: usize,
    /// Records handed to the sink
    pub attempted: usize,
    /// Records the sink accepted (0 when the commit failed)
    pub committed: usize,
}

impl FlushReport {
    pub fn commit_failed(&self) -> bool {
        self.committed < self.attempted
    }
}

pub struct FlushCycle {
    buffer: Arc<EventBuffer>,
    resolver: ScoreResolver,
    sink: Arc<dyn BatchSink>,
}

impl FlushCycle {
    pub fn new(buffer: Arc<EventBuffer>, resolver: ScoreResolver, sink: Arc<dyn BatchSink>) -> Self {
        Self { buffer, resolver, sink }
    }

    /// Run one full cycle
    ///
    /// Callers must not run two cycles concurrently; `FlushScheduler` awaits
    /// each cycle before arming the next.
    pub async fn run_once(&self) -> FlushReport {
        let flush_start = Instant::now();
        let events = self.buffer.drain_all();

        if events.is_empty() {
            log::info!("Storing 0 cached events in database");
            return FlushReport::default();
        }

        let drained = events.len();
        let persistable: Vec<ActivityEvent> = events.into_iter().filter(is_persistable).collect();
        let skipped = drained - persistable.len();

        let scores = self.resolve_scores(&persistable);
        let records = build_records(persistable, &scores);
        let attempted = records.len();

        log::info!("Storing {} cached events in database", attempted);

        let mut report = FlushReport {
            drained,
            skipped,
            attempted,
            committed: 0,
        };

        if records.is_empty() {
            return report;
        }

        match self.sink.commit_batch(records).await {
            Ok(()) => {
                report.committed = attempted;
                log::debug!(
                    "✅ Flush complete: {} records to {} | {} skipped | {}ms",
                    attempted,
                    self.sink.sink_type(),
                    skipped,
                    flush_start.elapsed().as_millis()
                );
            }
            Err(e) => {
                log::error!(
                    "❌ Failed to commit {} records to {}, batch dropped: {}",
                    attempted,
                    self.sink.sink_type(),
                    e
                );
            }
        }

        report
    }

    /// One resolver call per distinct (actor, group) pair
    fn resolve_scores(&self, events: &[ActivityEvent]) -> HashMap<(ActorId, GroupId), f64> {
        let mut scores = HashMap::new();
        for event in events {
            if let Some(group_id) = event.group_id {
                scores
                    .entry((event.actor_id, group_id))
                    .or_insert_with(|| self.resolver.resolve(event.actor_id, group_id));
            }
        }
        scores
    }
}

/// Bots, groupless interactions and ids the sink cannot bind are never
/// written; one bad row would fail the whole batch transaction
pub fn is_persistable(event: &ActivityEvent) -> bool {
    !event.actor_is_bot && event.group_id.is_some() && event.has_storable_ids()
}

/// Attach scores to events
///
/// A pair missing from `scores` falls back to `DEFAULT_SCORE`. Groupless events
/// are dropped.
pub fn build_records(
    events: Vec<ActivityEvent>,
    scores: &HashMap<(ActorId, GroupId), f64>,
) -> Vec<PersistedRecord> {
    events
        .into_iter()
        .filter_map(|event| {
            let group_id = event.group_id?;
            let score = scores
                .get(&(event.actor_id, group_id))
                .copied()
                .unwrap_or(DEFAULT_SCORE);

            Some(PersistedRecord {
                timestamp: event.occurred_at,
                actor_id: event.actor_id,
                group_id,
                channel_id: event.channel_id,
                score,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::db::MemorySink;
    use crate::pipeline::error::{LookupError, SinkError};
    use crate::pipeline::roster::{MemberRoster, RosterProvider};
    use crate::pipeline::settings::InMemorySettings;
    use crate::pipeline::types::RoleId;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const GROUP: GroupId = 42;

    struct FailingSink;

    #[async_trait]
    impl BatchSink for FailingSink {
        async fn commit_batch(&self, _records: Vec<PersistedRecord>) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("connection refused".to_string()))
        }

        fn sink_type(&self) -> &'static str {
            "failing"
        }
    }

    /// Roster that counts lookups
    #[derive(Default)]
    struct CountingRoster {
        inner: MemberRoster,
        lookups: AtomicUsize,
    }

    impl RosterProvider for CountingRoster {
        fn actor_roles(&self, actor_id: ActorId, group_id: GroupId) -> Result<HashSet<RoleId>, LookupError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.actor_roles(actor_id, group_id)
        }
    }

    fn make_event(actor_id: ActorId, group_id: Option<GroupId>, actor_is_bot: bool) -> ActivityEvent {
        ActivityEvent {
            occurred_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            actor_id,
            group_id,
            channel_id: 9,
            actor_is_bot,
        }
    }

    fn make_cycle(sink: Arc<dyn BatchSink>) -> (Arc<EventBuffer>, Arc<CountingRoster>, FlushCycle) {
        let settings = Arc::new(InMemorySettings::new());
        settings.set_multiplier(GROUP, 100, 3.0);
        settings.set_multiplier(GROUP, 200, 5.0);

        let roster = Arc::new(CountingRoster::default());
        roster.inner.upsert_member(GROUP, 1, HashSet::from([200, 100]));
        roster.inner.upsert_member(GROUP, 2, HashSet::from([200]));

        let buffer = Arc::new(EventBuffer::new());
        let resolver = ScoreResolver::new(settings, roster.clone());
        let cycle = FlushCycle::new(buffer.clone(), resolver, sink);
        (buffer, roster, cycle)
    }

    #[tokio::test]
    async fn test_empty_flush_is_noop() {
        let sink = MemorySink::new();
        let (_buffer, _roster, cycle) = make_cycle(Arc::new(sink.clone()));

        let report = cycle.run_once().await;
        assert_eq!(report, FlushReport::default());
        assert!(sink.batches().is_empty());
    }

    #[tokio::test]
    async fn test_flush_scores_and_commits_one_batch() {
        let sink = MemorySink::new();
        let (buffer, _roster, cycle) = make_cycle(Arc::new(sink.clone()));

        buffer.append(make_event(1, Some(GROUP), false));
        buffer.append(make_event(2, Some(GROUP), false));
        buffer.append(make_event(3, Some(GROUP), false));

        let report = cycle.run_once().await;
        assert_eq!(report.drained, 3);
        assert_eq!(report.committed, 3);
        assert!(!report.commit_failed());
        assert!(buffer.is_empty());

        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        let scores: HashMap<ActorId, f64> = batches[0].iter().map(|r| (r.actor_id, r.score)).collect();
        assert_eq!(scores[&1], 3.0);
        assert_eq!(scores[&2], 5.0);
        // Not in the roster
        assert_eq!(scores[&3], DEFAULT_SCORE);
    }

    #[tokio::test]
    async fn test_flush_skips_bots_and_groupless() {
        let sink = MemorySink::new();
        let (buffer, _roster, cycle) = make_cycle(Arc::new(sink.clone()));

        buffer.append(make_event(1, Some(GROUP), false));
        buffer.append(make_event(2, Some(GROUP), true));
        buffer.append(make_event(3, None, false));

        let report = cycle.run_once().await;
        assert_eq!(report.drained, 3);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.attempted, 1);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].actor_id, 1);
    }

    #[tokio::test]
    async fn test_only_skipped_events_commit_nothing() {
        let sink = MemorySink::new();
        let (buffer, _roster, cycle) = make_cycle(Arc::new(sink.clone()));

        buffer.append(make_event(2, Some(GROUP), true));

        let report = cycle.run_once().await;
        assert_eq!(report.skipped, 1);
        assert_eq!(report.attempted, 0);
        assert!(sink.batches().is_empty());
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_resolver_called_once_per_pair() {
        let sink = MemorySink::new();
        let (buffer, roster, cycle) = make_cycle(Arc::new(sink.clone()));

        for _ in 0..5 {
            buffer.append(make_event(1, Some(GROUP), false));
        }
        buffer.append(make_event(2, Some(GROUP), false));
        buffer.append(make_event(1, Some(GROUP + 1), false));

        cycle.run_once().await;
        // GROUP + 1 has no multiplier table, so its pair never reaches the roster
        assert_eq!(roster.lookups.load(Ordering::SeqCst), 2);
        assert_eq!(sink.records().len(), 7);
    }

    #[tokio::test]
    async fn test_failed_commit_drops_batch() {
        let (buffer, _roster, cycle) = make_cycle(Arc::new(FailingSink));

        buffer.append(make_event(1, Some(GROUP), false));
        buffer.append(make_event(2, Some(GROUP), false));

        let report = cycle.run_once().await;
        assert_eq!(report.attempted, 2);
        assert_eq!(report.committed, 0);
        assert!(report.commit_failed());
        // Not re-buffered
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_id_does_not_fail_sqlite_batch() {
        use crate::pipeline::db::{run_schema_migrations, SqliteBatchSink};
        use rusqlite::Connection;
        use tempfile::NamedTempFile;

        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap().to_string();
        let mut conn = Connection::open(&db_path).unwrap();
        run_schema_migrations(&mut conn, "sql").unwrap();

        let sink = SqliteBatchSink::new(&db_path).unwrap();
        let (buffer, _roster, cycle) = make_cycle(Arc::new(sink));

        buffer.append(make_event(1, Some(GROUP), false));
        buffer.append(make_event(u64::MAX, Some(GROUP), false));

        let report = cycle.run_once().await;
        assert_eq!(report.drained, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.committed, 1);
        assert!(!report.commit_failed());

        let rows: Vec<i64> = conn
            .prepare("SELECT user_id FROM user_messages")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(rows, vec![1]);
    }

    #[test]
    fn test_build_records_defaults_missing_score() {
        let events = vec![make_event(1, Some(GROUP), false), make_event(5, None, false)];
        let records = build_records(events, &HashMap::new());

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].score, DEFAULT_SCORE);
        assert_eq!(records[0].group_id, GROUP);
    }
}
