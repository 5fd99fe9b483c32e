//! Core data structures for the activity ledger
//!
//! `ActivityEvent` flows from the event source through ingestion into the
//! buffer; the flush cycle turns each surviving event into a
//! `PersistedRecord` carrying the actor's score.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub type ActorId = u64;
pub type GroupId = u64;
pub type ChannelId = u64;
pub type RoleId = u64;

/// One admitted user action
///
/// Immutable once built. `group_id` is `None` for direct (groupless)
/// interactions, which are never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub occurred_at: DateTime<Utc>,
    pub actor_id: ActorId,
    pub group_id: Option<GroupId>,
    pub channel_id: ChannelId,
    #[serde(default)]
    pub actor_is_bot: bool,
}

/// Largest id SQLite can store in an INTEGER column
pub const MAX_STORABLE_ID: u64 = i64::MAX as u64;

impl ActivityEvent {
    /// True when every id fits the sink's signed 64-bit columns
    pub fn has_storable_ids(&self) -> bool {
        self.actor_id <= MAX_STORABLE_ID
            && self.channel_id <= MAX_STORABLE_ID
            && self.group_id.map_or(true, |g| g <= MAX_STORABLE_ID)
    }
}

/// Unit delivered by the event source: the event plus the roles the actor
/// held when it happened
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    #[serde(flatten)]
    pub event: ActivityEvent,
    #[serde(default)]
    pub actor_roles: Vec<RoleId>,
}

impl InboundEvent {
    pub fn role_set(&self) -> HashSet<RoleId> {
        self.actor_roles.iter().copied().collect()
    }
}

/// Row committed to the `user_messages` table
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedRecord {
    pub timestamp: DateTime<Utc>,
    pub actor_id: ActorId,
    pub group_id: GroupId,
    pub channel_id: ChannelId,
    pub score: f64,
}

/// Role → multiplier table that keeps configuration order
///
/// Lookup is first-match in insertion order, so this is a list and not a
/// hash map. Re-inserting a role updates it in place without moving it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleMultiplierTable {
    entries: Vec<(RoleId, f64)>,
}

impl RoleMultiplierTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a multiplier
    ///
    /// Returns false (and leaves the table alone) for non-finite or
    /// non-positive multipliers.
    pub fn insert(&mut self, role_id: RoleId, multiplier: f64) -> bool {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return false;
        }

        match self.entries.iter_mut().find(|(role, _)| *role == role_id) {
            Some(entry) => entry.1 = multiplier,
            None => self.entries.push((role_id, multiplier)),
        }
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (RoleId, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(RoleId, f64)> for RoleMultiplierTable {
    fn from_iter<I: IntoIterator<Item = (RoleId, f64)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (role_id, multiplier) in iter {
            table.insert(role_id, multiplier);
        }
        table
    }
}

/// Per-group settings read on every ingest and flush
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupConfig {
    pub blacklisted_roles: HashSet<RoleId>,
    pub blacklisted_channels: HashSet<ChannelId>,
    pub role_multipliers: RoleMultiplierTable,
}
