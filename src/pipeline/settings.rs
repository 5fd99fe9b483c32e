//! Per-group settings: ingest blacklists and role multipliers
//!
//! Both providers answer from current state on every call. Nothing is cached
//! inside the ledger, so settings edits apply to the next event or flush
//! without a restart.

use super::error::LookupError;
use super::types::{ChannelId, GroupConfig, GroupId, RoleId, RoleMultiplierTable};
use crate::sqlite_pragma::apply_optimized_pragmas;
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::sync::Arc;

/// Source of `GroupConfig` for a group
///
/// Unknown groups resolve to `GroupConfig::default()` (nothing blacklisted,
/// no multipliers); only a failing backend is an error.
pub trait SettingsProvider: Send + Sync {
    fn group_config(&self, group_id: GroupId) -> Result<GroupConfig, LookupError>;
}

/// In-process settings map, mutable at runtime
#[derive(Default)]
pub struct InMemorySettings {
    groups: RwLock<HashMap<GroupId, GroupConfig>>,
}

impl InMemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_group(&self, group_id: GroupId, config: GroupConfig) {
        self.groups.write().insert(group_id, config);
    }

    pub fn blacklist_role(&self, group_id: GroupId, role_id: RoleId) {
        self.groups
            .write()
            .entry(group_id)
            .or_default()
            .blacklisted_roles
            .insert(role_id);
    }

    pub fn blacklist_channel(&self, group_id: GroupId, channel_id: ChannelId) {
        self.groups
            .write()
            .entry(group_id)
            .or_default()
            .blacklisted_channels
            .insert(channel_id);
    }

    pub fn set_multiplier(&self, group_id: GroupId, role_id: RoleId, multiplier: f64) -> bool {
        self.groups
            .write()
            .entry(group_id)
            .or_default()
            .role_multipliers
            .insert(role_id, multiplier)
    }
}

impl SettingsProvider for InMemorySettings {
    fn group_config(&self, group_id: GroupId) -> Result<GroupConfig, LookupError> {
        Ok(self.groups.read().get(&group_id).cloned().unwrap_or_default())
    }
}

/// Settings read straight from the `guild_*` tables
///
/// Multipliers come back in rowid order, which is the order they were first
/// configured in. Updating a multiplier through `set_multiplier` keeps its row
/// and therefore its position.
#[derive(Clone)]
pub struct SqliteSettingsStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSettingsStore {
    /// Open the settings store
    ///
    /// The database must already carry the schema from `sql/02_guild_settings.sql`.
    /// Shares the sink's file, so it gets the same WAL mode and busy timeout.
    pub fn new(db_path: &str) -> Result<Self, LookupError> {
        let conn = Connection::open(db_path)?;
        apply_optimized_pragmas(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn blacklist_role(&self, group_id: GroupId, role_id: RoleId) -> Result<(), LookupError> {
        self.conn.lock().execute(
            "INSERT OR IGNORE INTO guild_blacklisted_roles (guild_id, role_id) VALUES (?1, ?2)",
            params![group_id, role_id],
        )?;
        Ok(())
    }

    pub fn blacklist_channel(&self, group_id: GroupId, channel_id: ChannelId) -> Result<(), LookupError> {
        self.conn.lock().execute(
            "INSERT OR IGNORE INTO guild_blacklisted_channels (guild_id, channel_id) VALUES (?1, ?2)",
            params![group_id, channel_id],
        )?;
        Ok(())
    }

    pub fn set_multiplier(&self, group_id: GroupId, role_id: RoleId, multiplier: f64) -> Result<(), LookupError> {
        self.conn.lock().execute(
            "INSERT INTO guild_role_multipliers (guild_id, role_id, multiplier) VALUES (?1, ?2, ?3)
             ON CONFLICT(guild_id, role_id) DO UPDATE SET multiplier = excluded.multiplier",
            params![group_id, role_id, multiplier],
        )?;
        Ok(())
    }
}

impl SettingsProvider for SqliteSettingsStore {
    fn group_config(&self, group_id: GroupId) -> Result<GroupConfig, LookupError> {
        let conn = self.conn.lock();
        let mut config = GroupConfig::default();

        let mut stmt = conn.prepare_cached(
            "SELECT role_id FROM guild_blacklisted_roles WHERE guild_id = ?1",
        )?;
        let roles = stmt.query_map(params![group_id], |row| row.get::<_, RoleId>(0))?;
        for role in roles {
            config.blacklisted_roles.insert(role?);
        }

        let mut stmt = conn.prepare_cached(
            "SELECT channel_id FROM guild_blacklisted_channels WHERE guild_id = ?1",
        )?;
        let channels = stmt.query_map(params![group_id], |row| row.get::<_, ChannelId>(0))?;
        for channel in channels {
            config.blacklisted_channels.insert(channel?);
        }

        let mut stmt = conn.prepare_cached(
            "SELECT role_id, multiplier FROM guild_role_multipliers
             WHERE guild_id = ?1 ORDER BY rowid",
        )?;
        let multipliers = stmt.query_map(params![group_id], |row| {
            Ok((row.get::<_, RoleId>(0)?, row.get::<_, f64>(1)?))
        })?;
        let mut table = RoleMultiplierTable::new();
        for entry in multipliers {
            let (role_id, multiplier) = entry?;
            if !table.insert(role_id, multiplier) {
                log::warn!(
                    "⚠️  Ignoring invalid multiplier {} for role {} in group {}",
                    multiplier,
                    role_id,
                    group_id
                );
            }
        }
        config.role_multipliers = table;

        Ok(config)
    }
}
