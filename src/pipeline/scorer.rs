//! Score resolution from role multipliers
//!
//! ## Tie-break
//!
//! When an actor holds several roles that appear in the group's multiplier
//! table, the entry configured first wins. Table order is the configuration
//! order, not the numeric size of the multiplier:
//!
//! ```text
//! table  = [(X, 3), (Y, 5)]
//! roles  = {Y, X}
//! score  = 3
//! ```

use super::roster::RosterProvider;
use super::settings::SettingsProvider;
use super::types::{ActorId, GroupId, RoleId, RoleMultiplierTable};
use std::collections::HashSet;
use std::sync::Arc;

/// Score for actors with no matching role or failed lookups
pub const DEFAULT_SCORE: f64 = 1.0;

impl RoleMultiplierTable {
    /// Multiplier of the first table entry held in `roles`
    pub fn first_match(&self, roles: &HashSet<RoleId>) -> Option<f64> {
        self.iter()
            .find(|(role_id, _)| roles.contains(role_id))
            .map(|(_, multiplier)| multiplier)
    }
}

pub struct ScoreResolver {
    settings: Arc<dyn SettingsProvider>,
    roster: Arc<dyn RosterProvider>,
}

impl ScoreResolver {
    pub fn new(settings: Arc<dyn SettingsProvider>, roster: Arc<dyn RosterProvider>) -> Self {
        Self { settings, roster }
    }

    /// Resolve the score for `actor_id` in `group_id`
    ///
    /// Never fails: a roster or settings error counts as "no match" and yields
    /// `DEFAULT_SCORE`.
    pub fn resolve(&self, actor_id: ActorId, group_id: GroupId) -> f64 {
        let config = match self.settings.group_config(group_id) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("⚠️  Settings lookup failed for group {}: {}", group_id, e);
                return DEFAULT_SCORE;
            }
        };

        if config.role_multipliers.is_empty() {
            return DEFAULT_SCORE;
        }

        let roles = match self.roster.actor_roles(actor_id, group_id) {
            Ok(roles) => roles,
            Err(e) => {
                log::debug!("Roster lookup failed, using default score: {}", e);
                return DEFAULT_SCORE;
            }
        };

        config.role_multipliers.first_match(&roles).unwrap_or(DEFAULT_SCORE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::error::LookupError;
    use crate::pipeline::roster::MemberRoster;
    use crate::pipeline::settings::InMemorySettings;
    use crate::pipeline::types::GroupConfig;

    const GROUP: GroupId = 1;
    const ROLE_X: RoleId = 100;
    const ROLE_Y: RoleId = 200;

    struct BrokenSettings;

    impl SettingsProvider for BrokenSettings {
        fn group_config(&self, _group_id: GroupId) -> Result<GroupConfig, LookupError> {
            Err(LookupError::Database(rusqlite::Error::InvalidQuery))
        }
    }

    fn resolver_with(table: &[(RoleId, f64)], member_roles: Option<&[RoleId]>) -> ScoreResolver {
        let settings = Arc::new(InMemorySettings::new());
        for (role, multiplier) in table {
            settings.set_multiplier(GROUP, *role, *multiplier);
        }

        let roster = Arc::new(MemberRoster::new());
        if let Some(roles) = member_roles {
            roster.upsert_member(GROUP, 7, roles.iter().copied().collect());
        }

        ScoreResolver::new(settings, roster)
    }

    #[test]
    fn test_first_match_follows_table_order() {
        let resolver = resolver_with(&[(ROLE_X, 3.0), (ROLE_Y, 5.0)], Some(&[ROLE_Y, ROLE_X]));
        assert_eq!(resolver.resolve(7, GROUP), 3.0);
    }

    #[test]
    fn test_first_match_reversed_table() {
        let resolver = resolver_with(&[(ROLE_Y, 5.0), (ROLE_X, 3.0)], Some(&[ROLE_X, ROLE_Y]));
        assert_eq!(resolver.resolve(7, GROUP), 5.0);
    }

    #[test]
    fn test_single_matching_role() {
        let resolver = resolver_with(&[(ROLE_X, 3.0), (ROLE_Y, 5.0)], Some(&[ROLE_Y, 999]));
        assert_eq!(resolver.resolve(7, GROUP), 5.0);
    }

    #[test]
    fn test_no_matching_role_is_default() {
        let resolver = resolver_with(&[(ROLE_X, 3.0)], Some(&[999]));
        assert_eq!(resolver.resolve(7, GROUP), DEFAULT_SCORE);
    }

    #[test]
    fn test_empty_table_is_default() {
        let resolver = resolver_with(&[], Some(&[ROLE_X]));
        assert_eq!(resolver.resolve(7, GROUP), DEFAULT_SCORE);
    }

    #[test]
    fn test_unknown_member_is_default() {
        let resolver = resolver_with(&[(ROLE_X, 3.0)], None);
        assert_eq!(resolver.resolve(7, GROUP), DEFAULT_SCORE);
    }

    #[test]
    fn test_settings_failure_is_default() {
        let roster = Arc::new(MemberRoster::new());
        roster.upsert_member(GROUP, 7, HashSet::from([ROLE_X]));
        let resolver = ScoreResolver::new(Arc::new(BrokenSettings), roster);
        assert_eq!(resolver.resolve(7, GROUP), DEFAULT_SCORE);
    }
}
