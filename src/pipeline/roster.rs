//! Group membership lookups
//!
//! Scores are resolved against the roles an actor holds at flush time, so the
//! flush cycle asks the roster rather than trusting the roles captured with
//! each event.

use super::error::LookupError;
use super::types::{ActorId, GroupId, RoleId};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

pub trait RosterProvider: Send + Sync {
    /// Current role set of `actor_id` in `group_id`
    fn actor_roles(&self, actor_id: ActorId, group_id: GroupId) -> Result<HashSet<RoleId>, LookupError>;
}

/// Member cache keyed by (group, actor)
///
/// The runtime refreshes it from every inbound event, so it holds the most
/// recently observed role set for each member.
#[derive(Default)]
pub struct MemberRoster {
    members: RwLock<HashMap<(GroupId, ActorId), HashSet<RoleId>>>,
}

impl MemberRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_member(&self, group_id: GroupId, actor_id: ActorId, roles: HashSet<RoleId>) {
        self.members.write().insert((group_id, actor_id), roles);
    }

    pub fn remove_member(&self, group_id: GroupId, actor_id: ActorId) {
        self.members.write().remove(&(group_id, actor_id));
    }

    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }
}

impl RosterProvider for MemberRoster {
    fn actor_roles(&self, actor_id: ActorId, group_id: GroupId) -> Result<HashSet<RoleId>, LookupError> {
        self.members
            .read()
            .get(&(group_id, actor_id))
            .cloned()
            .ok_or(LookupError::UnknownMember { actor_id, group_id })
    }
}
