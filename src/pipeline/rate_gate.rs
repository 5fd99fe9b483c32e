//! Per-actor cooldown gate
//!
//! Tracks the last admitted time for every actor ever seen. Entries are never
//! evicted; the map grows with the number of distinct actors.

use super::types::ActorId;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

pub const DEFAULT_COOLDOWN_SECS: i64 = 60;

pub struct RateGate {
    last_admitted: Mutex<HashMap<ActorId, DateTime<Utc>>>,
    cooldown: Duration,
}

impl RateGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            last_admitted: Mutex::new(HashMap::new()),
            cooldown,
        }
    }

    /// Admit `actor_id` at `now` if at least one cooldown has passed since its
    /// last admitted event
    ///
    /// Read and update happen under one lock, so two concurrent calls for the
    /// same actor cannot both pass. A rejected call leaves the stored time
    /// untouched. Unseen actors are always admitted.
    pub fn admit(&self, actor_id: ActorId, now: DateTime<Utc>) -> bool {
        let mut last_admitted = self.last_admitted.lock();

        if let Some(last) = last_admitted.get(&actor_id) {
            if now - *last < self.cooldown {
                return false;
            }
        }

        last_admitted.insert(actor_id, now);
        true
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Number of actors with a stored timestamp
    pub fn tracked_actors(&self) -> usize {
        self.last_admitted.lock().len()
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_COOLDOWN_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_first_event_always_admitted() {
        let gate = RateGate::default();
        assert!(gate.admit(1, at(0)));
        assert!(gate.admit(2, at(0)));
        assert_eq!(gate.tracked_actors(), 2);
    }

    #[test]
    fn test_within_cooldown_rejected() {
        let gate = RateGate::default();
        assert!(gate.admit(1, at(0)));
        assert!(!gate.admit(1, at(30)));
        assert!(!gate.admit(1, at(59)));
    }

    #[test]
    fn test_at_cooldown_boundary_admitted() {
        let gate = RateGate::default();
        assert!(gate.admit(1, at(0)));
        assert!(gate.admit(1, at(60)));
        assert!(gate.admit(1, at(180)));
    }

    #[test]
    fn test_rejection_does_not_refresh_timestamp() {
        // t=0 admitted, t=30 rejected, t=61 must still pass against t=0
        let gate = RateGate::default();
        assert!(gate.admit(1, at(0)));
        assert!(!gate.admit(1, at(30)));
        assert!(gate.admit(1, at(61)));
        assert!(!gate.admit(1, at(100)));
    }

    #[test]
    fn test_actors_are_independent() {
        let gate = RateGate::default();
        assert!(gate.admit(1, at(0)));
        assert!(gate.admit(2, at(10)));
        assert!(!gate.admit(1, at(20)));
        assert!(!gate.admit(2, at(20)));
    }

    #[test]
    fn test_custom_cooldown() {
        let gate = RateGate::new(Duration::seconds(5));
        assert_eq!(gate.cooldown(), Duration::seconds(5));
        assert!(gate.admit(1, at(0)));
        assert!(!gate.admit(1, at(4)));
        assert!(gate.admit(1, at(5)));
    }

    #[test]
    fn test_concurrent_admits_same_actor_single_winner() {
        let gate = Arc::new(RateGate::default());
        let admitted = Arc::new(AtomicUsize::new(0));
        let now = at(0);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let gate = gate.clone();
                let admitted = admitted.clone();
                std::thread::spawn(move || {
                    if gate.admit(42, now) {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::SeqCst), 1);
    }
}
