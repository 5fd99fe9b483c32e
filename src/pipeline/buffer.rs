//! Holding area for admitted events awaiting the next flush

use super::types::ActivityEvent;
use parking_lot::Mutex;

/// Unbounded, append-only event buffer
///
/// `drain_all` swaps the whole vector out under the lock, so an append that
/// races a drain lands either in the drained batch or in the fresh buffer,
/// never in both and never in neither.
#[derive(Default)]
pub struct EventBuffer {
    events: Mutex<Vec<ActivityEvent>>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, event: ActivityEvent) {
        self.events.lock().push(event);
    }

    /// Take every buffered event, leaving the buffer empty
    pub fn drain_all(&self) -> Vec<ActivityEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}
