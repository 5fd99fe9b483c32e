//! Fire-and-forget notifications for other collaborators

use super::types::{ActorId, GroupId};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointsEvent {
    /// An actor's event was admitted and buffered for scoring
    PointsEligible { actor_id: ActorId, group_id: GroupId },
}

impl PointsEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            PointsEvent::PointsEligible { .. } => "points-eligible",
        }
    }
}

pub trait Notifier: Send + Sync {
    /// Emit without waiting for any acknowledgement
    fn notify(&self, event: PointsEvent);
}

/// Delivers notifications on an unbounded tokio channel
///
/// Never blocks ingestion. Notifications are dropped once the receiver is
/// gone.
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<PointsEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PointsEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: PointsEvent) {
        if let Err(e) = self.tx.send(event) {
            log::debug!("Dropped {} notification: receiver closed", e.0.kind());
        }
    }
}
