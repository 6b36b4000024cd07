use super::types::{EventSequence, TransferDirection, TransferEvent, TransferEventPayload};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

pub type EventReceiver = broadcast::Receiver<TransferEvent>;
pub type EventSender = broadcast::Sender<TransferEvent>;

pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Event bus for distributing transfer events
///
/// A slow subscriber that falls more than `capacity` events behind receives
/// `RecvError::Lagged` and skips ahead; ordering is never violated.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: EventSender,
    sequence: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Publish an event (returns sequence number)
    ///
    /// Publishing with no subscribers is not an error: transfers run the same
    /// whether or not anybody listens.
    pub fn publish(
        &self,
        transfer_id: Uuid,
        direction: TransferDirection,
        file_name: &str,
        payload: TransferEventPayload,
    ) -> EventSequence {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);

        let event = TransferEvent {
            sequence,
            timestamp: Utc::now(),
            transfer_id,
            direction,
            file_name: file_name.to_string(),
            payload,
        };

        let _ = self.sender.send(event);
        sequence
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Get current sequence number
    pub fn current_sequence(&self) -> EventSequence {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Get number of active receivers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
