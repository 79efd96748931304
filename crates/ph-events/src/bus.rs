use crate::types::EventRecord;
use tokio::sync::broadcast;

/// In-process fan-out of committed events to live subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventRecord>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    /// Sends `event` to every current subscriber and returns how many were
    /// reached. Zero subscribers is a normal state for one-shot commands.
    pub fn publish(&self, event: EventRecord) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Publishes a committed batch in sequence order.
    pub fn publish_all(&self, events: impl IntoIterator<Item = EventRecord>) -> usize {
        let mut events: Vec<EventRecord> = events.into_iter().collect();
        events.sort_by_key(|event| event.seq);
        events.into_iter().map(|event| self.publish(event)).sum()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
