//! Message bus seam and the in-process broadcast bus.
//!
//! Publishing is fire-and-forget: the core never awaits acknowledgment,
//! retries, or queues. Delivery guarantees belong to the bus, not to us.

use flowscope_types::{Message, Result};

/// A publish/subscribe bus accepting channel + event + property messages.
pub trait MessageBus: Send + Sync {
    /// Publish a message. Must not block beyond handing the message off.
    fn publish(&self, message: Message) -> Result<()>;
}

/// In-process bus over a [`tokio::sync::broadcast`] channel, for consumers
/// living in the same process (UI push gateways, analytics forwarders).
#[derive(Clone)]
pub struct BroadcastBus {
    sender: tokio::sync::broadcast::Sender<Message>,
}

impl BroadcastBus {
    /// Create a bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all messages on this bus.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Message> {
        self.sender.subscribe()
    }
}

impl MessageBus for BroadcastBus {
    fn publish(&self, message: Message) -> Result<()> {
        // No active subscriber is not a failure; the message is dropped.
        let _ = self.sender.send(message);
        Ok(())
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(256)
    }
}
