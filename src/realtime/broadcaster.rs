use super::messages::ServerMessage;
use async_trait::async_trait;
use std::fmt;

/// Who receives a published message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BroadcastTarget {
    /// Every open connection, joined to a room or not.
    All,
    /// Connections that joined the named room.
    Room(String),
}

impl fmt::Display for BroadcastTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BroadcastTarget::All => f.write_str("*"),
            BroadcastTarget::Room(room) => f.write_str(room),
        }
    }
}

/// Fire-and-forget delivery of server messages to live subscribers.
///
/// Publishing never fails: a message nobody can receive is dropped. Separate
/// publishes carry no ordering guarantee relative to each other.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn start(&self);

    /// Stops accepting subscribers and disconnects the current ones.
    async fn stop(&self);

    fn is_running(&self) -> bool;

    /// Returns how many subscribers the message was handed to.
    async fn publish(&self, target: BroadcastTarget, message: ServerMessage) -> usize;
}

/// Room holding the live streams of one item.
pub fn item_room(content_type: crate::catalog::ContentType, item_id: &str) -> String {
    format!("{}:{}", content_type, item_id)
}
