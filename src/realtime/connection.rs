//! Live connection registry with room membership.

use super::broadcaster::{BroadcastTarget, Broadcaster};
use super::messages::ServerMessage;
use crate::server::metrics;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{mpsc, RwLock};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

const DEFAULT_QUEUE_CAPACITY: usize = 512;

lazy_static! {
    static ref ROOM_NAME: Regex = Regex::new(r"^[a-z]+:[A-Za-z0-9-]{1,64}$").unwrap();
}

/// Rooms are `{contentType}:{itemId}`.
pub fn is_valid_room(room: &str) -> bool {
    ROOM_NAME.is_match(room)
}

struct ConnectionEntry {
    sender: mpsc::Sender<ServerMessage>,
    rooms: HashSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendError {
    NotConnected,
    Disconnected,
}

/// Tracks open connections and the rooms each one joined.
///
/// Starts stopped; [`Broadcaster::start`] must be called before connections
/// are accepted.
pub struct ConnectionManager {
    connections: RwLock<HashMap<usize, ConnectionEntry>>,
    next_id: AtomicUsize,
    running: AtomicBool,
    queue_capacity: usize,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// `queue_capacity` bounds the messages waiting for one connection. A
    /// connection whose queue is full misses messages until it drains.
    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
            running: AtomicBool::new(false),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Registers a new connection and returns its id and outgoing queue.
    /// Returns None while stopped.
    pub async fn register(&self) -> Option<(usize, mpsc::Receiver<ServerMessage>)> {
        if !self.is_running() {
            return None;
        }
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut conns = self.connections.write().await;
        conns.insert(
            id,
            ConnectionEntry {
                sender: tx,
                rooms: HashSet::new(),
            },
        );
        metrics::set_ws_connections(conns.len());
        Some((id, rx))
    }

    pub async fn unregister(&self, connection_id: usize) {
        let mut conns = self.connections.write().await;
        conns.remove(&connection_id);
        metrics::set_ws_connections(conns.len());
    }

    /// Returns false if the connection is unknown.
    pub async fn join(&self, connection_id: usize, room: &str) -> bool {
        let mut conns = self.connections.write().await;
        match conns.get_mut(&connection_id) {
            Some(entry) => {
                entry.rooms.insert(room.to_string());
                true
            }
            None => false,
        }
    }

    /// Returns false if the connection is unknown or was not in the room.
    pub async fn leave(&self, connection_id: usize, room: &str) -> bool {
        let mut conns = self.connections.write().await;
        conns
            .get_mut(&connection_id)
            .map(|entry| entry.rooms.remove(room))
            .unwrap_or(false)
    }

    pub async fn send_to(&self, connection_id: usize, message: ServerMessage) -> Result<(), SendError> {
        let sender = {
            let conns = self.connections.read().await;
            conns
                .get(&connection_id)
                .map(|entry| entry.sender.clone())
                .ok_or(SendError::NotConnected)?
        };
        sender
            .send(message)
            .await
            .map_err(|_| SendError::Disconnected)
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn room_size(&self, room: &str) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|entry| entry.rooms.contains(room))
            .count()
    }
}

#[async_trait]
impl Broadcaster for ConnectionManager {
    async fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        info!("Realtime broadcaster started");
    }

    async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let mut conns = self.connections.write().await;
        let closed = conns.len();
        // Dropping the senders ends each connection's forwarding task.
        conns.clear();
        metrics::set_ws_connections(0);
        info!("Realtime broadcaster stopped, closed {} connections", closed);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn publish(&self, target: BroadcastTarget, message: ServerMessage) -> usize {
        if !self.is_running() {
            return 0;
        }
        let conns = self.connections.read().await;
        let mut delivered = 0;
        for (id, entry) in conns.iter() {
            if let BroadcastTarget::Room(room) = &target {
                if !entry.rooms.contains(room) {
                    continue;
                }
            }
            match entry.sender.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "Dropping {} for connection {}: outgoing queue full",
                        message.msg_type, id
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Connection {} closed before {}", id, message.msg_type);
                }
            }
        }
        metrics::record_fanout(&message.msg_type, delivered);
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn started() -> ConnectionManager {
        let manager = ConnectionManager::new();
        manager.start().await;
        manager
    }

    #[test]
    fn validates_room_names() {
        assert!(is_valid_room("song:3f2b1c4e-1111-2222-3333-444455556666"));
        assert!(is_valid_room("video:abc"));
        assert!(!is_valid_room("song"));
        assert!(!is_valid_room("Song:abc"));
        assert!(!is_valid_room("song:a b"));
        assert!(!is_valid_room(""));
    }

    #[tokio::test]
    async fn register_is_refused_while_stopped() {
        let manager = ConnectionManager::new();
        assert!(manager.register().await.is_none());
        manager.start().await;
        assert!(manager.register().await.is_some());
        manager.stop().await;
        assert!(manager.register().await.is_none());
        assert_eq!(manager.connection_count().await, 0);
    }

    #[tokio::test]
    async fn broadcast_to_all_reaches_every_connection() {
        let manager = started().await;
        let (_, mut rx1) = manager.register().await.unwrap();
        let (id2, mut rx2) = manager.register().await.unwrap();
        manager.join(id2, "song:x").await;

        let delivered = manager
            .publish(BroadcastTarget::All, ServerMessage::empty("hello"))
            .await;
        assert_eq!(delivered, 2);
        assert_eq!(rx1.recv().await.unwrap().msg_type, "hello");
        assert_eq!(rx2.recv().await.unwrap().msg_type, "hello");
    }

    #[tokio::test]
    async fn room_messages_reach_members_only() {
        let manager = started().await;
        let (id1, mut rx1) = manager.register().await.unwrap();
        let (_, mut rx2) = manager.register().await.unwrap();
        assert!(manager.join(id1, "song:x").await);
        assert_eq!(manager.room_size("song:x").await, 1);

        let delivered = manager
            .publish(
                BroadcastTarget::Room("song:x".into()),
                ServerMessage::empty("comment:new"),
            )
            .await;
        assert_eq!(delivered, 1);
        assert_eq!(rx1.recv().await.unwrap().msg_type, "comment:new");
        assert!(rx2.try_recv().is_err());

        assert!(manager.leave(id1, "song:x").await);
        assert!(!manager.leave(id1, "song:x").await);
        let delivered = manager
            .publish(
                BroadcastTarget::Room("song:x".into()),
                ServerMessage::empty("comment:new"),
            )
            .await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_dropped() {
        let manager = started().await;
        assert_eq!(
            manager
                .publish(BroadcastTarget::All, ServerMessage::empty("x"))
                .await,
            0
        );
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let manager = ConnectionManager::with_queue_capacity(4);
        manager.start().await;
        let (_, _rx) = manager.register().await.unwrap();
        for _ in 0..4 {
            manager
                .publish(BroadcastTarget::All, ServerMessage::empty("x"))
                .await;
        }
        let delivered = manager
            .publish(BroadcastTarget::All, ServerMessage::empty("x"))
            .await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn send_to_unknown_connection_fails() {
        let manager = started().await;
        assert_eq!(
            manager.send_to(42, ServerMessage::empty("x")).await,
            Err(SendError::NotConnected)
        );
        let (id, mut rx) = manager.register().await.unwrap();
        manager.send_to(id, ServerMessage::empty("direct")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().msg_type, "direct");
        manager.unregister(id).await;
        assert_eq!(
            manager.send_to(id, ServerMessage::empty("x")).await,
            Err(SendError::NotConnected)
        );
    }
}
