//! Multi-client WebSocket broadcast utilities.
//!
//! A [`SocketBroadcaster`] fans messages out to every registered
//! [`SocketExchange`]; [`SocketRooms`] manages named broadcasters for chat
//! rooms, notifications, and similar groupings. Both are cheap to clone and
//! safe to share across handlers.

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use serde::Serialize;

use crate::error::HandlerError;
use crate::exchange::SocketExchange;

/// Fan-out sender over a set of connected sockets. Dead connections are
/// dropped on the first failed delivery.
#[derive(Clone, Default)]
pub struct SocketBroadcaster {
    clients: Arc<DashMap<u64, SocketExchange>>,
}

impl SocketBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to the broadcast set, keyed by its socket id.
    pub fn join(&self, exchange: &SocketExchange) {
        self.clients.insert(exchange.id(), exchange.clone());
    }

    pub fn leave(&self, socket_id: u64) {
        self.clients.remove(&socket_id);
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Send a raw message to every client, optionally excluding the sender.
    /// Returns the number of clients reached.
    pub fn send(&self, msg: &Message, exclude: Option<u64>) -> usize {
        let mut dead = Vec::new();
        let mut reached = 0;
        for entry in self.clients.iter() {
            if Some(*entry.key()) == exclude {
                continue;
            }
            if entry.value().send(msg.clone()).is_ok() {
                reached += 1;
            } else {
                dead.push(*entry.key());
            }
        }
        for id in dead {
            self.clients.remove(&id);
        }
        reached
    }

    pub fn send_text(&self, text: impl Into<String>, exclude: Option<u64>) -> usize {
        self.send(&Message::Text(text.into().into()), exclude)
    }

    pub fn send_json<T: Serialize>(
        &self,
        value: &T,
        exclude: Option<u64>,
    ) -> Result<usize, HandlerError> {
        let json = serde_json::to_string(value)?;
        Ok(self.send_text(json, exclude))
    }
}

/// Named room manager over [`SocketBroadcaster`]s.
#[derive(Clone, Default)]
pub struct SocketRooms {
    rooms: Arc<DashMap<String, SocketBroadcaster>>,
}

impl SocketRooms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the broadcaster for a room.
    pub fn room(&self, name: &str) -> SocketBroadcaster {
        self.rooms
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Drop a room and its client set.
    pub fn remove(&self, name: &str) {
        self.rooms.remove(name);
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::ExchangeHead;
    use tokio::sync::mpsc;

    fn exchange(id: u64) -> (SocketExchange, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let head = ExchangeHead {
            method: http::Method::GET,
            path: "/chat".into(),
            query: None,
            headers: http::HeaderMap::new(),
            peer: None,
            deadline: None,
        };
        (SocketExchange::new(head, id, tx), rx)
    }

    #[tokio::test]
    async fn broadcast_reaches_every_client() {
        let broadcaster = SocketBroadcaster::new();
        let (a, mut rx_a) = exchange(1);
        let (b, mut rx_b) = exchange(2);
        broadcaster.join(&a);
        broadcaster.join(&b);

        assert_eq!(broadcaster.send_text("hello", None), 2);
        for rx in [&mut rx_a, &mut rx_b] {
            match rx.recv().await.unwrap() {
                Message::Text(t) => assert_eq!(t.as_str(), "hello"),
                other => panic!("expected text, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn sender_can_be_excluded() {
        let broadcaster = SocketBroadcaster::new();
        let (a, mut rx_a) = exchange(1);
        let (b, mut rx_b) = exchange(2);
        broadcaster.join(&a);
        broadcaster.join(&b);

        assert_eq!(broadcaster.send_text("from a", Some(1)), 1);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.recv().await.is_some());
    }

    #[tokio::test]
    async fn dead_clients_are_pruned() {
        let broadcaster = SocketBroadcaster::new();
        let (a, rx_a) = exchange(1);
        broadcaster.join(&a);
        drop(rx_a);

        assert_eq!(broadcaster.send_text("anyone?", None), 0);
        assert_eq!(broadcaster.client_count(), 0);
    }

    #[test]
    fn rooms_reuse_their_broadcaster() {
        let rooms = SocketRooms::new();
        let (a, _rx) = exchange(1);
        rooms.room("lobby").join(&a);
        assert_eq!(rooms.room("lobby").client_count(), 1);
        assert_eq!(rooms.room_count(), 1);

        rooms.remove("lobby");
        assert_eq!(rooms.room("lobby").client_count(), 0);
    }
}
