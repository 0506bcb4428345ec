//! Topic based fan-out of messages to connected clients.
//!
//! The hub knows nothing about transports. A transport adapter calls [`NotificationHub::connect`] when a client
//! arrives, forwards everything it reads from [`Connection::receiver`] to the client, and calls
//! [`NotificationHub::disconnect`] when the client goes away. Messages are not retained: a client that subscribes after
//! a publish will not see it and has to query current state instead.
use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use log::*;
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};

pub const DEFAULT_CONNECTION_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConnectionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}

/// A registered client connection. Dropping the receiver marks the connection as closed; the hub prunes it on the next
/// publish that targets it.
pub struct Connection<M> {
    pub id: ConnectionId,
    pub receiver: mpsc::Receiver<M>,
}

struct HubState<M> {
    connections: HashMap<ConnectionId, mpsc::Sender<M>>,
    topics: HashMap<String, HashSet<ConnectionId>>,
}

impl<M> Default for HubState<M> {
    fn default() -> Self {
        Self { connections: HashMap::new(), topics: HashMap::new() }
    }
}

impl<M> HubState<M> {
    fn remove_connection(&mut self, id: ConnectionId) -> bool {
        let existed = self.connections.remove(&id).is_some();
        self.topics.retain(|_, members| {
            members.remove(&id);
            !members.is_empty()
        });
        existed
    }
}

pub struct NotificationHub<M> {
    state: Arc<RwLock<HubState<M>>>,
    next_id: Arc<AtomicU64>,
    buffer_size: usize,
}

impl<M> Clone for NotificationHub<M> {
    fn clone(&self) -> Self {
        Self { state: Arc::clone(&self.state), next_id: Arc::clone(&self.next_id), buffer_size: self.buffer_size }
    }
}

impl<M> Default for NotificationHub<M> {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECTION_BUFFER)
    }
}

impl<M> std::fmt::Debug for NotificationHub<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        write!(f, "NotificationHub ({} connections, {} topics)", state.connections.len(), state.topics.len())
    }
}

impl<M> NotificationHub<M> {
    /// `buffer_size` is the number of undelivered messages each connection may hold before further messages to it are
    /// dropped.
    pub fn new(buffer_size: usize) -> Self {
        Self { state: Arc::default(), next_id: Arc::new(AtomicU64::new(1)), buffer_size: buffer_size.max(1) }
    }

    pub fn connect(&self) -> Connection<M> {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = mpsc::channel(self.buffer_size);
        self.state.write().connections.insert(id, sender);
        debug!("📡️ Connection {id} registered");
        Connection { id, receiver }
    }

    /// Adds the connection to the topic's membership. Returns `false` if the connection is not registered.
    pub fn subscribe(&self, connection_id: ConnectionId, topic: &str) -> bool {
        let mut state = self.state.write();
        if !state.connections.contains_key(&connection_id) {
            return false;
        }
        state.topics.entry(topic.to_string()).or_default().insert(connection_id);
        debug!("📡️ Connection {connection_id} joined {topic}");
        true
    }

    /// Removes the connection from the topic's membership. Returns `false` if it was not a member.
    pub fn unsubscribe(&self, connection_id: ConnectionId, topic: &str) -> bool {
        let mut state = self.state.write();
        let Some(members) = state.topics.get_mut(topic) else {
            return false;
        };
        let removed = members.remove(&connection_id);
        if members.is_empty() {
            state.topics.remove(topic);
        }
        if removed {
            debug!("📡️ Connection {connection_id} left {topic}");
        }
        removed
    }

    /// Forgets the connection and all of its topic memberships.
    pub fn disconnect(&self, connection_id: ConnectionId) {
        if self.state.write().remove_connection(connection_id) {
            debug!("📡️ Connection {connection_id} disconnected");
        }
    }

    pub fn is_connected(&self, connection_id: ConnectionId) -> bool {
        self.state.read().connections.contains_key(&connection_id)
    }

    pub fn connection_count(&self) -> usize {
        self.state.read().connections.len()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.state.read().topics.get(topic).map(HashSet::len).unwrap_or(0)
    }
}

impl<M: Clone> NotificationHub<M> {
    /// Sends the message to every connection subscribed to `topic` and returns how many received it.
    ///
    /// Never blocks and never fails. A connection whose buffer is full misses this message; a connection whose
    /// receiver has been dropped is pruned.
    pub fn publish(&self, topic: &str, message: M) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let state = self.state.read();
            let Some(members) = state.topics.get(topic) else {
                trace!("📡️ No subscribers for {topic}");
                return 0;
            };
            for id in members {
                let Some(sender) = state.connections.get(id) else { continue };
                match sender.try_send(message.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!("📡️ Connection {id} is not keeping up. Dropped a {topic} message")
                    },
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }
        if !closed.is_empty() {
            let mut state = self.state.write();
            for id in closed {
                state.remove_connection(id);
                debug!("📡️ Pruned closed connection {id}");
            }
        }
        trace!("📡️ Published {topic} message to {delivered} connections");
        delivered
    }
}
