use dashmap::DashMap;
use log::{debug, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use super::messages::{encode_frame, Message};

/// A connected node and the inbox feeding its send loop
#[derive(Debug, Clone)]
pub struct Peer {
    /// `host:port` the peer can be dialed at
    pub key: String,
    inbox: UnboundedSender<Message>,
}

impl Peer {
    pub fn new(address: &str, port: u16, inbox: UnboundedSender<Message>) -> Self {
        Peer {
            key: format!("{}:{}", address, port),
            inbox,
        }
    }

    /// Queues a message for this peer. Returns false once its send loop has
    /// stopped.
    pub fn send(&self, message: Message) -> bool {
        self.inbox.send(message).is_ok()
    }
}

/// Every currently connected peer, keyed by [`Peer::key`]
#[derive(Debug, Default)]
pub struct Peers {
    v: DashMap<String, Peer>,
}

impl Peers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, peer: Peer) {
        self.v.insert(peer.key.clone(), peer);
    }

    /// Removes `peer` unless its key has since been taken over by a newer
    /// connection. Returns whether it was removed.
    pub fn remove(&self, peer: &Peer) -> bool {
        self.v
            .remove_if(&peer.key, |_, stored| stored.inbox.same_channel(&peer.inbox))
            .is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.v.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.v.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Clones the current set so callers can fan out without holding shard
    /// locks
    pub fn snapshot(&self) -> Vec<Peer> {
        self.v.iter().map(|entry| entry.value().clone()).collect()
    }
}

/// Writes queued messages to the socket in order until every sender is gone
/// or the connection fails
pub(crate) async fn send_loop(
    key: String,
    mut writer: OwnedWriteHalf,
    mut inbox: UnboundedReceiver<Message>,
) {
    while let Some(message) = inbox.recv().await {
        let line = match encode_frame(&message) {
            Ok(line) => line,
            Err(err) => {
                warn!("Failed to encode {:?} for {}: {}", message.kind, key, err);
                continue;
            }
        };

        if let Err(err) = writer.write_all(line.as_bytes()).await {
            warn!("Failed to write to peer {}: {}", key, err);
            break;
        }
        debug!("Sent {:?} to {}", message.kind, key);
    }

    let _ = writer.shutdown().await;
}
