use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::blockchain::{Block, Tx};

/// The kinds of message exchanged between peers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    NewestBlock,
    AllBlocksRequest,
    AllBlocksResponse,
    NewBlockNotify,
    NewTxNotify,
    NewPeerNotify,
}

/// Wire envelope: a kind plus a payload decoded according to that kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub payload: serde_json::Value,
}

/// First frame sent by the dialing side so the acceptor can dial it back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub open_port: u16,
}

impl Message {
    fn new<T: Serialize>(kind: MessageKind, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Message {
            kind,
            payload: serde_json::to_value(payload)?,
        })
    }

    pub fn newest_block(block: &Block) -> Result<Self, serde_json::Error> {
        Self::new(MessageKind::NewestBlock, block)
    }

    pub fn all_blocks_request() -> Self {
        Message {
            kind: MessageKind::AllBlocksRequest,
            payload: serde_json::Value::Null,
        }
    }

    pub fn all_blocks_response(blocks: &[Block]) -> Result<Self, serde_json::Error> {
        Self::new(MessageKind::AllBlocksResponse, &blocks)
    }

    pub fn new_block(block: &Block) -> Result<Self, serde_json::Error> {
        Self::new(MessageKind::NewBlockNotify, block)
    }

    pub fn new_tx(tx: &Tx) -> Result<Self, serde_json::Error> {
        Self::new(MessageKind::NewTxNotify, tx)
    }

    /// Announces a peer by its dialable `host:port` key
    pub fn new_peer(key: &str) -> Result<Self, serde_json::Error> {
        Self::new(MessageKind::NewPeerNotify, &key)
    }

    /// Decodes the payload into the type its kind carries
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

/// Encodes a value as one newline-terminated JSON frame
pub fn encode_frame<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    Ok(line)
}

pub fn decode_frame<T: DeserializeOwned>(line: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(line.trim_end())
}
