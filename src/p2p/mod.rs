// Peer synchronization protocol
//
// Nodes keep one TCP connection per peer. Each connection has a receive task
// decoding frames into messages and a send task draining the peer's inbox.
// Messages converge divergent chains and propagate new blocks, transactions
// and peers.

pub mod messages;
pub mod peer;

use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::blockchain::{Block, Blockchain, BlockchainError, Mempool, Tx};
use messages::{decode_frame, encode_frame, Handshake, Message, MessageKind};
use peer::{send_loop, Peer, Peers};

/// Errors that can occur while talking to peers
#[derive(Debug, Error)]
pub enum P2pError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Invalid peer address: {0}")]
    InvalidPeer(String),

    #[error("Blockchain error: {0}")]
    Blockchain(#[from] BlockchainError),

    #[error("Message handler failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// The local node's side of the peer protocol
#[derive(Debug)]
pub struct Network {
    chain: Arc<Blockchain>,
    mempool: Arc<Mempool>,
    peers: Peers,

    /// Port peers can dial this node back on
    open_port: u16,
}

impl Network {
    pub fn new(chain: Arc<Blockchain>, mempool: Arc<Mempool>, open_port: u16) -> Arc<Self> {
        Arc::new(Network {
            chain,
            mempool,
            peers: Peers::new(),
            open_port,
        })
    }

    /// Keys of every connected peer
    pub fn peers(&self) -> Vec<String> {
        self.peers.keys()
    }

    /// Accepts inbound peers on `listener` until it fails
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), P2pError> {
        info!("Accepting peers on {}", listener.local_addr()?);

        loop {
            let (stream, remote) = listener.accept().await?;
            let network = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(err) = network.accept(stream, remote).await {
                    warn!("Rejected connection from {}: {}", remote, err);
                }
            });
        }
    }

    async fn accept(self: Arc<Self>, stream: TcpStream, remote: SocketAddr) -> Result<(), P2pError> {
        let (reader, writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        let line = lines
            .next_line()
            .await?
            .ok_or_else(|| P2pError::Handshake("connection closed before handshake".to_string()))?;
        let handshake: Handshake = decode_frame(&line)?;

        self.init_peer(&remote.ip().to_string(), handshake.open_port, lines, writer);
        Ok(())
    }

    /// Dials a peer and starts syncing with it. With `broadcast` set, every
    /// other known peer is told to connect to it too.
    pub async fn add_peer(
        self: &Arc<Self>,
        address: &str,
        port: u16,
        broadcast: bool,
    ) -> Result<(), P2pError> {
        let key = format!("{}:{}", address, port);
        if self.peers.contains(&key) {
            debug!("Already connected to {}", key);
            return Ok(());
        }

        let stream = TcpStream::connect((address, port)).await?;
        let (reader, mut writer) = stream.into_split();
        let handshake = encode_frame(&Handshake {
            open_port: self.open_port,
        })?;
        writer.write_all(handshake.as_bytes()).await?;

        let lines = BufReader::new(reader).lines();
        let peer = self.init_peer(address, port, lines, writer);
        if broadcast {
            self.broadcast_new_peer(&peer)?;
        }
        Ok(())
    }

    fn init_peer(
        self: &Arc<Self>,
        address: &str,
        port: u16,
        lines: Lines<BufReader<OwnedReadHalf>>,
        writer: OwnedWriteHalf,
    ) -> Peer {
        let (inbox, outbox) = mpsc::unbounded_channel();
        let peer = Peer::new(address, port, inbox);
        self.peers.insert(peer.clone());
        info!("Connected to peer {}", peer.key);

        tokio::spawn(send_loop(peer.key.clone(), writer, outbox));
        tokio::spawn(Arc::clone(self).receive_loop(lines, peer.clone()));

        if let Err(err) = self.send_newest_block(&peer) {
            warn!("Failed to greet peer {}: {}", peer.key, err);
        }
        peer
    }

    async fn receive_loop(self: Arc<Self>, mut lines: Lines<BufReader<OwnedReadHalf>>, peer: Peer) {
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    warn!("Failed to read from peer {}: {}", peer.key, err);
                    break;
                }
            };

            let message = match decode_frame::<Message>(&line) {
                Ok(message) => message,
                Err(err) => {
                    warn!("Undecodable frame from {}: {}", peer.key, err);
                    continue;
                }
            };

            // Handling reads and writes the block store, so it runs on the
            // blocking pool. Awaiting it keeps messages in arrival order.
            let network = Arc::clone(&self);
            let sender = peer.clone();
            let result =
                tokio::task::spawn_blocking(move || network.handle_message(message, &sender)).await;
            if let Err(err) = result.map_err(P2pError::from).and_then(|handled| handled) {
                warn!("Failed to handle message from {}: {}", peer.key, err);
            }
        }

        if self.peers.remove(&peer) {
            info!("Peer {} disconnected", peer.key);
        } else {
            debug!("Stale connection to {} closed", peer.key);
        }
    }

    /// Reacts to one message received from `peer`
    pub fn handle_message(self: &Arc<Self>, message: Message, peer: &Peer) -> Result<(), P2pError> {
        debug!("Received {:?} from {}", message.kind, peer.key);

        match message.kind {
            MessageKind::NewestBlock => {
                let remote: Block = message.decode()?;
                let local = self.chain.newest_block()?;

                if remote.hash == local.hash {
                    return Ok(());
                }
                if remote.height >= local.height {
                    debug!("Requesting all blocks from {}", peer.key);
                    peer.send(Message::all_blocks_request());
                } else {
                    self.send_newest_block(peer)?;
                }
            }
            MessageKind::AllBlocksRequest => {
                let blocks = self.chain.blocks()?;
                peer.send(Message::all_blocks_response(&blocks)?);
            }
            MessageKind::AllBlocksResponse => {
                let blocks: Vec<Block> = message.decode()?;
                let local_height = self.chain.status().height;
                let remote_height = blocks.first().map_or(0, |block| block.height);

                if remote_height < local_height {
                    warn!(
                        "Ignoring chain of height {} from {}, local height is {}",
                        remote_height, peer.key, local_height
                    );
                    return Ok(());
                }

                self.chain.replace(&blocks)?;
                self.mempool.remove_confirmed(&blocks);
            }
            MessageKind::NewBlockNotify => {
                let block: Block = message.decode()?;

                if self.chain.add_peer_block(&block)? {
                    self.mempool.remove_confirmed(std::slice::from_ref(&block));
                } else if block.height > self.chain.status().height {
                    debug!("Block {} does not extend our tip, resyncing", block.hash);
                    peer.send(Message::all_blocks_request());
                } else {
                    self.send_newest_block(peer)?;
                }
            }
            MessageKind::NewTxNotify => {
                let tx: Tx = message.decode()?;
                self.mempool.add_peer_tx(tx);
            }
            MessageKind::NewPeerNotify => {
                let key: String = message.decode()?;
                let (address, port) = key
                    .rsplit_once(':')
                    .and_then(|(address, port)| Some((address.to_string(), port.parse::<u16>().ok()?)))
                    .ok_or_else(|| P2pError::InvalidPeer(key.clone()))?;

                let network = Arc::clone(self);
                tokio::spawn(async move {
                    if let Err(err) = network.add_peer(&address, port, false).await {
                        warn!("Failed to connect to announced peer {}: {}", key, err);
                    }
                });
            }
        }

        Ok(())
    }

    fn send_newest_block(&self, peer: &Peer) -> Result<(), P2pError> {
        let block = self.chain.newest_block()?;
        peer.send(Message::newest_block(&block)?);
        Ok(())
    }

    fn broadcast(&self, message: Message) {
        for peer in self.peers.snapshot() {
            if !peer.send(message.clone()) {
                debug!("Peer {} is gone, dropping {:?}", peer.key, message.kind);
            }
        }
    }

    /// Announces a freshly mined block to every peer
    pub fn broadcast_new_block(&self, block: &Block) -> Result<(), P2pError> {
        self.broadcast(Message::new_block(block)?);
        Ok(())
    }

    /// Announces a new pending transaction to every peer
    pub fn broadcast_new_tx(&self, tx: &Tx) -> Result<(), P2pError> {
        self.broadcast(Message::new_tx(tx)?);
        Ok(())
    }

    fn broadcast_new_peer(&self, new_peer: &Peer) -> Result<(), P2pError> {
        let message = Message::new_peer(&new_peer.key)?;
        for peer in self.peers.snapshot() {
            if peer.key != new_peer.key {
                peer.send(message.clone());
            }
        }
        Ok(())
    }
}
