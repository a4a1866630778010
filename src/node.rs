// Node wiring
//
// Startup happens in a fixed order: wallet, store, mempool, chain, network.
// The resulting handles are shared by the REST surface and the peer tasks.

use std::sync::Arc;

use log::info;
use thiserror::Error;

use crate::blockchain::crypto::CryptoError;
use crate::blockchain::storage::StorageError;
use crate::blockchain::{Address, Block, Blockchain, BlockchainError, BlockchainStorage, Mempool, Tx, Wallet};
use crate::config::Config;
use crate::p2p::{Network, P2pError};

/// Errors surfaced by node-level operations
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Wallet error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Blockchain(#[from] BlockchainError),

    #[error("Network error: {0}")]
    P2p(#[from] P2pError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything a running node owns
#[derive(Debug, Clone)]
pub struct Node {
    pub chain: Arc<Blockchain>,
    pub mempool: Arc<Mempool>,
    pub wallet: Arc<Wallet>,
    pub network: Arc<Network>,
}

impl Node {
    /// Opens the wallet and the store named by `config` and builds the node
    pub fn start(config: &Config) -> Result<Self, NodeError> {
        let data_dir = config.data_dir();
        std::fs::create_dir_all(&data_dir)?;

        let wallet = Wallet::load_or_create(config.wallet_file())?;
        let storage = BlockchainStorage::new(&data_dir)?;
        info!("Opened block store at {}", data_dir.display());

        Self::open(storage, wallet, config.p2p_port())
    }

    /// Builds a node over an already opened store. `open_port` is the port
    /// peers can dial this node back on.
    pub fn open(storage: BlockchainStorage, wallet: Wallet, open_port: u16) -> Result<Self, NodeError> {
        let mempool = Arc::new(Mempool::new());
        let chain = Arc::new(Blockchain::open(storage, &mempool, wallet.address())?);
        let network = Network::new(Arc::clone(&chain), Arc::clone(&mempool), open_port);

        Ok(Node {
            chain,
            mempool,
            wallet: Arc::new(wallet),
            network,
        })
    }

    pub fn address(&self) -> &Address {
        self.wallet.address()
    }

    /// Mines the pending transactions into a block rewarding this node's
    /// wallet and announces it to every peer
    pub fn mine(&self) -> Result<Block, NodeError> {
        let block = self.chain.add_block(&self.mempool, self.wallet.address())?;
        self.network.broadcast_new_block(&block)?;
        Ok(block)
    }

    /// Queues a transfer from this node's wallet and announces it to every peer
    pub fn send(&self, to: &Address, amount: u64) -> Result<Tx, NodeError> {
        let tx = self.mempool.add_tx(&self.chain, &self.wallet, to, amount)?;
        self.network.broadcast_new_tx(&tx)?;
        Ok(tx)
    }

    /// Connects to a peer and introduces it to the peers already known
    pub async fn connect(&self, address: &str, port: u16) -> Result<(), NodeError> {
        self.network.add_peer(address, port, true).await?;
        Ok(())
    }
}
