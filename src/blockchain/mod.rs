// Blockchain module
//
// The consensus and ledger engine:
// - Block structure and proof of work
// - Chain engine (checkpoint, difficulty, replacement)
// - UTXO transactions and the mempool
// - Wallet signing
// - Persistent storage

pub mod block;
pub mod chain;
pub mod crypto;
pub mod mempool;
pub mod storage;
pub mod transaction;

// Re-export main components for easier access
pub use block::Block;
pub use chain::{Blockchain, BlockchainError, ChainState};
pub use crypto::{Address, Wallet};
pub use mempool::Mempool;
pub use storage::BlockchainStorage;
pub use transaction::{Tx, TxIn, TxOut, UTxOut};
