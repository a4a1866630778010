use std::path::Path;

use sled::{Db, Tree};
use thiserror::Error;

use super::block::Block;
use super::chain::ChainState;

/// Key of the single record in the data tree
const CHECKPOINT_KEY: &str = "checkpoint";

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

/// Durable store for the ledger.
///
/// Two key spaces: `blocks` maps a block hash to the encoded block, `data`
/// holds the single chain checkpoint.
pub struct BlockchainStorage {
    db: Db,
    blocks: Tree,
    data: Tree,
}

impl std::fmt::Debug for BlockchainStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainStorage").finish()
    }
}

impl BlockchainStorage {
    /// Opens (or creates) the store in the given directory
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        Self::from_db(sled::open(path)?)
    }

    /// Opens a throwaway store that is removed when dropped
    pub fn temporary() -> Result<Self, StorageError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self, StorageError> {
        let blocks = db.open_tree("blocks")?;
        let data = db.open_tree("data")?;

        Ok(Self { db, blocks, data })
    }

    /// Saves a block keyed by its hash
    pub fn save_block(&self, block: &Block) -> Result<(), StorageError> {
        let value = bincode::serialize(block)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        self.blocks.insert(block.hash.as_bytes(), value)?;
        Ok(())
    }

    /// Gets a block by its hash, `None` if no such key exists
    pub fn get_block(&self, hash: &str) -> Result<Option<Block>, StorageError> {
        match self.blocks.get(hash.as_bytes())? {
            Some(value) => {
                let block = bincode::deserialize(&value)
                    .map_err(|e| StorageError::DeserializationError(e.to_string()))?;
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    /// Saves the chain checkpoint
    pub fn save_checkpoint(&self, state: &ChainState) -> Result<(), StorageError> {
        let value = bincode::serialize(state)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        self.data.insert(CHECKPOINT_KEY, value)?;
        Ok(())
    }

    /// Gets the chain checkpoint, `None` on a fresh store
    pub fn checkpoint(&self) -> Result<Option<ChainState>, StorageError> {
        match self.data.get(CHECKPOINT_KEY)? {
            Some(value) => {
                let state = bincode::deserialize(&value)
                    .map_err(|e| StorageError::DeserializationError(e.to_string()))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    /// Flushes all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        let mut block = Block::new(1, String::new(), 0, Vec::new());
        block.mine();
        block
    }

    #[test]
    fn test_block_round_trip() {
        let storage = BlockchainStorage::temporary().unwrap();
        let block = sample_block();

        storage.save_block(&block).unwrap();
        let loaded = storage.get_block(&block.hash).unwrap().unwrap();

        assert_eq!(loaded, block);
    }

    #[test]
    fn test_missing_block_is_none() {
        let storage = BlockchainStorage::temporary().unwrap();
        assert!(storage.get_block("deadbeef").unwrap().is_none());
    }

    #[test]
    fn test_checkpoint() {
        let storage = BlockchainStorage::temporary().unwrap();
        assert!(storage.checkpoint().unwrap().is_none());

        let state = ChainState {
            newest_hash: "00ab".to_string(),
            height: 3,
            current_difficulty: 2,
        };
        storage.save_checkpoint(&state).unwrap();

        assert_eq!(storage.checkpoint().unwrap(), Some(state));
    }

    #[test]
    fn test_corrupted_record_is_an_error() {
        let storage = BlockchainStorage::temporary().unwrap();
        storage.blocks.insert("bad", vec![0xff]).unwrap();

        assert!(matches!(
            storage.get_block("bad"),
            Err(StorageError::DeserializationError(_))
        ));
    }
}
