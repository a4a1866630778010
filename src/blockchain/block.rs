use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::chain::BlockchainError;
use super::transaction::Tx;

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Position in the chain, 1 for genesis
    pub height: u64,

    /// Hash of the block, also its key in storage
    pub hash: String,

    /// Hash of the previous block, empty for genesis
    pub previous_hash: String,

    /// Required number of leading zero hex digits in `hash`
    pub difficulty: u32,

    /// Proof of work search variable
    pub nonce: u64,

    /// Seconds since the epoch, refreshed on every mining attempt
    pub timestamp: i64,

    /// Transactions confirmed by this block, coinbase last
    pub transactions: Vec<Tx>,
}

impl Block {
    /// Creates an unmined block shell
    pub fn new(height: u64, previous_hash: String, difficulty: u32, transactions: Vec<Tx>) -> Self {
        Block {
            height,
            hash: String::new(),
            previous_hash,
            difficulty,
            nonce: 0,
            timestamp: 0,
            transactions,
        }
    }

    /// Calculates the hash of the block
    ///
    /// # Returns
    ///
    /// The SHA-256 hash, as lowercase hex, of every field except `hash`
    pub fn calculate_hash(&self) -> String {
        let block_data = serde_json::json!({
            "height": self.height,
            "previous_hash": self.previous_hash,
            "difficulty": self.difficulty,
            "nonce": self.nonce,
            "timestamp": self.timestamp,
            "transactions": self.transactions,
        });

        let mut hasher = Sha256::new();
        hasher.update(block_data.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Searches for a nonce whose hash meets the block's difficulty.
    ///
    /// This loop has no upper bound: expected work is 16^difficulty hashes.
    pub fn mine(&mut self) {
        self.mine_with_clock(|| Utc::now().timestamp());
    }

    pub(crate) fn mine_with_clock(&mut self, mut clock: impl FnMut() -> i64) {
        let target = "0".repeat(self.difficulty as usize);

        loop {
            self.timestamp = clock();
            let hash = self.calculate_hash();

            if hash.starts_with(&target) {
                self.hash = hash;
                return;
            }

            self.nonce += 1;
        }
    }

    /// Checks that `hash` reproduces from the other fields and meets the
    /// declared difficulty
    pub fn verify_proof_of_work(&self) -> Result<(), BlockchainError> {
        if self.hash != self.calculate_hash() {
            return Err(BlockchainError::InvalidBlock(format!(
                "hash mismatch for block at height {}",
                self.height
            )));
        }

        let zeros = self.hash.chars().take_while(|c| *c == '0').count();
        if zeros < self.difficulty as usize {
            return Err(BlockchainError::InvalidBlock(format!(
                "block {} has {} leading zeros, needs {}",
                self.hash, zeros, self.difficulty
            )));
        }

        Ok(())
    }
}
