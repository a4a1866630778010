use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use super::block::Block;
use super::crypto::Address;
use super::mempool::Mempool;
use super::storage::{BlockchainStorage, StorageError};
use super::transaction::{self, TransactionError, UTxOut};

/// Difficulty of the genesis block
pub const DEFAULT_DIFFICULTY: u32 = 2;

/// Difficulty is recalculated every this many blocks
pub const DIFFICULTY_INTERVAL: u64 = 5;

/// Expected minutes between two blocks
pub const BLOCK_CREATE_INTERVAL: i64 = 2;

/// Tolerance, in minutes, around the expected retarget window
pub const ALLOWED_RANGE: i64 = 2;

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Block not found: {0}")]
    NotFound(String),

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error("Invalid chain: {0}")]
    InvalidChain(String),

    #[error("Chain is corrupted, block {0} is missing")]
    Corrupted(String),

    #[error("Chain tip moved while mining")]
    StaleTip,
}

/// The persisted checkpoint: where the tip is and how hard the next block is
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChainState {
    pub newest_hash: String,
    pub height: u64,
    pub current_difficulty: u32,
}

/// The block/chain engine.
///
/// Blocks live in storage keyed by hash and link backwards through
/// `previous_hash`; only the checkpoint is held in memory.
#[derive(Debug)]
pub struct Blockchain {
    storage: BlockchainStorage,

    /// Guards every read-modify-persist of the checkpoint
    state: Mutex<ChainState>,

    /// Serialises local miners
    mining: Mutex<()>,
}

/// Applies the retarget rule to the timestamps (seconds) of the newest block
/// and the block `DIFFICULTY_INTERVAL - 1` positions behind it
pub fn retarget(current: u32, newest_timestamp: i64, oldest_timestamp: i64) -> u32 {
    let actual_minutes = newest_timestamp / 60 - oldest_timestamp / 60;
    let expected_minutes = DIFFICULTY_INTERVAL as i64 * BLOCK_CREATE_INTERVAL;

    if actual_minutes < expected_minutes - ALLOWED_RANGE {
        current + 1
    } else if actual_minutes > expected_minutes + ALLOWED_RANGE {
        current.saturating_sub(1)
    } else {
        current
    }
}

/// Checks a newest-first candidate chain: the height and hash links between
/// neighbours, a genesis at the end, the difficulty every block had to be
/// mined at, and every block's proof of work
pub fn validate_chain(blocks: &[Block]) -> Result<(), BlockchainError> {
    let Some(genesis) = blocks.last() else {
        return Err(BlockchainError::InvalidChain("chain is empty".to_string()));
    };

    for pair in blocks.windows(2) {
        let (block, previous) = (&pair[0], &pair[1]);
        if block.previous_hash != previous.hash || block.height != previous.height + 1 {
            return Err(BlockchainError::InvalidChain(format!(
                "block {} does not link to block {}",
                block.hash, previous.hash
            )));
        }
    }

    if genesis.height != 1 || !genesis.previous_hash.is_empty() {
        return Err(BlockchainError::InvalidChain(
            "chain does not end at a genesis block".to_string(),
        ));
    }

    // Oldest first, so index i holds height i + 1
    let oldest_first: Vec<&Block> = blocks.iter().rev().collect();
    for (i, block) in oldest_first.iter().enumerate() {
        let expected = if i == 0 {
            DEFAULT_DIFFICULTY
        } else {
            let previous = oldest_first[i - 1];
            if i as u64 % DIFFICULTY_INTERVAL != 0 {
                previous.difficulty
            } else {
                let last_checked = oldest_first[i - DIFFICULTY_INTERVAL as usize];
                retarget(previous.difficulty, previous.timestamp, last_checked.timestamp)
            }
        };

        if block.difficulty != expected {
            return Err(BlockchainError::InvalidChain(format!(
                "block {} declares difficulty {}, expected {}",
                block.hash, block.difficulty, expected
            )));
        }
    }

    blocks.iter().try_for_each(Block::verify_proof_of_work)
}

impl Blockchain {
    /// Opens the chain stored in `storage`.
    ///
    /// A store without a checkpoint gets a genesis block, mined through the
    /// normal `add_block` path with the reward going to `miner`.
    pub fn open(
        storage: BlockchainStorage,
        mempool: &Mempool,
        miner: &Address,
    ) -> Result<Self, BlockchainError> {
        let checkpoint = storage.checkpoint()?;
        let is_new = checkpoint.is_none();

        let blockchain = Blockchain {
            storage,
            state: Mutex::new(checkpoint.unwrap_or_default()),
            mining: Mutex::new(()),
        };

        if is_new {
            info!("No checkpoint found in storage, creating genesis block");
            blockchain.add_block(mempool, miner)?;
        } else {
            let state = blockchain.status();
            info!(
                "Loaded chain at height {} (tip {})",
                state.height, state.newest_hash
            );
        }

        Ok(blockchain)
    }

    fn lock_state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Gets a snapshot of the checkpoint
    pub fn status(&self) -> ChainState {
        self.lock_state().clone()
    }

    /// Loads a block by hash
    pub fn find_block(&self, hash: &str) -> Result<Block, BlockchainError> {
        self.storage
            .get_block(hash)?
            .ok_or_else(|| BlockchainError::NotFound(hash.to_string()))
    }

    /// Gets the block at the tip
    pub fn newest_block(&self) -> Result<Block, BlockchainError> {
        let state = self.status();
        self.find_block(&state.newest_hash)
    }

    /// Gets every block from the tip back to genesis
    pub fn blocks(&self) -> Result<Vec<Block>, BlockchainError> {
        let state = self.status();
        self.blocks_from(&state)
    }

    fn blocks_from(&self, state: &ChainState) -> Result<Vec<Block>, BlockchainError> {
        let mut blocks = Vec::with_capacity(state.height as usize);
        if state.newest_hash.is_empty() {
            return Ok(blocks);
        }

        let mut cursor = state.newest_hash.clone();
        loop {
            let block = self
                .storage
                .get_block(&cursor)?
                .ok_or_else(|| BlockchainError::Corrupted(cursor.clone()))?;

            let previous = block.previous_hash.clone();
            blocks.push(block);
            if previous.is_empty() {
                break;
            }
            cursor = previous;
        }

        Ok(blocks)
    }

    /// Difficulty the next block must be mined at
    pub fn difficulty(&self) -> Result<u32, BlockchainError> {
        let state = self.status();
        self.difficulty_for(&state)
    }

    fn difficulty_for(&self, state: &ChainState) -> Result<u32, BlockchainError> {
        if state.height == 0 {
            return Ok(DEFAULT_DIFFICULTY);
        }
        if state.height % DIFFICULTY_INTERVAL != 0 {
            return Ok(state.current_difficulty);
        }

        let blocks = self.blocks_from(state)?;
        let newest = blocks
            .first()
            .ok_or_else(|| BlockchainError::Corrupted(state.newest_hash.clone()))?;
        let last_checked = blocks
            .get(DIFFICULTY_INTERVAL as usize - 1)
            .ok_or_else(|| BlockchainError::Corrupted(newest.previous_hash.clone()))?;

        Ok(retarget(
            state.current_difficulty,
            newest.timestamp,
            last_checked.timestamp,
        ))
    }

    /// Mines a block on top of the tip with every pending transaction plus a
    /// coinbase reward for `miner`, then persists it and the new checkpoint.
    ///
    /// Mining happens outside the state lock. If the tip moved meanwhile (a
    /// peer's chain was adopted) the block is discarded, the drained
    /// transactions go back to the mempool and `StaleTip` is returned.
    pub fn add_block(&self, mempool: &Mempool, miner: &Address) -> Result<Block, BlockchainError> {
        let _mining = self.mining.lock().unwrap_or_else(PoisonError::into_inner);

        let snapshot = self.status();
        let difficulty = self.difficulty_for(&snapshot)?;
        let height = snapshot.height + 1;
        let blocks = self.blocks_from(&snapshot)?;

        let transactions = mempool.tx_to_confirm(miner, height, &blocks);
        let mut block = Block::new(height, snapshot.newest_hash.clone(), difficulty, transactions);
        block.mine();

        let mut state = self.lock_state();
        if state.newest_hash != snapshot.newest_hash {
            drop(state);
            warn!("Discarding block {} mined on a stale tip", block.hash);
            mempool.restore(block.transactions);
            return Err(BlockchainError::StaleTip);
        }

        let appended = self.append(&mut state, &block);
        drop(state);
        if let Err(err) = appended {
            mempool.restore(block.transactions);
            return Err(err);
        }
        mempool.remove_confirmed(std::slice::from_ref(&block));

        info!(
            "Mined block {} at height {} (difficulty {}, nonce {})",
            block.hash, block.height, block.difficulty, block.nonce
        );
        Ok(block)
    }

    fn append(&self, state: &mut ChainState, block: &Block) -> Result<(), BlockchainError> {
        let next = ChainState {
            newest_hash: block.hash.clone(),
            height: block.height,
            current_difficulty: block.difficulty,
        };

        self.storage.save_block(block)?;
        self.storage.save_checkpoint(&next)?;
        self.storage.flush()?;

        *state = next;
        Ok(())
    }

    /// Appends a block received from a peer if it extends the tip.
    ///
    /// Returns `Ok(false)` when the block is well formed but does not sit
    /// directly on the local tip. A block that sits on the tip but was not
    /// mined at the required difficulty is an error.
    pub fn add_peer_block(&self, block: &Block) -> Result<bool, BlockchainError> {
        block.verify_proof_of_work()?;

        let mut state = self.lock_state();
        if block.previous_hash != state.newest_hash || block.height != state.height + 1 {
            return Ok(false);
        }

        let expected = self.difficulty_for(&state)?;
        if block.difficulty != expected {
            return Err(BlockchainError::InvalidBlock(format!(
                "block {} declares difficulty {}, expected {}",
                block.hash, block.difficulty, expected
            )));
        }

        self.append(&mut state, block)?;
        info!("Appended peer block {} at height {}", block.hash, block.height);
        Ok(true)
    }

    /// Substitutes the local chain with `blocks` (newest first).
    ///
    /// No length comparison happens here; the caller decides whether the
    /// candidate should win. Every block is still validated first.
    pub fn replace(&self, blocks: &[Block]) -> Result<(), BlockchainError> {
        validate_chain(blocks)?;
        let newest = &blocks[0];

        let mut state = self.lock_state();
        for block in blocks {
            self.storage.save_block(block)?;
        }

        let next = ChainState {
            newest_hash: newest.hash.clone(),
            height: newest.height,
            current_difficulty: newest.difficulty,
        };
        self.storage.save_checkpoint(&next)?;
        self.storage.flush()?;
        *state = next;

        info!("Replaced chain, new tip {} at height {}", newest.hash, newest.height);
        Ok(())
    }

    /// Unspent outputs of `address` over the confirmed chain, minus those
    /// already spent by pending or in-flight transactions
    pub fn utxos_by_address(
        &self,
        address: &Address,
        mempool: &Mempool,
    ) -> Result<Vec<UTxOut>, BlockchainError> {
        let blocks = self.blocks()?;
        Ok(transaction::utxos_by_address(address, &blocks, &mempool.spending()))
    }

    pub fn balance_by_address(
        &self,
        address: &Address,
        mempool: &Mempool,
    ) -> Result<u64, BlockchainError> {
        let blocks = self.blocks()?;
        Ok(transaction::balance_by_address(address, &blocks, &mempool.spending()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::blockchain::crypto::Wallet;
    use crate::blockchain::transaction::{Tx, TxIn, TxOut, MINER_REWARD};

    pub(crate) fn new_chain(miner: &Address) -> (Blockchain, Mempool) {
        let mempool = Mempool::new();
        let storage = BlockchainStorage::temporary().unwrap();
        let chain = Blockchain::open(storage, &mempool, miner).unwrap();
        (chain, mempool)
    }

    fn chained_block(previous: Option<&Block>, difficulty: u32, timestamp: i64) -> Block {
        let height = previous.map_or(1, |b| b.height + 1);
        let previous_hash = previous.map(|b| b.hash.clone()).unwrap_or_default();
        let coinbase = Tx::coinbase(&Address::from("simulated"), height);
        let mut block = Block::new(height, previous_hash, difficulty, vec![coinbase]);
        block.mine_with_clock(|| timestamp);
        block
    }

    /// Builds a valid newest-first chain of `count` blocks whose timestamps
    /// are `spacing` seconds apart, each mined at the difficulty the
    /// retarget rule requires
    pub(crate) fn simulated_chain(count: u64, spacing: i64) -> Vec<Block> {
        let mut blocks: Vec<Block> = Vec::new();
        for i in 0..count as usize {
            let difficulty = match blocks.last() {
                None => DEFAULT_DIFFICULTY,
                Some(previous) if i as u64 % DIFFICULTY_INTERVAL != 0 => previous.difficulty,
                Some(previous) => retarget(
                    previous.difficulty,
                    previous.timestamp,
                    blocks[i - DIFFICULTY_INTERVAL as usize].timestamp,
                ),
            };
            let block = chained_block(blocks.last(), difficulty, 6_000 + i as i64 * spacing);
            blocks.push(block);
        }
        blocks.reverse();
        blocks
    }

    #[test]
    fn test_genesis_block() {
        let miner = Address::from("miner");
        let (chain, _mempool) = new_chain(&miner);

        let state = chain.status();
        assert_eq!(state.height, 1);
        assert_eq!(state.current_difficulty, DEFAULT_DIFFICULTY);

        let genesis = chain.find_block(&state.newest_hash).unwrap();
        assert_eq!(genesis.height, 1);
        assert_eq!(genesis.previous_hash, "");
        assert_eq!(genesis.transactions.len(), 1);
        assert!(genesis.transactions[0].is_coinbase());
        assert_eq!(genesis.transactions[0].tx_outs[0].address, miner);
        assert_eq!(genesis.transactions[0].tx_outs[0].amount, MINER_REWARD);
        assert!(genesis.hash.starts_with("00"));
    }

    #[test]
    fn test_blocks_walk_back_to_genesis() {
        let miner = Address::from("miner");
        let (chain, mempool) = new_chain(&miner);

        let mut tips = vec![chain.status().newest_hash];
        for _ in 0..3 {
            let block = chain.add_block(&mempool, &miner).unwrap();
            assert_eq!(&block.previous_hash, tips.last().unwrap());
            tips.push(block.hash);
        }

        let blocks = chain.blocks().unwrap();
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0].height, 4);
        assert_eq!(blocks.last().unwrap().previous_hash, "");
        let hashes: Vec<String> = blocks.iter().rev().map(|b| b.hash.clone()).collect();
        assert_eq!(hashes, tips);
        assert!(validate_chain(&blocks).is_ok());
    }

    #[test]
    fn test_find_block() {
        let miner = Address::from("miner");
        let (chain, _mempool) = new_chain(&miner);
        let hash = chain.status().newest_hash;

        let first = bincode::serialize(&chain.find_block(&hash).unwrap()).unwrap();
        let second = bincode::serialize(&chain.find_block(&hash).unwrap()).unwrap();
        assert_eq!(first, second);

        assert!(matches!(
            chain.find_block("0000missing"),
            Err(BlockchainError::NotFound(_))
        ));
    }

    #[test]
    fn test_reopen_keeps_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let miner = Address::from("miner");
        let mempool = Mempool::new();

        let expected = {
            let storage = BlockchainStorage::new(dir.path()).unwrap();
            let chain = Blockchain::open(storage, &mempool, &miner).unwrap();
            chain.add_block(&mempool, &miner).unwrap();
            chain.status()
        };

        let storage = BlockchainStorage::new(dir.path()).unwrap();
        let chain = Blockchain::open(storage, &mempool, &miner).unwrap();
        assert_eq!(chain.status(), expected);
        assert_eq!(chain.blocks().unwrap().len(), 2);
    }

    #[test]
    fn test_retarget_rule() {
        // 4 minutes for the window: too fast
        assert_eq!(retarget(2, 6_240, 6_000), 3);
        // 16 minutes: too slow
        assert_eq!(retarget(2, 6_960, 6_000), 1);
        // 8, 10 and 12 minutes are within range
        assert_eq!(retarget(2, 6_480, 6_000), 2);
        assert_eq!(retarget(2, 6_600, 6_000), 2);
        assert_eq!(retarget(2, 6_720, 6_000), 2);
        // never below zero
        assert_eq!(retarget(0, 6_960, 6_000), 0);
    }

    #[test]
    fn test_difficulty_retarget_on_interval() {
        let miner = Address::from("miner");
        let cases = [(60, 3), (240, 1), (150, 2)];

        for (spacing, expected) in cases {
            let (chain, _mempool) = new_chain(&miner);
            chain.replace(&simulated_chain(5, spacing)).unwrap();

            assert_eq!(chain.status().height, 5);
            assert_eq!(chain.difficulty().unwrap(), expected, "spacing {spacing}");
        }
    }

    #[test]
    fn test_difficulty_between_intervals_is_unchanged() {
        let miner = Address::from("miner");
        let (chain, _mempool) = new_chain(&miner);
        chain.replace(&simulated_chain(7, 60)).unwrap();

        assert_eq!(chain.newest_block().unwrap().difficulty, 3);
        assert_eq!(chain.difficulty().unwrap(), 3);
    }

    #[test]
    fn test_replace_rejects_invalid_chains() {
        let miner = Address::from("miner");
        let (chain, _mempool) = new_chain(&miner);
        let before = chain.status();

        let mut tampered = simulated_chain(3, 60);
        tampered[1].nonce += 1;
        assert!(chain.replace(&tampered).is_err());

        let mut unlinked = simulated_chain(3, 60);
        unlinked.remove(1);
        assert!(matches!(
            chain.replace(&unlinked),
            Err(BlockchainError::InvalidChain(_))
        ));

        assert!(chain.replace(&[]).is_err());
        assert_eq!(chain.status(), before);
    }

    #[test]
    fn test_replace_rejects_understated_difficulty() {
        let miner = Address::from("miner");
        let (chain, mempool) = new_chain(&miner);
        for _ in 0..3 {
            chain.add_block(&mempool, &miner).unwrap();
        }
        let before = chain.status();

        // Proof of work holds for the declared difficulty, which is too low
        let mut easy = vec![chained_block(None, 0, 6_000)];
        for i in 1..5 {
            let block = chained_block(easy.last(), 0, 6_000 + i * 60);
            easy.push(block);
        }
        easy.reverse();
        assert!(easy.iter().all(|block| block.verify_proof_of_work().is_ok()));

        assert!(matches!(
            chain.replace(&easy),
            Err(BlockchainError::InvalidChain(_))
        ));
        assert_eq!(chain.status(), before);
    }

    #[test]
    fn test_add_peer_block() {
        let miner = Address::from("miner");
        let (chain, _mempool) = new_chain(&miner);
        let tip = chain.newest_block().unwrap();
        let difficulty = chain.difficulty().unwrap();

        let mut easy = Block::new(2, tip.hash.clone(), 0, vec![Tx::coinbase(&miner, 2)]);
        easy.mine();
        assert!(matches!(
            chain.add_peer_block(&easy),
            Err(BlockchainError::InvalidBlock(_))
        ));
        assert_eq!(chain.status().height, 1);

        let mut block = Block::new(2, tip.hash.clone(), difficulty, vec![Tx::coinbase(&miner, 2)]);
        block.mine();
        assert!(chain.add_peer_block(&block).unwrap());
        assert_eq!(chain.status().newest_hash, block.hash);

        let mut orphan = Block::new(5, "elsewhere".to_string(), 1, Vec::new());
        orphan.mine();
        assert!(!chain.add_peer_block(&orphan).unwrap());
        assert_eq!(chain.status().height, 2);
    }

    #[test]
    fn test_spend_and_confirm() {
        let wallet = Wallet::generate();
        let bob = Address::from("bob");
        let (chain, mempool) = new_chain(wallet.address());

        let tx = mempool.add_tx(&chain, &wallet, &bob, 20).unwrap();
        assert_eq!(mempool.txs(), vec![tx.clone()]);
        assert_eq!(chain.balance_by_address(wallet.address(), &mempool).unwrap(), 0);

        let block = chain.add_block(&mempool, &Address::from("other")).unwrap();
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[0], tx);
        assert!(block.transactions[1].is_coinbase());
        assert!(mempool.txs().is_empty());

        assert_eq!(chain.balance_by_address(wallet.address(), &mempool).unwrap(), 30);
        assert_eq!(chain.balance_by_address(&bob, &mempool).unwrap(), 20);

        let utxos = chain.utxos_by_address(wallet.address(), &mempool).unwrap();
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].tx_id, tx.id);
    }

    #[test]
    fn test_not_enough_balance_leaves_mempool_unchanged() {
        let wallet = Wallet::generate();
        let bob = Address::from("bob");
        let (chain, mempool) = new_chain(wallet.address());
        mempool.add_tx(&chain, &wallet, &bob, 40).unwrap();
        chain.add_block(&mempool, &Address::from("other")).unwrap();
        assert_eq!(chain.balance_by_address(wallet.address(), &mempool).unwrap(), 10);

        let result = mempool.add_tx(&chain, &wallet, &bob, 50);
        assert!(matches!(
            result,
            Err(BlockchainError::TransactionError(TransactionError::NotEnoughBalance))
        ));
        assert!(mempool.txs().is_empty());
    }

    #[test]
    fn test_spend_while_mining_cannot_reuse_outputs() {
        let wallet = Wallet::generate();
        let bob = Address::from("bob");
        let other = Address::from("other");
        let (chain, mempool) = new_chain(wallet.address());

        let first = mempool.add_tx(&chain, &wallet, &bob, 20).unwrap();

        // What add_block does before it starts mining
        let blocks = chain.blocks().unwrap();
        let drained = mempool.tx_to_confirm(&other, 2, &blocks);
        assert!(matches!(
            mempool.add_tx(&chain, &wallet, &bob, 20),
            Err(BlockchainError::TransactionError(TransactionError::NotEnoughBalance))
        ));
        mempool.restore(drained);

        let block = chain.add_block(&mempool, &other).unwrap();
        assert_eq!(block.transactions[0], first);

        let owner = chain.balance_by_address(wallet.address(), &mempool).unwrap();
        let received = chain.balance_by_address(&bob, &mempool).unwrap();
        assert_eq!((owner, received), (30, 20));
    }

    #[test]
    fn test_conflicting_spends_confirm_once() {
        let wallet = Wallet::generate();
        let bob = Address::from("bob");
        let carol = Address::from("carol");
        let (chain, mempool) = new_chain(wallet.address());
        let blocks = chain.blocks().unwrap();

        let to_bob = transaction::make_tx(&wallet, &bob, 20, &blocks, &[]).unwrap();
        let to_carol = transaction::make_tx(&wallet, &carol, 20, &blocks, &[]).unwrap();
        mempool.add_peer_tx(to_bob.clone());
        mempool.add_peer_tx(to_carol);

        let block = chain.add_block(&mempool, &Address::from("other")).unwrap();
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[0], to_bob);
        assert!(mempool.txs().is_empty());

        let total: u64 = [wallet.address(), &bob, &carol]
            .iter()
            .map(|address| chain.balance_by_address(address, &mempool).unwrap())
            .sum();
        assert_eq!(total, MINER_REWARD);
    }

    #[test]
    fn test_forged_peer_tx_is_not_mined() {
        let owner = Wallet::generate();
        let thief = Address::from("thief");
        let (chain, mempool) = new_chain(owner.address());
        let reward = chain.newest_block().unwrap().transactions[0].clone();

        let mut forged = Tx {
            id: String::new(),
            timestamp: 0,
            tx_ins: vec![TxIn { tx_id: reward.id, index: 0, signature: "00".repeat(64) }],
            tx_outs: vec![TxOut { address: thief.clone(), amount: 50 }],
        };
        forged.id = forged.calculate_id();
        mempool.add_peer_tx(forged);

        let block = chain.add_block(&mempool, &Address::from("other")).unwrap();

        assert_eq!(block.transactions.len(), 1);
        assert!(block.transactions[0].is_coinbase());
        assert_eq!(chain.balance_by_address(owner.address(), &mempool).unwrap(), 50);
        assert_eq!(chain.balance_by_address(&thief, &mempool).unwrap(), 0);
        assert!(mempool.txs().is_empty());
    }
}
