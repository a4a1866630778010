use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

use super::block::Block;
use super::chain::{Blockchain, BlockchainError};
use super::crypto::{Address, Wallet};
use super::transaction::{self, Tx};

#[derive(Debug, Default)]
struct Pool {
    /// Waiting for the next block, in arrival order
    pending: Vec<Tx>,

    /// Drained into the block being mined; their inputs stay spent until the
    /// block commits or the transactions are restored
    mining: Vec<Tx>,
}

/// Unconfirmed transactions
#[derive(Debug, Default)]
pub struct Mempool {
    pool: Mutex<Pool>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Pool> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Gets a copy of every pending transaction
    pub fn txs(&self) -> Vec<Tx> {
        self.lock().pending.clone()
    }

    /// Pending transactions plus those in the block being mined: everything
    /// whose inputs must not be selected again
    pub fn spending(&self) -> Vec<Tx> {
        let pool = self.lock();
        pool.pending.iter().chain(pool.mining.iter()).cloned().collect()
    }

    /// Builds a transfer from `wallet` to `to` and queues it.
    ///
    /// The pool stays locked from the balance check to the insert, so two
    /// concurrent submissions cannot select the same outputs.
    pub fn add_tx(
        &self,
        chain: &Blockchain,
        wallet: &Wallet,
        to: &Address,
        amount: u64,
    ) -> Result<Tx, BlockchainError> {
        let mut pool = self.lock();
        let blocks = chain.blocks()?;
        let spending: Vec<Tx> = pool.pending.iter().chain(pool.mining.iter()).cloned().collect();

        let tx = transaction::make_tx(wallet, to, amount, &blocks, &spending)?;
        pool.pending.push(tx.clone());

        debug!("Queued transaction {} ({} to {})", tx.id, amount, to);
        Ok(tx)
    }

    /// Queues a transaction announced by a peer unless it is already known.
    /// It is not validated here; [`Mempool::tx_to_confirm`] does that.
    /// Returns whether it was added.
    pub fn add_peer_tx(&self, tx: Tx) -> bool {
        let mut pool = self.lock();
        let known = pool
            .pending
            .iter()
            .chain(pool.mining.iter())
            .any(|queued| queued.id == tx.id);
        if known {
            return false;
        }

        debug!("Queued peer transaction {}", tx.id);
        pool.pending.push(tx);
        true
    }

    /// Drains the pool into the transaction list of the block about to be
    /// mined at `height` on top of `blocks`, ending with a coinbase for
    /// `miner`.
    ///
    /// Transactions that fail validation or conflict with the chain or with
    /// an earlier transaction are dropped. The rest stay spent, in the mining
    /// slot, until [`Mempool::remove_confirmed`] or [`Mempool::restore`].
    pub fn tx_to_confirm(&self, miner: &Address, height: u64, blocks: &[Block]) -> Vec<Tx> {
        let mut pool = self.lock();
        let drained = std::mem::take(&mut pool.pending);

        let (accepted, rejected) = transaction::select_confirmable(drained, blocks);
        for tx in &rejected {
            warn!("Dropping transaction {} that cannot be confirmed", tx.id);
        }

        pool.mining = accepted.clone();
        let mut txs = accepted;
        txs.push(Tx::coinbase(miner, height));
        txs
    }

    /// Puts transactions drained by [`Mempool::tx_to_confirm`] back in front
    /// of anything queued since and clears the mining slot. Coinbase
    /// transactions are dropped.
    pub fn restore(&self, drained: Vec<Tx>) {
        let mut pool = self.lock();
        pool.mining.clear();
        let queued = std::mem::take(&mut pool.pending);

        pool.pending
            .extend(drained.into_iter().filter(|tx| !tx.is_coinbase()));
        for tx in queued {
            if !pool.pending.iter().any(|pending| pending.id == tx.id) {
                pool.pending.push(tx);
            }
        }
    }

    /// Drops every pending or in-flight transaction confirmed by one of
    /// `blocks`
    pub fn remove_confirmed(&self, blocks: &[Block]) {
        let confirmed = |tx: &Tx| {
            blocks
                .iter()
                .flat_map(|block| block.transactions.iter())
                .any(|block_tx| block_tx.id == tx.id)
        };

        let mut pool = self.lock();
        pool.pending.retain(|tx| !confirmed(tx));
        pool.mining.retain(|tx| !confirmed(tx));
    }
}
