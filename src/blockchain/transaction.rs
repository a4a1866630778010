use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;

use super::block::Block;
use super::crypto::{self, Address, CryptoError, Wallet};

/// Signature sentinel marking the reward input of a coinbase transaction
pub const COINBASE: &str = "COINBASE";

/// Amount minted to the miner of every block
pub const MINER_REWARD: u64 = 50;

/// Errors that can occur while building a transaction
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Not enough balance")]
    NotEnoughBalance,

    #[error("Transaction is not valid")]
    NotValid,

    #[error("Crypto error: {0}")]
    CryptoError(#[from] CryptoError),
}

/// A transfer of value from spent outputs to new outputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Tx {
    /// Hash of the other fields, signatures excluded
    pub id: String,

    /// Seconds since the epoch at creation
    pub timestamp: i64,

    pub tx_ins: Vec<TxIn>,

    pub tx_outs: Vec<TxOut>,
}

/// A reference to a previous output plus the proof that spends it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TxIn {
    pub tx_id: String,
    pub index: usize,

    /// Hex signature over the spending transaction's id, or [`COINBASE`]
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TxOut {
    pub address: Address,
    pub amount: u64,
}

/// An output not consumed by any confirmed or pending input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UTxOut {
    pub tx_id: String,
    pub index: usize,
    pub amount: u64,
}

impl TxIn {
    pub fn is_coinbase(&self) -> bool {
        self.signature == COINBASE
    }
}

impl Tx {
    /// Creates a coinbase transaction crediting `address` with the miner reward.
    ///
    /// The reward input has no source output; its index carries the height of
    /// the block being mined so two rewards to one address never share an id.
    pub fn coinbase(address: &Address, height: u64) -> Self {
        let mut tx = Tx {
            id: String::new(),
            timestamp: Utc::now().timestamp(),
            tx_ins: vec![TxIn {
                tx_id: String::new(),
                index: height as usize,
                signature: COINBASE.to_string(),
            }],
            tx_outs: vec![TxOut {
                address: address.clone(),
                amount: MINER_REWARD,
            }],
        };
        tx.id = tx.calculate_id();
        tx
    }

    pub fn is_coinbase(&self) -> bool {
        self.tx_ins.iter().any(TxIn::is_coinbase)
    }

    /// Hashes every field except the id and the input signatures, so the id
    /// can be signed and still reproduced afterwards
    pub fn calculate_id(&self) -> String {
        let inputs: Vec<_> = self
            .tx_ins
            .iter()
            .map(|input| serde_json::json!({ "tx_id": input.tx_id, "index": input.index }))
            .collect();

        let data = serde_json::json!({
            "timestamp": self.timestamp,
            "tx_ins": inputs,
            "tx_outs": self.tx_outs,
        });

        let mut hasher = Sha256::new();
        hasher.update(data.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    fn sign(&mut self, wallet: &Wallet) -> Result<(), TransactionError> {
        for input in &mut self.tx_ins {
            input.signature = wallet.sign(&self.id)?;
        }
        Ok(())
    }
}

/// Looks up a confirmed transaction by id
pub fn find_transaction<'a>(blocks: &'a [Block], id: &str) -> Option<&'a Tx> {
    blocks
        .iter()
        .flat_map(|block| block.transactions.iter())
        .find(|tx| tx.id == id)
}

/// Checks a non-coinbase transaction against the confirmed chain: its id
/// reproduces, every input references a confirmed output at most once and
/// carries a valid signature by that output's owner, and the outputs do not
/// exceed the inputs
pub fn validate(tx: &Tx, blocks: &[Block]) -> bool {
    if tx.is_coinbase() || tx.tx_ins.is_empty() || tx.id != tx.calculate_id() {
        return false;
    }

    let mut referenced = HashSet::new();
    let mut input_total: u64 = 0;
    for input in &tx.tx_ins {
        if !referenced.insert((input.tx_id.as_str(), input.index)) {
            return false;
        }
        let Some(prev_tx) = find_transaction(blocks, &input.tx_id) else {
            return false;
        };
        let Some(output) = prev_tx.tx_outs.get(input.index) else {
            return false;
        };
        if !crypto::verify(&input.signature, &tx.id, &output.address) {
            return false;
        }
        let Some(total) = input_total.checked_add(output.amount) else {
            return false;
        };
        input_total = total;
    }

    let output_total = tx
        .tx_outs
        .iter()
        .try_fold(0u64, |total, output| total.checked_add(output.amount));
    matches!(output_total, Some(total) if total <= input_total)
}

/// Splits pending transactions into those that can go into the next block
/// and those that cannot.
///
/// A transaction is accepted when it validates against `blocks` and none of
/// its inputs is spent on chain or by a transaction accepted before it.
/// Order is preserved.
pub fn select_confirmable(txs: Vec<Tx>, blocks: &[Block]) -> (Vec<Tx>, Vec<Tx>) {
    let mut spent: HashSet<(String, usize)> = blocks
        .iter()
        .flat_map(|block| block.transactions.iter())
        .flat_map(|tx| tx.tx_ins.iter())
        .filter(|input| !input.is_coinbase())
        .map(|input| (input.tx_id.clone(), input.index))
        .collect();

    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for tx in txs {
        let unspent = tx
            .tx_ins
            .iter()
            .all(|input| !spent.contains(&(input.tx_id.clone(), input.index)));

        if unspent && validate(&tx, blocks) {
            spent.extend(tx.tx_ins.iter().map(|input| (input.tx_id.clone(), input.index)));
            accepted.push(tx);
        } else {
            rejected.push(tx);
        }
    }
    (accepted, rejected)
}

/// Collects the outputs owned by `address` that no confirmed input spends and
/// no pending input in `mempool` is about to spend.
///
/// `blocks` is expected newest first; the result keeps that order.
pub fn utxos_by_address(address: &Address, blocks: &[Block], mempool: &[Tx]) -> Vec<UTxOut> {
    let confirmed: Vec<&Tx> = blocks
        .iter()
        .flat_map(|block| block.transactions.iter())
        .collect();

    let spent: HashSet<(&str, usize)> = confirmed
        .iter()
        .flat_map(|tx| tx.tx_ins.iter())
        .chain(mempool.iter().flat_map(|tx| tx.tx_ins.iter()))
        .filter(|input| !input.is_coinbase())
        .map(|input| (input.tx_id.as_str(), input.index))
        .collect();

    let mut utxos = Vec::new();
    for tx in confirmed {
        for (index, output) in tx.tx_outs.iter().enumerate() {
            if output.address == *address && !spent.contains(&(tx.id.as_str(), index)) {
                utxos.push(UTxOut {
                    tx_id: tx.id.clone(),
                    index,
                    amount: output.amount,
                });
            }
        }
    }
    utxos
}

/// Sum of the amounts returned by [`utxos_by_address`]
pub fn balance_by_address(address: &Address, blocks: &[Block], mempool: &[Tx]) -> u64 {
    utxos_by_address(address, blocks, mempool)
        .iter()
        .map(|utxo| utxo.amount)
        .sum()
}

/// Builds and signs a transfer of `amount` from the wallet's address to `to`.
///
/// Unspent outputs are consumed greedily until they cover `amount`; any
/// surplus is returned to the sender as a change output placed before the
/// destination output.
pub fn make_tx(
    wallet: &Wallet,
    to: &Address,
    amount: u64,
    blocks: &[Block],
    mempool: &[Tx],
) -> Result<Tx, TransactionError> {
    let from = wallet.address();
    if balance_by_address(from, blocks, mempool) < amount {
        return Err(TransactionError::NotEnoughBalance);
    }

    let mut tx_ins = Vec::new();
    let mut total = 0;
    for utxo in utxos_by_address(from, blocks, mempool) {
        if total >= amount {
            break;
        }
        tx_ins.push(TxIn {
            tx_id: utxo.tx_id,
            index: utxo.index,
            signature: String::new(),
        });
        total += utxo.amount;
    }

    let mut tx_outs = Vec::new();
    if total > amount {
        tx_outs.push(TxOut {
            address: from.clone(),
            amount: total - amount,
        });
    }
    tx_outs.push(TxOut {
        address: to.clone(),
        amount,
    });

    let mut tx = Tx {
        id: String::new(),
        timestamp: Utc::now().timestamp(),
        tx_ins,
        tx_outs,
    };
    tx.id = tx.calculate_id();
    tx.sign(wallet)?;

    if !validate(&tx, blocks) {
        return Err(TransactionError::NotValid);
    }
    Ok(tx)
}
