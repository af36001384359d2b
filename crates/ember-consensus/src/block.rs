//! Block assembly and validation: combines the merkle root of a
//! transaction set with proof-of-work to produce or check a [`Block`].

use ember_core::constants::DIFFICULTY;
use ember_core::error::{BlockError, TransactionError};
use ember_core::merkle::merkle_root;
use ember_core::types::{Block, Transaction};

use crate::pow;

/// Merkle root over a block's encoded transactions.
fn transactions_merkle_root(transactions: &[Transaction]) -> Result<[u8; 32], TransactionError> {
    let leaves: Vec<Vec<u8>> = transactions
        .iter()
        .map(Transaction::encode)
        .collect::<Result<_, _>>()?;
    Ok(merkle_root(&leaves))
}

/// Mine a new block at `height` on top of `prev_hash`, carrying
/// `transactions` (coinbase first).
///
/// Does not touch any store — the caller is responsible for persisting the
/// result and advancing the tip pointer.
pub fn mine_block(
    transactions: Vec<Transaction>,
    prev_hash: [u8; 32],
    height: u64,
    timestamp: u64,
) -> Result<Block, BlockError> {
    if transactions.is_empty() {
        return Err(BlockError::NoTransactions);
    }
    if !transactions[0].is_coinbase() {
        return Err(BlockError::FirstTxNotCoinbase);
    }

    let merkle = transactions_merkle_root(&transactions)
        .map_err(|_| BlockError::InvalidMerkleRoot)?;
    let (nonce, hash) =
        pow::mine(&merkle, &prev_hash, DIFFICULTY).ok_or(BlockError::InvalidPoW)?;

    Ok(Block {
        timestamp,
        hash,
        transactions,
        prev_hash,
        height,
        nonce,
    })
}

/// Validate a block's internal structure and proof-of-work.
///
/// Does not check chain linkage (that `prev_hash` actually points at a
/// known parent, or that `height` is one more than the parent's) — that is
/// the ledger store's responsibility, since it alone knows the chain.
pub fn validate_block(block: &Block) -> Result<(), BlockError> {
    if block.transactions.is_empty() {
        return Err(BlockError::NoTransactions);
    }
    if !block.transactions[0].is_coinbase() {
        return Err(BlockError::FirstTxNotCoinbase);
    }

    let merkle = transactions_merkle_root(&block.transactions)
        .map_err(|_| BlockError::InvalidMerkleRoot)?;

    if !pow::validate(&merkle, &block.prev_hash, block.nonce, DIFFICULTY, &block.hash) {
        return Err(BlockError::InvalidPoW);
    }

    Ok(())
}

/// Mine the genesis block: `prev_hash` empty, height 0, sole transaction a
/// coinbase paying `genesis_address`'s public-key hash.
pub fn mine_genesis(coinbase: Transaction, timestamp: u64) -> Result<Block, BlockError> {
    mine_block(vec![coinbase], [0u8; 32], 0, timestamp)
}
