//! UTXO index: for every unspent-output-bearing transaction, a
//! `"utxo-{txid}"` key holding the bincode-encoded list of its still-unspent
//! outputs.

use std::collections::HashMap;
use std::sync::Arc;

use ember_core::error::EmberError;
use ember_core::types::TxOutput;
use rocksdb::{WriteBatch, DB};

use crate::chain::ChainStore;

const UTXO_PREFIX: &[u8] = b"utxo-";

/// Keys are deleted/rewritten in batches this large so a reindex of a large
/// ledger doesn't hold one unbounded write batch in memory.
const DELETE_BATCH_SIZE: usize = 100_000;

fn utxo_key(tx_id: &[u8; 32]) -> Vec<u8> {
    let mut key = UTXO_PREFIX.to_vec();
    key.extend_from_slice(tx_id);
    key
}

/// RocksDB-backed UTXO index, sharing the ledger's column family.
pub struct UtxoIndex {
    db: Arc<DB>,
}

impl UtxoIndex {
    /// Wrap the database handle shared with [`ChainStore`].
    pub fn with_db(db: Arc<DB>) -> UtxoIndex {
        UtxoIndex { db }
    }

    fn get_outputs(&self, tx_id: &[u8; 32]) -> Result<Vec<TxOutput>, EmberError> {
        match self
            .db
            .get(utxo_key(tx_id))
            .map_err(|e| EmberError::Storage(e.to_string()))?
        {
            Some(bytes) => {
                let (outputs, _): (Vec<TxOutput>, usize) =
                    bincode::decode_from_slice(&bytes, bincode::config::standard())
                        .map_err(|e| EmberError::Storage(e.to_string()))?;
                Ok(outputs)
            }
            None => Ok(Vec::new()),
        }
    }

    fn put_outputs(
        batch: &mut WriteBatch,
        tx_id: &[u8; 32],
        outputs: &[TxOutput],
    ) -> Result<(), EmberError> {
        if outputs.is_empty() {
            batch.delete(utxo_key(tx_id));
        } else {
            let bytes = bincode::encode_to_vec(outputs, bincode::config::standard())
                .map_err(|e| EmberError::Storage(e.to_string()))?;
            batch.put(utxo_key(tx_id), bytes);
        }
        Ok(())
    }

    /// The currently-unspent output at `out_index` of transaction `tx_id`,
    /// if any — what a spending input's signature is checked against.
    /// `out_index < 0` (the coinbase marker) never resolves to an output.
    pub fn referenced_output(
        &self,
        tx_id: &[u8; 32],
        out_index: i64,
    ) -> Result<Option<TxOutput>, EmberError> {
        if out_index < 0 {
            return Ok(None);
        }
        Ok(self.get_outputs(tx_id)?.into_iter().nth(out_index as usize))
    }

    /// All unspent outputs locked to `pub_key_hash`.
    pub fn find_utxo(&self, pub_key_hash: &[u8; 20]) -> Result<Vec<TxOutput>, EmberError> {
        let mut found = Vec::new();
        let iter = self.db.prefix_iterator(UTXO_PREFIX);
        for item in iter {
            let (key, value) = item.map_err(|e| EmberError::Storage(e.to_string()))?;
            if !key.starts_with(UTXO_PREFIX) {
                break;
            }
            let (outputs, _): (Vec<TxOutput>, usize) =
                bincode::decode_from_slice(&value, bincode::config::standard())
                    .map_err(|e| EmberError::Storage(e.to_string()))?;
            found.extend(outputs.into_iter().filter(|o| o.is_locked_with(pub_key_hash)));
        }
        Ok(found)
    }

    /// Accumulate unspent outputs locked to `pub_key_hash` until their sum
    /// reaches `amount` (or the index is exhausted). Returns the amount
    /// accumulated and, per source transaction, the indices selected.
    pub fn find_spendable(
        &self,
        pub_key_hash: &[u8; 20],
        amount: u64,
    ) -> Result<(u64, HashMap<[u8; 32], Vec<usize>>), EmberError> {
        let mut accumulated = 0u64;
        let mut selected: HashMap<[u8; 32], Vec<usize>> = HashMap::new();

        let iter = self.db.prefix_iterator(UTXO_PREFIX);
        'outer: for item in iter {
            let (key, value) = item.map_err(|e| EmberError::Storage(e.to_string()))?;
            if !key.starts_with(UTXO_PREFIX) {
                break;
            }
            let mut tx_id = [0u8; 32];
            tx_id.copy_from_slice(&key[UTXO_PREFIX.len()..]);

            let (outputs, _): (Vec<TxOutput>, usize) =
                bincode::decode_from_slice(&value, bincode::config::standard())
                    .map_err(|e| EmberError::Storage(e.to_string()))?;

            for (index, output) in outputs.iter().enumerate() {
                if !output.is_locked_with(pub_key_hash) {
                    continue;
                }
                accumulated = accumulated.saturating_add(output.value);
                selected.entry(tx_id).or_default().push(index);
                if accumulated >= amount {
                    break 'outer;
                }
            }
        }

        Ok((accumulated, selected))
    }

    /// Number of transactions carrying at least one unspent output.
    pub fn count_utxo_transactions(&self) -> Result<u64, EmberError> {
        let mut count = 0u64;
        let iter = self.db.prefix_iterator(UTXO_PREFIX);
        for item in iter {
            let (key, _) = item.map_err(|e| EmberError::Storage(e.to_string()))?;
            if !key.starts_with(UTXO_PREFIX) {
                break;
            }
            count += 1;
        }
        Ok(count)
    }

    /// Delete every `"utxo-"` key, in batches of [`DELETE_BATCH_SIZE`].
    fn delete_all(&self) -> Result<(), EmberError> {
        loop {
            let mut batch = WriteBatch::default();
            let mut n = 0;
            let iter = self.db.prefix_iterator(UTXO_PREFIX);
            for item in iter {
                let (key, _) = item.map_err(|e| EmberError::Storage(e.to_string()))?;
                if !key.starts_with(UTXO_PREFIX) {
                    break;
                }
                batch.delete(key);
                n += 1;
                if n >= DELETE_BATCH_SIZE {
                    break;
                }
            }
            if n == 0 {
                return Ok(());
            }
            self.db
                .write(batch)
                .map_err(|e| EmberError::Storage(e.to_string()))?;
        }
    }

    /// Rebuild the entire index from scratch by walking every block in
    /// `chain`, tracking which outputs are later spent.
    pub fn reindex(&self, chain: &ChainStore) -> Result<(), EmberError> {
        self.delete_all()?;

        let mut spent: HashMap<[u8; 32], Vec<i64>> = HashMap::new();
        let mut unspent: HashMap<[u8; 32], Vec<TxOutput>> = HashMap::new();

        for block in chain.iterator() {
            let block = block?;
            for tx in block.transactions.iter().rev() {
                if !tx.is_coinbase() {
                    for input in &tx.inputs {
                        spent.entry(input.prev_tx_id).or_default().push(input.out_index);
                    }
                }

                let spent_indices = spent.get(&tx.id);
                let remaining: Vec<TxOutput> = tx
                    .outputs
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| {
                        spent_indices
                            .map(|v| !v.contains(&(*idx as i64)))
                            .unwrap_or(true)
                    })
                    .map(|(_, out)| out.clone())
                    .collect();

                if !remaining.is_empty() {
                    unspent.insert(tx.id, remaining);
                }
            }
        }

        let mut batch = WriteBatch::default();
        for (tx_id, outputs) in &unspent {
            Self::put_outputs(&mut batch, tx_id, outputs)?;
        }
        self.db
            .write(batch)
            .map_err(|e| EmberError::Storage(e.to_string()))
    }

    /// Incrementally apply a newly-connected block: remove the outputs its
    /// inputs spend, then record its own outputs as unspent.
    ///
    /// Spent indices are grouped across *every* transaction in the block
    /// before any removal is computed, not per-transaction — two
    /// transactions in the same block spending different outputs of the
    /// same earlier transaction must both be reflected in what gets
    /// written, or the second write clobbers the first's. `pending` also
    /// seeds each transaction's own outputs up front, so an input spending
    /// an output created earlier in this very block sees it, the way the
    /// original's single Badger transaction lets a later `txn.Get` observe
    /// an earlier `txn.Set` in the same closure.
    pub fn update_for_block(&self, block: &ember_core::types::Block) -> Result<(), EmberError> {
        let mut pending: HashMap<[u8; 32], Vec<TxOutput>> = HashMap::new();
        for tx in &block.transactions {
            pending.insert(tx.id, tx.outputs.clone());
        }

        let mut by_prev: HashMap<[u8; 32], Vec<i64>> = HashMap::new();
        for tx in &block.transactions {
            if tx.is_coinbase() {
                continue;
            }
            for input in &tx.inputs {
                by_prev.entry(input.prev_tx_id).or_default().push(input.out_index);
            }
        }

        for (prev_tx_id, spent_indices) in &by_prev {
            let current = match pending.get(prev_tx_id) {
                Some(outputs) => outputs.clone(),
                None => self.get_outputs(prev_tx_id)?,
            };
            let remaining: Vec<TxOutput> = current
                .into_iter()
                .enumerate()
                .filter(|(idx, _)| !spent_indices.contains(&(*idx as i64)))
                .map(|(_, out)| out)
                .collect();
            pending.insert(*prev_tx_id, remaining);
        }

        let mut batch = WriteBatch::default();
        for (tx_id, outputs) in &pending {
            Self::put_outputs(&mut batch, tx_id, outputs)?;
        }

        self.db
            .write(batch)
            .map_err(|e| EmberError::Storage(e.to_string()))
    }
}
