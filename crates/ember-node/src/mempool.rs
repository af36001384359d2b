//! The pool of unconfirmed transactions a node has heard about but not yet
//! mined. Plain and non-persistent — it is lost on restart, and there is no
//! fee market to rank entries by.

use std::collections::HashMap;

use ember_core::types::Transaction;

/// Transactions awaiting inclusion in a block, keyed by id.
#[derive(Default)]
pub struct Mempool {
    entries: HashMap<[u8; 32], Transaction>,
}

impl Mempool {
    pub fn new() -> Mempool {
        Mempool::default()
    }

    /// Insert `tx`, keyed by its own `id`. Returns `false` if it was already
    /// present (the caller treats this as a duplicate, not an error).
    pub fn insert(&mut self, tx: Transaction) -> bool {
        self.entries.insert(tx.id, tx).is_none()
    }

    pub fn contains(&self, id: &[u8; 32]) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &[u8; 32]) -> Option<&Transaction> {
        self.entries.get(id)
    }

    pub fn remove(&mut self, id: &[u8; 32]) -> Option<Transaction> {
        self.entries.remove(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A snapshot of every pooled transaction, for a mining pass to verify
    /// against the current chain without holding the pool lock.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.entries.values().cloned().collect()
    }
}
