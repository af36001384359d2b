//! RocksDB-backed ledger store and UTXO index.

pub mod chain;
pub mod utxo;

use std::path::Path;

use chain::ChainStore;
use ember_core::error::EmberError;
use utxo::UtxoIndex;

/// The ledger store and its UTXO index, sharing one RocksDB handle.
pub struct Ledger {
    pub chain: ChainStore,
    pub utxo: UtxoIndex,
}

impl Ledger {
    /// Mine the genesis block paying `genesis_pub_key_hash`, persist it,
    /// and build the UTXO index from it. Fails if a ledger already exists
    /// at `path`.
    pub fn init(
        path: impl AsRef<Path>,
        genesis_pub_key_hash: [u8; 20],
        timestamp: u64,
    ) -> Result<Ledger, EmberError> {
        let db = chain::open_db(path)?;
        let chain = ChainStore::init(db.clone(), genesis_pub_key_hash, timestamp)?;
        let utxo = UtxoIndex::with_db(db);
        utxo.reindex(&chain)?;
        Ok(Ledger { chain, utxo })
    }

    /// Open an existing ledger at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Ledger, EmberError> {
        let db = chain::open_db(path)?;
        let chain = ChainStore::open(db.clone())?;
        let utxo = UtxoIndex::with_db(db);
        Ok(Ledger { chain, utxo })
    }

    /// Mine a block carrying `transactions`, persist it as the new tip, and
    /// apply it to the UTXO index.
    pub fn mine_block(
        &self,
        transactions: Vec<ember_core::types::Transaction>,
        timestamp: u64,
    ) -> Result<ember_core::types::Block, EmberError> {
        let block = self.chain.mine_block(transactions, timestamp)?;
        self.utxo.update_for_block(&block)?;
        Ok(block)
    }

    /// Insert a block received from a peer, applying it to the UTXO index
    /// only if it actually became the new tip.
    pub fn add_block(&self, block: ember_core::types::Block) -> Result<(), EmberError> {
        let tip_before = self.chain.tip()?;
        self.chain.add_block(block.clone())?;
        if self.chain.tip()? != tip_before {
            self.utxo.update_for_block(&block)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::types::Transaction;

    #[test]
    fn init_builds_genesis_and_utxo() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::init(dir.path().join("chain"), [0x01; 20], 1_700_000_000).unwrap();
        assert_eq!(ledger.chain.best_height().unwrap(), 0);
        assert_eq!(ledger.utxo.find_utxo(&[0x01; 20]).unwrap().len(), 1);
    }

    #[test]
    fn mine_block_updates_utxo() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::init(dir.path().join("chain"), [0x01; 20], 1_700_000_000).unwrap();
        let coinbase = Transaction::coinbase([0x02; 20], vec![9]).unwrap();
        ledger.mine_block(vec![coinbase], 1_700_000_060).unwrap();
        assert_eq!(ledger.utxo.find_utxo(&[0x02; 20]).unwrap().len(), 1);
    }

    #[test]
    fn reopen_existing_ledger() {
        let dir = tempfile::tempdir().unwrap();
        {
            let ledger = Ledger::init(dir.path().join("chain"), [0x01; 20], 1).unwrap();
            drop(ledger);
        }
        let ledger = Ledger::open(dir.path().join("chain")).unwrap();
        assert_eq!(ledger.chain.best_height().unwrap(), 0);
    }
}
