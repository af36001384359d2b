//! Append-only ledger store: `hash -> block`, plus a well-known `"lh"` key
//! holding the current tip's hash.

use std::path::Path;
use std::sync::Arc;

use ember_consensus::block;
use ember_core::error::EmberError;
use ember_core::types::{Block, Transaction};
use rocksdb::{WriteBatch, DB};

/// Key holding the tip's 32-byte block hash.
const TIP_KEY: &[u8] = b"lh";

/// RocksDB-backed append-only block store.
///
/// A single default column family holds both block records (keyed by hash)
/// and the `"lh"` tip pointer — there is no reorg bookkeeping, so one flat
/// keyspace is enough.
pub struct ChainStore {
    db: Arc<DB>,
}

/// Open the single RocksDB database shared by [`ChainStore`] and
/// [`crate::utxo::UtxoIndex`]. Opening it once and handing out clones of the
/// resulting `Arc` is required — RocksDB holds an exclusive process lock on
/// its directory, so each store cannot open its own handle.
pub fn open_db(path: impl AsRef<Path>) -> Result<Arc<DB>, EmberError> {
    let mut opts = rocksdb::Options::default();
    opts.create_if_missing(true);
    let db = DB::open(&opts, path).map_err(|e| EmberError::Storage(e.to_string()))?;
    Ok(Arc::new(db))
}

impl ChainStore {
    /// Wrap an already-open database handle.
    pub fn with_db(db: Arc<DB>) -> ChainStore {
        ChainStore { db }
    }

    /// Mine the genesis block paying `genesis_pub_key_hash` and initialize
    /// the store. Fails with [`EmberError::AlreadyExists`] if a tip already
    /// exists.
    pub fn init(
        db: Arc<DB>,
        genesis_pub_key_hash: [u8; 20],
        timestamp: u64,
    ) -> Result<ChainStore, EmberError> {
        if db
            .get(TIP_KEY)
            .map_err(|e| EmberError::Storage(e.to_string()))?
            .is_some()
        {
            return Err(EmberError::AlreadyExists("ledger already initialized".to_string()));
        }

        let coinbase = Transaction::coinbase(genesis_pub_key_hash, Vec::new())?;
        let genesis = block::mine_genesis(coinbase, timestamp)?;

        let genesis_bytes = genesis.encode()?;
        let mut batch = WriteBatch::default();
        batch.put(genesis.hash, &genesis_bytes);
        batch.put(TIP_KEY, genesis.hash);
        db.write(batch).map_err(|e| EmberError::Storage(e.to_string()))?;

        Ok(ChainStore { db })
    }

    /// Open an already-initialized store. Fails with [`EmberError::NotFound`]
    /// if no tip exists.
    pub fn open(db: Arc<DB>) -> Result<ChainStore, EmberError> {
        if db
            .get(TIP_KEY)
            .map_err(|e| EmberError::Storage(e.to_string()))?
            .is_none()
        {
            return Err(EmberError::NotFound("no ledger to open".to_string()));
        }
        Ok(ChainStore { db })
    }

    fn tip_hash(&self) -> Result<[u8; 32], EmberError> {
        let bytes = self
            .db
            .get(TIP_KEY)
            .map_err(|e| EmberError::Storage(e.to_string()))?
            .ok_or_else(|| EmberError::NotFound("no tip".to_string()))?;
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes);
        Ok(hash)
    }

    /// Mine a new block on top of the current tip, carrying `transactions`
    /// (coinbase first), and atomically persist it as the new tip.
    pub fn mine_block(
        &self,
        transactions: Vec<Transaction>,
        timestamp: u64,
    ) -> Result<Block, EmberError> {
        let tip_hash = self.tip_hash()?;
        let tip = self.get_block(&tip_hash)?;

        let new_block = block::mine_block(transactions, tip_hash, tip.height + 1, timestamp)?;
        self.persist_as_tip(&new_block)?;
        Ok(new_block)
    }

    fn persist_as_tip(&self, new_block: &Block) -> Result<(), EmberError> {
        let bytes = new_block.encode()?;
        let mut batch = WriteBatch::default();
        batch.put(new_block.hash, &bytes);
        batch.put(TIP_KEY, new_block.hash);
        self.db
            .write(batch)
            .map_err(|e| EmberError::Storage(e.to_string()))
    }

    /// Insert `block` if not already present; advance the tip only if
    /// `block.height` exceeds the current tip's height (ties keep the
    /// currently stored tip).
    pub fn add_block(&self, block: Block) -> Result<(), EmberError> {
        if self
            .db
            .get(block.hash)
            .map_err(|e| EmberError::Storage(e.to_string()))?
            .is_some()
        {
            return Ok(());
        }

        let bytes = block.encode()?;
        let mut batch = WriteBatch::default();
        batch.put(block.hash, &bytes);

        let advance = match self.db.get(TIP_KEY).map_err(|e| EmberError::Storage(e.to_string()))? {
            None => true,
            Some(current_tip_hash) => {
                let current_tip = self.get_block_bytes(&current_tip_hash)?;
                block.height > current_tip.height
            }
        };
        if advance {
            batch.put(TIP_KEY, block.hash);
        }

        self.db
            .write(batch)
            .map_err(|e| EmberError::Storage(e.to_string()))
    }

    fn get_block_bytes(&self, hash: &[u8]) -> Result<Block, EmberError> {
        let bytes = self
            .db
            .get(hash)
            .map_err(|e| EmberError::Storage(e.to_string()))?
            .ok_or_else(|| EmberError::NotFound(format!("block {}", hex::encode(hash))))?;
        Ok(Block::decode(&bytes)?)
    }

    /// Look up a block by its 32-byte hash.
    pub fn get_block(&self, hash: &[u8; 32]) -> Result<Block, EmberError> {
        self.get_block_bytes(hash)
    }

    /// Current tip's height.
    pub fn best_height(&self) -> Result<u64, EmberError> {
        Ok(self.get_block(&self.tip_hash()?)?.height)
    }

    /// The current tip's 32-byte hash.
    pub fn tip(&self) -> Result<[u8; 32], EmberError> {
        self.tip_hash()
    }

    /// Every block hash on the path from tip to genesis, tip first.
    pub fn get_block_hashes(&self) -> Result<Vec<[u8; 32]>, EmberError> {
        self.iterator().map(|r| r.map(|b| b.hash)).collect()
    }

    /// A finite iterator over blocks from tip to genesis, following
    /// `prev_hash`. Yields the genesis block last, then stops.
    pub fn iterator(&self) -> ChainIterator {
        ChainIterator {
            db: Arc::clone(&self.db),
            current_hash: self.tip_hash().ok(),
        }
    }
}

/// Iterates stored blocks from tip to genesis, following `prev_hash`.
pub struct ChainIterator {
    db: Arc<DB>,
    current_hash: Option<[u8; 32]>,
}

impl Iterator for ChainIterator {
    type Item = Result<Block, EmberError>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.current_hash.take()?;
        let bytes = match self
            .db
            .get(hash)
            .map_err(|e| EmberError::Storage(e.to_string()))
        {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Some(Err(EmberError::NotFound(format!("block {}", hex::encode(hash))))),
            Err(e) => return Some(Err(e)),
        };
        let block = match Block::decode(&bytes) {
            Ok(b) => b,
            Err(e) => return Some(Err(EmberError::from(e))),
        };
        if !block.is_genesis() {
            self.current_hash = Some(block.prev_hash);
        }
        Some(Ok(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (ChainStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(dir.path().join("chain")).unwrap();
        let store = ChainStore::init(db, [0x01; 20], 1_700_000_000).unwrap();
        (store, dir)
    }

    #[test]
    fn init_creates_genesis_tip() {
        let (store, _dir) = temp_store();
        let tip = store.tip().unwrap();
        let genesis = store.get_block(&tip).unwrap();
        assert!(genesis.is_genesis());
        assert_eq!(genesis.height, 0);
    }

    #[test]
    fn init_twice_on_same_handle_fails() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(dir.path().join("chain")).unwrap();
        ChainStore::init(Arc::clone(&db), [0x01; 20], 1).unwrap();
        let err = ChainStore::init(db, [0x01; 20], 1).unwrap_err();
        assert!(matches!(err, EmberError::AlreadyExists(_)));
    }

    #[test]
    fn open_without_init_fails() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(dir.path().join("chain")).unwrap();
        let err = ChainStore::open(db).unwrap_err();
        assert!(matches!(err, EmberError::NotFound(_)));
    }

    #[test]
    fn open_after_init_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(dir.path().join("chain")).unwrap();
        ChainStore::init(Arc::clone(&db), [0x01; 20], 1).unwrap();
        ChainStore::open(db).unwrap();
    }

    #[test]
    fn mine_block_advances_tip_and_height() {
        let (store, _dir) = temp_store();
        let coinbase = Transaction::coinbase([0x02; 20], vec![9]).unwrap();
        let block = store.mine_block(vec![coinbase], 1_700_000_060).unwrap();
        assert_eq!(block.height, 1);
        assert_eq!(store.best_height().unwrap(), 1);
        assert_eq!(store.tip().unwrap(), block.hash);
    }

    #[test]
    fn add_block_is_idempotent() {
        let (store, _dir) = temp_store();
        let coinbase = Transaction::coinbase([0x02; 20], vec![9]).unwrap();
        let block = store.mine_block(vec![coinbase], 1_700_000_060).unwrap();
        let tip_before = store.tip().unwrap();
        store.add_block(block.clone()).unwrap();
        store.add_block(block).unwrap();
        assert_eq!(store.tip().unwrap(), tip_before);
    }

    #[test]
    fn add_block_lower_height_keeps_current_tip() {
        let (store, _dir) = temp_store();
        let coinbase1 = Transaction::coinbase([0x02; 20], vec![1]).unwrap();
        let block1 = store.mine_block(vec![coinbase1], 1_700_000_060).unwrap();

        let genesis_hash = store.get_block(&block1.prev_hash).unwrap().hash;
        let stray_coinbase = Transaction::coinbase([0x03; 20], vec![2]).unwrap();
        let stray = ember_consensus::block::mine_block(vec![stray_coinbase], genesis_hash, 1, 0).unwrap();

        store.add_block(stray).unwrap();
        assert_eq!(store.tip().unwrap(), block1.hash);
    }

    #[test]
    fn iterator_reaches_genesis() {
        let (store, _dir) = temp_store();
        let coinbase = Transaction::coinbase([0x02; 20], vec![9]).unwrap();
        store.mine_block(vec![coinbase], 1_700_000_060).unwrap();

        let blocks: Vec<Block> = store.iterator().collect::<Result<_, _>>().unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].height, 1);
        assert!(blocks[1].is_genesis());
    }

    #[test]
    fn get_block_hashes_tip_first() {
        let (store, _dir) = temp_store();
        let coinbase = Transaction::coinbase([0x02; 20], vec![9]).unwrap();
        let block = store.mine_block(vec![coinbase], 1_700_000_060).unwrap();

        let hashes = store.get_block_hashes().unwrap();
        assert_eq!(hashes[0], block.hash);
    }
}
