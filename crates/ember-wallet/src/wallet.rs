//! A wallet file is a flat `{address -> {priv_key, pub_key}}` map, bincode-
//! encoded and rewritten atomically (write to a temp file, then rename)
//! on every change so a crash mid-write never leaves a truncated file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use ember_core::address;
use ember_core::crypto::KeyPair;
use ember_core::error::EmberError;

fn bincode_config() -> bincode::config::Configuration {
    bincode::config::standard()
}

/// One wallet entry: the private scalar and its matching public key, both
/// fixed-width encodings (see [`ember_core::crypto`]).
#[derive(Clone, bincode::Encode, bincode::Decode)]
struct WalletRecord {
    priv_key: [u8; 32],
    pub_key: [u8; 64],
}

impl WalletRecord {
    fn key_pair(&self) -> Result<KeyPair, EmberError> {
        Ok(KeyPair::from_bytes(&self.priv_key)?)
    }
}

/// The wallet file backing one node: every address it holds keys for.
pub struct WalletStore {
    path: PathBuf,
    records: HashMap<String, WalletRecord>,
}

impl WalletStore {
    /// Load the wallet file at `path`, or start an empty one if it doesn't
    /// exist yet — the file is only created on the first [`save`](Self::save).
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<WalletStore, EmberError> {
        let path = path.as_ref().to_path_buf();
        let records = match fs::read(&path) {
            Ok(bytes) => {
                let (records, _): (HashMap<String, WalletRecord>, usize) =
                    bincode::decode_from_slice(&bytes, bincode_config())
                        .map_err(|e| EmberError::Storage(e.to_string()))?;
                records
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(EmberError::Storage(e.to_string())),
        };
        Ok(WalletStore { path, records })
    }

    /// Generate a fresh key pair, add it under its Base58Check address, and
    /// persist the wallet file. Returns the new address.
    pub fn create_wallet(&mut self) -> Result<String, EmberError> {
        let key_pair = KeyPair::generate();
        let public_key = key_pair.public_key();
        let pub_key_hash = public_key.hash160();
        let addr = address::encode(&pub_key_hash);

        self.records.insert(
            addr.clone(),
            WalletRecord {
                priv_key: key_pair.to_bytes(),
                pub_key: public_key.to_bytes(),
            },
        );
        self.save()?;
        Ok(addr)
    }

    /// Every address currently held.
    pub fn addresses(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    /// The key pair for `address`, for signing a transaction it funds.
    pub fn key_pair(&self, address: &str) -> Result<KeyPair, EmberError> {
        self.records
            .get(address)
            .ok_or_else(|| EmberError::NotFound(format!("no key for address {address}")))?
            .key_pair()
    }

    /// Rewrite the wallet file atomically: encode to a sibling temp file,
    /// then rename it over the real path.
    fn save(&self) -> Result<(), EmberError> {
        let bytes = bincode::encode_to_vec(&self.records, bincode_config())
            .map_err(|e| EmberError::Storage(e.to_string()))?;

        let tmp_path = self.path.with_extension("data.tmp");
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| EmberError::Storage(e.to_string()))?;
        }
        fs::write(&tmp_path, &bytes).map_err(|e| EmberError::Storage(e.to_string()))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| EmberError::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_wallet_produces_valid_address() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = WalletStore::open_or_create(dir.path().join("wallets.data")).unwrap();
        let addr = store.create_wallet().unwrap();
        assert!(address::is_valid(&addr));
    }

    #[test]
    fn addresses_lists_every_created_wallet() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = WalletStore::open_or_create(dir.path().join("wallets.data")).unwrap();
        let a = store.create_wallet().unwrap();
        let b = store.create_wallet().unwrap();
        let mut addrs = store.addresses();
        addrs.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(addrs, expected);
    }

    #[test]
    fn reopen_recovers_persisted_wallets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.data");
        let addr = {
            let mut store = WalletStore::open_or_create(&path).unwrap();
            store.create_wallet().unwrap()
        };

        let reopened = WalletStore::open_or_create(&path).unwrap();
        assert_eq!(reopened.addresses(), vec![addr]);
    }

    #[test]
    fn key_pair_round_trips_public_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = WalletStore::open_or_create(dir.path().join("wallets.data")).unwrap();
        let addr = store.create_wallet().unwrap();

        let key_pair = store.key_pair(&addr).unwrap();
        let pkh = key_pair.public_key().hash160();
        assert_eq!(address::encode(&pkh), addr);
    }

    #[test]
    fn unknown_address_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = WalletStore::open_or_create(dir.path().join("wallets.data")).unwrap();
        let err = store.key_pair("nonexistent").unwrap_err();
        assert!(matches!(err, EmberError::NotFound(_)));
    }

    #[test]
    fn opening_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = WalletStore::open_or_create(dir.path().join("missing.data")).unwrap();
        assert!(store.addresses().is_empty());
    }
}
