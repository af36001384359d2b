//! Flat-file keypair storage for Ember wallet addresses.

mod wallet;

pub use wallet::WalletStore;
