//! Error types for the Ember protocol.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },
    #[error("unknown referenced transaction: {0}")]
    UnknownReferencedTx(String),
    #[error("serialization: {0}")]
    Serialization(String),
    #[error("empty inputs or outputs")]
    EmptyInputsOrOutputs,
    #[error("value overflow")]
    ValueOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("invalid proof of work")]
    InvalidPoW,
    #[error("invalid merkle root")]
    InvalidMerkleRoot,
    #[error("no transactions")]
    NoTransactions,
    #[error("first transaction is not coinbase")]
    FirstTxNotCoinbase,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")]
    InvalidPublicKey,
    #[error("invalid signature bytes")]
    InvalidSignature,
    #[error("signature verification failed")]
    VerificationFailed,
    #[error("input index out of bounds: {index} >= {len}")]
    InputIndexOutOfBounds { index: usize, len: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid base58 data")]
    InvalidBase58,
    #[error("invalid length")]
    InvalidLength,
    #[error("invalid checksum")]
    InvalidChecksum,
    #[error("invalid version byte: {0}")]
    InvalidVersion(u8),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },
    #[error("connection closed before a full frame was read")]
    Truncated,
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),
    #[error("malformed payload: {0}")]
    ProtocolDecode(String),
    #[error("i/o error: {0}")]
    Io(String),
}

/// Top-level error aggregating every concern-specific error enum.
#[derive(Error, Debug)]
pub enum EmberError {
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error(transparent)]
    Block(#[from] BlockError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("storage: {0}")]
    Storage(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
}
