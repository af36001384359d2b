//! Hash and big-endian encoding primitives.
//!
//! SHA-256 and double-SHA-256 are used for block hashing and address
//! checksums; RIPEMD-160 (over a SHA-256 digest) produces the public-key
//! hash an output is locked to.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA-256(SHA-256(data)), used for address checksums.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// RIPEMD-160(SHA-256(data)) — the public-key hash locking a [`TxOutput`](crate::types::TxOutput).
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let first = sha256(data);
    Ripemd160::digest(first).into()
}

/// Big-endian encoding of a `u64`, used wherever a hash preimage embeds an
/// integer (nonce, difficulty) so hashes are stable regardless of host
/// endianness.
pub fn be64(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}
