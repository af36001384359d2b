//! Fixed-difficulty proof-of-work: header hashing, mining, and validation.
//!
//! The difficulty never adjusts — it is the single compile-time constant
//! [`ember_core::constants::DIFFICULTY`]. A hash qualifies when it is
//! numerically less than `2^(256 - DIFFICULTY)`, i.e. when its top
//! `DIFFICULTY` bits are all zero.

use ember_core::hash::{be64, sha256};

/// Nonces are searched sequentially starting at zero, up to (but excluding)
/// this bound, before mining gives up.
pub const NONCE_SEARCH_LIMIT: u64 = 1 << 63;

/// The proof-of-work target for `difficulty` leading zero bits, as a
/// 256-bit big-endian byte array: the single value `2^(256 - difficulty)`.
///
/// Because both the target and a header hash are big-endian fixed-width
/// byte arrays, comparing them byte-by-byte (`[u8; 32]`'s derived
/// `PartialOrd`) is the same as comparing them as 256-bit unsigned
/// integers — no bignum crate needed.
pub fn target_bytes(difficulty: u32) -> [u8; 32] {
    assert!(
        (1..256).contains(&difficulty),
        "difficulty must leave at least one representable bit"
    );
    let bit_position = 256 - difficulty;
    let byte_index = 31 - (bit_position / 8) as usize;
    let bit_offset = bit_position % 8;
    let mut target = [0u8; 32];
    target[byte_index] = 1 << bit_offset;
    target
}

/// Whether `hash` satisfies the proof-of-work target for `difficulty`.
pub fn meets_difficulty(hash: &[u8; 32], difficulty: u32) -> bool {
    *hash < target_bytes(difficulty)
}

/// Hash a block header's proof-of-work input:
/// `merkle_root || prev_hash || BE64(nonce) || BE64(difficulty)`, single SHA-256.
pub fn header_hash(
    merkle_root: &[u8; 32],
    prev_hash: &[u8; 32],
    nonce: u64,
    difficulty: u32,
) -> [u8; 32] {
    let mut preimage = Vec::with_capacity(32 + 32 + 8 + 8);
    preimage.extend_from_slice(merkle_root);
    preimage.extend_from_slice(prev_hash);
    preimage.extend_from_slice(&be64(nonce));
    preimage.extend_from_slice(&be64(difficulty as u64));
    sha256(&preimage)
}

/// Search nonces `[0, NONCE_SEARCH_LIMIT)` for one whose header hash meets
/// `difficulty`. Returns `(nonce, hash)` on success.
pub fn mine(merkle_root: &[u8; 32], prev_hash: &[u8; 32], difficulty: u32) -> Option<(u64, [u8; 32])> {
    for nonce in 0..NONCE_SEARCH_LIMIT {
        let hash = header_hash(merkle_root, prev_hash, nonce, difficulty);
        if meets_difficulty(&hash, difficulty) {
            return Some((nonce, hash));
        }
    }
    None
}

/// Recompute and check a block's proof-of-work: the stored `hash` must
/// both equal the recomputed header hash and meet `difficulty`.
pub fn validate(
    merkle_root: &[u8; 32],
    prev_hash: &[u8; 32],
    nonce: u64,
    difficulty: u32,
    claimed_hash: &[u8; 32],
) -> bool {
    let recomputed = header_hash(merkle_root, prev_hash, nonce, difficulty);
    &recomputed == claimed_hash && meets_difficulty(&recomputed, difficulty)
}
