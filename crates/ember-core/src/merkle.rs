//! Merkle root over a list of serialized transactions.
//!
//! Leaves hash as `SHA256(data)`; internal nodes hash as
//! `SHA256(left || right)`. Odd-length layers duplicate their last element.
//! Array-backed, level-by-level construction — no pointer graph, no
//! inclusion-proof bookkeeping (the spec has no use for proofs).

use crate::hash::sha256;

/// Compute the Merkle root of `leaves` (the serialized form of each
/// transaction). Returns the all-zero hash for an empty input.
pub fn merkle_root(leaves: &[Vec<u8>]) -> [u8; 32] {
    if leaves.is_empty() {
        return [0u8; 32];
    }

    let mut level: Vec<[u8; 32]> = leaves.iter().map(|data| sha256(data)).collect();

    while level.len() > 1 {
        level = next_level(&level);
    }

    level[0]
}

fn next_level(level: &[[u8; 32]]) -> Vec<[u8; 32]> {
    let mut next = Vec::with_capacity(level.len().div_ceil(2));
    let mut i = 0;
    while i < level.len() {
        let left = level[i];
        let right = if i + 1 < level.len() { level[i + 1] } else { left };
        let mut preimage = Vec::with_capacity(64);
        preimage.extend_from_slice(&left);
        preimage.extend_from_slice(&right);
        next.push(sha256(&preimage));
        i += 2;
    }
    next
}
