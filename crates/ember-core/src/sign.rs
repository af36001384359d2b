//! Per-input trimmed-copy transaction signing and verification.
//!
//! A transaction is never signed or verified as a single whole: each
//! non-coinbase input gets its own 32-byte digest, computed over a copy of
//! the transaction with every input's `signature`/`pub_key` cleared except
//! the input being signed, whose `pub_key` is temporarily set to the
//! public-key hash of the output it spends.

use crate::crypto::{KeyPair, PublicKey};
use crate::error::{CryptoError, TransactionError};
use crate::types::{Transaction, TxOutput};

/// Build the per-input signing digest for input `index`, given the
/// `TxOutput`s referenced by every input (in input order).
fn input_digest(
    tx: &Transaction,
    index: usize,
    referenced_outputs: &[TxOutput],
) -> Result<[u8; 32], TransactionError> {
    if index >= tx.inputs.len() || index >= referenced_outputs.len() {
        return Err(TransactionError::Serialization(
            "input index out of bounds for referenced outputs".to_string(),
        ));
    }

    let mut trimmed = tx.clone();
    for input in trimmed.inputs.iter_mut() {
        input.signature = Vec::new();
        input.pub_key = Vec::new();
    }
    trimmed.inputs[index].pub_key = referenced_outputs[index].pub_key_hash.to_vec();

    trimmed.compute_id()
}

/// Sign every non-coinbase input of `tx` in place, given the referenced
/// output for each input (in input order) and the key pair owning them.
///
/// Coinbase transactions are rejected — they carry no real signatures.
pub fn sign_transaction(
    tx: &mut Transaction,
    referenced_outputs: &[TxOutput],
    key_pair: &KeyPair,
) -> Result<(), TransactionError> {
    if tx.is_coinbase() {
        return Err(TransactionError::Serialization(
            "coinbase transactions are not signed".to_string(),
        ));
    }

    let public_key_bytes = key_pair.public_key().to_bytes().to_vec();

    for index in 0..tx.inputs.len() {
        let digest = input_digest(tx, index, referenced_outputs)?;
        let signature = key_pair
            .sign_prehash(&digest)
            .map_err(|_| TransactionError::Serialization("signing failed".to_string()))?;
        tx.inputs[index].signature = signature.to_vec();
        tx.inputs[index].pub_key = public_key_bytes.clone();
    }

    Ok(())
}

/// Verify every non-coinbase input of `tx`, given the referenced output
/// for each input (in input order).
///
/// Coinbase transactions verify unconditionally. Any input failure — bad
/// signature, malformed public key, or a public key that does not hash to
/// the referenced output's lock — makes the whole transaction invalid.
pub fn verify_transaction(
    tx: &Transaction,
    referenced_outputs: &[TxOutput],
) -> Result<bool, TransactionError> {
    if tx.is_coinbase() {
        return Ok(true);
    }

    for (index, input) in tx.inputs.iter().enumerate() {
        let digest = input_digest(tx, index, referenced_outputs)?;

        let public_key = match PublicKey::from_bytes(&input.pub_key) {
            Ok(pk) => pk,
            Err(_) => return Ok(false),
        };

        if public_key.hash160() != referenced_outputs[index].pub_key_hash {
            return Ok(false);
        }

        match public_key.verify_prehash(&digest, &input.signature) {
            Ok(()) => {}
            Err(CryptoError::InvalidSignature) | Err(CryptoError::VerificationFailed) => {
                return Ok(false);
            }
            Err(_) => return Ok(false),
        }
    }

    Ok(true)
}
