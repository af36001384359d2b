//! Spending-transaction construction (spec §4.4, steps 1-7).
//!
//! Building a transaction is decoupled from UTXO lookup: callers gather
//! the spendable outpoints themselves (the ledger store owns that scan)
//! and pass them in here as [`SelectedInput`]s. This crate only assembles
//! the resulting inputs/outputs and computes `id` — signing is a separate
//! step, see [`crate::sign`].

use crate::error::TransactionError;
use crate::types::{Transaction, TxInput, TxOutput};

/// One previously-unspent output selected to fund a new transaction.
pub struct SelectedInput {
    pub prev_tx_id: [u8; 32],
    pub out_index: i64,
    /// The output being spent, needed later to build the signing digest.
    pub referenced_output: TxOutput,
}

/// Build an unsigned spending transaction paying `amount` to
/// `recipient_pub_key_hash`, funded by `selected` (whose outputs sum to
/// `available`), returning any excess as change to `change_pub_key_hash`.
///
/// Fails with [`TransactionError::InsufficientFunds`] if `available < amount`.
/// The caller is expected to have already confirmed `available` is the sum
/// of `selected`'s referenced output values.
pub fn build_transaction(
    selected: &[SelectedInput],
    available: u64,
    amount: u64,
    recipient_pub_key_hash: [u8; 20],
    change_pub_key_hash: [u8; 20],
) -> Result<Transaction, TransactionError> {
    if available < amount {
        return Err(TransactionError::InsufficientFunds {
            have: available,
            need: amount,
        });
    }
    if selected.is_empty() {
        return Err(TransactionError::EmptyInputsOrOutputs);
    }

    let inputs = selected
        .iter()
        .map(|s| TxInput {
            prev_tx_id: s.prev_tx_id,
            out_index: s.out_index,
            signature: Vec::new(),
            pub_key: Vec::new(),
        })
        .collect();

    let mut outputs = vec![TxOutput {
        value: amount,
        pub_key_hash: recipient_pub_key_hash,
    }];

    let change = available - amount;
    if change > 0 {
        outputs.push(TxOutput {
            value: change,
            pub_key_hash: change_pub_key_hash,
        });
    }

    let mut tx = Transaction {
        id: [0u8; 32],
        inputs,
        outputs,
    };
    tx.finalize_id()?;
    Ok(tx)
}

/// The referenced outputs of `selected`, in input order — the shape
/// [`crate::sign::sign_transaction`] and [`crate::sign::verify_transaction`]
/// expect.
pub fn referenced_outputs(selected: &[SelectedInput]) -> Vec<TxOutput> {
    selected.iter().map(|s| s.referenced_output.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selected(value: u64) -> SelectedInput {
        SelectedInput {
            prev_tx_id: [0x55; 32],
            out_index: 0,
            referenced_output: TxOutput { value, pub_key_hash: [0x66; 20] },
        }
    }

    #[test]
    fn exact_amount_has_no_change_output() {
        let tx = build_transaction(&[selected(30)], 30, 30, [1u8; 20], [2u8; 20]).unwrap();
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(tx.outputs[0].value, 30);
    }

    #[test]
    fn surplus_produces_change_output() {
        let tx = build_transaction(&[selected(100)], 100, 30, [1u8; 20], [2u8; 20]).unwrap();
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].value, 30);
        assert_eq!(tx.outputs[0].pub_key_hash, [1u8; 20]);
        assert_eq!(tx.outputs[1].value, 70);
        assert_eq!(tx.outputs[1].pub_key_hash, [2u8; 20]);
    }

    #[test]
    fn insufficient_funds_rejected() {
        let err = build_transaction(&[selected(10)], 10, 30, [1u8; 20], [2u8; 20]).unwrap_err();
        assert_eq!(err, TransactionError::InsufficientFunds { have: 10, need: 30 });
    }

    #[test]
    fn inputs_carry_no_signature_yet() {
        let tx = build_transaction(&[selected(30)], 30, 30, [1u8; 20], [2u8; 20]).unwrap();
        assert!(tx.inputs[0].signature.is_empty());
        assert!(tx.inputs[0].pub_key.is_empty());
    }

    #[test]
    fn referenced_outputs_preserves_order() {
        let sels = vec![selected(1), selected(2)];
        let outs = referenced_outputs(&sels);
        assert_eq!(outs.len(), 2);
    }
}
