//! `mine_tx`: snapshot the mempool, keep what still verifies, mine it into
//! a block, and gossip the result — repeating until the pool is empty.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use ember_core::error::{EmberError, TransactionError};
use ember_core::sign::verify_transaction;
use ember_core::types::{Transaction, TxOutput};
use ember_network::message::{Inv, Kind, Message};
use ember_store::utxo::UtxoIndex;

use crate::state::NodeState;

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs()
}

fn referenced_outputs(utxo: &UtxoIndex, tx: &Transaction) -> Result<Vec<TxOutput>, EmberError> {
    let mut refs = Vec::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        let out = utxo
            .referenced_output(&input.prev_tx_id, input.out_index)?
            .ok_or_else(|| {
                TransactionError::UnknownReferencedTx(hex::encode(input.prev_tx_id))
            })?;
        refs.push(out);
    }
    Ok(refs)
}

/// Verify every pooled transaction against the current UTXO set, keeping
/// only those that still spend real, correctly-signed outputs — and, among
/// those, only the first to claim any given outpoint. Two pooled
/// transactions spending the same `(prev_tx_id, out_index)` cannot both be
/// mined into the same block; the second is dropped here rather than left
/// to surface as a duplicate-spend later in `mine_block`.
fn valid_pooled_transactions(state: &NodeState) -> Vec<Transaction> {
    let mut snapshot = state.mempool.lock().snapshot();
    snapshot.sort_by_key(|tx| tx.id);

    let mut claimed: HashSet<([u8; 32], i64)> = HashSet::new();
    let mut valid = Vec::new();
    for tx in snapshot {
        let refs = match referenced_outputs(&state.ledger.utxo, &tx) {
            Ok(refs) => refs,
            Err(_) => continue,
        };
        if !verify_transaction(&tx, &refs).unwrap_or(false) {
            continue;
        }

        let outpoints: Vec<([u8; 32], i64)> =
            tx.inputs.iter().map(|i| (i.prev_tx_id, i.out_index)).collect();
        if outpoints.iter().any(|o| claimed.contains(o)) {
            continue;
        }

        claimed.extend(outpoints);
        valid.push(tx);
    }
    valid
}

/// Mine every verifiable pooled transaction into one or more blocks,
/// broadcasting each to every other known peer, until the pool is dry.
///
/// A tail-recursive loop rather than literal recursion — each pass mines
/// whatever is left after the previous pass's coinbase + transactions were
/// removed, until nothing verifiable remains.
pub async fn mine_tx(state: &NodeState) -> Result<(), EmberError> {
    loop {
        let valid = valid_pooled_transactions(state);
        if valid.is_empty() {
            tracing::info!("no valid pooled transactions to mine");
            return Ok(());
        }

        let Some(miner_address) = state.miner_address else {
            return Ok(());
        };

        let coinbase = Transaction::coinbase(miner_address, Vec::new())?;
        let mut txs = Vec::with_capacity(valid.len() + 1);
        txs.push(coinbase);
        txs.extend(valid);

        let block = state.ledger.mine_block(txs.clone(), now_unix())?;
        // Step 5: full rebuild, per the documented simpler-but-correct choice.
        state.ledger.utxo.reindex(&state.ledger.chain)?;

        {
            let mut pool = state.mempool.lock();
            for tx in &txs {
                pool.remove(&tx.id);
            }
        }
        tracing::info!(height = block.height, hash = %hex::encode(block.hash), "mined block");

        let peers: Vec<String> = state
            .known_nodes
            .lock()
            .iter()
            .filter(|n| n.as_str() != state.node_address)
            .cloned()
            .collect();
        let inv = Message::Inv(Inv {
            from: state.node_address.clone(),
            kind: Kind::Block,
            items: vec![block.hash],
        });
        for peer in peers {
            if let Err(e) = ember_network::frame::send_message(&peer, &inv).await {
                tracing::debug!(%peer, error = %e, "peer unreachable, skipping");
            }
        }

        if state.mempool.lock().is_empty() {
            return Ok(());
        }
    }
}
