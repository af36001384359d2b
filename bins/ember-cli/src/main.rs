//! ember-cli — command-line interface for an Ember node: wallet management,
//! chain bootstrap and inspection, transaction construction, and the node
//! server itself.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use ember_core::address;
use ember_core::crypto::KeyPair;
use ember_core::sign::sign_transaction;
use ember_core::tx::{build_transaction, referenced_outputs, SelectedInput};
use ember_core::types::Transaction;
use ember_network::message::{Inv, Kind, Message};
use ember_store::Ledger;
use ember_wallet::WalletStore;

/// The network hub new nodes announce themselves to and, absent peers,
/// broadcast unmined transactions to.
const CENTRAL_NODE: &str = "localhost:3000";

#[derive(Parser)]
#[command(name = "ember-cli")]
#[command(version, about = "Command-line interface for an Ember node")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new wallet key pair and print its address.
    #[command(name = "createwallet")]
    CreateWallet,
    /// Print every address in the local wallet file.
    #[command(name = "listaddress")]
    ListAddress,
    /// Mine the genesis block, paying its reward to `address`.
    #[command(name = "createblockchain")]
    CreateBlockchain {
        #[arg(long)]
        address: String,
    },
    /// Sum the unspent outputs locked to `address`.
    #[command(name = "getbalance")]
    GetBalance {
        #[arg(long)]
        address: String,
    },
    /// Build, sign, and submit a transaction.
    #[command(name = "send")]
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u64,
        /// Mine the transaction into a block immediately instead of
        /// broadcasting it to the network.
        #[arg(long)]
        mine: bool,
    },
    /// Print every block from the tip back to genesis.
    #[command(name = "printchain")]
    PrintChain,
    /// Rebuild the UTXO index from the stored chain.
    #[command(name = "reindexutxo")]
    ReindexUtxo,
    /// Run the peer server.
    #[command(name = "startnode")]
    StartNode {
        /// Enable mining, with the reward paid to this address.
        #[arg(long)]
        miner: Option<String>,
    },
}

fn node_id() -> String {
    std::env::var("NODE_ID").unwrap_or_else(|_| "3000".to_string())
}

fn chain_dir(node_id: &str) -> PathBuf {
    PathBuf::from("./tmp").join(format!("blocks_{node_id}"))
}

fn wallet_path(node_id: &str) -> PathBuf {
    PathBuf::from("./tmp").join(format!("wallets_{node_id}.data"))
}

fn decode_address(label: &str, raw: &str) -> Result<[u8; 20]> {
    address::decode(raw).with_context(|| format!("{label} is not a valid address: {raw}"))
}

fn cmd_create_wallet(node_id: &str) -> Result<()> {
    let mut store = WalletStore::open_or_create(wallet_path(node_id))?;
    let addr = store.create_wallet()?;
    println!("{addr}");
    Ok(())
}

fn cmd_list_address(node_id: &str) -> Result<()> {
    let store = WalletStore::open_or_create(wallet_path(node_id))?;
    for addr in store.addresses() {
        println!("{addr}");
    }
    Ok(())
}

fn cmd_create_blockchain(node_id: &str, address: &str) -> Result<()> {
    let pkh = decode_address("address", address)?;
    let dir = chain_dir(node_id);
    if dir.exists() {
        bail!("blockchain already exists at {}", dir.display());
    }
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    Ledger::init(&dir, pkh, timestamp)?;
    println!("genesis block created");
    Ok(())
}

fn cmd_get_balance(node_id: &str, address: &str) -> Result<()> {
    let pkh = decode_address("address", address)?;
    let ledger = Ledger::open(chain_dir(node_id))?;
    let balance: u64 = ledger.utxo.find_utxo(&pkh)?.iter().map(|o| o.value).sum();
    println!("balance of {address}: {balance}");
    Ok(())
}

async fn cmd_send(node_id: &str, from: &str, to: &str, amount: u64, mine: bool) -> Result<()> {
    let from_pkh = decode_address("from", from)?;
    let to_pkh = decode_address("to", to)?;

    let wallet = WalletStore::open_or_create(wallet_path(node_id))?;
    let key_pair = wallet.key_pair(from)?;

    let ledger = Ledger::open(chain_dir(node_id))?;
    let (available, outpoints) = ledger.utxo.find_spendable(&from_pkh, amount)?;
    if available < amount {
        bail!("insufficient funds: have {available}, need {amount}");
    }

    let selected: Vec<SelectedInput> = outpoints
        .into_iter()
        .flat_map(|(tx_id, indices)| {
            indices.into_iter().map(move |index| (tx_id, index))
        })
        .map(|(tx_id, index)| -> Result<SelectedInput> {
            let referenced_output = ledger
                .utxo
                .referenced_output(&tx_id, index as i64)?
                .context("selected outpoint vanished from the UTXO set")?;
            Ok(SelectedInput { prev_tx_id: tx_id, out_index: index as i64, referenced_output })
        })
        .collect::<Result<_>>()?;

    let mut tx = build_transaction(&selected, available, amount, to_pkh, from_pkh)?;
    let refs = referenced_outputs(&selected);
    sign_transaction(&mut tx, &refs, &key_pair)?;
    tx.finalize_id()?;

    if mine {
        let coinbase = Transaction::coinbase(from_pkh, Vec::new())?;
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let block = ledger.mine_block(vec![coinbase, tx], timestamp)?;
        println!("mined block at height {}", block.height);
    } else {
        let msg = Message::Inv(Inv {
            from: format!("localhost:{node_id}"),
            kind: Kind::Tx,
            items: vec![tx.id],
        });
        ember_network::frame::send_message(CENTRAL_NODE, &msg)
            .await
            .context("could not reach the network hub to broadcast the transaction")?;
        println!("transaction {} broadcast", hex::encode(tx.id));
    }
    Ok(())
}

fn cmd_print_chain(node_id: &str) -> Result<()> {
    let ledger = Ledger::open(chain_dir(node_id))?;
    for block in ledger.chain.iterator() {
        let block = block?;
        let valid = ember_consensus::block::validate_block(&block).is_ok();
        println!(
            "height={} hash={} prev={} txs={} pow_valid={}",
            block.height,
            hex::encode(block.hash),
            hex::encode(block.prev_hash),
            block.transactions.len(),
            valid,
        );
    }
    Ok(())
}

fn cmd_reindex_utxo(node_id: &str) -> Result<()> {
    let ledger = Ledger::open(chain_dir(node_id))?;
    ledger.utxo.reindex(&ledger.chain)?;
    let count = ledger.utxo.count_utxo_transactions()?;
    println!("reindexed {count} transactions carrying unspent outputs");
    Ok(())
}

async fn cmd_start_node(node_id: &str, miner: Option<String>) -> Result<()> {
    let miner_pkh = miner.map(|a| decode_address("miner", &a)).transpose()?;
    ember_node::node::start(chain_dir(node_id), node_id, miner_pkh).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let node_id = node_id();

    match cli.command {
        Commands::CreateWallet => cmd_create_wallet(&node_id),
        Commands::ListAddress => cmd_list_address(&node_id),
        Commands::CreateBlockchain { address } => cmd_create_blockchain(&node_id, &address),
        Commands::GetBalance { address } => cmd_get_balance(&node_id, &address),
        Commands::Send { from, to, amount, mine } => {
            cmd_send(&node_id, &from, &to, amount, mine).await
        }
        Commands::PrintChain => cmd_print_chain(&node_id),
        Commands::ReindexUtxo => cmd_reindex_utxo(&node_id),
        Commands::StartNode { miner } => cmd_start_node(&node_id, miner).await,
    }
}
