//! The node runtime: bind a listener, announce ourselves, and accept peer
//! connections until asked to stop.

use ember_core::error::EmberError;
use ember_network::frame::read_message;
use ember_network::message::{Message, Version};
use ember_store::Ledger;
use tokio::net::TcpListener;

use crate::state::{NodeState, CENTRAL_NODE};

/// Run a node bound to `localhost:<node_id>`, serving the chain already
/// present at `chain_dir`. Returns once a shutdown signal is received.
pub async fn start(
    chain_dir: impl AsRef<std::path::Path>,
    node_id: &str,
    miner_address: Option<[u8; 20]>,
) -> Result<(), EmberError> {
    let node_address = format!("localhost:{node_id}");
    let ledger = Ledger::open(chain_dir)?;
    let state = std::sync::Arc::new(NodeState::new(ledger, node_address.clone(), miner_address));

    let listener = TcpListener::bind(("0.0.0.0", node_id.parse::<u16>().map_err(|_| {
        EmberError::Network(ember_core::error::NetworkError::Io(format!(
            "invalid node id {node_id}, expected a port number"
        )))
    })?))
    .await
    .map_err(|e| EmberError::Network(ember_core::error::NetworkError::Io(e.to_string())))?;

    if node_address != CENTRAL_NODE {
        let best_height = state.ledger.chain.best_height()?;
        let version = Message::Version(Version { version: 1, best_height, from: node_address.clone() });
        if let Err(e) = ember_network::frame::send_message(CENTRAL_NODE, &version).await {
            tracing::warn!(error = %e, "could not reach central node at startup");
        }
    }

    tracing::info!(address = %node_address, "node listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (mut stream, peer) = match accepted {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                let state = state.clone();
                tokio::spawn(async move {
                    match read_message(&mut stream).await {
                        Ok(message) => {
                            if let Err(e) = crate::handlers::dispatch(&state, message).await {
                                tracing::warn!(%peer, error = %e, "error handling peer message");
                            }
                        }
                        Err(e) => tracing::warn!(%peer, error = %e, "could not read peer frame"),
                    }
                });
            }
            _ = shutdown_signal() => {
                tracing::info!("shutdown signal received, closing node");
                return Ok(());
            }
        }
    }
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
}
