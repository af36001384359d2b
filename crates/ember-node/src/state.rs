//! Process-wide state a connection handler needs: the ledger, the set of
//! peers known so far, blocks mid-download, and the mempool. Guarded by
//! one coarse lock per collection, since each is small and append-and-scan.

use parking_lot::Mutex;

use ember_store::Ledger;

use crate::mempool::Mempool;

/// The first entry every node's `known_nodes` list starts with. The node
/// whose own address equals this one is treated as the network's hub: it
/// fans transactions out to every other peer instead of mining them.
pub const CENTRAL_NODE: &str = "localhost:3000";

pub struct NodeState {
    pub ledger: Ledger,
    pub known_nodes: Mutex<Vec<String>>,
    pub blocks_in_transit: Mutex<Vec<[u8; 32]>>,
    pub mempool: Mutex<Mempool>,
    pub node_address: String,
    pub miner_address: Option<[u8; 20]>,
}

impl NodeState {
    pub fn new(ledger: Ledger, node_address: String, miner_address: Option<[u8; 20]>) -> NodeState {
        NodeState {
            ledger,
            known_nodes: Mutex::new(vec![CENTRAL_NODE.to_string()]),
            blocks_in_transit: Mutex::new(Vec::new()),
            mempool: Mutex::new(Mempool::new()),
            node_address,
            miner_address,
        }
    }

    /// Whether this node is the network's hub (fan-out point for `tx`
    /// gossip instead of a miner).
    pub fn is_central(&self) -> bool {
        self.node_address == CENTRAL_NODE
    }

    pub fn is_known(&self, addr: &str) -> bool {
        self.known_nodes.lock().iter().any(|n| n == addr)
    }

    pub fn remember(&self, addr: String) {
        if !self.is_known(&addr) {
            self.known_nodes.lock().push(addr);
        }
    }
}
