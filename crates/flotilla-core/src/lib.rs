//! Shared types used across flotilla crates.
//!
//! The core model is small and pure:
//!
//! - **`NodeAddress`** — a node's identity: bind host plus base port,
//!   with the wildcard/loopback resolution rules every other crate
//!   relies on.
//! - **`PortAssignment`** — the fixed port block derived from a base
//!   port; one allocation per node, no I/O, no collision checking.
//! - **`PeerSet`** — the exhaustive membership list used to seed the
//!   storage daemon's gossip bootstrap.

pub mod address;
pub mod peers;
pub mod ports;

pub use address::{AddressParseError, NodeAddress, DEFAULT_BASE_PORT, WILDCARD_HOST};
pub use peers::PeerSet;
pub use ports::{PortAssignment, BLOCK_SIZE, STORAGE_DATA_PORT, WELL_KNOWN_TRANSFER_PORT};

use serde::{Deserialize, Serialize};

/// Role a provisioned directory plays in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    /// Hosts the persistent storage and transfer daemons.
    Node,
    /// Runs only a transient transfer helper and an interactive
    /// management session against the fleet.
    AdminClient,
}
