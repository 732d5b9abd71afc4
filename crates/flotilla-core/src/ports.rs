//! Port allocation — one fixed block of service ports per node.
//!
//! Each node reserves [`BLOCK_SIZE`] consecutive ports starting at its
//! base port. Five are in use today; the rest are opaque headroom so a
//! future service can land without renumbering the fleet. The storage
//! daemon's inter-node port is the one exception: it is a well-known
//! rendezvous port, identical on every node, never derived from the base.
//!
//! Allocation is a total, deterministic function of the base port. It
//! performs no collision checking; keeping the blocks of nodes sharing a
//! host disjoint is a deployment-time precondition.

use serde::{Deserialize, Serialize};

/// Ports reserved per node. Really we need 5, but reserve extra in case
/// services are added later.
pub const BLOCK_SIZE: u16 = 10;

/// Inter-node storage port. Must be identical across all nodes.
pub const STORAGE_DATA_PORT: u16 = 7000;

/// Conventional peer-to-peer transfer port, used when the transfer
/// daemon should sit on the protocol's well-known port instead of
/// inside the node's block.
pub const WELL_KNOWN_TRANSFER_PORT: u16 = 6881;

/// The full set of service ports derived from one node's base port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortAssignment {
    base: u16,
    transfer_peer: u16,
}

impl PortAssignment {
    /// Derive a node's port block from its base port.
    ///
    /// Bases above `u16::MAX - BLOCK_SIZE` are clamped down so the whole
    /// block stays inside the port range; offsets cannot wrap.
    pub fn allocate(base: u16) -> Self {
        let base = base.min(u16::MAX - BLOCK_SIZE);
        Self { base, transfer_peer: base + 2 }
    }

    /// Override the transfer-protocol port, e.g. to pin it to
    /// [`WELL_KNOWN_TRANSFER_PORT`]. All other offsets keep their slots.
    pub fn with_transfer_port(mut self, port: u16) -> Self {
        self.transfer_peer = port;
        self
    }

    /// First port of the reserved block.
    pub fn base(&self) -> u16 {
        self.base
    }

    /// Inter-node storage port — the cluster-wide constant.
    pub fn storage_data(&self) -> u16 {
        STORAGE_DATA_PORT
    }

    /// Client-facing storage port.
    pub fn storage_client(&self) -> u16 {
        self.base
    }

    /// Management/remote-attach port.
    pub fn management(&self) -> u16 {
        self.base + 1
    }

    /// Transfer daemon's peer-protocol port.
    pub fn transfer_peer(&self) -> u16 {
        self.transfer_peer
    }

    /// Transfer daemon's web-UI port, also the readiness-probe target.
    pub fn transfer_webui(&self) -> u16 {
        self.base + 3
    }

    /// Port the node listens on for transfer-completion callbacks.
    pub fn completion_callback(&self) -> u16 {
        self.base + 4
    }

    /// The reserved port range `[base, base + BLOCK_SIZE)`.
    pub fn block(&self) -> std::ops::Range<u16> {
        self.base..self.base + BLOCK_SIZE
    }

    /// The per-node derived ports (excludes the storage-data constant).
    pub fn derived_ports(&self) -> [u16; 5] {
        [
            self.storage_client(),
            self.management(),
            self.transfer_peer(),
            self.transfer_webui(),
            self.completion_callback(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_2020() {
        let p = PortAssignment::allocate(2020);
        assert_eq!(p.storage_client(), 2020);
        assert_eq!(p.management(), 2021);
        assert_eq!(p.transfer_peer(), 2022);
        assert_eq!(p.transfer_webui(), 2023);
        assert_eq!(p.completion_callback(), 2024);
        assert_eq!(p.storage_data(), 7000);
    }

    #[test]
    fn derived_ports_distinct_and_inside_block() {
        for base in [1024u16, 2020, 3000, 9990] {
            let p = PortAssignment::allocate(base);
            let ports = p.derived_ports();
            for (i, a) in ports.iter().enumerate() {
                assert!(p.block().contains(a), "port {a} outside block of {base}");
                for b in &ports[i + 1..] {
                    assert_ne!(a, b, "duplicate port in block of {base}");
                }
            }
        }
    }

    #[test]
    fn storage_data_is_constant_for_every_base() {
        for base in [1024u16, 2020, 5000, 8000] {
            assert_eq!(PortAssignment::allocate(base).storage_data(), STORAGE_DATA_PORT);
        }
    }

    #[test]
    fn disjoint_blocks_share_only_the_storage_constant() {
        let a = PortAssignment::allocate(2020);
        let b = PortAssignment::allocate(2030);
        for pa in a.derived_ports() {
            for pb in b.derived_ports() {
                assert_ne!(pa, pb);
            }
        }
        assert_eq!(a.storage_data(), b.storage_data());
    }

    #[test]
    fn allocate_near_the_top_of_the_port_range_cannot_wrap() {
        let p = PortAssignment::allocate(u16::MAX);
        assert_eq!(p.base(), u16::MAX - BLOCK_SIZE);
        assert!(p.block().end >= p.base());
        let ports = p.derived_ports();
        for (i, a) in ports.iter().enumerate() {
            assert!(p.block().contains(a));
            for b in &ports[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn allocation_is_deterministic() {
        assert_eq!(PortAssignment::allocate(2500), PortAssignment::allocate(2500));
    }

    #[test]
    fn transfer_port_override_leaves_other_slots() {
        let p = PortAssignment::allocate(2020).with_transfer_port(WELL_KNOWN_TRANSFER_PORT);
        assert_eq!(p.transfer_peer(), 6881);
        assert_eq!(p.transfer_webui(), 2023);
        assert_eq!(p.completion_callback(), 2024);
    }
}
