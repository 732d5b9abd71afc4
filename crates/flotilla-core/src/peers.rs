//! Peer sets — the membership list that seeds cluster bootstrap.
//!
//! Every node's storage config must list every node (including itself)
//! as a candidate seed; a truncated list can partition the gossip
//! bootstrap. Order carries no meaning, but membership must be
//! exhaustive, so the set is built once and handed unchanged to every
//! node's renderer.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::address::{AddressParseError, NodeAddress};

/// Ordered collection of all cluster nodes (peers plus self).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSet {
    nodes: Vec<NodeAddress>,
}

impl PeerSet {
    pub fn new(nodes: Vec<NodeAddress>) -> Self {
        Self { nodes }
    }

    /// Parse a comma-separated `host[:port]` list, the format taken on
    /// the command line.
    pub fn parse_list(list: &str) -> Result<Self, AddressParseError> {
        let nodes = list
            .split(',')
            .map(|s| NodeAddress::from_str(s))
            .collect::<Result<Vec<_>, _>>()?;
        if nodes.is_empty() {
            return Err(AddressParseError::Empty);
        }
        Ok(Self { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeAddress> {
        self.nodes.iter()
    }

    /// Connect addresses of every member, in order — the value set a
    /// storage config's seed list is replaced with.
    pub fn seed_addresses(&self) -> Vec<String> {
        self.nodes
            .iter()
            .map(|n| n.connect_address().to_string())
            .collect()
    }
}

impl<'a> IntoIterator for &'a PeerSet {
    type Item = &'a NodeAddress;
    type IntoIter = std::slice::Iter<'a, NodeAddress>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_with_mixed_ports() {
        let peers = PeerSet::parse_list("10.0.0.1:2020,10.0.0.2:2020,10.0.0.3").unwrap();
        assert_eq!(peers.len(), 3);
        assert_eq!(peers.seed_addresses(), vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
    }

    #[test]
    fn parse_list_propagates_bad_entries() {
        assert!(PeerSet::parse_list("10.0.0.1,,10.0.0.3").is_err());
    }

    #[test]
    fn wildcard_members_seed_as_loopback() {
        let peers = PeerSet::new(vec![
            NodeAddress::wildcard(2020),
            NodeAddress::new("10.0.0.2", 2020),
        ]);
        assert_eq!(peers.seed_addresses(), vec!["127.0.0.1", "10.0.0.2"]);
    }
}
