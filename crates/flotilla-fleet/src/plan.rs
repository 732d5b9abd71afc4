//! Provisioning plans — what to build, where, for whom.

use std::path::PathBuf;

use flotilla_core::{NodeAddress, PeerSet, PortAssignment};
use flotilla_config::Templates;

/// Everything the coordinator needs to provision a cluster.
#[derive(Debug, Clone)]
pub struct ProvisionPlan {
    /// All persistent nodes; also the exhaustive seed membership.
    pub nodes: Vec<NodeAddress>,
    /// Directory the per-node directories are created under.
    pub base_dir: PathBuf,
    /// Install path of the daemon binaries.
    pub install_dir: PathBuf,
    /// Pin the transfer-protocol port instead of deriving base+2.
    pub transfer_port: Option<u16>,
    /// Template source; defaults to the built-in templates.
    pub templates: Templates,
    /// When set, an admin-client directory (`cli/`) is provisioned at
    /// this address alongside the nodes.
    pub admin_client: Option<NodeAddress>,
    /// When set, only nodes binding this host are materialized on disk.
    /// Every host in the fleet runs provision with the same full node
    /// list, so the peer set stays complete and node indices agree
    /// across hosts.
    pub self_host: Option<String>,
}

impl ProvisionPlan {
    pub fn new(nodes: Vec<NodeAddress>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            nodes,
            base_dir: base_dir.into(),
            install_dir: PathBuf::from("/opt/flotilla"),
            transfer_port: None,
            templates: Templates::builtin(),
            admin_client: None,
            self_host: None,
        }
    }

    /// A loopback development cluster: node *i* binds `127.<cluster>.<i>.1`
    /// with base port `2000 + 1000*cluster + 10*i`, so clusters and nodes
    /// never overlap port blocks on one machine.
    pub fn local(cluster_id: u8, count: u8, base_dir: impl Into<PathBuf>) -> Self {
        let nodes = (0..count)
            .map(|i| {
                NodeAddress::new(
                    format!("127.{cluster_id}.{i}.1"),
                    2000 + 1000 * cluster_id as u16 + 10 * i as u16,
                )
            })
            .collect();
        Self::new(nodes, base_dir)
    }

    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = dir.into();
        self
    }

    pub fn with_transfer_port(mut self, port: u16) -> Self {
        self.transfer_port = Some(port);
        self
    }

    pub fn with_templates(mut self, templates: Templates) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_admin_client(mut self, addr: NodeAddress) -> Self {
        self.admin_client = Some(addr);
        self
    }

    pub fn with_self_host(mut self, host: impl Into<String>) -> Self {
        self.self_host = Some(host.into());
        self
    }

    /// The membership list handed, identical and complete, to every
    /// node's renderer.
    pub fn peer_set(&self) -> PeerSet {
        PeerSet::new(self.nodes.clone())
    }

    /// Port block for one node, honoring a transfer-port pin.
    pub fn assignment_for(&self, node: &NodeAddress) -> PortAssignment {
        let assignment = PortAssignment::allocate(node.base_port());
        match self.transfer_port {
            Some(port) => assignment.with_transfer_port(port),
            None => assignment,
        }
    }

    /// Per-node working directory: `<base_dir>/<index>`.
    pub fn node_dir(&self, index: usize) -> PathBuf {
        self.base_dir.join(index.to_string())
    }

    /// The admin-client directory.
    pub fn admin_dir(&self) -> PathBuf {
        self.base_dir.join("cli")
    }
}
