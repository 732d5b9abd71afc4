//! Cluster coordinator — turns a plan into on-disk node directories
//! and fleet-wide action scripts.
//!
//! Per-node layout:
//!
//! ```text
//! <base_dir>/<i>/conf/storage.toml   — patched storage config
//! <base_dir>/<i>/transfer.conf       — patched transfer config
//! <base_dir>/<i>/node-env.sh         — environment include
//! <base_dir>/<i>/{start,stop,restart}.sh
//! <base_dir>/cli/…                   — admin client, when requested
//! <base_dir>/{start,stop,restart,run,copy}all.sh
//! ```
//!
//! One node's failure never stops the others; every node is attempted
//! and the report carries per-node outcomes. Provisioning is
//! idempotent: regenerating into an existing directory overwrites the
//! managed artifacts in place.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use flotilla_config::{render_env, render_storage, render_transfer, StoragePatch};
use flotilla_core::{NodeAddress, PeerSet};
use flotilla_scripts::{
    ScriptBuilder, CLI_SCRIPT, RESTART_SCRIPT, START_SCRIPT, STOP_SCRIPT,
};

use crate::error::{FleetError, FleetResult};
use crate::plan::ProvisionPlan;

/// How the aggregate fleet scripts reach each node.
#[derive(Debug, Clone)]
pub enum ExecStyle {
    /// Every node directory lives on this machine.
    Local,
    /// One node per host, reached over ssh; the node directory path is
    /// the same on every host.
    Ssh { key: Option<PathBuf>, user: Option<String> },
}

impl ExecStyle {
    /// `(key flag, user@host)` for the ssh/scp command lines.
    fn ssh_parts(key: &Option<PathBuf>, user: &Option<String>, node: &NodeAddress) -> (String, String) {
        let key = key
            .as_ref()
            .map(|k| format!("-i \"{}\" ", k.display()))
            .unwrap_or_default();
        let target = match user {
            Some(u) => format!("{u}@{}", node.connect_address()),
            None => node.connect_address().to_string(),
        };
        (key, target)
    }

    /// Shell fragment running `command` on one node.
    fn invoke(&self, node: &NodeAddress, command: &str) -> String {
        match self {
            ExecStyle::Local => command.to_string(),
            ExecStyle::Ssh { key, user } => {
                let (key, target) = Self::ssh_parts(key, user, node);
                format!("ssh {key}{target} '{command}'")
            }
        }
    }

    /// Shell fragment forwarding the aggregate script's own arguments
    /// to one node as a command.
    fn forward_args(&self, node: &NodeAddress, node_dir: &Path) -> String {
        match self {
            ExecStyle::Local => format!("( cd \"{}\" && \"$@\" )", node_dir.display()),
            ExecStyle::Ssh { key, user } => {
                let (key, target) = Self::ssh_parts(key, user, node);
                format!("ssh {key}{target} \"$*\"")
            }
        }
    }

    /// Shell fragment copying local file `$1` onto one node.
    fn copy(&self, node: &NodeAddress, node_dir: &Path) -> String {
        match self {
            ExecStyle::Local => format!("cp \"$1\" \"{}/\"", node_dir.display()),
            ExecStyle::Ssh { key, user } => {
                let (key, target) = Self::ssh_parts(key, user, node);
                format!("scp {key}\"$1\" {target}:\"{}/\"", node_dir.display())
            }
        }
    }
}

/// Outcome of provisioning one directory.
#[derive(Debug, Serialize)]
pub struct ProvisionOutcome {
    pub node: String,
    pub dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-node outcomes for a whole provisioning run.
#[derive(Debug, Serialize)]
pub struct ProvisionReport {
    pub outcomes: Vec<ProvisionOutcome>,
}

impl ProvisionReport {
    pub fn ok(&self) -> bool {
        self.outcomes.iter().all(|o| o.error.is_none())
    }

    /// Logical OR of per-node failures.
    pub fn exit_code(&self) -> i32 {
        if self.ok() { 0 } else { 1 }
    }
}

/// Provisions node directories and fleet scripts from a plan.
pub struct Coordinator {
    plan: ProvisionPlan,
    style: ExecStyle,
}

impl Coordinator {
    pub fn new(plan: ProvisionPlan, style: ExecStyle) -> Self {
        Self { plan, style }
    }

    /// Provision every node (and the admin client, when planned), then
    /// write the aggregate scripts. Per-node failures are captured in
    /// the report; only base-directory I/O failures abort the run.
    pub fn provision(&self) -> FleetResult<ProvisionReport> {
        fs::create_dir_all(&self.plan.base_dir)?;
        let peers = self.plan.peer_set();
        let mut outcomes = Vec::new();

        for (index, node) in self.plan.nodes.iter().enumerate() {
            if let Some(host) = &self.plan.self_host {
                if node.bind_address() != host {
                    continue;
                }
            }
            let dir = self.plan.node_dir(index);
            let result = self.provision_node(node, &dir, &peers);
            if let Err(e) = &result {
                warn!(node = %node, error = %e, "node provisioning failed");
            } else {
                info!(node = %node, dir = %dir.display(), "node provisioned");
            }
            outcomes.push(ProvisionOutcome {
                node: node.to_string(),
                dir: dir.display().to_string(),
                error: result.err().map(|e| e.to_string()),
            });
        }

        if let Some(admin) = self.plan.admin_client.clone() {
            let dir = self.plan.admin_dir();
            let result = self.provision_admin(&admin, &dir, &peers);
            if let Err(e) = &result {
                warn!(node = %admin, error = %e, "admin client provisioning failed");
            }
            outcomes.push(ProvisionOutcome {
                node: admin.to_string(),
                dir: dir.display().to_string(),
                error: result.err().map(|e| e.to_string()),
            });
        }

        self.write_fleet_scripts()?;
        Ok(ProvisionReport { outcomes })
    }

    fn provision_node(
        &self,
        node: &NodeAddress,
        node_dir: &Path,
        peers: &PeerSet,
    ) -> FleetResult<()> {
        let provision_err = |source| FleetError::Provision { node: node.to_string(), source };

        fs::create_dir_all(node_dir.join("conf"))?;
        fs::create_dir_all(node_dir.join("active-data"))?;

        let assignment = self.plan.assignment_for(node);
        let templates = &self.plan.templates;

        let storage = render_storage(
            &templates.storage().map_err(provision_err)?,
            &StoragePatch { assignment: &assignment, node, peers, node_dir },
        )
        .map_err(provision_err)?;
        fs::write(node_dir.join("conf").join("storage.toml"), storage)?;

        let transfer = render_transfer(&templates.transfer().map_err(provision_err)?, node, &assignment)
            .map_err(provision_err)?;
        fs::write(node_dir.join("transfer.conf"), transfer)?;

        let env = render_env(
            &templates.env().map_err(provision_err)?,
            &self.plan.install_dir,
            &node_dir.join("conf"),
            &assignment,
        )
        .map_err(provision_err)?;
        fs::write(node_dir.join("node-env.sh"), env)?;

        let builder = ScriptBuilder::new(assignment, node.clone(), node_dir, &self.plan.install_dir);
        write_executable(&node_dir.join(START_SCRIPT), &builder.start_script())?;
        write_executable(&node_dir.join(STOP_SCRIPT), &builder.stop_script())?;
        write_executable(&node_dir.join(RESTART_SCRIPT), &builder.restart_script())?;
        Ok(())
    }

    /// The admin client owns no persistent services: it gets only the
    /// transfer helper's config and the interactive `cli.sh`.
    fn provision_admin(
        &self,
        admin: &NodeAddress,
        dir: &Path,
        peers: &PeerSet,
    ) -> FleetResult<()> {
        let provision_err = |source| FleetError::Provision { node: admin.to_string(), source };

        fs::create_dir_all(dir)?;
        let assignment = self.plan.assignment_for(admin);

        let transfer =
            render_transfer(&self.plan.templates.transfer().map_err(provision_err)?, admin, &assignment)
                .map_err(provision_err)?;
        fs::write(dir.join("transfer.conf"), transfer)?;

        let builder = ScriptBuilder::new(assignment, admin.clone(), dir, &self.plan.install_dir);
        write_executable(&dir.join(CLI_SCRIPT), &builder.admin_cli_script(peers))?;
        Ok(())
    }

    /// Aggregate scripts: one action per node, sequential, exit status
    /// ORing per-node failures so partial failure is visible. No
    /// rollback is attempted.
    fn write_fleet_scripts(&self) -> FleetResult<()> {
        for (file, action) in [
            ("startall.sh", START_SCRIPT),
            ("stopall.sh", STOP_SCRIPT),
            ("restartall.sh", RESTART_SCRIPT),
        ] {
            let mut script = String::from("#!/bin/bash\n# Generated by flotilla.\nrc=0\n");
            for (index, node) in self.plan.nodes.iter().enumerate() {
                let cmd = format!("{}/{}", self.plan.node_dir(index).display(), action);
                script.push_str(&format!("{} || rc=1\n", self.style.invoke(node, &cmd)));
            }
            script.push_str("exit $rc\n");
            write_executable(&self.plan.base_dir.join(file), &script)?;
        }

        let mut run = String::from("#!/bin/bash\n# Run one command on every node.\nrc=0\n");
        for (index, node) in self.plan.nodes.iter().enumerate() {
            let cmd = self.style.forward_args(node, &self.plan.node_dir(index));
            run.push_str(&format!("{cmd} || rc=1\n"));
        }
        run.push_str("exit $rc\n");
        write_executable(&self.plan.base_dir.join("runall.sh"), &run)?;

        let mut copy = String::from("#!/bin/bash\n# Copy one file onto every node.\nrc=0\n");
        for (index, node) in self.plan.nodes.iter().enumerate() {
            let dir = self.plan.node_dir(index);
            copy.push_str(&format!("{} || rc=1\n", self.style.copy(node, &dir)));
        }
        copy.push_str("exit $rc\n");
        write_executable(&self.plan.base_dir.join("copyall.sh"), &copy)?;
        Ok(())
    }

    /// One-time bootstrap action for a node: refresh the installed
    /// build and reprovision in place over the remote channel.
    pub fn bootstrap_command(&self, node: &NodeAddress) -> String {
        let nodes = self
            .plan
            .nodes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "cd {install} && git pull && flotilla provision --nodes {nodes} --dir {dir} --listen {host}",
            install = self.plan.install_dir.display(),
            dir = self.plan.base_dir.display(),
            host = node.bind_address(),
        )
    }
}

fn write_executable(path: &Path, contents: &str) -> std::io::Result<()> {
    fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}
