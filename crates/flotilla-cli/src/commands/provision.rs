//! `flotilla provision` / `flotilla local` — build node directories.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::info;

use flotilla_config::Templates;
use flotilla_core::{NodeAddress, PeerSet};
use flotilla_fleet::{Coordinator, ExecStyle, ProvisionPlan, ProvisionReport};

/// Admin-client identity: loopback, outside any node's block.
const ADMIN_CLIENT_BASE: u16 = 8000;

#[allow(clippy::too_many_arguments)]
pub fn provision(
    nodes: &str,
    dir: PathBuf,
    listen: Option<String>,
    install_dir: PathBuf,
    transfer_port: Option<u16>,
    templates: Option<PathBuf>,
    admin_cli: bool,
    ssh_key: Option<PathBuf>,
    ssh_user: Option<String>,
) -> Result<()> {
    check_dir(&dir)?;
    let peers = PeerSet::parse_list(nodes).context("invalid --nodes list")?;

    let mut plan = ProvisionPlan::new(peers.iter().cloned().collect(), dir);
    plan.install_dir = install_dir;
    if let Some(port) = transfer_port {
        plan = plan.with_transfer_port(port);
    }
    if let Some(dir) = templates {
        plan = plan.with_templates(Templates::from_dir(dir));
    }
    if let Some(host) = listen {
        plan = plan.with_self_host(host);
    }
    if admin_cli {
        plan = plan.with_admin_client(NodeAddress::new("127.0.0.1", ADMIN_CLIENT_BASE));
    }

    let style = if ssh_key.is_some() || ssh_user.is_some() {
        ExecStyle::Ssh { key: ssh_key, user: ssh_user }
    } else {
        ExecStyle::Local
    };

    finish(Coordinator::new(plan, style).provision()?)
}

pub fn local(
    count: u8,
    cluster_id: u8,
    dir: PathBuf,
    install_dir: Option<PathBuf>,
    admin_cli: bool,
) -> Result<()> {
    check_dir(&dir)?;
    if count == 0 {
        bail!("--count must be at least 1");
    }

    let mut plan = ProvisionPlan::local(cluster_id, count, dir);
    if let Some(install) = install_dir {
        plan = plan.with_install_dir(install);
    }
    if admin_cli {
        plan = plan.with_admin_client(NodeAddress::new("127.0.0.1", ADMIN_CLIENT_BASE));
    }

    finish(Coordinator::new(plan, ExecStyle::Local).provision()?)
}

/// Refuse to scatter node directories into the working directory.
fn check_dir(dir: &std::path::Path) -> Result<()> {
    if dir.as_os_str().is_empty() || dir.starts_with(".") {
        bail!("cannot use the current directory for provisioning; pass an explicit --dir");
    }
    Ok(())
}

fn finish(report: ProvisionReport) -> Result<()> {
    for outcome in &report.outcomes {
        match &outcome.error {
            None => info!(node = %outcome.node, dir = %outcome.dir, "provisioned"),
            Some(e) => eprintln!("{}: {e}", outcome.node),
        }
    }
    if !report.ok() {
        bail!("provisioning failed for {} node(s)",
            report.outcomes.iter().filter(|o| o.error.is_some()).count());
    }
    println!("Finished setting up {} director(ies)", report.outcomes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_the_current_directory() {
        assert!(check_dir(&PathBuf::from(".")).is_err());
        assert!(check_dir(&PathBuf::from("./cluster")).is_err());
        assert!(check_dir(&PathBuf::from("/srv/cluster")).is_ok());
    }

    #[test]
    fn local_provisions_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        local(2, 0, dir.path().join("fleet"), None, true).unwrap();
        assert!(dir.path().join("fleet/0/start.sh").is_file());
        assert!(dir.path().join("fleet/1/conf/storage.toml").is_file());
        assert!(dir.path().join("fleet/cli/cli.sh").is_file());
        assert!(dir.path().join("fleet/startall.sh").is_file());
    }

    #[test]
    fn provision_rejects_bad_node_lists() {
        let dir = tempfile::tempdir().unwrap();
        let err = provision(
            "",
            dir.path().join("fleet"),
            None,
            PathBuf::from("/opt/flotilla"),
            None,
            None,
            false,
            None,
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("--nodes"));
    }
}
