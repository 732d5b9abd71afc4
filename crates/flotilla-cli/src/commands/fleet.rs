//! `flotilla fleet` — one action across every node.

use anyhow::{Context, Result};
use tracing::info;

use flotilla_core::{NodeAddress, PeerSet};
use flotilla_fleet::{
    Coordinator, ExecStyle, FleetExecutor, FleetReport, LocalChannel, ProvisionPlan,
    SshChannel,
};
use flotilla_scripts::{RESTART_SCRIPT, START_SCRIPT, STOP_SCRIPT};

use crate::{FleetAction, FleetOpts, Format};

pub async fn run(action: FleetAction) -> Result<()> {
    match action {
        FleetAction::Start(opts) => lifecycle(opts, START_SCRIPT).await,
        FleetAction::Stop(opts) => lifecycle(opts, STOP_SCRIPT).await,
        FleetAction::Restart(opts) => lifecycle(opts, RESTART_SCRIPT).await,
        FleetAction::Run { command, opts } => {
            let nodes = parse_nodes(&opts)?;
            let actions = nodes.iter().map(|n| (n.clone(), command.clone())).collect();
            execute(&opts, "run", actions).await
        }
        FleetAction::Bootstrap(opts) => {
            let nodes = parse_nodes(&opts)?;
            let plan = ProvisionPlan::new(nodes.clone(), opts.dir.clone());
            let coordinator = Coordinator::new(plan, ExecStyle::Local);
            let actions = nodes
                .iter()
                .map(|n| (n.clone(), coordinator.bootstrap_command(n)))
                .collect();
            execute(&opts, "bootstrap", actions).await
        }
    }
}

/// Start/stop/restart: invoke each node's own lifecycle script, which
/// lives at `<dir>/<index>/<script>` on its host.
async fn lifecycle(opts: FleetOpts, script: &str) -> Result<()> {
    let nodes = parse_nodes(&opts)?;
    let actions = nodes
        .iter()
        .enumerate()
        .map(|(index, node)| {
            (node.clone(), format!("{}/{index}/{script}", opts.dir.display()))
        })
        .collect();
    execute(&opts, script, actions).await
}

fn parse_nodes(opts: &FleetOpts) -> Result<Vec<NodeAddress>> {
    let peers = PeerSet::parse_list(&opts.nodes).context("invalid --nodes list")?;
    Ok(peers.iter().cloned().collect())
}

async fn execute(
    opts: &FleetOpts,
    label: &str,
    actions: Vec<(NodeAddress, String)>,
) -> Result<()> {
    let report = if opts.local {
        FleetExecutor::new(LocalChannel)
            .with_parallelism(opts.parallelism)
            .run_each(label, actions)
            .await
    } else {
        let channel = SshChannel { key: opts.ssh.ssh_key.clone(), user: opts.ssh.ssh_user.clone() };
        FleetExecutor::new(channel)
            .with_parallelism(opts.parallelism)
            .run_each(label, actions)
            .await
    };
    report_and_exit(opts.format, report)
}

fn report_and_exit(format: Format, report: FleetReport) -> Result<()> {
    match format {
        Format::Json => println!("{}", report.to_json()?),
        Format::Text => {
            for outcome in &report.outcomes {
                if outcome.ok {
                    info!(node = %outcome.node, command = %report.command, "ok");
                } else {
                    let reason = outcome
                        .error
                        .clone()
                        .unwrap_or_else(|| format!("exit {}", outcome.status.unwrap_or(-1)));
                    if outcome.stderr.is_empty() {
                        eprintln!("{}: failed ({reason})", outcome.node);
                    } else {
                        eprintln!("{}: failed ({reason})\n{}", outcome.node, outcome.stderr.trim_end());
                    }
                }
            }
        }
    }
    // Partial failure surfaces as a non-zero exit; completed nodes are
    // not rolled back.
    if !report.ok() {
        std::process::exit(report.exit_code());
    }
    Ok(())
}
