//! Fleet fan-out — one action across many nodes, bounded concurrency.
//!
//! Actions go out through a [`RemoteChannel`]; per-node failures are
//! captured, never propagated early, so a dead node cannot block or
//! cancel the rest of the fleet. The report's exit code is the logical
//! OR of per-node failures. Nothing is rolled back.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use flotilla_core::NodeAddress;

use crate::error::{FleetError, FleetResult};

/// Captured result of running one command on one node.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// One authenticated per-host command channel.
pub trait RemoteChannel: Send + Sync + 'static {
    /// Run `command` on `node`, capturing its output. An `Err` means
    /// the channel itself broke; a non-zero status means the remote
    /// command failed.
    fn run(
        &self,
        node: &NodeAddress,
        command: &str,
    ) -> impl Future<Output = FleetResult<CommandOutput>> + Send;
}

/// `ssh` channel — one host per node, optional identity file and user.
#[derive(Debug, Clone, Default)]
pub struct SshChannel {
    pub key: Option<std::path::PathBuf>,
    pub user: Option<String>,
}

impl RemoteChannel for SshChannel {
    async fn run(&self, node: &NodeAddress, command: &str) -> FleetResult<CommandOutput> {
        let mut cmd = tokio::process::Command::new("ssh");
        cmd.arg("-o").arg("BatchMode=yes");
        if let Some(key) = &self.key {
            cmd.arg("-i").arg(key);
        }
        let target = match &self.user {
            Some(user) => format!("{user}@{}", node.connect_address()),
            None => node.connect_address().to_string(),
        };
        cmd.arg(target).arg(command);

        let output = cmd.output().await.map_err(|e| FleetError::Channel {
            node: node.to_string(),
            message: e.to_string(),
        })?;
        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Runs commands in a local shell; used for loopback clusters.
#[derive(Debug, Clone, Default)]
pub struct LocalChannel;

impl RemoteChannel for LocalChannel {
    async fn run(&self, node: &NodeAddress, command: &str) -> FleetResult<CommandOutput> {
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
            .map_err(|e| FleetError::Channel {
                node: node.to_string(),
                message: e.to_string(),
            })?;
        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Per-node entry in a fleet report.
#[derive(Debug, Serialize)]
pub struct NodeOutcome {
    pub node: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

/// Aggregated result of one fleet-wide action.
#[derive(Debug, Serialize)]
pub struct FleetReport {
    pub command: String,
    pub outcomes: Vec<NodeOutcome>,
}

impl FleetReport {
    pub fn ok(&self) -> bool {
        self.outcomes.iter().all(|o| o.ok)
    }

    /// Logical OR of per-node failures.
    pub fn exit_code(&self) -> i32 {
        if self.ok() { 0 } else { 1 }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Issues one command to every node through a bounded worker pool.
pub struct FleetExecutor<C> {
    channel: Arc<C>,
    parallelism: usize,
}

impl<C: RemoteChannel> FleetExecutor<C> {
    pub fn new(channel: C) -> Self {
        Self { channel: Arc::new(channel), parallelism: 4 }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Fan `command` out across `nodes`. Outcomes come back in input
    /// order regardless of completion order.
    pub async fn run(&self, nodes: &[NodeAddress], command: &str) -> FleetReport {
        let actions: Vec<(NodeAddress, String)> = nodes
            .iter()
            .map(|n| (n.clone(), command.to_string()))
            .collect();
        self.run_each(command, actions).await
    }

    /// Fan out with a per-node command (lifecycle scripts embed the
    /// node's index; bootstrap embeds its bind host). `label` names the
    /// action in the report.
    pub async fn run_each(
        &self,
        label: &str,
        actions: Vec<(NodeAddress, String)>,
    ) -> FleetReport {
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut handles = Vec::with_capacity(actions.len());
        let nodes: Vec<NodeAddress> = actions.iter().map(|(n, _)| n.clone()).collect();

        for (node, command) in actions {
            let channel = Arc::clone(&self.channel);
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return (node.clone(), Err(FleetError::Channel {
                            node: node.to_string(),
                            message: e.to_string(),
                        }));
                    }
                };
                let result = channel.run(&node, &command).await;
                (node, result)
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (node, handle) in nodes.iter().zip(handles) {
            let outcome = match handle.await {
                Ok((node, Ok(output))) => {
                    if output.success() {
                        info!(node = %node, "fleet action succeeded");
                    } else {
                        warn!(node = %node, status = output.status, "fleet action failed");
                    }
                    NodeOutcome {
                        node: node.to_string(),
                        ok: output.success(),
                        status: Some(output.status),
                        error: None,
                        stderr: output.stderr,
                    }
                }
                Ok((node, Err(e))) => {
                    warn!(node = %node, error = %e, "fleet channel failed");
                    NodeOutcome {
                        node: node.to_string(),
                        ok: false,
                        status: None,
                        error: Some(e.to_string()),
                        stderr: String::new(),
                    }
                }
                Err(join_error) => NodeOutcome {
                    node: node.to_string(),
                    ok: false,
                    status: None,
                    error: Some(format!("fleet task failed: {join_error}")),
                    stderr: String::new(),
                },
            };
            outcomes.push(outcome);
        }

        FleetReport { command: label.to_string(), outcomes }
    }
}
