//! Shell generation for node lifecycle scripts.

use std::path::PathBuf;

use flotilla_core::{NodeAddress, PeerSet, PortAssignment};
use tracing::debug;

/// Executable name of the storage daemon.
pub const STORAGE_DAEMON: &str = "storaged";
/// Executable name of the transfer daemon.
pub const TRANSFER_DAEMON: &str = "transferd";
/// Executable name of the interactive storage client.
pub const STORAGE_CLI: &str = "storage-cli";

pub const STORAGE_PIDFILE: &str = "storaged.pid";
pub const TRANSFER_PIDFILE: &str = "transferd.pid";

pub const START_SCRIPT: &str = "start.sh";
pub const STOP_SCRIPT: &str = "stop.sh";
pub const RESTART_SCRIPT: &str = "restart.sh";
pub const CLI_SCRIPT: &str = "cli.sh";

/// Builds the lifecycle scripts for one node.
#[derive(Debug, Clone)]
pub struct ScriptBuilder {
    assignment: PortAssignment,
    node: NodeAddress,
    node_dir: PathBuf,
    install_dir: PathBuf,
    /// Readiness poll attempts (0.1 s apart) before giving up on the
    /// transfer daemon's web UI.
    readiness_tries: u32,
    /// Liveness poll attempts (0.1 s apart) waiting for a signalled
    /// process to leave the process table before escalating.
    stop_tries: u32,
}

impl ScriptBuilder {
    pub fn new(
        assignment: PortAssignment,
        node: NodeAddress,
        node_dir: impl Into<PathBuf>,
        install_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            assignment,
            node,
            node_dir: node_dir.into(),
            install_dir: install_dir.into(),
            readiness_tries: 300,
            stop_tries: 100,
        }
    }

    /// Bound on the readiness poll; readiness waits longer than stop
    /// liveness because daemon startup is the slow path.
    pub fn with_readiness_tries(mut self, tries: u32) -> Self {
        self.readiness_tries = tries;
        self
    }

    pub fn with_stop_tries(mut self, tries: u32) -> Self {
        self.stop_tries = tries;
        self
    }

    fn node_dir(&self) -> String {
        self.node_dir.display().to_string()
    }

    fn bin(&self, name: &str) -> String {
        self.install_dir.join("bin").join(name).display().to_string()
    }

    /// Common header: shell options, working directory, PID helpers.
    fn prelude(&self) -> String {
        format!(
            r#"#!/bin/bash
# Generated by flotilla; regenerated on reprovision. Do not edit.
set -u
NODE_DIR="{dir}"
cd "$NODE_DIR"

# A PID counts as live only while the process table entry still runs
# the expected executable; a reused PID must not.
pid_alive() {{
    local pid="$1" name="$2"
    [ -n "$pid" ] && [ "$(ps -p "$pid" -o comm= 2>/dev/null)" = "$name" ]
}}

# Missing PID file means already stopped. Signal, wait for the process
# to leave the table, escalate to SIGKILL when the wait is exhausted.
stop_service() {{
    local pidfile="$1" name="$2" pid tries=0
    [ -e "$pidfile" ] || return 0
    pid=$(cat "$pidfile")
    if ! pid_alive "$pid" "$name"; then
        rm -f "$pidfile"
        return 0
    fi
    kill "$pid"
    while pid_alive "$pid" "$name"; do
        tries=$((tries + 1))
        if [ "$tries" -gt {stop_tries} ]; then
            kill -9 "$pid" 2>/dev/null
            sleep 0.5
            if pid_alive "$pid" "$name"; then
                echo "failed to stop $name (pid $pid)" >&2
                return 1
            fi
            break
        fi
        sleep 0.1
    done
    rm -f "$pidfile"
    return 0
}}
"#,
            dir = self.node_dir(),
            stop_tries = self.stop_tries,
        )
    }

    /// Launch the transfer daemon (idempotently) and block until its
    /// web UI answers. Shared by the start and admin-cli scripts: the
    /// storage join and the interactive client both depend on it.
    fn transfer_startup(&self) -> String {
        format!(
            r#"
if [ -e "{pidfile}" ] && pid_alive "$(cat "{pidfile}")" {daemon}; then
    echo "{daemon} already running"
else
    "{bin}" -configfile "$NODE_DIR/transfer.conf" -daemon -pidfile "$NODE_DIR/{pidfile}"
fi

# Storage cluster join must not proceed until the transfer control
# surface answers; any response counts as ready.
tries=0
until curl -s -o /dev/null "http://{connect}:{webui}/" 2>/dev/null; do
    tries=$((tries + 1))
    if [ "$tries" -gt {readiness_tries} ]; then
        echo "{daemon} web UI at {connect}:{webui} not ready, giving up" >&2
        exit 1
    fi
    sleep 0.1
done
sleep 0.3
"#,
            pidfile = TRANSFER_PIDFILE,
            daemon = TRANSFER_DAEMON,
            bin = self.bin(TRANSFER_DAEMON),
            connect = self.node.connect_address(),
            webui = self.assignment.transfer_webui(),
            readiness_tries = self.readiness_tries,
        )
    }

    /// `start.sh` — transfer daemon first, readiness gate, then the
    /// storage daemon. A second invocation against a running node is a
    /// no-op success.
    pub fn start_script(&self) -> String {
        let mut script = self.prelude();
        script.push_str(&self.transfer_startup());
        script.push_str(&format!(
            r#"
if [ -e "{pidfile}" ] && pid_alive "$(cat "{pidfile}")" {daemon}; then
    echo "{daemon} already running"
    exit 0
fi
export FLOTILLA_INCLUDE="$NODE_DIR/node-env.sh"
"{bin}" -c "$NODE_DIR/conf/storage.toml" -p "$NODE_DIR/{pidfile}" "$@"
"#,
            pidfile = STORAGE_PIDFILE,
            daemon = STORAGE_DAEMON,
            bin = self.bin(STORAGE_DAEMON),
        ));
        debug!(node = %self.node, "built start script");
        script
    }

    /// `stop.sh` — stops both daemons; each missing PID file is
    /// "already stopped". Exit status ORs the two results.
    pub fn stop_script(&self) -> String {
        let mut script = self.prelude();
        script.push_str(&format!(
            r#"
rc=0
stop_service "{t_pidfile}" {t_daemon} || rc=1
stop_service "{s_pidfile}" {s_daemon} || rc=1
exit $rc
"#,
            t_pidfile = TRANSFER_PIDFILE,
            t_daemon = TRANSFER_DAEMON,
            s_pidfile = STORAGE_PIDFILE,
            s_daemon = STORAGE_DAEMON,
        ));
        script
    }

    /// `restart.sh` — stop then start; safe when nothing is running.
    pub fn restart_script(&self) -> String {
        format!(
            r#"#!/bin/bash
# Generated by flotilla; regenerated on reprovision. Do not edit.
set -u
NODE_DIR="{dir}"
"$NODE_DIR/{stop}" || exit 1
exec "$NODE_DIR/{start}" "$@"
"#,
            dir = self.node_dir(),
            stop = STOP_SCRIPT,
            start = START_SCRIPT,
        )
    }

    /// `cli.sh` — admin-client session.
    ///
    /// Launches the transfer daemon only as a transient helper, probes
    /// each peer's client port in order, runs the interactive client
    /// against the first responder, and stops probing after it. The
    /// EXIT trap kills the helper on every path, success or not.
    pub fn admin_cli_script(&self, peers: &PeerSet) -> String {
        let peer_list = peers
            .iter()
            .map(|p| {
                format!(
                    "\"{} {}\"",
                    p.connect_address(),
                    PortAssignment::allocate(p.base_port()).storage_client()
                )
            })
            .collect::<Vec<_>>()
            .join(" ");

        let mut script = self.prelude();
        script.push_str(&format!(
            r#"
cleanup() {{
    stop_service "{pidfile}" {daemon}
}}
trap cleanup EXIT
"#,
            pidfile = TRANSFER_PIDFILE,
            daemon = TRANSFER_DAEMON,
        ));
        script.push_str(&self.transfer_startup());
        script.push_str(&format!(
            r#"
probe_node() {{
    nc -z -w 2 "$1" "$2" >/dev/null 2>&1
}}

reached=0
rc=1
for node in {peer_list}; do
    host=${{node%% *}}
    port=${{node##* }}
    if probe_node "$host" "$port"; then
        reached=1
        "{cli}" --host "$host" --port "$port" "$@"
        rc=$?
        break
    fi
done
if [ "$reached" -eq 0 ]; then
    echo "no reachable peer among: {peer_list}" >&2
    exit 1
fi
exit $rc
"#,
            peer_list = peer_list,
            cli = self.bin(STORAGE_CLI),
        ));
        debug!(node = %self.node, peers = peers.len(), "built admin cli script");
        script
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> ScriptBuilder {
        ScriptBuilder::new(
            PortAssignment::allocate(2020),
            NodeAddress::new("10.0.0.1", 2020),
            "/srv/flotilla/0",
            "/opt/flotilla",
        )
    }

    #[test]
    fn stop_treats_missing_pidfile_as_stopped() {
        let script = builder().stop_script();
        assert!(script.contains("[ -e \"$pidfile\" ] || return 0"));
        assert!(script.contains("stop_service \"transferd.pid\" transferd"));
        assert!(script.contains("stop_service \"storaged.pid\" storaged"));
    }

    #[test]
    fn stop_liveness_wait_is_bounded() {
        let script = builder().with_stop_tries(7).stop_script();
        assert!(script.contains("[ \"$tries\" -gt 7 ]"));
        assert!(script.contains("kill -9"));
    }

    #[test]
    fn pid_check_matches_executable_name() {
        let script = builder().stop_script();
        assert!(script.contains("ps -p \"$pid\" -o comm="));
    }

    #[test]
    fn start_is_idempotent_when_already_running() {
        let script = builder().start_script();
        assert!(script.contains("storaged already running"));
        assert!(script.contains("transferd already running"));
        // Already-running is a success, not an error.
        assert!(script.contains("already running\"\n    exit 0"));
    }

    #[test]
    fn storage_start_is_gated_on_transfer_readiness() {
        let script = builder().start_script();
        let probe = script.find("until curl -s -o /dev/null").unwrap();
        let storage = script.find("/opt/flotilla/bin/storaged").unwrap();
        assert!(probe < storage, "readiness gate must precede storage launch");
        assert!(script.contains("http://10.0.0.1:2023/"));
    }

    #[test]
    fn readiness_poll_is_bounded_and_fails_loudly() {
        let script = builder().with_readiness_tries(50).start_script();
        assert!(script.contains("[ \"$tries\" -gt 50 ]"));
        assert!(script.contains("not ready, giving up"));
    }

    #[test]
    fn wildcard_node_probes_loopback() {
        let b = ScriptBuilder::new(
            PortAssignment::allocate(2020),
            NodeAddress::wildcard(2020),
            "/srv/flotilla/0",
            "/opt/flotilla",
        );
        assert!(b.start_script().contains("http://127.0.0.1:2023/"));
    }

    #[test]
    fn restart_composes_stop_then_start() {
        let script = builder().restart_script();
        let stop = script.find("stop.sh").unwrap();
        let start = script.find("start.sh").unwrap();
        assert!(stop < start);
    }

    #[test]
    fn admin_cli_probes_peers_in_order_and_breaks() {
        let peers = PeerSet::parse_list("10.0.0.1:2020,10.0.0.2:2030,10.0.0.3:2040").unwrap();
        let script = builder().admin_cli_script(&peers);
        let p1 = script.find("\"10.0.0.1 2020\"").unwrap();
        let p2 = script.find("\"10.0.0.2 2030\"").unwrap();
        let p3 = script.find("\"10.0.0.3 2040\"").unwrap();
        assert!(p1 < p2 && p2 < p3);
        // First responder wins; later peers are never attempted.
        assert!(script.contains("break"));
    }

    #[test]
    fn admin_cli_always_kills_the_helper() {
        let peers = PeerSet::parse_list("10.0.0.1:2020").unwrap();
        let script = builder().admin_cli_script(&peers);
        assert!(script.contains("trap cleanup EXIT"));
        // The trap is installed before the helper is launched.
        let trap = script.find("trap cleanup EXIT").unwrap();
        let launch = script.find("-daemon -pidfile").unwrap();
        assert!(trap < launch);
    }

    #[test]
    fn admin_cli_forwards_args_without_staging_an_array() {
        let peers = PeerSet::parse_list("10.0.0.1:2020").unwrap();
        let script = builder().admin_cli_script(&peers);
        // Under `set -u`, expanding an empty array errors on bash < 4.4,
        // so arguments go straight through as "$@".
        assert!(script.contains("--port \"$port\" \"$@\""));
        assert!(!script.contains("CLIENT_ARGS"));
    }

    #[test]
    fn admin_cli_fails_when_no_peer_responds() {
        let peers = PeerSet::parse_list("10.0.0.1:2020").unwrap();
        let script = builder().admin_cli_script(&peers);
        assert!(script.contains("no reachable peer"));
        assert!(script.contains("exit 1"));
    }
}
