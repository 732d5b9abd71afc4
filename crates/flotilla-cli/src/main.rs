use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(
    name = "flotilla",
    about = "flotilla — co-located storage + transfer cluster provisioner",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision per-node directories and fleet scripts.
    ///
    /// Every host in the fleet should run this with the same --nodes
    /// list; use --listen to materialize only this host's directory
    /// while keeping the seed membership complete.
    Provision {
        /// Comma-separated host[:port] list of all non-admin nodes.
        /// Must include self.
        #[arg(short, long)]
        nodes: String,
        /// Base directory the node directories are created under
        #[arg(short, long)]
        dir: PathBuf,
        /// Only provision the node bound to this host
        #[arg(short, long)]
        listen: Option<String>,
        /// Install path of the daemon binaries
        #[arg(long, default_value = "/opt/flotilla")]
        install_dir: PathBuf,
        /// Pin the transfer-protocol port (e.g. 6881) instead of base+2
        #[arg(long)]
        transfer_port: Option<u16>,
        /// Directory of template documents (defaults to built-ins)
        #[arg(long)]
        templates: Option<PathBuf>,
        /// Also provision an admin-client directory under <dir>/cli
        #[arg(long)]
        admin_cli: bool,
        #[command(flatten)]
        ssh: SshOpts,
    },
    /// Provision a loopback development cluster.
    Local {
        /// Number of nodes
        #[arg(short = 'n', long)]
        count: u8,
        /// Cluster id; keeps concurrent local clusters' ports disjoint
        #[arg(short, long, default_value_t = 0)]
        cluster_id: u8,
        #[arg(short, long)]
        dir: PathBuf,
        #[arg(long)]
        install_dir: Option<PathBuf>,
        #[arg(long)]
        admin_cli: bool,
    },
    /// Run one lifecycle action (or command) across the fleet.
    Fleet {
        #[command(subcommand)]
        action: FleetAction,
    },
    /// Deliver a transfer-completion callback by hand.
    Notify {
        /// Completed item name
        #[arg(long)]
        name: String,
        /// File the item landed in
        #[arg(long)]
        file: String,
        /// Callback endpoint, host:port
        #[arg(long, default_value = "127.0.0.1:2024")]
        addr: String,
    },
    /// Wait until an HTTP endpoint answers, with bounded backoff.
    Probe {
        /// Target, host:port
        #[arg(long)]
        addr: String,
        #[arg(long, default_value = "/")]
        path: String,
        /// Overall deadline in seconds
        #[arg(long, default_value_t = 60)]
        deadline_secs: u64,
    },
}

#[derive(Subcommand)]
enum FleetAction {
    /// Start every node (transfer daemon, readiness gate, storage daemon)
    Start(FleetOpts),
    /// Stop every node
    Stop(FleetOpts),
    /// Restart every node
    Restart(FleetOpts),
    /// Run an arbitrary command on every node
    Run {
        #[arg(long)]
        command: String,
        #[command(flatten)]
        opts: FleetOpts,
    },
    /// Pull the latest build and reprovision each node in place
    Bootstrap(FleetOpts),
}

#[derive(clap::Args)]
struct FleetOpts {
    /// Comma-separated host[:port] list of all nodes
    #[arg(short, long)]
    nodes: String,
    /// Base directory of the node directories (as laid out on each host)
    #[arg(short, long)]
    dir: PathBuf,
    /// Run actions through a local shell instead of ssh
    #[arg(long)]
    local: bool,
    /// Concurrent node actions
    #[arg(long, default_value_t = 4)]
    parallelism: usize,
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
    #[command(flatten)]
    ssh: SshOpts,
}

#[derive(clap::Args)]
struct SshOpts {
    /// SSH identity file for the remote channel
    #[arg(long)]
    ssh_key: Option<PathBuf>,
    /// SSH user for the remote channel
    #[arg(long)]
    ssh_user: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("flotilla=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Provision {
            nodes,
            dir,
            listen,
            install_dir,
            transfer_port,
            templates,
            admin_cli,
            ssh,
        } => commands::provision::provision(
            &nodes,
            dir,
            listen,
            install_dir,
            transfer_port,
            templates,
            admin_cli,
            ssh.ssh_key,
            ssh.ssh_user,
        ),
        Commands::Local { count, cluster_id, dir, install_dir, admin_cli } => {
            commands::provision::local(count, cluster_id, dir, install_dir, admin_cli)
        }
        Commands::Fleet { action } => commands::fleet::run(action).await,
        Commands::Notify { name, file, addr } => commands::notify::notify(&addr, &name, &file).await,
        Commands::Probe { addr, path, deadline_secs } => {
            commands::notify::probe(&addr, &path, deadline_secs).await
        }
    }
}
