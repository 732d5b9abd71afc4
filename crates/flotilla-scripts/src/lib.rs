//! flotilla-scripts — per-node lifecycle script generation.
//!
//! Emits the shell text for a node's `start.sh`, `stop.sh`,
//! `restart.sh`, and (for the admin-client role) `cli.sh`. The scripts
//! encode the service lifecycle directly in shell:
//!
//! ```text
//! Stopped -> Starting -> Ready
//!               └-> Failed (readiness poll exhausted, non-zero exit)
//! ```
//!
//! Start ordering matters: the storage daemon's cluster join is gated
//! on the transfer daemon's control surface being reachable, because a
//! storage config field points at a callback URL the transfer daemon
//! serves. Stop and start are both idempotent so restart composes them
//! safely from any state.

pub mod builder;

pub use builder::{
    ScriptBuilder, CLI_SCRIPT, RESTART_SCRIPT, START_SCRIPT, STOP_SCRIPT, STORAGE_DAEMON,
    STORAGE_PIDFILE, TRANSFER_DAEMON, TRANSFER_PIDFILE,
};
