//! Error types for fleet operations.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for fleet operations.
pub type FleetResult<T> = Result<T, FleetError>;

/// Errors that can occur while provisioning or driving the fleet.
#[derive(Debug, Error)]
pub enum FleetError {
    /// Config rendering failed for one node; fatal to that node only.
    #[error("provisioning {node} failed: {source}")]
    Provision {
        node: String,
        #[source]
        source: flotilla_config::ConfigError,
    },

    /// A readiness probe exhausted its deadline.
    #[error("{addr} not ready after {waited:?}")]
    ReadinessTimeout { addr: String, waited: Duration },

    /// No peer answered a liveness probe.
    #[error("no reachable peer at {addr}")]
    Unreachable { addr: String },

    /// The remote-execution channel itself failed (spawn error,
    /// malformed output); distinct from the remote command failing.
    #[error("remote channel error for {node}: {message}")]
    Channel { node: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
