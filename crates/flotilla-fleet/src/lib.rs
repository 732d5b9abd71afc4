//! flotilla-fleet — cluster coordination and fleet-wide actions.
//!
//! # Architecture
//!
//! ```text
//! Coordinator
//!   ├── ProvisionPlan (nodes, dirs, templates, port pins)
//!   ├── flotilla-config renderers (per-node documents)
//!   ├── flotilla-scripts builder (per-node lifecycle scripts)
//!   └── aggregate scripts (startall/stopall/restartall/runall/copyall)
//!
//! FleetExecutor
//!   ├── RemoteChannel (ssh per host, or local shell)
//!   └── bounded worker pool → FleetReport (per-node outcomes, OR'd exit)
//! ```
//!
//! Provisioning and fan-out never roll back: one node's failure is
//! captured in the report and the rest of the fleet is still attempted.

pub mod coordinator;
pub mod error;
pub mod executor;
pub mod notify;
pub mod plan;
pub mod probe;

pub use coordinator::{Coordinator, ExecStyle, ProvisionOutcome, ProvisionReport};
pub use error::{FleetError, FleetResult};
pub use executor::{
    CommandOutput, FleetExecutor, FleetReport, LocalChannel, NodeOutcome, RemoteChannel, SshChannel,
};
pub use plan::ProvisionPlan;
pub use probe::{http_probe, wait_ready, RetryPolicy};
