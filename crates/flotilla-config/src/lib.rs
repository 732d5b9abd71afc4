//! flotilla-config — per-service configuration rendering.
//!
//! Three documents are generated per node:
//!
//! - **storage** (`storage.rs`) — structured document; parse, patch the
//!   port/address/seed fields, serialize. Pass-through fields survive.
//! - **transfer** (`transfer.rs`) — flat `key: value` lines with four
//!   managed keys, including the completion-callback finish command.
//! - **env** (`env.rs`) — `KEY=value` include sourced at daemon launch.
//!
//! Rendering is side-effect free; writing the documents to node
//! directories is the coordinator's job.

pub mod env;
pub mod error;
pub mod storage;
pub mod templates;
pub mod transfer;

pub use env::render_env;
pub use error::{ConfigError, ConfigResult};
pub use storage::{parse_seeds, render_storage, StoragePatch};
pub use templates::Templates;
pub use transfer::{finish_command, render_transfer, FINISHED_ENDPOINT};
