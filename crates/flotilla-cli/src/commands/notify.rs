//! `flotilla notify` / `flotilla probe` — node-side HTTP helpers.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use flotilla_fleet::{notify, wait_ready, RetryPolicy};

/// Deliver a completion callback by hand (the generated `finish_cmd`
/// does the same thing with curl). The acknowledgement is logged, not
/// interpreted.
pub async fn notify(addr: &str, name: &str, file: &str) -> Result<()> {
    let ack = notify::download_finished(addr, name, file)
        .await
        .with_context(|| format!("callback to {addr} failed"))?;
    info!(%addr, %name, %file, ack = %ack.trim_end(), "completion callback acknowledged");
    Ok(())
}

/// Block until an endpoint answers HTTP, or fail with a timeout.
pub async fn probe(addr: &str, path: &str, deadline_secs: u64) -> Result<()> {
    let policy = RetryPolicy {
        deadline: Duration::from_secs(deadline_secs),
        ..RetryPolicy::readiness()
    };
    wait_ready(addr, path, &policy).await?;
    info!(%addr, "ready");
    Ok(())
}
