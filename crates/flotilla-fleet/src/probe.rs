//! HTTP readiness probing with bounded exponential backoff.
//!
//! A probe target is "ready" as soon as it answers HTTP at all; the
//! status code is irrelevant (the transfer daemon's web UI may 401 an
//! unauthenticated GET and still be perfectly up). Every wait point is
//! bounded: a probe that never answers produces a typed timeout error
//! instead of polling forever.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{FleetError, FleetResult};

/// Backoff and deadline bounds for one polling call site.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// First delay between attempts.
    pub initial: Duration,
    /// Backoff cap; delays double up to this.
    pub max: Duration,
    /// Hard deadline for the whole wait.
    pub deadline: Duration,
    /// Per-attempt probe timeout.
    pub probe_timeout: Duration,
}

impl RetryPolicy {
    /// Waiting for a daemon to come up — the slow path, generous.
    pub fn readiness() -> Self {
        Self {
            initial: Duration::from_millis(200),
            max: Duration::from_secs(5),
            deadline: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(2),
        }
    }

    /// Checking whether something is already up — fail fast.
    pub fn liveness() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(1),
            deadline: Duration::from_secs(5),
            probe_timeout: Duration::from_millis(500),
        }
    }

    /// The delay sequence: doubling from `initial`, capped at `max`.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        std::iter::successors(Some(self.initial), |d| Some((*d * 2).min(self.max)))
    }
}

/// One HTTP GET against `http://{addr}{path}`. Any response counts.
pub async fn http_probe(addr: &str, path: &str, timeout: Duration) -> bool {
    let uri = format!("http://{addr}{path}");

    let attempt = tokio::time::timeout(timeout, async {
        let stream = match tokio::net::TcpStream::connect(addr).await {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, %uri, "probe connection failed");
                return false;
            }
        };

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, %uri, "probe handshake failed");
                return false;
            }
        };
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(&uri)
            .header("host", addr)
            .header("user-agent", "flotilla-fleet/0.1")
            .body(http_body_util::Empty::<bytes::Bytes>::new());
        let req = match req {
            Ok(r) => r,
            Err(_) => return false,
        };

        match sender.send_request(req).await {
            // Responding at all is readiness; the payload is not ours
            // to interpret.
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, %uri, "probe request failed");
                false
            }
        }
    })
    .await;

    attempt.unwrap_or(false)
}

/// Poll `addr` until it answers HTTP or the policy's deadline expires.
pub async fn wait_ready(addr: &str, path: &str, policy: &RetryPolicy) -> FleetResult<()> {
    let start = Instant::now();
    let mut delay = policy.initial;

    loop {
        if http_probe(addr, path, policy.probe_timeout).await {
            debug!(%addr, waited = ?start.elapsed(), "endpoint ready");
            return Ok(());
        }
        if start.elapsed() + delay > policy.deadline {
            return Err(FleetError::ReadinessTimeout {
                addr: addr.to_string(),
                waited: start.elapsed(),
            });
        }
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(policy.max);
    }
}
