//! Transfer-completion callback client.
//!
//! When the transfer daemon finishes a job, its finish hook calls back
//! into the node's orchestration endpoint naming the completed item and
//! the file it landed in. This is the same callback the generated
//! `finish_cmd` performs with curl; having it in-process lets operators
//! (and tests) fire it by hand. The acknowledgement body is returned to
//! be logged, never interpreted.

use http_body_util::BodyExt;
use tracing::debug;

use flotilla_config::FINISHED_ENDPOINT;

use crate::error::{FleetError, FleetResult};

/// Percent-encode a query/body value. Covers the reserved characters
/// that can appear in item names and file paths.
fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Notify the orchestration endpoint at `addr` (`host:port`, the
/// node's completion-callback port) that `name` finished downloading
/// into `file`. Returns the acknowledgement body.
pub async fn download_finished(addr: &str, name: &str, file: &str) -> FleetResult<String> {
    let body = format!("name={}&file={}", urlencode(name), urlencode(file));
    let uri = format!("http://{addr}{FINISHED_ENDPOINT}");

    let stream = tokio::net::TcpStream::connect(addr)
        .await
        .map_err(|_| FleetError::Unreachable { addr: addr.to_string() })?;
    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| FleetError::Channel { node: addr.to_string(), message: e.to_string() })?;
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let req = http::Request::builder()
        .method("POST")
        .uri(&uri)
        .header("host", addr)
        .header("content-type", "application/x-www-form-urlencoded")
        .header("content-length", body.len())
        .body(http_body_util::Full::new(bytes::Bytes::from(body)))
        .map_err(|e| FleetError::Channel { node: addr.to_string(), message: e.to_string() })?;

    let response = sender
        .send_request(req)
        .await
        .map_err(|e| FleetError::Channel { node: addr.to_string(), message: e.to_string() })?;
    debug!(%addr, status = %response.status(), "completion callback delivered");

    let collected = response
        .into_body()
        .collect()
        .await
        .map_err(|e| FleetError::Channel { node: addr.to_string(), message: e.to_string() })?;
    Ok(String::from_utf8_lossy(&collected.to_bytes()).into_owned())
}
