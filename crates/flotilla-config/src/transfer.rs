//! Transfer daemon configuration — plain `key: value` lines.
//!
//! The transfer daemon reads a flat colon-separated config. Rendering
//! parses the template into an ordered entry list, drops the managed
//! keys, and appends a freshly generated block for them; comments and
//! unmanaged keys pass through verbatim in their original order.

use flotilla_core::{NodeAddress, PortAssignment};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Keys owned by the provisioner; any template value for these is
/// discarded.
const MANAGED_KEYS: [&str; 4] = ["finish_cmd", "bind_port", "webui_port", "bind_ip"];

/// Fixed endpoint path the completion callback is delivered to.
pub const FINISHED_ENDPOINT: &str = "/download-finished";

#[derive(Debug)]
enum Line {
    /// `key: value` pair; the raw text is kept for verbatim pass-through.
    Pair { key: String, raw: String },
    /// Comment or blank line.
    Other(String),
}

fn parse_lines(template: &str) -> Vec<Line> {
    template
        .lines()
        .map(|raw| {
            let trimmed = raw.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return Line::Other(raw.to_string());
            }
            match trimmed.split_once(':') {
                Some((key, _)) => Line::Pair { key: key.trim().to_string(), raw: raw.to_string() },
                None => Line::Other(raw.to_string()),
            }
        })
        .collect()
}

/// The shell command the transfer daemon runs when a download
/// completes: a callback to this node's orchestration endpoint naming
/// the finished item and its file.
///
/// Always uses the connect address — the finish hook is spawned on the
/// node itself and cannot dial the bind wildcard.
pub fn finish_command(node: &NodeAddress, assignment: &PortAssignment) -> String {
    format!(
        "curl -o /dev/null \"http://{}:{}{}?name=%N&file=%F\"",
        node.connect_address(),
        assignment.completion_callback(),
        FINISHED_ENDPOINT,
    )
}

/// Render a node's transfer config from the template document.
pub fn render_transfer(
    template: &str,
    node: &NodeAddress,
    assignment: &PortAssignment,
) -> ConfigResult<String> {
    if template.trim().is_empty() {
        return Err(ConfigError::Parse("empty transfer template".into()));
    }

    let mut out = String::new();
    for line in parse_lines(template) {
        match line {
            Line::Pair { key, .. } if MANAGED_KEYS.contains(&key.as_str()) => {}
            Line::Pair { raw, .. } | Line::Other(raw) => {
                out.push_str(&raw);
                out.push('\n');
            }
        }
    }

    out.push_str(&format!("finish_cmd: \"{}\"\n", finish_command(node, assignment)));
    out.push_str(&format!("bind_port: {}\n", assignment.transfer_peer()));
    out.push_str(&format!("webui_port: {}\n", assignment.transfer_webui()));
    out.push_str(&format!("bind_ip: \"{}\"\n", node.bind_address()));

    debug!(node = %node, "rendered transfer config");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::Templates;

    fn value_of<'a>(rendered: &'a str, key: &str) -> Option<&'a str> {
        rendered.lines().find_map(|l| {
            let (k, v) = l.split_once(':')?;
            (k.trim() == key).then(|| v.trim())
        })
    }

    #[test]
    fn managed_keys_are_rewritten() {
        let node = NodeAddress::new("10.0.0.5", 2020);
        let assignment = PortAssignment::allocate(2020);
        let out =
            render_transfer(&Templates::builtin().transfer().unwrap(), &node, &assignment).unwrap();
        assert_eq!(value_of(&out, "bind_port"), Some("2022"));
        assert_eq!(value_of(&out, "webui_port"), Some("2023"));
        assert_eq!(value_of(&out, "bind_ip"), Some("\"10.0.0.5\""));
    }

    #[test]
    fn managed_keys_appear_once() {
        let node = NodeAddress::new("10.0.0.5", 2020);
        let assignment = PortAssignment::allocate(2020);
        let out =
            render_transfer(&Templates::builtin().transfer().unwrap(), &node, &assignment).unwrap();
        for key in MANAGED_KEYS {
            let count = out
                .lines()
                .filter(|l| l.split_once(':').map(|(k, _)| k.trim()) == Some(key))
                .count();
            assert_eq!(count, 1, "{key} should appear exactly once");
        }
    }

    #[test]
    fn unmanaged_lines_pass_through_verbatim() {
        let template = "# note\nupnp: 0\nmax_active_downloads: 32\nbind_port: 9999\n";
        let node = NodeAddress::new("10.0.0.5", 2020);
        let assignment = PortAssignment::allocate(2020);
        let out = render_transfer(template, &node, &assignment).unwrap();
        assert!(out.contains("# note\n"));
        assert!(out.contains("upnp: 0\n"));
        assert!(out.contains("max_active_downloads: 32\n"));
        assert!(!out.contains("9999"));
    }

    #[test]
    fn finish_command_targets_connect_address() {
        let node = NodeAddress::wildcard(2020);
        let assignment = PortAssignment::allocate(2020);
        let cmd = finish_command(&node, &assignment);
        assert_eq!(
            cmd,
            "curl -o /dev/null \"http://127.0.0.1:2024/download-finished?name=%N&file=%F\""
        );
        assert!(!cmd.contains("0.0.0.0"));
    }

    #[test]
    fn transfer_port_override_flows_through() {
        let node = NodeAddress::new("10.0.0.5", 2020);
        let assignment = PortAssignment::allocate(2020).with_transfer_port(6881);
        let out =
            render_transfer(&Templates::builtin().transfer().unwrap(), &node, &assignment).unwrap();
        assert_eq!(value_of(&out, "bind_port"), Some("6881"));
    }

    #[test]
    fn empty_template_is_rejected() {
        let node = NodeAddress::new("10.0.0.5", 2020);
        let assignment = PortAssignment::allocate(2020);
        assert!(render_transfer("  \n", &node, &assignment).is_err());
    }
}
