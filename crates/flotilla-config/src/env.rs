//! Process-environment include — `KEY=value` lines sourced by the
//! storage daemon's launcher.
//!
//! Only three variables are owned by the provisioner: the install path,
//! the per-node config path, and the remote-attach debug port. Each must
//! exist in the template; a missing variable is a template mismatch.

use std::path::Path;

use flotilla_core::PortAssignment;

use crate::error::{ConfigError, ConfigResult};

/// Install path of the daemon binaries, shared by all nodes on a host.
pub const HOME_VAR: &str = "FLOTILLA_HOME";
/// Per-node configuration directory.
pub const CONF_VAR: &str = "FLOTILLA_CONF";
/// Port a debugger may attach to on this node.
pub const DEBUG_PORT_VAR: &str = "DEBUG_ATTACH_PORT";

/// Render a node's environment include from the template.
pub fn render_env(
    template: &str,
    install_dir: &Path,
    conf_dir: &Path,
    assignment: &PortAssignment,
) -> ConfigResult<String> {
    let mut out = String::new();
    let mut seen = [false; 3];

    for raw in template.lines() {
        let trimmed = raw.trim_start();
        let replaced = match trimmed.split_once('=').map(|(k, _)| k.trim()) {
            Some(HOME_VAR) => {
                seen[0] = true;
                Some(format!("{HOME_VAR}={}", install_dir.display()))
            }
            Some(CONF_VAR) => {
                seen[1] = true;
                Some(format!("{CONF_VAR}={}", conf_dir.display()))
            }
            Some(DEBUG_PORT_VAR) => {
                seen[2] = true;
                Some(format!("{DEBUG_PORT_VAR}={}", assignment.management()))
            }
            _ => None,
        };
        out.push_str(replaced.as_deref().unwrap_or(raw));
        out.push('\n');
    }

    for (hit, var) in seen.iter().zip([HOME_VAR, CONF_VAR, DEBUG_PORT_VAR]) {
        if !hit {
            return Err(ConfigError::FieldMissing { field: var.to_string() });
        }
    }
    Ok(out)
}
