//! Storage daemon configuration — structural patching.
//!
//! The storage config is a structured document. Rendering parses the
//! template, patches the node-specific fields in place, and serializes
//! the whole document back out; no substring rewriting. Fields outside
//! the patch list below survive byte-for-byte in value terms, so a
//! deployment can carry tuning knobs in its template without the
//! provisioner knowing about them.
//!
//! Every patched field must already exist in the template. A missing
//! field means the template and this renderer disagree about the config
//! schema — that is surfaced immediately rather than silently skipped.

use std::path::Path;

use flotilla_core::{NodeAddress, PeerSet, PortAssignment};
use toml::Value;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Everything the storage renderer needs to know about one node.
#[derive(Debug, Clone, Copy)]
pub struct StoragePatch<'a> {
    pub assignment: &'a PortAssignment,
    pub node: &'a NodeAddress,
    pub peers: &'a PeerSet,
    /// Per-node working directory; data directories land under
    /// `<node_dir>/active-data`.
    pub node_dir: &'a Path,
}

/// Render a node's storage config from the template document.
pub fn render_storage(template: &str, patch: &StoragePatch<'_>) -> ConfigResult<String> {
    let mut doc: Value = template
        .parse()
        .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;

    let p = patch.assignment;
    let n = patch.node;
    let data_root = patch.node_dir.join("active-data");

    set_int(&mut doc, "storage_port", p.storage_data() as i64)?;
    set_str(&mut doc, "listen_address", n.listen_field())?;
    set_int(&mut doc, "client_port", p.storage_client() as i64)?;
    set_str(&mut doc, "client_address", n.bind_address())?;
    set_int(&mut doc, "callback_port", p.completion_callback() as i64)?;
    set_str(&mut doc, "callback_address", n.bind_address())?;
    set_int(&mut doc, "webui_port", p.transfer_webui() as i64)?;
    // The web UI is dialed, not bound, so the wildcard must not leak in.
    set_str(&mut doc, "webui_address", n.connect_address())?;

    set_str(&mut doc, "data_dir", &data_root.join("data").to_string_lossy())?;
    set_str(&mut doc, "commitlog_dir", &data_root.join("commitlog").to_string_lossy())?;
    set_str(&mut doc, "saved_caches_dir", &data_root.join("saved_caches").to_string_lossy())?;

    // Seed list is replaced wholesale with the full membership.
    let seeds = Value::Array(
        patch.peers.seed_addresses().into_iter().map(Value::String).collect(),
    );
    set_value(&mut doc, "seeds", seeds)?;

    debug!(node = %n, peers = patch.peers.len(), "rendered storage config");
    toml::to_string_pretty(&doc).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Read the seed list back out of a rendered (or template) document.
pub fn parse_seeds(doc: &str) -> ConfigResult<Vec<String>> {
    let doc: Value = doc
        .parse()
        .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;
    let seeds = doc
        .get("seeds")
        .and_then(Value::as_array)
        .ok_or_else(|| ConfigError::FieldMissing { field: "seeds".into() })?;
    Ok(seeds
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect())
}

fn set_value(doc: &mut Value, field: &str, value: Value) -> ConfigResult<()> {
    let table = doc
        .as_table_mut()
        .ok_or_else(|| ConfigError::Parse("top level is not a table".into()))?;
    match table.get_mut(field) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(ConfigError::FieldMissing { field: field.to_string() }),
    }
}

fn set_int(doc: &mut Value, field: &str, value: i64) -> ConfigResult<()> {
    set_value(doc, field, Value::Integer(value))
}

fn set_str(doc: &mut Value, field: &str, value: &str) -> ConfigResult<()> {
    set_value(doc, field, Value::String(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::Templates;
    use std::path::PathBuf;

    fn patch_parts(host: &str, base: u16) -> (PortAssignment, NodeAddress, PeerSet, PathBuf) {
        (
            PortAssignment::allocate(base),
            NodeAddress::new(host, base),
            PeerSet::parse_list("10.0.0.1:2020,10.0.0.2:2030,10.0.0.3:2040").unwrap(),
            PathBuf::from("/srv/flotilla/0"),
        )
    }

    fn render(host: &str, base: u16) -> String {
        let (assignment, node, peers, dir) = patch_parts(host, base);
        let patch = StoragePatch {
            assignment: &assignment,
            node: &node,
            peers: &peers,
            node_dir: &dir,
        };
        render_storage(&Templates::builtin().storage().unwrap(), &patch).unwrap()
    }

    #[test]
    fn patches_ports_and_addresses() {
        let out = render("10.0.0.1", 2020);
        let doc: Value = out.parse().unwrap();
        assert_eq!(doc["storage_port"].as_integer(), Some(7000));
        assert_eq!(doc["client_port"].as_integer(), Some(2020));
        assert_eq!(doc["callback_port"].as_integer(), Some(2024));
        assert_eq!(doc["webui_port"].as_integer(), Some(2023));
        assert_eq!(doc["listen_address"].as_str(), Some("10.0.0.1"));
        assert_eq!(doc["client_address"].as_str(), Some("10.0.0.1"));
    }

    #[test]
    fn wildcard_node_listens_everywhere_but_dials_loopback() {
        let out = render("0.0.0.0", 2020);
        let doc: Value = out.parse().unwrap();
        assert_eq!(doc["listen_address"].as_str(), Some(""));
        assert_eq!(doc["client_address"].as_str(), Some("0.0.0.0"));
        assert_eq!(doc["webui_address"].as_str(), Some("127.0.0.1"));
    }

    #[test]
    fn seed_list_round_trips_full_membership() {
        let out = render("10.0.0.1", 2020);
        let seeds = parse_seeds(&out).unwrap();
        assert_eq!(seeds, vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
    }

    #[test]
    fn pass_through_fields_survive_unchanged() {
        let template = Templates::builtin().storage().unwrap();
        let out = render("10.0.0.1", 2020);
        let before: Value = template.parse().unwrap();
        let after: Value = out.parse().unwrap();
        for key in ["cluster_name", "auto_bootstrap", "client_timeout_ms", "memtable", "compaction"] {
            assert_eq!(before[key], after[key], "field {key} was disturbed");
        }
    }

    #[test]
    fn data_directories_land_under_node_dir() {
        let out = render("10.0.0.1", 2020);
        let doc: Value = out.parse().unwrap();
        assert_eq!(
            doc["commitlog_dir"].as_str(),
            Some("/srv/flotilla/0/active-data/commitlog")
        );
    }

    #[test]
    fn missing_field_is_a_template_mismatch() {
        let (assignment, node, peers, dir) = patch_parts("10.0.0.1", 2020);
        let patch = StoragePatch {
            assignment: &assignment,
            node: &node,
            peers: &peers,
            node_dir: &dir,
        };
        // A template from some other schema version.
        let err = render_storage("cluster_name = \"x\"\n", &patch).unwrap_err();
        assert!(matches!(err, ConfigError::FieldMissing { .. }));
    }

    #[test]
    fn unparseable_template_is_a_parse_error() {
        let (assignment, node, peers, dir) = patch_parts("10.0.0.1", 2020);
        let patch = StoragePatch {
            assignment: &assignment,
            node: &node,
            peers: &peers,
            node_dir: &dir,
        };
        let err = render_storage("not [valid", &patch).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
