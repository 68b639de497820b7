//! Node inventory loading.
//!
//! Nodes come from `<PREFIX>_GPU_COUNT`, `<PREFIX>_SCALE_UP_ENDPOINT` and
//! `<PREFIX>_SCALE_DOWN_ENDPOINT` variables and, optionally, from a YAML/JSON
//! file. Every entry is validated on its own: a broken entry is logged and
//! dropped, only an inventory with no valid node at all is an error.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::path::Path;

use error_stack::Report;
use error_stack::ResultExt;
use serde::Deserialize;
use tracing::info;
use tracing::warn;
use url::Url;

use crate::config::ConfigError;
use crate::domain::GpuNode;
use crate::domain::NodeInventory;

const GPU_COUNT_SUFFIX: &str = "_GPU_COUNT";
const SCALE_UP_SUFFIX: &str = "_SCALE_UP_ENDPOINT";
const SCALE_DOWN_SUFFIX: &str = "_SCALE_DOWN_ENDPOINT";

/// One record of the inventory file. All fields are optional so that a single
/// incomplete record does not reject the whole file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeEntry {
    name: Option<String>,
    gpu_count: Option<StringOrInt>,
    scale_up_endpoint: Option<String>,
    scale_down_endpoint: Option<String>,
}

/// Accepts both `gpuCount: 4` and `gpuCount: "4"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrInt {
    String(String),
    Int(i64),
}

impl StringOrInt {
    fn into_string(self) -> String {
        match self {
            StringOrInt::String(s) => s,
            StringOrInt::Int(i) => i.to_string(),
        }
    }
}

/// Build the inventory from the optional file and the given environment.
///
/// File entries come first, then environment entries ordered by prefix. The
/// first occurrence of a name wins.
///
/// # Errors
///
/// - [`ConfigError::FileUnreadable`] / [`ConfigError::FileMalformed`] if `nodes_file` is unusable
/// - [`ConfigError::NoValidNodes`] if nothing valid remains
pub fn load_inventory<I>(
    nodes_file: Option<&Path>,
    env: I,
) -> Result<NodeInventory, Report<ConfigError>>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut candidates = match nodes_file {
        Some(path) => nodes_from_file(path)?,
        None => Vec::new(),
    };
    candidates.extend(nodes_from_env(env));

    let mut seen = HashSet::new();
    let nodes: Vec<GpuNode> = candidates
        .into_iter()
        .filter(|node| {
            let fresh = seen.insert(node.name.clone());
            if !fresh {
                warn!(
                    "Skipping node: {}",
                    ConfigError::Duplicate {
                        name: node.name.clone()
                    }
                );
            }
            fresh
        })
        .collect();

    let inventory = NodeInventory::new(nodes)?;
    info!(
        nodes = inventory.len(),
        total_gpus = inventory.total_gpus(),
        "Loaded GPU node inventory"
    );
    Ok(inventory)
}

/// Nodes declared through `<PREFIX>_GPU_COUNT` style variables.
pub fn nodes_from_env<I>(env: I) -> Vec<GpuNode>
where
    I: IntoIterator<Item = (String, String)>,
{
    let vars: BTreeMap<String, String> = env.into_iter().collect();
    let lookup = |key: String| vars.get(&key).map(String::as_str).unwrap_or_default();

    vars.keys()
        .filter_map(|key| key.strip_suffix(GPU_COUNT_SUFFIX))
        .filter(|prefix| !prefix.is_empty())
        .filter_map(|prefix| {
            let node = build_node(
                prefix,
                lookup(format!("{prefix}{GPU_COUNT_SUFFIX}")),
                lookup(format!("{prefix}{SCALE_UP_SUFFIX}")),
                lookup(format!("{prefix}{SCALE_DOWN_SUFFIX}")),
            );
            keep_valid(node)
        })
        .collect()
}

/// Nodes declared in a YAML (or JSON) sequence.
///
/// # Errors
///
/// - [`ConfigError::FileUnreadable`] if the file cannot be read
/// - [`ConfigError::FileMalformed`] if the document is not a sequence
pub fn nodes_from_file(path: &Path) -> Result<Vec<GpuNode>, Report<ConfigError>> {
    let content = std::fs::read_to_string(path).change_context(ConfigError::FileUnreadable {
        path: path.display().to_string(),
    })?;
    nodes_from_str(&content, &path.display().to_string())
}

fn nodes_from_str(content: &str, source: &str) -> Result<Vec<GpuNode>, Report<ConfigError>> {
    let malformed = || ConfigError::FileMalformed {
        path: source.to_string(),
    };
    let entries: Vec<serde_yaml::Value> =
        serde_yaml::from_str(content).change_context_lazy(malformed)?;

    Ok(entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| {
            let entry = match serde_yaml::from_value::<NodeEntry>(value) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping node entry #{index}: {e}");
                    return None;
                }
            };
            keep_valid(entry_to_node(index, entry))
        })
        .collect())
}

fn entry_to_node(index: usize, entry: NodeEntry) -> Result<GpuNode, Report<ConfigError>> {
    let name = entry
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ConfigError::Incomplete {
            name: format!("entry #{index}"),
            field: "name",
        })?;
    let gpu_count = entry.gpu_count.map(StringOrInt::into_string);

    build_node(
        &name,
        gpu_count.as_deref().unwrap_or_default(),
        entry.scale_up_endpoint.as_deref().unwrap_or_default(),
        entry.scale_down_endpoint.as_deref().unwrap_or_default(),
    )
}

fn keep_valid(node: Result<GpuNode, Report<ConfigError>>) -> Option<GpuNode> {
    match node {
        Ok(node) => Some(node),
        Err(e) => {
            warn!("Skipping node: {}", e.current_context());
            None
        }
    }
}

fn build_node(
    name: &str,
    gpu_count: &str,
    scale_up: &str,
    scale_down: &str,
) -> Result<GpuNode, Report<ConfigError>> {
    let name = name.trim();
    for (field, value) in [
        ("gpu count", gpu_count),
        ("scale-up endpoint", scale_up),
        ("scale-down endpoint", scale_down),
    ] {
        if value.trim().is_empty() {
            return Err(Report::new(ConfigError::Incomplete {
                name: name.to_string(),
                field,
            }));
        }
    }

    let gpu_count = gpu_count
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|count| *count > 0)
        .ok_or_else(|| ConfigError::InvalidGpuCount {
            name: name.to_string(),
            value: gpu_count.to_string(),
        })?;

    Ok(GpuNode {
        name: name.to_string(),
        gpu_count,
        scale_up_target: parse_endpoint(name, "scale-up endpoint", scale_up)?,
        scale_down_target: parse_endpoint(name, "scale-down endpoint", scale_down)?,
    })
}

fn parse_endpoint(
    name: &str,
    field: &'static str,
    value: &str,
) -> Result<Url, Report<ConfigError>> {
    let invalid = || ConfigError::InvalidEndpoint {
        name: name.to_string(),
        field,
        value: value.to_string(),
    };

    let url = Url::parse(value.trim()).change_context_lazy(invalid)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(Report::new(invalid()).attach_printable(format!("unsupported scheme {scheme}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> Vec<(String, String)> {
        vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn names(nodes: &[GpuNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn env_nodes_are_parsed_in_prefix_order() {
        let nodes = nodes_from_env(env(&[
            ("RIG_B_GPU_COUNT", "8"),
            ("RIG_B_SCALE_UP_ENDPOINT", "http://power/b/on"),
            ("RIG_B_SCALE_DOWN_ENDPOINT", "http://power/b/off"),
            ("RIG_A_GPU_COUNT", "2"),
            ("RIG_A_SCALE_UP_ENDPOINT", "https://power/a/on"),
            ("RIG_A_SCALE_DOWN_ENDPOINT", "https://power/a/off"),
            ("PATH", "/usr/bin"),
        ]));

        assert_eq!(names(&nodes), vec!["RIG_A", "RIG_B"]);
        assert_eq!(nodes[0].gpu_count, 2);
        assert_eq!(nodes[0].scale_up_target.as_str(), "https://power/a/on");
        assert_eq!(nodes[1].scale_down_target.as_str(), "http://power/b/off");
    }

    #[test]
    fn incomplete_and_invalid_env_entries_are_skipped() {
        let nodes = nodes_from_env(env(&[
            // missing scale-down endpoint
            ("A_GPU_COUNT", "2"),
            ("A_SCALE_UP_ENDPOINT", "http://power/a/on"),
            // not a number
            ("B_GPU_COUNT", "four"),
            ("B_SCALE_UP_ENDPOINT", "http://power/b/on"),
            ("B_SCALE_DOWN_ENDPOINT", "http://power/b/off"),
            // zero gpus
            ("C_GPU_COUNT", "0"),
            ("C_SCALE_UP_ENDPOINT", "http://power/c/on"),
            ("C_SCALE_DOWN_ENDPOINT", "http://power/c/off"),
            // not a url
            ("D_GPU_COUNT", "1"),
            ("D_SCALE_UP_ENDPOINT", "power/d/on"),
            ("D_SCALE_DOWN_ENDPOINT", "http://power/d/off"),
            // unsupported scheme
            ("E_GPU_COUNT", "1"),
            ("E_SCALE_UP_ENDPOINT", "ftp://power/e/on"),
            ("E_SCALE_DOWN_ENDPOINT", "http://power/e/off"),
            ("F_GPU_COUNT", "4"),
            ("F_SCALE_UP_ENDPOINT", "http://power/f/on"),
            ("F_SCALE_DOWN_ENDPOINT", "http://power/f/off"),
            // bare suffix has no prefix
            ("_GPU_COUNT", "1"),
        ]));

        assert_eq!(names(&nodes), vec!["F"]);
    }

    #[test]
    fn build_node_reports_missing_field() {
        let err = build_node("A", "2", "", "http://power/a/off").expect_err("must fail");
        assert!(matches!(
            err.current_context(),
            ConfigError::Incomplete { field: "scale-up endpoint", .. }
        ));
    }

    #[test]
    fn file_entries_accept_numbers_and_strings() {
        let yaml = r#"
- name: rig-a
  gpuCount: 4
  scaleUpEndpoint: http://power/a/on
  scaleDownEndpoint: http://power/a/off
- name: rig-b
  gpuCount: "2"
  scaleUpEndpoint: http://power/b/on
  scaleDownEndpoint: http://power/b/off
"#;

        let nodes = nodes_from_str(yaml, "nodes.yaml").expect("should parse");

        assert_eq!(names(&nodes), vec!["rig-a", "rig-b"]);
        assert_eq!(nodes[0].gpu_count, 4);
        assert_eq!(nodes[1].gpu_count, 2);
    }

    #[test]
    fn malformed_file_entries_are_skipped_individually() {
        let yaml = r#"
- name: ok
  gpuCount: 1
  scaleUpEndpoint: http://power/ok/on
  scaleDownEndpoint: http://power/ok/off
- gpuCount: 2
  scaleUpEndpoint: http://power/anon/on
  scaleDownEndpoint: http://power/anon/off
- name: negative
  gpuCount: -3
  scaleUpEndpoint: http://power/neg/on
  scaleDownEndpoint: http://power/neg/off
- name: wrong-shape
  gpuCount: [1, 2]
- just a string
"#;

        let nodes = nodes_from_str(yaml, "nodes.yaml").expect("should parse");

        assert_eq!(names(&nodes), vec!["ok"]);
    }

    #[test]
    fn json_inventory_is_accepted() {
        let json = r#"[{"name":"rig","gpuCount":8,"scaleUpEndpoint":"http://p/on","scaleDownEndpoint":"http://p/off"}]"#;

        let nodes = nodes_from_str(json, "nodes.json").expect("should parse");

        assert_eq!(names(&nodes), vec!["rig"]);
    }

    #[test]
    fn non_sequence_document_is_malformed() {
        let err = nodes_from_str("name: rig", "nodes.yaml").expect_err("must fail");
        assert!(matches!(
            err.current_context(),
            ConfigError::FileMalformed { .. }
        ));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let err = nodes_from_file(Path::new("/nonexistent/gpu-nodes.yaml")).expect_err("must fail");
        assert!(matches!(
            err.current_context(),
            ConfigError::FileUnreadable { .. }
        ));
    }

    #[test]
    fn inventory_merges_file_then_env_and_drops_duplicates() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"
- name: RIG
  gpuCount: 8
  scaleUpEndpoint: http://file/on
  scaleDownEndpoint: http://file/off
"#
        )
        .expect("write inventory");

        let inventory = load_inventory(
            Some(file.path()),
            env(&[
                ("RIG_GPU_COUNT", "2"),
                ("RIG_SCALE_UP_ENDPOINT", "http://env/on"),
                ("RIG_SCALE_DOWN_ENDPOINT", "http://env/off"),
                ("OTHER_GPU_COUNT", "1"),
                ("OTHER_SCALE_UP_ENDPOINT", "http://env/other/on"),
                ("OTHER_SCALE_DOWN_ENDPOINT", "http://env/other/off"),
            ]),
        )
        .expect("valid inventory");

        let names: Vec<&str> = inventory.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["RIG", "OTHER"]);
        assert_eq!(inventory.get("RIG").map(|n| n.gpu_count), Some(8));
    }

    #[test]
    fn empty_inventory_is_fatal() {
        let err = load_inventory(None, env(&[("A_GPU_COUNT", "x")])).expect_err("must fail");
        assert!(matches!(err.current_context(), ConfigError::NoValidNodes));
    }
}
