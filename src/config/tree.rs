//! Dot-path access into a merged configuration tree.

use crate::error::{ConfigError, ConfigResult};
use serde_json::{Map, Value};

/// Separator between segments of a dotted key.
pub const KEY_SEPARATOR: char = '.';

/// Split a dotted key into segments, rejecting empty keys and empty segments.
pub fn parse_key(key: &str) -> ConfigResult<Vec<&str>> {
    if key.is_empty() {
        return Err(ConfigError::InvalidKey {
            key: key.to_string(),
            reason: "key is empty",
        });
    }

    let segments: Vec<&str> = key.split(KEY_SEPARATOR).collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(ConfigError::InvalidKey {
            key: key.to_string(),
            reason: "key contains an empty segment",
        });
    }

    Ok(segments)
}

/// Look up a dotted key. The empty key addresses the whole tree.
pub fn lookup<'a>(tree: &'a Value, key: &str) -> Option<&'a Value> {
    if key.is_empty() {
        return Some(tree);
    }

    key.split(KEY_SEPARATOR)
        .try_fold(tree, |node, segment| node.as_object()?.get(segment))
}

/// Whether a dotted key is present. Explicit `null` values count as present.
pub fn contains(tree: &Value, key: &str) -> bool {
    lookup(tree, key).is_some()
}

/// Write `value` at the path given by `segments`.
///
/// Missing intermediate mappings are created; a non-mapping value standing
/// in the way is replaced by a mapping.
pub fn insert_at(tree: &mut Value, segments: &[&str], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        *tree = value;
        return;
    };

    let mut node = tree;
    for segment in parents {
        node = ensure_object(node)
            .entry((*segment).to_string())
            .or_insert(Value::Null);
    }
    ensure_object(node).insert((*last).to_string(), value);
}

/// Write `value` at a dotted key.
pub fn insert(tree: &mut Value, key: &str, value: Value) -> ConfigResult<()> {
    let segments = parse_key(key)?;
    insert_at(tree, &segments, value);
    Ok(())
}

/// Dotted paths of every leaf (non-mapping value or empty mapping), sorted.
pub fn leaf_keys(tree: &Value) -> Vec<String> {
    let mut keys = Vec::new();
    collect_leaves(tree, String::new(), &mut keys);
    keys.sort();
    keys
}

fn collect_leaves(node: &Value, prefix: String, keys: &mut Vec<String>) {
    match node {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}{KEY_SEPARATOR}{key}")
                };
                collect_leaves(child, path, keys);
            }
        }
        _ if prefix.is_empty() => {}
        _ => keys.push(prefix),
    }
}

/// Short name of a value's shape for diagnostics.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced by a mapping"),
    }
}
