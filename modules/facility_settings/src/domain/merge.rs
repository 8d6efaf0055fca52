//! Settings tree operations over `serde_json::Value`

use crate::contract::SettingRecord;
use serde_json::{Map, Value};

use super::key::{join, segments};

/// Merge `source` into `target`.
///
/// Objects merge key-wise recursively; any other source value (scalar, array,
/// null) replaces whatever `target` held at that path.
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (k, v) in source_map {
                match target_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        target_map.insert(k, v);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}

/// Value at a dotted path. The empty key returns the tree itself.
pub fn lookup<'a>(tree: &'a Value, key: &str) -> Option<&'a Value> {
    segments(key).try_fold(tree, |node, segment| node.as_object()?.get(segment))
}

/// Replace the value at a dotted path, creating intermediate objects.
///
/// The empty key merges `value` into the root instead of replacing it.
pub fn set_path(tree: &mut Value, key: &str, value: Value) {
    let parts: Vec<&str> = segments(key).collect();
    let Some((last, parents)) = parts.split_last() else {
        deep_merge(tree, value);
        return;
    };

    let mut node = tree;
    for segment in parents {
        node = ensure_object(node)
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(node).insert(last.to_string(), value);
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

/// Explode nested objects into `(dotted key, leaf value)` rows.
///
/// Arrays, scalars, null and empty objects are leaves.
pub fn flatten(prefix: &str, value: Value) -> Vec<(String, Value)> {
    let mut rows = Vec::new();
    flatten_into(prefix, value, &mut rows);
    rows
}

fn flatten_into(prefix: &str, value: Value, rows: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (k, v) in map {
                flatten_into(&join(prefix, &k), v, rows);
            }
        }
        leaf => rows.push((prefix.to_string(), leaf)),
    }
}

/// Build one scope's tree from its stored rows.
pub fn tree_from_records<'a, I>(records: I) -> Value
where
    I: IntoIterator<Item = &'a SettingRecord>,
{
    let mut tree = Value::Object(Map::new());
    apply_records(&mut tree, records);
    tree
}

/// Apply stored rows on top of an existing tree.
///
/// Root rows (empty key) are merged first, then keyed rows replace the value
/// at their path in key order, so a deeper row lands on top of its ancestor.
pub fn apply_records<'a, I>(tree: &mut Value, records: I)
where
    I: IntoIterator<Item = &'a SettingRecord>,
{
    let (roots, mut keyed): (Vec<&SettingRecord>, Vec<&SettingRecord>) =
        records.into_iter().partition(|r| r.key.is_empty());
    keyed.sort_by(|a, b| a.key.cmp(&b.key));

    for record in roots {
        deep_merge(tree, record.value.clone());
    }
    for record in keyed {
        set_path(tree, &record.key, record.value.clone());
    }
}
