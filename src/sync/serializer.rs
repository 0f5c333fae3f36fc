//! Depth-first walk turning the node graph into a property tree.
//!
//! Every node becomes `{"id", "parent", "type", "properties", "dependencies"}`.
//! Children are serialized after their parent in the order the rule lists
//! them; a node reachable twice is emitted once and referenced by id after
//! that.

use serde_json::{json, Value};

use super::context::{Memo, WalkContext};
use super::rules::Slot;
use crate::core::{ArrayKey, ObjectId};
use crate::scene::NodeRef;
use crate::util::Result;

/// Number of rendering layers announced to the client.
pub const NUMBER_OF_LAYERS: u32 = 2;

/// Serialize the graph under `root`.
///
/// The root record always carries `properties.numberOfLayers`, even when
/// the root itself has no rule.
pub fn serialize_root(root: &NodeRef, ctx: &mut WalkContext<'_>) -> Result<Value> {
    let mut tree = match serialize_node(root, None, ctx)? {
        Some((_, Some(tree))) => tree,
        _ => {
            let id = ctx.registry.get_or_assign_id(root);
            json!({
                "id": id.as_str(),
                "parent": Value::Null,
                "type": root.read().class_name(),
                "properties": {},
                "dependencies": [],
            })
        }
    };
    if let Some(props) = tree.get_mut("properties").and_then(Value::as_object_mut) {
        props.insert("numberOfLayers".into(), json!(NUMBER_OF_LAYERS));
    }
    Ok(tree)
}

/// Serialize one node and its children.
///
/// Returns `None` when the node kind has no rule, otherwise the node id with
/// its record (`None` when the node was already emitted in this walk).
pub(crate) fn serialize_node(
    node: &NodeRef,
    parent: Option<&ObjectId>,
    ctx: &mut WalkContext<'_>,
) -> Result<Option<(ObjectId, Option<Value>)>> {
    let id = ctx.registry.get_or_assign_id(node);
    if ctx.emitted.contains(&id) {
        return Ok(Some((id, None)));
    }

    let data = node.read();
    let kind = data.kind();
    let Some(rule) = ctx.rules.get(kind).copied() else {
        tracing::warn!(class = data.class_name(), id = %id, "no serialization rule, node skipped");
        ctx.stats.skipped_unsupported += 1;
        return Ok(None);
    };
    ctx.emitted.insert(id.clone());
    ctx.stats.nodes += 1;

    let mtime = node.mtime();
    let memo = ctx.memo.get(&id).filter(|m| m.mtime == mtime).cloned();
    let mut properties = match memo {
        Some(memo) => {
            for key in &memo.arrays {
                ctx.touched.insert(*key);
            }
            ctx.stats.arrays += memo.arrays.len();
            ctx.stats.reused_nodes += 1;
            let properties = memo.properties.clone();
            ctx.memo_next.insert(id.clone(), memo);
            properties
        }
        None => {
            ctx.node_arrays.clear();
            let properties = (rule.properties)(&*data, ctx)?;
            let arrays = std::mem::take(&mut ctx.node_arrays);
            ctx.memo_next.insert(id.clone(), Memo { mtime, properties: properties.clone(), arrays });
            properties
        }
    };
    let children = (rule.children)(&*data, ctx);
    let class_name = data.class_name().to_string();
    drop(data);

    let mut dependencies = Vec::new();
    for child in children {
        let Some((child_id, record)) = serialize_node(&child.node, Some(&id), ctx)? else {
            continue;
        };
        let child_id = Value::String(child_id.as_str().to_string());
        match child.slot {
            Slot::Field(name) => {
                properties.insert(name.into(), child_id);
            }
            Slot::List(name) => {
                let entry = properties.entry(name).or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(list) = entry {
                    list.push(child_id);
                }
            }
        }
        if let Some(record) = record {
            dependencies.push(record);
        }
    }

    let mut record = json!({
        "id": id.as_str(),
        "parent": parent.map(ObjectId::as_str),
        "type": class_name,
        "properties": properties,
        "dependencies": dependencies,
    });
    if ctx.settings().debug {
        record["debug"] = json!({ "kind": format!("{kind:?}"), "mtime": mtime });
    }
    Ok(Some((id, Some(record))))
}

/// Array keys referenced anywhere in a property tree, sorted and unique.
pub fn referenced_keys(scene: &Value) -> Vec<ArrayKey> {
    fn collect(value: &Value, out: &mut Vec<ArrayKey>) {
        match value {
            Value::Object(map) => {
                if let Some(key) = map.get("hash").and_then(Value::as_str).and_then(ArrayKey::from_hex) {
                    out.push(key);
                }
                map.values().for_each(|v| collect(v, out));
            }
            Value::Array(list) => list.iter().for_each(|v| collect(v, out)),
            _ => {}
        }
    }

    let mut keys = Vec::new();
    collect(scene, &mut keys);
    keys.sort();
    keys.dedup();
    keys
}
