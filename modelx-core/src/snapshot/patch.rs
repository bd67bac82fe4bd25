//! Merging plain snapshots back into live state
//!
//! Merge rules, applied recursively from each model's root object:
//!
//! - object: live keys missing from the patch are deleted, the rest are
//!   merged or replaced
//! - array: truncated to the patch length, overlapping indices merged,
//!   remaining patch items appended
//! - map: cleared, then repopulated from the patch in order
//! - scalars and kind mismatches: the patch value replaces the live one

use crate::injector::{Injector, StateGraph};
use crate::snapshot::serialize::clone_plain;
use crate::state::Node;
use modelx_reactive::Graph;
use serde_json::{Map, Value};

/// Merge `patch` into the models of `injector` as one atomic update
///
/// `patch` maps stable names to model snapshots. Models missing from the
/// patch are untouched, names without a cached instance are ignored, and
/// non-object input is ignored entirely. Snapshot listeners are notified
/// once, after every reaction triggered by the patch has settled.
pub fn patch_snapshot(patch: &Value, injector: &Injector) {
    let Value::Object(models) = clone_plain(patch) else {
        tracing::debug!(kind = kind_of(patch), "Ignoring non-object snapshot patch");
        return;
    };

    let gate = injector.gate().clone();
    gate.begin();

    let graph = injector.graph();
    graph.transaction(|| {
        let state = graph.untracked(|| {
            let mut state = injector.dump();
            merge_models(graph, &mut state, &models);
            state
        });
        injector.load(state);
        graph.on_reactions_settled(move || gate.finish());
    });
}

/// Apply a full snapshot; same rules as [`patch_snapshot`]
pub fn apply_snapshot(snapshot: &Value, injector: &Injector) {
    patch_snapshot(snapshot, injector)
}

fn merge_models(graph: &Graph, state: &mut StateGraph, models: &Map<String, Value>) {
    for (name, patch) in models {
        if !patch.is_object() {
            tracing::debug!(name = %name, kind = kind_of(patch), "Skipping non-object model patch");
            continue;
        }
        let Some(live) = state.get(name) else {
            tracing::debug!(name = %name, "No instance for patched model");
            continue;
        };
        let merged = merge(graph, live, patch);
        state.insert(name.clone(), merged);
    }
}

/// Merge `patch` into `live`, returning the node that should take its place
pub(crate) fn merge(graph: &Graph, live: &Node, patch: &Value) -> Node {
    match (live, patch) {
        (Node::Object(object), Value::Object(fields)) => {
            object.retain(|key| fields.contains_key(key));
            for (key, value) in fields {
                let next = match object.get(key) {
                    Some(existing) => merge(graph, &existing, value),
                    None => Node::from_plain(graph, value),
                };
                object.set(key.clone(), next);
            }
            live.clone()
        }
        (Node::Array(array), Value::Array(items)) => {
            array.truncate(items.len());
            let existing = array.to_vec();
            for (index, item) in items.iter().enumerate() {
                match existing.get(index) {
                    Some(node) => array.set(index, merge(graph, node, item)),
                    None => array.push(Node::from_plain(graph, item)),
                }
            }
            live.clone()
        }
        (Node::Map(map), Value::Object(fields)) => {
            map.clear();
            for (key, value) in fields {
                map.set(key.clone(), Node::from_plain(graph, value));
            }
            live.clone()
        }
        _ => Node::from_plain(graph, patch),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
