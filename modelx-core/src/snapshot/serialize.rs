//! Deep serialization of live state into plain data

use crate::injector::Injector;
use crate::state::Node;
use serde_json::{Map, Value};

/// Serialize a live subtree
///
/// Every container is read, including empty ones, so a reaction walking
/// the tree depends on all of them.
pub fn walk(node: &Node) -> Value {
    match node {
        Node::Scalar(value) => value.clone(),
        Node::Array(array) => Value::Array(array.to_vec().iter().map(walk).collect()),
        Node::Object(object) => walk_entries(object.entries()),
        Node::Map(map) => walk_entries(map.entries()),
    }
}

fn walk_entries(entries: Vec<(String, Node)>) -> Value {
    let mut fields = Map::with_capacity(entries.len());
    for (key, node) in entries {
        fields.insert(key, walk(&node));
    }
    Value::Object(fields)
}

/// Snapshot of every model in `injector`, keyed by stable name
pub fn get_snapshot(injector: &Injector) -> Value {
    let state = injector.dump();
    let mut models = Map::with_capacity(state.len());
    for (name, node) in state.iter() {
        models.insert(name.to_string(), walk(node));
    }
    Value::Object(models)
}

/// Snapshot of the model named `name`; `Null` when there is none
pub fn get_model_snapshot(name: &str, injector: &Injector) -> Value {
    injector.dump().get(name).map(walk).unwrap_or(Value::Null)
}

/// Structural deep copy of plain data
pub fn clone_plain(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(clone_plain).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, item)| (key.clone(), clone_plain(item)))
                .collect(),
        ),
        scalar => scalar.clone(),
    }
}
