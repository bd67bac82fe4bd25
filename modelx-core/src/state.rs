//! Live, observable model state.
//!
//! Model fields live in a tree of [`Node`]s. Containers ([`ArrayNode`],
//! [`ObjectNode`], [`MapNode`]) are shared handles, each backed by one atom
//! of the graph: every read reports an observation and every effective
//! write reports a change. Scalars are plain JSON values stored inline.
//!
//! Writing a scalar equal to the one already stored, or re-inserting the
//! same container handle, is not a change.

use modelx_reactive::{Atom, AtomId, Graph};
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A value in the live state tree
#[derive(Clone)]
pub enum Node {
    /// Null, bool, number or string
    Scalar(Value),
    Array(ArrayNode),
    Object(ObjectNode),
    /// Key-ordered map; replaced wholesale by patches
    Map(MapNode),
}

impl Node {
    pub fn scalar(value: impl Into<Value>) -> Self {
        Node::Scalar(value.into())
    }

    /// Build live nodes from plain data; JSON objects become object nodes
    pub fn from_plain(graph: &Graph, value: &Value) -> Self {
        match value {
            Value::Array(items) => Node::Array(ArrayNode::from_nodes(
                graph,
                items.iter().map(|item| Node::from_plain(graph, item)).collect(),
            )),
            Value::Object(fields) => Node::Object(ObjectNode::from_nodes(
                graph,
                fields
                    .iter()
                    .map(|(key, item)| (key.clone(), Node::from_plain(graph, item)))
                    .collect(),
            )),
            scalar => Node::Scalar(scalar.clone()),
        }
    }

    /// Copy this subtree into fresh containers owned by `graph`
    pub fn deep_clone(&self, graph: &Graph) -> Self {
        match self {
            Node::Scalar(value) => Node::Scalar(value.clone()),
            Node::Array(array) => Node::Array(ArrayNode::from_nodes(
                graph,
                array.to_vec().iter().map(|item| item.deep_clone(graph)).collect(),
            )),
            Node::Object(object) => Node::Object(ObjectNode::from_nodes(
                graph,
                object
                    .entries()
                    .iter()
                    .map(|(key, item)| (key.clone(), item.deep_clone(graph)))
                    .collect(),
            )),
            Node::Map(map) => Node::Map(MapNode::from_nodes(
                graph,
                map.entries()
                    .iter()
                    .map(|(key, item)| (key.clone(), item.deep_clone(graph)))
                    .collect(),
            )),
        }
    }

    /// Serialize this subtree into plain data
    pub fn to_plain(&self) -> Value {
        crate::snapshot::walk(self)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Scalar(_) => "scalar",
            Node::Array(_) => "array",
            Node::Object(_) => "object",
            Node::Map(_) => "map",
        }
    }

    /// Graph owning this container; `None` for scalars
    pub fn graph(&self) -> Option<&Graph> {
        match self {
            Node::Scalar(_) => None,
            Node::Array(array) => Some(array.graph()),
            Node::Object(object) => Some(object.graph()),
            Node::Map(map) => Some(map.graph()),
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Node::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayNode> {
        match self {
            Node::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectNode> {
        match self {
            Node::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapNode> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Same scalar value, or the very same container
    pub fn same_as(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Scalar(a), Node::Scalar(b)) => a == b,
            (Node::Array(a), Node::Array(b)) => a.ptr_eq(b),
            (Node::Object(a), Node::Object(b)) => a.ptr_eq(b),
            (Node::Map(a), Node::Map(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<ArrayNode> for Node {
    fn from(array: ArrayNode) -> Self {
        Node::Array(array)
    }
}

impl From<ObjectNode> for Node {
    fn from(object: ObjectNode) -> Self {
        Node::Object(object)
    }
}

impl From<MapNode> for Node {
    fn from(map: MapNode) -> Self {
        Node::Map(map)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Scalar(value) => write!(f, "Scalar({})", value),
            Node::Array(array) => fmt::Debug::fmt(array, f),
            Node::Object(object) => fmt::Debug::fmt(object, f),
            Node::Map(map) => fmt::Debug::fmt(map, f),
        }
    }
}

/// Shared storage of a container plus its atom
struct Container<T> {
    atom: Atom,
    data: RefCell<T>,
}

impl<T> Container<T> {
    fn new(graph: &Graph, data: T) -> Rc<Self> {
        Rc::new(Self {
            atom: Atom::new(graph),
            data: RefCell::new(data),
        })
    }

    fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.atom.report_observed();
        f(&self.data.borrow())
    }

    /// `f` returns its result and whether the data changed. The change is
    /// reported after the borrow is released.
    fn write<R>(&self, f: impl FnOnce(&mut T) -> (R, bool)) -> R {
        let (result, changed) = {
            let mut data = self.data.borrow_mut();
            f(&mut data)
        };
        if changed {
            self.atom.report_changed();
        }
        result
    }
}

/// Ordered sequence of nodes
#[derive(Clone)]
pub struct ArrayNode {
    inner: Rc<Container<Vec<Node>>>,
}

impl ArrayNode {
    pub fn new(graph: &Graph) -> Self {
        Self::from_nodes(graph, Vec::new())
    }

    pub fn from_nodes(graph: &Graph, items: Vec<Node>) -> Self {
        Self {
            inner: Container::new(graph, items),
        }
    }

    pub fn atom_id(&self) -> AtomId {
        self.inner.atom.id()
    }

    pub fn graph(&self) -> &Graph {
        self.inner.atom.graph()
    }

    pub fn ptr_eq(&self, other: &ArrayNode) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn len(&self) -> usize {
        self.inner.read(|items| items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Node> {
        self.inner.read(|items| items.get(index).cloned())
    }

    pub fn to_vec(&self) -> Vec<Node> {
        self.inner.read(|items| items.clone())
    }

    pub fn push(&self, node: Node) {
        self.inner.write(|items| {
            items.push(node);
            ((), true)
        })
    }

    /// Set `index`, padding with nulls when it lies past the end
    pub fn set(&self, index: usize, node: Node) {
        self.inner.write(|items| {
            if index < items.len() {
                if items[index].same_as(&node) {
                    return ((), false);
                }
                items[index] = node;
            } else {
                items.resize(index, Node::Scalar(Value::Null));
                items.push(node);
            }
            ((), true)
        })
    }

    pub fn pop(&self) -> Option<Node> {
        self.inner.write(|items| {
            let popped = items.pop();
            let changed = popped.is_some();
            (popped, changed)
        })
    }

    /// Drop trailing entries so at most `len` remain
    pub fn truncate(&self, len: usize) {
        self.inner.write(|items| {
            let changed = items.len() > len;
            items.truncate(len);
            ((), changed)
        })
    }

    pub fn clear(&self) {
        self.truncate(0);
    }
}

impl fmt::Debug for ArrayNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.data.borrow().iter()).finish()
    }
}

type Entries = Vec<(String, Node)>;

/// Insertion-ordered keyed storage shared by objects and maps
#[derive(Clone)]
struct Keyed {
    inner: Rc<Container<Entries>>,
}

impl Keyed {
    fn new(graph: &Graph, entries: Entries) -> Self {
        Self {
            inner: Container::new(graph, entries),
        }
    }

    fn ptr_eq(&self, other: &Keyed) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn get(&self, key: &str) -> Option<Node> {
        self.inner.read(|entries| {
            entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, node)| node.clone())
        })
    }

    fn contains_key(&self, key: &str) -> bool {
        self.inner.read(|entries| entries.iter().any(|(k, _)| k == key))
    }

    fn len(&self) -> usize {
        self.inner.read(|entries| entries.len())
    }

    fn keys(&self) -> Vec<String> {
        self.inner
            .read(|entries| entries.iter().map(|(k, _)| k.clone()).collect())
    }

    fn entries(&self) -> Entries {
        self.inner.read(|entries| entries.clone())
    }

    fn set(&self, key: String, node: Node) {
        self.inner.write(|entries| {
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some((_, existing)) if existing.same_as(&node) => ((), false),
                Some((_, existing)) => {
                    *existing = node;
                    ((), true)
                }
                None => {
                    entries.push((key, node));
                    ((), true)
                }
            }
        })
    }

    fn remove(&self, key: &str) -> Option<Node> {
        self.inner.write(|entries| {
            match entries.iter().position(|(k, _)| k == key) {
                Some(index) => (Some(entries.remove(index).1), true),
                None => (None, false),
            }
        })
    }

    fn retain(&self, mut keep: impl FnMut(&str) -> bool) {
        self.inner.write(|entries| {
            let before = entries.len();
            entries.retain(|(k, _)| keep(k));
            ((), entries.len() != before)
        })
    }

    fn clear(&self) {
        self.inner.write(|entries| {
            let changed = !entries.is_empty();
            entries.clear();
            ((), changed)
        })
    }

    fn fmt_entries(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.inner.data.borrow().iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

/// Plain keyed structure; the shape of every model's fields
#[derive(Clone)]
pub struct ObjectNode {
    keyed: Keyed,
}

impl ObjectNode {
    pub fn new(graph: &Graph) -> Self {
        Self::from_nodes(graph, Vec::new())
    }

    pub fn from_nodes(graph: &Graph, entries: Vec<(String, Node)>) -> Self {
        Self {
            keyed: Keyed::new(graph, entries),
        }
    }

    /// Build an object from plain field values
    pub fn from_fields<K, I>(graph: &Graph, fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let entries = fields
            .into_iter()
            .map(|(key, value)| (key.into(), Node::from_plain(graph, &value)))
            .collect();
        Self::from_nodes(graph, entries)
    }

    pub fn atom_id(&self) -> AtomId {
        self.keyed.inner.atom.id()
    }

    pub fn graph(&self) -> &Graph {
        self.keyed.inner.atom.graph()
    }

    pub fn ptr_eq(&self, other: &ObjectNode) -> bool {
        self.keyed.ptr_eq(&other.keyed)
    }

    pub fn get(&self, key: &str) -> Option<Node> {
        self.keyed.get(key)
    }

    /// Read a scalar field; `None` for missing fields and containers
    pub fn get_scalar(&self, key: &str) -> Option<Value> {
        match self.get(key)? {
            Node::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// Read any field as plain data
    pub fn get_plain(&self, key: &str) -> Option<Value> {
        self.get(key).map(|node| node.to_plain())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.keyed.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.keyed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        self.keyed.keys()
    }

    pub fn entries(&self) -> Vec<(String, Node)> {
        self.keyed.entries()
    }

    pub fn set(&self, key: impl Into<String>, node: Node) {
        self.keyed.set(key.into(), node)
    }

    pub fn set_scalar(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.set(key, Node::Scalar(value.into()))
    }

    /// Store plain data, converting nested structures into live nodes
    pub fn set_plain(&self, key: impl Into<String>, value: &Value) {
        let node = Node::from_plain(self.graph(), value);
        self.set(key, node)
    }

    pub fn remove(&self, key: &str) -> Option<Node> {
        self.keyed.remove(key)
    }

    /// Keep only the keys for which `keep` returns true
    pub fn retain(&self, keep: impl FnMut(&str) -> bool) {
        self.keyed.retain(keep)
    }
}

impl fmt::Debug for ObjectNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.keyed.fmt_entries(f)
    }
}

/// Key-ordered map
#[derive(Clone)]
pub struct MapNode {
    keyed: Keyed,
}

impl MapNode {
    pub fn new(graph: &Graph) -> Self {
        Self::from_nodes(graph, Vec::new())
    }

    pub fn from_nodes(graph: &Graph, entries: Vec<(String, Node)>) -> Self {
        Self {
            keyed: Keyed::new(graph, entries),
        }
    }

    pub fn atom_id(&self) -> AtomId {
        self.keyed.inner.atom.id()
    }

    pub fn graph(&self) -> &Graph {
        self.keyed.inner.atom.graph()
    }

    pub fn ptr_eq(&self, other: &MapNode) -> bool {
        self.keyed.ptr_eq(&other.keyed)
    }

    pub fn get(&self, key: &str) -> Option<Node> {
        self.keyed.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.keyed.contains_key(key)
    }

    pub fn size(&self) -> usize {
        self.keyed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        self.keyed.keys()
    }

    pub fn entries(&self) -> Vec<(String, Node)> {
        self.keyed.entries()
    }

    pub fn set(&self, key: impl Into<String>, node: Node) {
        self.keyed.set(key.into(), node)
    }

    pub fn delete(&self, key: &str) -> bool {
        self.keyed.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.keyed.clear()
    }
}

impl fmt::Debug for MapNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Map")?;
        self.keyed.fmt_entries(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    fn watch(graph: &Graph, read: impl Fn() -> Value + 'static) -> (Rc<Cell<u32>>, modelx_reactive::ReactionDisposer) {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let disposer = graph.reaction(read, move |_| counter.set(counter.get() + 1), |a, b| a == b);
        (calls, disposer)
    }

    #[test]
    fn test_from_plain_builds_objects_and_arrays() {
        let graph = Graph::new();
        let node = Node::from_plain(&graph, &json!({"a": [1, {"b": true}], "c": "x"}));

        let object = node.as_object().unwrap();
        assert_eq!(object.keys(), vec!["a", "c"]);
        let array = object.get("a").unwrap();
        assert_eq!(array.as_array().unwrap().len(), 2);
        assert_eq!(object.get_scalar("c"), Some(json!("x")));
    }

    #[test]
    fn test_setting_equal_scalar_is_not_a_change() {
        let graph = Graph::new();
        let object = ObjectNode::from_fields(&graph, [("count", json!(1))]);

        let before = graph.revision();
        object.set_scalar("count", 1);
        assert_eq!(graph.revision(), before);

        object.set_scalar("count", 2);
        assert!(graph.revision() > before);
    }

    #[test]
    fn test_reads_are_tracked_per_container() {
        let graph = Graph::new();
        let object = ObjectNode::from_fields(&graph, [("count", json!(0))]);
        let other = ArrayNode::new(&graph);

        let reader = object.clone();
        let (calls, _disposer) = watch(&graph, move || reader.get_plain("count").unwrap());

        other.push(Node::scalar(1));
        assert_eq!(calls.get(), 0);

        object.set_scalar("count", 3);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_empty_array_length_is_observed() {
        let graph = Graph::new();
        let array = ArrayNode::new(&graph);

        let reader = array.clone();
        let (calls, _disposer) = watch(&graph, move || json!(reader.len()));

        array.push(Node::scalar("x"));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_array_set_pads_with_null() {
        let graph = Graph::new();
        let array = ArrayNode::new(&graph);
        array.set(2, Node::scalar(7));

        assert_eq!(array.to_vec().len(), 3);
        assert!(matches!(array.get(0), Some(Node::Scalar(Value::Null))));
        assert_eq!(array.pop().unwrap().as_scalar(), Some(&json!(7)));
    }

    #[test]
    fn test_keyed_order_and_removal() {
        let graph = Graph::new();
        let map = MapNode::new(&graph);
        map.set("b", Node::scalar(1));
        map.set("a", Node::scalar(2));
        map.set("b", Node::scalar(3));

        assert_eq!(map.keys(), vec!["b", "a"]);
        assert!(map.delete("b"));
        assert!(!map.delete("b"));
        assert_eq!(map.size(), 1);

        map.clear();
        assert!(map.is_empty());
    }

    #[test]
    fn test_deep_clone_detaches_containers() {
        let graph = Graph::new();
        let original = Node::from_plain(&graph, &json!({"list": [1, 2]}));
        let copy = original.deep_clone(&graph);

        let list = original.as_object().unwrap().get("list").unwrap();
        list.as_array().unwrap().push(Node::scalar(3));

        assert_eq!(copy.to_plain(), json!({"list": [1, 2]}));
        assert!(!original.same_as(&copy));
    }
}
