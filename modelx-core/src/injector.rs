//! The Injector: a keyed cache of model instances
//!
//! Every instance is stored under a [`ModelKey`] (stable name plus scope)
//! and constructed at most once per key. The injector also exposes the
//! live state of all cached instances as a [`StateGraph`], which is what
//! the snapshot engine serializes and patches.

use crate::config;
use crate::error::{InjectError, InjectResult};
use crate::model::Model;
use crate::snapshot::phase::{PhaseGate, SnapshotPhase};
use crate::state::{Node, ObjectNode};
use modelx_reactive::{Atom, Graph};
use modelx_types::{ModelKey, OwnerId};
use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

/// Live state of every cached instance, keyed by stable name
///
/// Holds live handles, not copies: writing to a node writes to the
/// instance.
#[derive(Debug, Clone, Default)]
pub struct StateGraph {
    entries: Vec<(String, Node)>,
}

impl StateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state graph from plain data; non-object input yields an
    /// empty graph
    pub fn from_plain(graph: &Graph, value: &serde_json::Value) -> Self {
        let mut state = StateGraph::new();
        if let serde_json::Value::Object(models) = value {
            for (name, model) in models {
                state.insert(name.clone(), Node::from_plain(graph, model));
            }
        }
        state
    }

    /// Insert or overwrite `name`; an overwritten entry keeps its position
    pub fn insert(&mut self, name: impl Into<String>, node: Node) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = node,
            None => self.entries.push((name, node)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }

    pub fn remove(&mut self, name: &str) -> Option<Node> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(name, node)| (name.as_str(), node))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct Entry {
    instance: Rc<dyn Any>,
    state: ObjectNode,
    type_name: &'static str,
    /// Owners holding a per-owner instance; evicted when the last is released
    owners: BTreeSet<OwnerId>,
}

struct InjectorInner {
    graph: Graph,
    entries: RefCell<HashMap<ModelKey, Entry>>,
    /// Insertion order of `entries`
    order: RefCell<Vec<ModelKey>>,
    /// Changes whenever an instance is added or evicted
    members: Atom,
    gate: Rc<PhaseGate>,
}

/// Dependency-injection container bound to one observable graph
///
/// Cloning gives another handle to the same container.
#[derive(Clone)]
pub struct Injector {
    inner: Rc<InjectorInner>,
}

impl Injector {
    /// Create an empty injector with its own graph
    pub fn new_instance() -> Self {
        let graph = Graph::new();
        graph.set_strict(config::is_strict());
        Self::with_graph(graph)
    }

    /// Create an empty injector sharing `graph`
    pub fn with_graph(graph: Graph) -> Self {
        let members = Atom::new(&graph);
        Injector {
            inner: Rc::new(InjectorInner {
                graph,
                entries: RefCell::new(HashMap::new()),
                order: RefCell::new(Vec::new()),
                members,
                gate: Rc::new(PhaseGate::new()),
            }),
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.inner.graph
    }

    pub fn ptr_eq(&self, other: &Injector) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakInjector {
        WeakInjector {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub(crate) fn gate(&self) -> &Rc<PhaseGate> {
        &self.inner.gate
    }

    /// Whether a snapshot patch is currently being applied
    pub fn snapshot_phase(&self) -> SnapshotPhase {
        self.inner.gate.phase()
    }

    /// Resolve the instance cached under `key`, constructing it on first
    /// request
    ///
    /// The constructor runs untracked, so resolving inside a reaction does
    /// not subscribe it to the new instance's fields. A failed construction
    /// caches nothing.
    pub fn get<M: Model>(&self, key: ModelKey, args: M::Args) -> InjectResult<Rc<M>> {
        if let Some(found) = self.lookup::<M>(&key)? {
            return Ok(found);
        }

        tracing::debug!(name = %key.name, scope = ?key.scope, "Constructing model instance");
        let graph = self.inner.graph.clone();
        let instance = graph.untracked(|| M::create(&graph, args))?;

        // The constructor may have resolved the same key itself
        if let Some(found) = self.lookup::<M>(&key)? {
            return Ok(found);
        }

        let instance = Rc::new(instance);
        let entry = Entry {
            instance: instance.clone(),
            state: instance.state().clone(),
            type_name: std::any::type_name::<M>(),
            owners: BTreeSet::new(),
        };
        self.inner.entries.borrow_mut().insert(key.clone(), entry);
        self.inner.order.borrow_mut().push(key);
        self.members_changed();

        Ok(instance)
    }

    fn lookup<M: Model>(&self, key: &ModelKey) -> InjectResult<Option<Rc<M>>> {
        let entries = self.inner.entries.borrow();
        let Some(entry) = entries.get(key) else {
            return Ok(None);
        };
        entry
            .instance
            .clone()
            .downcast::<M>()
            .map(Some)
            .map_err(|_| InjectError::TypeMismatch {
                key: key.clone(),
                cached: entry.type_name,
                requested: std::any::type_name::<M>(),
            })
    }

    fn members_changed(&self) {
        let members = &self.inner.members;
        self.inner.graph.transaction(|| members.report_changed());
    }

    pub fn contains(&self, key: &ModelKey) -> bool {
        self.inner.entries.borrow().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stable names of cached instances, in insertion order
    pub fn names(&self) -> Vec<String> {
        self.inner
            .order
            .borrow()
            .iter()
            .map(|key| key.name.clone())
            .collect()
    }

    /// Bind a cached per-owner instance to `owner`
    ///
    /// Several owners may share one instance; it stays cached until every
    /// one of them has been released.
    pub fn bind_owner(&self, key: &ModelKey, owner: OwnerId) -> bool {
        match self.inner.entries.borrow_mut().get_mut(key) {
            Some(entry) => {
                entry.owners.insert(owner);
                true
            }
            None => false,
        }
    }

    /// Owners currently bound to the instance under `key`
    pub fn owners(&self, key: &ModelKey) -> Vec<OwnerId> {
        self.inner
            .entries
            .borrow()
            .get(key)
            .map(|entry| entry.owners.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Unbind `owner` everywhere and evict the instances it was the last
    /// owner of, returning how many were dropped
    pub fn release_owner(&self, owner: OwnerId) -> usize {
        let released: Vec<ModelKey> = {
            let mut entries = self.inner.entries.borrow_mut();
            let mut orphaned = Vec::new();
            for (key, entry) in entries.iter_mut() {
                if entry.owners.remove(&owner) && entry.owners.is_empty() {
                    orphaned.push(key.clone());
                }
            }
            for key in &orphaned {
                entries.remove(key);
            }
            orphaned
        };
        if released.is_empty() {
            return 0;
        }

        self.inner
            .order
            .borrow_mut()
            .retain(|key| !released.contains(key));
        tracing::debug!(owner = owner.as_u64(), count = released.len(), "Released owner");
        self.members_changed();
        released.len()
    }

    /// Live state of every cached instance
    ///
    /// When two scopes share a stable name the later entry wins.
    pub fn dump(&self) -> StateGraph {
        self.inner.members.report_observed();

        let entries = self.inner.entries.borrow();
        let mut state = StateGraph::new();
        for key in self.inner.order.borrow().iter() {
            if let Some(entry) = entries.get(key) {
                state.insert(key.name.clone(), Node::Object(entry.state.clone()));
            }
        }
        state
    }

    /// Replace the fields of every cached instance named in `state`
    ///
    /// Runs in one transaction. Fields missing from a supplied node are
    /// removed from the instance. Names with no cached instance are
    /// ignored; `load` never constructs.
    pub fn load(&self, state: StateGraph) {
        let targets: Vec<(String, ObjectNode)> = {
            let entries = self.inner.entries.borrow();
            self.inner
                .order
                .borrow()
                .iter()
                .filter_map(|key| {
                    entries
                        .get(key)
                        .map(|entry| (key.name.clone(), entry.state.clone()))
                })
                .collect()
        };

        let graph = &self.inner.graph;
        graph.transaction(|| {
            for (name, node) in state.iter() {
                let Node::Object(source) = node else {
                    tracing::debug!(name, kind = node.kind_name(), "Skipping non-object model state");
                    continue;
                };
                for (_, target) in targets.iter().filter(|(n, _)| n == name) {
                    if source.ptr_eq(target) {
                        continue;
                    }
                    assign_fields(graph, target, source);
                }
            }
        });
    }
}

/// Make `target` hold exactly the fields of `source`
///
/// Containers that are not already the target's own children are copied,
/// so no two instances ever share a live container.
fn assign_fields(graph: &Graph, target: &ObjectNode, source: &ObjectNode) {
    let fields = source.entries();
    target.retain(|key| fields.iter().any(|(k, _)| k == key));
    for (key, node) in fields {
        let next = match target.get(&key) {
            Some(existing) if existing.same_as(&node) => existing,
            _ => node.deep_clone(graph),
        };
        target.set(key, next);
    }
}

impl Default for Injector {
    fn default() -> Self {
        Self::new_instance()
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("instances", &self.names())
            .field("phase", &self.snapshot_phase())
            .finish()
    }
}

/// Non-owning handle to an [`Injector`]
#[derive(Clone)]
pub struct WeakInjector {
    inner: Weak<InjectorInner>,
}

impl WeakInjector {
    pub fn upgrade(&self) -> Option<Injector> {
        self.inner.upgrade().map(|inner| Injector { inner })
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Injector>> = const { RefCell::new(None) };
}

/// The ambient injector of this thread, created on first use
pub fn get_injector() -> Injector {
    CURRENT.with(|current| {
        current
            .borrow_mut()
            .get_or_insert_with(Injector::new_instance)
            .clone()
    })
}

/// Replace the ambient injector, returning the previous one
pub fn set_injector(injector: Injector) -> Option<Injector> {
    CURRENT.with(|current| current.borrow_mut().replace(injector))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Counter {
        state: ObjectNode,
    }

    impl Model for Counter {
        type Args = i64;

        fn create(graph: &Graph, start: i64) -> anyhow::Result<Self> {
            Ok(Counter {
                state: ObjectNode::from_fields(graph, [("count", json!(start))]),
            })
        }

        fn state(&self) -> &ObjectNode {
            &self.state
        }
    }

    #[test]
    fn test_get_caches_by_key() {
        let injector = Injector::new_instance();
        let key = ModelKey::singleton("Counter");

        let first = injector.get::<Counter>(key.clone(), 1).unwrap();
        let second = injector.get::<Counter>(key.clone(), 2).unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(second.state().get_scalar("count"), Some(json!(1)));
        assert_eq!(injector.len(), 1);
    }

    #[test]
    fn test_scopes_are_separate_keys() {
        let injector = Injector::new_instance();
        let store = injector.get::<Counter>(ModelKey::singleton("Counter"), 1).unwrap();
        let scoped = injector.get::<Counter>(ModelKey::per_owner("Counter"), 2).unwrap();

        assert!(!Rc::ptr_eq(&store, &scoped));
        let dump = injector.dump();
        assert_eq!(dump.len(), 1);
        let node = dump.get("Counter").unwrap();
        assert!(node.as_object().unwrap().ptr_eq(scoped.state()));
    }

    #[test]
    fn test_load_replaces_fields() {
        let injector = Injector::new_instance();
        let counter = injector.get::<Counter>(ModelKey::singleton("Counter"), 1).unwrap();

        let state = StateGraph::from_plain(
            injector.graph(),
            &json!({"Counter": {"label": "x"}, "Missing": {"a": 1}}),
        );
        injector.load(state);

        assert_eq!(counter.state().keys(), vec!["label"]);
        assert!(!injector.contains(&ModelKey::singleton("Missing")));
    }

    #[test]
    fn test_state_graph_overwrite_keeps_position() {
        let mut state = StateGraph::new();
        state.insert("a", Node::scalar(1));
        state.insert("b", Node::scalar(2));
        state.insert("a", Node::scalar(3));

        assert_eq!(state.names(), vec!["a", "b"]);
        assert_eq!(state.get("a").and_then(Node::as_scalar), Some(&json!(3)));
    }

    #[test]
    fn test_ambient_injector_is_replaceable() {
        let first = get_injector();
        assert!(first.ptr_eq(&get_injector()));

        let replacement = Injector::new_instance();
        let previous = set_injector(replacement.clone());
        assert!(previous.unwrap().ptr_eq(&first));
        assert!(get_injector().ptr_eq(&replacement));
    }
}
