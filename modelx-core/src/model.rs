//! Model types and the process-wide model registry.

use crate::state::ObjectNode;
use modelx_reactive::Graph;
use modelx_types::ModelKind;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A type whose instances are managed by an [`Injector`](crate::Injector)
///
/// Implementors keep their fields in an [`ObjectNode`] so the snapshot
/// engine can serialize and patch them.
///
/// ```
/// use modelx_core::{Model, ModelKind, ObjectNode};
/// use modelx_reactive::Graph;
/// use serde_json::json;
///
/// struct Counter {
///     state: ObjectNode,
/// }
///
/// impl Model for Counter {
///     const KIND: ModelKind = ModelKind::Store;
///     type Args = ();
///
///     fn create(graph: &Graph, _: ()) -> anyhow::Result<Self> {
///         Ok(Counter {
///             state: ObjectNode::from_fields(graph, [("count", json!(0))]),
///         })
///     }
///
///     fn state(&self) -> &ObjectNode {
///         &self.state
///     }
/// }
/// ```
pub trait Model: Sized + 'static {
    const KIND: ModelKind = ModelKind::Unclassified;

    /// Name used as cache key and snapshot key; defaults to the type name
    const STABLE_NAME: Option<&'static str> = None;

    /// Constructor arguments
    type Args;

    fn create(graph: &Graph, args: Self::Args) -> anyhow::Result<Self>;

    /// Live fields of the instance
    fn state(&self) -> &ObjectNode;
}

/// Metadata assigned to a model type on first use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMeta {
    pub kind: ModelKind,
    pub name: String,
    pub type_name: &'static str,
}

static REGISTRY: Lazy<RwLock<HashMap<TypeId, ModelMeta>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

/// Registry of model metadata, shared by every injector in the process
pub struct ModelRegistry;

impl ModelRegistry {
    /// Metadata of `M`, assigning it on first call
    ///
    /// Unclassified types without a stable name get `<TypeName>_<uid>`,
    /// generated once per type.
    pub fn describe<M: Model>() -> ModelMeta {
        let type_id = TypeId::of::<M>();
        if let Some(meta) = REGISTRY.read().get(&type_id) {
            return meta.clone();
        }

        let mut registry = REGISTRY.write();
        registry
            .entry(type_id)
            .or_insert_with(|| {
                let type_name = std::any::type_name::<M>();
                let short = short_type_name(type_name);
                let name = match (M::KIND, M::STABLE_NAME) {
                    (_, Some(name)) => name.to_string(),
                    (ModelKind::Unclassified, None) => {
                        format!("{}_{}", short, NEXT_UID.fetch_add(1, Ordering::Relaxed))
                    }
                    (ModelKind::Store | ModelKind::ViewModel, None) => short.to_string(),
                };
                tracing::debug!(name = %name, kind = %M::KIND, "Model registered");
                ModelMeta {
                    kind: M::KIND,
                    name,
                    type_name,
                }
            })
            .clone()
    }

    /// Name assigned to `M`, if it has been described already
    pub fn assigned_name<M: Model>() -> Option<String> {
        REGISTRY
            .read()
            .get(&TypeId::of::<M>())
            .map(|meta| meta.name.clone())
    }

    /// Number of registered model types
    pub fn len() -> usize {
        REGISTRY.read().len()
    }
}

/// `my_crate::models::Counter<T>` -> `Counter`
pub(crate) fn short_type_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}
