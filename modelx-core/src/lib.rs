//! Modelx Core - scoped model container and snapshot engine
//!
//! Models are plain Rust types whose fields live in observable state nodes.
//! An [`Injector`] resolves and caches them by stable name and scope, and
//! the [`snapshot`] engine turns the state of every cached model into a
//! plain JSON tree that can be captured, diffed, persisted and merged back.
//!
//! ## Key Features
//!
//! - **Scoped resolution**: stores are singletons, view-models are scoped
//!   to an owner, unclassified helpers are memoized under a generated name
//! - **Snapshots**: deep, detached `serde_json::Value` trees
//! - **Atomic patches**: merges run in one transaction with deletion
//!   semantics; listeners see one notification with the merged state
//! - **History**: bounded undo/redo over snapshots
//!
//! # Example
//!
//! ```rust
//! use modelx_core::{instantiate, Injector, Model, ModelKind, ObjectNode};
//! use modelx_core::snapshot::{get_model_snapshot, patch_snapshot};
//! use modelx_reactive::Graph;
//! use serde_json::json;
//!
//! struct Counter {
//!     state: ObjectNode,
//! }
//!
//! impl Model for Counter {
//!     const KIND: ModelKind = ModelKind::Store;
//!     type Args = ();
//!
//!     fn create(graph: &Graph, _: ()) -> anyhow::Result<Self> {
//!         Ok(Counter {
//!             state: ObjectNode::from_fields(graph, [("count", json!(0))]),
//!         })
//!     }
//!
//!     fn state(&self) -> &ObjectNode {
//!         &self.state
//!     }
//! }
//!
//! let injector = Injector::new_instance();
//! instantiate::<Counter>(&injector, ()).unwrap();
//!
//! patch_snapshot(&json!({"Counter": {"count": 5}}), &injector);
//! assert_eq!(get_model_snapshot("Counter", &injector), json!({"count": 5}));
//! ```

pub mod config;
pub mod error;
pub mod history;
pub mod injector;
pub mod instantiate;
pub mod model;
pub mod snapshot;
pub mod state;

pub use config::{is_strict, use_strict, Config, ConfigError};
pub use error::{InjectError, InjectResult, PersistError, PersistResult};
pub use history::{SnapshotHistory, DEFAULT_HISTORY_CAPACITY};
pub use injector::{get_injector, set_injector, Injector, StateGraph, WeakInjector};
pub use instantiate::{instantiate, DefaultInitializer, Instantiator, ScopeInitializer};
pub use model::{Model, ModelMeta, ModelRegistry};
pub use snapshot::SnapshotPhase;
pub use state::{ArrayNode, MapNode, Node, ObjectNode};

pub use modelx_types::{ModelKey, ModelKind, OwnerId, Scope};
