//! Shared types for modelx
//!
//! This crate provides the identifiers used across the modelx crates:
//! model kinds, instance scopes, cache keys and owner handles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a managed model type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelKind {
    /// Process-wide singleton
    Store,

    /// Instance scoped to an owning component
    ViewModel,

    /// Helper type with no declared kind; memoized as a singleton
    #[default]
    Unclassified,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Store => write!(f, "store"),
            ModelKind::ViewModel => write!(f, "view-model"),
            ModelKind::Unclassified => write!(f, "unclassified"),
        }
    }
}

/// Lifetime scope of a cached instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    /// Lives as long as the injector
    Singleton,

    /// Lives as long as its owner
    PerOwner,
}

impl From<ModelKind> for Scope {
    fn from(kind: ModelKind) -> Self {
        match kind {
            ModelKind::ViewModel => Scope::PerOwner,
            ModelKind::Store | ModelKind::Unclassified => Scope::Singleton,
        }
    }
}

/// Cache key of an injector entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelKey {
    pub name: String,
    pub scope: Scope,
}

impl ModelKey {
    pub fn new(name: impl Into<String>, scope: Scope) -> Self {
        Self {
            name: name.into(),
            scope,
        }
    }

    pub fn singleton(name: impl Into<String>) -> Self {
        Self::new(name, Scope::Singleton)
    }

    pub fn per_owner(name: impl Into<String>) -> Self {
        Self::new(name, Scope::PerOwner)
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:?}", self.name, self.scope)
    }
}

/// Identifier of the component that owns per-owner instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(pub u64);

impl OwnerId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for OwnerId {
    fn from(id: u64) -> Self {
        OwnerId(id)
    }
}

impl From<OwnerId> for u64 {
    fn from(id: OwnerId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_from_kind() {
        assert_eq!(Scope::from(ModelKind::Store), Scope::Singleton);
        assert_eq!(Scope::from(ModelKind::ViewModel), Scope::PerOwner);
        assert_eq!(Scope::from(ModelKind::Unclassified), Scope::Singleton);
    }

    #[test]
    fn test_model_key_display() {
        let key = ModelKey::singleton("Counter");
        assert_eq!(key.to_string(), "Counter@Singleton");
        assert_eq!(key, ModelKey::new("Counter", Scope::Singleton));
    }

    #[test]
    fn test_owner_id_conversions() {
        let id: OwnerId = 7.into();
        assert_eq!(id, OwnerId::new(7));
        assert_eq!(u64::from(id), 7);
    }
}
