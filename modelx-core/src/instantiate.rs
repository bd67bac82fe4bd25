//! Kind-aware resolution of model instances
//!
//! [`instantiate`] looks at a model's declared kind and derives the cache key
//! from it: the scope follows the kind (view-models are per owner, everything
//! else a singleton) and the name is the model's stable or generated name.

use crate::error::InjectResult;
use crate::injector::Injector;
use crate::model::{Model, ModelRegistry};
use modelx_types::{ModelKey, ModelKind, OwnerId, Scope};
use std::rc::Rc;

/// Strategy for resolving stores and view-models
///
/// Implementations must go through the injector's cache and return the
/// same instance for the same key.
pub trait ScopeInitializer {
    fn initialize_store<M: Model>(
        &self,
        injector: &Injector,
        key: ModelKey,
        args: M::Args,
    ) -> InjectResult<Rc<M>>;

    fn initialize_view_model<M: Model>(
        &self,
        injector: &Injector,
        key: ModelKey,
        owner: Option<OwnerId>,
        args: M::Args,
    ) -> InjectResult<Rc<M>>;
}

/// Stock initializer: resolves under the given key, binding view-models to
/// the requesting owner
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultInitializer;

impl ScopeInitializer for DefaultInitializer {
    fn initialize_store<M: Model>(
        &self,
        injector: &Injector,
        key: ModelKey,
        args: M::Args,
    ) -> InjectResult<Rc<M>> {
        injector.get::<M>(key, args)
    }

    fn initialize_view_model<M: Model>(
        &self,
        injector: &Injector,
        key: ModelKey,
        owner: Option<OwnerId>,
        args: M::Args,
    ) -> InjectResult<Rc<M>> {
        let instance = injector.get::<M>(key.clone(), args)?;
        if let Some(owner) = owner {
            injector.bind_owner(&key, owner);
        }
        Ok(instance)
    }
}

/// Resolves models against one injector, optionally on behalf of an owner
pub struct Instantiator<'a, I = DefaultInitializer> {
    injector: &'a Injector,
    initializer: I,
    owner: Option<OwnerId>,
}

impl<'a> Instantiator<'a, DefaultInitializer> {
    pub fn new(injector: &'a Injector) -> Self {
        Self::with_initializer(injector, DefaultInitializer)
    }
}

impl<'a, I: ScopeInitializer> Instantiator<'a, I> {
    pub fn with_initializer(injector: &'a Injector, initializer: I) -> Self {
        Instantiator {
            injector,
            initializer,
            owner: None,
        }
    }

    /// Resolve view-models on behalf of `owner`
    pub fn for_owner(mut self, owner: OwnerId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn instantiate<M: Model>(&self, args: M::Args) -> InjectResult<Rc<M>> {
        let meta = ModelRegistry::describe::<M>();
        let key = ModelKey::new(meta.name, Scope::from(meta.kind));
        match meta.kind {
            ModelKind::Store => self
                .initializer
                .initialize_store::<M>(self.injector, key, args),
            ModelKind::ViewModel => self
                .initializer
                .initialize_view_model::<M>(self.injector, key, self.owner, args),
            ModelKind::Unclassified => self.injector.get::<M>(key, args),
        }
    }
}

/// Resolve `M` against `injector` with the stock initializer
pub fn instantiate<M: Model>(injector: &Injector, args: M::Args) -> InjectResult<Rc<M>> {
    Instantiator::new(injector).instantiate::<M>(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ObjectNode;
    use modelx_reactive::Graph;
    use std::cell::Cell;

    struct Session {
        state: ObjectNode,
    }

    impl Model for Session {
        const KIND: ModelKind = ModelKind::Store;
        type Args = ();

        fn create(graph: &Graph, _: ()) -> anyhow::Result<Self> {
            Ok(Session {
                state: ObjectNode::new(graph),
            })
        }

        fn state(&self) -> &ObjectNode {
            &self.state
        }
    }

    struct Editor {
        state: ObjectNode,
    }

    impl Model for Editor {
        const KIND: ModelKind = ModelKind::ViewModel;
        const STABLE_NAME: Option<&'static str> = Some("editor");
        type Args = ();

        fn create(graph: &Graph, _: ()) -> anyhow::Result<Self> {
            Ok(Editor {
                state: ObjectNode::new(graph),
            })
        }

        fn state(&self) -> &ObjectNode {
            &self.state
        }
    }

    #[derive(Default)]
    struct CountingInitializer {
        stores: Cell<u32>,
    }

    impl ScopeInitializer for &CountingInitializer {
        fn initialize_store<M: Model>(
            &self,
            injector: &Injector,
            key: ModelKey,
            args: M::Args,
        ) -> InjectResult<Rc<M>> {
            self.stores.set(self.stores.get() + 1);
            DefaultInitializer.initialize_store::<M>(injector, key, args)
        }

        fn initialize_view_model<M: Model>(
            &self,
            injector: &Injector,
            key: ModelKey,
            owner: Option<OwnerId>,
            args: M::Args,
        ) -> InjectResult<Rc<M>> {
            DefaultInitializer.initialize_view_model::<M>(injector, key, owner, args)
        }
    }

    #[test]
    fn test_store_is_singleton_keyed_by_type_name() {
        let injector = Injector::new_instance();
        let first = instantiate::<Session>(&injector, ()).unwrap();
        let second = instantiate::<Session>(&injector, ()).unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert!(injector.contains(&ModelKey::singleton("Session")));
    }

    #[test]
    fn test_view_model_is_released_with_owner() {
        let injector = Injector::new_instance();
        let owner = OwnerId::new(7);

        Instantiator::new(&injector)
            .for_owner(owner)
            .instantiate::<Editor>(())
            .unwrap();
        assert!(injector.contains(&ModelKey::per_owner("editor")));

        assert_eq!(injector.release_owner(owner), 1);
        assert!(injector.is_empty());
    }

    #[test]
    fn test_view_model_outlives_all_but_last_owner() {
        let injector = Injector::new_instance();
        let key = ModelKey::per_owner("editor");
        let (first, second) = (OwnerId::new(1), OwnerId::new(2));

        // Release in both orders; the instance goes with whichever is last
        for (early, late) in [(second, first), (first, second)] {
            let a = Instantiator::new(&injector)
                .for_owner(first)
                .instantiate::<Editor>(())
                .unwrap();
            let b = Instantiator::new(&injector)
                .for_owner(second)
                .instantiate::<Editor>(())
                .unwrap();
            assert!(Rc::ptr_eq(&a, &b));
            assert_eq!(injector.owners(&key), vec![first, second]);

            assert_eq!(injector.release_owner(early), 0);
            assert!(injector.contains(&key));
            assert_eq!(injector.owners(&key), vec![late]);

            assert_eq!(injector.release_owner(late), 1);
            assert!(!injector.contains(&key));
        }
    }

    #[test]
    fn test_key_scope_follows_kind() {
        let injector = Injector::new_instance();
        instantiate::<Session>(&injector, ()).unwrap();
        instantiate::<Editor>(&injector, ()).unwrap();

        assert!(injector.contains(&ModelKey::new("Session", Scope::from(ModelKind::Store))));
        assert!(!injector.contains(&ModelKey::singleton("editor")));
        assert!(injector.contains(&ModelKey::per_owner("editor")));
    }

    #[test]
    fn test_custom_initializer_is_used_for_stores() {
        let injector = Injector::new_instance();
        let counting = CountingInitializer::default();

        let instantiator = Instantiator::with_initializer(&injector, &counting);
        instantiator.instantiate::<Session>(()).unwrap();
        instantiator.instantiate::<Editor>(()).unwrap();

        assert_eq!(counting.stores.get(), 1);
        assert_eq!(injector.len(), 2);
    }
}
