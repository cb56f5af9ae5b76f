use core::cell::RefCell;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Weak},
};
use tracing::{debug, error, info_span};

use crate::{
    any::TypeInfo,
    binder::{Binder, Module},
    binding::{Binding, BindingKind},
    config::{InjectorOptions, Stage},
    context::InternalContext,
    dependency::Dependency,
    errors::{CreationErrors, MissingReason, ResolveErrorKind},
    factory::{incorrect_type, Request},
    injectable::{ConstructorRecipe, Injectable},
    instance::Instance,
    intercept::InterceptorBinding,
    key::{Key, Qualifier},
    listener::ProvisionListenerStore,
    processor,
    singleton::Coordinator,
    source::Source,
};

pub(crate) enum Parent {
    Public(Container),
    /// A private environment is owned by its parent through the bindings it exposes.
    Private(Weak<ContainerInner>),
}

pub(crate) struct ContainerInner {
    pub(crate) parent: Option<Parent>,
    pub(crate) options: InjectorOptions,
    /// Explicit bindings, written only while the container tree is built.
    pub(crate) bindings: RwLock<BTreeMap<Key, Arc<Binding>>>,
    /// Implicit bindings. Reentrant, as validating an implicit binding may create others.
    pub(crate) jit: ReentrantMutex<RefCell<HashMap<Key, Arc<Binding>>>>,
    /// Keys bound in descendants, which this container refuses to bind implicitly.
    pub(crate) blacklist: Mutex<HashSet<Key>>,
    pub(crate) listeners: ProvisionListenerStore,
    pub(crate) interceptors: Vec<InterceptorBinding>,
    pub(crate) coordinator: Arc<Coordinator>,
}

/// A node of the container tree.
///
/// A container sees the bindings of its ancestors and may override them;
/// keys without a binding are bound implicitly to their own constructor,
/// unless explicit bindings are required.
/// Cloning is cheap: clones share the same bindings and singletons.
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

impl Container {
    #[inline]
    #[must_use]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder {
            parent: None,
            stage: Stage::default(),
            binder: Binder::new(),
        }
    }

    /// Creates a builder of a child container, which inherits the options and the stage of this one.
    #[inline]
    #[must_use]
    pub fn child_builder(&self) -> ContainerBuilder {
        ContainerBuilder {
            parent: Some(self.clone()),
            stage: self.inner.options.stage,
            binder: Binder::new(),
        }
    }

    /// # Errors
    /// Returns every problem found in the child's declarations.
    #[inline]
    pub fn create_child<M: Module>(&self, module: M) -> Result<Container, CreationErrors> {
        self.child_builder().install(module).build()
    }

    #[inline]
    #[must_use]
    pub(crate) fn from_inner(inner: Arc<ContainerInner>) -> Self {
        Self { inner }
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Container> {
        match self.inner.parent.as_ref()? {
            Parent::Public(parent) => Some(parent.clone()),
            Parent::Private(parent) => parent.upgrade().map(Container::from_inner),
        }
    }

    #[inline]
    #[must_use]
    pub fn options(&self) -> &InjectorOptions {
        &self.inner.options
    }

    #[inline]
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.inner.options.stage
    }

    #[inline]
    #[must_use]
    pub(crate) fn listeners(&self) -> &ProvisionListenerStore {
        &self.inner.listeners
    }

    pub(crate) fn interceptors_for<'a>(&'a self, key: &'a Key) -> impl Iterator<Item = &'a InterceptorBinding> + 'a {
        self.inner
            .interceptors
            .iter()
            .filter(move |interceptor| interceptor.matches(key))
    }

    fn ancestors(&self) -> impl Iterator<Item = Container> {
        core::iter::successors(Some(self.clone()), Container::parent)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        self.get_key(Key::of::<T>())
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn get_named<T: ?Sized + Send + Sync + 'static>(&self, name: &'static str) -> Result<Arc<T>, ResolveErrorKind> {
        self.get_key(Key::named::<T>(name))
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn get_qualified<T: ?Sized + Send + Sync + 'static, Q: Qualifier>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        self.get_key(Key::qualified::<T, Q>())
    }

    /// Gets the instance bound to `key`
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::MissingBinding`] if neither the container nor its ancestors bind `key`
    /// - Returns [`ResolveErrorKind::NullInjected`] if the provider of `key` returned null
    /// - Returns [`ResolveErrorKind::IncorrectType`] if `key` doesn't identify a `T`
    /// - Returns the error of any dependency that failed to be provided
    pub fn get_key<T: ?Sized + Send + Sync + 'static>(&self, key: Key) -> Result<Arc<T>, ResolveErrorKind> {
        let span = info_span!("get", %key);
        let _guard = span.enter();

        self.provide_required(&mut InternalContext::new(), Dependency::new(key), None)
    }

    /// Gets the instance bound to `T`, or `None` if its provider returned null
    #[allow(clippy::missing_errors_doc)]
    pub fn get_nullable<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>, ResolveErrorKind> {
        let key = Key::of::<T>();
        let span = info_span!("get_nullable", %key);
        let _guard = span.enter();

        self.provide_typed(&mut InternalContext::new(), Dependency::nullable(key), None)
    }

    /// Gets the instance bound to `T`, binding `T` to its constructor if it isn't bound.
    ///
    /// The implicit binding belongs to this container, so sibling containers each get their own,
    /// and a singleton-scoped `T` is constructed once per container that requested it.
    #[allow(clippy::missing_errors_doc)]
    pub fn get_implicit<T: Injectable>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        let recipe = ConstructorRecipe::of::<T>();
        let span = info_span!("get_implicit", key = %recipe.key());
        let _guard = span.enter();

        self.provide_required(&mut InternalContext::new(), Dependency::new(recipe.key()), Some(recipe))
    }

    /// Binding of `key` visible from this container, explicit or already created implicitly.
    #[must_use]
    pub fn get_binding(&self, key: &Key) -> Option<Arc<Binding>> {
        self.find_explicit(key)
            .or_else(|| self.find_implicit(key))
            .map(|(_, binding)| binding)
    }

    /// Binding of `T`, created implicitly if it doesn't exist yet.
    #[allow(clippy::missing_errors_doc)]
    pub fn get_implicit_binding<T: Injectable>(&self) -> Result<Arc<Binding>, ResolveErrorKind> {
        let recipe = ConstructorRecipe::of::<T>();
        self.lookup(&mut InternalContext::new(), recipe.key(), Some(recipe))
            .map(|(_, binding)| binding)
    }

    /// Explicit bindings of this container, ordered by key.
    #[must_use]
    pub fn bindings(&self) -> Vec<Arc<Binding>> {
        self.inner.bindings.read().values().cloned().collect()
    }
}

impl Container {
    fn find_explicit(&self, key: &Key) -> Option<(Container, Arc<Binding>)> {
        self.ancestors()
            .find_map(|container| {
                let binding = container.inner.bindings.read().get(key).cloned();
                binding.map(|binding| (container, binding))
            })
    }

    fn find_implicit(&self, key: &Key) -> Option<(Container, Arc<Binding>)> {
        self.ancestors().find_map(|container| {
            let binding = container.inner.jit.lock().borrow().get(key).cloned();
            binding.map(|binding| (container, binding))
        })
    }

    fn missing(ctx: &InternalContext, key: Key, reason: MissingReason) -> ResolveErrorKind {
        let err = ResolveErrorKind::MissingBinding {
            key,
            reason,
            chain: ctx.chain(),
        };
        error!("{}", err);
        err
    }

    /// Finds the binding of `key` and the container that declares it.
    ///
    /// Explicit bindings of the whole ancestry take precedence over implicit ones.
    /// Without either, `recipe` (if it builds `key`) is used to bind `key` implicitly in this container.
    pub(crate) fn lookup(
        &self,
        ctx: &mut InternalContext,
        key: Key,
        recipe: Option<ConstructorRecipe>,
    ) -> Result<(Container, Arc<Binding>), ResolveErrorKind> {
        if let Some(found) = self.find_explicit(&key).or_else(|| self.find_implicit(&key)) {
            return Ok(found);
        }

        match recipe.filter(|recipe| recipe.key() == key) {
            Some(recipe) => self.create_implicit(ctx, key, recipe),
            None => Err(Self::missing(ctx, key, MissingReason::NotBound)),
        }
    }

    fn create_implicit(
        &self,
        ctx: &mut InternalContext,
        key: Key,
        recipe: ConstructorRecipe,
    ) -> Result<(Container, Arc<Binding>), ResolveErrorKind> {
        let options = self.options();
        if options.jit_disabled {
            return Err(Self::missing(ctx, key, MissingReason::JitDisabled));
        }
        if options.at_inject_required && !recipe.inject_constructor {
            let err = ResolveErrorKind::MissingConstructorMarker { key, chain: ctx.chain() };
            error!("{}", err);
            return Err(err);
        }
        if self.inner.blacklist.lock().contains(&key) {
            return Err(Self::missing(ctx, key, MissingReason::BoundInChild));
        }

        let jit = self.inner.jit.lock();
        // Created by another thread while we were checking
        if let Some(binding) = jit.borrow().get(&key) {
            return Ok((self.clone(), binding.clone()));
        }

        let binding = Arc::new(Binding::new(
            key,
            Source::UNKNOWN,
            recipe.scope,
            BindingKind::Constructor,
            (recipe.factory)(),
            (recipe.requirements)(),
            None,
            &self.inner.coordinator,
        ));
        // Cached before validation, so that implicit bindings depending on each other terminate
        jit.borrow_mut().insert(key, binding.clone());
        debug!(%key, "Implicit binding created");

        if let Err(err) = self.validate(ctx, &binding) {
            jit.borrow_mut().remove(&key);
            self.inner.listeners.remove(&key);
            debug!(%key, "Invalid implicit binding removed");
            return Err(err);
        }

        Ok((self.clone(), binding))
    }

    /// Checks that every dependency of `binding` can be found, without provisioning anything.
    pub(crate) fn validate(&self, ctx: &mut InternalContext, binding: &Binding) -> Result<(), ResolveErrorKind> {
        for requirement in &binding.requirements {
            let mut frame = ctx.push(requirement.dependency.clone(), binding.source);
            self.lookup(&mut frame, requirement.dependency.key, requirement.recipe)?;
        }
        Ok(())
    }

    pub(crate) fn provide(
        &self,
        ctx: &mut InternalContext,
        dependency: Dependency,
        recipe: Option<ConstructorRecipe>,
    ) -> Result<Instance, ResolveErrorKind> {
        let (owner, binding) = self.lookup(ctx, dependency.key, recipe)?;

        let key = dependency.key;
        let nullable = dependency.nullable;
        let request = Request::new(dependency.clone(), binding.proxy);

        let mut frame = ctx.push(dependency, binding.source);
        let instance = binding.factory.get(&owner, &binding, &mut frame, &request)?;
        if instance.is_null() && !nullable {
            let err = ResolveErrorKind::NullInjected {
                key,
                binding_source: binding.source,
                chain: frame.chain(),
            };
            error!("{}", err);
            return Err(err);
        }

        debug!("Resolved");
        Ok(instance)
    }

    pub(crate) fn provide_typed<T: ?Sized + Send + Sync + 'static>(
        &self,
        ctx: &mut InternalContext,
        dependency: Dependency,
        recipe: Option<ConstructorRecipe>,
    ) -> Result<Option<Arc<T>>, ResolveErrorKind> {
        self.provide(ctx, dependency, recipe)?
            .downcast::<T>()
            .map_err(|actual| incorrect_type(TypeInfo::of::<T>(), actual))
    }

    pub(crate) fn provide_required<T: ?Sized + Send + Sync + 'static>(
        &self,
        ctx: &mut InternalContext,
        dependency: Dependency,
        recipe: Option<ConstructorRecipe>,
    ) -> Result<Arc<T>, ResolveErrorKind> {
        let key = dependency.key;
        let dependency = Dependency { nullable: false, ..dependency };
        // Nulls of non-nullable dependencies are rejected by `provide`
        self.provide_typed(ctx, dependency, recipe)?
            .ok_or_else(|| incorrect_type(key.type_info, TypeInfo::of::<()>()))
    }
}

/// Collects the declarations of a container.
pub struct ContainerBuilder {
    parent: Option<Container>,
    stage: Stage,
    binder: Binder,
}

impl ContainerBuilder {
    /// Stage of a root container. Children always use their parent's stage.
    #[inline]
    #[must_use]
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    #[inline]
    #[must_use]
    pub fn install<M: Module>(mut self, module: M) -> Self {
        module.configure(&mut self.binder);
        self
    }

    /// Builds the container, its private environments, and instantiates eager singletons.
    ///
    /// # Errors
    /// Returns every problem found in the declarations at once.
    pub fn build(self) -> Result<Container, CreationErrors> {
        processor::build(self.parent, self.stage, self.binder.into_elements())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use tracing_test::traced_test;

    use super::Container;
    use crate::{
        binder::Binder,
        binding::BindingKind,
        config::Stage,
        errors::{InstantiateErrorKind, MissingReason, ResolveErrorKind},
        inject::{Implicit, Inject, InjectNullable},
        injectable::Injectable,
        key::Key,
        logger::Logger,
    };

    struct Config {
        port: u16,
    }

    impl Injectable for Config {
        type Deps = ();

        fn construct((): ()) -> Result<Self, InstantiateErrorKind> {
            Ok(Config { port: 8080 })
        }
    }

    struct Server {
        config: Arc<Config>,
    }

    impl Injectable for Server {
        type Deps = (Implicit<Config>,);

        fn construct((Implicit(config),): Self::Deps) -> Result<Self, InstantiateErrorKind> {
            Ok(Server { config })
        }
    }

    #[test]
    #[traced_test]
    fn test_get_explicit() {
        let container = Container::builder()
            .install(|binder: &mut Binder| {
                binder.bind::<u16>().to_instance(80_u16);
                binder
                    .bind_named::<String>("address")
                    .to_provider(|Inject(port): Inject<u16>| Ok::<_, InstantiateErrorKind>(format!("0.0.0.0:{port}")));
            })
            .build()
            .unwrap();

        assert_eq!(*container.get::<u16>().unwrap(), 80);
        assert_eq!(*container.get_named::<String>("address").unwrap(), "0.0.0.0:80");
        assert!(logs_contain("Resolved"));
    }

    #[test]
    #[traced_test]
    fn test_missing_binding() {
        let container = Container::builder().build().unwrap();

        match container.get::<u16>() {
            Err(ResolveErrorKind::MissingBinding { key, reason, .. }) => {
                assert_eq!(key, Key::of::<u16>());
                assert_eq!(reason, MissingReason::NotBound);
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert!(logs_contain("No binding for u16 was found"));
    }

    #[test]
    #[traced_test]
    fn test_implicit_bindings_cached() {
        let container = Container::builder().build().unwrap();

        let server = container.get_implicit::<Server>().unwrap();
        assert_eq!(server.config.port, 8080);

        let first = container.get_implicit_binding::<Server>().unwrap();
        let second = container.get_implicit_binding::<Server>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.kind(), BindingKind::Constructor);
        assert!(!first.source().is_known());
        assert!(container.get_binding(&Key::of::<Config>()).is_some());
        assert!(logs_contain("Implicit binding created"));
    }

    struct Client {
        #[allow(dead_code)]
        token: Arc<u32>,
    }

    impl Injectable for Client {
        type Deps = (Inject<u32>,);

        fn construct((Inject(token),): Self::Deps) -> Result<Self, InstantiateErrorKind> {
            Ok(Client { token })
        }
    }

    #[test]
    #[traced_test]
    fn test_invalid_implicit_binding_removed() {
        let container = Container::builder().build().unwrap();

        match container.get_implicit::<Client>() {
            Err(ResolveErrorKind::MissingBinding { key, chain, .. }) => {
                assert_eq!(key, Key::of::<u32>());
                assert!(chain.contains(&Key::of::<u32>()));
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert!(container.get_binding(&Key::of::<Client>()).is_none());
        assert!(logs_contain("Invalid implicit binding removed"));
    }

    #[test]
    fn test_jit_disabled() {
        let container = Container::builder()
            .install(|binder: &mut Binder| {
                binder.require_explicit_bindings();
            })
            .build()
            .unwrap();

        assert!(matches!(
            container.get_implicit::<Config>(),
            Err(ResolveErrorKind::MissingBinding {
                reason: MissingReason::JitDisabled,
                ..
            }),
        ));
    }

    #[test]
    fn test_nullable() {
        let container = Container::builder()
            .install(|binder: &mut Binder| {
                binder.bind::<u16>().to_nullable_provider(|| Ok::<Option<Arc<u16>>, InstantiateErrorKind>(None));
                binder
                    .bind::<String>()
                    .to_provider(|InjectNullable(port): InjectNullable<u16>| {
                        Ok::<_, InstantiateErrorKind>(port.map_or("none".to_owned(), |port| port.to_string()))
                    });
            })
            .build()
            .unwrap();

        assert!(container.get_nullable::<u16>().unwrap().is_none());
        assert_eq!(*container.get::<String>().unwrap(), "none");
        assert!(matches!(container.get::<u16>(), Err(ResolveErrorKind::NullInjected { .. })));
    }

    #[test]
    fn test_special_bindings() {
        let container = Container::builder().stage(Stage::Tool).build().unwrap();

        assert_eq!(*container.get::<Stage>().unwrap(), Stage::Tool);
        assert!(Arc::ptr_eq(&container.get::<Container>().unwrap().inner, &container.inner));
        assert!(container.get::<Logger>().unwrap().injection_point().is_none());
        assert_eq!(container.bindings().len(), 3);
        assert!(container.parent().is_none());
    }

    #[test]
    fn test_child_overrides_parent() {
        let parent = Container::builder()
            .install(|binder: &mut Binder| {
                binder.bind::<u16>().to_instance(80_u16);
            })
            .build()
            .unwrap();
        let child = parent
            .create_child(|binder: &mut Binder| {
                binder.bind::<u16>().to_instance(443_u16);
            })
            .unwrap();

        assert_eq!(*parent.get::<u16>().unwrap(), 80);
        assert_eq!(*child.get::<u16>().unwrap(), 443);
        assert_eq!(child.stage(), parent.stage());
        assert!(child.parent().is_some());
    }
}
