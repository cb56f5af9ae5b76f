use core::{
    marker::PhantomData,
    ops::{Deref, DerefMut},
};
use std::sync::Arc;

use crate::{
    binding::{Binding, BindingKind},
    dependency::Dependency,
    dependency_resolver::{DependencyResolver, Requirement},
    errors::InstantiateErrorKind,
    initializer::Initializable,
    injectable::{ConstructorRecipe, Injectable},
    instance::Instance,
    instantiator::{boxed_instantiator, boxed_provider, keyed_provider, BoxedInstantiator, Instantiator, Provider},
    intercept::{Interceptor, InterceptorBinding},
    key::{Key, Qualifier},
    listener::{ListenerBinding, ProvisionListener},
    proxy::{proxy_factory, Proxied, ProxyFactory, Upcast},
    scope::Scope,
    source::Source,
};

/// A reusable set of declarations.
pub trait Module {
    fn configure(&self, binder: &mut Binder);
}

impl<F> Module for F
where
    F: Fn(&mut Binder),
{
    #[inline]
    fn configure(&self, binder: &mut Binder) {
        self(binder);
    }
}

pub(crate) enum Target {
    None,
    Instance {
        instance: Instance,
        members: Option<Arc<Initializable>>,
    },
    Provider {
        instantiator: BoxedInstantiator,
        requirements: Vec<Requirement>,
        kind: BindingKind,
        members: Option<Arc<Initializable>>,
    },
    Linked {
        target: Key,
        recipe: Option<ConstructorRecipe>,
        upcast: Upcast,
    },
    Constructor(ConstructorRecipe),
    Untargetted(ConstructorRecipe),
}

pub(crate) struct Declaration {
    pub(crate) key: Key,
    pub(crate) source: Source,
    /// `None` falls back to the scope of the constructed type, or unscoped.
    pub(crate) scope: Option<Scope>,
    pub(crate) target: Target,
    pub(crate) proxy: Option<ProxyFactory>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OptionElement {
    RequireExplicitBindings,
    DisableCircularProxies,
    RequireAtInjectOnConstructors,
}

pub(crate) struct PrivateElements {
    pub(crate) elements: Vec<Element>,
    pub(crate) exposures: Vec<(Key, Source)>,
}

/// A configuration error reported by the user.
pub(crate) struct Message {
    pub(crate) error: anyhow::Error,
    pub(crate) source: Source,
}

pub(crate) enum Element {
    Binding(Declaration),
    Message(Message),
    InjectionRequest(Arc<Initializable>),
    Option(OptionElement),
    Listener(ListenerBinding),
    Interceptor(InterceptorBinding),
    Private(PrivateElements),
}

/// Records declarations in order, to be turned into a container by [`crate::ContainerBuilder::build`].
///
/// Nothing is checked while recording: every problem is reported by the build at once.
#[derive(Default)]
pub struct Binder {
    elements: Vec<Element>,
}

impl Binder {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub(crate) fn into_elements(self) -> Vec<Element> {
        self.elements
    }

    #[inline]
    #[track_caller]
    pub fn bind<T: ?Sized + Send + Sync + 'static>(&mut self) -> BindingBuilder<'_, T> {
        self.bind_key(Key::of::<T>())
    }

    #[inline]
    #[track_caller]
    pub fn bind_named<T: ?Sized + Send + Sync + 'static>(&mut self, name: &'static str) -> BindingBuilder<'_, T> {
        self.bind_key(Key::named::<T>(name))
    }

    #[inline]
    #[track_caller]
    pub fn bind_qualified<T: ?Sized + Send + Sync + 'static, Q: Qualifier>(&mut self) -> BindingBuilder<'_, T> {
        self.bind_key(Key::qualified::<T, Q>())
    }

    #[track_caller]
    fn bind_key<T: ?Sized + Send + Sync + 'static>(&mut self, key: Key) -> BindingBuilder<'_, T> {
        self.elements.push(Element::Binding(Declaration {
            key,
            source: Source::caller(),
            scope: None,
            target: Target::None,
            proxy: None,
        }));
        BindingBuilder {
            index: self.elements.len() - 1,
            binder: self,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn install<M: Module>(&mut self, module: M) -> &mut Self {
        module.configure(self);
        self
    }

    /// Disables implicit bindings in the container and its children.
    #[inline]
    pub fn require_explicit_bindings(&mut self) -> &mut Self {
        self.elements.push(Element::Option(OptionElement::RequireExplicitBindings));
        self
    }

    /// Makes dependency cycles fail instead of being broken with stand-in proxies.
    #[inline]
    pub fn disable_circular_proxies(&mut self) -> &mut Self {
        self.elements.push(Element::Option(OptionElement::DisableCircularProxies));
        self
    }

    /// Allows constructor bindings only for types with [`Injectable::INJECT_CONSTRUCTOR`] set.
    #[inline]
    pub fn require_at_inject_on_constructors(&mut self) -> &mut Self {
        self.elements.push(Element::Option(OptionElement::RequireAtInjectOnConstructors));
        self
    }

    /// Reports a configuration error, failing the build along with every other problem found.
    #[track_caller]
    pub fn add_error<E: Into<anyhow::Error>>(&mut self, error: E) -> &mut Self {
        self.elements.push(Element::Message(Message {
            error: error.into(),
            source: Source::caller(),
        }));
        self
    }

    /// Injects the members of `instance` when the container is built.
    #[track_caller]
    pub fn request_injection<T: Injectable>(&mut self, instance: Arc<T>) -> &mut Self {
        let initializable = Initializable::new(instance, Key::of::<T>(), Source::caller());
        self.elements.push(Element::InjectionRequest(Arc::new(initializable)));
        self
    }

    /// Calls `listener` around the provisioning of every binding accepted by `matcher`.
    #[track_caller]
    pub fn bind_listener<M, L>(&mut self, matcher: M, listener: L) -> &mut Self
    where
        M: Fn(&Binding) -> bool + Send + Sync + 'static,
        L: ProvisionListener,
    {
        self.elements.push(Element::Listener(ListenerBinding {
            matcher: Arc::new(matcher),
            listener: Arc::new(listener),
            source: Source::caller(),
        }));
        self
    }

    /// Passes every `T` constructed for a key accepted by `matcher` through `interceptor`.
    #[track_caller]
    pub fn bind_interceptor<T, M, I>(&mut self, matcher: M, interceptor: I) -> &mut Self
    where
        T: Send + Sync + 'static,
        M: Fn(&Key) -> bool + Send + Sync + 'static,
        I: Interceptor<T>,
    {
        self.elements
            .push(Element::Interceptor(InterceptorBinding::new(interceptor, matcher, Source::caller())));
        self
    }

    /// Declares a private environment: a child container whose bindings are hidden
    /// from this one, except for the keys it exposes.
    pub fn private<F>(&mut self, configure: F) -> &mut Self
    where
        F: FnOnce(&mut PrivateBinder),
    {
        let mut private = PrivateBinder {
            binder: Binder::new(),
            exposures: Vec::new(),
        };
        configure(&mut private);

        self.elements.push(Element::Private(PrivateElements {
            elements: private.binder.elements,
            exposures: private.exposures,
        }));
        self
    }
}

/// Binder of a private environment.
pub struct PrivateBinder {
    binder: Binder,
    exposures: Vec<(Key, Source)>,
}

impl PrivateBinder {
    #[inline]
    #[track_caller]
    pub fn expose<T: ?Sized + 'static>(&mut self) -> &mut Self {
        self.expose_key(Key::of::<T>())
    }

    #[inline]
    #[track_caller]
    pub fn expose_named<T: ?Sized + 'static>(&mut self, name: &'static str) -> &mut Self {
        self.expose_key(Key::named::<T>(name))
    }

    #[inline]
    #[track_caller]
    pub fn expose_qualified<T: ?Sized + 'static, Q: Qualifier>(&mut self) -> &mut Self {
        self.expose_key(Key::qualified::<T, Q>())
    }

    /// Binds `key` in the enclosing container to the binding of `key` in this environment.
    #[track_caller]
    pub fn expose_key(&mut self, key: Key) -> &mut Self {
        self.exposures.push((key, Source::caller()));
        self
    }
}

impl Deref for PrivateBinder {
    type Target = Binder;

    fn deref(&self) -> &Self::Target {
        &self.binder
    }
}

impl DerefMut for PrivateBinder {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.binder
    }
}

fn erase_upcast<U, T>(upcast: fn(Arc<U>) -> Arc<T>) -> Upcast
where
    U: ?Sized + Send + Sync + 'static,
    T: ?Sized + Send + Sync + 'static,
{
    Arc::new(move |instance: Instance| Ok(Instance::from_option(instance.downcast::<U>()?.map(upcast))))
}

/// Sets the target, scope and proxying of one declaration.
///
/// A declaration left without a target fails the build.
pub struct BindingBuilder<'a, T: ?Sized> {
    binder: &'a mut Binder,
    index: usize,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> BindingBuilder<'_, T> {
    fn update(self, f: impl FnOnce(&mut Declaration)) -> Self {
        if let Some(Element::Binding(declaration)) = self.binder.elements.get_mut(self.index) {
            f(declaration);
        }
        self
    }

    #[inline]
    pub fn to_instance<V: Into<Arc<T>>>(self, value: V) -> Self {
        let instance = Instance::new::<T>(value.into());
        self.update(|declaration| {
            declaration.target = Target::Instance { instance, members: None };
        })
    }

    /// Like [`Self::to_instance`], and injects the members of `value` before its first use.
    pub fn to_injected_instance<V: Into<Arc<T>>>(self, value: V) -> Self
    where
        T: Injectable,
    {
        let value = value.into();
        self.update(|declaration| {
            let members = Initializable::new(value.clone(), declaration.key, declaration.source);
            declaration.target = Target::Instance {
                instance: Instance::new(value),
                members: Some(Arc::new(members)),
            };
        })
    }

    /// Binds to a closure whose arguments are resolved from the container on every provisioning.
    pub fn to_provider<Inst, Deps>(self, instantiator: Inst) -> Self
    where
        Inst: Instantiator<Deps, Error = InstantiateErrorKind>,
        Inst::Provides: Into<Arc<T>>,
        Deps: DependencyResolver,
    {
        let target = Target::Provider {
            instantiator: boxed_instantiator(instantiator, |provided: Inst::Provides| Instance::new::<T>(provided.into())),
            requirements: Deps::requirements(),
            kind: BindingKind::ProviderInstance,
            members: None,
        };
        self.update(|declaration| declaration.target = target)
    }

    /// Like [`Self::to_provider`], but the closure may return `None`,
    /// which is only accepted by nullable dependencies.
    pub fn to_nullable_provider<Inst, Deps>(self, instantiator: Inst) -> Self
    where
        Inst: Instantiator<Deps, Error = InstantiateErrorKind>,
        Inst::Provides: Into<Option<Arc<T>>>,
        Deps: DependencyResolver,
    {
        let target = Target::Provider {
            instantiator: boxed_instantiator(instantiator, |provided: Inst::Provides| Instance::from_option::<T>(provided.into())),
            requirements: Deps::requirements(),
            kind: BindingKind::ProviderInstance,
            members: None,
        };
        self.update(|declaration| declaration.target = target)
    }

    pub fn to_provider_instance<P: Provider<T>>(self, provider: P) -> Self {
        let target = Target::Provider {
            instantiator: boxed_provider::<T, P>(Arc::new(provider)),
            requirements: Vec::new(),
            kind: BindingKind::ProviderInstance,
            members: None,
        };
        self.update(|declaration| declaration.target = target)
    }

    /// Like [`Self::to_provider_instance`], and injects the members of `provider` before it's first called.
    pub fn to_injected_provider_instance<P: Provider<T> + Injectable>(self, provider: P) -> Self {
        let provider = Arc::new(provider);
        let instantiator = boxed_provider::<T, P>(provider.clone());
        self.update(|declaration| {
            let members = Initializable::new(provider, declaration.key, declaration.source);
            declaration.target = Target::Provider {
                instantiator,
                requirements: Vec::new(),
                kind: BindingKind::ProviderInstance,
                members: Some(Arc::new(members)),
            };
        })
    }

    /// Binds to the provider bound under `P`'s own key.
    pub fn to_provider_key<P: Provider<T>>(self) -> Self {
        let key = Key::of::<P>();
        let target = Target::Provider {
            instantiator: keyed_provider::<T, P>(key),
            requirements: vec![Requirement::new(Dependency::new(key))],
            kind: BindingKind::ProviderKey(key),
            members: None,
        };
        self.update(|declaration| declaration.target = target)
    }

    /// Links to the binding of `U`, binding `U` to its constructor if it isn't bound.
    pub fn to<U: Injectable>(self, upcast: fn(Arc<U>) -> Arc<T>) -> Self {
        let target = Target::Linked {
            target: Key::of::<U>(),
            recipe: Some(ConstructorRecipe::of::<U>()),
            upcast: erase_upcast(upcast),
        };
        self.update(|declaration| declaration.target = target)
    }

    /// Links to the binding of `key`, which has to be bound explicitly.
    pub fn to_key<U: ?Sized + Send + Sync + 'static>(self, key: Key, upcast: fn(Arc<U>) -> Arc<T>) -> Self {
        let target = Target::Linked {
            target: key,
            recipe: None,
            upcast: erase_upcast(upcast),
        };
        self.update(|declaration| declaration.target = target)
    }

    #[inline]
    pub fn to_constructor(self) -> Self
    where
        T: Injectable,
    {
        let recipe = ConstructorRecipe::of::<T>();
        self.update(|declaration| declaration.target = Target::Constructor(recipe))
    }

    /// Binds the key to its own constructor once every other binding is known.
    #[inline]
    pub fn untargetted(self) -> Self
    where
        T: Injectable,
    {
        let recipe = ConstructorRecipe::of::<T>();
        self.update(|declaration| declaration.target = Target::Untargetted(recipe))
    }

    #[inline]
    pub fn in_scope(self, scope: Scope) -> Self {
        self.update(|declaration| declaration.scope = Some(scope))
    }

    #[inline]
    pub fn as_eager_singleton(self) -> Self {
        self.in_scope(Scope::EagerSingleton)
    }

    /// Lets requests made while the key is being constructed receive a stand-in proxy.
    #[inline]
    pub fn proxyable(self) -> Self
    where
        T: Proxied,
    {
        self.update(|declaration| declaration.proxy = Some(proxy_factory::<T>()))
    }
}
