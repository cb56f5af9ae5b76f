use core::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use crate::{
    context::BindingId,
    dependency::Dependency,
    dependency_resolver::Requirement,
    factory::InternalFactory,
    key::Key,
    proxy::ProxyFactory,
    scope::Scope,
    singleton::{Coordinator, SingletonFactory},
    source::Source,
};

/// How a binding produces its instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// A pre-built value.
    Instance,
    /// A closure or a provider object.
    ProviderInstance,
    /// A provider bound under the given key.
    ProviderKey(Key),
    /// An alias of another key.
    Linked(Key),
    /// The key's own constructor.
    Constructor,
    /// Declared without a target, built with the key's own constructor.
    Untargetted,
    /// Re-published from a private child container.
    Exposed,
}

/// A key mapped to the way of building it, as resolved by a container.
pub struct Binding {
    pub(crate) id: BindingId,
    pub(crate) key: Key,
    pub(crate) source: Source,
    pub(crate) scope: Scope,
    pub(crate) kind: BindingKind,
    pub(crate) factory: Arc<dyn InternalFactory>,
    /// Creates stand-ins when the key is requested while being constructed.
    pub(crate) proxy: Option<ProxyFactory>,
    pub(crate) requirements: Vec<Requirement>,
    /// Bootstrap bindings, invisible to listeners.
    pub(crate) internal: bool,
}

impl Binding {
    /// Builds a binding, caching its instances through `coordinator` if `scope` is a singleton scope.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        key: Key,
        source: Source,
        scope: Scope,
        kind: BindingKind,
        factory: Arc<dyn InternalFactory>,
        requirements: Vec<Requirement>,
        proxy: Option<ProxyFactory>,
        coordinator: &Arc<Coordinator>,
    ) -> Self {
        let factory = if scope.is_singleton() && kind != BindingKind::Instance {
            Arc::new(SingletonFactory::new(factory, key, coordinator.clone())) as Arc<dyn InternalFactory>
        } else {
            factory
        };
        let requirements = requirements
            .into_iter()
            .map(|mut requirement| {
                requirement.dependency = requirement.dependency.with_injection_point(Some(key));
                requirement
            })
            .collect();

        Self {
            id: coordinator.next_binding_id(),
            key,
            source,
            scope,
            kind,
            factory,
            proxy,
            requirements,
            internal: false,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Where the binding was declared, unknown for implicit and bootstrap bindings.
    #[inline]
    #[must_use]
    pub fn source(&self) -> Source {
        self.source
    }

    #[inline]
    #[must_use]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> BindingKind {
        self.kind
    }

    /// Whether requesting the key while it's being constructed yields a stand-in instead of an error.
    #[inline]
    #[must_use]
    pub fn is_proxyable(&self) -> bool {
        self.proxy.is_some()
    }

    /// Dependencies known before construction, in declaration order.
    #[must_use]
    pub fn dependencies(&self) -> Vec<Dependency> {
        self.requirements
            .iter()
            .map(|requirement| requirement.dependency.clone())
            .collect()
    }
}

impl Debug for Binding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("key", &self.key)
            .field("source", &self.source)
            .field("scope", &self.scope)
            .field("kind", &self.kind)
            .field("proxyable", &self.is_proxyable())
            .finish_non_exhaustive()
    }
}
