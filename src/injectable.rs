use core::{
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
};
use std::sync::Arc;

use crate::{
    any::TypeInfo,
    context::Provision,
    dependency_resolver::{DependencyResolver, Requirement},
    errors::InstantiateErrorKind,
    factory::{ConstructorFactory, InternalFactory},
    key::Key,
    scope::Scope,
};

/// A type that knows how to construct itself from its dependencies.
///
/// Such types can be bound to their own constructor and are bound implicitly when
/// requested through [`crate::Implicit`] or [`crate::Container::get_implicit`].
///
/// ```
/// use quiver::{Inject, Injectable, InstantiateErrorKind};
///
/// struct Config;
///
/// impl Injectable for Config {
///     type Deps = ();
///
///     fn construct((): ()) -> Result<Self, InstantiateErrorKind> {
///         Ok(Config)
///     }
/// }
///
/// struct Service(std::sync::Arc<Config>);
///
/// impl Injectable for Service {
///     type Deps = (Inject<Config>,);
///     const INJECT_CONSTRUCTOR: bool = true;
///
///     fn construct((Inject(config),): Self::Deps) -> Result<Self, InstantiateErrorKind> {
///         Ok(Service(config))
///     }
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    type Deps: DependencyResolver;

    /// Marks the constructor as meant for injection, required when the container
    /// is configured with [`crate::Binder::require_at_inject_on_constructors`].
    const INJECT_CONSTRUCTOR: bool = false;

    /// Scope of bindings to this constructor that don't declare their own.
    const SCOPE: Scope = Scope::Unscoped;

    #[allow(clippy::missing_errors_doc)]
    fn construct(deps: Self::Deps) -> Result<Self, InstantiateErrorKind>;

    /// Runs after construction. Requests for the same binding made from here
    /// receive the instance being injected.
    #[inline]
    #[allow(unused_variables, clippy::missing_errors_doc)]
    fn inject_members(&self, provision: &mut Provision<'_>) -> Result<(), InstantiateErrorKind> {
        Ok(())
    }
}

/// Type-erased description of how to bind an [`Injectable`] to its constructor.
#[derive(Clone, Copy)]
pub struct ConstructorRecipe {
    pub(crate) type_info: TypeInfo,
    pub(crate) inject_constructor: bool,
    pub(crate) scope: Scope,
    pub(crate) factory: fn() -> Arc<dyn InternalFactory>,
    pub(crate) requirements: fn() -> Vec<Requirement>,
}

impl ConstructorRecipe {
    #[inline]
    #[must_use]
    pub(crate) fn of<T: Injectable>() -> Self {
        Self {
            type_info: TypeInfo::of::<T>(),
            inject_constructor: T::INJECT_CONSTRUCTOR,
            scope: T::SCOPE,
            factory: || Arc::new(ConstructorFactory::<T>(PhantomData)) as Arc<dyn InternalFactory>,
            requirements: <T::Deps as DependencyResolver>::requirements,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn key(&self) -> Key {
        Key {
            type_info: self.type_info,
            qualifier: None,
        }
    }
}

impl Debug for ConstructorRecipe {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorRecipe")
            .field("type_info", &self.type_info)
            .field("inject_constructor", &self.inject_constructor)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
