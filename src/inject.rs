use core::marker::PhantomData;
use std::sync::Arc;

use crate::{
    context::Provision,
    dependency::Dependency,
    dependency_resolver::{DependencyResolver, Requirement},
    errors::ResolveErrorKind,
    injectable::Injectable,
    key::{Key, Qualifier},
};

/// Injects the instance bound to `Dep`.
pub struct Inject<Dep: ?Sized>(pub Arc<Dep>);

impl<Dep: ?Sized + Send + Sync + 'static> DependencyResolver for Inject<Dep> {
    type Error = ResolveErrorKind;

    fn resolve(provision: &mut Provision<'_>) -> Result<Self, Self::Error> {
        provision.get().map(Self)
    }

    fn requirements() -> Vec<Requirement> {
        vec![Requirement::new(Dependency::new(Key::of::<Dep>()))]
    }
}

/// Injects the instance bound to `Dep`, or `None` if its provider returned null.
pub struct InjectNullable<Dep: ?Sized>(pub Option<Arc<Dep>>);

impl<Dep: ?Sized + Send + Sync + 'static> DependencyResolver for InjectNullable<Dep> {
    type Error = ResolveErrorKind;

    fn resolve(provision: &mut Provision<'_>) -> Result<Self, Self::Error> {
        provision.get_nullable().map(Self)
    }

    fn requirements() -> Vec<Requirement> {
        vec![Requirement::new(Dependency::nullable(Key::of::<Dep>()))]
    }
}

/// Injects the instance bound to `Dep` qualified with `Q`.
pub struct Named<Dep: ?Sized, Q>(pub Arc<Dep>, pub PhantomData<Q>);

impl<Dep: ?Sized, Q> Named<Dep, Q> {
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Arc<Dep> {
        self.0
    }
}

impl<Dep: ?Sized + Send + Sync + 'static, Q: Qualifier> DependencyResolver for Named<Dep, Q> {
    type Error = ResolveErrorKind;

    fn resolve(provision: &mut Provision<'_>) -> Result<Self, Self::Error> {
        provision.get_qualified::<Dep, Q>().map(|dep| Self(dep, PhantomData))
    }

    fn requirements() -> Vec<Requirement> {
        vec![Requirement::new(Dependency::new(Key::qualified::<Dep, Q>()))]
    }
}

/// Injects `Dep`, binding it to its own constructor if it isn't bound.
pub struct Implicit<Dep>(pub Arc<Dep>);

impl<Dep: Injectable> DependencyResolver for Implicit<Dep> {
    type Error = ResolveErrorKind;

    fn resolve(provision: &mut Provision<'_>) -> Result<Self, Self::Error> {
        provision.get_implicit().map(Self)
    }

    fn requirements() -> Vec<Requirement> {
        vec![Requirement::implicit::<Dep>()]
    }
}
