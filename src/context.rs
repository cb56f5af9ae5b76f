use core::ops::{Deref, DerefMut};
use std::{collections::HashMap, sync::Arc};

use crate::{
    construction::ConstructionContext,
    container::Container,
    dependency::{Dependency, DependencyAndSource, DependencyChain},
    errors::ResolveErrorKind,
    injectable::{ConstructorRecipe, Injectable},
    key::{Key, Qualifier},
    source::Source,
};

pub(crate) type BindingId = u64;

/// State of one top-level request, confined to the calling thread.
#[derive(Default)]
pub(crate) struct InternalContext {
    stack: Vec<DependencyAndSource>,
    constructions: HashMap<BindingId, ConstructionContext>,
}

impl InternalContext {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Pushes an in-flight dependency, popped when the returned frame is dropped.
    #[inline]
    #[must_use]
    pub(crate) fn push(&mut self, dependency: Dependency, binding_source: Source) -> DependencyFrame<'_> {
        self.stack.push(DependencyAndSource {
            dependency,
            binding_source,
        });
        DependencyFrame { ctx: self }
    }

    #[inline]
    #[must_use]
    pub(crate) fn chain(&self) -> DependencyChain {
        DependencyChain(self.stack.clone())
    }

    #[inline]
    pub(crate) fn construction(&mut self, id: BindingId) -> &mut ConstructionContext {
        self.constructions.entry(id).or_default()
    }

    /// Drops the construction context of a binding once its provisioning finished or failed.
    #[inline]
    pub(crate) fn release_construction(&mut self, id: BindingId) {
        if let Some(mut construction) = self.constructions.remove(&id) {
            construction.finish_construction();
        }
    }
}

pub(crate) struct DependencyFrame<'a> {
    ctx: &'a mut InternalContext,
}

impl Deref for DependencyFrame<'_> {
    type Target = InternalContext;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for DependencyFrame<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for DependencyFrame<'_> {
    fn drop(&mut self) {
        self.ctx.stack.pop();
    }
}

/// Handle given to construction code to request further dependencies.
///
/// Requests made through it share the dependency chain and the circular-dependency
/// bookkeeping of the request that is being served.
pub struct Provision<'a> {
    container: &'a Container,
    ctx: &'a mut InternalContext,
    injection_point: Option<Key>,
}

impl<'a> Provision<'a> {
    #[inline]
    #[must_use]
    pub(crate) fn new(container: &'a Container, ctx: &'a mut InternalContext, injection_point: Option<Key>) -> Self {
        Self {
            container,
            ctx,
            injection_point,
        }
    }

    /// Container that declares the binding being served.
    #[inline]
    #[must_use]
    pub fn container(&self) -> &Container {
        self.container
    }

    /// Key whose construction is requesting dependencies.
    #[inline]
    #[must_use]
    pub fn injection_point(&self) -> Option<&Key> {
        self.injection_point.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn chain(&self) -> DependencyChain {
        self.ctx.chain()
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn get<T: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Arc<T>, ResolveErrorKind> {
        self.get_key(Key::of::<T>())
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn get_named<T: ?Sized + Send + Sync + 'static>(&mut self, name: &'static str) -> Result<Arc<T>, ResolveErrorKind> {
        self.get_key(Key::named::<T>(name))
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn get_qualified<T: ?Sized + Send + Sync + 'static, Q: Qualifier>(&mut self) -> Result<Arc<T>, ResolveErrorKind> {
        self.get_key(Key::qualified::<T, Q>())
    }

    /// # Errors
    /// Returns [`ResolveErrorKind::IncorrectType`] if `key` doesn't identify a `T`.
    pub fn get_key<T: ?Sized + Send + Sync + 'static>(&mut self, key: Key) -> Result<Arc<T>, ResolveErrorKind> {
        let dependency = Dependency::new(key).with_injection_point(self.injection_point);
        self.container.provide_required(self.ctx, dependency, None)
    }

    /// Like [`Self::get`], but a provider is allowed to return null.
    #[allow(clippy::missing_errors_doc)]
    pub fn get_nullable<T: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Option<Arc<T>>, ResolveErrorKind> {
        let dependency = Dependency::nullable(Key::of::<T>()).with_injection_point(self.injection_point);
        self.container.provide_typed(self.ctx, dependency, None)
    }

    /// Like [`Self::get`], but binds `T` implicitly if it isn't bound.
    #[allow(clippy::missing_errors_doc)]
    pub fn get_implicit<T: Injectable>(&mut self) -> Result<Arc<T>, ResolveErrorKind> {
        let dependency = Dependency::new(Key::of::<T>()).with_injection_point(self.injection_point);
        self.container
            .provide_required(self.ctx, dependency, Some(ConstructorRecipe::of::<T>()))
    }
}
