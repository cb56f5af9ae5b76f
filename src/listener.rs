use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, error};

use crate::{
    any::TypeInfo,
    binding::Binding,
    container::Container,
    context::InternalContext,
    dependency::DependencyChain,
    errors::{InstantiateErrorKind, ResolveErrorKind},
    instance::Instance,
    key::Key,
    source::Source,
};

/// Hook around the provisioning of the bindings it's bound to.
///
/// A listener either lets the provisioning happen, observing it through
/// [`ProvisionInvocation::provision`], or bypasses it with [`ProvisionInvocation::short_circuit`].
/// If it does neither, the provisioning happens after it returns.
pub trait ProvisionListener: Send + Sync + 'static {
    #[allow(clippy::missing_errors_doc)]
    fn on_provision(&self, invocation: &mut ProvisionInvocation<'_>) -> Result<(), InstantiateErrorKind>;
}

impl<F> ProvisionListener for F
where
    F: Fn(&mut ProvisionInvocation<'_>) -> Result<(), InstantiateErrorKind> + Send + Sync + 'static,
{
    fn on_provision(&self, invocation: &mut ProvisionInvocation<'_>) -> Result<(), InstantiateErrorKind> {
        self(invocation)
    }
}

pub(crate) type BindingMatcher = Arc<dyn Fn(&Binding) -> bool + Send + Sync>;

#[derive(Clone)]
pub(crate) struct ListenerBinding {
    pub(crate) matcher: BindingMatcher,
    pub(crate) listener: Arc<dyn ProvisionListener>,
    pub(crate) source: Source,
}

type Listeners = Arc<[Arc<dyn ProvisionListener>]>;

/// Listeners of a container, matched once per key.
pub(crate) struct ProvisionListenerStore {
    bindings: Vec<ListenerBinding>,
    cache: Mutex<HashMap<Key, Option<Listeners>>>,
}

impl ProvisionListenerStore {
    #[inline]
    #[must_use]
    pub(crate) fn new(bindings: Vec<ListenerBinding>) -> Self {
        Self {
            bindings,
            cache: Mutex::new(HashMap::new()),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn bindings(&self) -> &[ListenerBinding] {
        &self.bindings
    }

    /// Listeners interested in `binding`. Internal bindings are never matched.
    pub(crate) fn get(&self, binding: &Binding) -> Option<Listeners> {
        if binding.internal || self.bindings.is_empty() {
            return None;
        }
        if let Some(listeners) = self.cache.lock().get(&binding.key) {
            return listeners.clone();
        }

        let matched: Vec<_> = self
            .bindings
            .iter()
            .filter(|listener| (listener.matcher)(binding))
            .map(|listener| {
                debug!(key = %binding.key, source = %listener.source, "Listener matched");
                listener.listener.clone()
            })
            .collect();
        let listeners = if matched.is_empty() { None } else { Some(Listeners::from(matched)) };

        self.cache.lock().entry(binding.key).or_insert(listeners).clone()
    }

    /// Forgets the listeners of a key whose binding turned out to be invalid.
    pub(crate) fn remove(&self, key: &Key) -> bool {
        self.cache.lock().remove(key).is_some()
    }
}

/// Runs `provision` through the listeners of `binding`, if any.
pub(crate) fn provision(
    owner: &Container,
    binding: &Binding,
    ctx: &mut InternalContext,
    provision: &mut dyn FnMut(&mut InternalContext) -> Result<Instance, ResolveErrorKind>,
) -> Result<Instance, ResolveErrorKind> {
    let Some(listeners) = owner.listeners().get(binding) else {
        return provision(ctx);
    };

    let chain = ctx.chain();
    let mut invocation = ProvisionInvocation {
        binding,
        listeners: &listeners,
        next: 0,
        result: None,
        chain,
        provision: &mut || provision(ctx),
    };
    invocation.provision()
}

/// A provisioning passed through the listeners of a binding.
pub struct ProvisionInvocation<'a> {
    binding: &'a Binding,
    listeners: &'a [Arc<dyn ProvisionListener>],
    next: usize,
    result: Option<Instance>,
    chain: DependencyChain,
    provision: &'a mut dyn FnMut() -> Result<Instance, ResolveErrorKind>,
}

impl ProvisionInvocation<'_> {
    #[inline]
    #[must_use]
    pub fn binding(&self) -> &Binding {
        self.binding
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> &Key {
        &self.binding.key
    }

    /// Dependency chain that led to this provisioning.
    #[inline]
    #[must_use]
    pub fn chain(&self) -> &DependencyChain {
        &self.chain
    }

    /// Runs the remaining listeners and the provisioning itself.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::AlreadyProvisioned`] if called again after the instance was provided.
    pub fn provision(&mut self) -> Result<Instance, ResolveErrorKind> {
        if self.result.is_some() || self.next > self.listeners.len() {
            let err = ResolveErrorKind::AlreadyProvisioned { key: self.binding.key };
            error!("{}", err);
            return Err(err);
        }

        let index = self.next;
        self.next += 1;
        if index == self.listeners.len() {
            let instance = (self.provision)()?;
            self.result = Some(instance.clone());
            return Ok(instance);
        }

        let listener = self.listeners[index].clone();
        if let Err(err) = listener.on_provision(self) {
            return Err(match err {
                InstantiateErrorKind::Resolve(err) => *err,
                err @ InstantiateErrorKind::Custom(_) => {
                    let err = ResolveErrorKind::Listener {
                        key: self.binding.key,
                        chain: self.chain.clone(),
                        error: err,
                    };
                    error!("{}", err);
                    err
                }
            });
        }

        match &self.result {
            Some(instance) => Ok(instance.clone()),
            // The listener neither provisioned nor short-circuited
            None => self.provision(),
        }
    }

    /// Provides `value` in place of the provisioning, skipping the remaining listeners.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::AlreadyProvisioned`] if the instance was already provided.
    /// - Returns [`ResolveErrorKind::IncorrectType`] if `T` isn't the type of the binding.
    pub fn short_circuit<T: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<T>) -> Result<(), ResolveErrorKind> {
        if self.result.is_some() {
            return Err(ResolveErrorKind::AlreadyProvisioned { key: self.binding.key });
        }
        if TypeInfo::of::<T>() != self.binding.key.type_info {
            return Err(ResolveErrorKind::IncorrectType {
                expected: self.binding.key.type_info,
                actual: TypeInfo::of::<T>(),
            });
        }

        debug!(key = %self.binding.key, "Provisioning short-circuited");
        self.result = Some(Instance::new(value));
        self.next = self.listeners.len() + 1;
        Ok(())
    }
}
