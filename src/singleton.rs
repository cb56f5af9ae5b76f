//! Singleton cells and the coordinator that keeps their construction deadlock-free across threads.

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread::{self, ThreadId},
};
use tracing::{debug, error, warn};

use crate::{
    binding::Binding,
    construction::ConstructionContext,
    container::Container,
    context::{BindingId, InternalContext},
    dependency::DependencyChain,
    errors::{CycleReport, ResolveErrorKind, ThreadCycle},
    factory::{incorrect_type, InternalFactory, Request},
    instance::Instance,
    key::Key,
    lock::{CycleDetectingLock, CycleDetectingLockFactory, LocksCycle},
};

struct ThreadRecord {
    name: Option<String>,
    /// Chains of the singleton requests in flight on the thread, innermost last.
    chains: Vec<DependencyChain>,
}

/// Shared by every container of one tree.
///
/// Owns the lock graph of the singleton cells and the published dependency chain of each thread
/// that is requesting a singleton, used to describe cross-thread cycles.
pub(crate) struct Coordinator {
    locks: CycleDetectingLockFactory<Key>,
    threads: Mutex<HashMap<ThreadId, ThreadRecord>>,
    next_binding_id: AtomicU64,
}

impl Coordinator {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            locks: CycleDetectingLockFactory::new(),
            threads: Mutex::new(HashMap::new()),
            next_binding_id: AtomicU64::new(0),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn next_binding_id(&self) -> BindingId {
        self.next_binding_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Publishes the chain of the current thread until the returned guard is dropped.
    #[must_use]
    pub(crate) fn register(&self, chain: DependencyChain) -> Registration<'_> {
        let current = thread::current();
        self.threads
            .lock()
            .entry(current.id())
            .or_insert_with(|| ThreadRecord {
                name: current.name().map(ToOwned::to_owned),
                chains: Vec::new(),
            })
            .chains
            .push(chain);

        Registration {
            coordinator: self,
            thread: current.id(),
        }
    }

    #[must_use]
    pub(crate) fn report(&self, requested: Key, cycle: LocksCycle<Key>) -> CycleReport {
        let threads = self.threads.lock();
        CycleReport {
            requested,
            threads: cycle
                .into_iter()
                .map(|(thread, locked)| {
                    let record = threads.get(&thread);
                    ThreadCycle {
                        thread,
                        name: record.and_then(|record| record.name.clone()),
                        locked,
                        chain: record.and_then(|record| record.chains.last().cloned()),
                    }
                })
                .collect(),
        }
    }
}

pub(crate) struct Registration<'a> {
    coordinator: &'a Coordinator,
    thread: ThreadId,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let mut threads = self.coordinator.threads.lock();
        if let Some(record) = threads.get_mut(&self.thread) {
            record.chains.pop();
            if record.chains.is_empty() {
                threads.remove(&self.thread);
            }
        }
    }
}

/// Caches the first instance of the wrapped factory.
///
/// The factory runs at most once per successful construction: concurrent callers wait for the
/// constructing thread, unless waiting would close a cycle between threads, in which case
/// they get a stand-in proxy (or an error if the key isn't proxyable).
/// A failed construction leaves the cell empty, so a later request tries again.
pub(crate) struct SingletonFactory {
    inner: Arc<dyn InternalFactory>,
    instance: OnceCell<Instance>,
    lock: CycleDetectingLock<Key>,
    /// Proxies handed to other threads while the instance is being constructed.
    construction: Mutex<ConstructionContext>,
    coordinator: Arc<Coordinator>,
}

impl SingletonFactory {
    #[must_use]
    pub(crate) fn new(inner: Arc<dyn InternalFactory>, key: Key, coordinator: Arc<Coordinator>) -> Self {
        Self {
            inner,
            instance: OnceCell::new(),
            lock: coordinator.locks.create(key),
            construction: Mutex::new(ConstructionContext::default()),
            coordinator,
        }
    }

    fn construct(&self, owner: &Container, binding: &Binding, ctx: &mut InternalContext, request: &Request) -> Result<Instance, ResolveErrorKind> {
        let instance = match self.inner.get(owner, binding, ctx, request) {
            Ok(instance) => instance,
            Err(err) => {
                self.construction.lock().finish_construction();
                return Err(err);
            }
        };
        // Issued by the constructor that closed a cycle on this thread, the real instance isn't ready yet
        if instance.is_proxy() {
            return Ok(instance);
        }

        let instance = self.instance.get_or_init(|| instance).clone();
        let mut construction = self.construction.lock();
        let delegated = construction.set_proxy_delegates(&instance);
        construction.finish_construction();
        delegated.map_err(|actual| incorrect_type(binding.key.type_info, actual))?;

        debug!("Cached");
        Ok(instance)
    }

    fn break_cycle(
        &self,
        owner: &Container,
        ctx: &InternalContext,
        request: &Request,
        cycle: LocksCycle<Key>,
    ) -> Result<Instance, ResolveErrorKind> {
        let mut construction = self.construction.lock();
        // The owner may have finished between the cycle check and now
        if let Some(instance) = self.instance.get() {
            return Ok(instance.clone());
        }

        let report = self.coordinator.report(request.dependency.key, cycle);
        if let Ok(proxy) = construction.create_proxy(owner.options(), request) {
            warn!("{}", report);
            return Ok(proxy);
        }

        let err = ResolveErrorKind::CrossThreadCycle {
            key: request.dependency.key,
            report,
            chain: ctx.chain(),
        };
        error!("{}", err);
        Err(err)
    }
}

impl InternalFactory for SingletonFactory {
    fn get(&self, owner: &Container, binding: &Binding, ctx: &mut InternalContext, request: &Request) -> Result<Instance, ResolveErrorKind> {
        if let Some(instance) = self.instance.get() {
            debug!("Found in cache");
            return Ok(instance.clone());
        }
        debug!("Not found in cache");

        let _registration = self.coordinator.register(ctx.chain());
        match self.lock.lock_or_detect_cycle() {
            Ok(_guard) => {
                // Constructed by the thread we waited for
                if let Some(instance) = self.instance.get() {
                    debug!("Found in cache");
                    return Ok(instance.clone());
                }
                self.construct(owner, binding, ctx, request)
            }
            Err(cycle) => self.break_cycle(owner, ctx, request, cycle),
        }
    }
}
