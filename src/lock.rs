//! Reentrant locks that refuse to block when blocking would close a wait-for cycle between threads.

use parking_lot::{Condvar, Mutex};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread::{self, ThreadId},
};
use tracing::debug;

type LockId = u64;

struct LockState<K> {
    key: K,
    owner: Option<ThreadId>,
    holds: usize,
}

/// Who owns and who waits for which lock, shared by every lock of one factory.
struct LockGraph<K> {
    locks: HashMap<LockId, LockState<K>>,
    waiting_on: HashMap<ThreadId, LockId>,
    /// Locks owned by each thread, in acquisition order.
    owned_by: HashMap<ThreadId, Vec<LockId>>,
}

impl<K: Clone> LockGraph<K> {
    /// Walks from the owner of `lock` through the locks each owner waits on.
    /// Returns the locks of every thread on the path if it leads back to `current`.
    fn detect_cycle(&self, current: ThreadId, lock: LockId) -> Vec<(ThreadId, Vec<K>)> {
        let mut cycle = Vec::new();
        let mut visited = HashSet::new();
        let mut lock = lock;

        loop {
            let Some(owner) = self.locks.get(&lock).and_then(|state| state.owner) else {
                return Vec::new();
            };
            if !visited.insert(owner) {
                return Vec::new();
            }

            let keys = self
                .owned_by
                .get(&owner)
                .map(|owned| {
                    owned
                        .iter()
                        .skip_while(|id| **id != lock)
                        .filter_map(|id| self.locks.get(id).map(|state| state.key.clone()))
                        .collect()
                })
                .unwrap_or_default();
            cycle.push((owner, keys));

            if owner == current {
                return cycle;
            }
            match self.waiting_on.get(&owner) {
                Some(next) => lock = *next,
                None => return Vec::new(),
            }
        }
    }
}

struct Shared<K> {
    graph: Mutex<LockGraph<K>>,
    next_id: AtomicU64,
}

/// Creates locks whose cycle detection spans all locks created by the same factory.
pub(crate) struct CycleDetectingLockFactory<K> {
    shared: Arc<Shared<K>>,
}

impl<K> CycleDetectingLockFactory<K> {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                graph: Mutex::new(LockGraph {
                    locks: HashMap::new(),
                    waiting_on: HashMap::new(),
                    owned_by: HashMap::new(),
                }),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    #[must_use]
    pub(crate) fn create(&self, key: K) -> CycleDetectingLock<K> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        self.shared.graph.lock().locks.insert(
            id,
            LockState {
                key,
                owner: None,
                holds: 0,
            },
        );

        CycleDetectingLock {
            id,
            shared: self.shared.clone(),
            released: Condvar::new(),
        }
    }
}

/// Locks found in a wait-for cycle, grouped by the thread that owns them.
pub(crate) type LocksCycle<K> = Vec<(ThreadId, Vec<K>)>;

pub(crate) struct CycleDetectingLock<K> {
    id: LockId,
    shared: Arc<Shared<K>>,
    released: Condvar,
}

impl<K: Clone> CycleDetectingLock<K> {
    /// Takes the lock, blocking while another thread owns it.
    ///
    /// Returns the cycle instead of blocking if the owner (transitively) waits for a lock of the current thread.
    /// The check is repeated every time the lock is handed to another thread while waiting.
    pub(crate) fn lock_or_detect_cycle(&self) -> Result<CycleDetectingLockGuard<'_, K>, LocksCycle<K>> {
        let current = thread::current().id();
        let mut graph = self.shared.graph.lock();

        loop {
            let owner = graph.locks.get(&self.id).and_then(|state| state.owner);
            match owner {
                None => {
                    if let Some(state) = graph.locks.get_mut(&self.id) {
                        state.owner = Some(current);
                        state.holds = 1;
                    }
                    graph.owned_by.entry(current).or_default().push(self.id);
                    return Ok(CycleDetectingLockGuard { lock: self });
                }
                Some(owner) if owner == current => {
                    if let Some(state) = graph.locks.get_mut(&self.id) {
                        state.holds += 1;
                    }
                    return Ok(CycleDetectingLockGuard { lock: self });
                }
                Some(_) => {
                    graph.waiting_on.insert(current, self.id);
                    let cycle = graph.detect_cycle(current, self.id);
                    if !cycle.is_empty() {
                        graph.waiting_on.remove(&current);
                        debug!(threads = cycle.len(), "Lock cycle detected");
                        return Err(cycle);
                    }

                    self.released.wait(&mut graph);
                    graph.waiting_on.remove(&current);
                }
            }
        }
    }
}

impl<K> CycleDetectingLock<K> {
    fn unlock(&self) {
        let current = thread::current().id();
        let mut graph = self.shared.graph.lock();

        let Some(state) = graph.locks.get_mut(&self.id) else {
            return;
        };
        state.holds = state.holds.saturating_sub(1);
        if state.holds > 0 {
            return;
        }
        state.owner = None;

        if let Some(owned) = graph.owned_by.get_mut(&current) {
            owned.retain(|id| *id != self.id);
            if owned.is_empty() {
                graph.owned_by.remove(&current);
            }
        }
        drop(graph);

        self.released.notify_all();
    }
}

impl<K> Drop for CycleDetectingLock<K> {
    fn drop(&mut self) {
        self.shared.graph.lock().locks.remove(&self.id);
    }
}

pub(crate) struct CycleDetectingLockGuard<'a, K> {
    lock: &'a CycleDetectingLock<K>,
}

impl<K> Drop for CycleDetectingLockGuard<'_, K> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}
