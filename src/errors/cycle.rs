use core::fmt::{self, Display, Formatter};
use std::thread::ThreadId;

use crate::{dependency::DependencyChain, key::Key};

/// One thread taking part in a cross-thread construction cycle.
#[derive(Debug, Clone)]
pub struct ThreadCycle {
    pub thread: ThreadId,
    pub name: Option<String>,
    /// Singletons the thread is constructing that are part of the cycle, in acquisition order.
    pub locked: Vec<Key>,
    /// In-flight constructions of the thread, if it published them.
    pub chain: Option<DependencyChain>,
}

impl Display for ThreadCycle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "thread '{name}'")?,
            None => write!(f, "thread {:?}", self.thread)?,
        }
        f.write_str(" is constructing [")?;
        for (index, key) in self.locked.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}")?;
        }
        f.write_str("]")?;
        if let Some(chain) = &self.chain {
            write!(f, " via {chain}")?;
        }
        Ok(())
    }
}

/// Threads and keys of a wait-for cycle between singleton constructions.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Key the reporting thread requested when the cycle was found.
    pub requested: Key,
    pub threads: Vec<ThreadCycle>,
}

impl CycleReport {
    #[must_use]
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.threads.iter().flat_map(|thread| thread.locked.iter())
    }
}

impl Display for CycleReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Found a circular dependency spanning several threads while requesting {}: ",
            self.requested,
        )?;
        for (index, thread) in self.threads.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{thread}")?;
        }
        Ok(())
    }
}
