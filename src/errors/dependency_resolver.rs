use core::fmt::{self, Display, Formatter};

use super::{cycle::CycleReport, instantiate::InstantiateErrorKind};
use crate::{any::TypeInfo, dependency::DependencyChain, key::Key, source::Source};

/// Why no binding could be found for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingReason {
    /// Not bound in the container or any of its ancestors.
    NotBound,
    /// Explicit bindings are required, so the key wasn't bound implicitly.
    JitDisabled,
    /// The key is bound in a child container, so the container refuses to bind it implicitly.
    BoundInChild,
}

impl Display for MissingReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MissingReason::NotBound => "it isn't bound",
            MissingReason::JitDisabled => "explicit bindings are required and it isn't explicitly bound",
            MissingReason::BoundInChild => "it's already configured in a child container",
        })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("No binding for {key} was found, {reason}. Requested via: {chain}")]
    MissingBinding {
        key: Key,
        reason: MissingReason,
        chain: DependencyChain,
    },
    #[error("Null returned by binding at {binding_source} but {key} isn't nullable. Requested via: {chain}")]
    NullInjected {
        key: Key,
        binding_source: Source,
        chain: DependencyChain,
    },
    #[error("Found a circular dependency involving {key}, and circular proxies are disabled. Cycle: {chain}")]
    CircularDependencyDisabled { key: Key, chain: DependencyChain },
    #[error("Tried proxying {key} to support a circular dependency, but it isn't bound as a proxyable trait object. Cycle: {chain}")]
    CircularProxyUnsupported { key: Key, chain: DependencyChain },
    #[error("{report}. Requested via: {chain}")]
    CrossThreadCycle {
        key: Key,
        report: CycleReport,
        chain: DependencyChain,
    },
    #[error("Provider for {key} bound at {binding_source} failed: {error}. Requested via: {chain}")]
    Provision {
        key: Key,
        binding_source: Source,
        chain: DependencyChain,
        #[source]
        error: InstantiateErrorKind,
    },
    #[error("{key} can't be constructed: its constructor isn't marked for injection, and injection requires it. Requested via: {chain}")]
    MissingConstructorMarker { key: Key, chain: DependencyChain },
    #[error("Incorrect provided type. Actual: {actual}, expected: {expected}")]
    IncorrectType { expected: TypeInfo, actual: TypeInfo },
    #[error("Provision listener of {key} failed: {error}. Requested via: {chain}")]
    Listener {
        key: Key,
        chain: DependencyChain,
        #[source]
        error: InstantiateErrorKind,
    },
    #[error("{key} was already provisioned in this listener")]
    AlreadyProvisioned { key: Key },
}

impl ResolveErrorKind {
    /// Dependency chain that was in flight when the error occurred.
    #[must_use]
    pub fn chain(&self) -> Option<&DependencyChain> {
        match self {
            ResolveErrorKind::MissingBinding { chain, .. }
            | ResolveErrorKind::NullInjected { chain, .. }
            | ResolveErrorKind::CircularDependencyDisabled { chain, .. }
            | ResolveErrorKind::CircularProxyUnsupported { chain, .. }
            | ResolveErrorKind::CrossThreadCycle { chain, .. }
            | ResolveErrorKind::Provision { chain, .. }
            | ResolveErrorKind::MissingConstructorMarker { chain, .. }
            | ResolveErrorKind::Listener { chain, .. } => Some(chain),
            ResolveErrorKind::IncorrectType { .. } | ResolveErrorKind::AlreadyProvisioned { .. } => None,
        }
    }
}
