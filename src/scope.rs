use core::fmt::{self, Display, Formatter};

use crate::config::Stage;

/// Instance reuse policy of a binding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// A new instance per request.
    #[default]
    Unscoped,
    /// One instance per container, created when the container is built.
    EagerSingleton,
    /// One instance per container, created on first request.
    Singleton,
}

impl Scope {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Scope::Unscoped => "unscoped",
            Scope::EagerSingleton => "eager-singleton",
            Scope::Singleton => "singleton",
        }
    }

    #[inline]
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        matches!(self, Scope::EagerSingleton | Scope::Singleton)
    }

    /// Whether a binding in this scope is instantiated while the container is built.
    #[inline]
    #[must_use]
    pub fn is_eager_in(&self, stage: Stage) -> bool {
        match (self, stage) {
            (_, Stage::Tool) | (Scope::Unscoped, _) => false,
            (Scope::EagerSingleton, _) => true,
            (Scope::Singleton, stage) => stage == Stage::Production,
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
