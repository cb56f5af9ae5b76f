use core::fmt::{self, Display, Formatter};

use crate::{key::Key, source::Source};

/// A request for `key` made by `injection_point`.
///
/// `injection_point` is the key whose construction asked for the dependency,
/// `None` for requests made directly on a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub key: Key,
    pub injection_point: Option<Key>,
    pub nullable: bool,
}

impl Dependency {
    #[inline]
    #[must_use]
    pub fn new(key: Key) -> Self {
        Self {
            key,
            injection_point: None,
            nullable: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn nullable(key: Key) -> Self {
        Self {
            key,
            injection_point: None,
            nullable: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_injection_point(mut self, injection_point: Option<Key>) -> Self {
        self.injection_point = injection_point;
        self
    }
}

impl Display for Dependency {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.injection_point {
            Some(injection_point) => write!(f, "{} (required by {})", self.key, injection_point),
            None => write!(f, "{}", self.key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyAndSource {
    pub dependency: Dependency,
    pub binding_source: Source,
}

impl Display for DependencyAndSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.binding_source.is_known() {
            write!(f, "{} (bound at {})", self.dependency.key, self.binding_source)
        } else {
            write!(f, "{}", self.dependency.key)
        }
    }
}

/// Snapshot of the in-flight constructions of one thread, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyChain(pub Vec<DependencyAndSource>);

impl DependencyChain {
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &Key) -> bool {
        self.0.iter().any(|entry| entry.dependency.key == *key)
    }

    #[inline]
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.0.iter().map(|entry| &entry.dependency.key)
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl Display for DependencyChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<empty>");
        }
        for (index, entry) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}
