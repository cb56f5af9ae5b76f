use core::fmt::{self, Display, Formatter};

use super::dependency_resolver::ResolveErrorKind;
use crate::{key::Key, source::Source};

fn display_sources(sources: &[Source]) -> String {
    let mut out = String::new();
    for (index, source) in sources.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        out.push_str(&source.to_string());
    }
    out
}

/// A problem found while building a container.
#[derive(thiserror::Error, Debug)]
pub enum CreationErrorKind {
    #[error("{key} was bound more than once. Bound at: {}", display_sources(.sources))]
    BindingAlreadySet { key: Key, sources: Vec<Source> },
    #[error("Binding of {key} at {binding_source} points to itself")]
    RecursiveBinding { key: Key, binding_source: Source },
    #[error("Couldn't expose {key} at {binding_source}: it must be explicitly bound in the private environment")]
    ExposedButNotBound { key: Key, binding_source: Source },
    #[error("No implementation for {key} was bound at {binding_source}")]
    MissingImplementation { key: Key, binding_source: Source },
    #[error("{key} bound at {binding_source} has no constructor marked for injection, and injection requires it")]
    MissingConstructorMarker { key: Key, binding_source: Source },
    #[error("{error:#} (reported at {binding_source})")]
    Message { error: anyhow::Error, binding_source: Source },
    #[error(transparent)]
    Resolve(#[from] ResolveErrorKind),
}

/// Every problem found while building a container tree.
///
/// Collisions are merged per key, so a key bound several times is reported once with all its sources.
#[derive(Debug, Default)]
pub struct CreationErrors {
    errors: Vec<CreationErrorKind>,
}

impl CreationErrors {
    pub(crate) fn push(&mut self, err: CreationErrorKind) {
        if let CreationErrorKind::BindingAlreadySet { key, sources } = &err {
            for existing in &mut self.errors {
                if let CreationErrorKind::BindingAlreadySet {
                    key: existing_key,
                    sources: existing_sources,
                } = existing
                {
                    if existing_key == key {
                        for source in sources {
                            if !existing_sources.contains(source) {
                                existing_sources.push(*source);
                            }
                        }
                        return;
                    }
                }
            }
        }
        self.errors.push(err);
    }

    #[inline]
    #[must_use]
    pub fn errors(&self) -> &[CreationErrorKind] {
        &self.errors
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Display for CreationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Unable to create container, {} error(s):", self.errors.len())?;
        for (index, err) in self.errors.iter().enumerate() {
            write!(f, "\n{}) {err}", index + 1)?;
        }
        Ok(())
    }
}

impl std::error::Error for CreationErrors {}

impl IntoIterator for CreationErrors {
    type Item = CreationErrorKind;
    type IntoIter = std::vec::IntoIter<CreationErrorKind>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::{CreationErrorKind, CreationErrors};
    use crate::{key::Key, source::Source};

    #[test]
    fn test_collisions_merged_per_key() {
        let first = Source::caller();
        let second = Source::caller();
        let third = Source::caller();

        let mut errors = CreationErrors::default();
        errors.push(CreationErrorKind::BindingAlreadySet {
            key: Key::of::<u8>(),
            sources: vec![first, second],
        });
        errors.push(CreationErrorKind::BindingAlreadySet {
            key: Key::of::<u8>(),
            sources: vec![first, third],
        });
        errors.push(CreationErrorKind::BindingAlreadySet {
            key: Key::of::<u16>(),
            sources: vec![first, second],
        });

        assert_eq!(errors.len(), 2);
        match &errors.errors()[0] {
            CreationErrorKind::BindingAlreadySet { sources, .. } => assert_eq!(sources, &[first, second, third]),
            err => panic!("unexpected error: {err}"),
        }
        assert!(errors.to_string().starts_with("Unable to create container, 2 error(s):"));
    }
}
