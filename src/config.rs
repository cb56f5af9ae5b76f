/// Phase the container is built for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Nothing is instantiated at build time.
    Tool,
    /// Only eager singletons are instantiated at build time.
    #[default]
    Development,
    /// Every singleton is instantiated at build time.
    Production,
}

/// Options of a container
/// ## Fields
/// - `stage`:
///   Inherited from the parent, a child can't change it.
/// - `jit_disabled`:
///   If `true`, implicit bindings are never synthesized and every key must be bound explicitly.
/// - `disable_circular_proxies`:
///   If `true`, a dependency cycle is an error instead of being broken with a stand-in proxy.
/// - `at_inject_required`:
///   If `true`, constructor bindings (explicit or implicit) are only allowed for types
///   whose [`crate::Injectable::INJECT_CONSTRUCTOR`] is set.
///
/// A child merges its own flags with its parent's by logical OR,
/// so an option enabled by an ancestor can't be turned off below it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InjectorOptions {
    pub stage: Stage,
    pub jit_disabled: bool,
    pub disable_circular_proxies: bool,
    pub at_inject_required: bool,
}

impl InjectorOptions {
    #[inline]
    #[must_use]
    pub(crate) fn inherit(self, parent: Option<&InjectorOptions>) -> Self {
        match parent {
            None => self,
            Some(parent) => Self {
                stage: parent.stage,
                jit_disabled: self.jit_disabled || parent.jit_disabled,
                disable_circular_proxies: self.disable_circular_proxies || parent.disable_circular_proxies,
                at_inject_required: self.at_inject_required || parent.at_inject_required,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{InjectorOptions, Stage};

    #[test]
    fn test_inherit_merges_flags() {
        let parent = InjectorOptions {
            stage: Stage::Production,
            jit_disabled: true,
            ..InjectorOptions::default()
        };
        let child = InjectorOptions {
            stage: Stage::Tool,
            disable_circular_proxies: true,
            ..InjectorOptions::default()
        };

        let merged = child.inherit(Some(&parent));
        assert_eq!(merged.stage, Stage::Production);
        assert!(merged.jit_disabled);
        assert!(merged.disable_circular_proxies);
        assert!(!merged.at_inject_required);

        assert_eq!(child.inherit(None), child);
    }
}
