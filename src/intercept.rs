use std::sync::Arc;
use tracing::debug;

use crate::{errors::InstantiateErrorKind, instance::Instance, key::Key, source::Source};

/// Wraps instances built by constructor bindings before they are handed out or cached.
///
/// An interceptor is called once per constructed instance, never for stand-in proxies.
pub trait Interceptor<T: ?Sized>: Send + Sync + 'static {
    #[allow(clippy::missing_errors_doc)]
    fn intercept(&self, key: &Key, instance: Arc<T>) -> Result<Arc<T>, InstantiateErrorKind>;
}

impl<T, F> Interceptor<T> for F
where
    T: ?Sized,
    F: Fn(&Key, Arc<T>) -> Result<Arc<T>, InstantiateErrorKind> + Send + Sync + 'static,
{
    fn intercept(&self, key: &Key, instance: Arc<T>) -> Result<Arc<T>, InstantiateErrorKind> {
        self(key, instance)
    }
}

type KeyMatcher = Arc<dyn Fn(&Key) -> bool + Send + Sync>;
type ErasedIntercept = Arc<dyn Fn(&Key, Instance) -> Result<Instance, InstantiateErrorKind> + Send + Sync>;

/// An interceptor with the constructed type erased.
#[derive(Clone)]
pub(crate) struct InterceptorBinding {
    matcher: KeyMatcher,
    intercept: ErasedIntercept,
    pub(crate) key: Key,
    pub(crate) source: Source,
}

impl InterceptorBinding {
    /// Intercepts instances constructed for keys of type `T` accepted by `matcher`.
    #[must_use]
    pub(crate) fn new<T, I, M>(interceptor: I, matcher: M, source: Source) -> Self
    where
        T: Send + Sync + 'static,
        I: Interceptor<T>,
        M: Fn(&Key) -> bool + Send + Sync + 'static,
    {
        Self {
            matcher: Arc::new(matcher),
            intercept: Arc::new(move |key: &Key, instance: Instance| {
                let Ok(Some(value)) = instance.downcast::<T>() else {
                    return Ok(instance);
                };
                interceptor.intercept(key, value).map(Instance::new)
            }),
            key: Key::of::<T>(),
            source,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn matches(&self, key: &Key) -> bool {
        self.key.type_info == key.type_info && (self.matcher)(key)
    }

    pub(crate) fn intercept(&self, key: &Key, instance: Instance) -> Result<Instance, InstantiateErrorKind> {
        debug!(%key, source = %self.source, "Intercepting");
        (self.intercept)(key, instance)
    }
}
