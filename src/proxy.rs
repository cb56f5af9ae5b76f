//! Stand-in proxies issued to break construction cycles.
//!
//! Rust has no runtime subclassing, so only trait-object keys can be proxied:
//! the user implements the trait for [`Proxy<dyn Trait>`] by forwarding every call
//! to [`Proxy::delegate`], and marks the trait object with [`impl_proxied!`].
//! Concrete types can't be stood in for; a cycle through a concrete key
//! that isn't reached via a proxyable key is reported as an error.
//!
//! A proxy is a distinct object: its identity never equals the identity of
//! the instance it forwards to.

use std::{boxed::Box, sync::Arc, vec::Vec};

use core::fmt::{self, Debug, Formatter};
use once_cell::sync::OnceCell;
use tracing::debug;

use crate::{any::TypeInfo, instance::Instance};

/// A stand-in for `T` whose delegate is set once the real instance is constructed.
pub struct Proxy<T: ?Sized> {
    delegate: OnceCell<Arc<T>>,
}

impl<T: ?Sized + 'static> Proxy<T> {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            delegate: OnceCell::new(),
        }
    }

    /// The real instance behind this proxy.
    ///
    /// # Panics
    /// Panics if called before the real instance finished constructing,
    /// i.e. from within the constructor that closed the cycle.
    #[inline]
    #[must_use]
    pub fn delegate(&self) -> &Arc<T> {
        match self.delegate.get() {
            Some(delegate) => delegate,
            None => panic!(
                "Circular proxy for {} was called, but the proxied instance is not constructed yet",
                TypeInfo::of::<T>().name,
            ),
        }
    }

    #[inline]
    #[must_use]
    pub fn try_delegate(&self) -> Option<&Arc<T>> {
        self.delegate.get()
    }

    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.delegate.get().is_some()
    }
}

impl<T: ?Sized + 'static> Debug for Proxy<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("type", &TypeInfo::of::<T>().name)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Marks a trait object type as proxyable.
///
/// Implement it with [`impl_proxied!`] once `Proxy<dyn Trait>` implements `Trait`.
pub trait Proxied: Send + Sync + 'static {
    fn into_proxied(proxy: Arc<Proxy<Self>>) -> Arc<Self>;
}

/// Implements [`Proxied`] for trait objects whose [`Proxy`] implements the trait.
///
/// ```
/// use quiver::{impl_proxied, Proxy};
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// impl Greeter for Proxy<dyn Greeter> {
///     fn greet(&self) -> String {
///         self.delegate().greet()
///     }
/// }
///
/// impl_proxied!(dyn Greeter);
/// ```
#[macro_export]
macro_rules! impl_proxied {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Proxied for $ty {
                #[inline]
                fn into_proxied(proxy: ::std::sync::Arc<$crate::Proxy<Self>>) -> ::std::sync::Arc<Self> {
                    proxy
                }
            }
        )+
    };
}

/// Erased write-once handle to a proxy's delegate.
pub(crate) trait DelegateSlot: Send + Sync {
    /// Returns `Err` with the actual type if the instance doesn't fit the proxy.
    fn fill(&self, instance: &Instance) -> Result<(), TypeInfo>;
}

impl<T: ?Sized + Send + Sync + 'static> DelegateSlot for Arc<Proxy<T>> {
    fn fill(&self, instance: &Instance) -> Result<(), TypeInfo> {
        if let Some(delegate) = instance.downcast::<T>()? {
            let _ = self.delegate.set(delegate);
        }
        Ok(())
    }
}

/// Creates a proxy for the key it was declared for.
pub(crate) type ProxyFactory = fn() -> (Instance, Box<dyn DelegateSlot>);

#[must_use]
pub(crate) fn proxy_factory<T: ?Sized + Proxied>() -> ProxyFactory {
    || {
        let proxy = Arc::new(Proxy::<T>::new());
        (Instance::proxy(T::into_proxied(proxy.clone())), Box::new(proxy))
    }
}

/// Converts an instance of the constructed key into an instance of the key the dependency was requested with.
pub(crate) type Upcast = Arc<dyn Fn(Instance) -> Result<Instance, TypeInfo> + Send + Sync>;

/// A proxy waiting for its delegate.
///
/// `upcasts` are the links between the requested key and the constructed key, outermost first.
pub(crate) struct PendingProxy {
    pub(crate) slot: Box<dyn DelegateSlot>,
    pub(crate) upcasts: Vec<Upcast>,
}

impl PendingProxy {
    pub(crate) fn resolve(&self, instance: &Instance) -> Result<(), TypeInfo> {
        let mut instance = instance.clone();
        for upcast in self.upcasts.iter().rev() {
            instance = upcast(instance)?;
        }
        self.slot.fill(&instance)?;
        debug!(ty = %instance.type_info(), "Proxy delegate set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{string::String, sync::Arc, vec};

    use super::{proxy_factory, PendingProxy, Proxy, Upcast};
    use crate::instance::Instance;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    impl Greeter for Proxy<dyn Greeter> {
        fn greet(&self) -> String {
            self.delegate().greet()
        }
    }

    impl_proxied!(dyn Greeter);

    #[test]
    fn test_proxy_delegates_after_fill() {
        let (instance, slot) = proxy_factory::<dyn Greeter>()();
        assert!(instance.is_proxy());

        let greeter = instance.downcast::<dyn Greeter>().unwrap().unwrap();

        slot.fill(&Instance::new(Arc::new(English) as Arc<dyn Greeter>)).unwrap();
        assert_eq!(greeter.greet(), "hello");
    }

    #[test]
    fn test_pending_proxy_applies_upcasts() {
        let (instance, slot) = proxy_factory::<dyn Greeter>()();
        let upcast: Upcast = Arc::new(|instance: Instance| {
            let english = instance.downcast::<English>()?;
            Ok(Instance::from_option(english.map(|english| english as Arc<dyn Greeter>)))
        });
        let pending = PendingProxy {
            slot,
            upcasts: vec![upcast],
        };

        pending.resolve(&Instance::new(Arc::new(English))).unwrap();
        assert_eq!(instance.downcast::<dyn Greeter>().unwrap().unwrap().greet(), "hello");
    }

    #[test]
    fn test_debug_names_proxied_type() {
        let proxy = Proxy::<dyn Greeter>::new();
        let debug = format!("{proxy:?}");
        assert!(debug.contains("Greeter"));
        assert!(debug.contains("resolved: false"));
        assert!(proxy.try_delegate().is_none());
    }

    #[test]
    #[should_panic(expected = "not constructed yet")]
    fn test_unresolved_proxy_panics() {
        let (instance, _slot) = proxy_factory::<dyn Greeter>()();
        let _ = instance.downcast::<dyn Greeter>().unwrap().unwrap().greet();
    }
}
