use std::sync::Arc;

use core::any::Any;

use crate::any::TypeInfo;

pub(crate) type RcAny = Arc<dyn Any + Send + Sync>;

/// A provisioned value with its type erased.
///
/// The payload is an `Arc<T>` boxed behind `dyn Any`, which lets the same
/// representation carry sized values and trait objects alike.
/// A missing payload is the null value of nullable providers.
#[derive(Clone)]
pub struct Instance {
    value: Option<RcAny>,
    type_info: TypeInfo,
    proxy: bool,
}

impl Instance {
    #[inline]
    #[must_use]
    pub(crate) fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            value: Some(Arc::new(value)),
            type_info: TypeInfo::of::<T>(),
            proxy: false,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn null<T: ?Sized + 'static>() -> Self {
        Self {
            value: None,
            type_info: TypeInfo::of::<T>(),
            proxy: false,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn from_option<T: ?Sized + Send + Sync + 'static>(value: Option<Arc<T>>) -> Self {
        match value {
            Some(value) => Self::new(value),
            None => Self::null::<T>(),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn proxy<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            proxy: true,
            ..Self::new(value)
        }
    }

    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Whether this value is a stand-in issued to break a construction cycle.
    #[inline]
    #[must_use]
    pub fn is_proxy(&self) -> bool {
        self.proxy
    }

    #[inline]
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    /// Returns `Err` with the actual type if the payload isn't an `Arc<T>`.
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>, TypeInfo> {
        match &self.value {
            None if self.type_info == TypeInfo::of::<T>() => Ok(None),
            None => Err(self.type_info),
            Some(value) => value.downcast_ref::<Arc<T>>().cloned().map(Some).ok_or(self.type_info),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::Instance;
    use crate::any::TypeInfo;

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    #[test]
    fn test_downcast_sized_and_unsized() {
        let english = Instance::new(Arc::new(English));
        assert!(english.downcast::<English>().unwrap().is_some());
        assert_eq!(english.downcast::<dyn Greeter>().err(), Some(TypeInfo::of::<English>()));

        let greeter = Instance::new(Arc::new(English) as Arc<dyn Greeter>);
        assert_eq!(greeter.downcast::<dyn Greeter>().unwrap().unwrap().greet(), "hello");
        assert!(!greeter.is_proxy());
    }

    #[test]
    fn test_null() {
        let null = Instance::null::<English>();
        assert!(null.is_null());
        assert!(null.downcast::<English>().unwrap().is_none());
        assert!(null.downcast::<u8>().is_err());
    }
}
