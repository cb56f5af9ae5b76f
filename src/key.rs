use core::fmt::{self, Display, Formatter};

use crate::any::TypeInfo;

/// Type-level name used to tell apart several bindings of the same type.
///
/// ```
/// use quiver::Qualifier;
///
/// struct Primary;
///
/// impl Qualifier for Primary {
///     const NAME: &'static str = "primary";
/// }
/// ```
pub trait Qualifier: 'static {
    const NAME: &'static str;
}

/// Identifies "what to build": a type plus an optional qualifier.
///
/// Two keys are equal iff both parts match exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    pub type_info: TypeInfo,
    pub qualifier: Option<&'static str>,
}

impl Key {
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_info: TypeInfo::of::<T>(),
            qualifier: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn named<T: ?Sized + 'static>(qualifier: &'static str) -> Self {
        Self {
            type_info: TypeInfo::of::<T>(),
            qualifier: Some(qualifier),
        }
    }

    #[inline]
    #[must_use]
    pub fn qualified<T: ?Sized + 'static, Q: Qualifier>() -> Self {
        Self::named::<T>(Q::NAME)
    }

    #[inline]
    #[must_use]
    pub fn has_qualifier(&self) -> bool {
        self.qualifier.is_some()
    }

    /// Same type, no qualifier.
    #[inline]
    #[must_use]
    pub fn without_qualifier(&self) -> Self {
        Self {
            type_info: self.type_info,
            qualifier: None,
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.qualifier {
            Some(qualifier) => write!(f, "{}[{qualifier}]", self.type_info.name),
            None => write!(f, "{}", self.type_info.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Key, Qualifier};

    struct Primary;

    impl Qualifier for Primary {
        const NAME: &'static str = "primary";
    }

    #[test]
    fn test_key_equality() {
        assert_eq!(Key::of::<u8>(), Key::of::<u8>());
        assert_ne!(Key::of::<u8>(), Key::of::<u16>());
        assert_ne!(Key::of::<u8>(), Key::named::<u8>("primary"));
        assert_eq!(Key::named::<u8>("primary"), Key::qualified::<u8, Primary>());
        assert_eq!(Key::named::<u8>("primary").without_qualifier(), Key::of::<u8>());
    }

    #[test]
    fn test_key_display() {
        assert_eq!(Key::named::<u8>("primary").to_string(), "u8[primary]");
        assert_eq!(Key::of::<u8>().to_string(), "u8");
    }
}
