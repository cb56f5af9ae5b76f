use core::{
    fmt::{self, Display, Formatter},
    panic::Location,
};

/// Where a binding was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Source {
    location: Option<&'static Location<'static>>,
}

impl Source {
    /// Bootstrap bindings (the container itself, its stage, the logger) have no declaration site.
    pub const UNKNOWN: Source = Source { location: None };

    #[inline]
    #[must_use]
    #[track_caller]
    pub fn caller() -> Self {
        Self {
            location: Some(Location::caller()),
        }
    }

    #[inline]
    #[must_use]
    pub fn location(&self) -> Option<&'static Location<'static>> {
        self.location
    }

    #[inline]
    #[must_use]
    pub fn is_known(&self) -> bool {
        self.location.is_some()
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(location) => write!(f, "{}:{}:{}", location.file(), location.line(), location.column()),
            None => f.write_str("[unknown source]"),
        }
    }
}
