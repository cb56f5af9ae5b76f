use tracing::{info_span, Span};

use crate::key::Key;

/// A logger bound in every container, labelled with the key it's injected into.
///
/// Events recorded within [`Logger::in_scope`] or under [`Logger::span`] carry
/// the `injection_point` field.
#[derive(Debug, Clone)]
pub struct Logger {
    span: Span,
    injection_point: Option<Key>,
}

impl Logger {
    #[must_use]
    pub(crate) fn new(injection_point: Option<Key>) -> Self {
        let span = match &injection_point {
            Some(key) => info_span!("logger", injection_point = %key),
            None => info_span!("logger", injection_point = "<container>"),
        };
        Self { span, injection_point }
    }

    #[inline]
    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    #[inline]
    #[must_use]
    pub fn injection_point(&self) -> Option<&Key> {
        self.injection_point.as_ref()
    }

    #[inline]
    pub fn in_scope<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.span.in_scope(f)
    }
}

#[cfg(test)]
mod tests {
    use tracing::info;
    use tracing_test::traced_test;

    use super::Logger;
    use crate::key::Key;

    #[test]
    #[traced_test]
    fn test_events_labelled_with_injection_point() {
        let logger = Logger::new(Some(Key::named::<u8>("port")));
        assert_eq!(logger.injection_point(), Some(&Key::named::<u8>("port")));

        logger.in_scope(|| info!("Listening"));
        assert!(logs_contain("u8[port]"));
        assert!(logs_contain("Listening"));
    }
}
