//! Members injection of instances built outside the container.

use core::cell::Cell;
use parking_lot::ReentrantMutex;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::debug;

use crate::{
    container::Container,
    context::{InternalContext, Provision},
    errors::{InstantiateErrorKind, ResolveErrorKind},
    factory::provision_error,
    injectable::Injectable,
    key::Key,
    source::Source,
};

type InjectMembers = Box<dyn Fn(&mut Provision<'_>) -> Result<(), InstantiateErrorKind> + Send + Sync>;

/// A pre-built instance whose members are injected once, before its first use.
///
/// Injection runs while the container is built and, if something needs the
/// instance before that (an eager singleton, another injection), on that first use.
pub(crate) struct Initializable {
    pub(crate) key: Key,
    pub(crate) source: Source,
    inject: InjectMembers,
    injected: AtomicBool,
    /// Reentrant, so requests for the instance made while injecting it receive it as is.
    injecting: ReentrantMutex<Cell<bool>>,
}

impl Initializable {
    #[must_use]
    pub(crate) fn new<T: Injectable>(value: Arc<T>, key: Key, source: Source) -> Self {
        Self {
            key,
            source,
            inject: Box::new(move |provision: &mut Provision<'_>| value.inject_members(provision)),
            injected: AtomicBool::new(false),
            injecting: ReentrantMutex::new(Cell::new(false)),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn is_injected(&self) -> bool {
        self.injected.load(Ordering::Acquire)
    }

    /// Injects the members unless it's already done.
    /// A failed injection is retried on the next call.
    pub(crate) fn ensure_injected(&self, owner: &Container, ctx: &mut InternalContext) -> Result<(), ResolveErrorKind> {
        if self.is_injected() {
            return Ok(());
        }

        let injecting = self.injecting.lock();
        if self.is_injected() || injecting.get() {
            return Ok(());
        }

        injecting.set(true);
        let result = (self.inject)(&mut Provision::new(owner, ctx, Some(self.key)));
        injecting.set(false);

        match result {
            Ok(()) => {
                self.injected.store(true, Ordering::Release);
                debug!(key = %self.key, "Members injected");
                Ok(())
            }
            Err(err) => Err(provision_error(self.key, self.source, ctx, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use tracing_test::traced_test;

    use super::Initializable;
    use crate::{
        container::Container,
        context::{InternalContext, Provision},
        errors::{InstantiateErrorKind, ResolveErrorKind},
        injectable::Injectable,
        key::Key,
        source::Source,
    };

    struct Session {
        injections: AtomicUsize,
        fail: bool,
    }

    impl Injectable for Session {
        type Deps = ();

        fn construct((): ()) -> Result<Self, InstantiateErrorKind> {
            Ok(Session {
                injections: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn inject_members(&self, _provision: &mut Provision<'_>) -> Result<(), InstantiateErrorKind> {
            self.injections.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow::anyhow!("expired").into());
            }
            Ok(())
        }
    }

    #[test]
    #[traced_test]
    fn test_injected_once() {
        let container = Container::builder().build().unwrap();
        let session = Arc::new(Session {
            injections: AtomicUsize::new(0),
            fail: false,
        });
        let initializable = Initializable::new(session.clone(), Key::of::<Session>(), Source::caller());

        initializable.ensure_injected(&container, &mut InternalContext::new()).unwrap();
        initializable.ensure_injected(&container, &mut InternalContext::new()).unwrap();

        assert!(initializable.is_injected());
        assert_eq!(session.injections.load(Ordering::SeqCst), 1);
        assert!(logs_contain("Members injected"));
    }

    #[test]
    fn test_failure_retried() {
        let container = Container::builder().build().unwrap();
        let session = Arc::new(Session {
            injections: AtomicUsize::new(0),
            fail: true,
        });
        let initializable = Initializable::new(session.clone(), Key::of::<Session>(), Source::caller());

        for _ in 0..2 {
            match initializable.ensure_injected(&container, &mut InternalContext::new()) {
                Err(ResolveErrorKind::Provision { key, error, .. }) => {
                    assert_eq!(key, Key::of::<Session>());
                    assert_eq!(error.to_string(), "expired");
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }
        assert!(!initializable.is_injected());
        assert_eq!(session.injections.load(Ordering::SeqCst), 2);
    }
}
