use quiver::{impl_proxied, Binder, Container, Inject, InstantiateErrorKind, Key, Provider, Provision, Proxy, ResolveErrorKind, Scope};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Barrier,
    },
    thread,
};

trait A: Send + Sync {
    fn name(&self) -> &'static str;
    fn b(&self) -> Arc<dyn B>;
}

trait B: Send + Sync {
    fn name(&self) -> &'static str;
    fn a(&self) -> Arc<dyn A>;
}

impl A for Proxy<dyn A> {
    fn name(&self) -> &'static str {
        self.delegate().name()
    }

    fn b(&self) -> Arc<dyn B> {
        self.delegate().b()
    }
}

impl B for Proxy<dyn B> {
    fn name(&self) -> &'static str {
        self.delegate().name()
    }

    fn a(&self) -> Arc<dyn A> {
        self.delegate().a()
    }
}

impl_proxied!(dyn A, dyn B);

struct AImpl(Arc<dyn B>);

impl A for AImpl {
    fn name(&self) -> &'static str {
        "a"
    }

    fn b(&self) -> Arc<dyn B> {
        self.0.clone()
    }
}

struct BImpl(Arc<dyn A>);

impl B for BImpl {
    fn name(&self) -> &'static str {
        "b"
    }

    fn a(&self) -> Arc<dyn A> {
        self.0.clone()
    }
}

fn ptr<T: ?Sized>(value: &Arc<T>) -> *const () {
    Arc::as_ptr(value).cast::<()>()
}

fn bind_a_b(binder: &mut Binder, scope: Scope) {
    binder
        .bind::<dyn A>()
        .to_provider(|Inject(b): Inject<dyn B>| Ok(Arc::new(AImpl(b)) as Arc<dyn A>))
        .in_scope(scope)
        .proxyable();
    binder
        .bind::<dyn B>()
        .to_provider(|Inject(a): Inject<dyn A>| Ok(Arc::new(BImpl(a)) as Arc<dyn B>))
        .in_scope(scope)
        .proxyable();
}

#[test]
fn test_cycle_broken_with_proxy() {
    let container = Container::builder()
        .install(|binder: &mut Binder| bind_a_b(binder, Scope::Unscoped))
        .build()
        .unwrap();

    let a = container.get::<dyn A>().unwrap();
    let b = a.b();
    assert_eq!(b.name(), "b");
    // The stand-in forwards to the instance being constructed, but isn't that instance
    assert_eq!(b.a().name(), "a");
    assert_ne!(ptr(&b.a()), ptr(&a));
    assert_eq!(ptr(&b.a().b()), ptr(&b));
}

#[test]
fn test_singleton_cycle_broken_with_proxy() {
    let container = Container::builder()
        .install(|binder: &mut Binder| bind_a_b(binder, Scope::Singleton))
        .build()
        .unwrap();

    let a = container.get::<dyn A>().unwrap();
    let b = container.get::<dyn B>().unwrap();
    assert_eq!(ptr(&a.b()), ptr(&b));
    assert_eq!(b.a().name(), "a");
    assert!(Arc::ptr_eq(&a, &container.get::<dyn A>().unwrap()));
}

#[test]
fn test_cycle_fails_with_proxies_disabled() {
    let container = Container::builder()
        .install(|binder: &mut Binder| {
            bind_a_b(binder, Scope::Unscoped);
            binder.disable_circular_proxies();
        })
        .build()
        .unwrap();

    match container.get::<dyn A>() {
        Err(ResolveErrorKind::CircularDependencyDisabled { key, chain }) => {
            assert_eq!(key, Key::of::<dyn A>());
            assert!(chain.contains(&Key::of::<dyn A>()));
            assert!(chain.contains(&Key::of::<dyn B>()));
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

struct Left(#[allow(dead_code)] Arc<Right>);
struct Right(#[allow(dead_code)] Arc<Left>);

#[test]
fn test_cycle_of_concrete_types_fails() {
    let container = Container::builder()
        .install(|binder: &mut Binder| {
            binder.bind::<Left>().to_provider(|Inject(right): Inject<Right>| Ok(Left(right)));
            binder.bind::<Right>().to_provider(|Inject(left): Inject<Left>| Ok(Right(left)));
        })
        .build()
        .unwrap();

    assert!(matches!(
        container.get::<Left>(),
        Err(ResolveErrorKind::CircularProxyUnsupported { .. }),
    ));
}

trait C: Send + Sync {
    fn d(&self) -> Arc<dyn D>;
    fn name(&self) -> &'static str;
}

trait D: Send + Sync {
    fn c(&self) -> Arc<dyn C>;
    fn name(&self) -> &'static str;
}

impl C for Proxy<dyn C> {
    fn d(&self) -> Arc<dyn D> {
        self.delegate().d()
    }

    fn name(&self) -> &'static str {
        self.delegate().name()
    }
}

impl D for Proxy<dyn D> {
    fn c(&self) -> Arc<dyn C> {
        self.delegate().c()
    }

    fn name(&self) -> &'static str {
        self.delegate().name()
    }
}

impl_proxied!(dyn C, dyn D);

struct CImpl(Arc<dyn D>);

impl C for CImpl {
    fn d(&self) -> Arc<dyn D> {
        self.0.clone()
    }

    fn name(&self) -> &'static str {
        "c"
    }
}

struct DImpl(Arc<dyn C>);

impl D for DImpl {
    fn c(&self) -> Arc<dyn C> {
        self.0.clone()
    }

    fn name(&self) -> &'static str {
        "d"
    }
}

/// Waits for the other provider on the first call only,
/// so that each thread holds its singleton before requesting the other one.
struct Rendezvous {
    barrier: Arc<Barrier>,
    waited: AtomicBool,
}

impl Rendezvous {
    fn new(barrier: Arc<Barrier>) -> Self {
        Self {
            barrier,
            waited: AtomicBool::new(false),
        }
    }

    fn wait(&self) {
        if !self.waited.swap(true, Ordering::SeqCst) {
            self.barrier.wait();
        }
    }
}

struct CProvider(Rendezvous);

impl Provider<dyn C> for CProvider {
    fn get(&self, provision: &mut Provision<'_>) -> Result<Arc<dyn C>, InstantiateErrorKind> {
        self.0.wait();
        Ok(Arc::new(CImpl(provision.get::<dyn D>()?)))
    }
}

struct DProvider(Rendezvous);

impl Provider<dyn D> for DProvider {
    fn get(&self, provision: &mut Provision<'_>) -> Result<Arc<dyn D>, InstantiateErrorKind> {
        self.0.wait();
        Ok(Arc::new(DImpl(provision.get::<dyn C>()?)))
    }
}

fn cross_thread_container(proxyable: bool) -> Container {
    let barrier = Arc::new(Barrier::new(2));
    Container::builder()
        .install(move |binder: &mut Binder| {
            let c = binder
                .bind::<dyn C>()
                .to_provider_instance(CProvider(Rendezvous::new(barrier.clone())))
                .in_scope(Scope::Singleton);
            if proxyable {
                c.proxyable();
            }
            let d = binder
                .bind::<dyn D>()
                .to_provider_instance(DProvider(Rendezvous::new(barrier.clone())))
                .in_scope(Scope::Singleton);
            if proxyable {
                d.proxyable();
            }
        })
        .build()
        .unwrap()
}

#[test]
fn test_cross_thread_cycle_broken_with_proxy() {
    let container = cross_thread_container(true);

    let (c, d) = thread::scope(|s| {
        let c = thread::Builder::new()
            .name("t1".into())
            .spawn_scoped(s, || container.get::<dyn C>())
            .unwrap();
        let d = thread::Builder::new()
            .name("t2".into())
            .spawn_scoped(s, || container.get::<dyn D>())
            .unwrap();
        (c.join().unwrap().unwrap(), d.join().unwrap().unwrap())
    });

    // Exactly one of the two got a stand-in for its peer
    let mismatched = [ptr(&c.d()) != ptr(&d), ptr(&d.c()) != ptr(&c)];
    assert_eq!(mismatched.iter().filter(|mismatched| **mismatched).count(), 1);

    assert_eq!(c.d().name(), "d");
    assert_eq!(d.c().name(), "c");
    assert!(Arc::ptr_eq(&c, &container.get::<dyn C>().unwrap()));
    assert!(Arc::ptr_eq(&d, &container.get::<dyn D>().unwrap()));
}

#[test]
fn test_cross_thread_cycle_reported() {
    let container = cross_thread_container(false);

    let results = thread::scope(|s| {
        let c = thread::Builder::new()
            .name("t1".into())
            .spawn_scoped(s, || container.get::<dyn C>().map(|_| ()))
            .unwrap();
        let d = thread::Builder::new()
            .name("t2".into())
            .spawn_scoped(s, || container.get::<dyn D>().map(|_| ()))
            .unwrap();
        [c.join().unwrap(), d.join().unwrap()]
    });

    let reports: Vec<_> = results
        .iter()
        .filter_map(|result| match result {
            Err(ResolveErrorKind::CrossThreadCycle { report, .. }) => Some(report),
            _ => None,
        })
        .collect();
    assert_eq!(reports.len(), 1);
    assert!(results.iter().all(Result::is_err));

    let report = reports[0];
    let names: Vec<_> = report.threads.iter().filter_map(|thread| thread.name.as_deref()).collect();
    assert!(names.contains(&"t1"));
    assert!(names.contains(&"t2"));
    let keys: Vec<_> = report.keys().collect();
    assert!(keys.contains(&&Key::of::<dyn C>()));
    assert!(keys.contains(&&Key::of::<dyn D>()));
}
