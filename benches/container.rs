#![allow(dead_code)]

use criterion::{criterion_group, criterion_main, Criterion};
use quiver::{Binder, Container, Inject, Scope};
use std::sync::Arc;

struct A(Arc<B>, Arc<C>);
struct B(i32);
struct C(Arc<CA>);
struct CA(Arc<CAA>);
struct CAA(Arc<CAAA>);
struct CAAA(Arc<CAAAA>);
struct CAAAA(Arc<CAAAAA>);
struct CAAAAA;

fn chain(binder: &mut Binder, scope: Scope) {
    binder.bind::<CAAAAA>().to_provider(|| Ok(CAAAAA)).in_scope(scope);
    binder
        .bind::<CAAAA>()
        .to_provider(|Inject(caaaaa): Inject<CAAAAA>| Ok(CAAAA(caaaaa)))
        .in_scope(scope);
    binder
        .bind::<CAAA>()
        .to_provider(|Inject(caaaa): Inject<CAAAA>| Ok(CAAA(caaaa)))
        .in_scope(scope);
    binder
        .bind::<CAA>()
        .to_provider(|Inject(caaa): Inject<CAAA>| Ok(CAA(caaa)))
        .in_scope(scope);
    binder
        .bind::<CA>()
        .to_provider(|Inject(caa): Inject<CAA>| Ok(CA(caa)))
        .in_scope(scope);
    binder.bind::<C>().to_provider(|Inject(ca): Inject<CA>| Ok(C(ca))).in_scope(scope);
    binder.bind::<B>().to_provider(|| Ok(B(2))).in_scope(scope);
    binder
        .bind::<A>()
        .to_provider(|Inject(b): Inject<B>, Inject(c): Inject<C>| Ok(A(b, c)))
        .in_scope(scope);
}

#[inline]
fn container_build() -> Container {
    Container::builder()
        .install(|binder: &mut Binder| chain(binder, Scope::Unscoped))
        .build()
        .unwrap()
}

#[inline]
fn container_child_hierarchy(root: &Container) {
    let app = root.create_child(|binder: &mut Binder| {
        binder.bind::<u8>().to_instance(1_u8);
    });
    let session = app.unwrap().create_child(|binder: &mut Binder| {
        binder.bind::<u16>().to_instance(2_u16);
    });
    let request = session.unwrap().create_child(|binder: &mut Binder| {
        binder.bind::<u32>().to_instance(3_u32);
    });
    let _ = request.unwrap().get::<A>().unwrap();
}

#[inline]
fn container_get(container: &Container) {
    let _ = container.get::<A>().unwrap();
}

fn criterion_benchmark(c: &mut Criterion) {
    let unscoped = container_build();
    let singletons = Container::builder()
        .install(|binder: &mut Binder| chain(binder, Scope::Singleton))
        .build()
        .unwrap();
    let child = unscoped
        .create_child(|binder: &mut Binder| {
            binder.bind::<u8>().to_instance(1_u8);
        })
        .unwrap();

    c.bench_function("container_build", |b| b.iter(container_build))
        .bench_function("container_child_hierarchy", |b| {
            b.iter(|| container_child_hierarchy(&unscoped))
        })
        .bench_function("container_get", |b| b.iter(|| container_get(&unscoped)))
        .bench_function("container_get_from_child", |b| b.iter(|| container_get(&child)))
        .bench_function("container_get_singleton", |b| b.iter(|| container_get(&singletons)))
        .bench_function("container_get_implicit", |b| {
            b.iter(|| {
                let _ = unscoped.get_implicit_binding::<Implicit>().unwrap();
            })
        });
}

struct Implicit;

impl quiver::Injectable for Implicit {
    type Deps = ();

    fn construct((): ()) -> Result<Self, quiver::InstantiateErrorKind> {
        Ok(Implicit)
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
