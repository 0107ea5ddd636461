//! Benchmarks for intercepted calls.
//!
//! Measures the overhead a call site adds in its three states:
//! - no redirection installed
//! - redirected to a callback
//! - redirected with call-through to the original body
//!
//! Also measures member key interning, which every descriptor lookup goes through.

extern crate staticplug;

use criterion::{criterion_group, criterion_main, Criterion};
use staticplug::prelude::*;
use std::hint::black_box;

fn site(name: &str) -> CallSite {
    let ty = TypeBuilder::class("StaticPlug.Bench", "Host").build();
    CallSite::new(
        MethodDescriptor::static_method(ty, name)
            .params([TypeRef::i32(), TypeRef::i32()])
            .returns(TypeRef::i32()),
    )
}

/// Benchmark a call site with nothing plugged.
fn bench_call_unplugged(c: &mut Criterion) {
    let site = site("Unplugged");

    c.bench_function("call_unplugged", |b| {
        b.iter(|| black_box(site.call_static((black_box(3), black_box(4)), || 7)));
    });
}

/// Benchmark a call redirected to a two-argument callback.
fn bench_call_plugged(c: &mut Criterion) {
    let site = site("Plugged");
    let plug = MethodPlug::new(site.descriptor().clone())
        .unwrap()
        .returns(|a: i32, b: i32| a * b)
        .unwrap();
    let _scope = apply_all_blocking(plugs![plug]).unwrap();

    c.bench_function("call_plugged", |b| {
        b.iter(|| black_box(site.call_static((black_box(3), black_box(4)), || 7)));
    });
}

/// Benchmark a redirected call that also runs the original body.
fn bench_call_through(c: &mut Criterion) {
    let site = site("CallThrough");
    let plug = MethodPlug::new(site.descriptor().clone())
        .unwrap()
        .callback(|| {})
        .call_original(true);
    let _scope = apply_all_blocking(plugs![plug]).unwrap();

    c.bench_function("call_through", |b| {
        b.iter(|| black_box(site.call_static((black_box(3), black_box(4)), || 7)));
    });
}

/// Benchmark applying and releasing a single plug.
fn bench_apply_release(c: &mut Criterion) {
    let site = site("ApplyRelease");

    c.bench_function("apply_release", |b| {
        b.iter(|| {
            let plug = MethodPlug::new(site.descriptor().clone())
                .unwrap()
                .returns_value(1)
                .unwrap();
            let mut scope = apply_all_blocking(plugs![plug]).unwrap();
            scope.release().unwrap();
        });
    });
}

/// Benchmark looking up the key of an already interned member.
fn bench_key_lookup(c: &mut Criterion) {
    let site = site("Interned");
    let descriptor = site.descriptor().clone();

    c.bench_function("key_lookup", |b| {
        b.iter(|| black_box(black_box(&descriptor).key()));
    });
}

criterion_group!(
    benches,
    bench_call_unplugged,
    bench_call_plugged,
    bench_call_through,
    bench_apply_release,
    bench_key_lookup,
);

criterion_main!(benches);
