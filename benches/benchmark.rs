use std::{ops::Deref, rc::Rc};

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shrc::{Shared, Weak};

//cargo install cargo-criterion
//cargo criterion

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("New Shared (embedded)", |b| b.iter(new_shared));
    c.bench_function("New Shared (adopted box)", |b| b.iter(new_shared_from_box));
    c.bench_function("New Rc", |b| b.iter(new_rc));
    c.bench_function("Clone Shared", |b| b.iter(clone_shared));
    c.bench_function("Clone Rc", |b| b.iter(clone_rc));
    c.bench_function("Multiple clone Shared", |b| b.iter(multi_clone_shared));
    c.bench_function("Multiple clone Rc", |b| b.iter(multi_clone_rc));
    c.bench_function("Deref Shared", |b| b.iter(deref_shared));
    c.bench_function("Deref Rc", |b| b.iter(deref_rc));
    c.bench_function("Multiple deref Shared", |b| b.iter(multi_deref_shared));
    c.bench_function("Multiple deref Rc", |b| b.iter(multi_deref_rc));
    c.bench_function("Multiple lock Shared", |b| b.iter(multi_lock_shared));
    c.bench_function("Multiple upgrade Rc", |b| b.iter(multi_upgrade_rc));
    c.bench_function("Multiple project Shared", |b| b.iter(multi_project_shared));
}

fn new_shared() {
    let _ = black_box(Shared::new(100));
}

fn new_shared_from_box() {
    let _ = black_box(Shared::from_box(Box::new(100)));
}

fn new_rc() {
    let _ = black_box(Rc::new(100));
}

fn clone_shared() {
    let shared = Shared::new(100);
    let _ = black_box(Shared::clone(&shared));
}

fn clone_rc() {
    let rc = Rc::new(100);
    let _ = black_box(Rc::clone(&rc));
}

fn multi_clone_shared() {
    let shared = Shared::new(100);
    for _ in 0..100 {
        let _ = black_box(shared.clone());
    }
}

fn multi_clone_rc() {
    let rc = Rc::new(100);
    for _ in 0..100 {
        let _ = black_box(rc.clone());
    }
}

fn deref_shared() {
    let shared = Shared::new(100);
    let _ = black_box(shared.deref());
}

fn deref_rc() {
    let rc = Rc::new(100);
    let _ = black_box(rc.deref());
}

fn multi_deref_shared() {
    let shared = Shared::new(100);
    for _ in 0..100 {
        let _ = black_box(shared.deref());
    }
}

fn multi_deref_rc() {
    let rc = Rc::new(100);
    for _ in 0..100 {
        let _ = black_box(rc.deref());
    }
}

fn multi_lock_shared() {
    let shared = Shared::new(100);
    let weak = Shared::downgrade(&shared);
    for _ in 0..100 {
        let _ = black_box(Weak::lock(&weak));
    }
}

fn multi_upgrade_rc() {
    let rc = Rc::new(100);
    let weak = Rc::downgrade(&rc);
    for _ in 0..100 {
        let _ = black_box(weak.upgrade());
    }
}

fn multi_project_shared() {
    let shared = Shared::new((100, 200));
    for _ in 0..100 {
        let _ = black_box(Shared::project(&shared, |pair| &pair.1));
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
