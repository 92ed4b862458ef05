use std::{ops::Deref, rc::Rc, time::Instant};

use shrc::{Shared, Weak};

fn test_clone_shared(n: f64) -> f64 {
    let shared = Shared::new(100);

    let start = Instant::now();
    for _ in 0..(n as u64) {
        std::hint::black_box(shared.clone());
    }
    let end = Instant::now();
    (end - start).as_nanos() as f64 / n
}

fn test_clone_rc(n: f64) -> f64 {
    let rc = Rc::new(100);

    let start = Instant::now();
    for _ in 0..(n as u64) {
        std::hint::black_box(rc.clone());
    }
    let end = Instant::now();
    (end - start).as_nanos() as f64 / n
}

fn test_deref_shared(n: f64) -> f64 {
    let shared = Shared::new(100);

    let start = Instant::now();
    for _ in 0..(n as u64) {
        std::hint::black_box(shared.deref());
    }
    let end = Instant::now();
    (end - start).as_nanos() as f64 / n
}

fn test_deref_rc(n: f64) -> f64 {
    let rc = Rc::new(100);

    let start = Instant::now();
    for _ in 0..(n as u64) {
        std::hint::black_box(rc.deref());
    }
    let end = Instant::now();
    (end - start).as_nanos() as f64 / n
}

fn test_lock_shared(n: f64) -> f64 {
    let shared = Shared::new(100);
    let weak = Shared::downgrade(&shared);

    let start = Instant::now();
    for _ in 0..(n as u64) {
        std::hint::black_box(Weak::lock(&weak));
    }
    let end = Instant::now();
    (end - start).as_nanos() as f64 / n
}

fn test_upgrade_rc(n: f64) -> f64 {
    let rc = Rc::new(100);
    let weak = Rc::downgrade(&rc);

    let start = Instant::now();
    for _ in 0..(n as u64) {
        std::hint::black_box(weak.upgrade());
    }
    let end = Instant::now();
    (end - start).as_nanos() as f64 / n
}

fn main() {
    let n = 10e6;

    println!("Clone test Shared ({}x): {}ns avg", n, test_clone_shared(n));
    println!("Clone test Rc ({}x): {}ns avg", n, test_clone_rc(n));

    println!("Deref test Shared ({}x): {}ns avg", n, test_deref_shared(n));
    println!("Deref test Rc ({}x): {}ns avg", n, test_deref_rc(n));

    println!("Lock test Shared ({}x): {}ns avg", n, test_lock_shared(n));
    println!("Upgrade test Rc ({}x): {}ns avg", n, test_upgrade_rc(n));
}
