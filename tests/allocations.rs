use std::{
    alloc::{GlobalAlloc, Layout, System},
    cell::Cell,
    panic::{self, AssertUnwindSafe},
};

use shrc::{ObserveSelf, SelfObserver, Shared, Weak};

// Counts live allocations made by the current thread, so tests running in
// parallel do not see each other.
struct CountingAlloc;

thread_local! {
    static LIVE: Cell<isize> = const { Cell::new(0) };
}

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            let _ = LIVE.try_with(|live| live.set(live.get() + 1));
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        let _ = LIVE.try_with(|live| live.set(live.get() - 1));
        System.dealloc(ptr, layout)
    }
}

#[global_allocator]
static GLOBAL: CountingAlloc = CountingAlloc;

fn live() -> isize {
    LIVE.with(Cell::get)
}

struct Node {
    this: SelfObserver<Node>,
    payload: Vec<u8>,
}

impl ObserveSelf for Node {
    fn self_observer(&self) -> &SelfObserver<Self> {
        &self.this
    }
}

impl Node {
    fn new() -> Self {
        Node {
            this: SelfObserver::new(),
            payload: vec![1, 2, 3],
        }
    }
}

struct Bomb {
    _payload: Vec<u8>,
}

impl Drop for Bomb {
    fn drop(&mut self) {
        panic!("bomb dropped");
    }
}

#[test]
fn embedded_block_is_one_allocation() {
    let base = live();
    let shared = Shared::new(7u64);
    assert_eq!(live(), base + 1);
    let copy = shared.clone();
    assert_eq!(live(), base + 1);
    drop(copy);
    drop(shared);
    assert_eq!(live(), base);
}

#[test]
fn weak_keeps_embedded_block_allocated() {
    let base = live();
    let shared = Shared::new(7u64);
    let weak = Shared::downgrade(&shared);
    let second = weak.clone();

    drop(shared);
    assert!(Weak::expired(&weak));
    assert_eq!(live(), base + 1);

    drop(weak);
    assert_eq!(live(), base + 1);
    drop(second);
    assert_eq!(live(), base);
}

#[test]
fn weak_keeps_pointer_block_allocated() {
    let base = live();
    let shared = Shared::from_box(Box::new(7u64));
    assert_eq!(live(), base + 2);
    let weak = Shared::downgrade(&shared);

    drop(shared);
    assert!(Weak::expired(&weak));
    assert_eq!(live(), base + 1);

    drop(weak);
    assert_eq!(live(), base);
}

#[test]
fn locked_handle_outlives_original() {
    let base = live();
    let shared = Shared::from_box(Box::new(7u64));
    let weak = Shared::downgrade(&shared);
    let locked = Weak::lock(&weak);

    drop(shared);
    drop(weak);
    assert_eq!(*locked, 7);
    assert_eq!(live(), base + 2);

    drop(locked);
    assert_eq!(live(), base);
}

#[test]
fn self_observing_values_leave_nothing_behind() {
    let base = live();
    let node = Shared::from_box_observed(Box::new(Node::new()));
    let again = node.shared_from_this().unwrap();
    assert_eq!(again.payload.len(), 3);
    drop(again);
    drop(node);
    assert_eq!(live(), base);

    let node = Shared::new_observed(Node::new());
    let weak = node.weak_from_this();
    drop(node);
    assert_eq!(live(), base + 1);
    drop(weak);
    assert_eq!(live(), base);

    let node = unsafe { Shared::from_raw_observed(Box::into_raw(Box::new(Node::new()))) };
    drop(node);
    assert_eq!(live(), base);
}

#[test]
fn panicking_destructor_still_releases_blocks() {
    let hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let _ = panic::catch_unwind(|| panic!("warm up"));

    let base = live();

    let shared = Shared::new(Bomb {
        _payload: vec![0; 16],
    });
    let result = panic::catch_unwind(AssertUnwindSafe(move || drop(shared)));
    assert!(result.is_err());
    drop(result);
    assert_eq!(live(), base);

    let shared = Shared::from_box(Box::new(Bomb {
        _payload: vec![0; 16],
    }));
    let result = panic::catch_unwind(AssertUnwindSafe(move || drop(shared)));
    assert!(result.is_err());
    drop(result);
    assert_eq!(live(), base);

    let shared = Shared::new(Bomb {
        _payload: vec![0; 16],
    });
    let weak = Shared::downgrade(&shared);
    let result = panic::catch_unwind(AssertUnwindSafe(move || drop(shared)));
    assert!(result.is_err());
    drop(result);
    assert!(Weak::expired(&weak));
    assert_eq!(live(), base + 1);
    drop(weak);
    assert_eq!(live(), base);

    panic::set_hook(hook);
}
