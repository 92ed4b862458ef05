use alloc::boxed::Box;
use core::{
    cell::{Cell, UnsafeCell},
    mem::MaybeUninit,
    ptr::{self, NonNull},
};

use log::trace;

const MAX_REFCOUNT: usize = (isize::MAX) as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CountKind {
    Strong,
    Weak,
}

/// The two counters every control block carries. A fresh block starts with one
/// strong reference (the handle that created it) and no weak ones.
pub(crate) struct Counts {
    strong: Cell<usize>,
    weak: Cell<usize>,
}

impl Counts {
    #[inline]
    fn new() -> Self {
        Counts {
            strong: Cell::new(1),
            weak: Cell::new(0),
        }
    }

    #[inline]
    fn cell(&self, kind: CountKind) -> &Cell<usize> {
        match kind {
            CountKind::Strong => &self.strong,
            CountKind::Weak => &self.weak,
        }
    }
}

/// Shared bookkeeping for one ownership group.
///
/// Exactly two implementations exist, [`PointerBlock`] and [`EmbeddedBlock`].
/// Handles only ever see a `NonNull<dyn ControlBlock>` and go through
/// [`release`] to drop references.
pub(crate) trait ControlBlock {
    fn counts(&self) -> &Counts;

    /// Destroys the managed object.
    ///
    /// # Safety
    /// Must be called once, right after the strong count reached zero.
    unsafe fn destroy_payload(&self);

    #[inline]
    fn increment(&self, kind: CountKind) {
        let cell = self.counts().cell(kind);
        let prev = cell.get();
        if prev >= MAX_REFCOUNT {
            match kind {
                CountKind::Strong => panic!("Overflow of maximum strong reference count."),
                CountKind::Weak => panic!("Overflow of maximum weak reference count."),
            }
        }
        cell.set(prev + 1);
    }

    /// Returns the count left after the decrement.
    #[inline]
    fn decrement(&self, kind: CountKind) -> usize {
        let cell = self.counts().cell(kind);
        debug_assert!(cell.get() > 0, "{:?} count underflow", kind);
        let left = cell.get() - 1;
        cell.set(left);
        left
    }

    #[inline]
    fn count(&self, kind: CountKind) -> usize {
        self.counts().cell(kind).get()
    }
}

/// Control block for a payload that was boxed on its own and handed over.
pub(crate) struct PointerBlock<T: ?Sized> {
    counts: Counts,
    payload: Cell<Option<NonNull<T>>>,
}

impl<T: ?Sized + 'static> PointerBlock<T> {
    /// Takes ownership of `payload`, which must come from `Box::into_raw`.
    pub(crate) fn allocate(payload: NonNull<T>) -> NonNull<dyn ControlBlock> {
        let block = NonNull::from(Box::leak(Box::new(PointerBlock {
            counts: Counts::new(),
            payload: Cell::new(Some(payload)),
        })));
        trace!("allocated pointer control block {:p}", block);
        block
    }
}

impl<T: ?Sized> ControlBlock for PointerBlock<T> {
    #[inline]
    fn counts(&self) -> &Counts {
        &self.counts
    }

    unsafe fn destroy_payload(&self) {
        if let Some(payload) = self.payload.take() {
            drop(Box::from_raw(payload.as_ptr()));
        }
    }
}

/// Control block that stores the payload in its own allocation.
///
/// The payload is dropped in place when the strong count hits zero; its storage
/// is reclaimed together with the block.
pub(crate) struct EmbeddedBlock<T> {
    counts: Counts,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T: 'static> EmbeddedBlock<T> {
    /// Returns the erased block together with the address of the payload inside it.
    pub(crate) fn allocate(value: T) -> (NonNull<dyn ControlBlock>, NonNull<T>) {
        let block = NonNull::from(Box::leak(Box::new(EmbeddedBlock {
            counts: Counts::new(),
            value: UnsafeCell::new(MaybeUninit::new(value)),
        })));
        let payload = unsafe { NonNull::new_unchecked(block.as_ref().value.get().cast::<T>()) };
        trace!("allocated embedded control block {:p}", block);
        let block: NonNull<dyn ControlBlock> = block;
        (block, payload)
    }
}

impl<T> ControlBlock for EmbeddedBlock<T> {
    #[inline]
    fn counts(&self) -> &Counts {
        &self.counts
    }

    unsafe fn destroy_payload(&self) {
        ptr::drop_in_place(self.value.get().cast::<T>());
    }
}

/// Drops one reference of `kind` held on `block`.
///
/// The payload is destroyed when the last strong reference goes, and the block is
/// freed when both counts are zero at the same time.
///
/// # Safety
/// `block` must be live and the caller must own the reference being released.
pub(crate) unsafe fn release(block: NonNull<dyn ControlBlock>, kind: CountKind) {
    if block.as_ref().decrement(kind) != 0 {
        return;
    }

    match kind {
        CountKind::Strong => {
            // The payload may hold weak handles into this very block.
            let _open = WeakGuard::acquire(block);
            trace!("destroying payload of control block {:p}", block);
            block.as_ref().destroy_payload();
        }
        CountKind::Weak => {
            if block.as_ref().count(CountKind::Strong) == 0 {
                trace!("releasing control block {:p}", block);
                drop(Box::from_raw(block.as_ptr()));
            }
        }
    }
}

/// A weak reference with no payload type, held across payload destruction.
struct WeakGuard {
    block: NonNull<dyn ControlBlock>,
}

impl WeakGuard {
    #[inline]
    unsafe fn acquire(block: NonNull<dyn ControlBlock>) -> Self {
        block.as_ref().increment(CountKind::Weak);
        WeakGuard { block }
    }
}

impl Drop for WeakGuard {
    #[inline]
    fn drop(&mut self) {
        unsafe { release(self.block, CountKind::Weak) }
    }
}

/// Block and payload address of a non-empty handle.
pub(crate) struct Parts<T: ?Sized> {
    pub(crate) block: NonNull<dyn ControlBlock>,
    pub(crate) ptr: NonNull<T>,
}

impl<T: ?Sized> Clone for Parts<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Parts<T> {}

impl<T: ?Sized> Parts<T> {
    #[inline]
    pub(crate) fn block(&self) -> &dyn ControlBlock {
        unsafe { self.block.as_ref() }
    }

    /// Address used for identity comparisons; ignores the vtable half of the pointer.
    #[inline]
    pub(crate) fn block_addr(&self) -> *const u8 {
        self.block.as_ptr().cast::<u8>()
    }
}

#[inline]
pub(crate) fn block_addr<T: ?Sized>(parts: &Option<Parts<T>>) -> *const u8 {
    parts.as_ref().map_or(ptr::null(), Parts::block_addr)
}
