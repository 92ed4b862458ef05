use alloc::boxed::Box;
use core::{
    borrow::Borrow,
    fmt::{Debug, Display, Pointer},
    hash::{Hash, Hasher},
    marker::PhantomData,
    mem,
    ops::Deref,
    ptr::{self, NonNull},
};

use crate::{
    block::{self, release, CountKind, EmbeddedBlock, Parts, PointerBlock},
    error::ExpiredError,
    observer::{self, ObserveSelf},
    weak::Weak,
};

/// `Shared<T>` is an owning, reference-counted handle to a heap-resident value.
///
/// Every `Shared<T>` points at a control block that counts the strong (`Shared`) and weak
/// ([`Weak`]) handles of one ownership group. When the last `Shared` goes away the value is
/// dropped; when the last `Weak` goes as well, the control block itself is freed.
///
/// ## Allocation strategies
/// [`Shared::new`] puts the counters and the value in a single allocation.
/// [`Shared::from_box`] adopts a value that is already boxed, keeping it in its own allocation;
/// this is also how unsized values such as `Box<dyn Trait>` become shared.
///
/// ## Aliasing
/// The address a handle dereferences to is stored separately from its control block.
/// [`Shared::project`] builds a handle to a field (or to a trait object view) of the value while
/// keeping the whole value alive. Equality compares control blocks, not addresses, so an alias
/// and its origin compare equal.
///
/// ## Empty handles
/// A `Shared<T>` may be empty (see [`Shared::empty`], [`Weak::lock`]). Dereferencing an empty
/// handle panics; [`Shared::get`] is the non-panicking accessor.
///
/// ## Threading
/// Counts are plain integers. `Shared<T>` is neither [`Send`] nor [`Sync`].
///
/// To prevent name clashes with `T`, `Shared<T>`'s functions are associated.
///
/// ## Examples
/// ```
/// use shrc::Shared;
///
/// let shared = Shared::new(100);
/// let copy = shared.clone();
/// assert_eq!(Shared::use_count(&shared), 2);
/// assert_eq!(*copy, 100);
/// ```
pub struct Shared<T: ?Sized> {
    pub(crate) parts: Option<Parts<T>>,
    _owns: PhantomData<T>,
}

impl<T: ?Sized> Shared<T> {
    #[inline]
    pub(crate) fn from_parts(parts: Parts<T>) -> Self {
        Shared {
            parts: Some(parts),
            _owns: PhantomData,
        }
    }

    /// Creates a handle that owns nothing.
    /// ```
    /// use shrc::Shared;
    ///
    /// let empty = Shared::<i32>::empty();
    /// assert!(Shared::is_empty(&empty));
    /// assert_eq!(Shared::use_count(&empty), 0);
    /// ```
    #[inline]
    pub const fn empty() -> Self {
        Shared {
            parts: None,
            _owns: PhantomData,
        }
    }
}

impl<T> Shared<T> {
    /// Creates a new `Shared<T>`, placing the control block and the value in one allocation.
    /// The new handle is the only strong reference and there are no weak ones.
    /// ```
    /// use shrc::Shared;
    ///
    /// let shared = Shared::new(7);
    /// assert_eq!(*shared, 7);
    /// assert_eq!(Shared::use_count(&shared), 1);
    /// assert_eq!(Shared::weak_count(&shared), 0);
    /// ```
    #[inline]
    pub fn new(value: T) -> Self
    where
        T: 'static,
    {
        let (block, ptr) = EmbeddedBlock::allocate(value);
        Shared::from_parts(Parts { block, ptr })
    }

    /// Like [`Shared::new`], and additionally attaches the value's [`SelfObserver`](crate::SelfObserver)
    /// so that [`ObserveSelf::shared_from_this`] works on it.
    /// ```
    /// use shrc::{ObserveSelf, SelfObserver, Shared};
    ///
    /// struct Node {
    ///     this: SelfObserver<Node>,
    /// }
    ///
    /// impl ObserveSelf for Node {
    ///     fn self_observer(&self) -> &SelfObserver<Self> {
    ///         &self.this
    ///     }
    /// }
    ///
    /// let node = Shared::new_observed(Node { this: SelfObserver::new() });
    /// let again = node.shared_from_this().unwrap();
    /// assert!(Shared::ptr_eq(&node, &again));
    /// ```
    #[inline]
    pub fn new_observed(value: T) -> Self
    where
        T: ObserveSelf + 'static,
    {
        let this = Shared::new(value);
        observer::attach(&this);
        this
    }
}

impl<T: ?Sized> Shared<T> {
    /// Adopts an already boxed value. The box keeps its own allocation and a separate control
    /// block is created for it. Works for unsized values too.
    /// ```
    /// use shrc::Shared;
    /// use std::fmt::Display;
    ///
    /// let shared: Shared<dyn Display> = Shared::from_box(Box::new(12) as Box<dyn Display>);
    /// assert_eq!(shared.to_string(), "12");
    /// ```
    #[inline]
    pub fn from_box(value: Box<T>) -> Self
    where
        T: 'static,
    {
        let ptr = NonNull::from(Box::leak(value));
        let block = PointerBlock::allocate(ptr);
        Shared::from_parts(Parts { block, ptr })
    }

    /// Like [`Shared::from_box`], and additionally attaches the value's self-observer.
    /// ```
    /// use shrc::{ObserveSelf, SelfObserver, Shared};
    ///
    /// struct Node {
    ///     this: SelfObserver<Node>,
    /// }
    ///
    /// impl ObserveSelf for Node {
    ///     fn self_observer(&self) -> &SelfObserver<Self> {
    ///         &self.this
    ///     }
    /// }
    ///
    /// let node = Shared::from_box_observed(Box::new(Node { this: SelfObserver::new() }));
    /// assert_eq!(Shared::use_count(&node.shared_from_this().unwrap()), 2);
    /// assert_eq!(Shared::weak_count(&node), 1);
    /// ```
    #[inline]
    pub fn from_box_observed(value: Box<T>) -> Self
    where
        T: ObserveSelf + 'static,
    {
        let this = Shared::from_box(value);
        observer::attach(&this);
        this
    }

    /// Adopts a raw pointer. A null pointer gives an empty handle.
    ///
    /// # Safety
    /// A non-null `ptr` must come from [`Box::into_raw`] and must not be adopted, freed or
    /// otherwise owned by anything else afterwards.
    /// ```
    /// use shrc::Shared;
    ///
    /// let raw = Box::into_raw(Box::new(42));
    /// let shared = unsafe { Shared::from_raw(raw) };
    /// assert_eq!(*shared, 42);
    ///
    /// let none = unsafe { Shared::<i32>::from_raw(std::ptr::null_mut()) };
    /// assert!(Shared::is_empty(&none));
    /// ```
    #[inline]
    pub unsafe fn from_raw(ptr: *mut T) -> Self
    where
        T: 'static,
    {
        match NonNull::new(ptr) {
            Some(ptr) => Shared::from_parts(Parts {
                block: PointerBlock::allocate(ptr),
                ptr,
            }),
            None => Shared::empty(),
        }
    }

    /// Like [`Shared::from_raw`], and additionally attaches the value's self-observer.
    /// A null pointer gives an empty handle and attaches nothing.
    ///
    /// # Safety
    /// Same contract as [`Shared::from_raw`].
    /// ```
    /// use shrc::{ObserveSelf, SelfObserver, Shared};
    ///
    /// struct Node {
    ///     this: SelfObserver<Node>,
    /// }
    ///
    /// impl ObserveSelf for Node {
    ///     fn self_observer(&self) -> &SelfObserver<Self> {
    ///         &self.this
    ///     }
    /// }
    ///
    /// let raw = Box::into_raw(Box::new(Node { this: SelfObserver::new() }));
    /// let node = unsafe { Shared::from_raw_observed(raw) };
    /// assert!(node.this.is_attached());
    /// assert!(Shared::ptr_eq(&node, &node.shared_from_this().unwrap()));
    /// ```
    #[inline]
    pub unsafe fn from_raw_observed(ptr: *mut T) -> Self
    where
        T: ObserveSelf + 'static,
    {
        let this = Shared::from_raw(ptr);
        observer::attach(&this);
        this
    }

    /// Creates a handle that shares `other`'s control block but dereferences to `ptr`.
    /// If `other` is empty, so is the result.
    ///
    /// # Safety
    /// `ptr` must stay valid for as long as `other`'s control block keeps its value alive,
    /// which normally means it points into that value.
    #[inline]
    pub unsafe fn aliasing<U: ?Sized>(other: &Shared<U>, ptr: NonNull<T>) -> Self {
        match other.parts {
            Some(parts) => {
                parts.block().increment(CountKind::Strong);
                Shared::from_parts(Parts {
                    block: parts.block,
                    ptr,
                })
            }
            None => Shared::empty(),
        }
    }

    /// Creates an aliasing handle to something reachable from the value, such as a field, or the
    /// value viewed as a trait object. The new handle keeps the whole value alive.
    /// ```
    /// use shrc::Shared;
    ///
    /// struct Pair {
    ///     left: i32,
    ///     right: String,
    /// }
    ///
    /// let pair = Shared::new(Pair { left: 1, right: String::from("right") });
    /// let right = Shared::project(&pair, |p| &p.right);
    /// drop(pair);
    /// assert_eq!(*right, "right");
    /// ```
    #[inline]
    pub fn project<U: ?Sized, F>(this: &Self, project: F) -> Shared<U>
    where
        F: FnOnce(&T) -> &U,
    {
        match this.parts {
            Some(parts) => {
                let ptr = NonNull::from(project(unsafe { parts.ptr.as_ref() }));
                parts.block().increment(CountKind::Strong);
                Shared::from_parts(Parts {
                    block: parts.block,
                    ptr,
                })
            }
            None => Shared::empty(),
        }
    }

    /// Consuming version of [`Shared::project`]. The strong count does not change.
    /// ```
    /// use shrc::Shared;
    /// use std::fmt::Debug;
    ///
    /// let shared = Shared::new(vec![1, 2, 3]);
    /// let debug: Shared<dyn Debug> = Shared::map(shared, |v| v as &dyn Debug);
    /// assert_eq!(format!("{:?}", debug), "[1, 2, 3]");
    /// ```
    #[inline]
    pub fn map<U: ?Sized, F>(this: Self, project: F) -> Shared<U>
    where
        F: FnOnce(&T) -> &U,
    {
        let Some(parts) = this.parts else {
            return Shared::empty();
        };
        let ptr = NonNull::from(project(unsafe { parts.ptr.as_ref() }));
        mem::forget(this);
        Shared::from_parts(Parts {
            block: parts.block,
            ptr,
        })
    }

    /// Promotes a [`Weak<T>`] into a new strong handle. Fails if the value has already been
    /// dropped or if `weak` is empty.
    /// ```
    /// use shrc::Shared;
    ///
    /// let shared = Shared::new(3);
    /// let weak = Shared::downgrade(&shared);
    /// let again = Shared::from_weak(&weak).unwrap();
    /// assert_eq!(Shared::use_count(&again), 2);
    /// ```
    #[inline]
    pub fn from_weak(weak: &Weak<T>) -> Result<Self, ExpiredError> {
        match weak.parts {
            Some(parts) if parts.block().count(CountKind::Strong) != 0 => {
                parts.block().increment(CountKind::Strong);
                Ok(Shared::from_parts(parts))
            }
            _ => Err(ExpiredError),
        }
    }

    /// Creates a [`Weak<T>`] observing the same value. This increments the weak count.
    /// ```
    /// use shrc::Shared;
    ///
    /// let shared = Shared::new(100);
    /// let weak = Shared::downgrade(&shared);
    /// assert_eq!(Shared::weak_count(&shared), 1);
    /// ```
    #[inline]
    pub fn downgrade(this: &Self) -> Weak<T> {
        if let Some(parts) = this.parts {
            parts.block().increment(CountKind::Weak);
        }
        Weak::from_parts(this.parts)
    }

    /// Releases the reference held by this handle and leaves it empty.
    /// ```
    /// use shrc::Shared;
    ///
    /// let mut shared = Shared::new(1);
    /// let weak = Shared::downgrade(&shared);
    /// Shared::reset(&mut shared);
    /// assert!(Shared::is_empty(&shared));
    /// assert!(shrc::Weak::expired(&weak));
    /// ```
    #[inline]
    pub fn reset(this: &mut Self) {
        drop(mem::take(this));
    }

    /// Releases the reference held by this handle and adopts `value` in its place.
    /// ```
    /// use shrc::Shared;
    ///
    /// let mut shared = Shared::new(1);
    /// let old = Shared::downgrade(&shared);
    /// Shared::reset_with(&mut shared, Box::new(2));
    /// assert!(shrc::Weak::expired(&old));
    /// assert_eq!(*shared, 2);
    /// assert_eq!(Shared::use_count(&shared), 1);
    /// ```
    #[inline]
    pub fn reset_with(this: &mut Self, value: Box<T>)
    where
        T: 'static,
    {
        *this = Shared::from_box(value);
    }

    /// Exchanges the contents of two handles without touching any count.
    /// ```
    /// use shrc::Shared;
    ///
    /// let mut a = Shared::new(1);
    /// let mut b = Shared::empty();
    /// Shared::swap(&mut a, &mut b);
    /// assert!(Shared::is_empty(&a));
    /// assert_eq!(*b, 1);
    /// assert_eq!(Shared::use_count(&b), 1);
    /// ```
    #[inline]
    pub fn swap(this: &mut Self, other: &mut Self) {
        mem::swap(&mut this.parts, &mut other.parts);
    }

    /// Returns a reference to the value, or [`None`] if the handle is empty.
    #[inline]
    pub fn get(this: &Self) -> Option<&T> {
        this.parts.as_ref().map(|parts| unsafe { parts.ptr.as_ref() })
    }

    /// Returns the address this handle dereferences to.
    /// ```
    /// use shrc::Shared;
    ///
    /// let shared = Shared::new(100);
    /// let ptr = Shared::as_ptr(&shared).unwrap();
    /// assert!(std::ptr::eq(ptr.as_ptr(), &*shared));
    /// ```
    #[inline]
    pub fn as_ptr(this: &Self) -> Option<NonNull<T>> {
        this.parts.map(|parts| parts.ptr)
    }

    /// Number of strong handles in this handle's ownership group; 0 when empty.
    /// ```
    /// use shrc::Shared;
    ///
    /// let shared = Shared::new(100);
    /// let copy = shared.clone();
    /// assert_eq!(Shared::use_count(&shared), 2);
    /// drop(copy);
    /// assert_eq!(Shared::use_count(&shared), 1);
    /// ```
    #[inline]
    pub fn use_count(this: &Self) -> usize {
        this.parts
            .map_or(0, |parts| parts.block().count(CountKind::Strong))
    }

    /// Number of weak handles in this handle's ownership group; 0 when empty.
    #[inline]
    pub fn weak_count(this: &Self) -> usize {
        this.parts
            .map_or(0, |parts| parts.block().count(CountKind::Weak))
    }

    /// Whether this handle owns nothing. This is the boolean liveness check: a non-empty handle
    /// always keeps its value alive.
    /// ```
    /// use shrc::Shared;
    ///
    /// let mut shared = Shared::new(1);
    /// assert!(!Shared::is_empty(&shared));
    /// Shared::reset(&mut shared);
    /// assert!(Shared::is_empty(&shared));
    /// ```
    #[inline]
    pub fn is_empty(this: &Self) -> bool {
        this.parts.is_none()
    }

    /// Checks whether two handles belong to the same ownership group. Aliases of one value
    /// are equal even though they dereference to different addresses.
    /// ```
    /// use shrc::Shared;
    ///
    /// let pair = Shared::new((1u8, 2u16));
    /// let second = Shared::project(&pair, |p| &p.1);
    /// assert!(Shared::ptr_eq(&pair, &second));
    /// assert!(!Shared::ptr_eq(&pair, &Shared::new((1u8, 2u16))));
    /// ```
    #[inline]
    pub fn ptr_eq<U: ?Sized>(this: &Self, other: &Shared<U>) -> bool {
        block::block_addr(&this.parts) == block::block_addr(&other.parts)
    }
}

impl<T: ?Sized> TryFrom<&Weak<T>> for Shared<T> {
    type Error = ExpiredError;

    /// Same as [`Shared::from_weak`].
    fn try_from(weak: &Weak<T>) -> Result<Self, Self::Error> {
        Shared::from_weak(weak)
    }
}

impl<T: ?Sized> Deref for Shared<T> {
    type Target = T;

    /// # Panics
    /// Panics if the handle is empty.
    #[inline]
    fn deref(&self) -> &Self::Target {
        match Shared::get(self) {
            Some(value) => value,
            None => panic!("dereferenced an empty `Shared`"),
        }
    }
}

impl<T: ?Sized> Drop for Shared<T> {
    #[inline]
    fn drop(&mut self) {
        if let Some(parts) = self.parts.take() {
            unsafe { release(parts.block, CountKind::Strong) };
        }
    }
}

impl<T: ?Sized> Clone for Shared<T> {
    /// Clone a `Shared<T>` (increment the strong count).
    /// It will panic if the strong count overflows.
    #[inline]
    fn clone(&self) -> Self {
        if let Some(parts) = self.parts {
            parts.block().increment(CountKind::Strong);
        }
        Shared {
            parts: self.parts,
            _owns: PhantomData,
        }
    }

    /// Copy-assignment. When both handles already share a control block, only the
    /// dereferenced address is copied and the counts stay as they are.
    /// ```
    /// use shrc::Shared;
    ///
    /// let a = Shared::new(1);
    /// let mut b = a.clone();
    /// b.clone_from(&a);
    /// assert_eq!(Shared::use_count(&a), 2);
    ///
    /// let c = Shared::new(2);
    /// b.clone_from(&c);
    /// assert_eq!(Shared::use_count(&a), 1);
    /// assert_eq!(Shared::use_count(&c), 2);
    /// ```
    #[inline]
    fn clone_from(&mut self, source: &Self) {
        if Shared::ptr_eq(self, source) {
            self.parts = source.parts;
        } else {
            *self = source.clone();
        }
    }
}

impl<T: ?Sized> Default for Shared<T> {
    /// An empty handle.
    #[inline]
    fn default() -> Self {
        Shared::empty()
    }
}

impl<T: ?Sized, U: ?Sized> PartialEq<Shared<U>> for Shared<T> {
    /// Compares control blocks, see [`Shared::ptr_eq`].
    #[inline]
    fn eq(&self, other: &Shared<U>) -> bool {
        Shared::ptr_eq(self, other)
    }
}

impl<T: ?Sized> Eq for Shared<T> {}

impl<T: ?Sized> Hash for Shared<T> {
    /// Hashes the control block address, consistent with [`PartialEq`].
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        ptr::hash(block::block_addr(&self.parts), state);
    }
}

impl<T: ?Sized> AsRef<T> for Shared<T> {
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: ?Sized> Borrow<T> for Shared<T> {
    fn borrow(&self) -> &T {
        self
    }
}

impl<T: ?Sized + Display> Display for Shared<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match Shared::get(self) {
            Some(value) => Display::fmt(value, f),
            None => f.write_str("(empty)"),
        }
    }
}

impl<T: ?Sized + Debug> Debug for Shared<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match Shared::get(self) {
            Some(value) => Debug::fmt(value, f),
            None => f.write_str("(empty)"),
        }
    }
}

impl<T: ?Sized> Pointer for Shared<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match Shared::as_ptr(self) {
            Some(ptr) => Pointer::fmt(&ptr, f),
            None => Pointer::fmt(&ptr::null::<u8>(), f),
        }
    }
}

impl<T: 'static> From<T> for Shared<T> {
    /// Equivalent to [`Shared::new`].
    /// ```
    /// use shrc::Shared;
    ///
    /// let shared = Shared::from(100);
    /// assert_eq!(*shared, 100);
    /// ```
    fn from(value: T) -> Self {
        Shared::new(value)
    }
}

impl<T: ?Sized + 'static> From<Box<T>> for Shared<T> {
    /// Equivalent to [`Shared::from_box`].
    fn from(value: Box<T>) -> Self {
        Shared::from_box(value)
    }
}

impl<T: ?Sized + core::error::Error> core::error::Error for Shared<T> {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        Shared::get(self).and_then(|value| value.source())
    }
}
