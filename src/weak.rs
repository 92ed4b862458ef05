use core::{fmt::Debug, mem, ptr::NonNull};

use crate::{
    block::{self, release, CountKind, Parts},
    error::ExpiredError,
    shared::Shared,
};

/// `Weak<T>` is a non-owning reference to a value held by [`Shared<T>`]. It keeps the control
/// block alive but not the value, which may be dropped while weak handles still exist.
/// A `Weak<T>` cannot access the value directly and must be promoted into a [`Shared<T>`] first,
/// with [`Weak::lock`] or [`Weak::upgrade`].
///
/// One use case of a `Weak<T>` is to break ownership cycles: a parent owns its children through
/// `Shared<T>`, and the children point back at the parent with `Weak<T>`.
///
/// To prevent name clashes, `Weak<T>`'s functions are associated.
///
/// # Examples
/// ```
/// use shrc::{Shared, Weak};
///
/// let shared = Shared::new(100);
/// let weak = Shared::downgrade(&shared);
/// assert_eq!(*Weak::lock(&weak), 100);
///
/// drop(shared);
/// assert!(Weak::expired(&weak));
/// assert!(shrc::Shared::is_empty(&Weak::lock(&weak)));
/// ```
pub struct Weak<T: ?Sized> {
    pub(crate) parts: Option<Parts<T>>,
}

impl<T: ?Sized> Weak<T> {
    /// Callers must already hold the weak reference that `parts` stands for.
    #[inline]
    pub(crate) fn from_parts(parts: Option<Parts<T>>) -> Self {
        Weak { parts }
    }

    /// Creates a `Weak<T>` that observes nothing. It is always expired.
    #[inline]
    pub const fn new() -> Self {
        Weak { parts: None }
    }

    /// Promotes this `Weak<T>` into a [`Shared<T>`], or returns an empty `Shared<T>` if the value
    /// is gone. Never fails.
    /// ```
    /// use shrc::{Shared, Weak};
    ///
    /// let shared = Shared::new(5);
    /// let weak = Shared::downgrade(&shared);
    /// let locked = Weak::lock(&weak);
    /// assert_eq!(Shared::use_count(&shared), 2);
    /// assert!(Shared::ptr_eq(&locked, &shared));
    /// ```
    #[inline]
    pub fn lock(this: &Self) -> Shared<T> {
        Shared::from_weak(this).unwrap_or_default()
    }

    /// Promotes this `Weak<T>` into a [`Shared<T>`], failing with [`ExpiredError`] if the
    /// value is gone. Same as [`Shared::from_weak`].
    #[inline]
    pub fn upgrade(this: &Self) -> Result<Shared<T>, ExpiredError> {
        Shared::from_weak(this)
    }

    /// Whether the observed value has been dropped. Empty weak handles are expired.
    #[inline]
    pub fn expired(this: &Self) -> bool {
        Weak::use_count(this) == 0
    }

    /// Number of strong handles of the observed value.
    #[inline]
    pub fn use_count(this: &Self) -> usize {
        this.parts
            .map_or(0, |parts| parts.block().count(CountKind::Strong))
    }

    /// Number of weak handles, this one included.
    /// ```
    /// use shrc::{Shared, Weak};
    ///
    /// let shared = Shared::new(100);
    /// let weak1 = Shared::downgrade(&shared);
    /// let weak2 = weak1.clone();
    /// assert_eq!(Weak::weak_count(&weak2), 2);
    /// ```
    #[inline]
    pub fn weak_count(this: &Self) -> usize {
        this.parts
            .map_or(0, |parts| parts.block().count(CountKind::Weak))
    }

    /// Releases the weak reference and leaves this handle empty.
    #[inline]
    pub fn reset(this: &mut Self) {
        drop(mem::take(this));
    }

    /// Exchanges the contents of two weak handles without touching any count.
    /// ```
    /// use shrc::{Shared, Weak};
    ///
    /// let shared = Shared::new(1);
    /// let mut a = Shared::downgrade(&shared);
    /// let mut b = Weak::new();
    /// Weak::swap(&mut a, &mut b);
    /// assert!(Weak::expired(&a));
    /// assert_eq!(*Weak::lock(&b), 1);
    /// assert_eq!(Shared::weak_count(&shared), 1);
    /// ```
    #[inline]
    pub fn swap(this: &mut Self, other: &mut Self) {
        mem::swap(&mut this.parts, &mut other.parts);
    }

    /// Address the value had (or has). May dangle once the handle has expired.
    #[inline]
    pub fn as_ptr(this: &Self) -> Option<NonNull<T>> {
        this.parts.map(|parts| parts.ptr)
    }

    /// Checks whether both handles observe the same ownership group.
    #[inline]
    pub fn ptr_eq<U: ?Sized>(this: &Self, other: &Weak<U>) -> bool {
        block::block_addr(&this.parts) == block::block_addr(&other.parts)
    }
}

impl<T: ?Sized> From<&Shared<T>> for Weak<T> {
    /// Same as [`Shared::downgrade`].
    #[inline]
    fn from(shared: &Shared<T>) -> Self {
        Shared::downgrade(shared)
    }
}

impl<T: ?Sized> Drop for Weak<T> {
    #[inline]
    fn drop(&mut self) {
        if let Some(parts) = self.parts.take() {
            unsafe { release(parts.block, CountKind::Weak) };
        }
    }
}

impl<T: ?Sized> Clone for Weak<T> {
    /// Clone a `Weak<T>` (increment the weak count).
    #[inline]
    fn clone(&self) -> Self {
        if let Some(parts) = self.parts {
            parts.block().increment(CountKind::Weak);
        }
        Weak { parts: self.parts }
    }

    /// Copy-assignment that leaves the counts alone when both handles share a control block.
    #[inline]
    fn clone_from(&mut self, source: &Self) {
        if Weak::ptr_eq(self, source) {
            self.parts = source.parts;
        } else {
            *self = source.clone();
        }
    }
}

impl<T: ?Sized> Default for Weak<T> {
    #[inline]
    fn default() -> Self {
        Weak::new()
    }
}

impl<T: ?Sized> Debug for Weak<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("(Weak)")
    }
}
