use core::{cell::OnceCell, fmt::Debug};

use crate::{error::ExpiredError, shared::Shared, weak::Weak};

/// Slot a value embeds to be able to hand out handles to itself.
///
/// The slot is filled exactly once, when the value is first put under a control block by
/// [`Shared::new_observed`], [`Shared::from_box_observed`] or [`Shared::from_raw_observed`].
/// Before that, and after the last
/// strong handle is dropped, promotion fails. Cloning a slot gives an unattached one, since the
/// clone is a different value.
pub struct SelfObserver<T: ?Sized> {
    this: OnceCell<Weak<T>>,
}

impl<T: ?Sized> SelfObserver<T> {
    /// Creates an unattached slot, to be stored in the value under construction.
    /// ```
    /// use shrc::SelfObserver;
    ///
    /// let slot = SelfObserver::<i32>::new();
    /// assert!(!slot.is_attached());
    /// ```
    #[inline]
    pub const fn new() -> Self {
        SelfObserver {
            this: OnceCell::new(),
        }
    }

    /// Whether a control block has been attached to the owning value.
    #[inline]
    pub fn is_attached(&self) -> bool {
        self.this.get().is_some()
    }

    /// Promotes the stored weak handle. Fails with [`ExpiredError`] when the slot was never
    /// attached or when every strong handle is gone.
    /// ```
    /// use shrc::{ExpiredError, SelfObserver};
    ///
    /// let slot = SelfObserver::<i32>::new();
    /// assert_eq!(slot.shared().unwrap_err(), ExpiredError);
    /// ```
    #[inline]
    pub fn shared(&self) -> Result<Shared<T>, ExpiredError> {
        match self.this.get() {
            Some(weak) => Shared::from_weak(weak),
            None => Err(ExpiredError),
        }
    }

    /// Returns a copy of the stored weak handle, or an empty one when the slot was never attached.
    /// ```
    /// use shrc::{SelfObserver, Weak};
    ///
    /// let slot = SelfObserver::<i32>::new();
    /// assert!(Weak::expired(&slot.weak()));
    /// ```
    #[inline]
    pub fn weak(&self) -> Weak<T> {
        self.this.get().cloned().unwrap_or_default()
    }
}

impl<T: ?Sized> Default for SelfObserver<T> {
    fn default() -> Self {
        SelfObserver::new()
    }
}

impl<T: ?Sized> Clone for SelfObserver<T> {
    fn clone(&self) -> Self {
        SelfObserver::new()
    }
}

impl<T: ?Sized> Debug for SelfObserver<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SelfObserver")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Opt-in capability for values that need [`Shared`] or [`Weak`] handles to themselves.
///
/// ```
/// use shrc::{ObserveSelf, SelfObserver, Shared, ExpiredError};
///
/// struct Widget {
///     this: SelfObserver<Widget>,
///     id: u32,
/// }
///
/// impl ObserveSelf for Widget {
///     fn self_observer(&self) -> &SelfObserver<Self> {
///         &self.this
///     }
/// }
///
/// let loose = Widget { this: SelfObserver::new(), id: 1 };
/// assert_eq!(loose.shared_from_this().err(), Some(ExpiredError));
///
/// let widget = Shared::new_observed(Widget { this: SelfObserver::new(), id: 2 });
/// let again = widget.shared_from_this().unwrap();
/// assert_eq!(again.id, 2);
/// assert_eq!(Shared::use_count(&widget), 2);
/// ```
///
/// # Note
/// Only [`Shared::new_observed`], [`Shared::from_box_observed`] and
/// [`Shared::from_raw_observed`] attach the slot. A value built with plain [`Shared::new`],
/// [`Shared::from_box`] or [`Shared::from_raw`] keeps an unattached slot, and its
/// `shared_from_this` keeps failing with [`ExpiredError`] even while strong handles exist.
/// ```
/// use shrc::{ExpiredError, ObserveSelf, SelfObserver, Shared};
///
/// struct Widget {
///     this: SelfObserver<Widget>,
/// }
///
/// impl ObserveSelf for Widget {
///     fn self_observer(&self) -> &SelfObserver<Self> {
///         &self.this
///     }
/// }
///
/// let plain = Shared::new(Widget { this: SelfObserver::new() });
/// assert_eq!(plain.shared_from_this().err(), Some(ExpiredError));
/// ```
pub trait ObserveSelf {
    /// Returns the slot embedded in `self`. Implementations just borrow the field.
    /// ```
    /// use shrc::{ObserveSelf, SelfObserver, Shared};
    ///
    /// struct Widget {
    ///     this: SelfObserver<Widget>,
    /// }
    ///
    /// impl ObserveSelf for Widget {
    ///     fn self_observer(&self) -> &SelfObserver<Self> {
    ///         &self.this
    ///     }
    /// }
    ///
    /// let widget = Shared::new_observed(Widget { this: SelfObserver::new() });
    /// assert!(widget.self_observer().is_attached());
    /// ```
    fn self_observer(&self) -> &SelfObserver<Self>;

    /// Returns a new strong handle sharing the control block that manages `self`.
    /// Fails if no `Shared` has been attached yet or all of them are gone.
    fn shared_from_this(&self) -> Result<Shared<Self>, ExpiredError> {
        self.self_observer().shared()
    }

    /// Returns a weak handle to `self`; empty if no control block was ever attached.
    fn weak_from_this(&self) -> Weak<Self> {
        self.self_observer().weak()
    }
}

/// Wires the freshly created `handle` into its value's observer slot. Later calls are ignored.
pub(crate) fn attach<T: ?Sized + ObserveSelf>(handle: &Shared<T>) {
    if let Some(value) = Shared::get(handle) {
        let _ = value.self_observer().this.set(Shared::downgrade(handle));
    }
}
