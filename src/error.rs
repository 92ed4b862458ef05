use thiserror::Error;

/// Returned when a [`Weak`](crate::Weak) is promoted into a [`Shared`](crate::Shared)
/// after the last strong handle is gone, or before any was ever created.
///
/// This is the only recoverable error of the crate. [`Weak::lock`](crate::Weak::lock)
/// turns it into an empty handle instead.
///
/// ```
/// use shrc::{ExpiredError, Shared};
///
/// let shared = Shared::new(5);
/// let weak = Shared::downgrade(&shared);
/// drop(shared);
/// assert_eq!(Shared::from_weak(&weak).unwrap_err(), ExpiredError);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("attempted to promote an expired weak reference")]
pub struct ExpiredError;
