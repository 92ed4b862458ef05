//! `shrc` provides single-threaded shared ownership: [`Shared<T>`] owns a heap-resident value
//! together with every other `Shared<T>` of the same ownership group, and [`Weak<T>`] observes it
//! without keeping it alive.
//!
//! Each ownership group has one control block holding a strong and a weak count.
//! The value is dropped when the strong count reaches zero, and the control block is freed when
//! both counts are zero. There are two kinds of control block:
//! - [`Shared::new`] allocates the counts and the value together, in one allocation.
//! - [`Shared::from_box`] adopts a value that is already boxed (also `Box<dyn Trait>`).
//!
//! A handle's dereferenced address is independent from its control block, which allows aliasing
//! handles to fields or trait object views of a value ([`Shared::project`]). Handles compare equal
//! when they share a control block.
//!
//! A `Weak<T>` becomes a `Shared<T>` again through [`Weak::lock`], which returns an empty handle
//! when the value is gone, or [`Shared::from_weak`], which fails with [`ExpiredError`].
//!
//! Values that need handles to themselves embed a [`SelfObserver`] and implement [`ObserveSelf`].
//!
//! Counts are not atomic. Neither handle is [`Send`] or [`Sync`].
#![cfg_attr(all(feature = "nostd", not(test)), no_std)]

extern crate alloc;

mod block;
pub mod error;
pub mod observer;
pub mod shared;
pub mod weak;

pub use crate::error::ExpiredError;
pub use crate::observer::{ObserveSelf, SelfObserver};
pub use crate::shared::Shared;
pub use crate::weak::Weak;
