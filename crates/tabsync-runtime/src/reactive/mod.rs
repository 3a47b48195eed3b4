#![forbid(unsafe_code)]

//! Reactive cells.
//!
//! - [`Observable`]: shared, version-tracked value that notifies subscribers
//!   when it changes.
//! - [`ReadSignal`]: read-only view of an [`Observable`].
//! - [`Subscription`]: RAII guard that detaches its callback on drop.
//!
//! Everything here is single-threaded (`Rc<RefCell<..>>`), matching the
//! event-loop model the storage bridge runs under.

pub mod observable;

pub use observable::{Observable, ReadSignal, Subscription};
