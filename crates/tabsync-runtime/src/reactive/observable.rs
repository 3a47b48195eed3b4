#![forbid(unsafe_code)]

//! Single-threaded observable cell with change notification.
//!
//! # Design
//!
//! [`Observable<T>`] keeps its value in shared `Rc<RefCell<..>>` storage.
//! Every handle cloned from the same observable sees the same value, the same
//! version counter and the same subscriber list. A write that changes the
//! value (by `PartialEq`) bumps the version and notifies live subscribers in
//! registration order.
//!
//! [`ReadSignal<T>`] is a read-only view over the same state. Storage bridges
//! hand these out so that only the bridge's own listener can write the cell.
//!
//! # Failure Modes
//!
//! - **Borrow held across a callback**: calling [`Observable::with`] and
//!   writing the same observable from inside the closure panics (RefCell
//!   borrow rules). Subscriber callbacks are invoked with no borrow held, so
//!   writing from a subscriber is allowed.
//! - **Guard leak**: callbacks live as long as their [`Subscription`] guard.
//!   Dead entries are pruned on the next notification.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type CallbackRc<T> = Rc<dyn Fn(&T)>;
type CallbackWeak<T> = Weak<dyn Fn(&T)>;

struct Shared<T> {
    value: T,
    version: u64,
    subscribers: Vec<CallbackWeak<T>>,
}

/// A shared, version-tracked value with change notification.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 on each value-changing write.
/// 2. Writing a value equal to the current one is a no-op.
/// 3. Subscribers are notified in registration order.
/// 4. A dropped [`Subscription`] is never called again.
pub struct Observable<T> {
    shared: Rc<RefCell<Shared<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.shared.borrow();
        f.debug_struct("Observable")
            .field("value", &shared.value)
            .field("version", &shared.version)
            .field("subscribers", &shared.subscribers.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Create an observable holding `value` at version 0.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            shared: Rc::new(RefCell::new(Shared {
                value,
                version: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.shared.borrow().value.clone()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.shared.borrow().value)
    }

    /// Replace the value. Subscribers are notified only if it changed.
    pub fn set(&self, value: T) {
        {
            let mut shared = self.shared.borrow_mut();
            if shared.value == value {
                return;
            }
            shared.value = value;
            shared.version += 1;
        }
        self.notify();
    }

    /// Register `callback` to run with the new value after each change.
    ///
    /// The callback stays registered until the returned guard is dropped.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let strong: CallbackRc<T> = Rc::new(callback);
        self.shared
            .borrow_mut()
            .subscribers
            .push(Rc::downgrade(&strong));
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Number of value-changing writes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.shared.borrow().version
    }

    /// Read-only view sharing this observable's state.
    #[must_use]
    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal {
            source: self.clone(),
        }
    }

    fn notify(&self) {
        let (callbacks, value) = {
            let mut shared = self.shared.borrow_mut();
            shared.subscribers.retain(|w| w.strong_count() > 0);
            let callbacks: Vec<CallbackRc<T>> = shared
                .subscribers
                .iter()
                .filter_map(Weak::upgrade)
                .collect();
            (callbacks, shared.value.clone())
        };
        for cb in &callbacks {
            cb(&value);
        }
    }
}

/// Read-only handle to an [`Observable`].
pub struct ReadSignal<T> {
    source: Observable<T>,
}

impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ReadSignal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ReadSignal").field(&self.source).finish()
    }
}

impl<T: Clone + PartialEq + 'static> ReadSignal<T> {
    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.source.get()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.source.with(f)
    }

    /// See [`Observable::subscribe`].
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.source.subscribe(callback)
    }

    /// See [`Observable::version`].
    #[must_use]
    pub fn version(&self) -> u64 {
        self.source.version()
    }
}

/// RAII guard keeping a subscriber callback alive.
///
/// The observable only holds a `Weak` to the callback; this guard owns the
/// strong reference, so dropping it detaches the callback.
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
