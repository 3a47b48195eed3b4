#![forbid(unsafe_code)]

//! Storage-change notifications and the channel that carries them.
//!
//! [`EventChannel`] plays the role of the window object: storage bridges add
//! listeners to it and writers dispatch [`StorageEvent`]s through it. One
//! channel exists per execution context ([`EventChannel::global`] is
//! thread-local); explicit channels can be built for isolation.
//!
//! # Invariants
//!
//! 1. Listeners run synchronously inside [`EventChannel::dispatch`], in
//!    registration order.
//! 2. A listener removed during a dispatch is not invoked for the rest of
//!    that dispatch.
//! 3. A listener added during a dispatch first sees the next event.
//! 4. No borrow of the channel is held while a listener runs, so listeners
//!    may register, remove, or dispatch re-entrantly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::StorageArea;

/// Description of a change to one key of one storage area.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageEvent {
    /// Changed key; `None` when the whole area was cleared.
    pub key: Option<String>,
    /// Raw value before the change.
    pub old_value: Option<String>,
    /// Raw value after the change; `None` when removed.
    pub new_value: Option<String>,
    /// Area the change happened in.
    pub storage_area: Option<StorageArea>,
    /// Location of the context that made the change.
    pub url: String,
}

impl StorageEvent {
    /// Whether this event concerns `key` in exactly `area`.
    #[must_use]
    pub fn matches(&self, area: &StorageArea, key: &str) -> bool {
        self.storage_area
            .as_ref()
            .is_some_and(|event_area| event_area.same_area(area))
            && self.key.as_deref() == Some(key)
    }
}

/// Configuration for an [`EventChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// URL stamped into events synthesized by writers on this channel.
    pub location: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            location: "about:blank".to_string(),
        }
    }
}

impl ChannelConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the location URL.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }
}

/// Handle returned by [`EventChannel::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Dispatch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Events passed to [`EventChannel::dispatch`].
    pub dispatched: u64,
    /// Listener invocations across all dispatches.
    pub delivered: u64,
}

type ListenerFn = dyn Fn(&StorageEvent);

struct ListenerEntry {
    id: ListenerId,
    live: Cell<bool>,
    callback: Box<ListenerFn>,
}

struct ChannelState {
    config: ChannelConfig,
    listeners: Vec<Rc<ListenerEntry>>,
    next_id: u64,
    stats: ChannelStats,
}

/// Publish/subscribe channel for [`StorageEvent`]s.
///
/// Cloning yields another handle to the same channel.
#[derive(Clone)]
pub struct EventChannel {
    state: Rc<RefCell<ChannelState>>,
}

thread_local! {
    static GLOBAL_CHANNEL: EventChannel = EventChannel::new(ChannelConfig::default());
}

impl EventChannel {
    #[must_use]
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(ChannelState {
                config,
                listeners: Vec::new(),
                next_id: 0,
                stats: ChannelStats::default(),
            })),
        }
    }

    /// The channel of the current execution context.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL_CHANNEL.with(Clone::clone)
    }

    /// Whether two handles refer to the same channel.
    #[must_use]
    pub fn same_channel(&self, other: &EventChannel) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    /// Register `callback` for every subsequent event.
    pub fn add_listener(&self, callback: impl Fn(&StorageEvent) + 'static) -> ListenerId {
        let mut state = self.state.borrow_mut();
        let id = ListenerId(state.next_id);
        state.next_id += 1;
        state.listeners.push(Rc::new(ListenerEntry {
            id,
            live: Cell::new(true),
            callback: Box::new(callback),
        }));
        tracing::debug!(
            listener = id.0,
            listeners = state.listeners.len(),
            "storage listener added"
        );
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut state = self.state.borrow_mut();
        let Some(pos) = state.listeners.iter().position(|entry| entry.id == id) else {
            return false;
        };
        let entry = state.listeners.remove(pos);
        entry.live.set(false);
        tracing::debug!(
            listener = id.0,
            listeners = state.listeners.len(),
            "storage listener removed"
        );
        true
    }

    /// Deliver `event` to every registered listener.
    pub fn dispatch(&self, event: &StorageEvent) {
        let snapshot: Vec<Rc<ListenerEntry>> = {
            let mut state = self.state.borrow_mut();
            state.stats.dispatched += 1;
            state.listeners.clone()
        };
        tracing::trace!(
            key = event.key.as_deref().unwrap_or("<clear>"),
            listeners = snapshot.len(),
            "dispatching storage event"
        );

        let mut delivered = 0u64;
        for entry in &snapshot {
            if !entry.live.get() {
                continue;
            }
            (entry.callback)(event);
            delivered += 1;
        }
        self.state.borrow_mut().stats.delivered += delivered;
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    #[must_use]
    pub fn stats(&self) -> ChannelStats {
        self.state.borrow().stats
    }

    /// URL stamped into synthesized events.
    #[must_use]
    pub fn location(&self) -> String {
        self.state.borrow().config.location.clone()
    }

    pub fn set_location(&self, location: impl Into<String>) {
        self.state.borrow_mut().config.location = location.into();
    }

    #[must_use]
    pub fn config(&self) -> ChannelConfig {
        self.state.borrow().config.clone()
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new(ChannelConfig::default())
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("EventChannel")
            .field("location", &state.config.location)
            .field("listeners", &state.listeners.len())
            .field("stats", &state.stats)
            .finish()
    }
}
