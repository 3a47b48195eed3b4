#![forbid(unsafe_code)]

//! Storage bridge: reactive cells mirroring one key of one storage area.
//!
//! Three operations make up the bridge:
//!
//! - [`poll_storage_changes`] listens for change events on one
//!   `(area, key)` pair and hands the decoded new value to a callback.
//! - [`update_storage`] writes a raw value and broadcasts the change on the
//!   channel, so bridges in the writing context see it too. Host storage only
//!   notifies *other* contexts of a write.
//! - [`use_reactive_storage`] builds a [`ReactiveStorage`]: a cell seeded
//!   from storage that, while active, follows every change to its key.
//!
//! The free functions use [`EventChannel::global`]; the same operations are
//! available as methods on an explicit [`EventChannel`].
//!
//! # Lifecycle
//!
//! A [`ReactiveStorage`] is either detached or attached. [`activate`]
//! attaches exactly one channel listener, [`deactivate`] releases it, and
//! both are idempotent. Dropping the bridge or a [`MountGuard`] releases the
//! listener, so no listener outlives its owner.
//!
//! [`activate`]: ReactiveStorage::activate
//! [`deactivate`]: ReactiveStorage::deactivate

use std::cell::{Cell, RefCell};

use serde::Serialize;

use crate::reactive::{Observable, ReadSignal};
use crate::storage::{
    EventChannel, ListenerId, StorageArea, StorageError, StorageEvent, StoredValue,
};

/// Listen for changes to `key` in `area` on the global channel.
///
/// See [`EventChannel::poll_storage_changes`].
pub fn poll_storage_changes(
    area: &StorageArea,
    key: &str,
    callback: impl Fn(StoredValue) + 'static,
) -> ChangeSubscription {
    EventChannel::global().poll_storage_changes(area, key, callback)
}

/// Write `new_value` and broadcast the change on the global channel.
///
/// See [`EventChannel::update_storage`].
pub fn update_storage(area: &StorageArea, key: &str, new_value: &str) -> Result<(), StorageError> {
    EventChannel::global().update_storage(area, key, new_value)
}

/// Serialize `value` as JSON, then [`update_storage`].
pub fn update_storage_json<T: Serialize + ?Sized>(
    area: &StorageArea,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    EventChannel::global().update_storage_json(area, key, value)
}

/// Remove `key` and broadcast the removal on the global channel.
pub fn remove_storage(area: &StorageArea, key: &str) -> Result<(), StorageError> {
    EventChannel::global().remove_storage(area, key)
}

/// Build a reactive cell for `key` in `area`, bound to the global channel.
///
/// The returned bridge starts detached; call [`ReactiveStorage::activate`]
/// or [`ReactiveStorage::mount`] to follow changes.
pub fn use_reactive_storage(area: &StorageArea, key: &str) -> Result<ReactiveStorage, StorageError> {
    ReactiveStorage::with_channel(&EventChannel::global(), area, key)
}

impl EventChannel {
    /// Invoke `callback` with the decoded new value of every event on this
    /// channel that concerns exactly `key` in `area`.
    ///
    /// Events for other keys or other areas are ignored. The listener stays
    /// registered until the returned subscription is unsubscribed or dropped.
    pub fn poll_storage_changes(
        &self,
        area: &StorageArea,
        key: &str,
        callback: impl Fn(StoredValue) + 'static,
    ) -> ChangeSubscription {
        let area = area.clone();
        let key = key.to_owned();
        let id = self.add_listener(move |event: &StorageEvent| {
            if event.matches(&area, &key) {
                callback(StoredValue::decode(event.new_value.as_deref()));
            }
        });
        ChangeSubscription {
            channel: self.clone(),
            id: Cell::new(Some(id)),
        }
    }

    /// Write the raw `new_value` under `key`, then dispatch a
    /// [`StorageEvent`] carrying the old and new raw values.
    ///
    /// The value is stored as given; nothing is serialized here. Listeners run
    /// before this returns and observe the value already written. Backend
    /// failures are returned before anything is dispatched.
    pub fn update_storage(
        &self,
        area: &StorageArea,
        key: &str,
        new_value: &str,
    ) -> Result<(), StorageError> {
        let old_value = area.get_item(key)?;
        area.set_item(key, new_value)?;
        self.dispatch(&StorageEvent {
            key: Some(key.to_owned()),
            old_value,
            new_value: Some(new_value.to_owned()),
            storage_area: Some(area.clone()),
            url: self.location(),
        });
        Ok(())
    }

    /// Serialize `value` as JSON, then [`update_storage`](Self::update_storage).
    pub fn update_storage_json<T: Serialize + ?Sized>(
        &self,
        area: &StorageArea,
        key: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        let json = serde_json::to_string(value)?;
        self.update_storage(area, key, &json)
    }

    /// Remove `key`, then dispatch an event with no new value.
    pub fn remove_storage(&self, area: &StorageArea, key: &str) -> Result<(), StorageError> {
        let old_value = area.get_item(key)?;
        area.remove_item(key)?;
        self.dispatch(&StorageEvent {
            key: Some(key.to_owned()),
            old_value,
            new_value: None,
            storage_area: Some(area.clone()),
            url: self.location(),
        });
        Ok(())
    }
}

/// Registration returned by [`poll_storage_changes`].
///
/// Unsubscribing is idempotent. Dropping the subscription unsubscribes.
#[must_use = "dropping a ChangeSubscription unsubscribes immediately"]
pub struct ChangeSubscription {
    channel: EventChannel,
    id: Cell<Option<ListenerId>>,
}

impl ChangeSubscription {
    /// Stop receiving changes. Later calls do nothing.
    pub fn unsubscribe(&self) {
        if let Some(id) = self.id.take() {
            self.channel.remove_listener(id);
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.id.get().is_some()
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for ChangeSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeSubscription")
            .field("listener", &self.id.get())
            .finish()
    }
}

/// Reactive mirror of one storage key.
pub struct ReactiveStorage {
    area: StorageArea,
    key: String,
    cell: Observable<StoredValue>,
    channel: EventChannel,
    listener: RefCell<Option<ChangeSubscription>>,
}

impl ReactiveStorage {
    /// Build a detached bridge on `channel`, seeded with the current stored
    /// value of `key`.
    pub fn with_channel(
        channel: &EventChannel,
        area: &StorageArea,
        key: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let key = key.into();
        if key.is_empty() {
            return Err(StorageError::InvalidKey);
        }
        let initial = StoredValue::decode(area.get_item(&key)?.as_deref());
        Ok(Self {
            area: area.clone(),
            key,
            cell: Observable::new(initial),
            channel: channel.clone(),
            listener: RefCell::new(None),
        })
    }

    /// Attach the change listener. Does nothing if already attached.
    pub fn activate(&self) {
        let mut listener = self.listener.borrow_mut();
        if listener.is_some() {
            return;
        }
        let cell = self.cell.clone();
        *listener = Some(
            self.channel
                .poll_storage_changes(&self.area, &self.key, move |value| cell.set(value)),
        );
        tracing::debug!(key = %self.key, scope = self.area.scope().as_str(), "storage bridge activated");
    }

    /// Release the change listener. Does nothing if already detached.
    pub fn deactivate(&self) {
        let released = self.listener.borrow_mut().take();
        if let Some(subscription) = released {
            subscription.unsubscribe();
            tracing::debug!(key = %self.key, scope = self.area.scope().as_str(), "storage bridge deactivated");
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.listener.borrow().is_some()
    }

    /// Activate for the lifetime of the returned guard.
    ///
    /// If the bridge was already active, the guard leaves it active on drop.
    pub fn mount(&self) -> MountGuard<'_> {
        let attached = !self.is_active();
        self.activate();
        MountGuard {
            bridge: self,
            attached,
        }
    }

    /// Re-read the key from storage into the cell.
    ///
    /// Changes made while the bridge was detached are not replayed; call this
    /// after re-activation to catch up.
    pub fn refresh(&self) -> Result<(), StorageError> {
        let current = StoredValue::decode(self.area.get_item(&self.key)?.as_deref());
        self.cell.set(current);
        Ok(())
    }

    /// Current decoded value.
    #[must_use]
    pub fn value(&self) -> StoredValue {
        self.cell.get()
    }

    /// Borrow the current decoded value for the duration of `f`.
    pub fn with_value<R>(&self, f: impl FnOnce(&StoredValue) -> R) -> R {
        self.cell.with(f)
    }

    /// Read-only view of the cell for consumers.
    #[must_use]
    pub fn signal(&self) -> ReadSignal<StoredValue> {
        self.cell.read_only()
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn area(&self) -> &StorageArea {
        &self.area
    }
}

impl Drop for ReactiveStorage {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl std::fmt::Debug for ReactiveStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.with_value(|value| {
            f.debug_struct("ReactiveStorage")
                .field("key", &self.key)
                .field("scope", &self.area.scope())
                .field("value", value)
                .field("active", &self.is_active())
                .finish()
        })
    }
}

/// Keeps a [`ReactiveStorage`] attached until dropped.
#[must_use = "dropping a MountGuard deactivates the bridge immediately"]
#[derive(Debug)]
pub struct MountGuard<'a> {
    bridge: &'a ReactiveStorage,
    // Whether this guard's `mount` call attached the listener.
    attached: bool,
}

impl Drop for MountGuard<'_> {
    fn drop(&mut self) {
        if self.attached {
            self.bridge.deactivate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use std::rc::Rc;
    use tracing_test::traced_test;

    #[test]
    fn construct_reads_current_value() {
        let area = StorageArea::new(
            MemoryStorage::with_items([("theme", "\"dark\""), ("count", "not-json{")]),
            crate::storage::StorageScope::Local,
        );
        let channel = EventChannel::default();

        let theme = ReactiveStorage::with_channel(&channel, &area, "theme").unwrap();
        assert_eq!(theme.value(), StoredValue::Json(json!("dark")));

        let count = ReactiveStorage::with_channel(&channel, &area, "count").unwrap();
        assert_eq!(count.value(), StoredValue::Raw("not-json{".into()));

        let missing = ReactiveStorage::with_channel(&channel, &area, "missing").unwrap();
        assert_eq!(missing.value(), StoredValue::Null);
        assert!(!missing.is_active());
    }

    #[test]
    fn empty_key_is_rejected() {
        let area = StorageArea::memory_local();
        let err = ReactiveStorage::with_channel(&EventChannel::default(), &area, "").unwrap_err();
        assert_eq!(err, StorageError::InvalidKey);
    }

    #[test]
    fn activation_is_idempotent() {
        let area = StorageArea::memory_local();
        let channel = EventChannel::default();
        let bridge = ReactiveStorage::with_channel(&channel, &area, "theme").unwrap();

        bridge.activate();
        bridge.activate();
        assert_eq!(channel.listener_count(), 1);

        bridge.deactivate();
        bridge.deactivate();
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn active_bridge_follows_writes() {
        let area = StorageArea::memory_local();
        let channel = EventChannel::default();
        let bridge = ReactiveStorage::with_channel(&channel, &area, "theme").unwrap();
        bridge.activate();

        channel.update_storage(&area, "theme", "\"dark\"").unwrap();
        assert_eq!(bridge.value(), StoredValue::Json(json!("dark")));

        channel.remove_storage(&area, "theme").unwrap();
        assert_eq!(bridge.value(), StoredValue::Null);
    }

    #[test]
    fn detached_bridge_ignores_writes_until_refresh() {
        let area = StorageArea::memory_local();
        let channel = EventChannel::default();
        let bridge = ReactiveStorage::with_channel(&channel, &area, "theme").unwrap();

        channel.update_storage(&area, "theme", "\"dark\"").unwrap();
        assert_eq!(bridge.value(), StoredValue::Null);

        bridge.refresh().unwrap();
        assert_eq!(bridge.value(), StoredValue::Json(json!("dark")));
    }

    #[test]
    fn mount_guard_releases_listener() {
        let area = StorageArea::memory_local();
        let channel = EventChannel::default();
        let bridge = ReactiveStorage::with_channel(&channel, &area, "theme").unwrap();
        {
            let _mounted = bridge.mount();
            assert!(bridge.is_active());
            assert_eq!(channel.listener_count(), 1);
        }
        assert!(!bridge.is_active());
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn mount_on_active_bridge_keeps_it_active() {
        let area = StorageArea::memory_local();
        let channel = EventChannel::default();
        let bridge = ReactiveStorage::with_channel(&channel, &area, "theme").unwrap();
        bridge.activate();
        drop(bridge.mount());

        assert!(bridge.is_active());
        channel.update_storage(&area, "theme", "\"dark\"").unwrap();
        assert_eq!(bridge.value().as_str(), Some("dark"));

        // Nested guards: only the outer one detaches.
        bridge.deactivate();
        {
            let _outer = bridge.mount();
            drop(bridge.mount());
            assert!(bridge.is_active());
        }
        assert!(!bridge.is_active());
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn with_value_borrows_current_value() {
        let area = StorageArea::new(
            MemoryStorage::with_items([("count", "3")]),
            crate::storage::StorageScope::Local,
        );
        let channel = EventChannel::default();
        let bridge = ReactiveStorage::with_channel(&channel, &area, "count").unwrap();

        assert_eq!(bridge.with_value(|v| v.as_json().and_then(|j| j.as_i64())), Some(3));
        let dbg = format!("{bridge:?}");
        assert!(dbg.contains("count"));
        assert!(dbg.contains("active: false"));
    }

    #[test]
    fn dropping_bridge_releases_listener() {
        let area = StorageArea::memory_local();
        let channel = EventChannel::default();
        let bridge = ReactiveStorage::with_channel(&channel, &area, "theme").unwrap();
        bridge.activate();
        drop(bridge);
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn update_event_carries_old_and_new_values() {
        let area = StorageArea::memory_session();
        let channel = EventChannel::new(
            crate::storage::ChannelConfig::new().with_location("http://localhost/cyber-dice"),
        );
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let area_in_listener = area.clone();
        channel.add_listener(move |event| {
            // The write is visible before listeners run.
            let stored = area_in_listener.get_item("roll").unwrap();
            assert_eq!(stored, event.new_value);
            log.borrow_mut().push(event.clone());
        });

        channel.update_storage(&area, "roll", "4").unwrap();
        channel.update_storage(&area, "roll", "6").unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].key.as_deref(), Some("roll"));
        assert_eq!(seen[1].old_value.as_deref(), Some("4"));
        assert_eq!(seen[1].new_value.as_deref(), Some("6"));
        assert_eq!(seen[1].url, "http://localhost/cyber-dice");
        assert!(seen[1].storage_area.as_ref().is_some_and(|a| a.same_area(&area)));
        assert_eq!(seen[0].old_value, None);
    }

    #[test]
    fn update_storage_json_serializes() {
        let area = StorageArea::memory_local();
        let channel = EventChannel::default();
        channel
            .update_storage_json(&area, "dice", &json!({"sides": 20}))
            .unwrap();
        assert_eq!(
            area.get_item("dice").unwrap().as_deref(),
            Some(r#"{"sides":20}"#)
        );
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let area = StorageArea::memory_local();
        let channel = EventChannel::default();
        let sub = channel.poll_storage_changes(&area, "k", |_| {});
        assert!(sub.is_active());
        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn signal_subscribers_see_bridge_updates() {
        let area = StorageArea::memory_local();
        let channel = EventChannel::default();
        let bridge = ReactiveStorage::with_channel(&channel, &area, "theme").unwrap();
        let _mounted = bridge.mount();

        let rendered = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&rendered);
        let _sub = bridge
            .signal()
            .subscribe(move |value: &StoredValue| {
                sink.borrow_mut()
                    .push(value.as_str().unwrap_or_default().to_string());
            });

        channel.update_storage(&area, "theme", "\"dark\"").unwrap();
        channel.update_storage(&area, "theme", "\"dark\"").unwrap();
        channel.update_storage(&area, "theme", "light").unwrap();

        assert_eq!(*rendered.borrow(), vec!["dark".to_string(), "light".to_string()]);
        assert_eq!(bridge.signal().version(), 2);
    }

    #[test]
    #[traced_test]
    fn lifecycle_is_logged() {
        let area = StorageArea::memory_local();
        let bridge = ReactiveStorage::with_channel(&EventChannel::default(), &area, "theme").unwrap();
        bridge.activate();
        bridge.deactivate();
        assert!(logs_contain("storage bridge activated"));
        assert!(logs_contain("storage bridge deactivated"));
        assert!(logs_contain("storage listener removed"));
    }
}
