#![forbid(unsafe_code)]

//! Reactive key/value storage for tabsync.
//!
//! A [`ReactiveStorage`] mirrors one key of a [`StorageArea`] into a
//! reactive cell and keeps it current by listening to [`StorageEvent`]s on
//! an [`EventChannel`]. Writers go through [`update_storage`], which stores
//! the new value and broadcasts the change so every bridge watching the same
//! key in the same context updates as well.
//!
//! ```
//! use tabsync_runtime::{StorageArea, StoredValue, update_storage, use_reactive_storage};
//!
//! let local = StorageArea::memory_local();
//! let theme = use_reactive_storage(&local, "theme")?;
//! let _mounted = theme.mount();
//!
//! update_storage(&local, "theme", "\"dark\"")?;
//! assert_eq!(theme.value().as_str(), Some("dark"));
//! # Ok::<(), tabsync_runtime::StorageError>(())
//! ```

pub mod bridge;
pub mod reactive;
pub mod storage;

pub use bridge::{
    ChangeSubscription, MountGuard, ReactiveStorage, poll_storage_changes, remove_storage,
    update_storage, update_storage_json, use_reactive_storage,
};
pub use reactive::{Observable, ReadSignal, Subscription};
#[cfg(feature = "state-persistence")]
pub use storage::FileStorage;
pub use storage::{
    ChannelConfig, ChannelStats, EventChannel, ListenerId, MAX_NESTING_DEPTH, MemoryStorage,
    StorageArea, StorageBackend, StorageError, StorageEvent, StorageScope, StoredValue,
};
