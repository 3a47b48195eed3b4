#![forbid(unsafe_code)]

//! Storage areas, stored-value decoding, and change notifications.

pub mod backend;
pub mod error;
pub mod event;
#[cfg(feature = "state-persistence")]
pub mod file;
pub mod value;

pub use backend::{MemoryStorage, StorageArea, StorageBackend, StorageScope};
pub use error::StorageError;
pub use event::{ChannelConfig, ChannelStats, EventChannel, ListenerId, StorageEvent};
#[cfg(feature = "state-persistence")]
pub use file::FileStorage;
pub use value::{MAX_NESTING_DEPTH, StoredValue};
