#![forbid(unsafe_code)]

//! Key/value storage backends and the area handles bridges bind to.
//!
//! A backend is an opaque string-to-string store. Bridges never look inside
//! it; they only need `get_item`/`set_item` and a stable identity so change
//! notifications can be matched against the area they came from.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::StorageError;

/// A string key/value store.
///
/// Methods take `&self`: host storage objects are shared handles with
/// interior mutability, and the same backend is reachable from many bridges.
pub trait StorageBackend {
    /// Current value of `key`, or `None` when absent.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Removing an absent key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// All keys currently stored.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Lifetime scope of a storage area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageScope {
    /// Lives as long as one execution context (a browser tab).
    Session,
    /// Persists and is shared across execution contexts.
    Local,
}

impl StorageScope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Local => "local",
        }
    }
}

/// Shared handle to a storage backend.
///
/// Two handles are the *same area* only if they were cloned from one
/// another; two separately constructed areas over equal contents are
/// distinct. Change notifications are filtered on this identity.
#[derive(Clone)]
pub struct StorageArea {
    backend: Rc<dyn StorageBackend>,
    scope: StorageScope,
}

impl StorageArea {
    /// Wrap a backend.
    pub fn new(backend: impl StorageBackend + 'static, scope: StorageScope) -> Self {
        Self::from_rc(Rc::new(backend), scope)
    }

    /// Wrap an already shared backend. Areas built from clones of the same
    /// `Rc` are the same area.
    #[must_use]
    pub fn from_rc(backend: Rc<dyn StorageBackend>, scope: StorageScope) -> Self {
        Self { backend, scope }
    }

    /// Fresh in-memory session area.
    #[must_use]
    pub fn memory_session() -> Self {
        Self::new(MemoryStorage::new(), StorageScope::Session)
    }

    /// Fresh in-memory local area.
    #[must_use]
    pub fn memory_local() -> Self {
        Self::new(MemoryStorage::new(), StorageScope::Local)
    }

    #[must_use]
    pub fn scope(&self) -> StorageScope {
        self.scope
    }

    /// Reference identity of the underlying backend.
    #[must_use]
    pub fn same_area(&self, other: &StorageArea) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.backend), Rc::as_ptr(&other.backend))
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.backend.get_item(key)
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.backend.set_item(key, value)
    }

    pub fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.backend.remove_item(key)
    }

    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.backend.keys()
    }
}

impl PartialEq for StorageArea {
    fn eq(&self, other: &Self) -> bool {
        self.same_area(other)
    }
}

impl Eq for StorageArea {}

impl std::fmt::Debug for StorageArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageArea")
            .field("scope", &self.scope)
            .field("backend", &Rc::as_ptr(&self.backend).cast::<()>())
            .finish()
    }
}

/// In-memory backend with deterministic key order.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<BTreeMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with `entries`.
    #[must_use]
    pub fn with_items<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let items = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            items: RefCell::new(items),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items
            .borrow_mut()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.borrow_mut().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.items.borrow().keys().cloned().collect())
    }
}
