#![forbid(unsafe_code)]

//! `localStorage` / `sessionStorage` as storage backends.
//!
//! The areas are cached per thread: every call to [`local_storage`] returns
//! a clone of the same [`StorageArea`], so bridges created at different times
//! still match the same change events.

use std::cell::RefCell;
use std::thread::LocalKey;

use tabsync_runtime::{StorageArea, StorageBackend, StorageError, StorageScope};
use wasm_bindgen::{JsCast, JsValue};

/// Backend over a browser `Storage` object.
#[derive(Debug, Clone)]
pub struct WebStorage {
    storage: web_sys::Storage,
}

impl WebStorage {
    #[must_use]
    pub fn new(storage: web_sys::Storage) -> Self {
        Self { storage }
    }

    /// The wrapped `Storage` object.
    #[must_use]
    pub fn raw(&self) -> &web_sys::Storage {
        &self.storage
    }
}

impl StorageBackend for WebStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage.get_item(key).map_err(js_error)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage.set_item(key, value).map_err(js_error)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.storage.remove_item(key).map_err(js_error)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let len = self.storage.length().map_err(js_error)?;
        let mut keys = Vec::with_capacity(len as usize);
        for index in 0..len {
            if let Some(key) = self.storage.key(index).map_err(js_error)? {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

struct CachedArea {
    raw: web_sys::Storage,
    area: StorageArea,
}

thread_local! {
    static LOCAL: RefCell<Option<CachedArea>> = const { RefCell::new(None) };
    static SESSION: RefCell<Option<CachedArea>> = const { RefCell::new(None) };
}

/// The window's `localStorage`.
pub fn local_storage() -> Result<StorageArea, StorageError> {
    cached_area(&LOCAL, StorageScope::Local)
}

/// The window's `sessionStorage`.
pub fn session_storage() -> Result<StorageArea, StorageError> {
    cached_area(&SESSION, StorageScope::Session)
}

/// The cached area wrapping `raw`, if it was opened in this context.
pub(crate) fn area_for(raw: &web_sys::Storage) -> Option<StorageArea> {
    [&LOCAL, &SESSION].into_iter().find_map(|slot| {
        slot.with(|cell| {
            cell.borrow()
                .as_ref()
                .filter(|cached| cached.raw == *raw)
                .map(|cached| cached.area.clone())
        })
    })
}

fn cached_area(
    slot: &'static LocalKey<RefCell<Option<CachedArea>>>,
    scope: StorageScope,
) -> Result<StorageArea, StorageError> {
    slot.with(|cell| {
        if let Some(cached) = cell.borrow().as_ref() {
            return Ok(cached.area.clone());
        }
        let raw = open(scope)?;
        let area = StorageArea::new(WebStorage::new(raw.clone()), scope);
        tracing::debug!(scope = scope.as_str(), "opened web storage");
        *cell.borrow_mut() = Some(CachedArea {
            raw,
            area: area.clone(),
        });
        Ok(area)
    })
}

fn open(scope: StorageScope) -> Result<web_sys::Storage, StorageError> {
    let window = web_sys::window()
        .ok_or_else(|| StorageError::Unavailable("no window in this context".to_string()))?;
    let storage = match scope {
        StorageScope::Local => window.local_storage(),
        StorageScope::Session => window.session_storage(),
    }
    .map_err(js_error)?;
    storage.ok_or_else(|| StorageError::Unavailable(format!("{} storage is disabled", scope.as_str())))
}

/// Convert a thrown JS value into a backend error.
pub(crate) fn js_error(value: JsValue) -> StorageError {
    let message = value
        .dyn_ref::<js_sys::Error>()
        .map(|err| String::from(err.message()))
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{value:?}"));
    StorageError::Backend(message)
}
