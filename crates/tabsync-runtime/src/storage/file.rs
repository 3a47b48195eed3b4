#![forbid(unsafe_code)]

//! File-backed persistent storage.
//!
//! The store is a single JSON object mapping keys to string values. Every
//! write rewrites the whole file through a sibling temp file followed by a
//! rename, so a crash mid-write leaves the previous contents intact.
//!
//! Not safe for concurrent writers in different processes: the last rename
//! wins.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{StorageBackend, StorageError};

/// Persistent backend stored as a JSON object on disk.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: RefCell<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let items = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)
                .map_err(|err| StorageError::Corrupt(format!("{}: {err}", path.display())))?,
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        tracing::debug!(path = %path.display(), keys = items.len(), "opened file storage");
        Ok(Self {
            path,
            items: RefCell::new(items),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(items)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), keys = items.len(), "persisted file storage");
        Ok(())
    }

    fn mutate(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> bool,
    ) -> Result<(), StorageError> {
        let mut next = self.items.borrow().clone();
        if !f(&mut next) {
            return Ok(());
        }
        self.persist(&next)?;
        *self.items.borrow_mut() = next;
        Ok(())
    }
}

impl StorageBackend for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.mutate(|items| {
            if items.get(key).is_some_and(|current| current == value) {
                return false;
            }
            items.insert(key.to_owned(), value.to_owned());
            true
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.mutate(|items| items.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.items.borrow().keys().cloned().collect())
    }
}
