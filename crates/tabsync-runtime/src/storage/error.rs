#![forbid(unsafe_code)]

//! Storage errors.

/// Errors raised by storage backends and bridge operations.
///
/// Decoding stored values never produces an error; malformed content falls
/// back to [`StoredValue::Raw`](crate::storage::StoredValue::Raw).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The key name was empty.
    InvalidKey,
    /// The backend is not reachable in this context (e.g. storage disabled).
    Unavailable(String),
    /// The backend rejected the operation.
    Backend(String),
    /// Filesystem failure in a file-backed store.
    Io(String),
    /// Persisted content could not be read back.
    Corrupt(String),
    /// A value could not be serialized before writing.
    Serialize(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidKey => write!(f, "storage key must not be empty"),
            Self::Unavailable(msg) => write!(f, "storage unavailable: {msg}"),
            Self::Backend(msg) => write!(f, "storage backend error: {msg}"),
            Self::Io(msg) => write!(f, "storage I/O error: {msg}"),
            Self::Corrupt(msg) => write!(f, "corrupt storage file: {msg}"),
            Self::Serialize(msg) => write!(f, "failed to serialize value: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            StorageError::InvalidKey.to_string(),
            "storage key must not be empty"
        );
        assert_eq!(
            StorageError::Backend("QuotaExceededError".into()).to_string(),
            "storage backend error: QuotaExceededError"
        );
    }

    #[test]
    fn io_error_converts() {
        let err: StorageError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, StorageError::Io(msg) if msg.contains("denied")));
    }
}
