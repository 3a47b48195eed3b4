#![forbid(unsafe_code)]

//! Lenient decoding of stored strings.
//!
//! Storage holds strings. Most of them are JSON written by
//! [`update_storage_json`](crate::bridge::update_storage_json), but anything
//! can end up there, so decoding never fails:
//!
//! | Stored text              | Decoded                 |
//! |--------------------------|-------------------------|
//! | absent, `""`             | [`StoredValue::Null`]   |
//! | `null`                   | [`StoredValue::Null`]   |
//! | other valid JSON         | [`StoredValue::Json`]   |
//! | anything else            | [`StoredValue::Raw`]    |
//!
//! Nesting is accepted up to [`MAX_NESTING_DEPTH`] arrays/objects deep.
//! Deeper text is kept as [`StoredValue::Raw`] rather than parsed.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Deepest array/object nesting [`StoredValue::decode`] will parse.
pub const MAX_NESTING_DEPTH: usize = 1024;

/// Decoded content of a storage key.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StoredValue {
    /// Key absent, empty, or JSON `null`.
    #[default]
    Null,
    /// Parsed JSON payload (never `Value::Null`).
    Json(Value),
    /// Text that is not valid JSON, kept verbatim.
    Raw(String),
}

impl StoredValue {
    /// Decode a raw stored string.
    #[must_use]
    pub fn decode(raw: Option<&str>) -> Self {
        let text = match raw {
            None | Some("") => return Self::Null,
            Some(text) => text,
        };
        let depth = nesting_depth(text);
        if depth > MAX_NESTING_DEPTH {
            tracing::trace!(depth, "stored value nested too deeply, keeping raw text");
            return Self::Raw(text.to_owned());
        }
        match parse_json(text) {
            Ok(Value::Null) => Self::Null,
            Ok(value) => Self::Json(value),
            Err(err) => {
                tracing::trace!(error = %err, "stored value is not JSON, keeping raw text");
                Self::Raw(text.to_owned())
            }
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The parsed JSON payload, if any.
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The raw text, if decoding fell back.
    #[must_use]
    pub fn as_raw(&self) -> Option<&str> {
        match self {
            Self::Raw(text) => Some(text),
            _ => None,
        }
    }

    /// Text content: a JSON string payload or raw fallback text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Json(Value::String(s)) => Some(s),
            Self::Raw(text) => Some(text),
            _ => None,
        }
    }

    /// Collapse into a single JSON value. Raw text becomes a JSON string.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Json(value) => value.clone(),
            Self::Raw(text) => Value::String(text.clone()),
        }
    }

    /// Typed view of a JSON payload. `None` for null, raw text, or a payload
    /// of a different shape.
    #[must_use]
    pub fn deserialize<T: DeserializeOwned>(&self) -> Option<T> {
        let value = self.as_json()?;
        serde_json::from_value(value.clone()).ok()
    }
}

/// Parse without serde_json's fixed recursion limit; the stack grows on
/// demand instead.
fn parse_json(text: &str) -> Result<Value, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

/// Maximum bracket nesting outside string literals.
fn nesting_depth(text: &str) -> usize {
    let mut depth = 0usize;
    let mut max = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for byte in text.bytes() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'[' | b'{' => {
                depth += 1;
                max = max.max(depth);
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max
}

impl std::fmt::Display for StoredValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Json(value) => write!(f, "{value}"),
            Self::Raw(text) => f.write_str(text),
        }
    }
}

impl From<Value> for StoredValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            other => Self::Json(other),
        }
    }
}
