use bytes::Bytes;
use serde::Serialize;
use shared::{Error, Result};
use std::fmt;

/// Stable name of a logical operation. Namespaces its counter and history lists.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct OperationIdentity(String);

impl OperationIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Key of the call counter.
    pub fn counter_key(&self) -> &str {
        &self.0
    }

    pub fn inputs_key(&self) -> String {
        format!("{}:inputs", self.0)
    }

    pub fn outputs_key(&self) -> String {
        format!("{}:outputs", self.0)
    }
}

impl fmt::Display for OperationIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationIdentity {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Key holding the cached content of `url`.
pub fn cached_key(url: &str) -> String {
    format!("cached:{url}")
}

/// Key holding the number of times `url` was fetched.
pub fn count_key(url: &str) -> String {
    format!("count:{url}")
}

/// One logged call, already decoded for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CallRecord {
    pub input: String,
    pub output: String,
}

impl CallRecord {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Integer,
    Float,
    Bytes,
}

/// A value written through [`crate::Cache::store`].
#[derive(Clone, PartialEq)]
pub enum StoredValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bytes(Bytes),
}

impl StoredValue {
    /// Wire form of the value as written to the store.
    ///
    /// Text is UTF-8, integers are decimal, floats use Rust's shortest
    /// round-trip `Debug` form: `1.0`, `2.5`, and exponent notation for very
    /// large or small magnitudes (`1e20`, `1e-7`).
    pub fn encode(&self) -> Bytes {
        match self {
            StoredValue::Text(text) => Bytes::copy_from_slice(text.as_bytes()),
            StoredValue::Integer(value) => Bytes::from(value.to_string()),
            StoredValue::Float(value) => Bytes::from(format!("{value:?}")),
            StoredValue::Bytes(raw) => raw.clone(),
        }
    }

    /// Reads `raw` back as `kind`. `key` only appears in errors.
    pub fn decode(kind: ValueKind, key: &str, raw: Bytes) -> Result<Self> {
        match kind {
            ValueKind::Bytes => Ok(StoredValue::Bytes(raw)),
            ValueKind::Text => decode_text(key, &raw).map(StoredValue::Text),
            ValueKind::Integer => decode_text(key, &raw)?
                .trim()
                .parse::<i64>()
                .map(StoredValue::Integer)
                .map_err(|_| Error::NotAnInteger(key.to_string())),
            ValueKind::Float => decode_text(key, &raw)?
                .trim()
                .parse::<f64>()
                .map(StoredValue::Float)
                .map_err(|_| Error::Internal(format!("value at '{key}' is not a float"))),
        }
    }
}

// Rendered the way the value appears in a call history line
impl fmt::Debug for StoredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoredValue::Text(text) => write!(f, "{text:?}"),
            StoredValue::Integer(value) => write!(f, "{value}"),
            StoredValue::Float(value) => write!(f, "{value:?}"),
            StoredValue::Bytes(raw) => write!(f, "{raw:?}"),
        }
    }
}

impl From<&str> for StoredValue {
    fn from(text: &str) -> Self {
        StoredValue::Text(text.to_string())
    }
}

impl From<String> for StoredValue {
    fn from(text: String) -> Self {
        StoredValue::Text(text)
    }
}

impl From<i64> for StoredValue {
    fn from(value: i64) -> Self {
        StoredValue::Integer(value)
    }
}

impl From<f64> for StoredValue {
    fn from(value: f64) -> Self {
        StoredValue::Float(value)
    }
}

impl From<Bytes> for StoredValue {
    fn from(raw: Bytes) -> Self {
        StoredValue::Bytes(raw)
    }
}

impl From<Vec<u8>> for StoredValue {
    fn from(raw: Vec<u8>) -> Self {
        StoredValue::Bytes(Bytes::from(raw))
    }
}

fn decode_text(key: &str, raw: &[u8]) -> Result<String> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|_| Error::InvalidUtf8(key.to_string()))
}

/// Lenient integer read: absent, non-UTF-8 or non-numeric values are 0.
pub fn int_or_zero(raw: Option<&[u8]>) -> i64 {
    raw.and_then(|bytes| std::str::from_utf8(bytes).ok())
        .and_then(|text| text.trim().parse::<i64>().ok())
        .unwrap_or(0)
}
