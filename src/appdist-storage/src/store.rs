//! The key/value storage seam.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};

/// A single persisted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Integer(i64),
    String(String),
}

impl StoredValue {
    fn kind(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::String(_) => "string",
        }
    }
}

/// Durable string-keyed store scoped to one service.
///
/// Implementations must make every successful write visible to a new
/// instance opened on the same backing location, so state survives a
/// process restart. Methods are synchronous: callers invoke them while
/// holding their own locks and never across an await point.
pub trait KeyValueStore: Send + Sync {
    /// Read a raw value.
    fn get(&self, key: &str) -> Result<Option<StoredValue>>;

    /// Write a raw value, replacing any previous one.
    fn put(&self, key: &str, value: StoredValue) -> Result<()>;

    /// Remove an entry. Removing a missing entry is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Remove every entry.
    fn clear(&self) -> Result<()>;

    /// Read a string entry.
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.get(key)? {
            None => Ok(None),
            Some(StoredValue::String(value)) => Ok(Some(value)),
            Some(other) => Err(mismatch(key, "string", &other)),
        }
    }

    /// Write a string entry.
    fn put_string(&self, key: &str, value: &str) -> Result<()> {
        self.put(key, StoredValue::String(value.to_string()))
    }

    /// Read an integer entry.
    fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        match self.get(key)? {
            None => Ok(None),
            Some(StoredValue::Integer(value)) => Ok(Some(value)),
            Some(other) => Err(mismatch(key, "integer", &other)),
        }
    }

    /// Write an integer entry.
    fn put_i64(&self, key: &str, value: i64) -> Result<()> {
        self.put(key, StoredValue::Integer(value))
    }
}

fn mismatch(key: &str, expected: &'static str, found: &StoredValue) -> StorageError {
    StorageError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}
