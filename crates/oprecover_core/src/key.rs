//! Entry keys.

use crate::error::CoreError;
use oprecover_codec::Value;
use std::fmt;

/// Logical identity of an entry within a region.
///
/// Equality and hashing are structural over the wrapped [`Value`]: two keys
/// are the same key exactly when their values are equal element by element.
/// Last-writer-wins resolution depends on nothing else. Null is not a valid
/// key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryKey(Value);

impl EntryKey {
    /// Returns the underlying value.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the key, returning the underlying value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl TryFrom<Value> for EntryKey {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        if value.is_null() {
            return Err(CoreError::corruption("entry key is null"));
        }
        Ok(Self(value))
    }
}

impl From<&str> for EntryKey {
    fn from(s: &str) -> Self {
        Self(Value::from(s))
    }
}

impl From<String> for EntryKey {
    fn from(s: String) -> Self {
        Self(Value::from(s))
    }
}

impl From<i64> for EntryKey {
    fn from(n: i64) -> Self {
        Self(Value::Integer(n))
    }
}

impl From<Vec<u8>> for EntryKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Value::Bytes(bytes))
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn null_key_rejected() {
        assert!(EntryKey::try_from(Value::Null).is_err());
    }

    #[test]
    fn equality_is_structural() {
        let a = EntryKey::try_from(Value::Array(vec![Value::from("t"), Value::from(1i64)])).unwrap();
        let b = EntryKey::try_from(Value::Array(vec![Value::from("t"), Value::from(1i64)])).unwrap();
        let mut map = HashMap::new();
        map.insert(a, 1);
        map.insert(b, 2);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn text_and_bytes_are_distinct() {
        assert_ne!(EntryKey::from("a"), EntryKey::from(b"a".to_vec()));
        assert_ne!(EntryKey::from(1i64), EntryKey::from("1"));
    }
}
