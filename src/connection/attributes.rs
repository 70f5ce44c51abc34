//! Keyed per-connection attribute store.
//!
//! Handlers and hooks use the store to keep session data (a user id, a
//! login flag, a shared game-room handle) next to the connection. The store
//! has its own lock and stays readable after the connection closes.

use std::{
    any::Any,
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use bytes::Bytes;

use crate::error::AttributeError;

/// Type-erased shared value stored in an attribute.
///
/// Clones share the same allocation.
///
/// # Examples
///
/// ```
/// use linkframe::SharedValue;
///
/// let value = SharedValue::new(vec![1_u8, 2, 3]);
/// assert_eq!(value.downcast::<Vec<u8>>().as_deref(), Some(&vec![1, 2, 3]));
/// assert!(value.downcast::<String>().is_none());
/// ```
#[derive(Clone)]
pub struct SharedValue(Arc<dyn Any + Send + Sync>);

impl SharedValue {
    /// Wrap `value` for storage.
    pub fn new<T>(value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self(Arc::new(value))
    }

    /// Retrieve the value as `T`, if that is its concrete type.
    #[must_use]
    pub fn downcast<T>(&self) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        Arc::clone(&self.0).downcast::<T>().ok()
    }
}

impl fmt::Debug for SharedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("SharedValue(..)") }
}

/// A value stored in a connection attribute.
#[derive(Clone, Debug)]
pub enum AttributeValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating-point number.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Bytes(Bytes),
    /// Any other shared value.
    Shared(SharedValue),
}

impl AttributeValue {
    /// Name of the variant, used in type-mismatch errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Shared(_) => "shared",
        }
    }

    /// The boolean value, if this is [`AttributeValue::Bool`].
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The signed integer value, if this is [`AttributeValue::Int`].
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The unsigned integer value, if this is [`AttributeValue::UInt`].
    #[must_use]
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            _ => None,
        }
    }

    /// The float value, if this is [`AttributeValue::Float`].
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The text, if this is [`AttributeValue::Text`].
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// The bytes, if this is [`AttributeValue::Bytes`].
    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// The shared value, if this is [`AttributeValue::Shared`].
    #[must_use]
    pub fn as_shared(&self) -> Option<&SharedValue> {
        match self {
            Self::Shared(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self { Self::Bool(value) }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self { Self::Int(value) }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self { Self::Int(i64::from(value)) }
}

impl From<u64> for AttributeValue {
    fn from(value: u64) -> Self { Self::UInt(value) }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self { Self::UInt(u64::from(value)) }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self { Self::Float(value) }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self { Self::Text(value) }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self { Self::Text(value.to_owned()) }
}

impl From<Bytes> for AttributeValue {
    fn from(value: Bytes) -> Self { Self::Bytes(value) }
}

impl From<SharedValue> for AttributeValue {
    fn from(value: SharedValue) -> Self { Self::Shared(value) }
}

/// String-keyed attribute map guarded by a read/write lock.
///
/// Last write wins. The lock is never held across an `.await`.
#[derive(Debug, Default)]
pub struct AttributeStore {
    values: RwLock<HashMap<String, AttributeValue>>,
}

impl AttributeStore {
    /// Store `value` under `key`, returning the value it replaced.
    pub fn set(
        &self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Option<AttributeValue> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into())
    }

    /// Fetch a clone of the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`AttributeError::NotFound`] if nothing is stored under `key`.
    pub fn get(&self, key: &str) -> Result<AttributeValue, AttributeError> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| AttributeError::NotFound {
                key: key.to_owned(),
            })
    }

    /// Fetch a shared value stored under `key` as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`AttributeError::NotFound`] if nothing is stored under `key`
    /// and [`AttributeError::TypeMismatch`] if the value is not a
    /// [`SharedValue`] holding a `T`.
    pub fn get_as<T>(&self, key: &str) -> Result<Arc<T>, AttributeError>
    where
        T: Send + Sync + 'static,
    {
        self.get(key)?
            .as_shared()
            .and_then(SharedValue::downcast::<T>)
            .ok_or_else(|| AttributeError::TypeMismatch {
                key: key.to_owned(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Remove and return the value stored under `key`.
    pub fn remove(&self, key: &str) -> Option<AttributeValue> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    /// Whether a value is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Number of stored attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rstest::rstest;

    use super::*;

    #[test]
    fn last_write_wins() {
        let store = AttributeStore::default();
        assert!(store.set("user", 1_u64).is_none());
        let previous = store.set("user", 2_u64).expect("previous value");
        assert_eq!(previous.as_uint(), Some(1));
        assert_eq!(store.get("user").expect("stored").as_uint(), Some(2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn missing_key_is_not_found() {
        let store = AttributeStore::default();
        assert_eq!(
            store.get("nope").expect_err("empty store"),
            AttributeError::NotFound { key: "nope".into() }
        );
    }

    #[rstest]
    #[case(AttributeValue::from(true), "bool")]
    #[case(AttributeValue::from(-3_i32), "int")]
    #[case(AttributeValue::from(3_u32), "uint")]
    #[case(AttributeValue::from(0.5), "float")]
    #[case(AttributeValue::from("hi"), "text")]
    #[case(AttributeValue::from(Bytes::from_static(b"\x01")), "bytes")]
    #[case(AttributeValue::from(SharedValue::new(())), "shared")]
    fn conversions_pick_the_matching_variant(
        #[case] value: AttributeValue,
        #[case] kind: &str,
    ) {
        assert_eq!(value.kind(), kind);
    }

    #[test]
    fn typed_access_to_shared_values() {
        let store = AttributeStore::default();
        let hits = Arc::new(AtomicUsize::new(0));
        store.set("hits", SharedValue::new(Arc::clone(&hits)));
        store.set("name", "sam");

        let stored = store.get_as::<Arc<AtomicUsize>>("hits").expect("shared counter");
        stored.fetch_add(1, Ordering::SeqCst);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let err = store.get_as::<u8>("name").expect_err("text is not shared");
        assert!(matches!(err, AttributeError::TypeMismatch { ref key, .. } if key == "name"));
    }

    #[test]
    fn remove_returns_the_value() {
        let store = AttributeStore::default();
        store.set("flag", true);
        assert!(store.contains("flag"));
        assert_eq!(store.remove("flag").and_then(|v| v.as_bool()), Some(true));
        assert!(!store.contains("flag"));
        assert!(store.is_empty());
    }
}
