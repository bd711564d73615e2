//! Key-value configuration store contract.
//!
//! Settings are addressed by a namespace (the owning component) and a key.
//! Values are plain JSON so that lists, maps and scalars share one store.
//! Each `get`/`set` is atomic on its own; nothing here offers transactions
//! across keys.
//!
//! [`MemoryStore`] is an in-process implementation suitable for embedding
//! and tests.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

/// Namespaced key-value settings storage.
pub trait ConfigStore: Send + Sync + 'static {
    /// Reads a value, `None` when the key was never set.
    fn get(&self, namespace: &str, key: &str) -> Option<Value>;

    /// Writes a value, replacing any previous one.
    fn set(&self, namespace: &str, key: &str, value: Value);
}

/// Typed helpers over any [`ConfigStore`].
pub trait ConfigStoreExt: ConfigStore {
    /// Reads and decodes a value, falling back to `default`.
    ///
    /// A value that does not decode as `T` is treated as missing.
    fn get_or<T: DeserializeOwned>(&self, namespace: &str, key: &str, default: T) -> T {
        match self.get(namespace, key) {
            None | Some(Value::Null) => default,
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!(namespace, key, error = %e, "Ignoring undecodable setting");
                default
            }),
        }
    }
}

impl<S: ConfigStore + ?Sized> ConfigStoreExt for S {}

/// An in-memory [`ConfigStore`].
///
/// # Example
///
/// ```rust
/// use courier_core::{ConfigStore, ConfigStoreExt, MemoryStore};
/// use serde_json::json;
///
/// let store = MemoryStore::new();
/// store.set("courier.main", "grep", json!(true));
/// assert!(store.get_or("courier.main", "grep", false));
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, Map<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from `{ namespace: { key: value } }`.
    ///
    /// Top-level entries that are not objects are skipped.
    pub fn from_value(seed: Value) -> Self {
        let store = Self::new();
        if let Value::Object(namespaces) = seed {
            let mut data = store.data.write();
            for (namespace, keys) in namespaces {
                match keys {
                    Value::Object(keys) => {
                        data.insert(namespace, keys);
                    }
                    _ => warn!(namespace = %namespace, "Skipping non-object store seed"),
                }
            }
        }
        store
    }

    /// Copies the whole store out as `{ namespace: { key: value } }`.
    pub fn snapshot(&self) -> Value {
        let data = self.data.read();
        Value::Object(
            data.iter()
                .map(|(ns, keys)| (ns.clone(), Value::Object(keys.clone())))
                .collect(),
        )
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        self.data
            .read()
            .get(namespace)
            .and_then(|keys| keys.get(key))
            .cloned()
    }

    fn set(&self, namespace: &str, key: &str, value: Value) {
        self.data
            .write()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_missing_key() {
        let store = MemoryStore::new();
        assert_eq!(store.get("ns", "missing"), None);
        assert_eq!(store.get_or("ns", "missing", 5_i64), 5);
    }

    #[test]
    fn test_set_then_get() {
        let store = MemoryStore::new();
        store.set("ns", "list", json!([1, 2, 3]));
        assert_eq!(store.get_or::<Vec<i64>>("ns", "list", vec![]), vec![1, 2, 3]);
    }

    #[test]
    fn test_wrong_type_falls_back() {
        let store = MemoryStore::new();
        store.set("ns", "flag", json!("yes"));
        assert!(!store.get_or("ns", "flag", false));
    }

    #[test]
    fn test_seed_and_snapshot() {
        let store = MemoryStore::from_value(json!({
            "courier.main": { "grep": true },
            "broken": 3,
        }));
        assert_eq!(store.get("courier.main", "grep"), Some(json!(true)));
        assert_eq!(store.snapshot(), json!({ "courier.main": { "grep": true } }));
    }
}
