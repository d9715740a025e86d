//! # Preferences
//!
//! Owner-namespaced access to an injected key/value preference store.
//!
//! The fabric never decides how preferences are persisted; the host hands
//! in a [`PreferenceStore`]. Keys written through [`OwnerDefaults`] are
//! stored as `"{owner}.{key}"` so extensions sharing one store cannot
//! collide.

use crate::error::EventError;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::warn;

/// Key/value preference storage supplied by the host.
pub trait PreferenceStore: Send + Sync + Debug {
    /// Registers fallback values. Never overrides values already set.
    fn register_defaults(&self, defaults: Vec<(String, Value)>);

    /// Value set for `key`, else its registered default.
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value);

    /// Drops an explicitly set value, exposing the default again.
    fn remove(&self, key: &str) -> bool;
}

/// A preference store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct InMemoryPreferenceStore {
    defaults: DashMap<String, Value>,
    values: DashMap<String, Value>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for InMemoryPreferenceStore {
    fn register_defaults(&self, defaults: Vec<(String, Value)>) {
        for (key, value) in defaults {
            self.defaults.insert(key, value);
        }
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.values
            .get(key)
            .or_else(|| self.defaults.get(key))
            .map(|value| value.value().clone())
    }

    fn set(&self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }
}

/// Preferences of one owner (usually an extension identifier).
#[derive(Debug, Clone)]
pub struct OwnerDefaults {
    owner: String,
    store: Arc<dyn PreferenceStore>,
}

impl OwnerDefaults {
    pub fn new(owner: impl Into<String>, store: Arc<dyn PreferenceStore>) -> Self {
        Self {
            owner: owner.into(),
            store,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The store key for `key`. Keys already carrying the owner prefix are
    /// returned unchanged.
    pub fn key(&self, key: &str) -> String {
        match key.strip_prefix(self.owner.as_str()) {
            Some(rest) if rest.starts_with('.') => key.to_string(),
            _ => format!("{}.{}", self.owner, key),
        }
    }

    /// Registers defaults given as unprefixed key/value pairs.
    pub fn register_defaults<K, I>(&self, defaults: I)
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let defaults = defaults
            .into_iter()
            .map(|(key, value)| (self.key(key.as_ref()), value))
            .collect();
        self.store.register_defaults(defaults);
    }

    /// Registers every field of a serializable struct as a default.
    pub fn register_defaults_from<T: Serialize>(&self, defaults: &T) -> Result<(), EventError> {
        match serde_json::to_value(defaults)? {
            Value::Object(fields) => {
                self.register_defaults(fields);
                Ok(())
            }
            other => Err(EventError::HandlerExecution(format!(
                "defaults must serialize to an object, got {}",
                other
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.store.get(&self.key(key))
    }

    /// Reads and converts a preference. `Ok(None)` when unset.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, EventError> {
        self.get(key)
            .map(serde_json::from_value)
            .transpose()
            .map_err(EventError::from)
    }

    /// Reads a preference, falling back when unset or unreadable.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        match self.get_as(key) {
            Ok(Some(value)) => value,
            Ok(None) => fallback,
            Err(e) => {
                warn!("⚠️ Preference '{}' unreadable: {}", self.key(key), e);
                fallback
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), EventError> {
        self.store.set(&self.key(key), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn remove(&self, key: &str) -> bool {
        self.store.remove(&self.key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn defaults(owner: &str) -> (Arc<InMemoryPreferenceStore>, OwnerDefaults) {
        let store = Arc::new(InMemoryPreferenceStore::new());
        let defaults = OwnerDefaults::new(owner, store.clone());
        (store, defaults)
    }

    #[test]
    fn test_keys_are_namespaced_once() {
        let (_store, defaults) = defaults("com.example.logger");
        assert_eq!(defaults.key("interval"), "com.example.logger.interval");
        assert_eq!(
            defaults.key("com.example.logger.interval"),
            "com.example.logger.interval"
        );
        assert_eq!(
            defaults.key("com.example.loggerish"),
            "com.example.logger.com.example.loggerish"
        );
    }

    #[test]
    fn test_registered_defaults_do_not_override_set_values() {
        let (store, defaults) = defaults("ext");
        defaults.set("threshold", &5.0).unwrap();
        defaults.register_defaults([("threshold", json!(2.0)), ("enabled", json!(true))]);

        assert_eq!(defaults.get_or("threshold", 0.0), 5.0);
        assert!(defaults.get_or("enabled", false));
        assert_eq!(store.get("ext.enabled"), Some(json!(true)));

        assert!(defaults.remove("threshold"));
        assert_eq!(defaults.get_or("threshold", 0.0), 2.0);
    }

    #[test]
    fn test_typed_access() {
        #[derive(Serialize, Deserialize)]
        struct LoggerDefaults {
            threshold: f64,
            label: String,
        }

        let (_store, defaults) = defaults("ext");
        defaults
            .register_defaults_from(&LoggerDefaults {
                threshold: 3.0,
                label: "idle".to_string(),
            })
            .unwrap();

        assert_eq!(defaults.get_as::<String>("label").unwrap().as_deref(), Some("idle"));
        assert!(defaults.get_as::<u32>("label").is_err());
        assert_eq!(defaults.get_or::<u32>("label", 9), 9);
        assert_eq!(defaults.get_as::<f64>("missing").unwrap(), None);
        assert!(defaults.register_defaults_from(&5u32).is_err());
    }
}
