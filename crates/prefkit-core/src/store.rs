use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex, MutexGuard},
};

use thiserror::Error;

use crate::value::RawValue;

/// Errors produced by defaults store implementations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store cannot represent the given value.
    #[error("unsupported value for key {key}: {reason}")]
    Unsupported { key: String, reason: String },
    /// Underlying storage failure.
    #[error("storage failure: {reason}")]
    Storage { reason: String },
}

/// Contract for a named key-value namespace holding primitive values.
///
/// Stores carry two layers: persisted entries, and a default layer populated through
/// [`DefaultsStore::register_defaults`]. Reads consult persisted entries first and fall
/// back to the default layer. The default layer is never persisted and never shows up in
/// [`DefaultsStore::all_keys`].
pub trait DefaultsStore: Send + Sync {
    /// Persisted value for `name`, else its registered default, else `None`.
    fn get(&self, name: &str) -> Result<Option<RawValue>, StoreError>;

    /// Persist a value under `name`, overwriting any existing entry.
    fn set(&self, name: &str, value: RawValue) -> Result<(), StoreError>;

    /// Remove the persisted entry for `name` (idempotent).
    fn remove(&self, name: &str) -> Result<(), StoreError>;

    /// Names of all persisted entries.
    fn all_keys(&self) -> Result<BTreeSet<String>, StoreError>;

    /// Merge `defaults` into the default layer, replacing earlier registrations of the same name.
    fn register_defaults(&self, defaults: BTreeMap<String, RawValue>) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
struct Layers {
    entries: BTreeMap<String, RawValue>,
    defaults: BTreeMap<String, RawValue>,
}

/// In-memory defaults store for tests and process-local suites.
/// Clones share the same underlying maps.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDefaultsStore {
    inner: Arc<Mutex<Layers>>,
}

impl InMemoryDefaultsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Layers>, StoreError> {
        self.inner.lock().map_err(|err| StoreError::Storage {
            reason: format!("lock poisoned: {err}"),
        })
    }
}

impl DefaultsStore for InMemoryDefaultsStore {
    fn get(&self, name: &str) -> Result<Option<RawValue>, StoreError> {
        let layers = self.lock()?;
        Ok(layers
            .entries
            .get(name)
            .or_else(|| layers.defaults.get(name))
            .cloned())
    }

    fn set(&self, name: &str, value: RawValue) -> Result<(), StoreError> {
        self.lock()?.entries.insert(name.to_string(), value);
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        self.lock()?.entries.remove(name);
        Ok(())
    }

    fn all_keys(&self) -> Result<BTreeSet<String>, StoreError> {
        Ok(self.lock()?.entries.keys().cloned().collect())
    }

    fn register_defaults(&self, defaults: BTreeMap<String, RawValue>) -> Result<(), StoreError> {
        self.lock()?.defaults.extend(defaults);
        Ok(())
    }
}
