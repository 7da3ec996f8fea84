use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, OnceLock},
};

use prefkit_core::{
    store::{DefaultsStore, InMemoryDefaultsStore},
    value::RawValue,
};
use prefkit_storage::archiver::SecureArchiver;
use tracing::{instrument, warn};

/// Name of the process-wide suite returned by [`Suite::standard`].
pub const STANDARD_SUITE: &str = "standard";

/// Handle to one store namespace and the archiver used for its secure values.
///
/// Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct Suite {
    name: Arc<str>,
    store: Arc<dyn DefaultsStore>,
    archiver: Arc<SecureArchiver>,
}

impl Suite {
    /// Suite over `store` with an unsealed archiver.
    pub fn new(name: impl Into<String>, store: impl DefaultsStore + 'static) -> Self {
        Self::from_shared(name, Arc::new(store))
    }

    pub fn from_shared(name: impl Into<String>, store: Arc<dyn DefaultsStore>) -> Self {
        Self {
            name: Arc::from(name.into()),
            store,
            archiver: Arc::new(SecureArchiver::unsealed()),
        }
    }

    pub fn with_archiver(mut self, archiver: SecureArchiver) -> Self {
        self.archiver = Arc::new(archiver);
        self
    }

    /// The process-wide in-memory suite used by keys built without an explicit suite.
    pub fn standard() -> Suite {
        static STANDARD: OnceLock<Suite> = OnceLock::new();
        STANDARD
            .get_or_init(|| Suite::new(STANDARD_SUITE, InMemoryDefaultsStore::new()))
            .clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &dyn DefaultsStore {
        self.store.as_ref()
    }

    pub fn archiver(&self) -> &SecureArchiver {
        &self.archiver
    }

    /// Names of persisted entries, sorted. Registered defaults are not included.
    pub fn keys(&self) -> Vec<String> {
        match self.store.all_keys() {
            Ok(keys) => keys.into_iter().collect(),
            Err(err) => {
                warn!(suite = %self.name, "listing keys failed: {err}");
                Vec::new()
            }
        }
    }

    /// Remove every persisted entry. Registered defaults are kept.
    ///
    /// Returns how many entries were removed.
    #[instrument(skip_all, fields(suite = %self.name))]
    pub fn clear(&self) -> usize {
        let mut removed = 0;
        for name in self.keys() {
            match self.store.remove(&name) {
                Ok(()) => removed += 1,
                Err(err) => warn!(key = %name, "remove failed: {err}"),
            }
        }
        removed
    }

    pub(crate) fn register_default(&self, name: &str, raw: RawValue) {
        if let Err(err) = self
            .store
            .register_defaults(BTreeMap::from([(name.to_string(), raw)]))
        {
            warn!(suite = %self.name, key = %name, "default not registered: {err}");
        }
    }

    pub(crate) fn read_raw(&self, name: &str) -> Option<RawValue> {
        self.store.get(name).unwrap_or_else(|err| {
            warn!(suite = %self.name, key = %name, "read failed: {err}");
            None
        })
    }

    pub(crate) fn write_raw(&self, name: &str, raw: RawValue) {
        if let Err(err) = self.store.set(name, raw) {
            warn!(suite = %self.name, key = %name, "write dropped: {err}");
        }
    }

    pub(crate) fn remove_raw(&self, name: &str) {
        if let Err(err) = self.store.remove(name) {
            warn!(suite = %self.name, key = %name, "remove failed: {err}");
        }
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        match self.store.all_keys() {
            Ok(keys) => keys.contains(name),
            Err(err) => {
                warn!(suite = %self.name, key = %name, "listing keys failed: {err}");
                false
            }
        }
    }
}

impl fmt::Debug for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suite")
            .field("name", &self.name)
            .field("sealing", &self.archiver.is_sealing())
            .finish_non_exhaustive()
    }
}

/// Remove every persisted entry of `suite`; see [`Suite::clear`].
pub fn clear(suite: &Suite) {
    suite.clear();
}
