use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use prefkit_core::{
    store::{DefaultsStore, StoreError},
    value::RawValue,
};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// File-backed defaults store: one JSON document per suite under a root directory.
///
/// Every mutation rewrites the document atomically (temp file + rename). Registered
/// defaults live only in memory.
pub struct FileDefaultsStore {
    path: PathBuf,
    layers: Mutex<Layers>,
}

#[derive(Debug, Default)]
struct Layers {
    entries: BTreeMap<String, RawValue>,
    defaults: BTreeMap<String, RawValue>,
}

#[derive(Debug, Serialize)]
struct DocumentOut<'a> {
    entries: &'a BTreeMap<String, RawValue>,
}

#[derive(Debug, Deserialize)]
struct DocumentIn {
    #[serde(default)]
    entries: BTreeMap<String, RawValue>,
}

impl FileDefaultsStore {
    /// Open (or lazily create) the document for `suite` under `root`.
    pub fn open(root: impl Into<PathBuf>, suite: &str) -> Result<Self, StoreError> {
        let path = root.into().join(file_name_for(suite));
        let entries = read_document(&path)?;
        debug!(path = %path.display(), entries = entries.len(), "opened suite");
        Ok(Self {
            path,
            layers: Mutex::new(Layers {
                entries,
                defaults: BTreeMap::new(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Layers>, StoreError> {
        self.layers.lock().map_err(|err| StoreError::Storage {
            reason: format!("lock poisoned: {err}"),
        })
    }

    /// Apply `change` to a copy of the entries, persist it, then commit it in memory.
    fn update(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, RawValue>),
    ) -> Result<(), StoreError> {
        let mut layers = self.lock()?;
        let mut candidate = layers.entries.clone();
        change(&mut candidate);
        write_document(&self.path, &candidate)?;
        layers.entries = candidate;
        Ok(())
    }
}

impl DefaultsStore for FileDefaultsStore {
    fn get(&self, name: &str) -> Result<Option<RawValue>, StoreError> {
        let layers = self.lock()?;
        Ok(layers
            .entries
            .get(name)
            .or_else(|| layers.defaults.get(name))
            .cloned())
    }

    #[instrument(skip_all, fields(key = %name))]
    fn set(&self, name: &str, value: RawValue) -> Result<(), StoreError> {
        let finite = match value {
            RawValue::Double(v) => v.is_finite(),
            RawValue::Float(v) => v.is_finite(),
            _ => true,
        };
        if !finite {
            return Err(StoreError::Unsupported {
                key: name.to_string(),
                reason: "non-finite numbers cannot be persisted".to_string(),
            });
        }

        self.update(|entries| {
            entries.insert(name.to_string(), value);
        })
    }

    #[instrument(skip_all, fields(key = %name))]
    fn remove(&self, name: &str) -> Result<(), StoreError> {
        if !self.lock()?.entries.contains_key(name) {
            return Ok(());
        }
        self.update(|entries| {
            entries.remove(name);
        })
    }

    fn all_keys(&self) -> Result<BTreeSet<String>, StoreError> {
        Ok(self.lock()?.entries.keys().cloned().collect())
    }

    fn register_defaults(&self, defaults: BTreeMap<String, RawValue>) -> Result<(), StoreError> {
        self.lock()?.defaults.extend(defaults);
        Ok(())
    }
}

fn read_document(path: &Path) -> Result<BTreeMap<String, RawValue>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => return Err(storage_err(err)),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(BTreeMap::new());
    }

    let document: DocumentIn = serde_json::from_slice(&bytes).map_err(|e| StoreError::Storage {
        reason: format!("corrupt suite file {}: {e}", path.display()),
    })?;
    Ok(document.entries)
}

fn write_document(path: &Path, entries: &BTreeMap<String, RawValue>) -> Result<(), StoreError> {
    let parent = path.parent().ok_or_else(|| StoreError::Storage {
        reason: "invalid storage path".to_string(),
    })?;
    fs::create_dir_all(parent).map_err(storage_err)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(storage_err)?;
    let json = serde_json::to_vec_pretty(&DocumentOut { entries }).map_err(storage_err)?;
    tmp.write_all(&json).map_err(storage_err)?;
    tmp.flush().map_err(storage_err)?;
    tmp.persist(path).map_err(|e| storage_err(e.error))?;
    Ok(())
}

fn file_name_for(suite: &str) -> String {
    format!("{}.json", URL_SAFE_NO_PAD.encode(suite))
}

fn storage_err<E: ToString>(err: E) -> StoreError {
    StoreError::Storage {
        reason: err.to_string(),
    }
}
