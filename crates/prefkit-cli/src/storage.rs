use std::path::PathBuf;

use crate::config::Config;
use color_eyre::Result;
use dirs::data_dir;
#[cfg(test)]
use prefkit_storage::key_provider::InMemoryKeyProvider;
use prefkit_storage::{file_store::FileDefaultsStore, key_provider::KeyringProvider};
use prefkit_defaults::{SecureArchiver, Suite};
use tracing::debug;

/// Resolve the default data directory for prefkit.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("prefkit"))
}

/// Open the file-backed suite `name`, honoring config overrides.
pub fn suite_from_config(config: &Config, name: &str) -> Result<Suite> {
    let root = match &config.data_dir {
        Some(root) => root.clone(),
        None => default_data_dir()?,
    };
    debug!(?root, suite = name, "opening suite");

    let archiver = if config.seal_archives {
        SecureArchiver::from_provider(&KeyringProvider::new("prefkit-cli", "archive-key"))
    } else {
        SecureArchiver::unsealed()
    };
    open_suite(root, name, archiver)
}

fn open_suite(root: PathBuf, name: &str, archiver: SecureArchiver) -> Result<Suite> {
    let store = FileDefaultsStore::open(root, name)?;
    Ok(Suite::new(name, store).with_archiver(archiver))
}

/// Helper for tests to open a sealing suite rooted at a temp dir with an in-memory key.
#[cfg(test)]
pub fn test_suite(root: impl Into<PathBuf>, name: &str) -> Suite {
    let archiver = SecureArchiver::from_provider(&InMemoryKeyProvider::default());
    open_suite(root.into(), name, archiver).expect("open test suite")
}
