//! Concrete collaborators for the defaults facade.
//! A JSON file-backed store per suite, and AES-GCM sealed archives with keys sourced from
//! the OS keyring (or test doubles).

pub mod archiver;
pub mod file_store;
pub mod key_provider;
