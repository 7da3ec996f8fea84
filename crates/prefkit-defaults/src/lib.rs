//! Typed settings on top of a [`DefaultsStore`].
//!
//! Declare a key once with its type and default, then read and write through it. Primitive
//! values go to the store as-is; serde types registered with
//! [`register_structured_setting!`] are kept as JSON text, and those registered with
//! [`register_secure_setting!`] as type-tagged archives sealed by the suite's
//! [`SecureArchiver`]. Types from other crates go through the [`Json`] and [`Archived`]
//! wrappers instead.
//!
//! ```rust
//! use prefkit_defaults::{register_structured_setting, InMemoryDefaultsStore, OptionalKey, Suite};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! struct Endpoint {
//!     url: String,
//! }
//!
//! register_structured_setting!(Endpoint);
//!
//! let suite = Suite::new("app", InMemoryDefaultsStore::new());
//! let last_sync = OptionalKey::<Endpoint>::in_suite("lastSyncURL", &suite);
//! assert_eq!(last_sync.get(), None);
//!
//! let endpoint = Endpoint { url: "https://sync.example.com".into() };
//! last_sync.set(Some(&endpoint));
//! assert_eq!(last_sync.get(), Some(endpoint));
//!
//! last_sync.set(None);
//! assert!(suite.keys().is_empty());
//! ```

pub mod codec;
pub mod key;
pub mod suite;
pub mod value;

pub use codec::{DecodeError, EncodeError};
pub use key::{Key, KeyVariant, OptionalKey};
pub use prefkit_core::{
    store::{DefaultsStore, InMemoryDefaultsStore, StoreError},
    value::{RawKind, RawValue},
};
pub use prefkit_storage::archiver::SecureArchiver;
pub use suite::{clear, Suite, STANDARD_SUITE};
pub use value::{is_native, ArchiveTag, Archived, Json, SettingValue, ValueKind};
