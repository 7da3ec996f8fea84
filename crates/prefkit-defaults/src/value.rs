//! Per-type storage strategy.

use std::{collections::BTreeMap, fmt, marker::PhantomData};

use chrono::{DateTime, Utc};
use prefkit_core::value::{RawKind, RawValue};
use prefkit_storage::archiver::SecureArchiver;
use serde::{de::DeserializeOwned, Serialize};

use crate::codec::{self, DecodeError, EncodeError};

/// How values of a type reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Stored as-is as the given primitive.
    Native(RawKind),
    /// JSON text stored as a string.
    Structured,
    /// Type-tagged archive stored as bytes.
    Secure,
}

/// A type that can be kept behind a settings key.
///
/// Primitive types implement this directly. Serde types opt in through
/// [`register_structured_setting!`](crate::register_structured_setting) or
/// [`register_secure_setting!`](crate::register_secure_setting), which fixes the strategy
/// once per type.
pub trait SettingValue: Sized {
    const KIND: ValueKind;

    fn encode(&self, archiver: &SecureArchiver) -> Result<RawValue, EncodeError>;

    fn decode(raw: RawValue, archiver: &SecureArchiver) -> Result<Self, DecodeError>;
}

/// Whether `T` is stored without going through an encoder.
pub const fn is_native<T: SettingValue>() -> bool {
    matches!(T::KIND, ValueKind::Native(_))
}

macro_rules! native_setting {
    ($ty:ty, $kind:ident) => {
        impl SettingValue for $ty {
            const KIND: ValueKind = ValueKind::Native(RawKind::$kind);

            fn encode(&self, _archiver: &SecureArchiver) -> Result<RawValue, EncodeError> {
                Ok(RawValue::$kind(self.clone()))
            }

            fn decode(raw: RawValue, _archiver: &SecureArchiver) -> Result<Self, DecodeError> {
                match raw {
                    RawValue::$kind(value) => Ok(value),
                    other => Err(DecodeError::KindMismatch {
                        expected: RawKind::$kind,
                        found: other.kind(),
                    }),
                }
            }
        }
    };
}

native_setting!(bool, Bool);
native_setting!(String, String);
native_setting!(i64, Integer);
native_setting!(f64, Double);
native_setting!(f32, Float);
native_setting!(DateTime<Utc>, Timestamp);
native_setting!(Vec<u8>, Bytes);

/// Integers other than `i64` share the integer primitive and are range-checked both ways.
macro_rules! integer_setting {
    ($($ty:ident),+) => {
        $(
            impl SettingValue for $ty {
                const KIND: ValueKind = ValueKind::Native(RawKind::Integer);

                fn encode(&self, _archiver: &SecureArchiver) -> Result<RawValue, EncodeError> {
                    i64::try_from(*self)
                        .map(RawValue::Integer)
                        .map_err(|_| EncodeError::OutOfRange {
                            source_type: stringify!($ty),
                        })
                }

                fn decode(raw: RawValue, _archiver: &SecureArchiver) -> Result<Self, DecodeError> {
                    match raw {
                        RawValue::Integer(value) => {
                            $ty::try_from(value).map_err(|_| DecodeError::OutOfRange {
                                value,
                                target: stringify!($ty),
                            })
                        }
                        other => Err(DecodeError::KindMismatch {
                            expected: RawKind::Integer,
                            found: other.kind(),
                        }),
                    }
                }
            }
        )+
    };
}

integer_setting!(i8, i16, i32, u8, u16, u32, u64, usize);

/// Stores any serde type as structured JSON text.
///
/// Use this for types the calling crate does not own (`Vec<i64>`, `HashMap<..>`,
/// `Option<..>`, types from other crates), which cannot go through
/// [`register_structured_setting!`](crate::register_structured_setting).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Serialize + DeserializeOwned> SettingValue for Json<T> {
    const KIND: ValueKind = ValueKind::Structured;

    fn encode(&self, _archiver: &SecureArchiver) -> Result<RawValue, EncodeError> {
        codec::encode_structured(&self.0)
    }

    fn decode(raw: RawValue, _archiver: &SecureArchiver) -> Result<Self, DecodeError> {
        codec::decode_structured(raw).map(Json)
    }
}

/// Names the archive type of an [`Archived`] value.
///
/// Implement it on a marker type in your own crate:
///
/// ```rust
/// use prefkit_defaults::{ArchiveTag, Archived};
///
/// struct RecoveryCodes;
///
/// impl ArchiveTag for RecoveryCodes {
///     const ARCHIVE_TYPE: &'static str = "recovery_codes";
/// }
///
/// let codes: Archived<Vec<String>, RecoveryCodes> = Archived::new(vec!["a1b2".into()]);
/// assert_eq!(codes.value, vec!["a1b2".to_string()]);
/// ```
pub trait ArchiveTag {
    const ARCHIVE_TYPE: &'static str;
}

/// Stores any serde type as a secure archive under the archive type named by `A`.
pub struct Archived<T, A: ArchiveTag> {
    pub value: T,
    _tag: PhantomData<fn() -> A>,
}

impl<T, A: ArchiveTag> Archived<T, A> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            _tag: PhantomData,
        }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: Clone, A: ArchiveTag> Clone for Archived<T, A> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T: PartialEq, A: ArchiveTag> PartialEq for Archived<T, A> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: fmt::Debug, A: ArchiveTag> fmt::Debug for Archived<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archived")
            .field("archive_type", &A::ARCHIVE_TYPE)
            .field("value", &self.value)
            .finish()
    }
}

impl<T: Serialize + DeserializeOwned, A: ArchiveTag> SettingValue for Archived<T, A> {
    const KIND: ValueKind = ValueKind::Secure;

    fn encode(&self, archiver: &SecureArchiver) -> Result<RawValue, EncodeError> {
        codec::encode_secure(&self.value, A::ARCHIVE_TYPE, archiver)
    }

    fn decode(raw: RawValue, archiver: &SecureArchiver) -> Result<Self, DecodeError> {
        codec::decode_secure(raw, A::ARCHIVE_TYPE, archiver).map(Archived::new)
    }
}

/// Opt serde types into structured (JSON text) storage.
///
/// ```rust
/// use prefkit_defaults::register_structured_setting;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Serialize, Deserialize)]
/// struct Window {
///     width: u32,
///     height: u32,
/// }
///
/// register_structured_setting!(Window);
/// ```
///
/// The orphan rule only allows this for types owned by the calling crate. Wrap anything
/// else in [`Json`](crate::Json) (or [`Archived`](crate::Archived) for secure storage):
///
/// ```rust
/// use prefkit_defaults::{InMemoryDefaultsStore, Json, Key, Suite};
///
/// let suite = Suite::new("app", InMemoryDefaultsStore::new());
/// let ports = Key::in_suite("ports", Json(vec![8080_i64, 8443]), &suite);
/// assert_eq!(ports.get().into_inner(), vec![8080, 8443]);
/// ```
#[macro_export]
macro_rules! register_structured_setting {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::SettingValue for $ty {
                const KIND: $crate::ValueKind = $crate::ValueKind::Structured;

                fn encode(
                    &self,
                    _archiver: &$crate::SecureArchiver,
                ) -> ::core::result::Result<$crate::RawValue, $crate::EncodeError> {
                    $crate::codec::encode_structured(self)
                }

                fn decode(
                    raw: $crate::RawValue,
                    _archiver: &$crate::SecureArchiver,
                ) -> ::core::result::Result<Self, $crate::DecodeError> {
                    $crate::codec::decode_structured(raw)
                }
            }
        )+
    };
}

/// Opt a serde type into secure archival storage under a fixed archive type.
///
/// The archive type is recorded in every archive and checked on read, so a value archived
/// for one type is never reconstructed as another. It must not change once data exists.
#[macro_export]
macro_rules! register_secure_setting {
    ($ty:ty, $archive_type:literal) => {
        const _: () = {
            impl $crate::SettingValue for $ty {
                const KIND: $crate::ValueKind = $crate::ValueKind::Secure;

                fn encode(
                    &self,
                    archiver: &$crate::SecureArchiver,
                ) -> ::core::result::Result<$crate::RawValue, $crate::EncodeError> {
                    $crate::codec::encode_secure(self, $archive_type, archiver)
                }

                fn decode(
                    raw: $crate::RawValue,
                    archiver: &$crate::SecureArchiver,
                ) -> ::core::result::Result<Self, $crate::DecodeError> {
                    $crate::codec::decode_secure(raw, $archive_type, archiver)
                }
            }

            assert!(
                !$archive_type.is_empty(),
                "archive type must not be empty"
            );
        };
    };
}

register_structured_setting!(Vec<String>, BTreeMap<String, String>);
