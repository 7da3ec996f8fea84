//! Encode/decode shim between typed values and store primitives.
//!
//! Every step returns a `Result`; the accessors in [`crate::key`] decide what a failure
//! means (fallback on read, logged no-op on write).

use prefkit_core::value::{RawKind, RawValue};
use prefkit_storage::archiver::{ArchiveError, SecureArchiver};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("structured encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("structured encoding produced unexpected text")]
    Shape,
    #[error("{source_type} value does not fit in a stored integer")]
    OutOfRange { source_type: &'static str },
    #[error("archiving failed: {0}")]
    Archive(#[from] ArchiveError),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("expected a {expected} value, found {found}")]
    KindMismatch { expected: RawKind, found: RawKind },
    #[error("{value} does not fit in {target}")]
    OutOfRange { value: i64, target: &'static str },
    #[error("structured decoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("archive rejected: {0}")]
    Archive(#[from] ArchiveError),
}

/// Encode `value` as the body of a one-element JSON array.
///
/// Wrapping keeps top-level scalars and strings valid JSON for encoders that only accept
/// containers; the stored text is what sits between the brackets.
pub fn encode_structured<T: Serialize + ?Sized>(value: &T) -> Result<RawValue, EncodeError> {
    let wrapped = serde_json::to_string(&[value])?;
    let body = wrapped
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or(EncodeError::Shape)?;
    Ok(RawValue::String(body.to_string()))
}

pub fn decode_structured<T: DeserializeOwned>(raw: RawValue) -> Result<T, DecodeError> {
    let body = match raw {
        RawValue::String(body) => body,
        other => {
            return Err(DecodeError::KindMismatch {
                expected: RawKind::String,
                found: other.kind(),
            })
        }
    };

    let [value]: [T; 1] = serde_json::from_str(&format!("[{body}]"))?;
    Ok(value)
}

pub fn encode_secure<T: Serialize + ?Sized>(
    value: &T,
    archive_type: &str,
    archiver: &SecureArchiver,
) -> Result<RawValue, EncodeError> {
    let payload = serde_json::to_vec(value)?;
    let archive = archiver.archive(archive_type, &payload)?;
    Ok(RawValue::Bytes(archive))
}

pub fn decode_secure<T: DeserializeOwned>(
    raw: RawValue,
    archive_type: &str,
    archiver: &SecureArchiver,
) -> Result<T, DecodeError> {
    let archive = match raw {
        RawValue::Bytes(archive) => archive,
        other => {
            return Err(DecodeError::KindMismatch {
                expected: RawKind::Bytes,
                found: other.kind(),
            })
        }
    };

    let payload = archiver.unarchive(archive_type, &archive)?;
    Ok(serde_json::from_slice(&payload)?)
}
