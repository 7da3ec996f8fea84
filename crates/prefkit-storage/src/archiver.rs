use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::key_provider::{KeyMaterial, KeyProvider};

const NONCE_LEN: usize = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArchiveError {
    #[error("malformed archive: {reason}")]
    Malformed { reason: String },
    #[error("archive holds `{found}`, expected `{expected}`")]
    TypeMismatch { expected: String, found: String },
    /// An unsealed archive was offered to an archiver that holds a sealing key.
    #[error("archive is not sealed")]
    Unsealed,
    #[error("archive is sealed but no sealing key is available")]
    MissingKey,
    #[error("cipher failure: {reason}")]
    Cipher { reason: String },
}

/// On-store layout of an archive. Serialized as JSON bytes.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    archive_type: String,
    sealed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nonce: Option<String>,
    payload: String,
}

/// Wraps serialized payloads into type-tagged archives.
///
/// With a sealing key, archives are AES-256-GCM encrypted and the archive type is bound in
/// as associated data, so neither the payload nor its declared type can be altered without
/// detection. Without a key the archiver falls back to plain envelopes, which still enforce
/// the declared type on read but are not tamper-resistant.
#[derive(Debug, Clone, Default)]
pub struct SecureArchiver {
    sealing_key: Option<KeyMaterial>,
}

impl SecureArchiver {
    /// Archiver that writes plain envelopes.
    pub fn unsealed() -> Self {
        Self::default()
    }

    pub fn with_key(material: KeyMaterial) -> Self {
        Self {
            sealing_key: Some(material),
        }
    }

    /// Seal with the provider's key, or fall back to plain envelopes if it cannot supply one.
    pub fn from_provider<P: KeyProvider + ?Sized>(provider: &P) -> Self {
        match provider.get_or_create() {
            Ok(material) => {
                debug!(key_id = %material.id, "sealing secure archives");
                Self::with_key(material)
            }
            Err(err) => {
                warn!("sealing key unavailable, secure archives will not be tamper-resistant: {err}");
                Self::unsealed()
            }
        }
    }

    pub fn is_sealing(&self) -> bool {
        self.sealing_key.is_some()
    }

    pub fn archive(&self, archive_type: &str, payload: &[u8]) -> Result<Vec<u8>, ArchiveError> {
        let envelope = match &self.sealing_key {
            Some(material) => {
                let cipher = build_cipher(material)?;
                let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
                let ciphertext = cipher
                    .encrypt(
                        &nonce,
                        Payload {
                            msg: payload,
                            aad: archive_type.as_bytes(),
                        },
                    )
                    .map_err(|e| ArchiveError::Cipher {
                        reason: format!("encrypt failed: {e}"),
                    })?;
                Envelope {
                    archive_type: archive_type.to_string(),
                    sealed: true,
                    nonce: Some(URL_SAFE_NO_PAD.encode(nonce.as_slice())),
                    payload: URL_SAFE_NO_PAD.encode(ciphertext),
                }
            }
            None => Envelope {
                archive_type: archive_type.to_string(),
                sealed: false,
                nonce: None,
                payload: URL_SAFE_NO_PAD.encode(payload),
            },
        };

        serde_json::to_vec(&envelope).map_err(malformed)
    }

    /// Recover the payload of an archive, accepting only archives of `archive_type`.
    pub fn unarchive(&self, archive_type: &str, archive: &[u8]) -> Result<Vec<u8>, ArchiveError> {
        let envelope: Envelope = serde_json::from_slice(archive).map_err(malformed)?;
        if envelope.archive_type != archive_type {
            return Err(ArchiveError::TypeMismatch {
                expected: archive_type.to_string(),
                found: envelope.archive_type,
            });
        }

        let payload = URL_SAFE_NO_PAD.decode(&envelope.payload).map_err(malformed)?;

        match (&self.sealing_key, envelope.sealed) {
            (Some(_), false) => Err(ArchiveError::Unsealed),
            (None, true) => Err(ArchiveError::MissingKey),
            (None, false) => Ok(payload),
            (Some(material), true) => {
                let nonce_text = envelope.nonce.ok_or_else(|| ArchiveError::Malformed {
                    reason: "sealed archive without nonce".to_string(),
                })?;
                let nonce_bytes = URL_SAFE_NO_PAD.decode(nonce_text).map_err(malformed)?;
                if nonce_bytes.len() != NONCE_LEN {
                    return Err(ArchiveError::Malformed {
                        reason: format!("expected {NONCE_LEN} byte nonce, got {}", nonce_bytes.len()),
                    });
                }

                let cipher = build_cipher(material)?;
                cipher
                    .decrypt(
                        Nonce::from_slice(&nonce_bytes),
                        Payload {
                            msg: &payload,
                            aad: archive_type.as_bytes(),
                        },
                    )
                    .map_err(|e| ArchiveError::Cipher {
                        reason: format!("decrypt failed: {e}"),
                    })
            }
        }
    }
}

fn build_cipher(material: &KeyMaterial) -> Result<Aes256Gcm, ArchiveError> {
    Aes256Gcm::new_from_slice(&material.bytes).map_err(|e| ArchiveError::Cipher {
        reason: format!("cipher init failed: {e}"),
    })
}

fn malformed<E: ToString>(err: E) -> ArchiveError {
    ArchiveError::Malformed {
        reason: err.to_string(),
    }
}
