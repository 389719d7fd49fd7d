use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire format version for evidence envelopes.
///
/// Version 1: AES-256-GCM with a per-payload data key.
/// Format: [version=1:1B][wrapped DEK:60B][IV:12B][ciphertext+tag]
/// The wrapped DEK is itself [IV:12B][encrypted key:32B][tag:16B].
pub const ENVELOPE_VERSION: u8 = 1;

/// Supported envelope versions (for decryption).
pub const SUPPORTED_VERSIONS: &[u8] = &[1];

/// AES-GCM IV length in bytes (96 bits per NIST recommendation).
pub const AES_GCM_IV_LENGTH: usize = 12;

/// AES-GCM tag length in bytes (128 bits).
pub const AES_GCM_TAG_LENGTH: usize = 16;

/// AES key length in bytes (256 bits).
pub const AES_KEY_LENGTH: usize = 32;

/// Cipher name recorded in key metadata and encrypted PII fields.
pub const KEY_ALGORITHM: &str = "AES-256-GCM";

/// Default data key lifetime in days.
pub const DEFAULT_ROTATION_DAYS: i64 = 90;

/// Keys expiring within this many days are superseded by `rotate_keys`.
pub const DEFAULT_ROTATION_THRESHOLD_DAYS: i64 = 7;

/// Context for binding ciphertext to a specific piece of evidence via AAD.
/// Prevents ciphertext relocation between cases or evidence records.
#[derive(Debug, Clone)]
pub struct EncryptionContext {
    /// Case the evidence belongs to.
    pub case_id: String,
    /// Evidence record identifier.
    pub evidence_id: String,
}

/// Metadata for a data encryption key.
///
/// Key material is never part of this struct; the keyring holds it only in
/// wrapped form. Plaintext keys exist solely inside encrypt/decrypt calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncryptionKey {
    pub key_id: String,
    pub algorithm: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub version: u32,
}

impl EncryptionKey {
    /// Whether the key has passed its expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// One key superseded during a rotation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotatedKey {
    pub old_key_id: String,
    pub new_key_id: String,
    pub rotated_at: DateTime<Utc>,
}

/// Outcome of a `rotate_keys` pass.
///
/// Rotation supersedes keys; it never re-encrypts existing envelopes. Old
/// keys stay in the keyring (deprecated) so those envelopes remain readable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RotationReport {
    pub rotated: Vec<RotatedKey>,
    pub expired_keys: Vec<String>,
}
