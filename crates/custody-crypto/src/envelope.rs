//! Envelope encryption service.
//!
//! Every payload is encrypted under a fresh data key (DEK); the DEK is
//! wrapped with the process master key and carried inside the envelope, so
//! an envelope is self-contained given the master key.
//!
//! Envelope format: [version=1:1B][wrapped DEK:60B][IV:12B][ciphertext+tag]
//!
//! The keyring tracks key metadata and wrapped material only. Rotation
//! supersedes keys near expiry; it never re-encrypts existing envelopes, and
//! deprecated keys stay in the keyring so those envelopes remain readable.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::aead::{aes_gcm_decrypt, aes_gcm_encrypt};
use crate::dek::{generate_dek, unwrap_dek, wrap_dek, WRAPPED_DEK_SIZE};
use crate::error::CryptoError;
use crate::types::{
    EncryptionContext, EncryptionKey, RotatedKey, RotationReport, AES_GCM_IV_LENGTH,
    AES_GCM_TAG_LENGTH, AES_KEY_LENGTH, DEFAULT_ROTATION_DAYS, DEFAULT_ROTATION_THRESHOLD_DAYS,
    ENVELOPE_VERSION, KEY_ALGORITHM, SUPPORTED_VERSIONS,
};

/// Minimum envelope size: version + wrapped DEK + IV + tag.
const MIN_ENVELOPE_SIZE: usize = 1 + WRAPPED_DEK_SIZE + AES_GCM_IV_LENGTH + AES_GCM_TAG_LENGTH;

struct KeyEntry {
    meta: EncryptionKey,
    wrapped: [u8; WRAPPED_DEK_SIZE],
    deprecated: bool,
}

/// Envelope encryption with a keyring of wrapped data keys.
///
/// Thread-safe: the keyring sits behind a `RwLock`; plaintext key material
/// is scoped to each call and zeroized on drop.
pub struct EnvelopeCrypto {
    master_key: Zeroizing<[u8; AES_KEY_LENGTH]>,
    rotation_period: Duration,
    rotation_threshold: Duration,
    keyring: RwLock<HashMap<String, KeyEntry>>,
}

impl EnvelopeCrypto {
    /// Create a service around a 256-bit master key.
    pub fn new(master_key: [u8; AES_KEY_LENGTH]) -> Self {
        Self::with_rotation(
            master_key,
            Duration::days(DEFAULT_ROTATION_DAYS),
            Duration::days(DEFAULT_ROTATION_THRESHOLD_DAYS),
        )
    }

    /// Create a service with explicit rotation period and threshold.
    pub fn with_rotation(
        master_key: [u8; AES_KEY_LENGTH],
        rotation_period: Duration,
        rotation_threshold: Duration,
    ) -> Self {
        Self {
            master_key: Zeroizing::new(master_key),
            rotation_period,
            rotation_threshold,
            keyring: RwLock::new(HashMap::new()),
        }
    }

    /// Generate a fresh data key, register it, and return its metadata.
    pub fn generate_data_key(&self) -> Result<EncryptionKey, CryptoError> {
        let (meta, _dek, _wrapped) = self.generate_registered_dek(1)?;
        Ok(meta)
    }

    fn generate_registered_dek(
        &self,
        version: u32,
    ) -> Result<(EncryptionKey, Zeroizing<Vec<u8>>, [u8; WRAPPED_DEK_SIZE]), CryptoError> {
        let dek = generate_dek()?;
        let wrapped = wrap_dek(dek.as_ref(), self.master_key.as_ref())?;

        let mut id_bytes = [0u8; 16];
        getrandom::getrandom(&mut id_bytes).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
        let key_id = format!("dek_{}", hex::encode(id_bytes));

        let now = Utc::now();
        let meta = EncryptionKey {
            key_id: key_id.clone(),
            algorithm: KEY_ALGORITHM.to_string(),
            created_at: now,
            expires_at: now + self.rotation_period,
            version,
        };

        self.keyring.write().insert(
            key_id.clone(),
            KeyEntry {
                meta: meta.clone(),
                wrapped,
                deprecated: false,
            },
        );
        debug!(key_id = %key_id, "generated data key");

        Ok((meta, Zeroizing::new(dek.to_vec()), wrapped))
    }

    /// Encrypt a payload under a fresh data key.
    ///
    /// Returns the envelope bytes and the data key id.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        context: Option<&EncryptionContext>,
    ) -> Result<(Vec<u8>, String), CryptoError> {
        let (meta, dek, wrapped) = self.generate_registered_dek(1)?;
        let payload = aes_gcm_encrypt(dek.as_slice(), plaintext, context)?;

        let mut envelope = Vec::with_capacity(1 + WRAPPED_DEK_SIZE + payload.len());
        envelope.push(ENVELOPE_VERSION);
        envelope.extend_from_slice(&wrapped);
        envelope.extend_from_slice(&payload);

        debug!(key_id = %meta.key_id, size = plaintext.len(), "payload encrypted");
        Ok((envelope, meta.key_id))
    }

    /// Decrypt an envelope.
    ///
    /// The envelope carries its own wrapped data key, so decryption works
    /// for deprecated keys too. Fails closed on any tag or format mismatch.
    pub fn decrypt(
        &self,
        envelope: &[u8],
        key_id: &str,
        context: Option<&EncryptionContext>,
    ) -> Result<Vec<u8>, CryptoError> {
        if envelope.len() < MIN_ENVELOPE_SIZE {
            return Err(CryptoError::DataTooShort);
        }
        let version = envelope[0];
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(CryptoError::UnsupportedVersion(version));
        }

        let wrapped = &envelope[1..1 + WRAPPED_DEK_SIZE];
        let payload = &envelope[1 + WRAPPED_DEK_SIZE..];

        let dek = unwrap_dek(wrapped, self.master_key.as_ref())?;
        let plaintext = aes_gcm_decrypt(dek.as_slice(), payload, context)?;

        debug!(key_id = %key_id, size = plaintext.len(), "payload decrypted");
        Ok(plaintext)
    }

    /// Wrap externally-held data key material under the master key.
    pub fn wrap_data_key(&self, dek: &[u8]) -> Result<[u8; WRAPPED_DEK_SIZE], CryptoError> {
        wrap_dek(dek, self.master_key.as_ref())
    }

    /// Unwrap a wrapped data key blob. The blob embeds nonce and tag, so
    /// only the blob and the key id are needed. Fails closed on mismatch.
    pub fn unwrap_data_key(
        &self,
        wrapped: &[u8],
        key_id: &str,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let dek = unwrap_dek(wrapped, self.master_key.as_ref())?;
        debug!(key_id = %key_id, "data key unwrapped");
        Ok(dek)
    }

    /// Metadata for a registered key, if known.
    pub fn key_metadata(&self, key_id: &str) -> Option<EncryptionKey> {
        self.keyring.read().get(key_id).map(|e| e.meta.clone())
    }

    /// Whether a registered key has been superseded by rotation.
    pub fn is_deprecated(&self, key_id: &str) -> Option<bool> {
        self.keyring.read().get(key_id).map(|e| e.deprecated)
    }

    /// Number of keys in the keyring (active and deprecated).
    pub fn keyring_len(&self) -> usize {
        self.keyring.read().len()
    }

    /// Supersede keys whose expiry falls within the rotation threshold.
    ///
    /// For each such key a replacement is generated and the old key's expiry
    /// is moved to the past. Existing envelopes are NOT re-encrypted; their
    /// wrapped keys stay resolvable. Keys already past expiry are reported.
    pub fn rotate_keys(&self) -> Result<RotationReport, CryptoError> {
        let now = Utc::now();
        let mut report = RotationReport::default();

        let due: Vec<(String, u32)> = {
            let keyring = self.keyring.read();
            keyring
                .values()
                .filter_map(|entry| {
                    if entry.deprecated {
                        return None;
                    }
                    if entry.meta.is_expired(now) {
                        report.expired_keys.push(entry.meta.key_id.clone());
                        return None;
                    }
                    if entry.meta.expires_at - now < self.rotation_threshold {
                        Some((entry.meta.key_id.clone(), entry.meta.version))
                    } else {
                        None
                    }
                })
                .collect()
        };

        for (old_key_id, old_version) in due {
            let (new_meta, _dek, _wrapped) = self.generate_registered_dek(old_version + 1)?;

            let mut keyring = self.keyring.write();
            if let Some(old) = keyring.get_mut(&old_key_id) {
                old.deprecated = true;
                old.meta.expires_at = now - Duration::days(1);
            }
            drop(keyring);

            info!(old = %old_key_id, new = %new_meta.key_id, "data key rotated");
            report.rotated.push(RotatedKey {
                old_key_id,
                new_key_id: new_meta.key_id,
                rotated_at: now,
            });
        }

        Ok(report)
    }

    /// Expiry of a registered key, for rotation scheduling by callers.
    pub fn key_expires_at(&self, key_id: &str) -> Option<DateTime<Utc>> {
        self.keyring.read().get(key_id).map(|e| e.meta.expires_at)
    }
}
