//! AES-256-GCM primitives for payloads and data keys.
//!
//! Blob format: [IV:12][ciphertext + tag]. The envelope layer adds its own
//! version framing; these helpers stay format-free.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::error::CryptoError;
use crate::types::{EncryptionContext, AES_GCM_IV_LENGTH, AES_GCM_TAG_LENGTH, AES_KEY_LENGTH};

/// Build AAD (Additional Authenticated Data) from an encryption context.
/// Format: [4 bytes: caseId length (u32 BE)][caseId UTF-8][evidenceId UTF-8]
pub(crate) fn build_aad(context: &EncryptionContext) -> Vec<u8> {
    let case_bytes = context.case_id.as_bytes();
    let evidence_bytes = context.evidence_id.as_bytes();
    let mut aad = Vec::with_capacity(4 + case_bytes.len() + evidence_bytes.len());
    aad.extend_from_slice(&(case_bytes.len() as u32).to_be_bytes());
    aad.extend_from_slice(case_bytes);
    aad.extend_from_slice(evidence_bytes);
    aad
}

/// Generate a random 12-byte IV for AES-GCM.
pub fn generate_iv() -> Result<[u8; AES_GCM_IV_LENGTH], CryptoError> {
    let mut iv = [0u8; AES_GCM_IV_LENGTH];
    getrandom::getrandom(&mut iv).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
    Ok(iv)
}

/// Encrypt raw bytes with AES-256-GCM. Returns [IV:12][ciphertext+tag].
pub fn aes_gcm_encrypt(
    key: &[u8],
    plaintext: &[u8],
    context: Option<&EncryptionContext>,
) -> Result<Vec<u8>, CryptoError> {
    if key.len() != AES_KEY_LENGTH {
        return Err(CryptoError::InvalidKeyLength {
            expected: AES_KEY_LENGTH,
            got: key.len(),
        });
    }
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    let iv = generate_iv()?;
    let nonce = Nonce::from_slice(&iv);

    let ciphertext = match context {
        Some(ctx) => {
            let aad = build_aad(ctx);
            cipher.encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad: &aad,
                },
            )
        }
        None => cipher.encrypt(nonce, plaintext),
    }
    .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut result = Vec::with_capacity(AES_GCM_IV_LENGTH + ciphertext.len());
    result.extend_from_slice(&iv);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt raw bytes with AES-256-GCM (expects [IV:12][ciphertext+tag]).
///
/// Fails closed: a tag mismatch returns `DecryptionFailed` and no partial
/// plaintext is ever produced.
pub fn aes_gcm_decrypt(
    key: &[u8],
    data: &[u8],
    context: Option<&EncryptionContext>,
) -> Result<Vec<u8>, CryptoError> {
    if key.len() != AES_KEY_LENGTH {
        return Err(CryptoError::InvalidKeyLength {
            expected: AES_KEY_LENGTH,
            got: key.len(),
        });
    }
    if data.len() < AES_GCM_IV_LENGTH + AES_GCM_TAG_LENGTH {
        return Err(CryptoError::DataTooShort);
    }
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;
    let iv = &data[..AES_GCM_IV_LENGTH];
    let ciphertext = &data[AES_GCM_IV_LENGTH..];
    let nonce = Nonce::from_slice(iv);

    match context {
        Some(ctx) => {
            let aad = build_aad(ctx);
            cipher.decrypt(
                nonce,
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
        }
        None => cipher.decrypt(nonce, ciphertext),
    }
    .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}
