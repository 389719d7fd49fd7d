//! Per-payload Data Encryption Key (DEK) primitives.
//!
//! Each encrypted payload gets a random 256-bit DEK. Payload bytes are
//! encrypted with the DEK; the DEK is wrapped (encrypted) with the process
//! master key using AES-256-GCM with a fresh random nonce.
//!
//! Wrapped DEK blob: [IV:12][encrypted key:32][tag:16] = 60 bytes total

use zeroize::Zeroizing;

use crate::aead::{aes_gcm_decrypt, aes_gcm_encrypt};
use crate::error::CryptoError;
use crate::types::{AES_GCM_IV_LENGTH, AES_GCM_TAG_LENGTH, AES_KEY_LENGTH};

/// Size of a wrapped DEK in bytes: 12 (IV) + 32 (key) + 16 (tag).
pub const WRAPPED_DEK_SIZE: usize = AES_GCM_IV_LENGTH + AES_KEY_LENGTH + AES_GCM_TAG_LENGTH;

/// Generate a random 256-bit Data Encryption Key.
///
/// Returned inside `Zeroizing` so the material is wiped when it leaves scope.
pub fn generate_dek() -> Result<Zeroizing<[u8; AES_KEY_LENGTH]>, CryptoError> {
    let mut dek = Zeroizing::new([0u8; AES_KEY_LENGTH]);
    getrandom::getrandom(dek.as_mut()).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
    Ok(dek)
}

/// Wrap a DEK with the master key.
///
/// Each call uses a fresh random nonce, so wrapping the same DEK twice
/// yields different blobs. The blob embeds nonce and tag; unwrap needs only
/// the blob and the master key.
pub fn wrap_dek(dek: &[u8], master_key: &[u8]) -> Result<[u8; WRAPPED_DEK_SIZE], CryptoError> {
    if dek.len() != AES_KEY_LENGTH {
        return Err(CryptoError::InvalidKeyLength {
            expected: AES_KEY_LENGTH,
            got: dek.len(),
        });
    }
    let wrapped = aes_gcm_encrypt(master_key, dek, None)
        .map_err(|e| CryptoError::WrapFailed(e.to_string()))?;

    // IV + 32-byte key + tag, always
    let mut result = [0u8; WRAPPED_DEK_SIZE];
    result.copy_from_slice(&wrapped);
    Ok(result)
}

/// Unwrap a DEK from a wrapped blob.
///
/// Fails closed on tag mismatch; corrupt key material is never returned.
pub fn unwrap_dek(
    wrapped_dek: &[u8],
    master_key: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if wrapped_dek.len() != WRAPPED_DEK_SIZE {
        return Err(CryptoError::InvalidWrappedKeyLength {
            expected: WRAPPED_DEK_SIZE,
            got: wrapped_dek.len(),
        });
    }
    let dek = aes_gcm_decrypt(master_key, wrapped_dek, None)
        .map_err(|e| CryptoError::UnwrapFailed(e.to_string()))?;
    Ok(Zeroizing::new(dek))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        getrandom::getrandom(&mut key).unwrap();
        key
    }

    #[test]
    fn generate_dek_is_32_bytes() {
        let dek = generate_dek().unwrap();
        assert_eq!(dek.len(), 32);
    }

    #[test]
    fn generate_dek_is_unique() {
        let dek1 = generate_dek().unwrap();
        let dek2 = generate_dek().unwrap();
        assert_ne!(*dek1, *dek2);
    }

    #[test]
    fn wrap_unwrap_round_trip() {
        let dek = generate_dek().unwrap();
        let master = random_key();

        let wrapped = wrap_dek(dek.as_ref(), &master).unwrap();
        let unwrapped = unwrap_dek(&wrapped, &master).unwrap();

        assert_eq!(unwrapped.as_slice(), dek.as_ref());
    }

    #[test]
    fn wrapped_dek_is_60_bytes() {
        let dek = generate_dek().unwrap();
        let master = random_key();
        let wrapped = wrap_dek(dek.as_ref(), &master).unwrap();
        assert_eq!(wrapped.len(), WRAPPED_DEK_SIZE);
        assert_eq!(wrapped.len(), 60);
    }

    #[test]
    fn fresh_nonce_each_wrap() {
        let dek = generate_dek().unwrap();
        let master = random_key();
        let w1 = wrap_dek(dek.as_ref(), &master).unwrap();
        let w2 = wrap_dek(dek.as_ref(), &master).unwrap();
        assert_ne!(w1, w2);
    }

    #[test]
    fn wrong_master_key_fails() {
        let dek = generate_dek().unwrap();
        let master1 = random_key();
        let master2 = random_key();
        let wrapped = wrap_dek(dek.as_ref(), &master1).unwrap();
        assert!(unwrap_dek(&wrapped, &master2).is_err());
    }

    #[test]
    fn tampered_blob_fails() {
        let dek = generate_dek().unwrap();
        let master = random_key();
        let mut wrapped = wrap_dek(dek.as_ref(), &master).unwrap();
        let last = wrapped.len() - 1;
        wrapped[last] ^= 0xff;
        assert!(unwrap_dek(&wrapped, &master).is_err());
    }

    #[test]
    fn wrong_length_fails() {
        let master = random_key();
        assert!(unwrap_dek(&[0u8; 20], &master).is_err());
        assert!(unwrap_dek(&[0u8; 61], &master).is_err());
    }

    #[test]
    fn wrong_dek_length_fails() {
        let master = random_key();
        assert!(wrap_dek(&[0u8; 16], &master).is_err());
    }
}
