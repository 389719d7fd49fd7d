//! ECDSA P-256 signing and verification for audit records.
//!
//! Produces IEEE P1363 format signatures (raw r||s, 64 bytes).

use ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use serde_json::Value;

use crate::error::CryptoError;

/// Sign a message with ECDSA P-256 + SHA-256.
///
/// # Returns
/// 64-byte IEEE P1363 signature (r||s)
pub fn sign(private_key: &SigningKey, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let signature: Signature = private_key
        .try_sign(message)
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
    Ok(signature.to_bytes().to_vec())
}

/// Verify an ECDSA P-256 + SHA-256 signature.
///
/// Returns true if valid, false otherwise (never errors on invalid input;
/// a malformed key or signature is simply not a valid signature).
pub fn verify(public_key_jwk: &Value, message: &[u8], signature_bytes: &[u8]) -> bool {
    (|| -> Result<bool, CryptoError> {
        let verifying_key = import_public_key_jwk(public_key_jwk)?;
        let signature = Signature::from_slice(signature_bytes)
            .map_err(|e| CryptoError::InvalidJwk(e.to_string()))?;
        Ok(verifying_key.verify(message, &signature).is_ok())
    })()
    .unwrap_or(false)
}

/// Import a P-256 public key from JWK format.
pub fn import_public_key_jwk(jwk: &Value) -> Result<VerifyingKey, CryptoError> {
    let x_b64 = jwk
        .get("x")
        .and_then(|v| v.as_str())
        .ok_or(CryptoError::MissingJwkField("x"))?;
    let y_b64 = jwk
        .get("y")
        .and_then(|v| v.as_str())
        .ok_or(CryptoError::MissingJwkField("y"))?;

    let x_bytes = base64url_decode(x_b64).map_err(|e| CryptoError::InvalidJwk(format!("x: {}", e)))?;
    let y_bytes = base64url_decode(y_b64).map_err(|e| CryptoError::InvalidJwk(format!("y: {}", e)))?;

    // Build SEC1 uncompressed point: 0x04 || x || y
    let mut uncompressed = Vec::with_capacity(1 + 32 + 32);
    uncompressed.push(0x04);
    // Left-pad to 32 bytes if needed
    if x_bytes.len() < 32 {
        uncompressed.extend(std::iter::repeat_n(0u8, 32 - x_bytes.len()));
    }
    uncompressed.extend_from_slice(&x_bytes);
    if y_bytes.len() < 32 {
        uncompressed.extend(std::iter::repeat_n(0u8, 32 - y_bytes.len()));
    }
    uncompressed.extend_from_slice(&y_bytes);

    VerifyingKey::from_sec1_bytes(&uncompressed)
        .map_err(|e| CryptoError::InvalidJwk(format!("P-256 point: {}", e)))
}

/// Export a P-256 verifying key to JWK format.
pub fn export_public_key_jwk(key: &VerifyingKey) -> Value {
    let point = key.to_encoded_point(false);
    let x = base64url_encode(point.x().unwrap().as_slice());
    let y = base64url_encode(point.y().unwrap().as_slice());

    serde_json::json!({
        "kty": "EC",
        "crv": "P-256",
        "x": x,
        "y": y,
    })
}

/// Generate a new P-256 signing key pair.
pub fn generate_p256_keypair() -> SigningKey {
    SigningKey::random(&mut p256::elliptic_curve::rand_core::OsRng)
}

fn base64url_encode(data: &[u8]) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    URL_SAFE_NO_PAD.encode(data)
}

fn base64url_decode(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    URL_SAFE_NO_PAD.decode(data)
}
