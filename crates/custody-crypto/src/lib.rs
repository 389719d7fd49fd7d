pub mod aead;
pub mod canonical;
pub mod dek;
pub mod envelope;
pub mod error;
pub mod hkdf;
pub mod pii;
pub mod signing;
pub mod types;

pub use aead::{aes_gcm_decrypt, aes_gcm_encrypt};
pub use canonical::canonical_json;
pub use dek::{generate_dek, unwrap_dek, wrap_dek, WRAPPED_DEK_SIZE};
pub use envelope::EnvelopeCrypto;
pub use error::CryptoError;
pub use hkdf::hkdf_derive;
pub use pii::PiiField;
pub use signing::{
    export_public_key_jwk, generate_p256_keypair, import_public_key_jwk, sign, verify,
};
pub use types::{
    EncryptionContext, EncryptionKey, RotatedKey, RotationReport, AES_GCM_IV_LENGTH,
    AES_GCM_TAG_LENGTH, AES_KEY_LENGTH, DEFAULT_ROTATION_DAYS, DEFAULT_ROTATION_THRESHOLD_DAYS,
    ENVELOPE_VERSION, KEY_ALGORITHM, SUPPORTED_VERSIONS,
};
