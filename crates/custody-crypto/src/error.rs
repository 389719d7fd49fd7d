use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Encrypted data too short")]
    DataTooShort,

    #[error("Unsupported envelope version: {0}")]
    UnsupportedVersion(u8),

    #[error("Invalid wrapped data key length: expected {expected} bytes, got {got}")]
    InvalidWrappedKeyLength { expected: usize, got: usize },

    #[error("Unknown data key: {0}")]
    UnknownKey(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Data key wrap failed: {0}")]
    WrapFailed(String),

    #[error("Data key unwrap failed: {0}")]
    UnwrapFailed(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("JWK missing {0}")]
    MissingJwkField(&'static str),

    #[error("Encrypted field missing {0}")]
    MissingEncryptedField(&'static str),

    #[error("Invalid JWK: {0}")]
    InvalidJwk(String),

    #[error("canonical JSON: non-finite number is not representable")]
    NonFiniteNumber,

    #[error("Random number generation failed: {0}")]
    RngFailed(String),
}
