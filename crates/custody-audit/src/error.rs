use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuditError>;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit storage failure: {0}")]
    Storage(String),

    #[error("Event serialization failed: {0}")]
    Serialization(String),

    #[error("Event signing failed: {0}")]
    Signing(#[from] custody_crypto::CryptoError),

    #[error("Unknown legal hold: {0}")]
    UnknownHold(String),
}

impl From<rusqlite::Error> for AuditError {
    fn from(e: rusqlite::Error) -> Self {
        AuditError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(e: serde_json::Error) -> Self {
        AuditError::Serialization(e.to_string())
    }
}
