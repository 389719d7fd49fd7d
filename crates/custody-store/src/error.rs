use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Object is WORM-locked: {0}")]
    WormLocked(String),

    #[error("Object {object_id} is covered by an active legal hold on case {case_id}")]
    LegalHold { object_id: String, case_id: String },

    #[error("Checksum mismatch for {object_id}: stored content hashes to {actual}")]
    ChecksumMismatch { object_id: String, actual: String },

    #[error("Invalid object id: {0}")]
    InvalidObjectId(String),

    #[error("Metadata for {object_id} is unreadable: {reason}")]
    Metadata { object_id: String, reason: String },

    #[error("Storage I/O failure: {0}")]
    Storage(#[from] std::io::Error),
}
