pub mod config;
pub mod error;
pub mod vault;

pub use config::{AuditBackend, VaultConfig};
pub use error::{Result, VaultError};
pub use vault::{EvidenceVault, ENCRYPTED_TAG, KEY_ID_TAG};

pub use custody_audit::{
    Actor, AuditEventType, AuditLedger, LegalHold, ResourceRef, Severity, TrailFilter,
};
pub use custody_crypto::{EncryptionContext, EnvelopeCrypto, RotationReport};
pub use custody_store::{ContentStore, ObjectId, StoredObject, CASE_ID_TAG};
