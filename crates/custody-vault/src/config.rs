//! Vault configuration.
//!
//! Everything the vault needs is named here explicitly; there are no
//! ambient globals and no string-keyed option maps.

use std::path::PathBuf;

use custody_crypto::{hkdf_derive, CryptoError, AES_KEY_LENGTH};

const MASTER_KEY_SALT: &[u8] = b"custody:master-key-salt:v1";
const MASTER_KEY_INFO: &[u8] = b"custody:master-key:v1";

/// Where the audit trail persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditBackend {
    /// SQLite database at `<root>/audit.db`.
    Sqlite,
    /// In-process only; the trail dies with the vault. Tests and tooling.
    Memory,
}

#[derive(Clone)]
pub struct VaultConfig {
    /// Directory holding evidence content, metadata, and the audit database.
    pub root: PathBuf,
    /// 256-bit master key wrapping every data key.
    pub master_key: [u8; AES_KEY_LENGTH],
    pub audit_backend: AuditBackend,
}

impl VaultConfig {
    pub fn new(root: impl Into<PathBuf>, master_key: [u8; AES_KEY_LENGTH]) -> Self {
        Self {
            root: root.into(),
            master_key,
            audit_backend: AuditBackend::Sqlite,
        }
    }

    pub fn with_audit_backend(mut self, backend: AuditBackend) -> Self {
        self.audit_backend = backend;
        self
    }

    /// Derive the master key from input keying material (a KMS secret, a
    /// sealed seed) via HKDF-SHA256.
    pub fn derive_master_key(ikm: &[u8]) -> Result<[u8; AES_KEY_LENGTH], CryptoError> {
        hkdf_derive(ikm, MASTER_KEY_SALT, MASTER_KEY_INFO)
    }
}
