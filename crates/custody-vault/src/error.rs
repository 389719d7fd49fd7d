use thiserror::Error;

pub type Result<T> = std::result::Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error(transparent)]
    Store(#[from] custody_store::StoreError),

    #[error(transparent)]
    Crypto(#[from] custody_crypto::CryptoError),

    #[error(transparent)]
    Audit(#[from] custody_audit::AuditError),
}
