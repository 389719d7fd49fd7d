//! Content address: hex SHA-256 of the stored bytes, the object's sole identity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StoreError;

/// Identity of a stored object.
///
/// Identical content always maps to the same id, which is what makes `put`
/// idempotent and deduplicating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    /// Compute the id for a byte payload.
    pub fn for_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    /// Hex representation (64 lowercase chars).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-char hex string.
    pub fn from_hex(s: &str) -> Result<Self, StoreError> {
        let bytes = hex::decode(s).map_err(|_| StoreError::InvalidObjectId(s.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| StoreError::InvalidObjectId(s.to_string()))?;
        Ok(Self(arr))
    }

    /// Two-character shard prefix used in the on-disk layout.
    pub fn shard(&self) -> String {
        self.to_hex()[..2].to_string()
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl TryFrom<String> for ObjectId {
    type Error = StoreError;

    fn try_from(s: String) -> Result<Self, StoreError> {
        Self::from_hex(&s)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> String {
        id.to_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_same_id() {
        assert_eq!(
            ObjectId::for_bytes(b"legal-doc1"),
            ObjectId::for_bytes(b"legal-doc1")
        );
    }

    #[test]
    fn different_bytes_different_id() {
        assert_ne!(
            ObjectId::for_bytes(b"legal-doc1"),
            ObjectId::for_bytes(b"legal-doc2")
        );
    }

    #[test]
    fn hex_round_trip() {
        let id = ObjectId::for_bytes(b"payload");
        let parsed = ObjectId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn known_digest() {
        // sha256("") is a fixed vector
        let id = ObjectId::for_bytes(b"");
        assert_eq!(
            id.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn shard_is_first_two_chars() {
        let id = ObjectId::for_bytes(b"");
        assert_eq!(id.shard(), "e3");
    }

    #[test]
    fn rejects_bad_hex() {
        assert!(ObjectId::from_hex("zz").is_err());
        assert!(ObjectId::from_hex("abcd").is_err());
    }
}
