//! The evidence vault: one context object wiring the custody chain.
//!
//! Write path: encrypt → content-addressed put → audit log. Read path:
//! self-verifying get → decrypt → audit log. The ledger doubles as the
//! store's legal-hold registry, so a hold placed through the vault is
//! enforced on the delete path immediately.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::info;

use custody_audit::{
    load_or_generate_signing_key, Actor, AuditEventType, AuditLedger, LegalHold, MemoryStore,
    ResourceRef, Severity, SqliteStore,
};
use custody_crypto::{EnvelopeCrypto, RotationReport};
use custody_store::{ContentStore, HoldRegistry, ObjectId, StoredObject, CASE_ID_TAG};

use crate::config::{AuditBackend, VaultConfig};
use crate::error::Result;

/// Tag recording which data key sealed an object's envelope.
pub const KEY_ID_TAG: &str = "key_id";
/// Tag marking an object body as an envelope.
pub const ENCRYPTED_TAG: &str = "encrypted";

pub struct EvidenceVault {
    store: ContentStore,
    crypto: EnvelopeCrypto,
    ledger: Arc<AuditLedger>,
}

impl EvidenceVault {
    /// Build the vault: audit ledger first, then the store wired to consult
    /// it for legal holds.
    pub fn open(config: VaultConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.root).map_err(custody_store::StoreError::Storage)?;

        let ledger = Arc::new(match config.audit_backend {
            AuditBackend::Sqlite => {
                // Persist the signing key beside the database so a reopened
                // vault can verify the trail it wrote before.
                let signing_key =
                    load_or_generate_signing_key(&config.root.join("audit-signing.key"))?;
                AuditLedger::with_signing_key(
                    Box::new(SqliteStore::open(config.root.join("audit.db"))?),
                    signing_key,
                )
            }
            AuditBackend::Memory => AuditLedger::new(Box::new(MemoryStore::new())),
        });

        let holds: Arc<dyn HoldRegistry> = ledger.clone();
        let store = ContentStore::open_with_holds(&config.root, Some(holds))?;
        let crypto = EnvelopeCrypto::new(config.master_key);

        info!(root = %config.root.display(), "evidence vault opened");
        Ok(Self {
            store,
            crypto,
            ledger,
        })
    }

    /// Encrypt and store an evidence payload.
    ///
    /// The envelope's content address is the object identity; the data key
    /// id is recorded in the object's tags for retrieval.
    pub fn store_evidence(
        &self,
        bytes: &[u8],
        content_type: &str,
        mut tags: BTreeMap<String, String>,
        actor: &Actor,
    ) -> Result<ObjectId> {
        let case_id = tags.get(CASE_ID_TAG).cloned();

        let (envelope, key_id) = self.crypto.encrypt(bytes, None)?;
        self.log(
            AuditEventType::EvidenceEncrypted,
            "encrypt_evidence",
            [
                ("key_id", Value::from(key_id.clone())),
                ("plaintext_size", Value::from(bytes.len())),
                ("encrypted_size", Value::from(envelope.len())),
            ],
            actor,
            &ResourceRef {
                case_id: case_id.clone(),
                resource_id: None,
            },
            Severity::Low,
        )?;

        tags.insert(KEY_ID_TAG.to_string(), key_id);
        tags.insert(ENCRYPTED_TAG.to_string(), "true".to_string());
        let object_id = self.store.put(&envelope, content_type, tags)?;

        self.log(
            AuditEventType::EvidenceStored,
            "store_evidence",
            [
                ("object_id", Value::from(object_id.to_hex())),
                ("size_bytes", Value::from(envelope.len())),
                ("content_type", Value::from(content_type)),
            ],
            actor,
            &ResourceRef {
                case_id,
                resource_id: Some(object_id.to_hex()),
            },
            Severity::Low,
        )?;
        Ok(object_id)
    }

    /// Retrieve and decrypt an evidence payload.
    ///
    /// A decryption failure is itself logged (rule_003 watches for it)
    /// before the error propagates.
    pub fn retrieve_evidence(&self, object_id: &ObjectId, actor: &Actor) -> Result<Vec<u8>> {
        let meta = self.store.metadata(object_id)?;
        let bytes = self.store.get(object_id)?;
        let resource = ResourceRef {
            case_id: meta.tags.get(CASE_ID_TAG).cloned(),
            resource_id: Some(object_id.to_hex()),
        };

        self.log(
            AuditEventType::EvidenceAccessed,
            "access_evidence",
            [("object_id", Value::from(object_id.to_hex()))],
            actor,
            &resource,
            Severity::Low,
        )?;

        if meta.tags.get(ENCRYPTED_TAG).map(String::as_str) != Some("true") {
            return Ok(bytes);
        }

        let key_id = meta
            .tags
            .get(KEY_ID_TAG)
            .cloned()
            .ok_or_else(|| custody_crypto::CryptoError::UnknownKey(object_id.to_hex()))?;

        match self.crypto.decrypt(&bytes, &key_id, None) {
            Ok(plaintext) => {
                self.log(
                    AuditEventType::EvidenceDecrypted,
                    "decrypt_evidence",
                    [
                        ("key_id", Value::from(key_id)),
                        ("outcome", Value::from("success")),
                    ],
                    actor,
                    &resource,
                    Severity::Low,
                )?;
                Ok(plaintext)
            }
            Err(err) => {
                self.log(
                    AuditEventType::EvidenceDecrypted,
                    "decrypt_evidence",
                    [
                        ("key_id", Value::from(key_id)),
                        ("outcome", Value::from("failure")),
                        ("error", Value::from(err.to_string())),
                    ],
                    actor,
                    &resource,
                    Severity::Medium,
                )?;
                Err(err.into())
            }
        }
    }

    /// Apply the one-way WORM lock and log the transition.
    pub fn lock_evidence(&self, object_id: &ObjectId, actor: &Actor) -> Result<()> {
        let meta = self.store.metadata(object_id)?;
        self.store.apply_worm_lock(object_id)?;
        self.log(
            AuditEventType::EvidenceLocked,
            "apply_worm_lock",
            [("object_id", Value::from(object_id.to_hex()))],
            actor,
            &ResourceRef {
                case_id: meta.tags.get(CASE_ID_TAG).cloned(),
                resource_id: Some(object_id.to_hex()),
            },
            Severity::Medium,
        )?;
        Ok(())
    }

    /// Delete evidence unless WORM-locked or held; log when removal happens.
    pub fn delete_evidence(&self, object_id: &ObjectId, actor: &Actor) -> Result<bool> {
        let case_id = self
            .store
            .metadata(object_id)
            .ok()
            .and_then(|m| m.tags.get(CASE_ID_TAG).cloned());

        let removed = self.store.delete(object_id)?;
        if removed {
            self.log(
                AuditEventType::EvidenceDeleted,
                "delete_evidence",
                [("object_id", Value::from(object_id.to_hex()))],
                actor,
                &ResourceRef {
                    case_id,
                    resource_id: Some(object_id.to_hex()),
                },
                Severity::Medium,
            )?;
        }
        Ok(removed)
    }

    /// Object metadata passthrough.
    pub fn evidence_metadata(&self, object_id: &ObjectId) -> Result<StoredObject> {
        Ok(self.store.metadata(object_id)?)
    }

    /// Encrypt recognized PII fields in a record, with audit.
    pub fn encrypt_pii(&self, record: &Value, case_id: &str, actor: &Actor) -> Result<Value> {
        let encrypted = self.crypto.encrypt_pii_fields(record)?;
        let field_names: Vec<Value> = record
            .as_object()
            .map(|o| o.keys().map(|k| Value::from(k.as_str())).collect())
            .unwrap_or_default();
        self.log(
            AuditEventType::PiiEncrypted,
            "encrypt_pii_fields",
            [("fields", Value::Array(field_names))],
            actor,
            &ResourceRef::case(case_id),
            Severity::Low,
        )?;
        Ok(encrypted)
    }

    /// Decrypt PII fields in a record, with audit. Corrupt fields become
    /// null; the record itself never fails.
    pub fn decrypt_pii(&self, record: &Value, case_id: &str, actor: &Actor) -> Result<Value> {
        let decrypted = self.crypto.decrypt_pii_fields(record)?;
        self.log(
            AuditEventType::PiiDecrypted,
            "decrypt_pii_fields",
            [],
            actor,
            &ResourceRef::case(case_id),
            Severity::Low,
        )?;
        Ok(decrypted)
    }

    /// Supersede data keys near expiry and log the pass.
    pub fn rotate_keys(&self, actor: &Actor) -> Result<RotationReport> {
        let report = self.crypto.rotate_keys()?;
        self.log(
            AuditEventType::KeyRotated,
            "rotate_keys",
            [
                ("rotated", Value::from(report.rotated.len())),
                ("expired", Value::from(report.expired_keys.len())),
            ],
            actor,
            &ResourceRef::default(),
            Severity::Medium,
        )?;
        Ok(report)
    }

    /// Register a legal hold through the ledger.
    pub fn create_legal_hold(
        &self,
        case_id: &str,
        description: &str,
        created_by: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<LegalHold> {
        Ok(self
            .ledger
            .create_legal_hold(case_id, description, created_by, expires_at, Vec::new())?)
    }

    pub fn ledger(&self) -> &AuditLedger {
        &self.ledger
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn crypto(&self) -> &EnvelopeCrypto {
        &self.crypto
    }

    fn log<const N: usize>(
        &self,
        event_type: AuditEventType,
        action: &str,
        details: [(&str, Value); N],
        actor: &Actor,
        resource: &ResourceRef,
        severity: Severity,
    ) -> Result<()> {
        let mut map = Map::new();
        for (key, value) in details {
            map.insert(key.to_string(), value);
        }
        self.ledger
            .log_event(event_type, action, map, actor, resource, severity)?;
        Ok(())
    }
}
