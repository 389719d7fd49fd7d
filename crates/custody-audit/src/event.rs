//! Audit event types and the tamper-evidence material they carry.
//!
//! Every event stores a checksum (SHA-256 of its canonical JSON minus the
//! checksum and signature fields) and a P-256 signature over that checksum.
//! Recomputing either detects any retroactive edit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use custody_crypto::canonical_json;

use crate::error::{AuditError, Result};

/// Closed set of custody events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    EvidenceStored,
    EvidenceAccessed,
    EvidenceLocked,
    EvidenceDeleted,
    EvidenceEncrypted,
    EvidenceDecrypted,
    PiiEncrypted,
    PiiDecrypted,
    KeyGenerated,
    KeyRotated,
    ExportCreated,
    CaseDeleted,
    RoleChange,
    PermissionChange,
    LegalHoldCreated,
    LegalHoldReleased,
    ComplianceViolation,
    SuspiciousActivity,
}

impl AuditEventType {
    /// Event types that indicate elevated privilege when they occur.
    pub fn is_high_privilege(&self) -> bool {
        matches!(
            self,
            AuditEventType::CaseDeleted
                | AuditEventType::RoleChange
                | AuditEventType::PermissionChange
                | AuditEventType::ExportCreated
        )
    }

    /// The snake_case wire name, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::EvidenceStored => "evidence_stored",
            AuditEventType::EvidenceAccessed => "evidence_accessed",
            AuditEventType::EvidenceLocked => "evidence_locked",
            AuditEventType::EvidenceDeleted => "evidence_deleted",
            AuditEventType::EvidenceEncrypted => "evidence_encrypted",
            AuditEventType::EvidenceDecrypted => "evidence_decrypted",
            AuditEventType::PiiEncrypted => "pii_encrypted",
            AuditEventType::PiiDecrypted => "pii_decrypted",
            AuditEventType::KeyGenerated => "key_generated",
            AuditEventType::KeyRotated => "key_rotated",
            AuditEventType::ExportCreated => "export_created",
            AuditEventType::CaseDeleted => "case_deleted",
            AuditEventType::RoleChange => "role_change",
            AuditEventType::PermissionChange => "permission_change",
            AuditEventType::LegalHoldCreated => "legal_hold_created",
            AuditEventType::LegalHoldReleased => "legal_hold_released",
            AuditEventType::ComplianceViolation => "compliance_violation",
            AuditEventType::SuspiciousActivity => "suspicious_activity",
        }
    }
}

/// Severity attached to audit events and compliance rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Who performed an action. All fields optional; system-initiated events
/// carry none.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
}

impl Actor {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }
}

/// What an action touched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceRef {
    pub case_id: Option<String>,
    pub resource_id: Option<String>,
}

impl ResourceRef {
    pub fn case(case_id: impl Into<String>) -> Self {
        Self {
            case_id: Some(case_id.into()),
            resource_id: None,
        }
    }
}

/// One immutable entry in the custody trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub event_type: AuditEventType,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
    pub case_id: Option<String>,
    pub resource_id: Option<String>,
    pub action: String,
    pub details: Map<String, Value>,
    pub severity: Severity,
    /// Hex SHA-256 of the canonical JSON of the event minus this field and
    /// the signature.
    pub checksum: String,
    /// Hex P-256 signature (64-byte P1363) over the checksum bytes.
    pub digital_signature: Option<String>,
}

impl AuditEvent {
    /// Recompute the checksum from the event's current field values.
    ///
    /// Any difference from the stored `checksum` means the record was
    /// altered after it was written.
    pub fn compute_checksum(&self) -> Result<String> {
        let mut value = serde_json::to_value(self)?;
        let obj = value
            .as_object_mut()
            .ok_or_else(|| AuditError::Serialization("event is not an object".into()))?;
        obj.remove("checksum");
        obj.remove("digital_signature");

        let canonical = canonical_json(&value)
            .map_err(|e| AuditError::Serialization(e.to_string()))?;
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}
