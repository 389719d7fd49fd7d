//! Structured findings surfaced to compliance tooling.
//!
//! Integrity violations are findings, not faults: nothing here corrects a
//! tampered record, it only makes the tampering visible.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::hold::LegalHold;

/// One event whose stored checksum or signature no longer verifies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TamperedEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub reason: TamperReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TamperReason {
    ChecksumMismatch {
        expected_checksum: String,
        actual_checksum: String,
    },
    InvalidSignature,
}

/// An event that could not be checked at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedVerification {
    pub event_id: String,
    pub error: String,
}

/// Result of re-verifying a span of the trail.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub total_events: usize,
    pub verified_events: usize,
    pub tampered_events: Vec<TamperedEvent>,
    pub missing_signatures: Vec<String>,
    pub failed_verifications: Vec<FailedVerification>,
}

impl IntegrityReport {
    /// True when every event verified cleanly.
    pub fn is_clean(&self) -> bool {
        self.verified_events == self.total_events
            && self.tampered_events.is_empty()
            && self.missing_signatures.is_empty()
            && self.failed_verifications.is_empty()
    }
}

/// Aggregated view of a span of the trail for compliance review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub report_id: String,
    pub generated_at: DateTime<Utc>,
    pub case_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub total_events: usize,
    pub events_by_type: BTreeMap<String, usize>,
    pub events_by_severity: BTreeMap<String, usize>,
    pub events_by_user: BTreeMap<String, usize>,
    pub unique_users: Vec<String>,
    pub unique_cases: Vec<String>,
    pub data_integrity: IntegrityReport,
    pub active_legal_holds: Vec<LegalHold>,
}
