//! The audit ledger: signed, checksummed, append-only custody trail.
//!
//! `log_event` builds the event, checksums and signs it, runs the
//! suspicious-activity detector and every enabled compliance rule (each
//! match logs a derived event, bounded to one recursion level), then
//! persists it.
//! Business conditions never fail a log call; only storage I/O does, and
//! that failure propagates, since an unlogged custody event is itself a
//! compliance failure.

use chrono::{DateTime, Utc};
use p256::ecdsa::SigningKey;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use custody_crypto::{export_public_key_jwk, generate_p256_keypair, sign, verify};

use crate::detector::{SuspiciousActivityDetector, SUSPICION_THRESHOLD};
use crate::error::{AuditError, Result};
use crate::event::{Actor, AuditEvent, AuditEventType, ResourceRef, Severity};
use crate::hold::{HoldBook, LegalHold};
use crate::report::{
    ComplianceReport, FailedVerification, IntegrityReport, TamperReason, TamperedEvent,
};
use crate::rules::{default_rules, ComplianceRule};
use crate::store::{AuditStore, TrailFilter};

/// Downstream shipper for persisted events (a SIEM, typically).
///
/// Shipping is advisory: a sink failure is logged and swallowed, it never
/// fails the audit write itself.
pub trait EventSink: Send + Sync {
    fn ship(&self, event: &AuditEvent) -> std::result::Result<(), String>;
}

/// Load a P-256 signing key from `path`, generating and persisting one on
/// first use.
///
/// A restarted process that reuses its key can still verify the trail it
/// wrote before the restart.
pub fn load_or_generate_signing_key(path: &std::path::Path) -> Result<SigningKey> {
    match std::fs::read(path) {
        Ok(bytes) => SigningKey::from_slice(&bytes)
            .map_err(|e| AuditError::Storage(format!("signing key at {:?}: {}", path, e))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let key = generate_p256_keypair();
            std::fs::write(path, key.to_bytes())
                .map_err(|e| AuditError::Storage(e.to_string()))?;
            Ok(key)
        }
        Err(e) => Err(AuditError::Storage(e.to_string())),
    }
}

pub struct AuditLedger {
    store: Box<dyn AuditStore>,
    signing_key: SigningKey,
    public_key_jwk: Value,
    rules: RwLock<Vec<ComplianceRule>>,
    holds: HoldBook,
    detector: Mutex<SuspiciousActivityDetector>,
    sink: Option<Box<dyn EventSink>>,
}

impl AuditLedger {
    /// Ledger with a fresh signing keypair and the default rule set.
    pub fn new(store: Box<dyn AuditStore>) -> Self {
        Self::with_signing_key(store, generate_p256_keypair())
    }

    /// Ledger with a caller-provided signing key, so a trail written in a
    /// previous process can still be verified.
    pub fn with_signing_key(store: Box<dyn AuditStore>, signing_key: SigningKey) -> Self {
        let public_key_jwk = export_public_key_jwk(signing_key.verifying_key());
        Self {
            store,
            signing_key,
            public_key_jwk,
            rules: RwLock::new(default_rules()),
            holds: HoldBook::new(),
            detector: Mutex::new(SuspiciousActivityDetector::new()),
            sink: None,
        }
    }

    /// Attach an event sink.
    pub fn with_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Public half of the signing keypair, for external verification.
    pub fn public_key_jwk(&self) -> &Value {
        &self.public_key_jwk
    }

    /// Register an additional compliance rule.
    pub fn add_rule(&self, rule: ComplianceRule) {
        self.rules.write().push(rule);
    }

    /// Log a custody event. See module docs for the pipeline.
    pub fn log_event(
        &self,
        event_type: AuditEventType,
        action: &str,
        details: Map<String, Value>,
        actor: &Actor,
        resource: &ResourceRef,
        severity: Severity,
    ) -> Result<AuditEvent> {
        self.log_inner(event_type, action, details, actor, resource, severity, false)
    }

    #[allow(clippy::too_many_arguments)]
    fn log_inner(
        &self,
        event_type: AuditEventType,
        action: &str,
        details: Map<String, Value>,
        actor: &Actor,
        resource: &ResourceRef,
        severity: Severity,
        derived: bool,
    ) -> Result<AuditEvent> {
        let mut event = AuditEvent {
            event_id: format!("audit_{}", Uuid::new_v4().simple()),
            event_type,
            timestamp: Utc::now(),
            user_id: actor.user_id.clone(),
            username: actor.username.clone(),
            ip_address: actor.ip_address.clone(),
            user_agent: actor.user_agent.clone(),
            session_id: actor.session_id.clone(),
            case_id: resource.case_id.clone(),
            resource_id: resource.resource_id.clone(),
            action: action.to_string(),
            details,
            severity,
            checksum: String::new(),
            digital_signature: None,
        };
        event.checksum = event.compute_checksum()?;
        event.digital_signature = Some(hex::encode(sign(&self.signing_key, event.checksum.as_bytes())?));

        // Derived events skip evaluation: one recursion level, never more.
        if !derived {
            let score = self.detector.lock().analyze(&event);
            if score >= SUSPICION_THRESHOLD {
                self.log_suspicious(&event, score)?;
            }
            self.apply_rules(&event)?;
        }

        self.store.append(&event)?;

        if let Some(sink) = &self.sink {
            if let Err(reason) = sink.ship(&event) {
                warn!(event_id = %event.event_id, %reason, "event sink failed");
            }
        }

        info!(
            event_id = %event.event_id,
            event_type = event.event_type.as_str(),
            severity = event.severity.as_str(),
            "audit event logged"
        );
        Ok(event)
    }

    fn log_suspicious(&self, trigger: &AuditEvent, score: f64) -> Result<()> {
        let mut details = Map::new();
        details.insert(
            "original_event_type".into(),
            Value::from(trigger.event_type.as_str()),
        );
        details.insert("original_event_id".into(), Value::from(trigger.event_id.clone()));
        details.insert("suspicion_score".into(), Value::from(score));

        let actor = Actor {
            user_id: trigger.user_id.clone(),
            username: trigger.username.clone(),
            ip_address: trigger.ip_address.clone(),
            user_agent: trigger.user_agent.clone(),
            session_id: trigger.session_id.clone(),
        };
        let resource = ResourceRef {
            case_id: trigger.case_id.clone(),
            resource_id: trigger.resource_id.clone(),
        };
        self.log_inner(
            AuditEventType::SuspiciousActivity,
            "suspicious_activity_detected",
            details,
            &actor,
            &resource,
            Severity::High,
            true,
        )?;
        Ok(())
    }

    fn apply_rules(&self, event: &AuditEvent) -> Result<()> {
        let matched: Vec<ComplianceRule> = self
            .rules
            .read()
            .iter()
            .filter(|rule| rule.matches(event))
            .cloned()
            .collect();

        for rule in matched {
            let mut details = Map::new();
            details.insert("rule_id".into(), Value::from(rule.rule_id.clone()));
            details.insert("rule_name".into(), Value::from(rule.name.clone()));
            details.insert("violation_details".into(), Value::from(rule.description.clone()));
            details.insert("original_event_id".into(), Value::from(event.event_id.clone()));

            let actor = Actor {
                user_id: event.user_id.clone(),
                ..Actor::default()
            };
            let resource = ResourceRef {
                case_id: event.case_id.clone(),
                resource_id: event.resource_id.clone(),
            };
            self.log_inner(
                AuditEventType::ComplianceViolation,
                "compliance_violation",
                details,
                &actor,
                &resource,
                rule.severity,
                true,
            )?;
        }
        Ok(())
    }

    /// Matching events, timestamp-ascending. Filters are ANDed.
    pub fn get_audit_trail(&self, filter: &TrailFilter) -> Result<Vec<AuditEvent>> {
        self.store.query(filter)
    }

    /// Recompute every event's checksum and re-verify its signature.
    ///
    /// Mismatches become findings in the report; nothing is corrected.
    pub fn verify_audit_integrity(&self, case_id: Option<&str>) -> Result<IntegrityReport> {
        let filter = TrailFilter {
            case_id: case_id.map(String::from),
            ..TrailFilter::default()
        };
        let events = self.store.query(&filter)?;

        let mut report = IntegrityReport {
            total_events: events.len(),
            ..IntegrityReport::default()
        };

        for event in &events {
            let expected = match event.compute_checksum() {
                Ok(checksum) => checksum,
                Err(e) => {
                    report.failed_verifications.push(FailedVerification {
                        event_id: event.event_id.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            if expected != event.checksum {
                error!(event_id = %event.event_id, "audit event checksum mismatch");
                report.tampered_events.push(TamperedEvent {
                    event_id: event.event_id.clone(),
                    timestamp: event.timestamp,
                    reason: TamperReason::ChecksumMismatch {
                        expected_checksum: expected,
                        actual_checksum: event.checksum.clone(),
                    },
                });
                continue;
            }

            let Some(signature_hex) = &event.digital_signature else {
                report.missing_signatures.push(event.event_id.clone());
                continue;
            };
            let valid = hex::decode(signature_hex)
                .map(|sig| verify(&self.public_key_jwk, event.checksum.as_bytes(), &sig))
                .unwrap_or(false);
            if !valid {
                error!(event_id = %event.event_id, "audit event signature invalid");
                report.tampered_events.push(TamperedEvent {
                    event_id: event.event_id.clone(),
                    timestamp: event.timestamp,
                    reason: TamperReason::InvalidSignature,
                });
                continue;
            }

            report.verified_events += 1;
        }

        Ok(report)
    }

    /// Register a legal hold and log it at high severity.
    pub fn create_legal_hold(
        &self,
        case_id: &str,
        description: &str,
        created_by: &str,
        expires_at: Option<DateTime<Utc>>,
        affected_users: Vec<String>,
    ) -> Result<LegalHold> {
        let hold = self
            .holds
            .create(case_id, description, created_by, expires_at, affected_users);

        let mut details = Map::new();
        details.insert("hold_id".into(), Value::from(hold.hold_id.clone()));
        details.insert("description".into(), Value::from(description));
        details.insert(
            "expires_at".into(),
            expires_at.map_or(Value::Null, |t| Value::from(t.to_rfc3339())),
        );
        self.log_event(
            AuditEventType::LegalHoldCreated,
            "legal_hold_created",
            details,
            &Actor::user(created_by),
            &ResourceRef::case(case_id),
            Severity::High,
        )?;
        Ok(hold)
    }

    /// Deactivate a hold and log the release.
    pub fn release_legal_hold(&self, hold_id: &str, released_by: &str) -> Result<()> {
        if !self.holds.release(hold_id) {
            return Err(AuditError::UnknownHold(hold_id.to_string()));
        }
        let mut details = Map::new();
        details.insert("hold_id".into(), Value::from(hold_id));
        self.log_event(
            AuditEventType::LegalHoldReleased,
            "legal_hold_released",
            details,
            &Actor::user(released_by),
            &ResourceRef::default(),
            Severity::Medium,
        )?;
        Ok(())
    }

    /// Whether any hold is currently in force for the case.
    pub fn is_hold_active(&self, case_id: &str) -> bool {
        self.holds.is_active_for_case(case_id, Utc::now())
    }

    /// Aggregate a span of the trail for compliance review.
    pub fn generate_compliance_report(
        &self,
        case_id: Option<&str>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<ComplianceReport> {
        let filter = TrailFilter {
            case_id: case_id.map(String::from),
            start,
            end,
            ..TrailFilter::default()
        };
        let events = self.store.query(&filter)?;

        let mut report = ComplianceReport {
            report_id: format!("report_{}", Uuid::new_v4().simple()),
            generated_at: Utc::now(),
            case_id: case_id.map(String::from),
            start,
            end,
            total_events: events.len(),
            events_by_type: Default::default(),
            events_by_severity: Default::default(),
            events_by_user: Default::default(),
            unique_users: Vec::new(),
            unique_cases: Vec::new(),
            data_integrity: self.verify_audit_integrity(case_id)?,
            active_legal_holds: self.holds.active(case_id, Utc::now()),
        };

        for event in &events {
            *report
                .events_by_type
                .entry(event.event_type.as_str().to_string())
                .or_default() += 1;
            *report
                .events_by_severity
                .entry(event.severity.as_str().to_string())
                .or_default() += 1;
            if let Some(user_id) = &event.user_id {
                *report.events_by_user.entry(user_id.clone()).or_default() += 1;
            }
        }
        report.unique_users = report.events_by_user.keys().cloned().collect();
        let mut cases: Vec<String> = events.iter().filter_map(|e| e.case_id.clone()).collect();
        cases.sort();
        cases.dedup();
        report.unique_cases = cases;

        Ok(report)
    }
}

impl custody_store::HoldRegistry for AuditLedger {
    fn is_hold_active(&self, case_id: &str) -> bool {
        AuditLedger::is_hold_active(self, case_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::sqlite::SqliteStore;
    use std::collections::BTreeMap;

    fn ledger() -> AuditLedger {
        AuditLedger::new(Box::new(MemoryStore::new()))
    }

    fn details(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn trail_preserves_append_order() {
        let ledger = ledger();
        let actor = Actor::user("analyst-1");
        let resource = ResourceRef {
            case_id: Some("case-1".into()),
            resource_id: Some("obj-1".into()),
        };
        for action in ["stored", "accessed", "locked"] {
            ledger
                .log_event(
                    AuditEventType::EvidenceAccessed,
                    action,
                    Map::new(),
                    &actor,
                    &resource,
                    Severity::Low,
                )
                .unwrap();
        }

        let trail = ledger
            .get_audit_trail(&TrailFilter::for_case("case-1"))
            .unwrap();
        assert_eq!(trail.len(), 3);
        let actions: Vec<&str> = trail.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, ["stored", "accessed", "locked"]);
    }

    #[test]
    fn events_are_checksummed_and_signed() {
        let ledger = ledger();
        let event = ledger
            .log_event(
                AuditEventType::EvidenceStored,
                "store_evidence",
                Map::new(),
                &Actor::user("analyst-1"),
                &ResourceRef::case("case-1"),
                Severity::Low,
            )
            .unwrap();
        assert_eq!(event.compute_checksum().unwrap(), event.checksum);
        assert!(event.digital_signature.is_some());
    }

    #[test]
    fn clean_trail_verifies() {
        let ledger = ledger();
        for i in 0..5 {
            ledger
                .log_event(
                    AuditEventType::EvidenceAccessed,
                    &format!("access_{}", i),
                    Map::new(),
                    &Actor::user("analyst-1"),
                    &ResourceRef::case("case-1"),
                    Severity::Low,
                )
                .unwrap();
        }
        let report = ledger.verify_audit_integrity(None).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.total_events, 5);
        assert_eq!(report.verified_events, 5);
    }

    #[test]
    fn tampering_one_event_flags_exactly_that_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.db");
        let signing_key = custody_crypto::generate_p256_keypair();

        let target_id;
        {
            let ledger = AuditLedger::with_signing_key(
                Box::new(SqliteStore::open(&path).unwrap()),
                signing_key.clone(),
            );
            for i in 0..3 {
                ledger
                    .log_event(
                        AuditEventType::EvidenceAccessed,
                        &format!("access_{}", i),
                        Map::new(),
                        &Actor::user("analyst-1"),
                        &ResourceRef::case("case-1"),
                        Severity::Low,
                    )
                    .unwrap();
            }
            let trail = ledger
                .get_audit_trail(&TrailFilter::for_case("case-1"))
                .unwrap();
            target_id = trail[1].event_id.clone();
        }

        // Alter the second event's details directly in storage.
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            let body: String = conn
                .query_row(
                    "SELECT body FROM audit_events WHERE event_id = ?1",
                    [&target_id],
                    |row| row.get(0),
                )
                .unwrap();
            let mut event: Value = serde_json::from_str(&body).unwrap();
            event["details"]["injected"] = Value::from("tampered");
            conn.execute(
                "UPDATE audit_events SET body = ?1 WHERE event_id = ?2",
                rusqlite::params![serde_json::to_string(&event).unwrap(), target_id],
            )
            .unwrap();
        }

        let ledger = AuditLedger::with_signing_key(
            Box::new(SqliteStore::open(&path).unwrap()),
            signing_key,
        );
        let report = ledger.verify_audit_integrity(Some("case-1")).unwrap();
        assert_eq!(report.total_events, 3);
        assert_eq!(report.verified_events, 2);
        assert_eq!(report.tampered_events.len(), 1);
        assert_eq!(report.tampered_events[0].event_id, target_id);
        assert!(matches!(
            report.tampered_events[0].reason,
            TamperReason::ChecksumMismatch { .. }
        ));
    }

    #[test]
    fn compliance_rule_match_logs_derived_violation() {
        let ledger = ledger();
        ledger
            .log_event(
                AuditEventType::CaseDeleted,
                "delete_case",
                Map::new(),
                &Actor::user("admin-1"),
                &ResourceRef::case("case-1"),
                Severity::Medium,
            )
            .unwrap();

        let violations = ledger
            .get_audit_trail(&TrailFilter {
                event_types: Some(vec![AuditEventType::ComplianceViolation]),
                ..TrailFilter::default()
            })
            .unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].details.get("rule_id").and_then(Value::as_str),
            Some("rule_002")
        );
    }

    #[test]
    fn derived_events_do_not_recurse() {
        let ledger = ledger();
        // A rule that would match the derived violation itself, were derived
        // events evaluated.
        ledger.add_rule(ComplianceRule {
            rule_id: "rule_loop".into(),
            name: "Violation watcher".into(),
            description: "matches every compliance violation".into(),
            event_types: vec![AuditEventType::ComplianceViolation],
            conditions: BTreeMap::new(),
            severity: Severity::Critical,
            enabled: true,
        });

        ledger
            .log_event(
                AuditEventType::CaseDeleted,
                "delete_case",
                Map::new(),
                &Actor::user("admin-1"),
                &ResourceRef::case("case-1"),
                Severity::Medium,
            )
            .unwrap();

        let violations = ledger
            .get_audit_trail(&TrailFilter {
                event_types: Some(vec![AuditEventType::ComplianceViolation]),
                ..TrailFilter::default()
            })
            .unwrap();
        // Only the first-level derivation exists.
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn burst_from_shared_ip_triggers_suspicious_activity() {
        let ledger = ledger();
        let resource = ResourceRef::case("case-1");

        // Three other users on the same address within the hour.
        for user in ["b", "c", "d"] {
            let actor = Actor {
                user_id: Some(user.into()),
                ip_address: Some("203.0.113.9".into()),
                ..Actor::default()
            };
            ledger
                .log_event(
                    AuditEventType::EvidenceAccessed,
                    "access",
                    Map::new(),
                    &actor,
                    &resource,
                    Severity::Low,
                )
                .unwrap();
        }

        // Rapid burst of exports by one more user from that address.
        let insider = Actor {
            user_id: Some("insider".into()),
            ip_address: Some("203.0.113.9".into()),
            ..Actor::default()
        };
        for i in 0..25 {
            ledger
                .log_event(
                    AuditEventType::ExportCreated,
                    &format!("export_{}", i),
                    Map::new(),
                    &insider,
                    &resource,
                    Severity::Low,
                )
                .unwrap();
        }

        let suspicious = ledger
            .get_audit_trail(&TrailFilter {
                event_types: Some(vec![AuditEventType::SuspiciousActivity]),
                ..TrailFilter::default()
            })
            .unwrap();
        assert!(!suspicious.is_empty());
        let score = suspicious[0]
            .details
            .get("suspicion_score")
            .and_then(Value::as_f64)
            .unwrap();
        assert!(score >= SUSPICION_THRESHOLD);
        assert_eq!(suspicious[0].severity, Severity::High);
    }

    #[test]
    fn legal_hold_lifecycle_is_logged() {
        let ledger = ledger();
        let hold = ledger
            .create_legal_hold("case-1", "pending litigation", "counsel-1", None, vec![])
            .unwrap();
        assert!(ledger.is_hold_active("case-1"));

        let logged = ledger
            .get_audit_trail(&TrailFilter {
                event_types: Some(vec![AuditEventType::LegalHoldCreated]),
                ..TrailFilter::default()
            })
            .unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].severity, Severity::High);

        ledger.release_legal_hold(&hold.hold_id, "counsel-1").unwrap();
        assert!(!ledger.is_hold_active("case-1"));
        assert!(matches!(
            ledger.release_legal_hold("hold_unknown", "counsel-1"),
            Err(AuditError::UnknownHold(_))
        ));
    }

    #[test]
    fn compliance_report_aggregates() {
        let ledger = ledger();
        for user in ["analyst-1", "analyst-1", "analyst-2"] {
            ledger
                .log_event(
                    AuditEventType::EvidenceStored,
                    "store_evidence",
                    Map::new(),
                    &Actor::user(user),
                    &ResourceRef::case("case-1"),
                    Severity::Low,
                )
                .unwrap();
        }
        ledger
            .create_legal_hold("case-1", "hold", "counsel-1", None, vec![])
            .unwrap();

        let report = ledger
            .generate_compliance_report(Some("case-1"), None, None)
            .unwrap();
        assert_eq!(report.events_by_type.get("evidence_stored"), Some(&3));
        assert_eq!(report.events_by_user.get("analyst-1"), Some(&2));
        assert_eq!(report.active_legal_holds.len(), 1);
        assert!(report.data_integrity.is_clean());
        assert_eq!(report.unique_cases, vec!["case-1".to_string()]);
    }

    struct FailingStore;

    impl AuditStore for FailingStore {
        fn append(&self, _event: &AuditEvent) -> Result<()> {
            Err(AuditError::Storage("disk full".into()))
        }
        fn query(&self, _filter: &TrailFilter) -> Result<Vec<AuditEvent>> {
            Ok(Vec::new())
        }
        fn len(&self) -> Result<usize> {
            Ok(0)
        }
    }

    #[test]
    fn signing_key_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signing.key");
        let first = load_or_generate_signing_key(&path).unwrap();
        let second = load_or_generate_signing_key(&path).unwrap();
        assert_eq!(first.to_bytes(), second.to_bytes());
    }

    #[test]
    fn storage_failure_propagates() {
        let ledger = AuditLedger::new(Box::new(FailingStore));
        let result = ledger.log_event(
            AuditEventType::EvidenceStored,
            "store_evidence",
            Map::new(),
            &Actor::user("analyst-1"),
            &ResourceRef::case("case-1"),
            Severity::Low,
        );
        assert!(matches!(result, Err(AuditError::Storage(_))));
    }

    struct FailingSink;

    impl EventSink for FailingSink {
        fn ship(&self, _event: &AuditEvent) -> std::result::Result<(), String> {
            Err("siem unreachable".into())
        }
    }

    #[test]
    fn sink_failures_are_swallowed() {
        let ledger = AuditLedger::new(Box::new(MemoryStore::new()))
            .with_sink(Box::new(FailingSink));
        // Sink failure must not fail the write.
        ledger
            .log_event(
                AuditEventType::EvidenceStored,
                "store_evidence",
                Map::new(),
                &Actor::user("analyst-1"),
                &ResourceRef::case("case-1"),
                Severity::Low,
            )
            .unwrap();
        assert_eq!(
            ledger
                .get_audit_trail(&TrailFilter::default())
                .unwrap()
                .len(),
            1
        );
    }
}
