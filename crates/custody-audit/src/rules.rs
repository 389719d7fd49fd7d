//! Compliance rules evaluated against every logged event.
//!
//! A rule matches when the event's type is in the rule's set and every
//! condition field equals the expected value. Condition keys name either a
//! top-level event field (`action`, `user_id`, `case_id`, `severity`) or an
//! entry in the event's details map.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::event::{AuditEvent, AuditEventType, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceRule {
    pub rule_id: String,
    pub name: String,
    pub description: String,
    pub event_types: Vec<AuditEventType>,
    pub conditions: BTreeMap<String, Value>,
    pub severity: Severity,
    pub enabled: bool,
}

impl ComplianceRule {
    /// Whether this rule matches the event.
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if !self.enabled || !self.event_types.contains(&event.event_type) {
            return false;
        }
        self.conditions.iter().all(|(field, expected)| {
            match field.as_str() {
                "action" => Value::String(event.action.clone()) == *expected,
                "user_id" => match &event.user_id {
                    Some(id) => Value::String(id.clone()) == *expected,
                    None => expected.is_null(),
                },
                "case_id" => match &event.case_id {
                    Some(id) => Value::String(id.clone()) == *expected,
                    None => expected.is_null(),
                },
                "severity" => Value::String(event.severity.as_str().to_string()) == *expected,
                _ => event.details.get(field) == Some(expected),
            }
        })
    }
}

/// Rules every ledger starts with. Callers can add their own.
pub fn default_rules() -> Vec<ComplianceRule> {
    vec![
        ComplianceRule {
            rule_id: "rule_001".into(),
            name: "Large export".into(),
            description: "A large volume of case material was exported".into(),
            event_types: vec![AuditEventType::ExportCreated],
            conditions: BTreeMap::from([("export_size".to_string(), Value::from("large"))]),
            severity: Severity::High,
            enabled: true,
        },
        ComplianceRule {
            rule_id: "rule_002".into(),
            name: "Case deletion".into(),
            description: "An entire case was deleted".into(),
            event_types: vec![AuditEventType::CaseDeleted],
            conditions: BTreeMap::new(),
            severity: Severity::High,
            enabled: true,
        },
        ComplianceRule {
            rule_id: "rule_003".into(),
            name: "Failed decryption".into(),
            description: "Evidence decryption was attempted and failed".into(),
            event_types: vec![AuditEventType::EvidenceDecrypted],
            conditions: BTreeMap::from([("outcome".to_string(), Value::from("failure"))]),
            severity: Severity::Medium,
            enabled: true,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::Map;

    fn event(event_type: AuditEventType, action: &str) -> AuditEvent {
        AuditEvent {
            event_id: "audit_test".into(),
            event_type,
            timestamp: Utc::now(),
            user_id: Some("analyst-1".into()),
            username: None,
            ip_address: None,
            user_agent: None,
            session_id: None,
            case_id: Some("case-1".into()),
            resource_id: None,
            action: action.into(),
            details: Map::new(),
            severity: Severity::Low,
            checksum: String::new(),
            digital_signature: None,
        }
    }

    #[test]
    fn matches_on_type_and_condition() {
        let rules = default_rules();
        let large_export = &rules[0];

        let mut e = event(AuditEventType::ExportCreated, "export");
        assert!(!large_export.matches(&e));

        e.details.insert("export_size".into(), Value::from("large"));
        assert!(large_export.matches(&e));
    }

    #[test]
    fn empty_conditions_match_any_event_of_type() {
        let rules = default_rules();
        let case_deletion = &rules[1];
        assert!(case_deletion.matches(&event(AuditEventType::CaseDeleted, "delete_case")));
        assert!(!case_deletion.matches(&event(AuditEventType::EvidenceStored, "store")));
    }

    #[test]
    fn disabled_rule_never_matches() {
        let mut rule = default_rules().remove(1);
        rule.enabled = false;
        assert!(!rule.matches(&event(AuditEventType::CaseDeleted, "delete_case")));
    }

    #[test]
    fn top_level_field_conditions() {
        let rule = ComplianceRule {
            rule_id: "rule_x".into(),
            name: "Specific actor".into(),
            description: "".into(),
            event_types: vec![AuditEventType::EvidenceAccessed],
            conditions: BTreeMap::from([
                ("user_id".to_string(), Value::from("analyst-1")),
                ("action".to_string(), Value::from("peek")),
            ]),
            severity: Severity::Low,
            enabled: true,
        };
        assert!(rule.matches(&event(AuditEventType::EvidenceAccessed, "peek")));
        assert!(!rule.matches(&event(AuditEventType::EvidenceAccessed, "other")));
    }
}
