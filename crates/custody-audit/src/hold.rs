//! Legal hold registry.
//!
//! While a hold is active for a case, deletion and export of that case's
//! objects must be refused regardless of WORM state. The content store
//! consults this registry through its `HoldRegistry` trait.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegalHold {
    pub hold_id: String,
    pub case_id: String,
    pub description: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub affected_users: Vec<String>,
}

impl LegalHold {
    /// Active and not past expiry at `now`.
    pub fn in_force(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|exp| exp > now)
    }
}

/// In-process book of holds.
#[derive(Default)]
pub struct HoldBook {
    holds: RwLock<Vec<LegalHold>>,
}

impl HoldBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &self,
        case_id: &str,
        description: &str,
        created_by: &str,
        expires_at: Option<DateTime<Utc>>,
        affected_users: Vec<String>,
    ) -> LegalHold {
        let hold = LegalHold {
            hold_id: format!("hold_{}", Uuid::new_v4().simple()),
            case_id: case_id.to_string(),
            description: description.to_string(),
            created_by: created_by.to_string(),
            created_at: Utc::now(),
            expires_at,
            is_active: true,
            affected_users,
        };
        self.holds.write().push(hold.clone());
        hold
    }

    /// Deactivate a hold. Returns false if the id is unknown.
    pub fn release(&self, hold_id: &str) -> bool {
        let mut holds = self.holds.write();
        match holds.iter_mut().find(|h| h.hold_id == hold_id) {
            Some(hold) => {
                hold.is_active = false;
                true
            }
            None => false,
        }
    }

    pub fn is_active_for_case(&self, case_id: &str, now: DateTime<Utc>) -> bool {
        self.holds
            .read()
            .iter()
            .any(|h| h.case_id == case_id && h.in_force(now))
    }

    /// Holds currently in force, optionally narrowed to one case.
    pub fn active(&self, case_id: Option<&str>, now: DateTime<Utc>) -> Vec<LegalHold> {
        self.holds
            .read()
            .iter()
            .filter(|h| h.in_force(now))
            .filter(|h| case_id.is_none_or(|c| h.case_id == c))
            .cloned()
            .collect()
    }
}
