//! Pluggable append-only persistence for audit events.

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::event::{AuditEvent, AuditEventType};

/// Filters for trail queries. All present filters are ANDed.
#[derive(Debug, Clone, Default)]
pub struct TrailFilter {
    pub case_id: Option<String>,
    pub user_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub event_types: Option<Vec<AuditEventType>>,
}

impl TrailFilter {
    pub fn for_case(case_id: impl Into<String>) -> Self {
        Self {
            case_id: Some(case_id.into()),
            ..Self::default()
        }
    }

    /// Whether an event passes every present filter.
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(case_id) = &self.case_id {
            if event.case_id.as_deref() != Some(case_id.as_str()) {
                return false;
            }
        }
        if let Some(user_id) = &self.user_id {
            if event.user_id.as_deref() != Some(user_id.as_str()) {
                return false;
            }
        }
        if let Some(start) = self.start {
            if event.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if event.timestamp > end {
                return false;
            }
        }
        if let Some(types) = &self.event_types {
            if !types.contains(&event.event_type) {
                return false;
            }
        }
        true
    }
}

/// Append-only event storage.
///
/// `append` must be durable before it returns; an unpersisted custody event
/// is a compliance failure, so storage errors always propagate.
pub trait AuditStore: Send + Sync {
    fn append(&self, event: &AuditEvent) -> Result<()>;

    /// Matching events, timestamp-ascending.
    fn query(&self, filter: &TrailFilter) -> Result<Vec<AuditEvent>>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
