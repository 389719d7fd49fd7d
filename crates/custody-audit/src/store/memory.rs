//! In-memory audit store, for tests and ephemeral deployments.

use parking_lot::Mutex;

use crate::error::Result;
use crate::event::AuditEvent;

use super::{AuditStore, TrailFilter};

#[derive(Default)]
pub struct MemoryStore {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditStore for MemoryStore {
    fn append(&self, event: &AuditEvent) -> Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn query(&self, filter: &TrailFilter) -> Result<Vec<AuditEvent>> {
        let mut out: Vec<AuditEvent> = self
            .events
            .lock()
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        out.sort_by_key(|e| e.timestamp);
        Ok(out)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.events.lock().len())
    }
}
