pub mod detector;
pub mod error;
pub mod event;
pub mod hold;
pub mod ledger;
pub mod report;
pub mod rules;
pub mod store;

pub use detector::{SuspiciousActivityDetector, SUSPICION_THRESHOLD};
pub use error::{AuditError, Result};
pub use event::{Actor, AuditEvent, AuditEventType, ResourceRef, Severity};
pub use hold::LegalHold;
pub use ledger::{load_or_generate_signing_key, AuditLedger, EventSink};
pub use report::{ComplianceReport, IntegrityReport, TamperReason, TamperedEvent};
pub use rules::{default_rules, ComplianceRule};
pub use store::{memory::MemoryStore, sqlite::SqliteStore, AuditStore, TrailFilter};
