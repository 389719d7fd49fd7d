//! Suspicious-activity scoring over sliding windows.
//!
//! Scores are additive and capped at 1.0:
//! - +0.3  more than 20 actions by one user in the trailing 5 minutes
//! - +0.2  activity outside 06:00–22:00 UTC
//! - +0.4  more than 3 distinct users acting from one IP in the trailing hour
//! - +0.2  high-privilege event types
//! - +0.3  bulk upload (more than 10 files in one event)
//!
//! Windows are measured relative to the analyzed event's timestamp, so
//! replaying a fixed event sequence always yields the same scores. A missed
//! increment only weakens detection; the ledger guards this state with a
//! mutex so concurrent logging cannot corrupt it.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Duration, Timelike, Utc};

use crate::event::AuditEvent;

/// Score at or above which a derived `suspicious_activity` event is logged.
pub const SUSPICION_THRESHOLD: f64 = 0.7;

const RAPID_ACTION_LIMIT: usize = 20;
const SHARED_IP_USER_LIMIT: usize = 3;
const BULK_UPLOAD_LIMIT: u64 = 10;
const BUSINESS_HOURS: std::ops::Range<u32> = 6..22;

fn rapid_action_window() -> Duration {
    Duration::minutes(5)
}

fn shared_ip_window() -> Duration {
    Duration::hours(1)
}

#[derive(Default)]
pub struct SuspiciousActivityDetector {
    user_history: HashMap<String, VecDeque<DateTime<Utc>>>,
    ip_history: HashMap<String, VecDeque<(DateTime<Utc>, Option<String>)>>,
}

impl SuspiciousActivityDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event and return its suspicion score in [0.0, 1.0].
    pub fn analyze(&mut self, event: &AuditEvent) -> f64 {
        let mut score = 0.0;

        if let Some(user_id) = &event.user_id {
            let history = self.user_history.entry(user_id.clone()).or_default();
            history.push_back(event.timestamp);
            prune(history, event.timestamp - shared_ip_window());

            score += self.rapid_actions(user_id, event.timestamp);
            score += off_hours(event.timestamp);
        }

        if let Some(ip) = &event.ip_address {
            let history = self.ip_history.entry(ip.clone()).or_default();
            history.push_back((event.timestamp, event.user_id.clone()));
            while history
                .front()
                .is_some_and(|(t, _)| *t < event.timestamp - shared_ip_window())
            {
                history.pop_front();
            }

            score += self.shared_ip(ip, event.timestamp);
        }

        if event.event_type.is_high_privilege() {
            score += 0.2;
        }

        score += bulk_upload(event);

        score.min(1.0)
    }

    fn rapid_actions(&self, user_id: &str, now: DateTime<Utc>) -> f64 {
        let Some(history) = self.user_history.get(user_id) else {
            return 0.0;
        };
        let recent = history
            .iter()
            .filter(|t| now - **t < rapid_action_window())
            .count();
        if recent > RAPID_ACTION_LIMIT {
            0.3
        } else {
            0.0
        }
    }

    fn shared_ip(&self, ip: &str, now: DateTime<Utc>) -> f64 {
        let Some(history) = self.ip_history.get(ip) else {
            return 0.0;
        };
        let users: HashSet<&str> = history
            .iter()
            .filter(|(t, _)| now - *t < shared_ip_window())
            .filter_map(|(_, user)| user.as_deref())
            .collect();
        if users.len() > SHARED_IP_USER_LIMIT {
            0.4
        } else {
            0.0
        }
    }
}

fn off_hours(timestamp: DateTime<Utc>) -> f64 {
    if BUSINESS_HOURS.contains(&timestamp.hour()) {
        0.0
    } else {
        0.2
    }
}

fn bulk_upload(event: &AuditEvent) -> f64 {
    if event.event_type == crate::event::AuditEventType::EvidenceStored {
        let file_count = event
            .details
            .get("file_count")
            .and_then(|v| v.as_u64())
            .unwrap_or(1);
        if file_count > BULK_UPLOAD_LIMIT {
            return 0.3;
        }
    }
    0.0
}

fn prune(history: &mut VecDeque<DateTime<Utc>>, cutoff: DateTime<Utc>) {
    while history.front().is_some_and(|t| *t < cutoff) {
        history.pop_front();
    }
}
