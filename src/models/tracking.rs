use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Accumulated dwell time for one tracked domain.
///
/// `total_seconds` only grows while `blocked == false`; it is zeroed (and
/// `blocked` cleared) on successful quiz completion or an explicit user reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainTimeRecord {
    pub total_seconds: f64,
    pub last_active: DateTime<Utc>,
    pub blocked: bool,
}

impl DomainTimeRecord {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            total_seconds: 0.0,
            last_active: now,
            blocked: false,
        }
    }
}

/// The whole persisted time-tracking blob, keyed by domain. Always read and
/// written as one unit so a writer never clobbers other domains with a stale
/// partial snapshot.
pub type TimeTrackingMap = HashMap<String, DomainTimeRecord>;
