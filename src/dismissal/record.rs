//! On-disk shape of one dismissed/snoozed recommendation (spec.md §3.6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::recommendation::{LastKnown, RecommendationStatus};

/// One historical transition (`{Action, Reason, Timestamp, ExpiresAt?}` per
/// spec.md §3.6 `History`), appended on every dismiss/snooze/restore so a
/// record's provenance survives repeated cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A single recommendation's dismissal state, keyed in the store by its
/// `recommendation_id` (spec.md §3.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DismissalRecord {
    pub recommendation_id: String,
    pub status: RecommendationStatus,

    /// Categorical justification tag (e.g. `"already-optimized"`,
    /// `"accepted-risk"`); open vocabulary, not spec-enumerated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Free-form justification supplementing `reason`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_reason: Option<String>,

    pub dismissed_at: DateTime<Utc>,
    /// Set only when `status == Snoozed`; the recommendation becomes active
    /// again once `Utc::now() >= expires_at`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Snapshot of the recommendation at dismissal time, shown even after
    /// the plugin stops returning it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_known: Option<LastKnown>,

    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl DismissalRecord {
    pub fn dismiss(
        recommendation_id: impl Into<String>,
        reason: Option<String>,
        custom_reason: Option<String>,
        last_known: Option<LastKnown>,
        now: DateTime<Utc>,
    ) -> Self {
        DismissalRecord {
            recommendation_id: recommendation_id.into(),
            status: RecommendationStatus::Dismissed,
            reason: reason.clone(),
            custom_reason,
            dismissed_at: now,
            expires_at: None,
            last_known,
            history: vec![HistoryEntry {
                action: "dismissed".to_string(),
                reason,
                timestamp: now,
                expires_at: None,
            }],
        }
    }

    pub fn snooze(
        recommendation_id: impl Into<String>,
        until: DateTime<Utc>,
        reason: Option<String>,
        last_known: Option<LastKnown>,
        now: DateTime<Utc>,
    ) -> Self {
        DismissalRecord {
            recommendation_id: recommendation_id.into(),
            status: RecommendationStatus::Snoozed,
            reason: reason.clone(),
            custom_reason: None,
            dismissed_at: now,
            expires_at: Some(until),
            last_known,
            history: vec![HistoryEntry {
                action: "snoozed".to_string(),
                reason,
                timestamp: now,
                expires_at: Some(until),
            }],
        }
    }

    /// True when this record should still suppress the recommendation at
    /// time `now` — an expired snooze no longer counts (spec.md §4.6
    /// `GetDismissedIDs`).
    pub fn is_excluded(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            RecommendationStatus::Dismissed => true,
            RecommendationStatus::Snoozed => self.expires_at.map(|e| now < e).unwrap_or(false),
            RecommendationStatus::Active => false,
        }
    }

    /// Transition an expired snooze back to `active`, appending an
    /// `undismissed` history entry, preserving the record for audit (spec.md
    /// §4.6 `CleanExpiredSnoozes`). No-op for records that are not an
    /// expired snooze.
    pub fn restore_if_expired(&mut self, now: DateTime<Utc>) -> bool {
        let expired = matches!(self.status, RecommendationStatus::Snoozed)
            && self.expires_at.map(|e| now >= e).unwrap_or(false);
        if !expired {
            return false;
        }
        self.status = RecommendationStatus::Active;
        self.expires_at = None;
        self.history.push(HistoryEntry {
            action: "undismissed".to_string(),
            reason: None,
            timestamp: now,
            expires_at: None,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn dismissed_record_is_always_excluded() {
        let now = Utc::now();
        let r = DismissalRecord::dismiss("rec1", None, None, None, now);
        assert!(r.is_excluded(now + Duration::days(365)));
    }

    #[test]
    fn expired_snooze_is_not_excluded() {
        let now = Utc::now();
        let r = DismissalRecord::snooze("rec1", now - Duration::seconds(1), None, None, now - Duration::days(1));
        assert!(!r.is_excluded(now));
    }

    #[test]
    fn unexpired_snooze_is_excluded() {
        let now = Utc::now();
        let r = DismissalRecord::snooze("rec1", now + Duration::days(1), None, None, now);
        assert!(r.is_excluded(now));
    }

    #[test]
    fn restore_if_expired_transitions_and_records_history() {
        let now = Utc::now();
        let mut r = DismissalRecord::snooze("rec1", now - Duration::hours(1), None, None, now - Duration::days(1));
        assert!(r.restore_if_expired(now));
        assert_eq!(r.status, RecommendationStatus::Active);
        assert!(r.expires_at.is_none());
        assert_eq!(r.history.len(), 2);
        assert_eq!(r.history.last().unwrap().action, "undismissed");
        assert!(!r.is_excluded(now));
    }

    #[test]
    fn restore_if_expired_is_noop_for_dismissed() {
        let now = Utc::now();
        let mut r = DismissalRecord::dismiss("rec1", None, None, None, now);
        assert!(!r.restore_if_expired(now));
        assert_eq!(r.history.len(), 1);
    }
}
