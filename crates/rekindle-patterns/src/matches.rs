use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rekindle_domain::Severity;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Lifecycle of one recovery attempt for a `(resource, pattern)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStatus {
    Detected,
    Queued,
    InProgress,
    Succeeded,
    Failed,
    RetryExhausted,
    ManualIntervention,
    Escalated,
    Suppressed,
}

impl std::fmt::Display for RecoveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecoveryStatus::Detected => "detected",
            RecoveryStatus::Queued => "queued",
            RecoveryStatus::InProgress => "in_progress",
            RecoveryStatus::Succeeded => "succeeded",
            RecoveryStatus::Failed => "failed",
            RecoveryStatus::RetryExhausted => "retry_exhausted",
            RecoveryStatus::ManualIntervention => "manual_intervention",
            RecoveryStatus::Escalated => "escalated",
            RecoveryStatus::Suppressed => "suppressed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryAttempt {
    pub ts: DateTime<Utc>,
    pub action: String,
    pub result: String,
}

/// A detected error pattern on a resource, tracked across occurrences and
/// recovery attempts until the retention window expires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternMatch {
    pub pattern_name: String,
    pub resource_key: String,
    pub severity: Severity,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub occurrence_count: u32,
    pub event_message: String,
    pub recovery_action: String,
    pub retry_count: u32,
    pub max_retries: u32,
    pub status: RecoveryStatus,
    pub confidence: f64,
    pub correlation_id: Uuid,
    pub escalation_level: u32,
    pub recovery_history: Vec<RecoveryAttempt>,
    pub related_patterns: Vec<String>,
}

impl PatternMatch {
    pub fn update_occurrence(&mut self, message: &str, confidence: f64, now: DateTime<Utc>) {
        self.last_seen = now;
        self.occurrence_count += 1;
        self.event_message = message.to_string();
        self.confidence = self.confidence.max(confidence);
    }

    pub fn add_attempt(&mut self, action: &str, result: &str, now: DateTime<Utc>) {
        self.recovery_history.push(RecoveryAttempt {
            ts: now,
            action: action.to_string(),
            result: result.to_string(),
        });
    }

    /// Escalation gate: retries spent, the failure keeps recurring, or it is
    /// a severe pattern matched with high confidence.
    pub fn should_escalate(&self) -> bool {
        self.retry_count >= self.max_retries
            || self.occurrence_count > 10
            || (self.severity >= Severity::High && self.confidence > 0.8)
    }
}

/// The in-memory recovery-state map, keyed by `(resource, pattern)`.
///
/// Not persisted: after a restart the map repopulates from the event stream
/// and the periodic stuck scan.
#[derive(Debug, Default)]
pub struct RecoveryState {
    entries: HashMap<(String, String), PatternMatch>,
}

impl RecoveryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, resource_key: &str, pattern_name: &str) -> Option<&PatternMatch> {
        self.entries
            .get(&(resource_key.to_string(), pattern_name.to_string()))
    }

    pub fn get_mut(&mut self, resource_key: &str, pattern_name: &str) -> Option<&mut PatternMatch> {
        self.entries
            .get_mut(&(resource_key.to_string(), pattern_name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PatternMatch> {
        self.entries.values()
    }

    /// Record a match occurrence, creating the entry on first detection.
    pub fn record(
        &mut self,
        resource_key: &str,
        pattern_name: &str,
        severity: Severity,
        recovery_action: &str,
        max_retries: u32,
        message: &str,
        confidence: f64,
        related_patterns: Vec<String>,
        now: DateTime<Utc>,
    ) -> &mut PatternMatch {
        let key = (resource_key.to_string(), pattern_name.to_string());
        let entry = self.entries.entry(key).or_insert_with(|| {
            debug!(resource = resource_key, pattern = pattern_name, "new pattern match");
            PatternMatch {
                pattern_name: pattern_name.to_string(),
                resource_key: resource_key.to_string(),
                severity,
                first_seen: now,
                last_seen: now,
                occurrence_count: 0,
                event_message: message.to_string(),
                recovery_action: recovery_action.to_string(),
                retry_count: 0,
                max_retries,
                status: RecoveryStatus::Detected,
                confidence: 0.0,
                correlation_id: Uuid::new_v4(),
                escalation_level: 0,
                recovery_history: Vec::new(),
                related_patterns: Vec::new(),
            }
        });
        entry.update_occurrence(message, confidence, now);
        for related in related_patterns {
            if !entry.related_patterns.contains(&related) {
                entry.related_patterns.push(related);
            }
        }
        entry
    }

    /// Number of tracked matches for a resource seen within a window. Feeds
    /// the `min_occurrences` pattern condition.
    pub fn occurrences_within(
        &self,
        resource_key: &str,
        window_seconds: u64,
        now: DateTime<Utc>,
    ) -> u32 {
        self.entries
            .values()
            .filter(|m| m.resource_key == resource_key)
            .filter(|m| now - m.last_seen <= Duration::seconds(window_seconds as i64))
            .map(|m| m.occurrence_count)
            .sum()
    }

    /// Distinct patterns recently matched against a resource. Feeds the
    /// contextual matching strategy.
    pub fn recent_match_count(&self, resource_key: &str, now: DateTime<Utc>) -> usize {
        self.entries
            .values()
            .filter(|m| m.resource_key == resource_key)
            .filter(|m| now - m.last_seen <= Duration::hours(24))
            .count()
    }

    /// Drop entries whose `last_seen` is older than the retention window.
    /// Returns how many were removed.
    pub fn gc(&mut self, retention_hours: i64, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::hours(retention_hours);
        let before = self.entries.len();
        self.entries.retain(|_, m| m.last_seen >= cutoff);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, "garbage-collected recovery state entries");
        }
        removed
    }

    /// Status histogram for metrics reporting.
    pub fn counts_by_status(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for m in self.entries.values() {
            *counts.entry(m.status.to_string()).or_insert(0) += 1;
        }
        counts
    }
}
