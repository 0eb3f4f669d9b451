use std::collections::{BTreeSet, HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use rekindle_domain::{Event, EventType};
use serde::{Deserialize, Serialize};

/// Reconcile outcomes retained per resource.
const HISTORY_CAPACITY: usize = 50;
/// Consecutive failures before a resource counts as wedged.
const STUCK_STREAK: u32 = 3;
const SCORE_FAILURE_STEP: f64 = 0.2;
const SCORE_SUCCESS_STEP: f64 = 0.1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileEntry {
    pub ts: DateTime<Utc>,
    pub success: bool,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
}

/// Rolling health of one resource, fed by its event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceHealth {
    pub resource_key: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub ready: bool,
    pub last_reconcile: Option<DateTime<Utc>>,
    pub last_successful_reconcile: Option<DateTime<Utc>>,
    pub error_count: u64,
    pub last_error: Option<String>,
    pub stuck_since: Option<DateTime<Utc>>,
    pub failure_streak: u32,
    pub health_score: f64,
    pub history: VecDeque<ReconcileEntry>,
    pub error_patterns: BTreeSet<String>,
    pub recovery_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSummary {
    pub resource_key: String,
    pub ready: bool,
    pub health_score: f64,
    pub success_rate: f64,
    pub failure_streak: u32,
    pub is_stuck: bool,
    pub stuck_duration_seconds: i64,
    pub error_patterns: Vec<String>,
    pub recovery_attempts: u32,
}

impl ResourceHealth {
    fn new(resource_key: String, kind: String, namespace: String, name: String) -> Self {
        Self {
            resource_key,
            kind,
            namespace,
            name,
            ready: false,
            last_reconcile: None,
            last_successful_reconcile: None,
            error_count: 0,
            last_error: None,
            stuck_since: None,
            failure_streak: 0,
            health_score: 1.0,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            error_patterns: BTreeSet::new(),
            recovery_attempts: 0,
        }
    }

    /// Record one reconcile outcome.
    pub fn update(
        &mut self,
        success: bool,
        duration_ms: Option<u64>,
        error: Option<&str>,
        now: DateTime<Utc>,
    ) {
        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(ReconcileEntry {
            ts: now,
            success,
            duration_ms,
            error: error.map(String::from),
        });

        if success {
            self.ready = true;
            self.last_successful_reconcile = Some(now);
            self.failure_streak = 0;
            self.stuck_since = None;
            self.health_score = (self.health_score + SCORE_SUCCESS_STEP).min(1.0);
        } else {
            self.ready = false;
            self.error_count += 1;
            self.failure_streak += 1;
            self.last_error = error.map(String::from);
            self.health_score = (self.health_score - SCORE_FAILURE_STEP).max(0.0);
            if self.stuck_since.is_none() && self.failure_streak >= STUCK_STREAK {
                self.stuck_since = Some(now);
            }
        }
        self.last_reconcile = Some(now);
    }

    pub fn is_stuck(&self, threshold_seconds: u64, now: DateTime<Utc>) -> bool {
        match self.stuck_since {
            Some(since) => now - since > Duration::seconds(threshold_seconds as i64),
            None => false,
        }
    }

    pub fn summary(&self, now: DateTime<Utc>) -> HealthSummary {
        let failures = self.history.iter().filter(|e| !e.success).count();
        let success_rate = if self.history.is_empty() {
            0.0
        } else {
            1.0 - failures as f64 / self.history.len() as f64
        };

        HealthSummary {
            resource_key: self.resource_key.clone(),
            ready: self.ready,
            health_score: self.health_score,
            success_rate,
            failure_streak: self.failure_streak,
            is_stuck: self.stuck_since.is_some(),
            stuck_duration_seconds: self
                .stuck_since
                .map(|since| (now - since).num_seconds())
                .unwrap_or(0),
            error_patterns: self.error_patterns.iter().cloned().collect(),
            recovery_attempts: self.recovery_attempts,
        }
    }
}

/// Per-resource health records, keyed by `namespace/kind/name`.
#[derive(Debug, Default)]
pub struct HealthTracker {
    records: HashMap<String, ResourceHealth>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, resource_key: &str) -> Option<&ResourceHealth> {
        self.records.get(resource_key)
    }

    pub fn records(&self) -> impl Iterator<Item = &ResourceHealth> {
        self.records.values()
    }

    /// Fold one event into the health record of its involved object, creating
    /// the record on first sight. Warning events count as failed reconciles.
    pub fn observe_event(&mut self, event: &Event, now: DateTime<Utc>) -> &ResourceHealth {
        let key = event.resource_key();
        let health = self.records.entry(key.clone()).or_insert_with(|| {
            let (kind, namespace, name) = event
                .involved
                .as_ref()
                .map(|o| (o.kind.clone(), o.namespace.clone(), o.name.clone()))
                .unwrap_or_else(|| {
                    ("Unknown".into(), event.namespace.clone(), "unknown".into())
                });
            ResourceHealth::new(key, kind, namespace, name)
        });

        let failed = event.event_type == EventType::Warning;
        health.update(
            !failed,
            None,
            failed.then_some(event.message.as_str()),
            now,
        );
        health
    }

    /// Note a matched error pattern on a resource's record.
    pub fn record_error_pattern(&mut self, resource_key: &str, pattern_name: &str) {
        if let Some(health) = self.records.get_mut(resource_key) {
            health.error_patterns.insert(pattern_name.to_string());
        }
    }

    pub fn record_recovery_attempt(&mut self, resource_key: &str) {
        if let Some(health) = self.records.get_mut(resource_key) {
            health.recovery_attempts += 1;
        }
    }

    /// Resources currently past the stuck threshold.
    pub fn stuck_resources(&self, threshold_seconds: u64, now: DateTime<Utc>) -> Vec<&ResourceHealth> {
        self.records
            .values()
            .filter(|h| h.is_stuck(threshold_seconds, now))
            .collect()
    }
}
