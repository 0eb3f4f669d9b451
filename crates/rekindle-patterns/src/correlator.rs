use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};
use rekindle_domain::Event;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

const BURST_WINDOW_SECONDS: i64 = 60;
const BURST_MIN_EVENTS: usize = 5;
const NOISE_WINDOW_SECONDS: i64 = 300;
const NOISE_MAX_EVENTS: usize = 20;
const RECENT_RETENTION_SECONDS: i64 = 3600;
const HISTORY_RETENTION_HOURS: i64 = 24;
/// The first few recurrences of a duplicate stay significant.
const DUPLICATE_SIGNIFICANT_COUNT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyTrend {
    New,
    Decreasing,
    Stable,
    Increasing,
}

/// 24-hour frequency summary for one signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternFrequency {
    pub total_occurrences: usize,
    pub recent_occurrences: usize,
    pub trend: FrequencyTrend,
}

/// What the correlator learned about one incoming event.
#[derive(Debug, Clone)]
pub struct CorrelationInfo {
    pub signature: String,
    pub resource_key: String,
    pub is_duplicate: bool,
    pub occurrence_count: u32,
    pub first_seen: DateTime<Utc>,
    pub burst: bool,
    pub suppressed: bool,
    pub frequency: PatternFrequency,
    /// Other signatures recently observed for the same resource.
    pub related_events: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CorrelatorMetrics {
    pub events_seen: u64,
    pub suppressed_events: u64,
    pub noise_signatures: usize,
}

#[derive(Debug)]
struct SignatureState {
    resource_key: String,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    count: u32,
    /// Timestamps within the last hour; drives burst and noise windows.
    recent: VecDeque<DateTime<Utc>>,
    /// Timestamps within the last 24 hours; drives the frequency trend.
    history: VecDeque<DateTime<Utc>>,
}

/// Deduplicates and rates the event stream per signature.
///
/// A signature groups events by reason, namespace, involved object and a
/// short hash of the message, so retries of the same failure collapse into
/// one correlated stream.
#[derive(Debug)]
pub struct EventCorrelator {
    correlation_window: Duration,
    signatures: HashMap<String, SignatureState>,
    noise: HashSet<String>,
    metrics: CorrelatorMetrics,
}

impl EventCorrelator {
    pub fn new(correlation_window_seconds: u64) -> Self {
        Self {
            correlation_window: Duration::seconds(correlation_window_seconds as i64),
            signatures: HashMap::new(),
            noise: HashSet::new(),
            metrics: CorrelatorMetrics::default(),
        }
    }

    pub fn metrics(&self) -> CorrelatorMetrics {
        CorrelatorMetrics {
            noise_signatures: self.noise.len(),
            ..self.metrics
        }
    }

    /// The grouping signature: sha256 over reason, namespace, involved kind
    /// and name, and an 8-hex-char hash of the message.
    pub fn signature_of(event: &Event) -> String {
        let (kind, name) = event
            .involved
            .as_ref()
            .map(|o| (o.kind.as_str(), o.name.as_str()))
            .unwrap_or(("Unknown", "unknown"));
        let message_hash = short_hash(&event.message);
        let joined = format!(
            "{}|{}|{}|{}|{}",
            event.reason, event.namespace, kind, name, message_hash
        );
        format!("{:x}", Sha256::digest(joined.as_bytes()))
    }

    /// Ingest one event at the current time.
    pub fn add_event(&mut self, event: &Event) -> (bool, CorrelationInfo) {
        self.add_event_at(event, Utc::now())
    }

    /// Ingest one event with an explicit timestamp. Returns whether the event
    /// is significant (worth classifying) and what is known about its
    /// signature.
    pub fn add_event_at(&mut self, event: &Event, now: DateTime<Utc>) -> (bool, CorrelationInfo) {
        let signature = Self::signature_of(event);
        let resource_key = event.resource_key();
        self.metrics.events_seen += 1;

        self.prune(now);

        let state = self
            .signatures
            .entry(signature.clone())
            .or_insert_with(|| SignatureState {
                resource_key: resource_key.clone(),
                first_seen: now,
                last_seen: now,
                count: 0,
                recent: VecDeque::new(),
                history: VecDeque::new(),
            });
        state.recent.push_back(now);
        state.history.push_back(now);

        // Noise: sticky suppression once the 5-minute window overflows.
        let in_noise_window = state
            .recent
            .iter()
            .filter(|t| now - **t < Duration::seconds(NOISE_WINDOW_SECONDS))
            .count();
        if self.noise.contains(&signature) || in_noise_window > NOISE_MAX_EVENTS {
            if self.noise.insert(signature.clone()) {
                warn!(signature = %signature, "signature marked as noise");
            }
            self.metrics.suppressed_events += 1;
            let info = self.build_info(&signature, &resource_key, now, true, true);
            return (false, info);
        }

        let state = self.signatures.get_mut(&signature).expect("just inserted");
        let within_window = now - state.last_seen < self.correlation_window && state.count > 0;
        let is_duplicate = within_window;
        if within_window {
            state.count += 1;
            state.last_seen = now;
        } else {
            // New signature, or the previous streak expired.
            state.count = 1;
            state.first_seen = now;
            state.last_seen = now;
        }

        let info = self.build_info(&signature, &resource_key, now, is_duplicate, false);
        let significant = if is_duplicate {
            info.burst || info.occurrence_count <= DUPLICATE_SIGNIFICANT_COUNT
        } else {
            true
        };

        if !significant {
            self.metrics.suppressed_events += 1;
            debug!(signature = %signature, count = info.occurrence_count, "duplicate suppressed");
        }
        (significant, info)
    }

    fn build_info(
        &self,
        signature: &str,
        resource_key: &str,
        now: DateTime<Utc>,
        is_duplicate: bool,
        suppressed: bool,
    ) -> CorrelationInfo {
        let state = &self.signatures[signature];
        let burst = state
            .recent
            .iter()
            .filter(|t| now - **t < Duration::seconds(BURST_WINDOW_SECONDS))
            .count()
            >= BURST_MIN_EVENTS;

        let related_events = self
            .signatures
            .iter()
            .filter(|(sig, st)| sig.as_str() != signature && st.resource_key == resource_key)
            .map(|(sig, _)| sig.clone())
            .collect();

        CorrelationInfo {
            signature: signature.to_string(),
            resource_key: resource_key.to_string(),
            is_duplicate,
            occurrence_count: state.count.max(1),
            first_seen: state.first_seen,
            burst,
            suppressed,
            frequency: frequency_of(state, now),
            related_events,
        }
    }

    /// Drop expired timestamps and forget empty signatures; a noise mark
    /// clears once its window has fully drained.
    fn prune(&mut self, now: DateTime<Utc>) {
        let recent_cutoff = now - Duration::seconds(RECENT_RETENTION_SECONDS);
        let history_cutoff = now - Duration::hours(HISTORY_RETENTION_HOURS);

        self.signatures.retain(|signature, state| {
            while state.recent.front().is_some_and(|t| *t < recent_cutoff) {
                state.recent.pop_front();
            }
            while state.history.front().is_some_and(|t| *t < history_cutoff) {
                state.history.pop_front();
            }
            if state.recent.is_empty() {
                self.noise.remove(signature);
            }
            !state.history.is_empty()
        });
    }
}

fn frequency_of(state: &SignatureState, now: DateTime<Utc>) -> PatternFrequency {
    let total_occurrences = state.history.len();
    let recent_occurrences = state
        .history
        .iter()
        .filter(|t| now - **t < Duration::seconds(RECENT_RETENTION_SECONDS))
        .count();

    let trend = if total_occurrences <= 1 {
        FrequencyTrend::New
    } else if recent_occurrences > 5 {
        FrequencyTrend::Increasing
    } else if recent_occurrences > 2 {
        FrequencyTrend::Stable
    } else {
        FrequencyTrend::Decreasing
    };

    PatternFrequency {
        total_occurrences,
        recent_occurrences,
        trend,
    }
}

fn short_hash(message: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(message.as_bytes()));
    digest[..8].to_string()
}
