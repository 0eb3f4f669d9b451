use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use rekindle_domain::{Event, Severity};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::catalog::Pattern;
use crate::correlator::{CorrelationInfo, FrequencyTrend};
use crate::matches::RecoveryState;

const BASE_CONFIDENCE: f64 = 0.6;
const CACHE_CAPACITY: usize = 1000;
/// Fraction of the cache evicted when it overflows.
const CACHE_EVICTION: usize = CACHE_CAPACITY / 10;

/// One pattern that matched an event, with its confidence score.
#[derive(Debug, Clone)]
pub struct PatternHit {
    pub pattern_name: String,
    pub severity: Severity,
    pub recovery_action: String,
    pub max_retries: u32,
    pub description: String,
    pub confidence: f64,
}

/// Classifies events against the pattern catalog.
///
/// Matching runs three strategies in order, short-circuiting on the first
/// hit: the pattern's own regex, built-in keyword families keyed off the
/// pattern name, and contextual rules that look at the involved object and
/// the resource's recent match history.
#[derive(Debug)]
pub struct PatternMatcher {
    patterns: Vec<Pattern>,
    threshold: f64,
    immutable_keywords: Vec<Regex>,
    helm_keywords: Vec<Regex>,
    kustomization_keywords: Vec<Regex>,
    cache: HashMap<(String, String), Vec<PatternHit>>,
    cache_order: VecDeque<(String, String)>,
}

impl PatternMatcher {
    pub fn new(patterns: Vec<Pattern>, threshold: f64) -> Self {
        Self {
            patterns,
            threshold,
            immutable_keywords: keyword_family(&[
                "field is immutable",
                "cannot change",
                "immutable field",
                "selector.*immutable",
                "cannot update.*immutable",
            ]),
            helm_keywords: keyword_family(&[
                "upgrade.*failed",
                "install.*failed",
                "rollback.*failed",
                "retries exhausted",
                "timed out waiting",
                "release.*failed",
            ]),
            kustomization_keywords: keyword_family(&[
                "build failed",
                "not found",
                "invalid.*kustomization",
                "dependency.*failed",
            ]),
            cache: HashMap::new(),
            cache_order: VecDeque::new(),
        }
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Classify one event against every pattern. Hits above the confidence
    /// threshold are returned sorted by descending confidence. Results are
    /// cached by `(reason, message-hash)`.
    pub fn classify(
        &mut self,
        event: &Event,
        correlation: &CorrelationInfo,
        state: &RecoveryState,
        now: DateTime<Utc>,
    ) -> Vec<PatternHit> {
        let cache_key = (event.reason.clone(), short_hash(&event.message));
        if let Some(hits) = self.cache.get(&cache_key) {
            debug!(reason = %event.reason, "pattern cache hit");
            return hits.clone();
        }

        let mut hits: Vec<PatternHit> = Vec::new();
        for pattern in &self.patterns {
            if !self.matches(event, pattern, state, now) {
                continue;
            }
            let confidence = self.confidence(event, pattern, correlation);
            if confidence > self.threshold {
                debug!(
                    pattern = %pattern.name,
                    confidence,
                    "pattern matched"
                );
                hits.push(PatternHit {
                    pattern_name: pattern.name.clone(),
                    severity: pattern.severity,
                    recovery_action: pattern.recovery_action.clone(),
                    max_retries: pattern.max_retries,
                    description: pattern.description.clone(),
                    confidence,
                });
            }
        }

        hits.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.pattern_name.cmp(&b.pattern_name))
        });

        self.cache_insert(cache_key, hits.clone());
        hits
    }

    fn matches(
        &self,
        event: &Event,
        pattern: &Pattern,
        state: &RecoveryState,
        now: DateTime<Utc>,
    ) -> bool {
        // A pattern scoped to specific kinds never matches anything else.
        if !pattern.applies_to.is_empty() {
            match &event.involved {
                Some(obj) if pattern.applies_to.contains(&obj.kind) => {}
                _ => return false,
            }
        }

        let matched = pattern.regex.is_match(&event.message)
            || self.keyword_match(event, pattern)
            || self.contextual_match(event, pattern, state, now);
        if !matched {
            return false;
        }

        self.conditions_hold(event, pattern, state, now)
    }

    fn keyword_match(&self, event: &Event, pattern: &Pattern) -> bool {
        let family = if pattern.name.contains("immutable") {
            &self.immutable_keywords
        } else if pattern.name.contains("helm") {
            &self.helm_keywords
        } else if pattern.name.contains("kustomization") {
            &self.kustomization_keywords
        } else {
            return false;
        };
        family.iter().any(|re| re.is_match(&event.message))
    }

    fn contextual_match(
        &self,
        event: &Event,
        pattern: &Pattern,
        state: &RecoveryState,
        now: DateTime<Utc>,
    ) -> bool {
        // The synthetic stuck-scan event routes to the timeout pattern.
        if event.reason == "ReconciliationStuck" && pattern.name.contains("timeout") {
            return true;
        }

        // Several distinct recent failures on one resource usually mean a
        // reconciliation wedged on a dependency.
        if pattern.name == "dependency-timeout"
            && state.recent_match_count(&event.resource_key(), now) > 2
        {
            return true;
        }

        let Some(obj) = &event.involved else {
            return false;
        };
        let message = event.message.to_lowercase();
        match obj.kind.as_str() {
            "Deployment" => {
                pattern.name == "deployment-selector-conflict"
                    && message.contains("selector")
                    && message.contains("invalid")
            }
            "Service" => {
                pattern.name == "service-selector-conflict"
                    && message.contains("selector")
                    && message.contains("cannot change")
            }
            _ => false,
        }
    }

    fn conditions_hold(
        &self,
        event: &Event,
        pattern: &Pattern,
        state: &RecoveryState,
        now: DateTime<Utc>,
    ) -> bool {
        let conditions = &pattern.conditions;

        if !conditions.event_reason.is_empty() && !conditions.event_reason.contains(&event.reason) {
            return false;
        }
        if !conditions.namespace.is_empty() && !conditions.namespace.contains(&event.namespace) {
            return false;
        }
        if let Some(name_regex) = &conditions.name_regex {
            match &event.involved {
                Some(obj) if name_regex.is_match(&obj.name) => {}
                _ => return false,
            }
        }
        if let Some(min) = &conditions.min_occurrences {
            let seen = state.occurrences_within(&event.resource_key(), min.window_seconds, now);
            if seen < min.count {
                return false;
            }
        }
        true
    }

    /// Confidence for a match that already passed the strategies: base score
    /// plus severity, frequency-trend and critical-namespace boosts, minus a
    /// penalty for chronically frequent (likely noisy) signatures.
    fn confidence(&self, event: &Event, pattern: &Pattern, correlation: &CorrelationInfo) -> f64 {
        let mut confidence = BASE_CONFIDENCE;

        confidence += match pattern.severity {
            Severity::Critical => 0.3,
            Severity::High => 0.2,
            Severity::Medium => 0.1,
            Severity::Low => 0.05,
        };

        if correlation.frequency.trend == FrequencyTrend::Increasing {
            confidence += 0.1;
        } else if correlation.frequency.recent_occurrences > 3 {
            confidence += 0.05;
        }

        if correlation.frequency.total_occurrences > 50 {
            confidence -= 0.1;
        }

        if let Some(id) = event.resource_id() {
            if id.is_critical_namespace() {
                confidence += 0.1;
            }
        }

        confidence.clamp(0.0, 1.0)
    }

    fn cache_insert(&mut self, key: (String, String), hits: Vec<PatternHit>) {
        if self.cache.len() >= CACHE_CAPACITY {
            for _ in 0..CACHE_EVICTION {
                if let Some(oldest) = self.cache_order.pop_front() {
                    self.cache.remove(&oldest);
                }
            }
        }
        self.cache_order.push_back(key.clone());
        self.cache.insert(key, hits);
    }
}

fn keyword_family(expressions: &[&str]) -> Vec<Regex> {
    expressions
        .iter()
        .map(|e| {
            RegexBuilder::new(e)
                .case_insensitive(true)
                .build()
                .expect("built-in keyword regex")
        })
        .collect()
}

fn short_hash(message: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(message.as_bytes()));
    digest[..8].to_string()
}
