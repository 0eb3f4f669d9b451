use std::collections::HashMap;

use regex::{Regex, RegexBuilder};
use rekindle_domain::Severity;
use serde::{Deserialize, Serialize};

use crate::error::PatternError;

// ── Patterns ──────────────────────────────────────────────────────────────────

/// Extra gates a pattern match must pass after the message matches.
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    /// Acceptable event reasons; empty means any.
    pub event_reason: Vec<String>,
    /// Acceptable namespaces; empty means any.
    pub namespace: Vec<String>,
    /// Regex the involved object's name must match.
    pub name_regex: Option<Regex>,
    /// Minimum occurrence count within a window before the pattern holds.
    pub min_occurrences: Option<MinOccurrences>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinOccurrences {
    pub count: u32,
    pub window_seconds: u64,
}

/// One validated entry of the pattern catalog.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub name: String,
    pub regex: Regex,
    /// Resource kinds this pattern applies to; empty means all kinds.
    pub applies_to: Vec<String>,
    pub severity: Severity,
    pub recovery_action: String,
    pub max_retries: u32,
    pub description: String,
    pub conditions: Conditions,
}

impl Pattern {
    /// Build a pattern, compiling the message regex case-insensitively.
    pub fn new(
        name: impl Into<String>,
        regex: &str,
        recovery_action: impl Into<String>,
    ) -> Result<Self, PatternError> {
        let name = name.into();
        let regex = RegexBuilder::new(regex)
            .case_insensitive(true)
            .build()
            .map_err(|source| PatternError::InvalidRegex {
                name: name.clone(),
                source,
            })?;
        Ok(Self {
            name,
            regex,
            applies_to: Vec::new(),
            severity: Severity::Medium,
            recovery_action: recovery_action.into(),
            max_retries: 3,
            description: String::new(),
            conditions: Conditions::default(),
        })
    }

    pub fn applies_to(mut self, kinds: &[&str]) -> Self {
        self.applies_to = kinds.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = conditions;
        self
    }
}

/// A named recovery procedure referenced by patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryAction {
    pub description: String,
    pub steps: Vec<String>,
    pub timeout_seconds: u64,
}

// ── Settings ──────────────────────────────────────────────────────────────────

/// Controller tunables with their defaults. All thresholds here keep the
/// relative ordering the detection logic relies on; absolute values are
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSettings {
    pub check_interval_seconds: u64,
    pub stuck_threshold_seconds: u64,
    pub auto_recovery_enabled: bool,
    pub min_recovery_confidence: f64,
    pub auto_recovery_severities: Vec<Severity>,
    pub max_concurrent_recoveries: usize,
    pub recovery_cooldown_seconds: u64,
    pub correlation_window_seconds: u64,
    pub pattern_match_threshold: f64,
    pub history_retention_hours: i64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            check_interval_seconds: 60,
            stuck_threshold_seconds: 300,
            auto_recovery_enabled: false,
            min_recovery_confidence: 0.7,
            auto_recovery_severities: vec![Severity::High, Severity::Critical],
            max_concurrent_recoveries: 3,
            recovery_cooldown_seconds: 120,
            correlation_window_seconds: 300,
            pattern_match_threshold: 0.5,
            history_retention_hours: 24,
        }
    }
}

// ── Catalog ───────────────────────────────────────────────────────────────────

/// The validated in-memory pattern catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub patterns: Vec<Pattern>,
    pub recovery_actions: HashMap<String, RecoveryAction>,
    pub settings: CatalogSettings,
}

impl Catalog {
    pub fn new(
        patterns: Vec<Pattern>,
        recovery_actions: HashMap<String, RecoveryAction>,
        settings: CatalogSettings,
    ) -> Self {
        Self {
            patterns,
            recovery_actions,
            settings,
        }
    }

    /// Minimal fallback catalog used when configuration loading fails: no
    /// patterns, no actions, default settings. The controller stays up and
    /// keeps correlating events.
    pub fn default_minimal() -> Self {
        Self::default()
    }

    pub fn pattern(&self, name: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.name == name)
    }

    pub fn action(&self, name: &str) -> Option<&RecoveryAction> {
        self.recovery_actions.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_regex_is_case_insensitive() {
        let pattern = Pattern::new("immutable-field-conflict", "field is immutable", "recreate")
            .unwrap();
        assert!(pattern.regex.is_match("Field Is IMMUTABLE after creation"));
    }

    #[test]
    fn invalid_regex_is_an_error() {
        let result = Pattern::new("broken", "([unclosed", "none");
        assert!(matches!(result, Err(PatternError::InvalidRegex { .. })));
    }

    #[test]
    fn settings_defaults() {
        let settings = CatalogSettings::default();
        assert_eq!(settings.stuck_threshold_seconds, 300);
        assert_eq!(settings.correlation_window_seconds, 300);
        assert_eq!(settings.max_concurrent_recoveries, 3);
        assert!(!settings.auto_recovery_enabled);
    }

    #[test]
    fn minimal_catalog_is_empty_but_usable() {
        let catalog = Catalog::default_minimal();
        assert!(catalog.patterns.is_empty());
        assert!(catalog.pattern("anything").is_none());
    }
}
