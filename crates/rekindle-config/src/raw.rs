use std::collections::HashMap;

use serde::Deserialize;

/// Raw YAML representation of the recovery pattern catalog file.
///
/// Pattern entries are kept as untyped values so that one malformed entry can
/// be dropped during validation without rejecting the whole document.
#[derive(Debug, Default, Deserialize)]
pub struct RawCatalog {
    #[serde(default)]
    pub patterns: Vec<serde_yaml::Value>,
    #[serde(default)]
    pub recovery_actions: HashMap<String, RawRecoveryAction>,
    #[serde(default)]
    pub settings: RawSettings,
}

#[derive(Debug, Deserialize)]
pub struct RawPattern {
    pub name: String,
    pub error_pattern: String,
    #[serde(default)]
    pub applies_to: Vec<String>,
    pub severity: Option<String>,
    pub recovery_action: String,
    pub max_retries: Option<i64>,
    #[serde(default)]
    pub description: String,
    pub additional_conditions: Option<RawConditions>,
}

#[derive(Debug, Deserialize)]
pub struct RawConditions {
    #[serde(default)]
    pub event_reason: Vec<String>,
    #[serde(default)]
    pub namespace: Vec<String>,
    pub resource_name_pattern: Option<String>,
    pub min_occurrences: Option<RawMinOccurrences>,
}

#[derive(Debug, Deserialize)]
pub struct RawMinOccurrences {
    pub count: u32,
    #[serde(default = "default_time_window")]
    pub time_window: u64,
}

fn default_time_window() -> u64 {
    300
}

#[derive(Debug, Deserialize)]
pub struct RawRecoveryAction {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default = "default_action_timeout")]
    pub timeout: u64,
}

fn default_action_timeout() -> u64 {
    300
}

/// Settings section; absent keys fall back to built-in defaults.
#[derive(Debug, Default, Deserialize)]
pub struct RawSettings {
    pub check_interval: Option<u64>,
    pub stuck_threshold: Option<u64>,
    pub auto_recovery_enabled: Option<bool>,
    pub min_recovery_confidence: Option<f64>,
    pub auto_recovery_severities: Option<Vec<String>>,
    pub max_concurrent_recoveries: Option<usize>,
    pub recovery_cooldown: Option<u64>,
    pub event_correlation_window: Option<u64>,
    pub pattern_match_threshold: Option<f64>,
    pub pattern_history_retention: Option<i64>,
}
