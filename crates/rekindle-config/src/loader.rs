use std::collections::HashMap;
use std::path::Path;

use regex::RegexBuilder;
use rekindle_domain::Severity;
use rekindle_patterns::{
    Catalog, CatalogSettings, Conditions, MinOccurrences, Pattern, RecoveryAction,
};
use tracing::{debug, error, info, warn};

use crate::error::ConfigError;
use crate::raw::{RawCatalog, RawPattern, RawSettings};

const DEFAULT_MAX_RETRIES: u32 = 3;

/// Load and validate the recovery pattern catalog from a YAML file.
///
/// Individual invalid patterns are dropped with a warning; the rest of the
/// catalog still loads. Only unreadable or unparsable files are errors.
pub fn load_catalog(path: &Path) -> Result<Catalog, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let raw: RawCatalog =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
            path: path.display().to_string(),
            source: e,
        })?;

    let mut patterns = Vec::new();
    for (index, value) in raw.patterns.into_iter().enumerate() {
        let raw_pattern: RawPattern = match serde_yaml::from_value(value) {
            Ok(p) => p,
            Err(e) => {
                warn!(index, error = %e, "skipping malformed pattern entry");
                continue;
            }
        };
        match convert_pattern(raw_pattern) {
            Ok(pattern) => patterns.push(pattern),
            Err(reason) => warn!(index, reason = %reason, "skipping invalid pattern"),
        }
    }

    let recovery_actions: HashMap<String, RecoveryAction> = raw
        .recovery_actions
        .into_iter()
        .map(|(name, action)| {
            (
                name,
                RecoveryAction {
                    description: action.description,
                    steps: action.steps,
                    timeout_seconds: action.timeout,
                },
            )
        })
        .collect();

    let settings = convert_settings(raw.settings);

    info!(
        patterns = patterns.len(),
        actions = recovery_actions.len(),
        "loaded recovery pattern catalog"
    );
    debug!(
        auto_recovery = settings.auto_recovery_enabled,
        check_interval = settings.check_interval_seconds,
        stuck_threshold = settings.stuck_threshold_seconds,
        "catalog settings"
    );

    Ok(Catalog::new(patterns, recovery_actions, settings))
}

/// Like [`load_catalog`], but never fails: on any load error the minimal
/// default catalog is returned so the controller can keep running.
pub fn load_catalog_or_default(path: &Path) -> Catalog {
    match load_catalog(path) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!(error = %e, "failed to load pattern catalog, using minimal defaults");
            Catalog::default_minimal()
        }
    }
}

fn convert_pattern(raw: RawPattern) -> Result<Pattern, String> {
    if raw.name.is_empty() {
        return Err("empty pattern name".to_string());
    }

    let mut pattern = Pattern::new(&raw.name, &raw.error_pattern, &raw.recovery_action)
        .map_err(|e| e.to_string())?;

    pattern.applies_to = raw.applies_to;
    pattern.description = raw.description;

    // Unknown severities degrade to medium rather than dropping the pattern.
    pattern.severity = match raw.severity.as_deref() {
        None => Severity::Medium,
        Some(s) => Severity::parse(s).unwrap_or_else(|| {
            warn!(pattern = %raw.name, severity = s, "invalid severity, using medium");
            Severity::Medium
        }),
    };

    pattern.max_retries = match raw.max_retries {
        None => DEFAULT_MAX_RETRIES,
        Some(n) if n >= 0 => n as u32,
        Some(n) => {
            warn!(pattern = %raw.name, max_retries = n, "invalid max_retries, using default");
            DEFAULT_MAX_RETRIES
        }
    };

    if let Some(raw_conditions) = raw.additional_conditions {
        let name_regex = match raw_conditions.resource_name_pattern {
            None => None,
            Some(expr) => Some(
                RegexBuilder::new(&expr)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| format!("invalid resource_name_pattern: {e}"))?,
            ),
        };
        pattern.conditions = Conditions {
            event_reason: raw_conditions.event_reason,
            namespace: raw_conditions.namespace,
            name_regex,
            min_occurrences: raw_conditions.min_occurrences.map(|m| MinOccurrences {
                count: m.count,
                window_seconds: m.time_window,
            }),
        };
    }

    Ok(pattern)
}

fn convert_settings(raw: RawSettings) -> CatalogSettings {
    let defaults = CatalogSettings::default();
    let auto_recovery_severities = match raw.auto_recovery_severities {
        None => defaults.auto_recovery_severities,
        Some(list) => list
            .iter()
            .filter_map(|s| {
                let severity = Severity::parse(s);
                if severity.is_none() {
                    warn!(severity = %s, "ignoring unknown auto-recovery severity");
                }
                severity
            })
            .collect(),
    };

    CatalogSettings {
        check_interval_seconds: raw.check_interval.unwrap_or(defaults.check_interval_seconds),
        stuck_threshold_seconds: raw
            .stuck_threshold
            .unwrap_or(defaults.stuck_threshold_seconds),
        auto_recovery_enabled: raw
            .auto_recovery_enabled
            .unwrap_or(defaults.auto_recovery_enabled),
        min_recovery_confidence: raw
            .min_recovery_confidence
            .unwrap_or(defaults.min_recovery_confidence),
        auto_recovery_severities,
        max_concurrent_recoveries: raw
            .max_concurrent_recoveries
            .unwrap_or(defaults.max_concurrent_recoveries),
        recovery_cooldown_seconds: raw
            .recovery_cooldown
            .unwrap_or(defaults.recovery_cooldown_seconds),
        correlation_window_seconds: raw
            .event_correlation_window
            .unwrap_or(defaults.correlation_window_seconds),
        pattern_match_threshold: raw
            .pattern_match_threshold
            .unwrap_or(defaults.pattern_match_threshold),
        history_retention_hours: raw
            .pattern_history_retention
            .unwrap_or(defaults.history_retention_hours),
    }
}
