use std::path::Path;

use rekindle_config::{load_catalog, load_catalog_or_default};
use rekindle_domain::Severity;

fn fixture() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/recovery-patterns.yaml")
}

#[test]
fn load_valid_fixture() {
    let catalog = load_catalog(&fixture()).expect("should load without error");

    // Two entries are invalid (bad regex, missing recovery_action) and are
    // dropped; the other five survive.
    assert_eq!(catalog.patterns.len(), 5);
    assert!(catalog.pattern("broken-regex").is_none());
    assert!(catalog.pattern("missing-action").is_none());

    let immutable = catalog.pattern("immutable-field-conflict").unwrap();
    assert_eq!(immutable.severity, Severity::High);
    assert_eq!(immutable.max_retries, 2);
    assert_eq!(immutable.applies_to, vec!["Deployment", "Service", "Job"]);
    assert_eq!(
        immutable.conditions.event_reason,
        vec!["ReconciliationFailed", "FailedUpdate"]
    );
    assert!(immutable.regex.is_match("Deployment.spec: Field is IMMUTABLE"));
}

#[test]
fn invalid_severity_and_retries_fall_back() {
    let catalog = load_catalog(&fixture()).unwrap();
    let weird = catalog.pattern("weird-severity").unwrap();
    assert_eq!(weird.severity, Severity::Medium);
    assert_eq!(weird.max_retries, 3);
}

#[test]
fn min_occurrences_condition_parsed() {
    let catalog = load_catalog(&fixture()).unwrap();
    let timeout = catalog.pattern("dependency-timeout").unwrap();
    let min = timeout.conditions.min_occurrences.unwrap();
    assert_eq!(min.count, 2);
    assert_eq!(min.window_seconds, 600);
}

#[test]
fn recovery_actions_loaded() {
    let catalog = load_catalog(&fixture()).unwrap();
    let recreate = catalog.action("recreate-resource").unwrap();
    assert_eq!(recreate.steps.len(), 5);
    assert_eq!(recreate.timeout_seconds, 300);
}

#[test]
fn settings_merge_with_defaults() {
    let catalog = load_catalog(&fixture()).unwrap();
    let settings = &catalog.settings;

    // From the file.
    assert_eq!(settings.check_interval_seconds, 30);
    assert_eq!(settings.stuck_threshold_seconds, 240);
    assert!(settings.auto_recovery_enabled);
    assert_eq!(settings.correlation_window_seconds, 180);
    // Unknown severity entries are dropped.
    assert_eq!(
        settings.auto_recovery_severities,
        vec![Severity::High, Severity::Critical]
    );
    // Defaults for keys the file omits.
    assert_eq!(settings.max_concurrent_recoveries, 3);
    assert_eq!(settings.pattern_match_threshold, 0.5);
    assert_eq!(settings.history_retention_hours, 24);
}

#[test]
fn missing_file_returns_error() {
    let path = Path::new("/nonexistent/recovery-patterns.yaml");
    assert!(load_catalog(path).is_err());
}

#[test]
fn missing_file_falls_back_to_minimal_defaults() {
    let catalog = load_catalog_or_default(Path::new("/nonexistent/recovery-patterns.yaml"));
    assert!(catalog.patterns.is_empty());
    assert!(!catalog.settings.auto_recovery_enabled);
}
