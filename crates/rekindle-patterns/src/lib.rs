mod catalog;
mod correlator;
mod error;
mod health;
mod matcher;
mod matches;

pub use catalog::{
    Catalog, CatalogSettings, Conditions, MinOccurrences, Pattern, RecoveryAction,
};
pub use correlator::{
    CorrelationInfo, CorrelatorMetrics, EventCorrelator, FrequencyTrend, PatternFrequency,
};
pub use error::PatternError;
pub use health::{HealthSummary, HealthTracker, ReconcileEntry, ResourceHealth};
pub use matcher::{PatternHit, PatternMatcher};
pub use matches::{PatternMatch, RecoveryAttempt, RecoveryState, RecoveryStatus};
