use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rekindle_domain::{ResourceId, Severity};
use rekindle_graph::Impact;
use serde::{Deserialize, Serialize};

/// One batch of a plan phase; its resources may be processed in parallel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanBatch {
    pub batch_number: usize,
    pub resources: Vec<ResourceId>,
    pub parallel_execution: bool,
    pub estimated_duration: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanPhase {
    pub batches: Vec<PlanBatch>,
}

impl PlanPhase {
    pub fn from_batches(batches: Vec<Vec<ResourceId>>, estimated_duration: &str) -> Self {
        Self {
            batches: batches
                .into_iter()
                .enumerate()
                .map(|(i, resources)| PlanBatch {
                    batch_number: i + 1,
                    resources,
                    parallel_execution: true,
                    estimated_duration: estimated_duration.to_string(),
                })
                .collect(),
        }
    }

    pub fn total_batches(&self) -> usize {
        self.batches.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: Severity,
    pub factors: Vec<String>,
    pub mitigation_required: bool,
    pub manual_oversight_recommended: bool,
}

/// The full cleanup-and-recreation plan returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryPlan {
    pub timestamp: DateTime<Utc>,
    pub failed_resources: Vec<ResourceId>,
    /// Per-resource blast radius, keyed by canonical resource string.
    pub impact_analysis: BTreeMap<String, Impact>,
    pub cleanup_plan: PlanPhase,
    pub recreation_plan: PlanPhase,
    pub total_estimated_time: String,
    pub risk_assessment: RiskAssessment,
    pub recommendations: Vec<String>,
}
