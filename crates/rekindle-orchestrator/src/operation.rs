use std::collections::{BTreeSet, HashMap};

use rekindle_domain::{ResourceDoc, ResourceId};
use serde::{Deserialize, Serialize};

/// How a resource is brought to its desired state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateStrategy {
    Rolling,
    Recreate,
    BlueGreen,
    Atomic,
}

impl UpdateStrategy {
    /// Default strategy by resource kind: kinds with immutable spec fields
    /// are recreated, replicated workloads roll, pure data applies
    /// atomically.
    pub fn default_for_kind(kind: &str) -> Self {
        match kind {
            "Service" | "Job" | "Pod" => UpdateStrategy::Recreate,
            "Deployment" | "StatefulSet" | "DaemonSet" => UpdateStrategy::Rolling,
            _ => UpdateStrategy::Atomic,
        }
    }
}

impl std::fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateStrategy::Rolling => write!(f, "rolling"),
            UpdateStrategy::Recreate => write!(f, "recreate"),
            UpdateStrategy::BlueGreen => write!(f, "blue-green"),
            UpdateStrategy::Atomic => write!(f, "atomic"),
        }
    }
}

/// State machine of one operation:
///
/// ```text
/// pending -validate-> ready -execute-> in_progress -+-success-> completed
///                                                   +-failure-> failed
/// completed -(rollback)-> rolled_back
/// failed -(retry while retry_count < max)-> in_progress
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Ready,
    InProgress,
    Completed,
    Failed,
    RolledBack,
    Cancelled,
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Ready => "ready",
            OperationStatus::InProgress => "in_progress",
            OperationStatus::Completed => "completed",
            OperationStatus::Failed => "failed",
            OperationStatus::RolledBack => "rolled_back",
            OperationStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// One resource mutation within a recovery plan.
#[derive(Debug, Clone)]
pub struct UpdateOperation {
    pub resource: ResourceId,
    pub strategy: UpdateStrategy,
    /// Desired manifest to apply; absent for cleanup-only operations.
    pub doc: Option<ResourceDoc>,
    pub dependencies: BTreeSet<ResourceId>,
    pub dependents: BTreeSet<ResourceId>,
    pub status: OperationStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub timeout_seconds: u64,
    pub metadata: HashMap<String, String>,
}

impl UpdateOperation {
    pub fn new(resource: ResourceId, doc: Option<ResourceDoc>) -> Self {
        let strategy = UpdateStrategy::default_for_kind(&resource.kind);
        Self {
            resource,
            strategy,
            doc,
            dependencies: BTreeSet::new(),
            dependents: BTreeSet::new(),
            status: OperationStatus::Pending,
            retry_count: 0,
            max_retries: 3,
            timeout_seconds: 300,
            metadata: HashMap::new(),
        }
    }

    pub fn strategy(mut self, strategy: UpdateStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Operations sharing a dependency depth; executed together, in parallel.
#[derive(Debug, Clone)]
pub struct UpdateBatch {
    pub batch_id: usize,
    pub operations: Vec<UpdateOperation>,
    /// Ids of batches that must complete first (always every earlier batch).
    pub depends_on: BTreeSet<usize>,
}

impl UpdateBatch {
    pub fn new(batch_id: usize, operations: Vec<UpdateOperation>) -> Self {
        Self {
            batch_id,
            operations,
            depends_on: (0..batch_id).collect(),
        }
    }

    pub fn all_ready(&self) -> bool {
        self.operations
            .iter()
            .all(|op| op.status == OperationStatus::Ready)
    }

    pub fn all_completed(&self) -> bool {
        self.operations
            .iter()
            .all(|op| op.status == OperationStatus::Completed)
    }

    pub fn has_failures(&self) -> bool {
        self.operations
            .iter()
            .any(|op| op.status == OperationStatus::Failed)
    }

    /// Upper bound on the batch's wall time: the slowest operation plus
    /// scheduling overhead.
    pub fn timeout_seconds(&self, overhead_seconds: u64) -> u64 {
        self.operations
            .iter()
            .map(|op| op.timeout_seconds)
            .max()
            .unwrap_or(0)
            + overhead_seconds
    }
}
