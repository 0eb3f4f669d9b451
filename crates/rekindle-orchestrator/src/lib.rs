mod controller;
mod error;
mod escalate;
mod execute;
mod operation;
mod plan;
mod planner;

pub use controller::{ControllerMetrics, RecoveryController};
pub use error::OrchestratorError;
pub use escalate::escalate;
pub use execute::{OrchestratorConfig, UpdateOrchestrator};
pub use operation::{OperationStatus, UpdateBatch, UpdateOperation, UpdateStrategy};
pub use plan::{PlanBatch, PlanPhase, RecoveryPlan, RiskAssessment};
pub use planner::build_plan;
