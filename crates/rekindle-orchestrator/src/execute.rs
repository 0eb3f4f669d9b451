use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rekindle_cluster::{ClusterAccess, ClusterError};
use rekindle_domain::{ResourceDoc, ResourceId};
use rekindle_graph::{ingest_docs, DependencyGraph};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::OrchestratorError;
use crate::operation::{OperationStatus, UpdateBatch, UpdateOperation, UpdateStrategy};

const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_retries: u32,
    pub operation_timeout_seconds: u64,
    pub batch_overhead_seconds: u64,
    pub validation_enabled: bool,
    pub rollback_on_failure: bool,
    /// Pause between delete and re-apply in the recreate strategy.
    pub settle_delay: Duration,
    /// Base pause between retries of one operation.
    pub retry_cooldown: Duration,
    /// Base of the additional exponential backoff applied to transient
    /// cluster errors; jittered, capped at one minute.
    pub backoff_base: Duration,
    /// Per-kind strategy overrides on top of the built-in defaults.
    pub strategies: HashMap<String, UpdateStrategy>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let strategies = [
            ("Deployment", UpdateStrategy::Rolling),
            ("StatefulSet", UpdateStrategy::Rolling),
            ("Service", UpdateStrategy::Recreate),
            ("ConfigMap", UpdateStrategy::Atomic),
            ("Secret", UpdateStrategy::Atomic),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            max_retries: 3,
            operation_timeout_seconds: 300,
            batch_overhead_seconds: 60,
            validation_enabled: true,
            rollback_on_failure: true,
            settle_delay: Duration::from_secs(2),
            retry_cooldown: Duration::from_secs(120),
            backoff_base: Duration::from_secs(5),
            strategies,
        }
    }
}

enum OpOutcome {
    Completed { retries: u32 },
    Failed { retries: u32, error: String },
    Cancelled,
}

/// Executes update plans: batches in series, operations within a batch in
/// parallel, with validation, per-strategy semantics, retry and
/// rollback-on-failure.
pub struct UpdateOrchestrator {
    cluster: Arc<dyn ClusterAccess>,
    config: Arc<OrchestratorConfig>,
    shutdown: watch::Receiver<bool>,
    _shutdown_tx: Option<watch::Sender<bool>>,
}

impl UpdateOrchestrator {
    /// Standalone orchestrator with its own (never-signalled) shutdown flag.
    pub fn new(cluster: Arc<dyn ClusterAccess>, config: OrchestratorConfig) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            cluster,
            config: Arc::new(config),
            shutdown: rx,
            _shutdown_tx: Some(tx),
        }
    }

    /// Orchestrator wired to an external shutdown flag.
    pub fn with_shutdown(
        cluster: Arc<dyn ClusterAccess>,
        config: OrchestratorConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            cluster,
            config: Arc::new(config),
            shutdown,
            _shutdown_tx: None,
        }
    }

    /// Build update operations for a set of desired manifests and batch them
    /// in recreation order.
    pub fn plan_operations(
        &self,
        docs: &[ResourceDoc],
        graph: &mut DependencyGraph,
    ) -> Vec<UpdateBatch> {
        ingest_docs(graph, docs);

        let mut docs_by_id: HashMap<ResourceId, ResourceDoc> = HashMap::new();
        for doc in docs {
            if let Some(id) = doc_id(doc) {
                docs_by_id.insert(id, doc.clone());
            }
        }
        let ids: BTreeSet<ResourceId> = docs_by_id.keys().cloned().collect();

        let order = graph.recreation_order(&ids);
        let mut batches = Vec::new();
        for (batch_id, resources) in order.into_iter().enumerate() {
            let operations = resources
                .into_iter()
                .map(|id| {
                    let strategy = self
                        .config
                        .strategies
                        .get(&id.kind)
                        .copied()
                        .unwrap_or_else(|| UpdateStrategy::default_for_kind(&id.kind));
                    let node = graph.node(&id);
                    let mut op = UpdateOperation::new(id.clone(), docs_by_id.remove(&id));
                    op.strategy = strategy;
                    op.max_retries = self.config.max_retries;
                    op.timeout_seconds = self.config.operation_timeout_seconds;
                    if let Some(node) = node {
                        op.dependencies =
                            node.dependencies.intersection(&ids).cloned().collect();
                        op.dependents = node.dependents.intersection(&ids).cloned().collect();
                    }
                    op
                })
                .collect();
            batches.push(UpdateBatch::new(batch_id, operations));
        }

        info!(batches = batches.len(), "planned update batches");
        batches
    }

    /// Execute the batches in series. Returns `Ok(true)` when every batch
    /// completed, `Ok(false)` when a batch failed (after rollback when
    /// enabled).
    pub async fn execute(&self, batches: &mut [UpdateBatch]) -> Result<bool, OrchestratorError> {
        if batches.is_empty() {
            return Err(OrchestratorError::NoPlan);
        }

        info!(batches = batches.len(), "executing update batches");
        for idx in 0..batches.len() {
            if *self.shutdown.borrow() {
                cancel_remaining(&mut batches[idx..]);
                return Err(OrchestratorError::ShutdownRequested);
            }

            // Every earlier batch must have fully completed.
            let blocked = batches[idx]
                .depends_on
                .iter()
                .any(|dep| !batches[*dep].all_completed());
            if blocked {
                error!(batch = idx, "dependency batch not completed, aborting");
                return Ok(false);
            }

            let ok = self.execute_batch(batches, idx).await;
            if !ok {
                if self.config.rollback_on_failure {
                    self.rollback(batches);
                }
                return Ok(false);
            }
        }

        info!("all update batches completed");
        Ok(true)
    }

    async fn execute_batch(&self, batches: &mut [UpdateBatch], idx: usize) -> bool {
        // Snapshot statuses across the whole plan for dependency validation.
        let statuses: HashMap<ResourceId, OperationStatus> = batches
            .iter()
            .flat_map(|b| b.operations.iter())
            .map(|op| (op.resource.clone(), op.status))
            .collect();

        let batch = &mut batches[idx];
        debug!(batch = idx, operations = batch.operations.len(), "executing batch");

        if self.config.validation_enabled {
            for op in batch.operations.iter_mut() {
                if let Err(reason) = validate_operation(&*self.cluster, op, &statuses).await {
                    error!(resource = %op.resource, reason = %reason, "operation validation failed");
                    op.status = OperationStatus::Failed;
                    return false;
                }
                op.status = OperationStatus::Ready;
            }
        } else {
            for op in batch.operations.iter_mut() {
                op.status = OperationStatus::Ready;
            }
        }

        let mut join_set: JoinSet<(usize, OpOutcome)> = JoinSet::new();
        for (op_idx, op) in batch.operations.iter_mut().enumerate() {
            op.status = OperationStatus::InProgress;
            let cluster = self.cluster.clone();
            let config = self.config.clone();
            let shutdown = self.shutdown.clone();
            let op = op.clone();
            join_set
                .spawn(async move { (op_idx, execute_operation(cluster, config, shutdown, op).await) });
        }

        let batch_timeout =
            Duration::from_secs(batch.timeout_seconds(self.config.batch_overhead_seconds));
        let mut outcomes: Vec<(usize, OpOutcome)> = Vec::new();
        let all_joined = tokio::time::timeout(batch_timeout, async {
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(e) => error!(error = %e, "operation task panicked"),
                }
            }
        })
        .await
        .is_ok();

        if !all_joined {
            warn!(batch = idx, "batch timed out");
            join_set.abort_all();
        }

        for (op_idx, outcome) in outcomes {
            let op = &mut batch.operations[op_idx];
            match outcome {
                OpOutcome::Completed { retries } => {
                    op.retry_count = retries;
                    op.status = OperationStatus::Completed;
                }
                OpOutcome::Failed { retries, error } => {
                    op.retry_count = retries;
                    op.status = OperationStatus::Failed;
                    error!(resource = %op.resource, error = %error, "operation failed");
                }
                OpOutcome::Cancelled => {
                    op.status = OperationStatus::Cancelled;
                }
            }
        }
        // Anything that never reported back ran into the batch timeout.
        for op in batch.operations.iter_mut() {
            if op.status == OperationStatus::InProgress {
                op.status = OperationStatus::Failed;
            }
        }

        let ok = batch.all_completed();
        if ok {
            info!(batch = idx, "batch completed");
        } else {
            error!(batch = idx, "batch failed");
        }
        ok
    }

    /// Record the rollback intent on every completed operation, newest batch
    /// first. Restoring previous state is the caller's responsibility.
    fn rollback(&self, batches: &mut [UpdateBatch]) {
        warn!("rolling back completed operations");
        for batch in batches.iter_mut().rev() {
            for op in batch.operations.iter_mut() {
                if op.status == OperationStatus::Completed {
                    warn!(resource = %op.resource, "marking operation rolled back");
                    op.status = OperationStatus::RolledBack;
                }
            }
        }
    }
}

fn cancel_remaining(batches: &mut [UpdateBatch]) {
    for batch in batches {
        for op in batch.operations.iter_mut() {
            if matches!(
                op.status,
                OperationStatus::Pending | OperationStatus::Ready | OperationStatus::InProgress
            ) {
                op.status = OperationStatus::Cancelled;
            }
        }
    }
}

async fn validate_operation(
    cluster: &dyn ClusterAccess,
    op: &UpdateOperation,
    statuses: &HashMap<ResourceId, OperationStatus>,
) -> Result<(), String> {
    if let Some(doc) = &op.doc {
        cluster
            .apply(doc, true)
            .await
            .map_err(|e| format!("dry-run apply failed: {e}"))?;
    }

    for dep in &op.dependencies {
        match statuses.get(dep) {
            None => {} // outside this plan, assumed in place
            Some(OperationStatus::Completed) | Some(OperationStatus::Ready) => {}
            Some(status) => {
                return Err(format!("dependency {dep} not ready (status: {status})"));
            }
        }
    }
    Ok(())
}

async fn execute_operation(
    cluster: Arc<dyn ClusterAccess>,
    config: Arc<OrchestratorConfig>,
    shutdown: watch::Receiver<bool>,
    op: UpdateOperation,
) -> OpOutcome {
    let deadline = Instant::now() + Duration::from_secs(op.timeout_seconds);
    let mut retries = 0u32;

    loop {
        if *shutdown.borrow() {
            return OpOutcome::Cancelled;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return OpOutcome::Failed {
                retries,
                error: "operation timed out".to_string(),
            };
        }

        debug!(
            resource = %op.resource,
            strategy = %op.strategy,
            attempt = retries + 1,
            "executing operation"
        );
        let attempt =
            tokio::time::timeout(remaining, run_strategy(&*cluster, &config, &shutdown, &op)).await;

        let error = match attempt {
            Err(_) => {
                return OpOutcome::Failed {
                    retries,
                    error: "operation timed out".to_string(),
                }
            }
            Ok(Ok(())) => return OpOutcome::Completed { retries },
            Ok(Err(e)) => e,
        };

        if retries >= op.max_retries {
            return OpOutcome::Failed {
                retries,
                error: error.to_string(),
            };
        }
        retries += 1;
        warn!(
            resource = %op.resource,
            retry = retries,
            max = op.max_retries,
            error = %error,
            "retrying operation"
        );

        let delay = retry_delay(&config, retries, error.is_retryable());
        tokio::time::sleep(delay.min(remaining)).await;
    }
}

async fn run_strategy(
    cluster: &dyn ClusterAccess,
    config: &OrchestratorConfig,
    shutdown: &watch::Receiver<bool>,
    op: &UpdateOperation,
) -> Result<(), ClusterError> {
    let Some(doc) = &op.doc else {
        // Cleanup-only operation: delete and be done.
        return ignore_not_found(cluster.delete(&op.resource, None).await);
    };

    match op.strategy {
        UpdateStrategy::Rolling => {
            cluster.apply(doc, false).await?;
            if supports_rollout(&op.resource.kind) {
                cluster
                    .wait_for_rollout(&op.resource, Duration::from_secs(op.timeout_seconds))
                    .await?;
            }
            Ok(())
        }
        UpdateStrategy::Recreate => {
            ignore_not_found(cluster.delete(&op.resource, None).await)?;
            tokio::time::sleep(config.settle_delay).await;
            if *shutdown.borrow() {
                return Err(ClusterError::Api("shutdown during recreate".to_string()));
            }
            cluster.apply(doc, false).await
        }
        UpdateStrategy::Atomic => cluster.apply(doc, false).await,
        UpdateStrategy::BlueGreen => {
            warn!(
                resource = %op.resource,
                "blue-green not supported, degrading to recreate"
            );
            ignore_not_found(cluster.delete(&op.resource, None).await)?;
            tokio::time::sleep(config.settle_delay).await;
            cluster.apply(doc, false).await
        }
    }
}

fn supports_rollout(kind: &str) -> bool {
    matches!(kind, "Deployment" | "StatefulSet" | "DaemonSet")
}

fn ignore_not_found(result: Result<(), ClusterError>) -> Result<(), ClusterError> {
    match result {
        Err(ClusterError::NotFound(_)) => Ok(()),
        other => other,
    }
}

/// Cooldown plus, for transient API errors, jittered exponential backoff
/// capped at one minute.
fn retry_delay(config: &OrchestratorConfig, attempt: u32, transient: bool) -> Duration {
    let mut delay = config.retry_cooldown;
    if transient && config.backoff_base > Duration::ZERO {
        let exp = config
            .backoff_base
            .saturating_mul(1u32 << attempt.min(6))
            .min(MAX_BACKOFF);
        let jitter = rand::thread_rng().gen_range(0.5..=1.0);
        delay += exp.mul_f64(jitter);
    }
    delay
}

fn doc_id(doc: &ResourceDoc) -> Option<ResourceId> {
    let kind = doc.get("kind")?.as_str()?;
    let metadata = doc.get("metadata")?;
    let name = metadata.get("name")?.as_str()?;
    let namespace = metadata.get("namespace").and_then(Value::as_str);
    let api_version = doc
        .get("apiVersion")
        .and_then(Value::as_str)
        .unwrap_or("v1");
    Some(ResourceId::new(kind, name, namespace).with_api_version(api_version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rekindle_cluster::LocalCluster;
    use serde_json::json;

    fn fast_config() -> OrchestratorConfig {
        OrchestratorConfig {
            settle_delay: Duration::from_millis(5),
            retry_cooldown: Duration::ZERO,
            backoff_base: Duration::ZERO,
            batch_overhead_seconds: 5,
            operation_timeout_seconds: 10,
            ..OrchestratorConfig::default()
        }
    }

    fn configmap(name: &str) -> ResourceDoc {
        json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": name, "namespace": "default"},
            "data": {"key": "value"}
        })
    }

    fn deployment(name: &str, configmap: &str) -> ResourceDoc {
        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": name, "namespace": "default"},
            "spec": {
                "template": {
                    "spec": {
                        "configMapRef": {"name": configmap}
                    }
                }
            }
        })
    }

    fn cm_id(name: &str) -> ResourceId {
        ResourceId::namespaced("ConfigMap", name, "default")
    }

    #[tokio::test]
    async fn plan_orders_by_dependency_depth() {
        let cluster = Arc::new(LocalCluster::new());
        let orchestrator = UpdateOrchestrator::new(cluster, fast_config());
        let mut graph = DependencyGraph::new();

        let batches = orchestrator.plan_operations(
            &[deployment("app", "app-config"), configmap("app-config")],
            &mut graph,
        );

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].operations[0].resource.kind, "ConfigMap");
        assert_eq!(batches[1].operations[0].resource.kind, "Deployment");
        assert_eq!(batches[0].operations[0].strategy, UpdateStrategy::Atomic);
        assert_eq!(batches[1].operations[0].strategy, UpdateStrategy::Rolling);
        assert_eq!(batches[1].operations[0].dependencies.len(), 1);
    }

    #[tokio::test]
    async fn execute_completes_all_batches_in_order() {
        let cluster = Arc::new(LocalCluster::new());
        let orchestrator = UpdateOrchestrator::new(cluster.clone(), fast_config());
        let mut graph = DependencyGraph::new();
        let mut batches = orchestrator.plan_operations(
            &[deployment("app", "app-config"), configmap("app-config")],
            &mut graph,
        );

        let ok = orchestrator.execute(&mut batches).await.unwrap();
        assert!(ok);
        assert!(batches.iter().all(|b| b.all_completed()));

        let applied = cluster.applied().await;
        assert_eq!(applied.len(), 2);
        // The ConfigMap batch lands before the Deployment batch.
        assert_eq!(applied[0], "default/ConfigMap/app-config");
        assert_eq!(applied[1], "default/Deployment/app");
    }

    #[tokio::test]
    async fn validation_failure_fails_the_batch() {
        let cluster = Arc::new(LocalCluster::new());
        cluster.fail_apply(&cm_id("app-config"), 1).await;

        let orchestrator = UpdateOrchestrator::new(cluster.clone(), fast_config());
        let mut graph = DependencyGraph::new();
        let mut batches = orchestrator.plan_operations(&[configmap("app-config")], &mut graph);

        let ok = orchestrator.execute(&mut batches).await.unwrap();
        assert!(!ok);
        assert_eq!(batches[0].operations[0].status, OperationStatus::Failed);
        // Validation failed on the dry-run; nothing was applied for real.
        assert!(cluster.applied().await.is_empty());
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let cluster = Arc::new(LocalCluster::new());
        // One failure eats the dry-run; two more hit the real applies.
        cluster.fail_apply(&cm_id("flaky"), 3).await;

        let mut config = fast_config();
        config.validation_enabled = false;
        let orchestrator = UpdateOrchestrator::new(cluster.clone(), config);
        let mut graph = DependencyGraph::new();
        let mut batches = orchestrator.plan_operations(&[configmap("flaky")], &mut graph);

        let ok = orchestrator.execute(&mut batches).await.unwrap();
        assert!(ok);
        assert_eq!(batches[0].operations[0].status, OperationStatus::Completed);
        assert_eq!(batches[0].operations[0].retry_count, 3);
    }

    #[tokio::test]
    async fn exhausted_retries_fail_and_roll_back_earlier_batches() {
        let cluster = Arc::new(LocalCluster::new());
        // The Deployment apply keeps failing past every retry.
        cluster
            .fail_apply(&ResourceId::namespaced("Deployment", "app", "default"), 20)
            .await;

        let mut config = fast_config();
        config.max_retries = 1;
        let orchestrator = UpdateOrchestrator::new(cluster.clone(), config);
        let mut graph = DependencyGraph::new();
        let mut batches = orchestrator.plan_operations(
            &[deployment("app", "app-config"), configmap("app-config")],
            &mut graph,
        );

        let ok = orchestrator.execute(&mut batches).await.unwrap();
        assert!(!ok);
        // The completed ConfigMap operation was rolled back.
        assert_eq!(
            batches[0].operations[0].status,
            OperationStatus::RolledBack
        );
        assert_eq!(batches[1].operations[0].status, OperationStatus::Failed);
        // No operation remains completed after rollback.
        assert!(batches
            .iter()
            .flat_map(|b| b.operations.iter())
            .all(|op| op.status != OperationStatus::Completed));
    }

    #[tokio::test]
    async fn rollback_can_be_disabled() {
        let cluster = Arc::new(LocalCluster::new());
        cluster
            .fail_apply(&ResourceId::namespaced("Deployment", "app", "default"), 20)
            .await;

        let mut config = fast_config();
        config.max_retries = 0;
        config.rollback_on_failure = false;
        let orchestrator = UpdateOrchestrator::new(cluster.clone(), config);
        let mut graph = DependencyGraph::new();
        let mut batches = orchestrator.plan_operations(
            &[deployment("app", "app-config"), configmap("app-config")],
            &mut graph,
        );

        let ok = orchestrator.execute(&mut batches).await.unwrap();
        assert!(!ok);
        assert_eq!(batches[0].operations[0].status, OperationStatus::Completed);
    }

    #[tokio::test]
    async fn rolling_update_waits_for_rollout() {
        let cluster = Arc::new(LocalCluster::new());
        let dep_id = ResourceId::namespaced("Deployment", "app", "default");
        cluster.fail_rollout(&dep_id).await;

        let mut config = fast_config();
        config.max_retries = 0;
        let orchestrator = UpdateOrchestrator::new(cluster.clone(), config);
        let mut graph = DependencyGraph::new();
        let mut batches =
            orchestrator.plan_operations(&[deployment("app", "missing-config")], &mut graph);

        let ok = orchestrator.execute(&mut batches).await.unwrap();
        assert!(!ok);
        assert_eq!(batches[0].operations[0].status, OperationStatus::Failed);
    }

    #[tokio::test]
    async fn recreate_deletes_before_applying() {
        let cluster = Arc::new(LocalCluster::new());
        let orchestrator = UpdateOrchestrator::new(cluster.clone(), fast_config());
        let mut graph = DependencyGraph::new();

        let service = json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {"name": "app", "namespace": "default"},
            "spec": {"selector": {"app": "app"}}
        });
        let mut batches = orchestrator.plan_operations(&[service], &mut graph);

        let ok = orchestrator.execute(&mut batches).await.unwrap();
        assert!(ok);
        assert_eq!(cluster.deleted().await.len(), 1);
        assert_eq!(cluster.applied().await, vec!["default/Service/app"]);
    }

    #[tokio::test]
    async fn shutdown_cancels_pending_batches() {
        let cluster = Arc::new(LocalCluster::new());
        let (tx, rx) = watch::channel(true);
        let orchestrator =
            UpdateOrchestrator::with_shutdown(cluster.clone(), fast_config(), rx);
        let mut graph = DependencyGraph::new();
        let mut batches = orchestrator.plan_operations(&[configmap("a")], &mut graph);

        let result = orchestrator.execute(&mut batches).await;
        assert!(matches!(result, Err(OrchestratorError::ShutdownRequested)));
        assert_eq!(batches[0].operations[0].status, OperationStatus::Cancelled);
        drop(tx);
    }

    #[tokio::test]
    async fn empty_plan_is_an_error() {
        let cluster = Arc::new(LocalCluster::new());
        let orchestrator = UpdateOrchestrator::new(cluster, fast_config());
        let mut batches: Vec<UpdateBatch> = Vec::new();
        assert!(matches!(
            orchestrator.execute(&mut batches).await,
            Err(OrchestratorError::NoPlan)
        ));
    }
}
