use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use rekindle_cluster::LocalCluster;
use rekindle_domain::ResourceId;
use rekindle_graph::{DependencyGraph, Relation, RelationType};
use rekindle_orchestrator::{
    build_plan, OperationStatus, OrchestratorConfig, UpdateBatch, UpdateOperation,
    UpdateOrchestrator,
};
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

fn manifest(kind: &str, name: &str) -> serde_json::Value {
    json!({
        "apiVersion": "v1",
        "kind": kind,
        "metadata": {"name": name, "namespace": "default"}
    })
}

fn position(applied: &[String], key: &str) -> usize {
    applied
        .iter()
        .position(|k| k == key)
        .unwrap_or_else(|| panic!("{key} was not applied"))
}

/// Linear chain CM <- D <- S <- I: a failed deployment recreates bottom-up
/// and cleans up top-down.
#[tokio::test]
async fn linear_chain_plans_and_executes_in_order() {
    let mut graph = DependencyGraph::new();
    let cm = ResourceId::namespaced("ConfigMap", "app-config", "default");
    let d = ResourceId::namespaced("Deployment", "app-deployment", "default");
    let s = ResourceId::namespaced("Service", "app-service", "default");
    let i = ResourceId::namespaced("Ingress", "app-ingress", "default");
    graph.add_relations([
        Relation::new(d.clone(), cm.clone(), RelationType::References),
        Relation::new(s.clone(), d.clone(), RelationType::References),
        Relation::new(i.clone(), s.clone(), RelationType::RoutesTo),
    ]);

    let failed: BTreeSet<_> = [d.clone()].into_iter().collect();
    let plan = build_plan(&mut graph, &failed).unwrap();

    // Cleanup: dependents first, one per depth level.
    let cleanup: Vec<Vec<ResourceId>> = plan
        .cleanup_plan
        .batches
        .iter()
        .map(|b| b.resources.clone())
        .collect();
    assert_eq!(cleanup, vec![vec![i], vec![s], vec![d]]);

    // Recreation of the whole chain runs foundation-first through the
    // orchestrator.
    let cluster = Arc::new(LocalCluster::new());
    let orchestrator = UpdateOrchestrator::new(cluster.clone(), fast_config());
    let docs = vec![
        manifest("Ingress", "app-ingress"),
        manifest("Service", "app-service"),
        manifest("Deployment", "app-deployment"),
        manifest("ConfigMap", "app-config"),
    ];
    let mut batches = orchestrator.plan_operations(&docs, &mut graph);
    assert!(orchestrator.execute(&mut batches).await.unwrap());

    let applied = cluster.applied().await;
    assert_eq!(applied.len(), 4);
    assert!(position(&applied, "default/ConfigMap/app-config")
        < position(&applied, "default/Deployment/app-deployment"));
    assert!(position(&applied, "default/Deployment/app-deployment")
        < position(&applied, "default/Service/app-service"));
    assert!(position(&applied, "default/Service/app-service")
        < position(&applied, "default/Ingress/app-ingress"));
}

/// Two-root diamond A <- B, A <- C, B <- D, C <- D: B and C share a batch
/// and both land before D.
#[tokio::test]
async fn diamond_middle_batch_completes_before_the_sink() {
    let mut graph = DependencyGraph::new();
    let a = ResourceId::namespaced("ConfigMap", "a", "default");
    let b = ResourceId::namespaced("Deployment", "b", "default");
    let c = ResourceId::namespaced("Service", "c", "default");
    let d = ResourceId::namespaced("Ingress", "d", "default");
    graph.add_relations([
        Relation::new(b.clone(), a.clone(), RelationType::References),
        Relation::new(c.clone(), a.clone(), RelationType::References),
        Relation::new(d.clone(), b.clone(), RelationType::References),
        Relation::new(d.clone(), c.clone(), RelationType::RoutesTo),
    ]);

    let failed: BTreeSet<_> = [a.clone()].into_iter().collect();
    let plan = build_plan(&mut graph, &failed).unwrap();
    let recreation: Vec<Vec<ResourceId>> = plan
        .recreation_plan
        .batches
        .iter()
        .map(|batch| batch.resources.clone())
        .collect();
    // Only the failed resource is recreated; cleanup covers the dependents.
    assert_eq!(recreation, vec![vec![a]]);
    assert_eq!(plan.cleanup_plan.batches.len(), 3);
    assert_eq!(plan.cleanup_plan.batches[1].resources.len(), 2);

    let cluster = Arc::new(LocalCluster::new());
    let orchestrator = UpdateOrchestrator::new(cluster.clone(), fast_config());
    let docs = vec![
        manifest("ConfigMap", "a"),
        manifest("Deployment", "b"),
        manifest("Service", "c"),
        manifest("Ingress", "d"),
    ];
    let mut batches = orchestrator.plan_operations(&docs, &mut graph);
    assert_eq!(batches.len(), 3);
    assert!(orchestrator.execute(&mut batches).await.unwrap());

    let applied = cluster.applied().await;
    let d_pos = position(&applied, "default/Ingress/d");
    assert!(position(&applied, "default/Deployment/b") < d_pos);
    assert!(position(&applied, "default/Service/c") < d_pos);
}

/// Cycle X -> Y -> Z -> X: every edge is tagged circular, cleanup emits
/// singleton batches, and execution still drives every operation to a
/// terminal state.
#[tokio::test]
async fn cycle_executes_without_deadlock() {
    let mut graph = DependencyGraph::new();
    let x = ResourceId::namespaced("Service", "x", "default");
    let y = ResourceId::namespaced("Deployment", "y", "default");
    let z = ResourceId::namespaced("ConfigMap", "z", "default");
    graph.add_relations([
        Relation::new(x.clone(), y.clone(), RelationType::References),
        Relation::new(y.clone(), z.clone(), RelationType::References),
        Relation::new(z.clone(), x.clone(), RelationType::DependsOn),
    ]);
    assert_eq!(graph.cycles().len(), 1);
    assert!(graph
        .relations()
        .iter()
        .all(|r| r.kind == rekindle_graph::DependencyKind::Circular));

    let failed: BTreeSet<_> = [x.clone(), y.clone(), z.clone()].into_iter().collect();
    let cleanup = graph.cleanup_order(&failed);
    assert_eq!(cleanup.len(), 3);
    assert!(cleanup.iter().all(|batch| batch.len() == 1));

    // Execute the cleanup as delete-only operations, batch by batch.
    let cluster = Arc::new(LocalCluster::new());
    let orchestrator = UpdateOrchestrator::new(cluster.clone(), fast_config());
    let mut batches: Vec<UpdateBatch> = cleanup
        .into_iter()
        .enumerate()
        .map(|(batch_id, resources)| {
            let ops = resources
                .into_iter()
                .map(|id| UpdateOperation::new(id, None))
                .collect();
            UpdateBatch::new(batch_id, ops)
        })
        .collect();

    assert!(orchestrator.execute(&mut batches).await.unwrap());
    assert!(batches
        .iter()
        .flat_map(|batch| batch.operations.iter())
        .all(|op| op.status == OperationStatus::Completed));
    assert_eq!(cluster.deleted().await.len(), 3);
}
