use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use rekindle_domain::{ResourceId, ResourceState, Severity};
use rekindle_graph::{Complexity, DependencyGraph, Impact};
use tracing::info;

use crate::error::OrchestratorError;
use crate::plan::{PlanPhase, RecoveryPlan, RiskAssessment};

/// Assemble the cleanup-and-recreation plan for a set of failed resources.
pub fn build_plan(
    graph: &mut DependencyGraph,
    failed: &BTreeSet<ResourceId>,
) -> Result<RecoveryPlan, OrchestratorError> {
    if failed.is_empty() {
        return Err(OrchestratorError::NoPlan);
    }

    info!(failed = failed.len(), "planning cleanup and recreation");

    for id in failed {
        graph.add_resource(id.clone(), ResourceState::Failed);
    }

    let mut impact_analysis: BTreeMap<String, Impact> = BTreeMap::new();
    for id in failed {
        let impact = graph.analyze_impact(id)?;
        impact_analysis.insert(id.to_string(), impact);
    }

    let cleanup_batches = graph.cleanup_order(failed);
    let recreation_batches = graph.recreation_order(failed);

    let total_estimated_time = format!(
        "{}-{} minutes",
        cleanup_batches.len() * 3 + recreation_batches.len() * 5,
        cleanup_batches.len() * 5 + recreation_batches.len() * 8
    );

    let risk_assessment = assess_risk(failed, &impact_analysis);
    let recommendations = recommendations(failed, &impact_analysis);

    Ok(RecoveryPlan {
        timestamp: Utc::now(),
        failed_resources: failed.iter().cloned().collect(),
        impact_analysis,
        cleanup_plan: PlanPhase::from_batches(cleanup_batches, "2-5 minutes"),
        recreation_plan: PlanPhase::from_batches(recreation_batches, "3-8 minutes"),
        total_estimated_time,
        risk_assessment,
        recommendations,
    })
}

fn assess_risk(
    failed: &BTreeSet<ResourceId>,
    impacts: &BTreeMap<String, Impact>,
) -> RiskAssessment {
    let mut factors = Vec::new();
    let mut level = Severity::Low;
    fn raise(level: &mut Severity, at_least: Severity) {
        if *level < at_least {
            *level = at_least;
        }
    }

    let critical_namespaces: BTreeSet<&str> = failed
        .iter()
        .filter(|id| id.is_critical_namespace())
        .filter_map(|id| id.namespace.as_deref())
        .collect();
    for ns in &critical_namespaces {
        factors.push(format!("critical namespace involved: {ns}"));
        raise(&mut level, Severity::High);
    }

    let total_affected: usize = impacts.values().map(|i| i.total_affected).sum();
    if total_affected > 10 {
        factors.push(format!("high impact: {total_affected} resources affected"));
        raise(&mut level, Severity::High);
    } else if total_affected > 5 {
        factors.push(format!("medium impact: {total_affected} resources affected"));
        raise(&mut level, Severity::Medium);
    }

    if impacts.values().any(|i| i.circular_dependency) {
        factors.push("circular dependencies detected".to_string());
        raise(&mut level, Severity::High);
    }

    let complex_cleanups = impacts
        .values()
        .filter(|i| i.complexity == Complexity::High)
        .count();
    if complex_cleanups > 0 {
        factors.push(format!(
            "complex cleanup required for {complex_cleanups} resources"
        ));
        raise(&mut level, Severity::Medium);
    }

    // Everything severe at once: a critical namespace with wide blast radius.
    if !critical_namespaces.is_empty() && total_affected > 10 {
        raise(&mut level, Severity::Critical);
    }

    RiskAssessment {
        mitigation_required: level >= Severity::High,
        manual_oversight_recommended: level == Severity::Critical,
        level,
        factors,
    }
}

fn recommendations(
    failed: &BTreeSet<ResourceId>,
    impacts: &BTreeMap<String, Impact>,
) -> Vec<String> {
    let mut out = vec![
        "Ensure cluster has sufficient resources before starting recovery".to_string(),
        "Monitor recovery progress and be prepared to intervene if needed".to_string(),
    ];

    let critical_affected: BTreeSet<String> = impacts
        .values()
        .flat_map(|i| i.critical_affected.iter().map(|r| r.to_string()))
        .collect();
    if !critical_affected.is_empty() {
        out.push(format!(
            "Pay special attention to critical resources: {}",
            critical_affected.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }

    if failed
        .iter()
        .any(|r| r.namespace.as_deref() == Some("flux-system"))
    {
        out.push(
            "Flux system resources involved - consider suspending reconciliation during recovery"
                .to_string(),
        );
    }

    if failed
        .iter()
        .any(|r| r.namespace.as_deref() == Some("longhorn-system"))
    {
        out.push(
            "Storage system resources involved - ensure data backup before proceeding".to_string(),
        );
    }

    if impacts.values().any(|i| i.circular_dependency) {
        out.push(
            "Circular dependencies detected - manual intervention may be required".to_string(),
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rekindle_graph::{Relation, RelationType};

    fn id(kind: &str, name: &str) -> ResourceId {
        ResourceId::namespaced(kind, name, "default")
    }

    fn chain_graph() -> DependencyGraph {
        let cm = id("ConfigMap", "app-config");
        let d = id("Deployment", "app-deployment");
        let s = id("Service", "app-service");
        let i = id("Ingress", "app-ingress");
        let mut graph = DependencyGraph::new();
        graph.add_relations([
            Relation::new(d.clone(), cm.clone(), RelationType::References),
            Relation::new(s.clone(), d.clone(), RelationType::RoutesTo),
            Relation::new(i, s, RelationType::RoutesTo),
        ]);
        graph
    }

    #[test]
    fn empty_failed_set_is_an_error() {
        let mut graph = DependencyGraph::new();
        assert!(matches!(
            build_plan(&mut graph, &BTreeSet::new()),
            Err(OrchestratorError::NoPlan)
        ));
    }

    #[test]
    fn plan_for_failed_deployment_covers_dependents() {
        let mut graph = chain_graph();
        let failed: BTreeSet<_> = [id("Deployment", "app-deployment")].into_iter().collect();
        let plan = build_plan(&mut graph, &failed).unwrap();

        // Cleanup walks dependents: ingress, service, deployment.
        assert_eq!(plan.cleanup_plan.total_batches(), 3);
        // Recreation covers only the failed set.
        assert_eq!(plan.recreation_plan.total_batches(), 1);
        assert!(plan.impact_analysis.contains_key("default/Deployment/app-deployment"));
        assert_eq!(plan.risk_assessment.level, Severity::Low);
        assert!(!plan.recommendations.is_empty());
    }

    #[test]
    fn unknown_failed_resource_still_plans() {
        let mut graph = DependencyGraph::new();
        let failed: BTreeSet<_> = [id("Deployment", "never-seen")].into_iter().collect();
        let plan = build_plan(&mut graph, &failed).unwrap();
        assert_eq!(plan.cleanup_plan.total_batches(), 1);
        let impact = &plan.impact_analysis["default/Deployment/never-seen"];
        assert_eq!(impact.total_affected, 0);
    }

    #[test]
    fn critical_namespace_raises_risk_and_advice() {
        let mut graph = DependencyGraph::new();
        let kustomization = ResourceId::namespaced("Kustomization", "apps", "flux-system");
        graph.add_resource(kustomization.clone(), ResourceState::Failed);

        let failed: BTreeSet<_> = [kustomization].into_iter().collect();
        let plan = build_plan(&mut graph, &failed).unwrap();

        assert_eq!(plan.risk_assessment.level, Severity::High);
        assert!(plan.risk_assessment.mitigation_required);
        assert!(plan
            .recommendations
            .iter()
            .any(|r| r.contains("suspending reconciliation")));
    }

    #[test]
    fn wide_critical_blast_radius_is_critical_risk() {
        let mut graph = DependencyGraph::new();
        let secret = ResourceId::namespaced("Secret", "cluster-ca", "flux-system");
        let mut relations = Vec::new();
        for i in 0..12 {
            relations.push(Relation::new(
                id("Deployment", &format!("app-{i}")),
                secret.clone(),
                RelationType::References,
            ));
        }
        graph.add_relations(relations);

        let failed: BTreeSet<_> = [secret].into_iter().collect();
        let plan = build_plan(&mut graph, &failed).unwrap();

        assert_eq!(plan.risk_assessment.level, Severity::Critical);
        assert!(plan.risk_assessment.manual_oversight_recommended);
    }

    #[test]
    fn cycle_shows_up_in_risk_and_recommendations() {
        let mut graph = DependencyGraph::new();
        let x = id("Kustomization", "x");
        let y = id("Kustomization", "y");
        graph.add_relations([
            Relation::new(x.clone(), y.clone(), RelationType::DependsOn),
            Relation::new(y.clone(), x.clone(), RelationType::DependsOn),
        ]);

        let failed: BTreeSet<_> = [x, y].into_iter().collect();
        let plan = build_plan(&mut graph, &failed).unwrap();

        assert!(plan
            .risk_assessment
            .factors
            .iter()
            .any(|f| f.contains("circular")));
        assert!(plan
            .recommendations
            .iter()
            .any(|r| r.contains("Circular dependencies")));
        // Cycle break: every batch is a singleton.
        assert!(plan.cleanup_plan.batches.iter().all(|b| b.resources.len() == 1));
    }

    #[test]
    fn estimated_time_scales_with_batches() {
        let mut graph = chain_graph();
        let failed: BTreeSet<_> = [id("ConfigMap", "app-config")].into_iter().collect();
        let plan = build_plan(&mut graph, &failed).unwrap();
        // 4 cleanup batches, 1 recreation batch.
        assert_eq!(plan.total_estimated_time, "17-28 minutes");
    }
}
