use rekindle_graph::{DependencyGraph, DependencyKind};
use rekindle_orchestrator::RecoveryPlan;

/// Render a recovery plan as human-readable text.
pub fn render_plan(plan: &RecoveryPlan) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Recovery plan for {} failed resource(s)\n",
        plan.failed_resources.len()
    ));
    for resource in &plan.failed_resources {
        out.push_str(&format!("  ! {}\n", resource));
    }

    out.push_str(&format!(
        "\nRisk: {} (mitigation required: {})\n",
        plan.risk_assessment.level, plan.risk_assessment.mitigation_required
    ));
    for factor in &plan.risk_assessment.factors {
        out.push_str(&format!("  - {}\n", factor));
    }

    out.push_str("\nCleanup:\n");
    for batch in &plan.cleanup_plan.batches {
        out.push_str(&format!(
            "  batch {} ({}):\n",
            batch.batch_number, batch.estimated_duration
        ));
        for resource in &batch.resources {
            out.push_str(&format!("    - {}\n", resource));
        }
    }

    out.push_str("\nRecreation:\n");
    for batch in &plan.recreation_plan.batches {
        out.push_str(&format!(
            "  batch {} ({}):\n",
            batch.batch_number, batch.estimated_duration
        ));
        for resource in &batch.resources {
            out.push_str(&format!("    + {}\n", resource));
        }
    }

    out.push_str(&format!(
        "\nEstimated total time: {}\n",
        plan.total_estimated_time
    ));

    if !plan.recommendations.is_empty() {
        out.push_str("\nRecommendations:\n");
        for recommendation in &plan.recommendations {
            out.push_str(&format!("  * {}\n", recommendation));
        }
    }

    out
}

/// Render the graph as plain text, one node per line with its edges.
pub fn render_graph_text(graph: &DependencyGraph) -> String {
    let mut out = String::new();
    let mut nodes: Vec<_> = graph.nodes().collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    for node in nodes {
        out.push_str(&format!("{} [{}]\n", node.id, node.state));
        for dep in &node.dependencies {
            out.push_str(&format!("  -> {}\n", dep));
        }
    }

    if !graph.cycles().is_empty() {
        out.push_str("\nCycles:\n");
        for cycle in graph.cycles() {
            let members: Vec<String> = cycle.iter().map(|id| id.to_string()).collect();
            out.push_str(&format!("  {}\n", members.join(" -> ")));
        }
    }
    out
}

/// Render the graph as Graphviz DOT; circular edges are drawn dashed red.
pub fn render_dot(graph: &DependencyGraph) -> String {
    let mut out = String::from("digraph rekindle {\n  rankdir=LR;\n  node [shape=box];\n\n");

    for relation in graph.relations() {
        let attrs = if relation.kind == DependencyKind::Circular {
            format!("label=\"{}\", color=red, style=dashed", relation.relation_type)
        } else {
            format!("label=\"{}\"", relation.relation_type)
        };
        out.push_str(&format!(
            "  \"{}\" -> \"{}\" [{}];\n",
            relation.source, relation.target, attrs
        ));
    }

    out.push('}');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use rekindle_domain::ResourceId;
    use rekindle_graph::{Relation, RelationType};
    use rekindle_orchestrator::build_plan;

    fn sample_graph() -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        let cm = ResourceId::namespaced("ConfigMap", "cfg", "default");
        let dep = ResourceId::namespaced("Deployment", "app", "default");
        graph.add_relations([Relation::new(dep, cm, RelationType::References)]);
        graph
    }

    #[test]
    fn plan_text_lists_batches_and_risk() {
        let mut graph = sample_graph();
        let failed: BTreeSet<_> = [ResourceId::namespaced("ConfigMap", "cfg", "default")]
            .into_iter()
            .collect();
        let plan = build_plan(&mut graph, &failed).unwrap();

        let text = render_plan(&plan);
        assert!(text.contains("! default/ConfigMap/cfg"));
        assert!(text.contains("Cleanup:"));
        assert!(text.contains("Recreation:"));
        assert!(text.contains("Risk: low"));
    }

    #[test]
    fn dot_output_contains_edges() {
        let graph = sample_graph();
        let dot = render_dot(&graph);
        assert!(dot.starts_with("digraph rekindle {"));
        assert!(dot.contains("\"default/Deployment/app\" -> \"default/ConfigMap/cfg\""));
        assert!(dot.contains("references"));
    }

    #[test]
    fn circular_edges_are_highlighted() {
        let mut graph = DependencyGraph::new();
        let a = ResourceId::namespaced("Kustomization", "a", "flux-system");
        let b = ResourceId::namespaced("Kustomization", "b", "flux-system");
        graph.add_relations([
            Relation::new(a.clone(), b.clone(), RelationType::DependsOn),
            Relation::new(b, a, RelationType::DependsOn),
        ]);

        let dot = render_dot(&graph);
        assert!(dot.contains("color=red"));

        let text = render_graph_text(&graph);
        assert!(text.contains("Cycles:"));
    }
}
