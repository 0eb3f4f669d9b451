use rekindle_domain::{ResourceId, Severity};
use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::graph::DependencyGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Complexity::Low => write!(f, "low"),
            Complexity::Medium => write!(f, "medium"),
            Complexity::High => write!(f, "high"),
        }
    }
}

/// Blast-radius report for one failed resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Impact {
    pub failed_resource: ResourceId,
    pub direct_affected: usize,
    pub total_affected: usize,
    pub affected: Vec<ResourceId>,
    pub critical_affected: Vec<ResourceId>,
    pub complexity: Complexity,
    pub circular_dependency: bool,
    pub estimated_recovery: String,
}

impl DependencyGraph {
    /// Analyze the blast radius of a failed resource.
    pub fn analyze_impact(&self, id: &ResourceId) -> Result<Impact, GraphError> {
        let node = self
            .node(id)
            .ok_or_else(|| GraphError::UnknownResource(id.clone()))?;

        let affected = self.transitive_dependents(id);
        let critical_affected: Vec<ResourceId> = affected
            .iter()
            .filter(|r| {
                let dependents = self.node(r).map(|n| n.dependents.len()).unwrap_or(0);
                r.is_critical_namespace()
                    || matches!(r.kind.as_str(), "Service" | "Ingress")
                    || dependents > 3
            })
            .cloned()
            .collect();

        let circular_dependency = self.cycles().iter().any(|cycle| cycle.contains(id));

        let (complexity, estimated_recovery) = if circular_dependency {
            (Complexity::High, "15-25 minutes")
        } else if affected.len() > 10 {
            (Complexity::High, "20-30 minutes")
        } else if affected.len() > 5 {
            (Complexity::Medium, "10-20 minutes")
        } else {
            (Complexity::Low, "5-10 minutes")
        };

        Ok(Impact {
            failed_resource: id.clone(),
            direct_affected: node.dependents.len(),
            total_affected: affected.len(),
            affected: affected.into_iter().collect(),
            critical_affected,
            complexity,
            circular_dependency,
            estimated_recovery: estimated_recovery.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Relation, RelationType};
    use rekindle_domain::ResourceState;

    fn id(kind: &str, name: &str) -> ResourceId {
        ResourceId::namespaced(kind, name, "default")
    }

    #[test]
    fn unknown_resource_is_an_error() {
        let graph = DependencyGraph::new();
        let result = graph.analyze_impact(&id("Deployment", "missing"));
        assert!(matches!(result, Err(GraphError::UnknownResource(_))));
    }

    #[test]
    fn chain_impact_counts_direct_and_transitive() {
        let cm = id("ConfigMap", "app-config");
        let d = id("Deployment", "app");
        let s = id("Service", "app");
        let mut graph = DependencyGraph::new();
        graph.add_relations([
            Relation::new(d.clone(), cm.clone(), RelationType::References),
            Relation::new(s.clone(), d.clone(), RelationType::RoutesTo),
        ]);

        let impact = graph.analyze_impact(&cm).unwrap();
        assert_eq!(impact.direct_affected, 1);
        assert_eq!(impact.total_affected, 2);
        assert_eq!(impact.complexity, Complexity::Low);
        assert!(!impact.circular_dependency);
        // The Service dependent counts as critical.
        assert_eq!(impact.critical_affected, vec![s]);
    }

    #[test]
    fn wide_fanout_raises_complexity() {
        let secret = id("Secret", "shared-tls");
        let mut graph = DependencyGraph::new();
        let mut relations = Vec::new();
        for i in 0..12 {
            let dep = id("Deployment", &format!("app-{i}"));
            relations.push(Relation::new(
                dep,
                secret.clone(),
                RelationType::References,
            ));
        }
        graph.add_relations(relations);

        let impact = graph.analyze_impact(&secret).unwrap();
        assert_eq!(impact.total_affected, 12);
        assert_eq!(impact.complexity, Complexity::High);
    }

    #[test]
    fn cycle_membership_forces_high_complexity() {
        let x = id("Kustomization", "x");
        let y = id("Kustomization", "y");
        let mut graph = DependencyGraph::new();
        graph.add_relations([
            Relation::new(x.clone(), y.clone(), RelationType::DependsOn),
            Relation::new(y.clone(), x.clone(), RelationType::DependsOn),
        ]);

        let impact = graph.analyze_impact(&x).unwrap();
        assert!(impact.circular_dependency);
        assert_eq!(impact.complexity, Complexity::High);
    }

    #[test]
    fn isolated_resource_has_empty_impact() {
        let cm = id("ConfigMap", "lonely");
        let mut graph = DependencyGraph::new();
        graph.add_resource(cm.clone(), ResourceState::Failed);

        let impact = graph.analyze_impact(&cm).unwrap();
        assert_eq!(impact.direct_affected, 0);
        assert_eq!(impact.total_affected, 0);
        assert!(impact.critical_affected.is_empty());
    }
}
