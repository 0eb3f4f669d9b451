use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rekindle_domain::{ResourceId, ResourceState, Severity};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// Priority weights. The absolute values are tunable; only their relative
// ordering is load-bearing (see the ordering tests).
const DEPENDENT_WEIGHT_CLEANUP: i64 = 10;
const DEPENDENCY_PENALTY_CLEANUP: i64 = 5;
const DEPENDENT_WEIGHT_RECREATION: i64 = 3;
const FEW_DEPENDENCIES_WEIGHT: i64 = 5;
const CRITICAL_NAMESPACE_BONUS: i64 = 25;

// ── Relations ─────────────────────────────────────────────────────────────────

/// How strongly an edge constrains ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Must be resolved before proceeding.
    Hard,
    /// Preferred order but not blocking.
    Soft,
    /// Participates in a detected cycle.
    Circular,
}

/// Semantic label on an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Owns,
    References,
    SourcesFrom,
    ChartFrom,
    DependsOn,
    ValuesFrom,
    MountsVolume,
    RoutesTo,
    UsesTlsSecret,
    UsesStorageClass,
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RelationType::Owns => "owns",
            RelationType::References => "references",
            RelationType::SourcesFrom => "sources_from",
            RelationType::ChartFrom => "chart_from",
            RelationType::DependsOn => "depends_on",
            RelationType::ValuesFrom => "values_from",
            RelationType::MountsVolume => "mounts_volume",
            RelationType::RoutesTo => "routes_to",
            RelationType::UsesTlsSecret => "uses_tls_secret",
            RelationType::UsesStorageClass => "uses_storage_class",
        };
        write!(f, "{}", s)
    }
}

/// A directed dependency: `source` needs `target`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub source: ResourceId,
    pub target: ResourceId,
    pub kind: DependencyKind,
    pub relation_type: RelationType,
    /// Ranking input when a cycle must be broken. 0.0..=1.0.
    pub strength: f64,
    /// Reported in impact documents; never used for ordering.
    pub risk: Severity,
    pub field_path: Option<String>,
    pub reason: Option<String>,
}

impl Relation {
    pub fn new(source: ResourceId, target: ResourceId, relation_type: RelationType) -> Self {
        Self {
            source,
            target,
            kind: DependencyKind::Hard,
            relation_type,
            strength: 1.0,
            risk: Severity::Medium,
            field_path: None,
            reason: None,
        }
    }

    pub fn soft(mut self) -> Self {
        self.kind = DependencyKind::Soft;
        self
    }

    pub fn strength(mut self, strength: f64) -> Self {
        self.strength = strength.clamp(0.0, 1.0);
        self
    }

    pub fn risk(mut self, risk: Severity) -> Self {
        self.risk = risk;
        self
    }

    pub fn field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} --{}({:.1})--> {}",
            self.source, self.relation_type, self.strength, self.target
        )
    }
}

// ── Nodes ─────────────────────────────────────────────────────────────────────

/// A resource in the dependency graph.
///
/// `cleanup_priority` and `recreation_priority` are scratch values recomputed
/// by every ordering call; they are not meaningful between calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceNode {
    pub id: ResourceId,
    pub state: ResourceState,
    pub dependencies: BTreeSet<ResourceId>,
    pub dependents: BTreeSet<ResourceId>,
    pub last_updated: DateTime<Utc>,
    pub cleanup_priority: i64,
    pub recreation_priority: i64,
    pub metadata: HashMap<String, String>,
}

impl ResourceNode {
    fn new(id: ResourceId, state: ResourceState) -> Self {
        Self {
            id,
            state,
            dependencies: BTreeSet::new(),
            dependents: BTreeSet::new(),
            last_updated: Utc::now(),
            cleanup_priority: 0,
            recreation_priority: 0,
            metadata: HashMap::new(),
        }
    }

    fn kind_bonus_cleanup(&self) -> i64 {
        match self.id.kind.as_str() {
            "Service" | "Ingress" => 50,
            "Deployment" | "StatefulSet" => 30,
            "ConfigMap" | "Secret" => 20,
            _ => 0,
        }
    }

    fn kind_bonus_recreation(&self) -> i64 {
        match self.id.kind.as_str() {
            "ConfigMap" | "Secret" => 50,
            "Service" => 40,
            "Deployment" | "StatefulSet" => 30,
            "Ingress" => 20,
            _ => 0,
        }
    }
}

// ── Graph ─────────────────────────────────────────────────────────────────────

/// The dependency graph over cluster resources.
///
/// Nodes own no cross-pointers: relations are value-typed identifier pairs and
/// every lookup goes through the single `nodes` map.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: HashMap<ResourceId, ResourceNode>,
    relations: Vec<Relation>,
    cycles: Vec<Vec<ResourceId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &ResourceId) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn cycles(&self) -> &[Vec<ResourceId>] {
        &self.cycles
    }

    /// Add a resource, or refresh its state if already present.
    pub fn add_resource(&mut self, id: ResourceId, state: ResourceState) {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.state = state;
                node.last_updated = Utc::now();
            }
            None => {
                debug!(resource = %id, "added resource to graph");
                self.nodes.insert(id.clone(), ResourceNode::new(id, state));
            }
        }
    }

    pub fn set_state(&mut self, id: &ResourceId, state: ResourceState) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.state = state;
            node.last_updated = Utc::now();
        }
    }

    /// Add a single relation. Cycle detection is deferred; call
    /// [`DependencyGraph::detect_cycles`] (or use [`DependencyGraph::add_relations`])
    /// after a batch of insertions.
    ///
    /// Endpoints missing from the graph are created `Healthy`. A relation that
    /// duplicates an existing `(source, target, relation_type)` tuple is
    /// dropped, which keeps re-discovery idempotent.
    pub fn add_relation(&mut self, relation: Relation) {
        let duplicate = self.relations.iter().any(|r| {
            r.source == relation.source
                && r.target == relation.target
                && r.relation_type == relation.relation_type
        });
        if duplicate {
            debug!(relation = %relation, "skipping duplicate relation");
            return;
        }

        if !self.nodes.contains_key(&relation.source) {
            self.add_resource(relation.source.clone(), ResourceState::Healthy);
        }
        if !self.nodes.contains_key(&relation.target) {
            self.add_resource(relation.target.clone(), ResourceState::Healthy);
        }

        if let Some(node) = self.nodes.get_mut(&relation.source) {
            node.dependencies.insert(relation.target.clone());
        }
        if let Some(node) = self.nodes.get_mut(&relation.target) {
            node.dependents.insert(relation.source.clone());
        }

        debug!(relation = %relation, "added relation");
        self.relations.push(relation);
    }

    /// Insert a batch of relations, then re-run cycle detection once.
    pub fn add_relations(&mut self, relations: impl IntoIterator<Item = Relation>) {
        for relation in relations {
            self.add_relation(relation);
        }
        self.detect_cycles();
    }

    /// Detect strongly connected components and tag every edge whose endpoints
    /// share a component of size > 1 as [`DependencyKind::Circular`].
    ///
    /// Idempotent: re-running on an unchanged graph yields the same cycles and
    /// the same set of circular edges.
    pub fn detect_cycles(&mut self) {
        let mut digraph: DiGraph<ResourceId, ()> = DiGraph::new();
        let mut index_of: HashMap<ResourceId, NodeIndex> = HashMap::new();

        for id in self.nodes.keys() {
            let idx = digraph.add_node(id.clone());
            index_of.insert(id.clone(), idx);
        }
        for relation in &self.relations {
            let from = index_of[&relation.source];
            let to = index_of[&relation.target];
            digraph.add_edge(from, to, ());
        }

        let mut component_of: HashMap<ResourceId, usize> = HashMap::new();
        let mut cycles = Vec::new();
        for (i, component) in tarjan_scc(&digraph).into_iter().enumerate() {
            if component.len() > 1 {
                let mut members: Vec<ResourceId> =
                    component.iter().map(|idx| digraph[*idx].clone()).collect();
                members.sort();
                for member in &members {
                    component_of.insert(member.clone(), i);
                }
                cycles.push(members);
            }
        }
        cycles.sort();
        self.cycles = cycles;

        for relation in &mut self.relations {
            let same_component = match (
                component_of.get(&relation.source),
                component_of.get(&relation.target),
            ) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            };
            if same_component && relation.kind != DependencyKind::Circular {
                warn!(relation = %relation, "circular dependency detected");
                relation.kind = DependencyKind::Circular;
            }
        }
    }

    /// All resources that transitively depend on `id` (BFS over dependents).
    pub fn transitive_dependents(&self, id: &ResourceId) -> BTreeSet<ResourceId> {
        let mut visited: HashSet<ResourceId> = HashSet::new();
        let mut result = BTreeSet::new();
        let mut queue: VecDeque<ResourceId> = VecDeque::new();
        queue.push_back(id.clone());

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(node) = self.nodes.get(&current) {
                for dependent in &node.dependents {
                    if result.insert(dependent.clone()) {
                        queue.push_back(dependent.clone());
                    }
                }
            }
        }
        result
    }

    /// Whether the `source -> target` edge blocks ordering (hard or circular;
    /// soft edges are ordering hints only).
    fn is_blocking(&self, source: &ResourceId, target: &ResourceId) -> bool {
        self.relations.iter().any(|r| {
            &r.source == source && &r.target == target && r.kind != DependencyKind::Soft
        })
    }

    /// Cleanup order for a set of failed resources: batches that can be torn
    /// down in parallel, dependents strictly before the resources they depend
    /// on.
    ///
    /// The subgraph covers the failed set plus everything transitively
    /// depending on it; Kahn's algorithm runs on the reversed graph with
    /// batches sorted by cleanup priority.
    pub fn cleanup_order(&mut self, failed: &BTreeSet<ResourceId>) -> Vec<Vec<ResourceId>> {
        if failed.is_empty() {
            return Vec::new();
        }

        let mut subgraph: BTreeSet<ResourceId> = BTreeSet::new();
        for id in failed {
            subgraph.insert(id.clone());
            subgraph.extend(self.transitive_dependents(id));
        }
        subgraph.retain(|id| self.nodes.contains_key(id));

        self.compute_cleanup_priorities(&subgraph);

        // Reversed graph: a resource waits for its (blocking) dependents.
        let mut preds: HashMap<ResourceId, BTreeSet<ResourceId>> = HashMap::new();
        let mut priorities: HashMap<ResourceId, i64> = HashMap::new();
        for id in &subgraph {
            let Some(node) = self.nodes.get(id) else { continue };
            priorities.insert(id.clone(), node.cleanup_priority);
            let p = node
                .dependents
                .iter()
                .filter(|d| subgraph.contains(*d) && self.is_blocking(d, id))
                .cloned()
                .collect();
            preds.insert(id.clone(), p);
        }

        let batches = kahn_batches(preds, &priorities);
        debug!(
            failed = failed.len(),
            batches = batches.len(),
            "computed cleanup order"
        );
        batches
    }

    /// Recreation order: the same batching on the forward graph, foundational
    /// resources first.
    pub fn recreation_order(&mut self, to_recreate: &BTreeSet<ResourceId>) -> Vec<Vec<ResourceId>> {
        if to_recreate.is_empty() {
            return Vec::new();
        }

        let subgraph: BTreeSet<ResourceId> = to_recreate
            .iter()
            .filter(|id| self.nodes.contains_key(id))
            .cloned()
            .collect();

        self.compute_recreation_priorities(&subgraph);

        let mut preds: HashMap<ResourceId, BTreeSet<ResourceId>> = HashMap::new();
        let mut priorities: HashMap<ResourceId, i64> = HashMap::new();
        for id in &subgraph {
            let Some(node) = self.nodes.get(id) else { continue };
            priorities.insert(id.clone(), node.recreation_priority);
            let p = node
                .dependencies
                .iter()
                .filter(|d| subgraph.contains(*d) && self.is_blocking(id, d))
                .cloned()
                .collect();
            preds.insert(id.clone(), p);
        }

        let batches = kahn_batches(preds, &priorities);
        debug!(
            resources = to_recreate.len(),
            batches = batches.len(),
            "computed recreation order"
        );
        batches
    }

    fn compute_cleanup_priorities(&mut self, set: &BTreeSet<ResourceId>) {
        for id in set {
            if let Some(node) = self.nodes.get(id) {
                let mut priority = node.dependents.len() as i64 * DEPENDENT_WEIGHT_CLEANUP;
                priority += node.kind_bonus_cleanup();
                if id.is_critical_namespace() {
                    priority += CRITICAL_NAMESPACE_BONUS;
                }
                priority -= node.dependencies.len() as i64 * DEPENDENCY_PENALTY_CLEANUP;
                if let Some(node) = self.nodes.get_mut(id) {
                    node.cleanup_priority = priority;
                }
            }
        }
    }

    fn compute_recreation_priorities(&mut self, set: &BTreeSet<ResourceId>) {
        for id in set {
            if let Some(node) = self.nodes.get(id) {
                let mut priority =
                    (10 - node.dependencies.len() as i64).max(0) * FEW_DEPENDENCIES_WEIGHT;
                priority += node.kind_bonus_recreation();
                if id.is_critical_namespace() {
                    priority += CRITICAL_NAMESPACE_BONUS;
                }
                priority += node.dependents.len() as i64 * DEPENDENT_WEIGHT_RECREATION;
                if let Some(node) = self.nodes.get_mut(id) {
                    node.recreation_priority = priority;
                }
            }
        }
    }
}

/// Kahn's algorithm over a predecessor map. Nodes with in-degree 0 are
/// emitted together, sorted by descending priority (ties broken by
/// identifier for determinism). When only a cycle remains, the single
/// highest-priority member is emitted alone to break it.
fn kahn_batches(
    preds: HashMap<ResourceId, BTreeSet<ResourceId>>,
    priorities: &HashMap<ResourceId, i64>,
) -> Vec<Vec<ResourceId>> {
    let priority = |id: &ResourceId| priorities.get(id).copied().unwrap_or(0);

    let mut in_degree: HashMap<ResourceId, usize> = preds
        .iter()
        .map(|(id, p)| (id.clone(), p.len()))
        .collect();

    let mut batches: Vec<Vec<ResourceId>> = Vec::new();
    while !in_degree.is_empty() {
        let mut batch: Vec<ResourceId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| id.clone())
            .collect();

        if batch.is_empty() {
            // Pure cycle left: break it on the highest-priority member.
            let candidate = in_degree
                .keys()
                .max_by(|a, b| priority(a).cmp(&priority(b)).then_with(|| b.cmp(a)))
                .cloned();
            let Some(candidate) = candidate else { break };
            let members: Vec<String> = in_degree.keys().map(|id| id.to_string()).collect();
            warn!(
                chosen = %candidate,
                cycle_members = ?members,
                "breaking dependency cycle"
            );
            batch.push(candidate);
        }

        batch.sort_by(|a, b| priority(b).cmp(&priority(a)).then_with(|| a.cmp(b)));

        for id in &batch {
            in_degree.remove(id);
        }
        for (other, degree) in in_degree.iter_mut() {
            let removed = batch
                .iter()
                .filter(|id| preds.get(other).is_some_and(|p| p.contains(*id)))
                .count();
            *degree = degree.saturating_sub(removed);
        }

        batches.push(batch);
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(kind: &str, name: &str) -> ResourceId {
        ResourceId::namespaced(kind, name, "default")
    }

    fn relation(source: &ResourceId, target: &ResourceId) -> Relation {
        Relation::new(source.clone(), target.clone(), RelationType::References)
    }

    /// CM <- D <- S <- I, the classic app chain.
    fn linear_chain() -> (DependencyGraph, Vec<ResourceId>) {
        let cm = id("ConfigMap", "app-config");
        let d = id("Deployment", "app-deployment");
        let s = id("Service", "app-service");
        let i = id("Ingress", "app-ingress");

        let mut graph = DependencyGraph::new();
        graph.add_relations([
            relation(&d, &cm),
            relation(&s, &d),
            relation(&i, &s),
        ]);
        (graph, vec![cm, d, s, i])
    }

    fn batch_index(batches: &[Vec<ResourceId>], id: &ResourceId) -> usize {
        batches
            .iter()
            .position(|b| b.contains(id))
            .unwrap_or_else(|| panic!("{} not in any batch", id))
    }

    #[test]
    fn relation_endpoints_auto_created_healthy() {
        let mut graph = DependencyGraph::new();
        graph.add_relation(relation(&id("Service", "s"), &id("Deployment", "d")));
        assert_eq!(graph.len(), 2);
        assert_eq!(
            graph.node(&id("Deployment", "d")).unwrap().state,
            ResourceState::Healthy
        );
    }

    #[test]
    fn node_sets_mirror_relations() {
        let (graph, ids) = linear_chain();
        // every s -> t: t in deps(s), s in dependents(t)
        for r in graph.relations() {
            assert!(graph.node(&r.source).unwrap().dependencies.contains(&r.target));
            assert!(graph.node(&r.target).unwrap().dependents.contains(&r.source));
        }
        assert_eq!(graph.node(&ids[0]).unwrap().dependents.len(), 1);
    }

    #[test]
    fn duplicate_relation_dropped() {
        let mut graph = DependencyGraph::new();
        let s = id("Service", "s");
        let d = id("Deployment", "d");
        graph.add_relation(relation(&s, &d));
        graph.add_relation(relation(&s, &d));
        assert_eq!(graph.relations().len(), 1);
    }

    #[test]
    fn recreation_order_linear_chain() {
        let (mut graph, ids) = linear_chain();
        let set: BTreeSet<_> = ids.iter().cloned().collect();
        let batches = graph.recreation_order(&set);
        assert_eq!(batches.len(), 4);
        assert_eq!(batches[0], vec![ids[0].clone()]); // ConfigMap
        assert_eq!(batches[1], vec![ids[1].clone()]); // Deployment
        assert_eq!(batches[2], vec![ids[2].clone()]); // Service
        assert_eq!(batches[3], vec![ids[3].clone()]); // Ingress
    }

    #[test]
    fn cleanup_order_is_reverse_of_recreation_for_chain() {
        let (mut graph, ids) = linear_chain();
        // Failure of the deployment pulls in its transitive dependents.
        let failed: BTreeSet<_> = [ids[1].clone()].into_iter().collect();
        let batches = graph.cleanup_order(&failed);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0], vec![ids[3].clone()]); // Ingress first
        assert_eq!(batches[1], vec![ids[2].clone()]);
        assert_eq!(batches[2], vec![ids[1].clone()]);
    }

    #[test]
    fn diamond_recreation_batches() {
        // A <- B, A <- C, B <- D, C <- D
        let a = id("ConfigMap", "a");
        let b = id("Deployment", "b");
        let c = id("Service", "c");
        let d = id("Ingress", "d");
        let mut graph = DependencyGraph::new();
        graph.add_relations([
            relation(&b, &a),
            relation(&c, &a),
            relation(&d, &b),
            relation(&d, &c),
        ]);

        let set: BTreeSet<_> = [a.clone(), b.clone(), c.clone(), d.clone()]
            .into_iter()
            .collect();
        let batches = graph.recreation_order(&set);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0], vec![a.clone()]);
        assert_eq!(batches[1].len(), 2);
        assert!(batches[1].contains(&b) && batches[1].contains(&c));
        // Within the middle batch, the Service outranks the Deployment.
        assert_eq!(batches[1][0], c);
        assert_eq!(batches[2], vec![d]);
    }

    #[test]
    fn dependency_direction_holds_across_both_orders() {
        let (mut graph, ids) = linear_chain();
        let set: BTreeSet<_> = ids.iter().cloned().collect();

        let recreation = graph.recreation_order(&set);
        let cleanup = graph.cleanup_order(&set);
        for r in graph.relations() {
            // a depends on b: b earlier in recreation, a earlier in cleanup
            assert!(batch_index(&recreation, &r.target) < batch_index(&recreation, &r.source));
            assert!(batch_index(&cleanup, &r.source) < batch_index(&cleanup, &r.target));
        }
    }

    #[test]
    fn batch_count_bounded_by_longest_path() {
        let (mut graph, ids) = linear_chain();
        let set: BTreeSet<_> = ids.iter().cloned().collect();
        let batches = graph.recreation_order(&set);
        // longest path has 4 nodes -> at most 4 batches
        assert!(batches.len() <= 4);
    }

    #[test]
    fn cycle_edges_tagged_circular() {
        let x = id("Kustomization", "x");
        let y = id("Kustomization", "y");
        let z = id("Kustomization", "z");
        let mut graph = DependencyGraph::new();
        graph.add_relations([
            relation(&x, &y),
            relation(&y, &z),
            relation(&z, &x),
        ]);

        assert_eq!(graph.cycles().len(), 1);
        assert_eq!(graph.cycles()[0].len(), 3);
        assert!(graph
            .relations()
            .iter()
            .all(|r| r.kind == DependencyKind::Circular));
    }

    #[test]
    fn cycle_detection_is_idempotent() {
        let x = id("Kustomization", "x");
        let y = id("Kustomization", "y");
        let mut graph = DependencyGraph::new();
        graph.add_relations([relation(&x, &y), relation(&y, &x)]);

        let cycles_first = graph.cycles().to_vec();
        let circular_first = graph
            .relations()
            .iter()
            .filter(|r| r.kind == DependencyKind::Circular)
            .count();
        graph.detect_cycles();
        assert_eq!(graph.cycles(), cycles_first.as_slice());
        let circular_second = graph
            .relations()
            .iter()
            .filter(|r| r.kind == DependencyKind::Circular)
            .count();
        assert_eq!(circular_first, circular_second);
    }

    #[test]
    fn edge_outside_cycle_stays_hard() {
        let x = id("Kustomization", "x");
        let y = id("Kustomization", "y");
        let other = id("ConfigMap", "other");
        let mut graph = DependencyGraph::new();
        graph.add_relations([
            relation(&x, &y),
            relation(&y, &x),
            relation(&x, &other),
        ]);
        let outside = graph
            .relations()
            .iter()
            .find(|r| r.target == other)
            .unwrap();
        assert_eq!(outside.kind, DependencyKind::Hard);
    }

    #[test]
    fn cycle_break_emits_singletons() {
        let x = id("Service", "x");
        let y = id("Deployment", "y");
        let z = id("ConfigMap", "z");
        let mut graph = DependencyGraph::new();
        graph.add_relations([
            relation(&x, &y),
            relation(&y, &z),
            relation(&z, &x),
        ]);

        let set: BTreeSet<_> = [x.clone(), y.clone(), z.clone()].into_iter().collect();
        let batches = graph.cleanup_order(&set);
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| b.len() == 1));
        // Highest cleanup priority (Service kind bonus) goes first.
        assert_eq!(batches[0], vec![x]);
    }

    #[test]
    fn soft_edges_do_not_block_ordering() {
        let a = id("ConfigMap", "a");
        let b = id("Deployment", "b");
        let mut graph = DependencyGraph::new();
        graph.add_relations([relation(&b, &a).soft()]);

        let set: BTreeSet<_> = [a.clone(), b.clone()].into_iter().collect();
        let batches = graph.recreation_order(&set);
        // A soft edge imposes no barrier: both fit in one batch.
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[test]
    fn transitive_dependents_walks_the_full_chain() {
        let (graph, ids) = linear_chain();
        let dependents = graph.transitive_dependents(&ids[0]);
        assert_eq!(dependents.len(), 3);
        assert!(!dependents.contains(&ids[0]));
    }
}
