use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Opaque parsed resource manifest — any JSON value.
pub type ResourceDoc = serde_json::Value;

/// Namespaces whose resources carry extra weight in priorities, confidence
/// scoring and risk assessment.
pub const CRITICAL_NAMESPACES: &[&str] = &["flux-system", "kube-system", "longhorn-system"];

/// Custom resource kinds owned by the declarative manager.
pub const MANAGER_KINDS: &[&str] = &[
    "Kustomization",
    "HelmRelease",
    "GitRepository",
    "HelmRepository",
    "OCIRepository",
    "Bucket",
    "HelmChart",
];

/// Source components of the manager's controllers, as they appear on events.
pub const MANAGER_SOURCE_COMPONENTS: &[&str] = &[
    "kustomize-controller",
    "helm-controller",
    "source-controller",
    "notification-controller",
];

// ── Identifiers ──────────────────────────────────────────────────────────────

/// Canonical identity of a cluster resource.
///
/// Equality and hashing use all four fields. The string form is
/// `namespace/kind/name`, with `(cluster)` standing in for cluster-scoped
/// resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
    pub api_version: String,
}

impl ResourceId {
    pub fn new(kind: impl Into<String>, name: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.map(String::from),
            api_version: "v1".to_string(),
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Namespaced convenience constructor.
    pub fn namespaced(
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: Some(namespace.into()),
            api_version: "v1".to_string(),
        }
    }

    pub fn is_critical_namespace(&self) -> bool {
        self.namespace
            .as_deref()
            .is_some_and(|ns| CRITICAL_NAMESPACES.contains(&ns))
    }

    pub fn is_manager_kind(&self) -> bool {
        MANAGER_KINDS.contains(&self.kind.as_str())
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ns = self.namespace.as_deref().unwrap_or("(cluster)");
        write!(f, "{}/{}/{}", ns, self.kind, self.name)
    }
}

impl FromStr for ResourceId {
    type Err = DomainError;

    /// Parse the canonical `namespace/kind/name` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [ns, kind, name] if !kind.is_empty() && !name.is_empty() => {
                let namespace = if *ns == "(cluster)" || ns.is_empty() {
                    None
                } else {
                    Some(*ns)
                };
                Ok(ResourceId::new(*kind, *name, namespace))
            }
            _ => Err(DomainError::InvalidResourceId(s.to_string())),
        }
    }
}

// ── Enums ─────────────────────────────────────────────────────────────────────

/// Lifecycle state of a resource node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    Healthy,
    Degraded,
    Failed,
    Stuck,
    PendingCleanup,
    CleaningUp,
    Recreating,
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceState::Healthy => "healthy",
            ResourceState::Degraded => "degraded",
            ResourceState::Failed => "failed",
            ResourceState::Stuck => "stuck",
            ResourceState::PendingCleanup => "pending_cleanup",
            ResourceState::CleaningUp => "cleaning_up",
            ResourceState::Recreating => "recreating",
        };
        write!(f, "{}", s)
    }
}

/// Severity attached to patterns, relations and escalations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}
