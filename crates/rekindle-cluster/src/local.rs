use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rekindle_domain::{Event, ResourceDoc, ResourceId};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cluster::ClusterAccess;
use crate::error::ClusterError;

#[derive(Debug, Default)]
struct Inner {
    /// Documents applied (non-dry-run), keyed by `namespace/kind/name`.
    applied: HashMap<String, ResourceDoc>,
    apply_log: Vec<String>,
    dry_run_log: Vec<String>,
    deleted: Vec<ResourceId>,
    created_events: Vec<(String, Event)>,
    queued_events: VecDeque<Event>,
    resources: HashMap<String, Vec<ResourceDoc>>,
    custom_objects: HashMap<String, ResourceDoc>,
    /// Remaining scripted apply failures per resource key.
    apply_failures: HashMap<String, u32>,
    rollout_timeouts: HashSet<String>,
}

/// An in-memory cluster that simulates the access interface.
///
/// - Applies are recorded; deletes are recorded and never fail on absence.
/// - Failures can be scripted per resource to exercise retry and rollback.
/// - Performs no actual I/O.
#[derive(Debug, Clone, Default)]
pub struct LocalCluster {
    inner: Arc<RwLock<Inner>>,
}

fn doc_key(doc: &ResourceDoc) -> String {
    let kind = doc.get("kind").and_then(Value::as_str).unwrap_or("Unknown");
    let name = doc
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let namespace = doc
        .pointer("/metadata/namespace")
        .and_then(Value::as_str)
        .unwrap_or("(cluster)");
    format!("{namespace}/{kind}/{name}")
}

fn id_key(id: &ResourceId) -> String {
    id.to_string()
}

impl LocalCluster {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Scripting ─────────────────────────────────────────────────────────────

    /// Fail the next `times` applies of the resource with an API error.
    pub async fn fail_apply(&self, id: &ResourceId, times: u32) {
        self.inner
            .write()
            .await
            .apply_failures
            .insert(id_key(id), times);
    }

    /// Make every rollout wait for the resource time out.
    pub async fn fail_rollout(&self, id: &ResourceId) {
        self.inner
            .write()
            .await
            .rollout_timeouts
            .insert(id_key(id));
    }

    pub async fn push_event(&self, event: Event) {
        self.inner.write().await.queued_events.push_back(event);
    }

    pub async fn insert_resource(&self, kind: &str, doc: ResourceDoc) {
        self.inner
            .write()
            .await
            .resources
            .entry(kind.to_string())
            .or_default()
            .push(doc);
    }

    pub async fn insert_custom_object(&self, plural: &str, namespace: &str, name: &str, doc: ResourceDoc) {
        self.inner
            .write()
            .await
            .custom_objects
            .insert(format!("{plural}/{namespace}/{name}"), doc);
    }

    // ── Inspection ────────────────────────────────────────────────────────────

    pub async fn applied(&self) -> Vec<String> {
        self.inner.read().await.apply_log.clone()
    }

    pub async fn dry_runs(&self) -> Vec<String> {
        self.inner.read().await.dry_run_log.clone()
    }

    pub async fn deleted(&self) -> Vec<ResourceId> {
        self.inner.read().await.deleted.clone()
    }

    pub async fn created_events(&self) -> Vec<(String, Event)> {
        self.inner.read().await.created_events.clone()
    }
}

#[async_trait]
impl ClusterAccess for LocalCluster {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn list_events(&self, namespace: Option<&str>) -> Result<Vec<Event>, ClusterError> {
        let mut inner = self.inner.write().await;
        let events: Vec<Event> = inner.queued_events.drain(..).collect();
        Ok(match namespace {
            Some(ns) => events.into_iter().filter(|e| e.namespace == ns).collect(),
            None => events,
        })
    }

    async fn list_resources(
        &self,
        kind: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<ResourceDoc>, ClusterError> {
        let inner = self.inner.read().await;
        let docs = inner.resources.get(kind).cloned().unwrap_or_default();
        Ok(match namespace {
            Some(ns) => docs
                .into_iter()
                .filter(|d| d.pointer("/metadata/namespace").and_then(Value::as_str) == Some(ns))
                .collect(),
            None => docs,
        })
    }

    async fn read_custom_object(
        &self,
        _group: &str,
        _version: &str,
        plural: &str,
        namespace: &str,
        name: &str,
    ) -> Result<ResourceDoc, ClusterError> {
        let inner = self.inner.read().await;
        inner
            .custom_objects
            .get(&format!("{plural}/{namespace}/{name}"))
            .cloned()
            .ok_or_else(|| ClusterError::NotFound(format!("{plural}/{namespace}/{name}")))
    }

    async fn apply(&self, doc: &ResourceDoc, dry_run: bool) -> Result<(), ClusterError> {
        let key = doc_key(doc);
        let mut inner = self.inner.write().await;

        if let Some(remaining) = inner.apply_failures.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                debug!(resource = %key, dry_run, "LocalCluster: scripted apply failure");
                return Err(ClusterError::Api(format!("scripted apply failure for {key}")));
            }
        }

        if dry_run {
            debug!(resource = %key, "LocalCluster: dry-run apply");
            inner.dry_run_log.push(key);
        } else {
            debug!(resource = %key, "LocalCluster: apply");
            inner.apply_log.push(key.clone());
            inner.applied.insert(key, doc.clone());
        }
        Ok(())
    }

    async fn delete(
        &self,
        id: &ResourceId,
        _grace_period_seconds: Option<u64>,
    ) -> Result<(), ClusterError> {
        let mut inner = self.inner.write().await;
        debug!(resource = %id, "LocalCluster: delete");
        inner.applied.remove(&id_key(id));
        inner.deleted.push(id.clone());
        Ok(())
    }

    async fn wait_for_rollout(
        &self,
        id: &ResourceId,
        timeout: Duration,
    ) -> Result<(), ClusterError> {
        let inner = self.inner.read().await;
        if inner.rollout_timeouts.contains(&id_key(id)) {
            return Err(ClusterError::Timeout(format!(
                "rollout of {id} did not complete within {}s",
                timeout.as_secs()
            )));
        }
        debug!(resource = %id, "LocalCluster: rollout complete");
        Ok(())
    }

    async fn create_event(&self, namespace: &str, event: &Event) -> Result<(), ClusterError> {
        let mut inner = self.inner.write().await;
        debug!(namespace, reason = %event.reason, "LocalCluster: create_event");
        inner
            .created_events
            .push((namespace.to_string(), event.clone()));
        Ok(())
    }
}
