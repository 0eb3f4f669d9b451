use std::time::Duration;

use async_trait::async_trait;
use rekindle_domain::{Event, ResourceDoc, ResourceId};

use crate::error::ClusterError;

/// The narrow cluster interface the engine consumes.
///
/// Everything the recovery controller does to a cluster goes through these
/// methods; the real client, its auth and its reconnect logic live behind
/// this trait. Implementations must be safe to share across tasks.
#[async_trait]
pub trait ClusterAccess: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Fetch the next slice of cluster events. Delivery is at-least-once;
    /// the correlator deduplicates.
    async fn list_events(&self, namespace: Option<&str>) -> Result<Vec<Event>, ClusterError>;

    async fn list_resources(
        &self,
        kind: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<ResourceDoc>, ClusterError>;

    async fn read_custom_object(
        &self,
        group: &str,
        version: &str,
        plural: &str,
        namespace: &str,
        name: &str,
    ) -> Result<ResourceDoc, ClusterError>;

    /// Server-side apply of a manifest. `dry_run` validates without
    /// persisting.
    async fn apply(&self, doc: &ResourceDoc, dry_run: bool) -> Result<(), ClusterError>;

    async fn delete(
        &self,
        id: &ResourceId,
        grace_period_seconds: Option<u64>,
    ) -> Result<(), ClusterError>;

    /// Block until the workload's rollout succeeds or the timeout elapses.
    /// Only meaningful for kinds that expose rollout status.
    async fn wait_for_rollout(&self, id: &ResourceId, timeout: Duration)
        -> Result<(), ClusterError>;

    async fn create_event(&self, namespace: &str, event: &Event) -> Result<(), ClusterError>;
}
