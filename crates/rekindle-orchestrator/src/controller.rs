use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rekindle_cluster::{ClusterAccess, NotificationSink};
use rekindle_domain::{Event, EventType, InvolvedObject, ResourceDoc, ResourceId};
use rekindle_graph::DependencyGraph;
use rekindle_patterns::{
    Catalog, CorrelationInfo, EventCorrelator, HealthTracker, PatternHit, PatternMatcher,
    RecoveryState, RecoveryStatus,
};
use serde_json::Value;
use tokio::sync::{watch, Mutex, Semaphore};
use tracing::{debug, error, info, warn};

use crate::error::OrchestratorError;
use crate::escalate::escalate;
use crate::execute::{OrchestratorConfig, UpdateOrchestrator};

/// How often the event stream is polled.
const EVENT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Backoff cap for a failing event stream.
const MAX_STREAM_BACKOFF: Duration = Duration::from_secs(300);
/// Custom object kinds covered by the periodic stuck scan.
const STUCK_SCAN_KINDS: &[&str] = &["Kustomization", "HelmRelease"];

#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerMetrics {
    pub events_processed: u64,
    pub patterns_detected: u64,
    pub recoveries_triggered: u64,
    pub recoveries_successful: u64,
    pub recoveries_failed: u64,
    pub escalations: u64,
    pub suppressed_events: u64,
}

/// The recovery controller: watches cluster events, classifies failures,
/// tracks resource health and drives automatic recovery.
///
/// Lifecycle: construct with a loaded catalog, [`RecoveryController::run`]
/// the long-lived tasks, flip the shutdown flag to unwind. All state is
/// in-memory; after a restart it is rebuilt from the event stream and the
/// stuck scan.
pub struct RecoveryController {
    cluster: Arc<dyn ClusterAccess>,
    sink: Arc<dyn NotificationSink>,
    catalog: Catalog,
    correlator: Mutex<EventCorrelator>,
    matcher: Mutex<PatternMatcher>,
    health: Mutex<HealthTracker>,
    state: Mutex<RecoveryState>,
    graph: Mutex<DependencyGraph>,
    active_recoveries: Mutex<HashSet<String>>,
    /// Last recovery attempt per `(resource, pattern)`, for cooldown gating.
    cooldowns: Mutex<HashMap<(String, String), DateTime<Utc>>>,
    recovery_gate: Arc<Semaphore>,
    metrics: Mutex<ControllerMetrics>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl RecoveryController {
    pub fn new(
        cluster: Arc<dyn ClusterAccess>,
        sink: Arc<dyn NotificationSink>,
        catalog: Catalog,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let correlator = EventCorrelator::new(catalog.settings.correlation_window_seconds);
        let matcher = PatternMatcher::new(
            catalog.patterns.clone(),
            catalog.settings.pattern_match_threshold,
        );
        let recovery_gate = Arc::new(Semaphore::new(catalog.settings.max_concurrent_recoveries));

        Self {
            cluster,
            sink,
            catalog,
            correlator: Mutex::new(correlator),
            matcher: Mutex::new(matcher),
            health: Mutex::new(HealthTracker::new()),
            state: Mutex::new(RecoveryState::new()),
            graph: Mutex::new(DependencyGraph::new()),
            active_recoveries: Mutex::new(HashSet::new()),
            cooldowns: Mutex::new(HashMap::new()),
            recovery_gate,
            metrics: Mutex::new(ControllerMetrics::default()),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Request a clean unwind of every task.
    pub fn shutdown(&self) {
        info!("shutdown requested");
        let _ = self.shutdown_tx.send(true);
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    pub async fn metrics(&self) -> ControllerMetrics {
        let mut metrics = *self.metrics.lock().await;
        metrics.suppressed_events = self.correlator.lock().await.metrics().suppressed_events;
        metrics
    }

    pub async fn recovery_state(&self) -> Vec<rekindle_patterns::PatternMatch> {
        self.state.lock().await.iter().cloned().collect()
    }

    /// Run the event watcher and the periodic scanner until shutdown.
    pub async fn run(self: Arc<Self>) {
        info!(
            patterns = self.catalog.patterns.len(),
            auto_recovery = self.catalog.settings.auto_recovery_enabled,
            "starting recovery controller"
        );

        let watcher = {
            let controller = self.clone();
            tokio::spawn(async move { controller.watch_events().await })
        };
        let scanner = {
            let controller = self.clone();
            tokio::spawn(async move { controller.periodic_scan().await })
        };

        let _ = watcher.await;
        let _ = scanner.await;
        info!("recovery controller stopped");
    }

    /// Poll the event stream, with exponential backoff on stream errors.
    /// Delivery is at-least-once; the correlator deduplicates.
    async fn watch_events(&self) {
        let mut shutdown = self.shutdown_rx.clone();
        let mut backoff = EVENT_POLL_INTERVAL;

        loop {
            if *shutdown.borrow() {
                return;
            }
            match self.cluster.list_events(None).await {
                Ok(events) => {
                    backoff = EVENT_POLL_INTERVAL;
                    for event in events {
                        self.process_event(event).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "event stream error, backing off");
                    backoff = (backoff * 2).min(MAX_STREAM_BACKOFF);
                }
            }

            tokio::select! {
                _ = shutdown.changed() => return,
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }

    async fn periodic_scan(&self) {
        let mut shutdown = self.shutdown_rx.clone();
        let interval = Duration::from_secs(self.catalog.settings.check_interval_seconds);

        loop {
            tokio::select! {
                _ = shutdown.changed() => return,
                _ = tokio::time::sleep(interval) => {}
            }
            if *shutdown.borrow() {
                return;
            }

            self.check_stuck_reconciliations().await;

            let now = Utc::now();
            self.state
                .lock()
                .await
                .gc(self.catalog.settings.history_retention_hours, now);

            let metrics = self.metrics().await;
            debug!(
                events = metrics.events_processed,
                detected = metrics.patterns_detected,
                recoveries = metrics.recoveries_triggered,
                suppressed = metrics.suppressed_events,
                "periodic scan complete"
            );
        }
    }

    /// Feed one event through correlation, health tracking, classification
    /// and (when warranted) recovery.
    pub async fn process_event(&self, event: Event) {
        self.metrics.lock().await.events_processed += 1;

        if event.event_type != EventType::Warning || !event.is_manager_related() {
            return;
        }

        let (significant, correlation) = self.correlator.lock().await.add_event(&event);
        if !significant {
            debug!(signature = %correlation.signature, "event suppressed");
            return;
        }

        let now = Utc::now();
        self.health.lock().await.observe_event(&event, now);

        let hits = {
            let mut matcher = self.matcher.lock().await;
            let state = self.state.lock().await;
            matcher.classify(&event, &correlation, &state, now)
        };
        if hits.is_empty() {
            return;
        }

        self.metrics.lock().await.patterns_detected += hits.len() as u64;
        info!(
            resource = %event.resource_key(),
            matches = hits.len(),
            "error patterns detected"
        );

        for hit in hits {
            self.handle_hit(&event, hit, &correlation, now).await;
        }
    }

    async fn handle_hit(
        &self,
        event: &Event,
        hit: PatternHit,
        correlation: &CorrelationInfo,
        now: DateTime<Utc>,
    ) {
        let resource_key = event.resource_key();
        warn!(
            pattern = %hit.pattern_name,
            resource = %resource_key,
            confidence = hit.confidence,
            "error pattern detected"
        );

        let (already_escalated, needs_escalation, retries_left) = {
            let mut state = self.state.lock().await;
            let pm = state.record(
                &resource_key,
                &hit.pattern_name,
                hit.severity,
                &hit.recovery_action,
                hit.max_retries,
                &event.message,
                hit.confidence,
                correlation.related_events.clone(),
                now,
            );
            (
                pm.status == RecoveryStatus::ManualIntervention,
                pm.should_escalate(),
                pm.retry_count < pm.max_retries,
            )
        };
        self.health
            .lock()
            .await
            .record_error_pattern(&resource_key, &hit.pattern_name);

        if already_escalated {
            debug!(resource = %resource_key, "already under manual intervention");
            return;
        }

        if needs_escalation {
            let reason = if retries_left {
                "recurring_or_high_confidence_pattern"
            } else {
                "retry_limit_exceeded"
            };
            self.escalate_match(&resource_key, &hit.pattern_name, reason)
                .await;
            return;
        }

        if !self.should_trigger_recovery(&hit, correlation) {
            debug!(
                resource = %resource_key,
                confidence = hit.confidence,
                "recovery conditions not met"
            );
            return;
        }

        if self.in_cooldown(&resource_key, &hit.pattern_name, now).await {
            debug!(resource = %resource_key, "recovery in cooldown");
            return;
        }

        self.trigger_recovery(event, &hit, now).await;
    }

    fn should_trigger_recovery(&self, hit: &PatternHit, correlation: &CorrelationInfo) -> bool {
        let settings = &self.catalog.settings;
        if !settings.auto_recovery_enabled {
            return false;
        }
        if hit.confidence < settings.min_recovery_confidence {
            return false;
        }
        if !settings.auto_recovery_severities.contains(&hit.severity) {
            return false;
        }
        // A storm of recent occurrences means recovery would thrash.
        if correlation.frequency.recent_occurrences > 10 {
            warn!("too many recent occurrences, skipping auto-recovery");
            return false;
        }
        true
    }

    async fn in_cooldown(&self, resource_key: &str, pattern_name: &str, now: DateTime<Utc>) -> bool {
        let cooldowns = self.cooldowns.lock().await;
        match cooldowns.get(&(resource_key.to_string(), pattern_name.to_string())) {
            Some(last) => {
                (now - *last).num_seconds()
                    < self.catalog.settings.recovery_cooldown_seconds as i64
            }
            None => false,
        }
    }

    async fn trigger_recovery(&self, event: &Event, hit: &PatternHit, now: DateTime<Utc>) {
        let resource_key = event.resource_key();

        {
            let mut active = self.active_recoveries.lock().await;
            if !active.insert(resource_key.clone()) {
                info!(resource = %resource_key, "recovery already in progress");
                return;
            }
        }
        let permit = match self.recovery_gate.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.active_recoveries.lock().await.remove(&resource_key);
                return;
            }
        };

        info!(
            resource = %resource_key,
            action = %hit.recovery_action,
            "triggering recovery"
        );
        self.metrics.lock().await.recoveries_triggered += 1;
        self.cooldowns
            .lock()
            .await
            .insert((resource_key.clone(), hit.pattern_name.clone()), now);
        {
            let mut state = self.state.lock().await;
            if let Some(pm) = state.get_mut(&resource_key, &hit.pattern_name) {
                pm.status = RecoveryStatus::InProgress;
                pm.retry_count += 1;
            }
        }

        let success = self.execute_recovery(event, hit).await;

        let exhausted = {
            let mut state = self.state.lock().await;
            let mut exhausted = false;
            if let Some(pm) = state.get_mut(&resource_key, &hit.pattern_name) {
                let result = if success { "succeeded" } else { "failed" };
                pm.add_attempt(&hit.recovery_action, result, Utc::now());
                if success {
                    pm.status = RecoveryStatus::Succeeded;
                } else if pm.retry_count >= pm.max_retries {
                    pm.status = RecoveryStatus::RetryExhausted;
                    exhausted = true;
                } else {
                    pm.status = RecoveryStatus::Failed;
                }
            }
            exhausted
        };
        self.health
            .lock()
            .await
            .record_recovery_attempt(&resource_key);

        {
            let mut metrics = self.metrics.lock().await;
            if success {
                metrics.recoveries_successful += 1;
            } else {
                metrics.recoveries_failed += 1;
            }
        }

        if exhausted {
            self.escalate_match(&resource_key, &hit.pattern_name, "retry_exhausted")
                .await;
        }

        self.active_recoveries.lock().await.remove(&resource_key);
        drop(permit);
    }

    /// Run the configured recovery action through the update orchestrator.
    async fn execute_recovery(&self, event: &Event, hit: &PatternHit) -> bool {
        let Some(action) = self.catalog.action(&hit.recovery_action) else {
            error!(action = %hit.recovery_action, "recovery action not found");
            return false;
        };
        let Some(id) = event.resource_id() else {
            error!("event has no involved object, cannot recover");
            return false;
        };
        debug!(
            action = %hit.recovery_action,
            steps = action.steps.len(),
            "executing recovery action"
        );

        // The desired manifest, if the cluster can still produce it.
        let doc = self.desired_doc(&id).await;

        // The controller-level cooldown already paces recoveries; inner
        // operation retries only pay the transient backoff.
        let config = OrchestratorConfig {
            operation_timeout_seconds: action.timeout_seconds,
            retry_cooldown: Duration::ZERO,
            ..OrchestratorConfig::default()
        };
        let orchestrator = UpdateOrchestrator::with_shutdown(
            self.cluster.clone(),
            config,
            self.shutdown_rx.clone(),
        );

        match doc {
            Some(doc) => {
                let mut graph = self.graph.lock().await;
                let mut batches = orchestrator.plan_operations(&[doc], &mut graph);
                drop(graph);
                match orchestrator.execute(&mut batches).await {
                    Ok(ok) => ok,
                    Err(OrchestratorError::ShutdownRequested) => false,
                    Err(e) => {
                        error!(error = %e, "recovery execution failed");
                        false
                    }
                }
            }
            None => {
                // Without a manifest the best we can do is clear the broken
                // object and let the primary reconciler recreate it.
                info!(resource = %id, "no manifest available, deleting for re-reconciliation");
                match self.cluster.delete(&id, None).await {
                    Ok(()) => true,
                    Err(rekindle_cluster::ClusterError::NotFound(_)) => true,
                    Err(e) => {
                        error!(error = %e, "delete failed");
                        false
                    }
                }
            }
        }
    }

    async fn desired_doc(&self, id: &ResourceId) -> Option<ResourceDoc> {
        let docs = self
            .cluster
            .list_resources(&id.kind, id.namespace.as_deref())
            .await
            .ok()?;
        docs.into_iter().find(|doc| {
            doc.pointer("/metadata/name").and_then(Value::as_str) == Some(id.name.as_str())
        })
    }

    async fn escalate_match(&self, resource_key: &str, pattern_name: &str, reason: &str) {
        let mut state = self.state.lock().await;
        let Some(pm) = state.get_mut(resource_key, pattern_name) else {
            return;
        };
        if pm.status == RecoveryStatus::ManualIntervention {
            return;
        }
        match escalate(&*self.cluster, &*self.sink, pm, reason).await {
            Ok(()) => {
                self.metrics.lock().await.escalations += 1;
            }
            Err(e) => error!(error = %e, "escalation failed"),
        }
    }

    /// List the manager's custom objects and synthesize a
    /// `ReconciliationStuck` warning for every `Ready=False` condition older
    /// than the stuck threshold.
    pub async fn check_stuck_reconciliations(&self) {
        let threshold = self.catalog.settings.stuck_threshold_seconds;
        let now = Utc::now();

        for kind in STUCK_SCAN_KINDS.iter().copied() {
            let docs = match self.cluster.list_resources(kind, None).await {
                Ok(docs) => docs,
                Err(e) => {
                    warn!(kind, error = %e, "stuck scan list failed");
                    continue;
                }
            };
            for doc in docs {
                if let Some(event) = stuck_event(kind, &doc, threshold, now) {
                    warn!(resource = %event.resource_key(), "stuck reconciliation detected");
                    self.process_event(event).await;
                }
            }
        }
    }
}

/// Build the synthetic stuck event for a custom object whose `Ready`
/// condition has been `False` longer than the threshold.
fn stuck_event(
    kind: &str,
    doc: &ResourceDoc,
    threshold_seconds: u64,
    now: DateTime<Utc>,
) -> Option<Event> {
    let name = doc.pointer("/metadata/name")?.as_str()?;
    let namespace = doc
        .pointer("/metadata/namespace")
        .and_then(Value::as_str)
        .unwrap_or("default");

    let conditions = doc.pointer("/status/conditions")?.as_array()?;
    let ready = conditions
        .iter()
        .find(|c| c.get("type").and_then(Value::as_str) == Some("Ready"))?;
    if ready.get("status").and_then(Value::as_str) != Some("False") {
        return None;
    }

    let transition = ready
        .get("lastTransitionTime")
        .and_then(Value::as_str)
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())?
        .with_timezone(&Utc);
    let stuck_for = (now - transition).num_seconds();
    if stuck_for <= threshold_seconds as i64 {
        return None;
    }

    Some(Event::warning(
        "ReconciliationStuck",
        format!("{kind} stuck in non-ready state for {stuck_for} seconds"),
        InvolvedObject {
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            uid: None,
        },
    ))
}
