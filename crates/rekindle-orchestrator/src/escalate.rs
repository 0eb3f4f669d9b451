use chrono::Utc;
use rekindle_cluster::{ClusterAccess, EscalationPayload, NotificationSink};
use rekindle_domain::{Event, InvolvedObject};
use rekindle_patterns::{PatternMatch, RecoveryStatus};
use tracing::{error, warn};

use crate::error::OrchestratorError;

/// Namespace escalation events land in when the resource key is unparseable.
const FALLBACK_NAMESPACE: &str = "flux-recovery";

/// Hand a failed recovery over to a human: mark the match, create exactly one
/// cluster event and emit exactly one notification.
pub async fn escalate(
    cluster: &dyn ClusterAccess,
    sink: &dyn NotificationSink,
    pattern_match: &mut PatternMatch,
    reason: &str,
) -> Result<(), OrchestratorError> {
    warn!(
        resource = %pattern_match.resource_key,
        pattern = %pattern_match.pattern_name,
        reason,
        "escalating to manual intervention"
    );

    pattern_match.status = RecoveryStatus::ManualIntervention;
    pattern_match.escalation_level += 1;

    let (namespace, kind, name) = split_resource_key(&pattern_match.resource_key);
    let event = Event::warning(
        "RecoveryEscalation",
        format!(
            "Manual intervention required for {}: {}",
            pattern_match.pattern_name, reason
        ),
        InvolvedObject {
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            uid: None,
        },
    );
    let event_namespace = event.namespace.clone();
    if let Err(e) = cluster.create_event(&event_namespace, &event).await {
        // The notification still goes out; a missed event is not fatal.
        error!(error = %e, "failed to create escalation event");
    }

    let payload = EscalationPayload {
        title: "GitOps Recovery Escalation".to_string(),
        resource: pattern_match.resource_key.clone(),
        pattern: pattern_match.pattern_name.clone(),
        severity: pattern_match.severity,
        reason: reason.to_string(),
        timestamp: Utc::now(),
        description: pattern_match.event_message.clone(),
    };
    sink.notify(&payload).await?;

    Ok(())
}

fn split_resource_key(key: &str) -> (&str, &str, &str) {
    let parts: Vec<&str> = key.split('/').collect();
    match parts.as_slice() {
        [namespace, kind, name] => (namespace, kind, name),
        _ => (FALLBACK_NAMESPACE, "Unknown", key),
    }
}
