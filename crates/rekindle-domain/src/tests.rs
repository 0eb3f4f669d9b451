#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use crate::event::{Event, EventType, InvolvedObject};
    use crate::types::*;

    #[test]
    fn resource_id_display_namespaced() {
        let id = ResourceId::namespaced("Deployment", "app", "default");
        assert_eq!(id.to_string(), "default/Deployment/app");
    }

    #[test]
    fn resource_id_display_cluster_scoped() {
        let id = ResourceId::new("StorageClass", "longhorn", None);
        assert_eq!(id.to_string(), "(cluster)/StorageClass/longhorn");
    }

    #[test]
    fn resource_id_round_trips_through_from_str() {
        let id = ResourceId::namespaced("Service", "app-service", "default");
        let parsed = ResourceId::from_str(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn cluster_scoped_round_trips_through_from_str() {
        let id = ResourceId::new("StorageClass", "longhorn", None);
        let parsed = ResourceId::from_str(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn invalid_resource_string_rejected() {
        assert!(ResourceId::from_str("just-a-name").is_err());
        assert!(ResourceId::from_str("ns/kind/name/extra").is_err());
        assert!(ResourceId::from_str("ns//name").is_err());
    }

    #[test]
    fn equality_includes_api_version() {
        let a = ResourceId::namespaced("Kustomization", "apps", "flux-system")
            .with_api_version("kustomize.toolkit.fluxcd.io/v1");
        let b = ResourceId::namespaced("Kustomization", "apps", "flux-system");
        assert_ne!(a, b);
    }

    #[test]
    fn critical_namespace_detection() {
        assert!(ResourceId::namespaced("Kustomization", "infra", "flux-system")
            .is_critical_namespace());
        assert!(!ResourceId::namespaced("Deployment", "app", "default").is_critical_namespace());
        assert!(!ResourceId::new("StorageClass", "longhorn", None).is_critical_namespace());
    }

    #[test]
    fn manager_event_detected_by_source_component() {
        let mut event = Event::warning(
            "ReconciliationFailed",
            "reconcile failed",
            InvolvedObject {
                kind: "Deployment".into(),
                name: "app".into(),
                namespace: "default".into(),
                uid: None,
            },
        );
        event.source_component = "kustomize-controller".into();
        assert!(event.is_manager_related());
    }

    #[test]
    fn manager_event_detected_by_kind() {
        let event = Event::warning(
            "HealthCheckFailed",
            "health check timed out",
            InvolvedObject {
                kind: "HelmRelease".into(),
                name: "longhorn".into(),
                namespace: "longhorn-system".into(),
                uid: None,
            },
        );
        assert!(event.is_manager_related());
    }

    #[test]
    fn unrelated_event_ignored() {
        let event = Event::warning(
            "BackOff",
            "Back-off restarting failed container",
            InvolvedObject {
                kind: "Pod".into(),
                name: "app-5bb".into(),
                namespace: "default".into(),
                uid: None,
            },
        );
        assert!(!event.is_manager_related());
    }

    #[test]
    fn resource_key_falls_back_without_involved_object() {
        let event = Event {
            event_type: EventType::Warning,
            reason: "Unknown".into(),
            message: "no object".into(),
            namespace: "default".into(),
            involved: None,
            first_ts: None,
            last_ts: None,
            count: 1,
            source_component: String::new(),
        };
        assert_eq!(event.resource_key(), "default/Unknown/unknown");
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn severity_parse() {
        assert_eq!(Severity::parse("critical"), Some(Severity::Critical));
        assert_eq!(Severity::parse("bogus"), None);
    }
}
