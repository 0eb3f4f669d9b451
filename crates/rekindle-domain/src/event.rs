use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ResourceId, MANAGER_KINDS, MANAGER_SOURCE_COMPONENTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Normal,
    Warning,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Normal => write!(f, "Normal"),
            EventType::Warning => write!(f, "Warning"),
        }
    }
}

/// The object an event refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvolvedObject {
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub uid: Option<String>,
}

/// A cluster event in concrete form.
///
/// The event stream is the controller's only live input; everything the
/// correlator and matcher need is carried here rather than looked up lazily.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
    pub namespace: String,
    pub involved: Option<InvolvedObject>,
    pub first_ts: Option<DateTime<Utc>>,
    pub last_ts: Option<DateTime<Utc>>,
    pub count: u32,
    pub source_component: String,
}

impl Event {
    /// Minimal constructor used by tests and the synthetic stuck-scan events.
    pub fn warning(
        reason: impl Into<String>,
        message: impl Into<String>,
        involved: InvolvedObject,
    ) -> Self {
        let namespace = involved.namespace.clone();
        Self {
            event_type: EventType::Warning,
            reason: reason.into(),
            message: message.into(),
            namespace,
            involved: Some(involved),
            first_ts: None,
            last_ts: None,
            count: 1,
            source_component: String::new(),
        }
    }

    /// `namespace/kind/name` key of the involved object, falling back to the
    /// event's namespace when no object is attached.
    pub fn resource_key(&self) -> String {
        match &self.involved {
            Some(obj) => format!("{}/{}/{}", obj.namespace, obj.kind, obj.name),
            None => format!("{}/Unknown/unknown", self.namespace),
        }
    }

    /// The involved object as a [`ResourceId`], when present.
    pub fn resource_id(&self) -> Option<ResourceId> {
        self.involved
            .as_ref()
            .map(|obj| ResourceId::namespaced(&obj.kind, &obj.name, &obj.namespace))
    }

    /// Whether this event originates from the declarative manager: either its
    /// controllers emitted it, or it involves one of the manager's kinds.
    pub fn is_manager_related(&self) -> bool {
        if MANAGER_SOURCE_COMPONENTS
            .iter()
            .any(|c| self.source_component.contains(c))
        {
            return true;
        }
        self.involved
            .as_ref()
            .is_some_and(|obj| MANAGER_KINDS.contains(&obj.kind.as_str()))
    }
}
