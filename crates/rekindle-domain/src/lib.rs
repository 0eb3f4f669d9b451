mod error;
mod event;
mod types;

#[cfg(test)]
mod tests;

pub use error::DomainError;
pub use event::{Event, EventType, InvolvedObject};
pub use types::{
    ResourceDoc, ResourceId, ResourceState, Severity, CRITICAL_NAMESPACES, MANAGER_KINDS,
    MANAGER_SOURCE_COMPONENTS,
};
