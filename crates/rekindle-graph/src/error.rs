use rekindle_domain::ResourceId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("resource not present in dependency graph: {0}")]
    UnknownResource(ResourceId),

    #[error("domain error: {0}")]
    Domain(#[from] rekindle_domain::DomainError),
}
