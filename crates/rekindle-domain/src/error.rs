use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid resource identifier: '{0}' (expected namespace/kind/name)")]
    InvalidResourceId(String),

    #[error("invalid severity: {0}")]
    InvalidSeverity(String),

    #[error("invalid resource document: {0}")]
    InvalidDocument(String),
}
