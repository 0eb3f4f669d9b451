use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("cluster api error: {0}")]
    Api(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("notification error: {0}")]
    Notification(String),
}

impl ClusterError {
    /// Whether a retry with backoff may succeed. Only plain API failures
    /// (network, rate limiting) are considered transient; a conflict or a
    /// consumed timeout will not get better by waiting.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClusterError::Api(_) | ClusterError::Notification(_))
    }
}
