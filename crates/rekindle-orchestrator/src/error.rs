use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("graph error: {0}")]
    Graph(#[from] rekindle_graph::GraphError),

    #[error("cluster error: {0}")]
    Cluster(#[from] rekindle_cluster::ClusterError),

    #[error("no update batches planned")]
    NoPlan,

    #[error("shutdown requested")]
    ShutdownRequested,

    #[error("internal error: {0}")]
    Internal(String),
}
