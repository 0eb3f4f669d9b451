mod cluster;
mod error;
mod local;
mod notify;

pub use cluster::ClusterAccess;
pub use error::ClusterError;
pub use local::LocalCluster;
pub use notify::{EscalationPayload, LogNotifier, MemorySink, NotificationSink, WebhookNotifier};
