use std::time::Duration;
use thiserror::Error;
use wsfork_gateway::{GatewayError, WorkspaceId};

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Failures of the snapshot → poll → restore handshake.
#[derive(Error, Debug)]
pub enum ForkError {
    #[error("Failed to create snapshot trigger: {0}")]
    Trigger(#[source] GatewayError),

    #[error("Snapshot {trigger} not ready after {timeout:?}")]
    Timeout { trigger: String, timeout: Duration },

    #[error("Snapshot {trigger} failed: {}", reason.as_deref().unwrap_or("no reason given"))]
    SnapshotFailed {
        trigger: String,
        reason: Option<String>,
    },

    #[error("Snapshot status for {trigger} unreachable after {attempts} consecutive attempts: {source}")]
    PollUnreachable {
        trigger: String,
        attempts: u32,
        #[source]
        source: GatewayError,
    },

    /// Some restores failed. Workspaces that were created have been deleted again,
    /// except those listed in `leaked`, whose deletion failed too.
    #[error("Restore from snapshot {snapshot} failed ({created} of {requested} created): {source}")]
    Restore {
        snapshot: String,
        requested: usize,
        created: usize,
        leaked: Vec<WorkspaceId>,
        #[source]
        source: GatewayError,
    },
}

#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// The batch never started: forking the source workspace failed.
    #[error("Fork failed: {0}")]
    Fork(#[from] ForkError),
}
