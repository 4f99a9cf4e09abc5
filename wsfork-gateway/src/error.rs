use crate::types::WorkspaceId;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Gateway operation names, carried by every error for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    HealthCheck,
    ServiceInfo,
    CreateWorkspace,
    Exec,
    DeleteWorkspace,
    CreateSnapshotTrigger,
    DeleteSnapshotTrigger,
    SnapshotStatus,
    RestoreSnapshot,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::HealthCheck => "health_check",
            Operation::ServiceInfo => "service_info",
            Operation::CreateWorkspace => "create_workspace",
            Operation::Exec => "exec",
            Operation::DeleteWorkspace => "delete_workspace",
            Operation::CreateSnapshotTrigger => "create_snapshot_trigger",
            Operation::DeleteSnapshotTrigger => "delete_snapshot_trigger",
            Operation::SnapshotStatus => "snapshot_status",
            Operation::RestoreSnapshot => "restore_snapshot",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    /// The gateway answered with a non-success status.
    #[error("{operation} returned status {status}: {message}")]
    RemoteCall {
        operation: Operation,
        status: u16,
        message: String,
    },

    #[error("{operation} timed out connecting to the gateway")]
    ConnectTimeout { operation: Operation },

    /// The connection was established but the command outlived the exec budget.
    #[error("exec in workspace {workspace_id} did not finish within {timeout:?}")]
    ExecTimeout {
        workspace_id: WorkspaceId,
        timeout: Duration,
    },

    #[error("{operation} transport error: {source}")]
    Transport {
        operation: Operation,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} returned an unreadable response: {message}")]
    Decode { operation: Operation, message: String },

    #[error("Invalid gateway configuration: {0}")]
    Config(String),
}

impl GatewayError {
    pub fn remote(operation: Operation, status: u16, message: impl Into<String>) -> Self {
        GatewayError::RemoteCall {
            operation,
            status,
            message: message.into(),
        }
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            GatewayError::RemoteCall { operation, .. }
            | GatewayError::ConnectTimeout { operation }
            | GatewayError::Transport { operation, .. }
            | GatewayError::Decode { operation, .. } => Some(*operation),
            GatewayError::ExecTimeout { .. } => Some(Operation::Exec),
            GatewayError::Config(_) => None,
        }
    }

    /// HTTP status of a rejected call, if the gateway answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::RemoteCall { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether retrying the same call could plausibly succeed.
    ///
    /// An [`GatewayError::ExecTimeout`] is not transient: the command itself is slow,
    /// and re-running it would repeat its side effects.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::RemoteCall { status, .. } => *status >= 500 || *status == 429,
            GatewayError::ConnectTimeout { .. } | GatewayError::Transport { .. } => true,
            GatewayError::ExecTimeout { .. }
            | GatewayError::Decode { .. }
            | GatewayError::Config(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_reports_operation_and_status() {
        let err = GatewayError::remote(Operation::RestoreSnapshot, 409, "snapshot busy");

        assert_eq!(err.operation(), Some(Operation::RestoreSnapshot));
        assert_eq!(err.status(), Some(409));
        assert_eq!(
            err.to_string(),
            "restore_snapshot returned status 409: snapshot busy"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(GatewayError::remote(Operation::SnapshotStatus, 503, "").is_transient());
        assert!(GatewayError::remote(Operation::SnapshotStatus, 429, "").is_transient());
        assert!(!GatewayError::remote(Operation::SnapshotStatus, 404, "").is_transient());
        assert!(GatewayError::ConnectTimeout {
            operation: Operation::Exec
        }
        .is_transient());

        let exec_timeout = GatewayError::ExecTimeout {
            workspace_id: WorkspaceId::new("ws-1"),
            timeout: Duration::from_secs(300),
        };
        assert!(!exec_timeout.is_transient());
        assert_eq!(exec_timeout.operation(), Some(Operation::Exec));
    }
}
