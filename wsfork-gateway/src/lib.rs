//! Remote workspace gateway client.
//!
//! The gateway hosts isolated, disposable workspaces and exposes create/exec/delete
//! plus an asynchronous snapshot/restore handshake. This crate defines the
//! [`Gateway`] abstraction, the HTTP implementation used in production and the
//! [`WorkspaceHandle`] value type the orchestration layer works with.

pub mod client;
pub mod config;
pub mod error;
pub mod types;
pub mod workspace;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

use async_trait::async_trait;

pub use client::HttpGateway;
pub use config::GatewayConfig;
pub use error::{GatewayError, Operation, Result};
pub use types::{ExecResult, SnapshotStatus, SnapshotTrigger, WorkspaceId};
pub use workspace::{with_workspace, WorkspaceHandle};

/// Operations offered by the remote workspace service.
///
/// Every method is a single network round trip. Implementations must not retry
/// internally; retry policy belongs to the caller (see the fork engine's status
/// polling).
#[async_trait]
pub trait Gateway: Send + Sync {
    /// `GET /healthz`
    async fn health_check(&self) -> Result<serde_json::Value>;

    /// `GET /`
    async fn service_info(&self) -> Result<serde_json::Value>;

    async fn create_workspace(&self) -> Result<WorkspaceId>;

    /// Run a command inside a workspace and wait for it to finish.
    async fn exec(&self, workspace: &WorkspaceId, command: &str) -> Result<ExecResult>;

    async fn delete_workspace(&self, workspace: &WorkspaceId) -> Result<()>;

    /// Ask the gateway to start capturing the current state of `workspace`.
    async fn create_snapshot_trigger(&self, workspace: &WorkspaceId) -> Result<SnapshotTrigger>;

    async fn delete_snapshot_trigger(&self, trigger: &str) -> Result<()>;

    async fn snapshot_status(&self, trigger: &str) -> Result<SnapshotStatus>;

    /// Create a new workspace seeded from a ready snapshot.
    async fn restore_snapshot(&self, snapshot: &str) -> Result<WorkspaceId>;
}
