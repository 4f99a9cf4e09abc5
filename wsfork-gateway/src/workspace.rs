use crate::error::Result;
use crate::types::{ExecResult, SnapshotTrigger, WorkspaceId};
use crate::Gateway;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// A workspace living on the gateway.
///
/// The handle is a plain value: it caches nothing about the workspace contents and
/// deleting it does not invalidate clones. Whoever holds the handle that created or
/// restored the workspace owns its deletion.
#[derive(Clone)]
pub struct WorkspaceHandle {
    id: WorkspaceId,
    gateway: Arc<dyn Gateway>,
}

impl fmt::Debug for WorkspaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl WorkspaceHandle {
    pub fn new(id: WorkspaceId, gateway: Arc<dyn Gateway>) -> Self {
        Self { id, gateway }
    }

    /// Create a fresh workspace on the gateway.
    pub async fn create(gateway: Arc<dyn Gateway>) -> Result<Self> {
        let id = gateway.create_workspace().await?;
        info!(workspace = %id, "Workspace created");
        Ok(Self::new(id, gateway))
    }

    pub fn id(&self) -> &WorkspaceId {
        &self.id
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    pub async fn exec(&self, command: &str) -> Result<ExecResult> {
        self.gateway.exec(&self.id, command).await
    }

    /// Not guarded locally; deleting twice is for the gateway to judge.
    pub async fn delete(&self) -> Result<()> {
        self.gateway.delete_workspace(&self.id).await
    }

    pub async fn create_snapshot_trigger(&self) -> Result<SnapshotTrigger> {
        self.gateway.create_snapshot_trigger(&self.id).await
    }
}

/// Create a workspace, hand it to `f`, and delete it once `f` completes.
///
/// A failed deletion is logged and does not replace the closure's output.
pub async fn with_workspace<F, Fut, R>(gateway: Arc<dyn Gateway>, f: F) -> Result<R>
where
    F: FnOnce(WorkspaceHandle) -> Fut,
    Fut: Future<Output = R>,
{
    let workspace = WorkspaceHandle::create(gateway).await?;
    let output = f(workspace.clone()).await;

    match workspace.delete().await {
        Ok(()) => info!(workspace = %workspace.id(), "Workspace deleted"),
        Err(e) => warn!(workspace = %workspace.id(), "Failed to delete workspace: {}", e),
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;
    use crate::Operation;

    #[tokio::test]
    async fn test_handle_routes_calls_to_its_workspace() {
        let mock = Arc::new(MockGateway::new());
        let handle = WorkspaceHandle::create(mock.clone()).await.unwrap();

        let result = handle.exec("echo hello").await.unwrap();
        assert_eq!(result.stdout, "hello\n");

        let trigger = handle.create_snapshot_trigger().await.unwrap();
        assert_eq!(&trigger.workspace_id, handle.id());

        handle.delete().await.unwrap();
        assert_eq!(mock.deleted(), vec![handle.id().clone()]);
    }

    #[tokio::test]
    async fn test_with_workspace_always_deletes() {
        let mock = Arc::new(MockGateway::new());

        let id = with_workspace(mock.clone(), |ws| async move { ws.id().clone() })
            .await
            .unwrap();

        assert!(!mock.is_active(&id));
        assert_eq!(mock.count(Operation::DeleteWorkspace), 1);
    }

    #[tokio::test]
    async fn test_with_workspace_returns_output_when_delete_fails() {
        let mock = Arc::new(MockGateway::new());
        mock.fail_operation(Operation::DeleteWorkspace, 1, 500);

        let output = with_workspace(mock.clone(), |ws| async move {
            ws.exec("echo kept").await.map(|r| r.stdout)
        })
        .await
        .unwrap();

        assert_eq!(output.unwrap(), "kept\n");
    }

    #[tokio::test]
    async fn test_with_workspace_propagates_create_failure() {
        let mock = Arc::new(MockGateway::new());
        mock.fail_operation(Operation::CreateWorkspace, 1, 503);

        let result = with_workspace(mock.clone(), |_ws| async {}).await;

        assert_eq!(result.unwrap_err().status(), Some(503));
        assert_eq!(mock.count(Operation::DeleteWorkspace), 0);
    }
}
