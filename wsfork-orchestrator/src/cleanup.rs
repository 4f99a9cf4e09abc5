//! Best-effort teardown of forked workspaces.

use futures::future::join_all;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};
use wsfork_gateway::{WorkspaceHandle, WorkspaceId};

/// A workspace whose deletion failed during teardown. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupWarning {
    pub workspace_id: WorkspaceId,
    pub message: String,
}

impl fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to delete workspace {}: {}", self.workspace_id, self.message)
    }
}

/// Delete every workspace once, concurrently. A failure never stops the others.
pub async fn delete_all(workspaces: &[WorkspaceHandle]) -> Vec<CleanupWarning> {
    let deletions = workspaces.iter().map(|workspace| async move {
        match workspace.delete().await {
            Ok(()) => {
                info!(workspace = %workspace.id(), "Forked workspace deleted");
                None
            }
            Err(e) => {
                warn!(workspace = %workspace.id(), "Failed to delete forked workspace: {}", e);
                Some(CleanupWarning {
                    workspace_id: workspace.id().clone(),
                    message: e.to_string(),
                })
            }
        }
    });

    join_all(deletions).await.into_iter().flatten().collect()
}

/// Owns forked workspaces until they are released.
///
/// Dropping the guard without calling [`ForkedWorkspaces::release`] (for instance
/// when the owning future is cancelled) schedules their deletion on the current
/// tokio runtime.
#[derive(Default)]
pub(crate) struct ForkedWorkspaces {
    workspaces: Vec<WorkspaceHandle>,
}

impl ForkedWorkspaces {
    pub fn new(workspaces: Vec<WorkspaceHandle>) -> Self {
        Self { workspaces }
    }

    pub fn push(&mut self, workspace: WorkspaceHandle) {
        self.workspaces.push(workspace);
    }

    pub fn len(&self) -> usize {
        self.workspaces.len()
    }

    pub fn workspaces(&self) -> &[WorkspaceHandle] {
        &self.workspaces
    }

    /// Hand the workspaces to the caller without deleting them.
    pub fn into_workspaces(mut self) -> Vec<WorkspaceHandle> {
        std::mem::take(&mut self.workspaces)
    }

    pub async fn release(mut self) -> Vec<CleanupWarning> {
        let warnings = delete_all(&self.workspaces).await;
        self.workspaces.clear();
        warnings
    }
}

impl Drop for ForkedWorkspaces {
    fn drop(&mut self) {
        if self.workspaces.is_empty() {
            return;
        }

        let workspaces = std::mem::take(&mut self.workspaces);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                warn!(
                    count = workspaces.len(),
                    "Orchestration cancelled, deleting forked workspaces in the background"
                );
                runtime.spawn(async move {
                    delete_all(&workspaces).await;
                });
            }
            Err(_) => {
                for workspace in &workspaces {
                    warn!(workspace = %workspace.id(), "No runtime available, forked workspace leaked");
                }
            }
        }
    }
}
