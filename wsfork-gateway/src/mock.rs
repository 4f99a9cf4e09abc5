//! In-memory [`Gateway`] used by tests across the workspace.
//!
//! Workspaces are ids in a set, snapshots are named after their trigger, and
//! status polling follows a scripted sequence whose last step repeats forever.

use crate::error::{GatewayError, Operation, Result};
use crate::types::{ExecResult, SnapshotStatus, SnapshotTrigger, WorkspaceId};
use crate::Gateway;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type ExecHandler = Arc<dyn Fn(&WorkspaceId, &str) -> Result<ExecResult> + Send + Sync>;

/// One answer of the scripted snapshot status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusStep {
    Pending,
    Ready,
    Failed(Option<String>),
    /// The status endpoint itself errors with this HTTP status.
    Error(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub operation: Operation,
    pub target: Option<String>,
}

#[derive(Default)]
struct MockState {
    next_workspace: u64,
    next_trigger: u64,
    active: BTreeSet<WorkspaceId>,
    deleted: Vec<WorkspaceId>,
    restored: Vec<WorkspaceId>,
    triggers: HashMap<String, WorkspaceId>,
    status_script: VecDeque<StatusStep>,
    failures: HashMap<Operation, VecDeque<u16>>,
    restore_budget: Option<usize>,
    failing_deletes: BTreeSet<WorkspaceId>,
    exec_on_inactive: usize,
    exec_handler: Option<ExecHandler>,
    calls: Vec<MockCall>,
}

impl MockState {
    fn record(&mut self, operation: Operation, target: Option<&str>) -> Result<()> {
        self.calls.push(MockCall {
            operation,
            target: target.map(str::to_string),
        });

        match self.failures.get_mut(&operation).and_then(VecDeque::pop_front) {
            Some(status) => Err(GatewayError::remote(
                operation,
                status,
                "injected failure",
            )),
            None => Ok(()),
        }
    }

    fn allocate_workspace(&mut self) -> WorkspaceId {
        self.next_workspace += 1;
        let id = WorkspaceId::new(format!("W{}", self.next_workspace));
        self.active.insert(id.clone());
        id
    }

    fn next_status_step(&mut self) -> StatusStep {
        if self.status_script.len() > 1 {
            self.status_script.pop_front().unwrap_or(StatusStep::Ready)
        } else {
            self.status_script.front().cloned().unwrap_or(StatusStep::Ready)
        }
    }
}

#[derive(Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an existing workspace, e.g. a long-lived source.
    pub fn seed_workspace(&self, id: impl Into<WorkspaceId>) -> WorkspaceId {
        let id = id.into();
        self.lock().active.insert(id.clone());
        id
    }

    /// Answers for successive status polls. The last step repeats; an empty
    /// script means every trigger is ready on the first poll.
    pub fn script_status(&self, steps: impl IntoIterator<Item = StatusStep>) {
        self.lock().status_script = steps.into_iter().collect();
    }

    /// Fail the next `times` calls of `operation` with `status`.
    pub fn fail_operation(&self, operation: Operation, times: usize, status: u16) {
        self.lock()
            .failures
            .entry(operation)
            .or_default()
            .extend(std::iter::repeat(status).take(times));
    }

    /// Let `count` restores succeed; every later restore fails with a 500.
    pub fn fail_restores_after(&self, count: usize) {
        self.lock().restore_budget = Some(count);
    }

    pub fn fail_delete_of(&self, id: &WorkspaceId) {
        self.lock().failing_deletes.insert(id.clone());
    }

    pub fn set_exec_handler<F>(&self, handler: F)
    where
        F: Fn(&WorkspaceId, &str) -> Result<ExecResult> + Send + Sync + 'static,
    {
        self.lock().exec_handler = Some(Arc::new(handler));
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Delete attempts per workspace id, successful or not.
    pub fn delete_attempts(&self, id: &WorkspaceId) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| {
                c.operation == Operation::DeleteWorkspace && c.target.as_deref() == Some(id.as_str())
            })
            .count()
    }

    /// Successfully deleted workspaces, in deletion order.
    pub fn deleted(&self) -> Vec<WorkspaceId> {
        self.lock().deleted.clone()
    }

    /// Workspaces produced by restores, in the order they were created.
    pub fn restored(&self) -> Vec<WorkspaceId> {
        self.lock().restored.clone()
    }

    pub fn active(&self) -> Vec<WorkspaceId> {
        self.lock().active.iter().cloned().collect()
    }

    pub fn is_active(&self, id: &WorkspaceId) -> bool {
        self.lock().active.contains(id)
    }

    /// Number of exec calls aimed at a workspace that did not exist (or no longer did).
    pub fn exec_on_inactive(&self) -> usize {
        self.lock().exec_on_inactive
    }
}

fn default_exec(command: &str) -> ExecResult {
    if let Some(text) = command.strip_prefix("echo ") {
        return ExecResult::new(0, format!("{text}\n"), "");
    }
    if let Some(code) = command
        .strip_prefix("exit ")
        .and_then(|c| c.trim().parse::<i32>().ok())
    {
        return ExecResult::new(code, "", format!("exited with {code}"));
    }
    ExecResult::new(0, "", "")
}

#[async_trait]
impl Gateway for MockGateway {
    async fn health_check(&self) -> Result<serde_json::Value> {
        self.lock().record(Operation::HealthCheck, None)?;
        Ok(serde_json::json!({ "status": "ok" }))
    }

    async fn service_info(&self) -> Result<serde_json::Value> {
        self.lock().record(Operation::ServiceInfo, None)?;
        Ok(serde_json::json!({ "service": "mock-gateway" }))
    }

    async fn create_workspace(&self) -> Result<WorkspaceId> {
        let mut state = self.lock();
        state.record(Operation::CreateWorkspace, None)?;
        Ok(state.allocate_workspace())
    }

    async fn exec(&self, workspace: &WorkspaceId, command: &str) -> Result<ExecResult> {
        let handler = {
            let mut state = self.lock();
            state.record(Operation::Exec, Some(workspace.as_str()))?;
            if !state.active.contains(workspace) {
                state.exec_on_inactive += 1;
                return Err(GatewayError::remote(
                    Operation::Exec,
                    404,
                    format!("workspace {workspace} not found"),
                ));
            }
            state.exec_handler.clone()
        };

        match handler {
            Some(handler) => handler(workspace, command),
            None => Ok(default_exec(command)),
        }
    }

    async fn delete_workspace(&self, workspace: &WorkspaceId) -> Result<()> {
        let mut state = self.lock();
        state.record(Operation::DeleteWorkspace, Some(workspace.as_str()))?;

        if state.failing_deletes.contains(workspace) {
            return Err(GatewayError::remote(
                Operation::DeleteWorkspace,
                500,
                "delete rejected",
            ));
        }
        if !state.active.remove(workspace) {
            return Err(GatewayError::remote(
                Operation::DeleteWorkspace,
                404,
                format!("workspace {workspace} not found"),
            ));
        }
        state.deleted.push(workspace.clone());
        Ok(())
    }

    async fn create_snapshot_trigger(&self, workspace: &WorkspaceId) -> Result<SnapshotTrigger> {
        let mut state = self.lock();
        state.record(Operation::CreateSnapshotTrigger, Some(workspace.as_str()))?;

        if !state.active.contains(workspace) {
            return Err(GatewayError::remote(
                Operation::CreateSnapshotTrigger,
                404,
                format!("workspace {workspace} not found"),
            ));
        }

        state.next_trigger += 1;
        let name = format!("trigger-{}", state.next_trigger);
        state.triggers.insert(name.clone(), workspace.clone());
        Ok(SnapshotTrigger {
            name,
            workspace_id: workspace.clone(),
        })
    }

    async fn delete_snapshot_trigger(&self, trigger: &str) -> Result<()> {
        let mut state = self.lock();
        state.record(Operation::DeleteSnapshotTrigger, Some(trigger))?;
        match state.triggers.remove(trigger) {
            Some(_) => Ok(()),
            None => Err(GatewayError::remote(
                Operation::DeleteSnapshotTrigger,
                404,
                format!("trigger {trigger} not found"),
            )),
        }
    }

    async fn snapshot_status(&self, trigger: &str) -> Result<SnapshotStatus> {
        let mut state = self.lock();
        state.record(Operation::SnapshotStatus, Some(trigger))?;

        if !state.triggers.contains_key(trigger) {
            return Err(GatewayError::remote(
                Operation::SnapshotStatus,
                404,
                format!("trigger {trigger} not found"),
            ));
        }

        match state.next_status_step() {
            StatusStep::Pending => Ok(SnapshotStatus::Pending),
            StatusStep::Ready => Ok(SnapshotStatus::Ready {
                snapshot_name: format!("snap-{trigger}"),
            }),
            StatusStep::Failed(reason) => Ok(SnapshotStatus::Failed { reason }),
            StatusStep::Error(status) => Err(GatewayError::remote(
                Operation::SnapshotStatus,
                status,
                "status endpoint unavailable",
            )),
        }
    }

    async fn restore_snapshot(&self, snapshot: &str) -> Result<WorkspaceId> {
        let mut state = self.lock();
        state.record(Operation::RestoreSnapshot, Some(snapshot))?;

        if let Some(budget) = state.restore_budget.as_mut() {
            if *budget == 0 {
                return Err(GatewayError::remote(
                    Operation::RestoreSnapshot,
                    500,
                    "restore failed",
                ));
            }
            *budget -= 1;
        }

        let id = state.allocate_workspace();
        state.restored.push(id.clone());
        Ok(id)
    }
}
