//! Task descriptors, the task-unit capability and per-task results.

use crate::cleanup::CleanupWarning;
use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;
use wsfork_gateway::{ExecResult, WorkspaceHandle, WorkspaceId};

/// One unit of work: a prompt or command plus free-form parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub prompt: String,

    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
}

impl TaskDescriptor {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            params: serde_json::Value::Null,
        }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }
}

impl From<&str> for TaskDescriptor {
    fn from(prompt: &str) -> Self {
        Self::new(prompt)
    }
}

impl From<String> for TaskDescriptor {
    fn from(prompt: String) -> Self {
        Self::new(prompt)
    }
}

/// The forked workspace lent to a task unit.
///
/// Only exec is exposed: the orchestrator owns deletion.
pub struct BoundWorkspace {
    inner: WorkspaceHandle,
}

impl BoundWorkspace {
    pub(crate) fn new(inner: WorkspaceHandle) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> &WorkspaceId {
        self.inner.id()
    }

    pub async fn exec(&self, command: &str) -> wsfork_gateway::Result<ExecResult> {
        self.inner.exec(command).await
    }
}

/// What a task unit does with its workspace.
///
/// Implemented for any `Fn(BoundWorkspace, T) -> impl Future<Output = anyhow::Result<O>>`,
/// so plain async closures can be passed to [`crate::TaskOrchestrator::run_all`].
#[async_trait]
pub trait TaskUnit<T>: Send + Sync + 'static {
    type Output: Send + 'static;

    async fn run(&self, workspace: BoundWorkspace, task: T) -> anyhow::Result<Self::Output>;
}

#[async_trait]
impl<T, O, F, Fut> TaskUnit<T> for F
where
    T: Send + 'static,
    O: Send + 'static,
    F: Fn(BoundWorkspace, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
{
    type Output = O;

    async fn run(&self, workspace: BoundWorkspace, task: T) -> anyhow::Result<O> {
        (self)(workspace, task).await
    }
}

/// Runs the task's prompt as a shell command; the output is trimmed stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandTask;

#[async_trait]
impl TaskUnit<TaskDescriptor> for CommandTask {
    type Output = String;

    async fn run(&self, workspace: BoundWorkspace, task: TaskDescriptor) -> anyhow::Result<String> {
        let result = workspace
            .exec(&task.prompt)
            .await
            .with_context(|| format!("exec failed in workspace {}", workspace.id()))?;

        if !result.success() {
            bail!(
                "command exited with status {}: {}",
                result.exit_code.unwrap_or_default(),
                result.stderr.trim()
            );
        }

        Ok(result.stdout.trim_end().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct TaskFailure {
    pub message: String,
}

impl TaskFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Keeps the whole context chain, outermost first.
    pub fn from_error(err: &anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome<O> {
    Success(O),
    Failure(TaskFailure),
}

impl<O> TaskOutcome<O> {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }

    pub fn success(&self) -> Option<&O> {
        match self {
            TaskOutcome::Success(value) => Some(value),
            TaskOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&TaskFailure> {
        match self {
            TaskOutcome::Success(_) => None,
            TaskOutcome::Failure(failure) => Some(failure),
        }
    }
}

/// Outcome of one task, paired with the task and the workspace it ran in.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult<T, O> {
    pub task: T,
    pub workspace_id: WorkspaceId,
    pub outcome: TaskOutcome<O>,
}

/// Everything `run_all` produced: one result per task in input order, plus any
/// workspaces that could not be deleted.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport<T, O> {
    pub results: Vec<TaskResult<T, O>>,
    pub cleanup_warnings: Vec<CleanupWarning>,
}

impl<T, O> BatchReport<T, O> {
    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
            cleanup_warnings: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wsfork_gateway::mock::MockGateway;
    use wsfork_gateway::{Gateway, Operation};

    fn bound(mock: &Arc<MockGateway>) -> BoundWorkspace {
        let gateway: Arc<dyn Gateway> = mock.clone();
        BoundWorkspace::new(WorkspaceHandle::new(mock.seed_workspace("W1"), gateway))
    }

    #[tokio::test]
    async fn test_command_task_returns_trimmed_stdout() {
        let mock = Arc::new(MockGateway::new());

        let output = CommandTask
            .run(bound(&mock), TaskDescriptor::new("echo A"))
            .await
            .unwrap();

        assert_eq!(output, "A");
    }

    #[tokio::test]
    async fn test_command_task_fails_on_nonzero_exit() {
        let mock = Arc::new(MockGateway::new());

        let err = CommandTask
            .run(bound(&mock), TaskDescriptor::new("exit 3"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "command exited with status 3: exited with 3");
    }

    #[tokio::test]
    async fn test_command_task_reports_gateway_errors_with_context() {
        let mock = Arc::new(MockGateway::new());
        mock.fail_operation(Operation::Exec, 1, 502);

        let err = CommandTask
            .run(bound(&mock), TaskDescriptor::new("echo A"))
            .await
            .unwrap_err();

        let failure = TaskFailure::from_error(&err);
        assert!(failure.message.starts_with("exec failed in workspace W1: "));
        assert!(failure.message.contains("502"));
    }

    #[tokio::test]
    async fn test_closures_are_task_units() {
        let mock = Arc::new(MockGateway::new());
        let unit = |ws: BoundWorkspace, n: u32| async move {
            let out = ws.exec(&format!("echo {n}")).await?;
            Ok::<_, anyhow::Error>(out.stdout.trim().parse::<u32>()? * 2)
        };

        assert_eq!(unit.run(bound(&mock), 21).await.unwrap(), 42);
    }

    #[test]
    fn test_descriptor_serialization_skips_null_params() {
        let json = serde_json::to_value(TaskDescriptor::new("echo A")).unwrap();
        assert_eq!(json, serde_json::json!({ "prompt": "echo A" }));

        let with = TaskDescriptor::new("run").with_params(serde_json::json!({ "n": 1 }));
        let json = serde_json::to_value(with).unwrap();
        assert_eq!(json["params"]["n"], 1);
    }
}
