use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::fork::ForkEngine;
use crate::task::{BatchReport, BoundWorkspace, TaskFailure, TaskOutcome, TaskResult, TaskUnit};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};
use wsfork_gateway::WorkspaceHandle;

/// Forks a source workspace once per task and runs the tasks side by side.
#[derive(Debug, Clone)]
pub struct TaskOrchestrator {
    engine: ForkEngine,
    fork_timeout: Duration,
    task_timeout: Option<Duration>,
}

impl TaskOrchestrator {
    pub fn new(config: &OrchestratorConfig) -> Self {
        Self {
            engine: ForkEngine::new(config.fork_options()),
            fork_timeout: config.fork_timeout(),
            task_timeout: config.task_timeout(),
        }
    }

    pub fn with_engine(engine: ForkEngine, fork_timeout: Duration) -> Self {
        Self {
            engine,
            fork_timeout,
            task_timeout: None,
        }
    }

    /// Bound each task unit's run time. Expiry is reported as that task's failure.
    pub fn with_task_timeout(mut self, task_timeout: Option<Duration>) -> Self {
        self.task_timeout = task_timeout;
        self
    }

    /// Run every task in its own fork of `source` and collect the results.
    ///
    /// Task *i* runs in forked workspace *i*; results come back in task order no
    /// matter which unit finishes first. A failing or panicking unit only affects
    /// its own result. Every forked workspace is deleted before this returns, and
    /// deletion failures are reported in [`BatchReport::cleanup_warnings`].
    ///
    /// Only a fork failure makes the whole call fail, and then no unit has started.
    #[instrument(skip_all, fields(source = %source.id(), tasks = tasks.len()))]
    pub async fn run_all<T, U>(
        &self,
        source: &WorkspaceHandle,
        tasks: Vec<T>,
        unit: U,
    ) -> Result<BatchReport<T, U::Output>>
    where
        T: Clone + Send + 'static,
        U: TaskUnit<T>,
    {
        if tasks.is_empty() {
            return Ok(BatchReport::empty());
        }

        let forked = self
            .engine
            .fork_guarded(source, tasks.len(), self.fork_timeout)
            .await?;
        let workspace_ids: Vec<_> = forked.workspaces().iter().map(|w| w.id().clone()).collect();

        let outcomes = self
            .fan_out(forked.workspaces(), &tasks, Arc::new(unit))
            .await;

        let cleanup_warnings = forked.release().await;

        let results: Vec<_> = tasks
            .into_iter()
            .zip(workspace_ids)
            .zip(outcomes)
            .map(|((task, workspace_id), outcome)| TaskResult {
                task,
                workspace_id,
                outcome,
            })
            .collect();

        let report = BatchReport {
            results,
            cleanup_warnings,
        };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            cleanup_warnings = report.cleanup_warnings.len(),
            "Task batch finished"
        );
        Ok(report)
    }

    async fn fan_out<T, U>(
        &self,
        workspaces: &[WorkspaceHandle],
        tasks: &[T],
        unit: Arc<U>,
    ) -> Vec<TaskOutcome<U::Output>>
    where
        T: Clone + Send + 'static,
        U: TaskUnit<T>,
    {
        let mut units = JoinSet::new();

        for (index, (workspace, task)) in workspaces.iter().zip(tasks).enumerate() {
            let unit = Arc::clone(&unit);
            let workspace = BoundWorkspace::new(workspace.clone());
            let task = task.clone();
            let task_timeout = self.task_timeout;

            units.spawn(async move {
                let run = AssertUnwindSafe(unit.run(workspace, task)).catch_unwind();
                let outcome = match task_timeout {
                    Some(limit) => match tokio::time::timeout(limit, run).await {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            let failure =
                                TaskFailure::new(format!("task timed out after {limit:?}"));
                            return (index, TaskOutcome::Failure(failure));
                        }
                    },
                    None => run.await,
                };

                let outcome = match outcome {
                    Ok(Ok(value)) => TaskOutcome::Success(value),
                    Ok(Err(e)) => TaskOutcome::Failure(TaskFailure::from_error(&e)),
                    Err(panic) => TaskOutcome::Failure(TaskFailure::new(format!(
                        "task panicked: {}",
                        panic_message(panic.as_ref())
                    ))),
                };
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<TaskOutcome<U::Output>>> =
            (0..workspaces.len()).map(|_| None).collect();

        while let Some(joined) = units.join_next().await {
            match joined {
                Ok((index, outcome)) => {
                    if let TaskOutcome::Failure(failure) = &outcome {
                        warn!(index, "Task unit failed: {}", failure);
                    }
                    slots[index] = Some(outcome);
                }
                Err(e) => warn!("Task unit did not complete: {}", e),
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    TaskOutcome::Failure(TaskFailure::new("task unit aborted before reporting"))
                })
            })
            .collect()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
