use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use wsfork_gateway::{with_workspace, Gateway, WorkspaceHandle};
use wsfork_orchestrator::{
    BatchReport, CommandTask, OrchestratorConfig, TaskDescriptor, TaskOrchestrator, TaskOutcome,
};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub tasks: Vec<String>,
    pub setup: Vec<String>,
    pub fork_timeout: Option<u64>,
    pub task_timeout: Option<u64>,
}

pub async fn handle_run(gateway: Arc<dyn Gateway>, options: RunOptions) -> Result<()> {
    let mut config = OrchestratorConfig::from_env();
    if let Some(secs) = options.fork_timeout {
        config.fork_timeout_secs = secs;
    }
    if options.task_timeout.is_some() {
        config.task_timeout_secs = options.task_timeout;
    }

    let report = with_workspace(gateway, |source| run_batch(source, config, options))
        .await
        .context("Failed to create source workspace")??;

    println!("{}", serde_json::to_string_pretty(&render_report(&report))?);
    Ok(())
}

async fn run_batch(
    source: WorkspaceHandle,
    config: OrchestratorConfig,
    options: RunOptions,
) -> Result<BatchReport<TaskDescriptor, String>> {
    for command in &options.setup {
        info!(workspace = %source.id(), command = %command, "Running setup command");
        let result = source
            .exec(command)
            .await
            .with_context(|| format!("Setup command failed: {command}"))?;
        if !result.success() {
            bail!(
                "Setup command {command:?} exited with status {}: {}",
                result.exit_code.unwrap_or_default(),
                result.stderr.trim()
            );
        }
    }

    let tasks = options.tasks.into_iter().map(TaskDescriptor::new).collect();
    let report = TaskOrchestrator::new(&config)
        .run_all(&source, tasks, CommandTask)
        .await?;
    Ok(report)
}

/// One entry per task: `prompt` plus either `response` or `error`.
pub fn render_report(report: &BatchReport<TaskDescriptor, String>) -> Value {
    let results: Vec<Value> = report
        .results
        .iter()
        .map(|result| match &result.outcome {
            TaskOutcome::Success(response) => json!({
                "prompt": result.task.prompt,
                "workspace_id": result.workspace_id,
                "response": response,
            }),
            TaskOutcome::Failure(failure) => json!({
                "prompt": result.task.prompt,
                "workspace_id": result.workspace_id,
                "error": failure.message,
            }),
        })
        .collect();

    json!({
        "results": results,
        "cleanup_warnings": report.cleanup_warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wsfork_gateway::mock::MockGateway;
    use wsfork_gateway::Operation;

    fn config() -> OrchestratorConfig {
        serde_json::from_value(json!({
            "fork_timeout_secs": 5,
            "poll_interval_ms": 10,
            "max_poll_failures": 3,
            "delete_trigger": false,
        }))
        .unwrap()
    }

    fn options(tasks: &[&str], setup: &[&str]) -> RunOptions {
        RunOptions {
            tasks: tasks.iter().map(|s| s.to_string()).collect(),
            setup: setup.iter().map(|s| s.to_string()).collect(),
            fork_timeout: None,
            task_timeout: None,
        }
    }

    #[tokio::test]
    async fn test_run_batch_renders_responses_and_errors() {
        let mock = Arc::new(MockGateway::new());
        let gateway: Arc<dyn Gateway> = mock.clone();

        let report = with_workspace(gateway, |source| {
            run_batch(source, config(), options(&["echo A", "exit 2"], &["echo setup"]))
        })
        .await
        .unwrap()
        .unwrap();

        let rendered = render_report(&report);
        assert_eq!(rendered["results"][0]["prompt"], "echo A");
        assert_eq!(rendered["results"][0]["response"], "A");
        assert_eq!(rendered["results"][1]["prompt"], "exit 2");
        assert!(rendered["results"][1]["error"]
            .as_str()
            .unwrap()
            .contains("status 2"));
        assert_eq!(rendered["cleanup_warnings"], json!([]));

        // Source plus both forks are gone.
        assert!(mock.active().is_empty());
        assert_eq!(mock.count(Operation::DeleteWorkspace), 3);
    }

    #[tokio::test]
    async fn test_failed_setup_skips_fork() {
        let mock = Arc::new(MockGateway::new());
        let gateway: Arc<dyn Gateway> = mock.clone();

        let result = with_workspace(gateway, |source| {
            run_batch(source, config(), options(&["echo A"], &["exit 1"]))
        })
        .await
        .unwrap();

        assert!(result.is_err());
        assert_eq!(mock.count(Operation::CreateSnapshotTrigger), 0);
        assert!(mock.active().is_empty());
    }
}
