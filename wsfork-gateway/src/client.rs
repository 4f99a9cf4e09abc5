//! HTTP implementation of [`Gateway`].

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Operation, Result};
use crate::types::{
    ExecResult, RestoreRequest, SnapshotStatus, SnapshotStatusResponse, SnapshotTrigger,
    TriggerCreated, TriggerRequest, WorkspaceCreated, WorkspaceId,
};
use crate::Gateway;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Talks to the workspace gateway over its JSON REST API.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    exec_timeout: Duration,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            exec_timeout: config.exec_timeout(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(&GatewayConfig::from_env())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, operation: Operation, request: RequestBuilder) -> Result<Response> {
        debug!(%operation, "gateway request");
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(operation, e))?;
        check_status(operation, response).await
    }
}

fn transport_error(operation: Operation, err: reqwest::Error) -> GatewayError {
    if err.is_connect() && err.is_timeout() {
        GatewayError::ConnectTimeout { operation }
    } else {
        GatewayError::Transport {
            operation,
            source: err,
        }
    }
}

async fn check_status(operation: Operation, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(GatewayError::RemoteCall {
        operation,
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(operation: Operation, response: Response) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| GatewayError::Decode {
            operation,
            message: e.to_string(),
        })
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn health_check(&self) -> Result<serde_json::Value> {
        let op = Operation::HealthCheck;
        let response = self.send(op, self.client.get(self.url("/healthz"))).await?;
        decode(op, response).await
    }

    async fn service_info(&self) -> Result<serde_json::Value> {
        let op = Operation::ServiceInfo;
        let response = self.send(op, self.client.get(self.url("/"))).await?;
        decode(op, response).await
    }

    async fn create_workspace(&self) -> Result<WorkspaceId> {
        let op = Operation::CreateWorkspace;
        let response = self.send(op, self.client.post(self.url("/workspaces"))).await?;
        let created: WorkspaceCreated = decode(op, response).await?;
        Ok(created.workspace_id)
    }

    async fn exec(&self, workspace: &WorkspaceId, command: &str) -> Result<ExecResult> {
        let op = Operation::Exec;
        debug!(workspace = %workspace, command, "gateway exec");

        let request = self
            .client
            .post(self.url(&format!("/workspaces/{workspace}/exec")))
            .query(&[("command", command)])
            .timeout(self.exec_timeout);

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() && !e.is_connect() {
                GatewayError::ExecTimeout {
                    workspace_id: workspace.clone(),
                    timeout: self.exec_timeout,
                }
            } else {
                transport_error(op, e)
            }
        })?;

        let response = check_status(op, response).await?;
        decode(op, response).await
    }

    async fn delete_workspace(&self, workspace: &WorkspaceId) -> Result<()> {
        let op = Operation::DeleteWorkspace;
        let url = self.url(&format!("/workspaces/{workspace}"));
        self.send(op, self.client.delete(url)).await?;
        Ok(())
    }

    async fn create_snapshot_trigger(&self, workspace: &WorkspaceId) -> Result<SnapshotTrigger> {
        let op = Operation::CreateSnapshotTrigger;
        let request = self
            .client
            .post(self.url("/snapshots/triggers"))
            .json(&TriggerRequest {
                workspace_id: workspace,
            });

        let response = self.send(op, request).await?;
        let created: TriggerCreated = decode(op, response).await?;
        Ok(SnapshotTrigger {
            name: created.name,
            workspace_id: workspace.clone(),
        })
    }

    async fn delete_snapshot_trigger(&self, trigger: &str) -> Result<()> {
        let op = Operation::DeleteSnapshotTrigger;
        let url = self.url(&format!("/snapshots/triggers/{trigger}"));
        self.send(op, self.client.delete(url)).await?;
        Ok(())
    }

    async fn snapshot_status(&self, trigger: &str) -> Result<SnapshotStatus> {
        let op = Operation::SnapshotStatus;
        let request = self
            .client
            .get(self.url("/snapshots/status"))
            .query(&[("trigger_name", trigger)]);

        let response = self.send(op, request).await?;
        let body: SnapshotStatusResponse = decode(op, response).await?;
        body.into_status()
            .map_err(|message| GatewayError::Decode { operation: op, message })
    }

    async fn restore_snapshot(&self, snapshot: &str) -> Result<WorkspaceId> {
        let op = Operation::RestoreSnapshot;
        let request = self
            .client
            .post(self.url("/snapshots/restore"))
            .json(&RestoreRequest {
                snapshot_name: snapshot,
            });

        let response = self.send(op, request).await?;
        let created: WorkspaceCreated = decode(op, response).await?;
        Ok(created.workspace_id)
    }
}
