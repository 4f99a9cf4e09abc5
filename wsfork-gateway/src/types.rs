use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque workspace identifier assigned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for WorkspaceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for WorkspaceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Structured output of a command run inside a workspace.
///
/// The gateway's exec payload is loosely specified, so every field is optional
/// on the wire and anything unrecognised is preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecResult {
    #[serde(default, alias = "returncode", alias = "exit_status")]
    pub exit_code: Option<i32>,

    #[serde(default)]
    pub stdout: String,

    #[serde(default)]
    pub stderr: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ExecResult {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: stdout.into(),
            stderr: stderr.into(),
            extra: serde_json::Map::new(),
        }
    }

    /// A missing exit code is treated as success.
    pub fn success(&self) -> bool {
        self.exit_code.unwrap_or(0) == 0
    }
}

/// A pending request to snapshot a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotTrigger {
    pub name: String,
    pub workspace_id: WorkspaceId,
}

/// Client-observed state of a snapshot trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotStatus {
    Pending,
    Ready { snapshot_name: String },
    Failed { reason: Option<String> },
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WorkspaceCreated {
    pub workspace_id: WorkspaceId,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TriggerCreated {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct TriggerRequest<'a> {
    pub workspace_id: &'a WorkspaceId,
}

#[derive(Debug, Serialize)]
pub(crate) struct RestoreRequest<'a> {
    pub snapshot_name: &'a str,
}

/// Wire form of `GET /snapshots/status`.
///
/// Older gateways only report `ready`; newer ones add `status`, `failed` and `error`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SnapshotStatusResponse {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub snapshot_name: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SnapshotStatusResponse {
    pub fn into_status(self) -> std::result::Result<SnapshotStatus, String> {
        let status = self.status.as_deref().map(str::to_ascii_lowercase);

        if self.failed || status.as_deref() == Some("failed") {
            return Ok(SnapshotStatus::Failed { reason: self.error });
        }

        if self.ready || status.as_deref() == Some("ready") {
            return match self.snapshot_name {
                Some(snapshot_name) if !snapshot_name.is_empty() => {
                    Ok(SnapshotStatus::Ready { snapshot_name })
                }
                _ => Err("snapshot reported ready without a snapshot_name".to_string()),
            };
        }

        Ok(SnapshotStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> std::result::Result<SnapshotStatus, String> {
        serde_json::from_value::<SnapshotStatusResponse>(value)
            .expect("status payload should deserialize")
            .into_status()
    }

    #[test]
    fn test_status_ready_flag() {
        let status = decode(json!({ "ready": true, "snapshot_name": "snap-1" }));
        assert_eq!(
            status,
            Ok(SnapshotStatus::Ready {
                snapshot_name: "snap-1".to_string()
            })
        );
    }

    #[test]
    fn test_status_string_forms() {
        assert_eq!(decode(json!({ "status": "pending" })), Ok(SnapshotStatus::Pending));
        assert_eq!(
            decode(json!({ "status": "FAILED", "error": "disk full" })),
            Ok(SnapshotStatus::Failed {
                reason: Some("disk full".to_string())
            })
        );
        assert_eq!(
            decode(json!({ "status": "ready", "snapshot_name": "snap-2" })),
            Ok(SnapshotStatus::Ready {
                snapshot_name: "snap-2".to_string()
            })
        );
    }

    #[test]
    fn test_status_empty_body_is_pending() {
        assert_eq!(decode(json!({})), Ok(SnapshotStatus::Pending));
    }

    #[test]
    fn test_failed_wins_over_ready() {
        let status = decode(json!({ "ready": true, "failed": true, "snapshot_name": "s" }));
        assert_eq!(status, Ok(SnapshotStatus::Failed { reason: None }));
    }

    #[test]
    fn test_ready_without_name_is_rejected() {
        assert!(decode(json!({ "ready": true })).is_err());
        assert!(decode(json!({ "ready": true, "snapshot_name": "" })).is_err());
    }

    #[test]
    fn test_exec_result_tolerates_partial_payloads() {
        let result: ExecResult =
            serde_json::from_value(json!({ "stdout": "hi\n", "duration_ms": 12 })).unwrap();
        assert_eq!(result.exit_code, None);
        assert!(result.success());
        assert_eq!(result.extra.get("duration_ms"), Some(&json!(12)));

        let result: ExecResult =
            serde_json::from_value(json!({ "returncode": 2, "stderr": "boom" })).unwrap();
        assert_eq!(result.exit_code, Some(2));
        assert!(!result.success());
    }
}
