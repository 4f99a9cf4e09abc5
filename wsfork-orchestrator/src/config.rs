use crate::fork::{ForkOptions, MIN_POLL_INTERVAL};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// How long to wait for a snapshot to become ready.
    #[serde(default = "default_fork_timeout")]
    pub fork_timeout_secs: u64,

    /// Values below the engine's floor of 10ms are raised to it.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Consecutive status-poll errors tolerated before giving up; 0 disables the limit.
    #[serde(default = "default_max_poll_failures")]
    pub max_poll_failures: u32,

    /// Per task unit deadline. Unset means units may run indefinitely.
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: Option<u64>,

    /// Remove the snapshot trigger once every restore succeeded.
    #[serde(default = "default_delete_trigger")]
    pub delete_trigger: bool,
}

fn default_fork_timeout() -> u64 {
    std::env::var("WSFORK_FORK_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(60)
}

fn default_poll_interval() -> u64 {
    std::env::var("WSFORK_POLL_INTERVAL_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000) // one status check per second
}

fn default_max_poll_failures() -> u32 {
    std::env::var("WSFORK_MAX_POLL_FAILURES")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10)
}

fn default_task_timeout() -> Option<u64> {
    std::env::var("WSFORK_TASK_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
}

fn default_delete_trigger() -> bool {
    std::env::var("WSFORK_DELETE_TRIGGER")
        .map(|s| matches!(s.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            fork_timeout_secs: default_fork_timeout(),
            poll_interval_ms: default_poll_interval(),
            max_poll_failures: default_max_poll_failures(),
            task_timeout_secs: default_task_timeout(),
            delete_trigger: default_delete_trigger(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn fork_timeout(&self) -> Duration {
        Duration::from_secs(self.fork_timeout_secs)
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(Duration::from_secs)
    }

    pub fn fork_options(&self) -> ForkOptions {
        ForkOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms).max(MIN_POLL_INTERVAL),
            max_poll_failures: (self.max_poll_failures > 0).then_some(self.max_poll_failures),
            delete_trigger: self.delete_trigger,
        }
    }
}
