use serde::Deserialize;
use std::time::Duration;

/// Connection settings for [`crate::HttpGateway`].
///
/// Each field falls back to an environment variable, then to a built-in default.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Total budget for every call except exec.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Exec calls run arbitrary commands and get their own, longer budget.
    #[serde(default = "default_exec_timeout")]
    pub exec_timeout_secs: u64,
}

fn default_base_url() -> String {
    std::env::var("WSFORK_GATEWAY_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string())
}

fn env_secs(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(fallback)
}

fn default_request_timeout() -> u64 {
    env_secs("WSFORK_REQUEST_TIMEOUT_SECS", 30)
}

fn default_connect_timeout() -> u64 {
    env_secs("WSFORK_CONNECT_TIMEOUT_SECS", 10)
}

fn default_exec_timeout() -> u64 {
    env_secs("WSFORK_EXEC_TIMEOUT_SECS", 300) // 5 minutes
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            exec_timeout_secs: default_exec_timeout(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }
}
