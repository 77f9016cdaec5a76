//! Connection configuration for the API server

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// How to reach and authenticate against the API server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestConfig {
    /// Base URL, e.g. `https://10.0.0.1:6443`
    pub host: String,

    /// Bearer token sent on every request
    #[serde(rename = "bearer-token", skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Client-side limit on requests per second (0 disables throttling)
    pub qps: u32,

    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            host: "https://localhost:6443".to_string(),
            bearer_token: None,
            timeout_ms: 30_000,
            qps: 20,
            user_agent: format!("ctrlmgr/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl RestConfig {
    /// Config pointing at `host` with default limits
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into();
        debug!(%host, "RestConfig::new: called");
        Self {
            host,
            ..Default::default()
        }
    }

    /// Get the request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RestConfig::default();
        assert_eq!(config.host, "https://localhost:6443");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.qps, 20);
        assert!(config.user_agent.starts_with("ctrlmgr/"));
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = "host: http://127.0.0.1:8080\nbearer-token: abc\ntimeout-ms: 500\n";
        let config: RestConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.host, "http://127.0.0.1:8080");
        assert_eq!(config.bearer_token.as_deref(), Some("abc"));
        assert_eq!(config.timeout(), Duration::from_millis(500));
        assert_eq!(config.qps, 20);
    }
}
