//! Backend connection configuration.

use serde::Deserialize;

/// Where the backend lives and how long to wait for it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpBackendConfig {
    /// Base URL the REST paths are joined to, e.g. `http://127.0.0.1:5000`.
    pub url: String,
    /// Per-request timeout in seconds; `0` disables it.
    pub timeout_secs: u64,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:5000".to_string(),
            timeout_secs: 10,
        }
    }
}
