//! Cloud sync configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Endpoints and limits for talking to the storage provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Base URL for metadata calls (delta, shares).
    pub api_base_url: String,

    /// Base URL for file content calls (download, upload).
    pub content_base_url: String,

    /// Base URL of the provider's OAuth authorize page and token endpoint.
    pub oauth_base_url: String,

    /// Prefix of the canonical download URL written into published documents.
    pub download_base_url: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.dropbox.com".to_string(),
            content_base_url: "https://api-content.dropbox.com".to_string(),
            oauth_base_url: "https://www.dropbox.com".to_string(),
            download_base_url: "https://dl.dropboxusercontent.com/s/".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl CloudConfig {
    /// Points every API endpoint at a single base URL (mock servers).
    pub fn with_base_url(base: &str) -> Self {
        Self {
            api_base_url: base.to_string(),
            content_base_url: base.to_string(),
            oauth_base_url: base.to_string(),
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
