//! Client configuration.

use serde::{Deserialize, Serialize};

const DEFAULT_URL: &str = "http://api.51convert.cn";

/// Connection settings for the cloud API and credential endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the REST endpoints.
    pub url: String,
    /// Application id issued by the cloud service.
    pub app_id: String,
    /// Secret for the application id.
    pub secret: String,
    /// Share one access token across processes through the database.
    pub shared_token: bool,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, app_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            app_id: app_id.into(),
            secret: secret.into(),
            shared_token: false,
        }
    }

    /// Reads settings from `CLAB_URL`, `CLAB_APPID` and `CLAB_SECRET`.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("CLAB_URL").unwrap_or_else(|_| DEFAULT_URL.to_string()),
            app_id: std::env::var("CLAB_APPID").unwrap_or_default(),
            secret: std::env::var("CLAB_SECRET").unwrap_or_default(),
            shared_token: false,
        }
    }

    pub fn with_shared_token(mut self, shared: bool) -> Self {
        self.shared_token = shared;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
