//! Collection API transport over reqwest.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::traits::Transport;
use crate::error::TransportError;

/// Header marking a create that should run as a background task.
pub const BACKGROUND_TASK_HEADER: &str = "X-GGRC-BackgroundTask";

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpTransportConfig {
    /// Server origin, e.g. `https://ggrc.example.com`
    pub base_url: String,
    /// Bearer token sent with every request
    pub api_key: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

/// POSTs batches to `{base_url}/api/{plural}`.
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport.
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some(ref api_key) = config.api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| TransportError::InvalidConfig(format!("API key: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Collection endpoint for a plural table name.
    fn collection_url(&self, plural: &str) -> String {
        format!("{}/api/{}", self.base_url, plural)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_collection(
        &self,
        plural: &str,
        body: Vec<Value>,
        background: bool,
    ) -> Result<Value, TransportError> {
        let url = self.collection_url(plural);
        debug!(url = %url, items = body.len(), background, "POST collection");

        let mut request = self.client.post(&url).json(&body);
        if background {
            request = request.header(BACKGROUND_TASK_HEADER, "true");
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(url = %url, status, "Collection POST failed");
            return Err(TransportError::Status { status, body });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))
    }
}
