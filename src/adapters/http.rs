use crate::adapters::decode::decode_body;
use crate::domain::model::{ApiPath, ApiResponse, HttpMethod};
use crate::domain::ports::ApiTransport;
use crate::utils::error::{HarnessError, Result};
use crate::utils::validation::validate_url;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// reqwest-backed client bound to one base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    base_url_text: String,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        validate_url("target.base_url", base_url)?;
        let base_url_parsed =
            Url::parse(base_url).map_err(|e| HarnessError::InvalidConfigValueError {
                field: "target.base_url".to_string(),
                value: base_url.to_string(),
                reason: e.to_string(),
            })?;

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("oilapi-harness/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url_parsed,
            base_url_text: base_url.to_string(),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Appends `path` to the base URL one segment at a time, so ids are
    /// percent-encoded whole and a base path prefix survives.
    pub fn endpoint(&self, path: &ApiPath) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments =
                url.path_segments_mut()
                    .map_err(|_| HarnessError::InvalidConfigValueError {
                        field: "target.base_url".to_string(),
                        value: self.base_url_text.clone(),
                        reason: "URL cannot be a base".to_string(),
                    })?;
            segments.pop_if_empty();
            for segment in path.segments() {
                segments.push(segment);
            }
        }
        Ok(url)
    }

    fn classify(&self, method: HttpMethod, url: &Url, error: reqwest::Error) -> HarnessError {
        if error.is_timeout() {
            HarnessError::Timeout {
                method: method.to_string(),
                url: url.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            HarnessError::Transport(error)
        }
    }
}

#[async_trait]
impl ApiTransport for ApiClient {
    async fn send(
        &self,
        method: HttpMethod,
        path: &ApiPath,
        payload: Option<&serde_json::Value>,
    ) -> Result<ApiResponse> {
        let url = self.endpoint(path)?;

        let mut request = self.client.request(method.into(), url.clone());
        if let Some(body) = payload {
            request = request.json(body);
        }

        tracing::debug!("📡 {} {}", method, url);
        if let Some(body) = payload {
            tracing::debug!("📡 payload: {}", body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.classify(method, &url, e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.classify(method, &url, e))?;

        tracing::debug!("📡 {} {} -> {} ({} bytes)", method, url, status, bytes.len());

        let body = decode_body(&bytes, content_type.as_deref());

        Ok(ApiResponse {
            status,
            content_type,
            body,
        })
    }

    fn base_url(&self) -> &str {
        &self.base_url_text
    }
}
