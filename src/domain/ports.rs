use crate::domain::model::{ApiPath, ApiResponse, HttpMethod};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Anything that can carry a request to the API and bring back a decoded response.
/// HTTP error statuses are responses, not errors, and so are bodies that
/// cannot be decoded.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn send(
        &self,
        method: HttpMethod,
        path: &ApiPath,
        payload: Option<&serde_json::Value>,
    ) -> Result<ApiResponse>;

    fn base_url(&self) -> &str;
}
