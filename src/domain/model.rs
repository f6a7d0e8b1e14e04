use crate::utils::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Request body for `POST /barrels`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBarrel {
    pub qr: String,
    pub rfid: String,
    pub nfc: String,
}

impl Default for NewBarrel {
    fn default() -> Self {
        Self {
            qr: "test_qr".to_string(),
            rfid: "test_rfid".to_string(),
            nfc: "test_nfc".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Barrel {
    pub id: String,
    pub qr: String,
    pub rfid: String,
    pub nfc: String,
}

/// Request body for `POST /measurements`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMeasurement {
    pub barrel_id: String,
    pub dirt_level: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub barrel_id: String,
    pub dirt_level: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Json(serde_json::Value),
    /// Decoded text that did not parse as JSON.
    Text(String),
    /// Bytes no supported charset could decode; `raw` is a lossy rendering.
    Undecodable { message: String, raw: String },
}

/// Request path as literal segments. Each segment is percent-encoded on its
/// own, so an id containing `/` stays one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPath {
    segments: Vec<String>,
}

impl ApiPath {
    pub fn collection(name: &str) -> Self {
        Self {
            segments: vec![name.to_string()],
        }
    }

    pub fn item(collection: &str, id: &str) -> Self {
        Self {
            segments: vec![collection.to_string(), id.to_string()],
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for ApiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", segment.replace('%', "%25").replace('/', "%2F"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: ResponseBody,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Raw body text for diagnostics.
    pub fn raw_text(&self) -> String {
        match &self.body {
            ResponseBody::Empty => String::new(),
            ResponseBody::Json(value) => value.to_string(),
            ResponseBody::Text(text) => text.clone(),
            ResponseBody::Undecodable { raw, .. } => raw.clone(),
        }
    }

    pub fn json(&self) -> Result<&serde_json::Value> {
        match &self.body {
            ResponseBody::Json(value) => Ok(value),
            ResponseBody::Empty => Err(HarnessError::Decode {
                message: format!(
                    "expected a JSON body, got an empty response (status {})",
                    self.status
                ),
                raw: None,
            }),
            ResponseBody::Text(text) => Err(HarnessError::Decode {
                message: format!("malformed JSON in response (status {})", self.status),
                raw: Some(text.clone()),
            }),
            ResponseBody::Undecodable { message, raw } => Err(HarnessError::Decode {
                message: message.clone(),
                raw: Some(raw.clone()),
            }),
        }
    }
}
