use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;
use vortex_models::report::REQUIRED_FIELDS;

use crate::error::BackendError;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// One logical dispatch to the generative backend: assembled prompt text
/// plus an optional inline image attachment.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub image_base64: Option<String>,
}

/// Seam to the generative backend. Mockable for testing.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Dispatch one request under the given credential and return the raw
    /// response text.
    async fn generate(
        &self,
        api_key: &str,
        request: &GenerateRequest,
    ) -> Result<String, BackendError>;
}

/// Gemini REST client (`models/{model}:generateContent`) enforcing the
/// structured response schema on every call.
pub struct GeminiClient {
    client: Client,
    model: String,
    timeout: Duration,
    base_url: String,
}

impl GeminiClient {
    pub fn new(model: String, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            model,
            timeout,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate(
        &self,
        api_key: &str,
        request: &GenerateRequest,
    ) -> Result<String, BackendError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        debug!(model = %self.model, has_image = request.image_base64.is_some(), "Dispatching to backend");

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .timeout(self.timeout)
            .json(&build_request_body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = response.json().await?;
        extract_text(&value).ok_or(BackendError::EmptyResponse)
    }
}

/// The strict output schema declared with every dispatch: all twelve
/// report fields required, scalar-typed.
pub fn response_schema() -> Value {
    let mut properties = serde_json::Map::new();
    for field in REQUIRED_FIELDS {
        let kind = match field {
            "probability" | "safetyScore" => "NUMBER",
            _ => "STRING",
        };
        properties.insert(field.to_string(), json!({ "type": kind }));
    }

    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": REQUIRED_FIELDS,
    })
}

/// Assemble the JSON body for a `generateContent` call.
pub fn build_request_body(request: &GenerateRequest) -> Value {
    let mut parts = vec![json!({ "text": request.prompt })];

    if let Some(image) = &request.image_base64 {
        parts.push(json!({
            "inlineData": {
                "mimeType": "image/png",
                "data": strip_data_url_prefix(image),
            }
        }));
    }

    json!({
        "contents": [{ "parts": parts }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema(),
        }
    })
}

/// Browsers often send `data:image/png;base64,<payload>`; the backend
/// wants only the payload.
fn strip_data_url_prefix(image: &str) -> &str {
    match image.split_once(',') {
        Some((_, payload)) => payload,
        None => image,
    }
}

/// Pull the concatenated text out of the first candidate, if any.
fn extract_text(value: &Value) -> Option<String> {
    let parts = value["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect();

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
