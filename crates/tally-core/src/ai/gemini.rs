//! Hosted Gemini backend
//!
//! Talks to the Generative Language REST API:
//!
//! ```text
//! POST {host}/v1beta/models/{model}:generateContent
//! x-goog-api-key: <key>
//! ```
//!
//! Tool schemas are sent as `functionDeclarations`; a `functionCall` part in
//! the reply becomes a `StructuredCall`.
//!
//! # Configuration
//!
//! Environment variables:
//! - `GEMINI_API_KEY` (or `GOOGLE_API_KEY`): API key. Required for any call.
//! - `GEMINI_HOST`: Base URL override (default: https://generativelanguage.googleapis.com)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{Error, InvocationError, InvocationErrorKind, Result};

use super::types::{BackendInfo, ModelReply, ModelRequest, StructuredCall, ToolSchema};
use super::{truncate_for_log, ModelInvoker};

pub const DEFAULT_GEMINI_HOST: &str = "https://generativelanguage.googleapis.com";

/// Gemini backend over the public REST API
#[derive(Clone)]
pub struct GeminiBackend {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GeminiBackend {
    /// Create a new Gemini backend
    pub fn new(base_url: &str, api_key: Option<&str>, timeout: Duration) -> Self {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from),
        }
    }

    /// Create from environment variables
    ///
    /// Never fails: a missing key is reported when a call is attempted.
    pub fn from_env(timeout: Duration) -> Self {
        let host = std::env::var("GEMINI_HOST").unwrap_or_else(|_| DEFAULT_GEMINI_HOST.to_string());
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .ok();
        Self::new(&host, api_key.as_deref(), timeout)
    }

    /// Get the base URL
    pub fn host(&self) -> &str {
        &self.base_url
    }

    fn credential(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            Error::CredentialMissing(
                "Gemini API key not set (GEMINI_API_KEY or GOOGLE_API_KEY)".to_string(),
            )
        })
    }

    fn build_request(request: &ModelRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(&request.prompt)],
            }],
            system_instruction: request.system.as_ref().map(|s| Content {
                role: None,
                parts: vec![Part::text(s)],
            }),
            tools: request.tool.as_ref().map(|t| {
                vec![ToolDeclaration {
                    function_declarations: vec![FunctionDeclaration::from(t)],
                }]
            }),
            generation_config: GenerationConfig { temperature: 0.1 },
        }
    }
}

/// Turn a decoded generateContent body into a reply
fn reply_from_response(model: &str, response: GenerateContentResponse) -> Result<ModelReply> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates returned".to_string());
        return Err(
            InvocationError::new(model, InvocationErrorKind::MalformedResponse, reason).into(),
        );
    };

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    let mut texts = Vec::new();
    let mut call = None;

    for part in parts {
        if let Some(text) = part.text {
            texts.push(text);
        }
        if call.is_none() {
            if let Some(fc) = part.function_call {
                let args = match fc.args {
                    Some(serde_json::Value::Object(map)) => map,
                    _ => serde_json::Map::new(),
                };
                call = Some(StructuredCall {
                    name: fc.name,
                    args,
                });
            }
        }
    }

    let reply = ModelReply {
        text: if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n"))
        },
        call,
    };

    if reply.is_empty() {
        let reason = candidate
            .finish_reason
            .unwrap_or_else(|| "empty response".to_string());
        return Err(InvocationError::new(
            model,
            InvocationErrorKind::MalformedResponse,
            format!("no text or function call in reply (finish reason: {})", reason),
        )
        .into());
    }

    Ok(reply)
}

/// Classify a non-success response, using the error payload when present
fn error_from_status(model: &str, status: u16, body: &str) -> InvocationError {
    let parsed: Option<ApiErrorEnvelope> = serde_json::from_str(body).ok();
    let (message, status_name) = match parsed {
        Some(env) => (env.error.message, env.error.status.unwrap_or_default()),
        None => (truncate_for_log(body, 300), String::new()),
    };

    let kind = if message.contains("API key not valid") || body.contains("API_KEY_INVALID") {
        InvocationErrorKind::Authentication
    } else if status_name == "RESOURCE_EXHAUSTED" {
        InvocationErrorKind::RateLimited
    } else {
        InvocationErrorKind::from_status(status)
    };

    InvocationError::new(model, kind, format!("HTTP {}: {}", status, message))
}

#[async_trait]
impl ModelInvoker for GeminiBackend {
    #[instrument(level = "debug", skip(self, request), fields(prompt_len = request.prompt.len()))]
    async fn invoke(&self, model: &str, request: &ModelRequest) -> Result<ModelReply> {
        let api_key = self.credential()?;
        let body = Self::build_request(request);

        debug!(
            model,
            with_tool = request.tool.is_some(),
            "Sending generateContent request"
        );

        let response = self
            .http_client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, model
            ))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| InvocationError::from_reqwest(model, &e))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| InvocationError::from_reqwest(model, &e))?;

        if !status.is_success() {
            let err = error_from_status(model, status.as_u16(), &raw);
            warn!(model, %status, kind = %err.kind, "Gemini API error");
            return Err(err.into());
        }

        let decoded: GenerateContentResponse = serde_json::from_str(&raw).map_err(|e| {
            InvocationError::new(
                model,
                InvocationErrorKind::MalformedResponse,
                format!("{} | Raw: {}", e, truncate_for_log(&raw, 200)),
            )
        })?;

        let reply = reply_from_response(model, decoded)?;
        debug!(
            model,
            has_text = reply.text.is_some(),
            has_call = reply.call.is_some(),
            "Received Gemini reply"
        );
        Ok(reply)
    }

    async fn health_check(&self) -> bool {
        self.list_models().await.is_ok()
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let api_key = self.credential()?;
        let response = self
            .http_client
            .get(format!("{}/v1beta/models", self.base_url))
            .header("x-goog-api-key", api_key)
            .send()
            .await
            .map_err(|e| InvocationError::from_reqwest("*", &e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_status("*", status, &body).into());
        }

        let listed: ListModelsResponse = response
            .json()
            .await
            .map_err(|e| InvocationError::from_reqwest("*", &e))?;

        Ok(listed
            .models
            .into_iter()
            .map(|m| m.name.trim_start_matches("models/").to_string())
            .collect())
    }

    fn info(&self) -> BackendInfo {
        BackendInfo {
            backend: "gemini",
            host: self.base_url.clone(),
            has_credential: self.api_key.is_some(),
        }
    }
}

/// generateContent request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDeclaration>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    function_call: Option<FunctionCall>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            function_call: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolDeclaration {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl From<&ToolSchema> for FunctionDeclaration {
    fn from(tool: &ToolSchema) -> Self {
        Self {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

/// generateContent response body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ListedModel>,
}

#[derive(Debug, Deserialize)]
struct ListedModel {
    name: String,
}
