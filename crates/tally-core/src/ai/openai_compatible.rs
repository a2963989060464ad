//! OpenAI-compatible backend implementation
//!
//! Works with any server that implements the OpenAI chat completions API:
//! - vLLM (http://localhost:8000)
//! - LocalAI (http://localhost:8080)
//! - llama-server / llama.cpp (http://localhost:8080)
//! - text-generation-inference
//!
//! Tool schemas are sent as `tools: [{type: "function", ...}]`; the first
//! returned `tool_calls` entry becomes a `StructuredCall`.
//!
//! # Configuration
//!
//! Environment variables:
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{InvocationError, InvocationErrorKind, Result};

use super::types::{BackendInfo, ModelReply, ModelRequest, StructuredCall, ToolSchema};
use super::{truncate_for_log, ModelInvoker};

/// OpenAI-compatible backend
///
/// Works with any server implementing the OpenAI `/v1/chat/completions` API.
/// Self-hosted servers usually run without a key, so none is required.
///
/// # Example
///
/// ```rust,ignore
/// // vLLM
/// export OPENAI_COMPATIBLE_HOST="http://192.168.1.100:8000"
///
/// // LocalAI
/// export OPENAI_COMPATIBLE_HOST="http://192.168.1.100:8080"
/// ```
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAICompatibleBackend {
    /// Create a new OpenAI-compatible backend
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Create with an API key
    pub fn with_api_key(base_url: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            api_key: Some(api_key.to_string()),
            ..Self::new(base_url, timeout)
        }
    }

    /// Create from environment variables
    ///
    /// Required: `OPENAI_COMPATIBLE_HOST`
    /// Optional: `OPENAI_COMPATIBLE_API_KEY`
    pub fn from_env(timeout: Duration) -> Option<Self> {
        let host = std::env::var("OPENAI_COMPATIBLE_HOST").ok()?;
        let mut backend = Self::new(&host, timeout);
        backend.api_key = std::env::var("OPENAI_COMPATIBLE_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        Some(backend)
    }

    pub fn host(&self) -> &str {
        &self.base_url
    }

    fn build_request(model: &str, request: &ModelRequest) -> ChatCompletionRequest {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        ChatCompletionRequest {
            model: model.to_string(),
            messages,
            temperature: Some(0.1),
            tools: request.tool.as_ref().map(|t| vec![ChatTool::from(t)]),
            stream: false,
        }
    }
}

/// Turn a decoded chat completion into a reply
fn reply_from_response(model: &str, response: ChatCompletionResponse) -> Result<ModelReply> {
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| {
            InvocationError::new(
                model,
                InvocationErrorKind::MalformedResponse,
                "No choices in response",
            )
        })?;

    let call = match message.tool_calls.into_iter().next() {
        Some(tc) => {
            let args: serde_json::Value =
                serde_json::from_str(&tc.function.arguments).map_err(|e| {
                    InvocationError::new(
                        model,
                        InvocationErrorKind::MalformedResponse,
                        format!(
                            "tool call arguments are not JSON: {} | Raw: {}",
                            e,
                            truncate_for_log(&tc.function.arguments, 200)
                        ),
                    )
                })?;
            let args = match args {
                serde_json::Value::Object(map) => map,
                _ => serde_json::Map::new(),
            };
            Some(StructuredCall {
                name: tc.function.name,
                args,
            })
        }
        None => None,
    };

    let reply = ModelReply {
        text: message.content.filter(|c| !c.trim().is_empty()),
        call,
    };

    if reply.is_empty() {
        return Err(InvocationError::new(
            model,
            InvocationErrorKind::MalformedResponse,
            "Empty message in response",
        )
        .into());
    }

    Ok(reply)
}

#[async_trait]
impl ModelInvoker for OpenAICompatibleBackend {
    async fn invoke(&self, model: &str, request: &ModelRequest) -> Result<ModelReply> {
        let body = Self::build_request(model, request);

        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&body);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder
            .send()
            .await
            .map_err(|e| InvocationError::from_reqwest(model, &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(model, %status, "OpenAI-compatible API error");
            return Err(InvocationError::new(
                model,
                InvocationErrorKind::from_status(status.as_u16()),
                format!("HTTP {}: {}", status, truncate_for_log(&body, 300)),
            )
            .into());
        }

        let chat_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| InvocationError::from_reqwest(model, &e))?;

        let reply = reply_from_response(model, chat_response)?;
        debug!(
            model,
            has_text = reply.text.is_some(),
            has_call = reply.call.is_some(),
            "OpenAI-compatible reply"
        );
        Ok(reply)
    }

    async fn health_check(&self) -> bool {
        // Try /v1/models first (standard OpenAI endpoint)
        if let Ok(resp) = self
            .http_client
            .get(format!("{}/v1/models", self.base_url))
            .send()
            .await
        {
            if resp.status().is_success() {
                return true;
            }
        }

        // Try /health (common for LocalAI, llama-server)
        if let Ok(resp) = self
            .http_client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
        {
            if resp.status().is_success() {
                return true;
            }
        }

        false
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let mut req_builder = self
            .http_client
            .get(format!("{}/v1/models", self.base_url));
        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder
            .send()
            .await
            .map_err(|e| InvocationError::from_reqwest("*", &e))?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(InvocationError::new(
                "*",
                InvocationErrorKind::from_status(status.as_u16()),
                format!("HTTP {} listing models", status),
            )
            .into());
        }

        let listed: ModelList = response
            .json()
            .await
            .map_err(|e| InvocationError::from_reqwest("*", &e))?;
        Ok(listed.data.into_iter().map(|m| m.id).collect())
    }

    fn info(&self) -> BackendInfo {
        BackendInfo {
            backend: "openai_compatible",
            host: self.base_url.clone(),
            has_credential: self.api_key.is_some(),
        }
    }
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ChatTool>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ChatFunction,
}

#[derive(Debug, Serialize)]
struct ChatFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl From<&ToolSchema> for ChatTool {
    fn from(tool: &ToolSchema) -> Self {
        Self {
            kind: "function",
            function: ChatFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            },
        }
    }
}

/// OpenAI chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChatToolCall>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    function: ChatToolCallFunction,
}

/// `arguments` is a JSON document encoded as a string
#[derive(Debug, Deserialize)]
struct ChatToolCallFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}
