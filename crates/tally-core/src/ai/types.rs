//! Model request/reply types
//!
//! These types are backend-agnostic and used across all model implementations.

use serde::{Deserialize, Serialize};

/// A function/tool the model may call instead of answering in text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema of the argument object
    pub parameters: serde_json::Value,
}

impl ToolSchema {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// One prompt sent to a model
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub tool: Option<ToolSchema>,
}

impl ModelRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_tool(mut self, tool: ToolSchema) -> Self {
        self.tool = Some(tool);
        self
    }
}

/// Typed arguments returned by the model for a declared tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredCall {
    pub name: String,
    pub args: serde_json::Map<String, serde_json::Value>,
}

/// What a model answered: free text, a structured call, or both
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub text: Option<String>,
    pub call: Option<StructuredCall>,
}

impl ModelReply {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            call: None,
        }
    }

    pub fn from_call(name: impl Into<String>, args: serde_json::Value) -> Self {
        let args = match args {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Self {
            text: None,
            call: Some(StructuredCall {
                name: name.into(),
                args,
            }),
        }
    }

    /// True if the reply carries neither usable text nor a structured call
    pub fn is_empty(&self) -> bool {
        self.call.is_none() && self.text.as_deref().map_or(true, |t| t.trim().is_empty())
    }
}

/// A reply together with the model that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub model: String,
    pub reply: ModelReply,
}

/// Backend description for display
#[derive(Debug, Clone)]
pub struct BackendInfo {
    pub backend: &'static str,
    pub host: String,
    pub has_credential: bool,
}
