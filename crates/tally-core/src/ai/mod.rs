//! Pluggable model backend abstraction
//!
//! This module provides a backend-agnostic interface for "send a prompt, get
//! text or a structured call back".
//!
//! # Architecture
//!
//! - `ModelInvoker` trait: one call against one named model
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `GeminiBackend`, `OpenAICompatibleBackend`, `MockBackend`
//! - `ModelRoute` trait: how callers pick models. `PinnedModel` always uses one
//!   model, `FallbackInvoker` walks an ordered candidate list.
//!
//! # Usage
//!
//! ```rust,ignore
//! let client = AIClient::from_env(Duration::from_secs(30)).expect("backend configured");
//! let route = FallbackInvoker::new(client, vec!["gemini-2.0-flash".into(), "gemini-1.5-flash".into()]);
//! let answer = route.run(&ModelRequest::text("Hello")).await?;
//! println!("{} answered: {:?}", answer.model, answer.reply.text);
//! ```
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (gemini, openai_compatible, mock). Default: gemini
//! - `GEMINI_API_KEY` / `GOOGLE_API_KEY`: credential for the hosted Gemini API
//! - `GEMINI_HOST`: API base URL override (default: https://generativelanguage.googleapis.com)
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required for openai_compatible backend)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)

pub mod fallback;
mod gemini;
mod mock;
mod openai_compatible;
pub mod types;

pub use fallback::FallbackInvoker;
pub use gemini::GeminiBackend;
pub use mock::MockBackend;
#[cfg(any(test, feature = "test-utils"))]
pub(crate) use mock::heuristic_reply;
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;

/// A single call to a generative model
///
/// Implementations are stateless across calls and must report every failure
/// as an error, never as empty text.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Send `request` to `model` and return its text and/or structured call
    async fn invoke(&self, model: &str, request: &ModelRequest) -> Result<ModelReply>;

    /// Check if the backend is reachable with the current credential
    async fn health_check(&self) -> bool;

    /// Model identifiers the backend advertises
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Backend name and host (for logging and the CLI)
    fn info(&self) -> BackendInfo;
}

#[async_trait]
impl<T: ModelInvoker + ?Sized> ModelInvoker for &T {
    async fn invoke(&self, model: &str, request: &ModelRequest) -> Result<ModelReply> {
        (**self).invoke(model, request).await
    }

    async fn health_check(&self) -> bool {
        (**self).health_check().await
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        (**self).list_models().await
    }

    fn info(&self) -> BackendInfo {
        (**self).info()
    }
}

/// A policy for choosing which model(s) answer a request
#[async_trait]
pub trait ModelRoute: Send + Sync {
    async fn run(&self, request: &ModelRequest) -> Result<Answer>;

    /// Models this route may call, in order
    fn models(&self) -> Vec<String>;
}

/// Route that always calls one model
#[derive(Clone)]
pub struct PinnedModel<I> {
    invoker: I,
    model: String,
}

impl<I: ModelInvoker> PinnedModel<I> {
    pub fn new(invoker: I, model: impl Into<String>) -> Self {
        Self {
            invoker,
            model: model.into(),
        }
    }
}

#[async_trait]
impl<I: ModelInvoker> ModelRoute for PinnedModel<I> {
    async fn run(&self, request: &ModelRequest) -> Result<Answer> {
        debug!(model = %self.model, "Invoking pinned model");
        let reply = self.invoker.invoke(&self.model, request).await?;
        Ok(Answer {
            model: self.model.clone(),
            reply,
        })
    }

    fn models(&self) -> Vec<String> {
        vec![self.model.clone()]
    }
}

/// Concrete AI client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AIClient {
    /// Hosted Gemini (Generative Language REST API)
    Gemini(GeminiBackend),
    /// OpenAI-compatible chat completions (vLLM, LocalAI, llama-server, etc.)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from environment variables
    ///
    /// Checks `AI_BACKEND` to determine which backend to use:
    /// - `gemini` (default): Uses GEMINI_API_KEY (or GOOGLE_API_KEY) and GEMINI_HOST
    /// - `openai_compatible`: Uses OPENAI_COMPATIBLE_HOST and OPENAI_COMPATIBLE_API_KEY
    /// - `mock`: Creates a mock backend with heuristic replies
    ///
    /// Returns None if the selected backend's required variables are not set.
    /// A missing Gemini key is not a construction failure; it surfaces as
    /// `Error::CredentialMissing` on the first call.
    pub fn from_env(timeout: Duration) -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "gemini".to_string());

        match backend.to_lowercase().as_str() {
            "gemini" | "google" => Some(AIClient::Gemini(GeminiBackend::from_env(timeout))),
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                OpenAICompatibleBackend::from_env(timeout).map(AIClient::OpenAICompatible)
            }
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to gemini");
                Some(AIClient::Gemini(GeminiBackend::from_env(timeout)))
            }
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }
}

#[async_trait]
impl ModelInvoker for AIClient {
    async fn invoke(&self, model: &str, request: &ModelRequest) -> Result<ModelReply> {
        match self {
            AIClient::Gemini(b) => b.invoke(model, request).await,
            AIClient::OpenAICompatible(b) => b.invoke(model, request).await,
            AIClient::Mock(b) => b.invoke(model, request).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::Gemini(b) => b.health_check().await,
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        match self {
            AIClient::Gemini(b) => b.list_models().await,
            AIClient::OpenAICompatible(b) => b.list_models().await,
            AIClient::Mock(b) => b.list_models().await,
        }
    }

    fn info(&self) -> BackendInfo {
        match self {
            AIClient::Gemini(b) => b.info(),
            AIClient::OpenAICompatible(b) => b.info(),
            AIClient::Mock(b) => b.info(),
        }
    }
}

/// Shorten a provider message for logs and error text
pub(crate) fn truncate_for_log(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut)
    }
}
