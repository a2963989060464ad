//! Sequential model fallback
//!
//! Hosted model identifiers come and go, so callers hand over an ordered list
//! of candidates instead of a single hardcoded name. Candidates are tried one
//! at a time; the first success wins and later candidates are never called.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::{Answer, ModelInvoker, ModelRequest, ModelRoute};

/// Tries each candidate model in order until one answers
#[derive(Clone)]
pub struct FallbackInvoker<I> {
    invoker: I,
    candidates: Vec<String>,
}

impl<I: ModelInvoker> FallbackInvoker<I> {
    pub fn new(invoker: I, candidates: Vec<String>) -> Self {
        Self {
            invoker,
            candidates,
        }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Invoke `request` against an explicit candidate list
    ///
    /// Returns the first successful answer. If every candidate fails with an
    /// invocation error, all failures are returned in order inside
    /// `Error::AllCandidatesFailed`. A missing credential aborts immediately
    /// since every candidate would fail the same way.
    pub async fn invoke_with_fallback(
        &self,
        candidates: &[String],
        request: &ModelRequest,
    ) -> Result<Answer> {
        if candidates.is_empty() {
            return Err(Error::InvalidData(
                "No candidate models configured".to_string(),
            ));
        }

        let mut attempts = Vec::new();

        for (position, model) in candidates.iter().enumerate() {
            debug!(model = %model, position, "Trying candidate model");

            match self.invoker.invoke(model, request).await {
                Ok(reply) => {
                    if position > 0 {
                        info!(model = %model, failed = attempts.len(), "Fallback candidate succeeded");
                    }
                    return Ok(Answer {
                        model: model.clone(),
                        reply,
                    });
                }
                Err(Error::Invocation(e)) => {
                    warn!(model = %model, kind = %e.kind, error = %e.message, "Candidate model failed");
                    attempts.push(e);
                }
                Err(other) => return Err(other),
            }
        }

        warn!(
            candidates = candidates.len(),
            "All candidate models failed"
        );
        Err(Error::AllCandidatesFailed { attempts })
    }
}

#[async_trait]
impl<I: ModelInvoker> ModelRoute for FallbackInvoker<I> {
    async fn run(&self, request: &ModelRequest) -> Result<Answer> {
        self.invoke_with_fallback(&self.candidates, request).await
    }

    fn models(&self) -> Vec<String> {
        self.candidates.clone()
    }
}
