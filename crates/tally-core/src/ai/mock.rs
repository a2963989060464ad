//! Mock backend for testing
//!
//! Replies can be scripted per model (including failures), and every call is
//! logged so tests can assert which models were tried and with what prompt.
//! Unscripted models get a keyword heuristic, which keeps the CLI usable
//! offline with `AI_BACKEND=mock`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, LazyLock, Mutex};

use async_trait::async_trait;
use regex::Regex;

use crate::error::{Error, InvocationError, InvocationErrorKind, Result};
use crate::models::{Category, TransactionKind};

use super::types::{BackendInfo, ModelReply, ModelRequest};
use super::ModelInvoker;

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d{3})*)\s*(k|nghìn|tr|triệu)?").expect("valid regex")
});

#[derive(Debug, Clone)]
enum Scripted {
    Reply(ModelReply),
    Failure(InvocationErrorKind, String),
}

#[derive(Default)]
struct MockState {
    scripts: HashMap<String, VecDeque<Scripted>>,
    requests: Vec<(String, ModelRequest)>,
}

/// Mock AI backend for testing
///
/// Clones share the same script and call log.
#[derive(Clone)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
    /// Whether health_check should return true
    pub healthy: bool,
    has_credential: bool,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy, credential present)
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            healthy: true,
            has_credential: true,
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// Every call fails with `CredentialMissing` before being logged
    pub fn without_credential(mut self) -> Self {
        self.has_credential = false;
        self
    }

    /// Queue a reply for `model`; the last queued entry repeats
    pub fn with_reply(self, model: &str, reply: ModelReply) -> Self {
        self.push(model, Scripted::Reply(reply));
        self
    }

    /// Queue a failure for `model`; the last queued entry repeats
    pub fn with_failure(self, model: &str, kind: InvocationErrorKind, message: &str) -> Self {
        self.push(model, Scripted::Failure(kind, message.to_string()));
        self
    }

    fn push(&self, model: &str, entry: Scripted) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state
            .scripts
            .entry(model.to_string())
            .or_default()
            .push_back(entry);
    }

    /// Models called so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.requests().into_iter().map(|(model, _)| model).collect()
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<(String, ModelRequest)> {
        let state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.requests.clone()
    }

    fn next_scripted(&self, model: &str) -> Option<Scripted> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let queue = state.scripts.get_mut(model)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl ModelInvoker for MockBackend {
    async fn invoke(&self, model: &str, request: &ModelRequest) -> Result<ModelReply> {
        if !self.has_credential {
            return Err(Error::CredentialMissing(
                "mock backend configured without a credential".to_string(),
            ));
        }

        {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            state.requests.push((model.to_string(), request.clone()));
        }

        match self.next_scripted(model) {
            Some(Scripted::Reply(reply)) => Ok(reply),
            Some(Scripted::Failure(kind, message)) => {
                Err(InvocationError::new(model, kind, message).into())
            }
            None => Ok(heuristic_reply(model, request)),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let mut models: Vec<String> = state.scripts.keys().cloned().collect();
        models.sort();
        Ok(models)
    }

    fn info(&self) -> BackendInfo {
        BackendInfo {
            backend: "mock",
            host: "mock://localhost".to_string(),
            has_credential: self.has_credential,
        }
    }
}

/// Keyword-based stand-in for a real model
pub(crate) fn heuristic_reply(model: &str, request: &ModelRequest) -> ModelReply {
    let input = request
        .prompt
        .lines()
        .rev()
        .find_map(|line| line.trim().strip_prefix("Input:"))
        .map(|s| s.trim().trim_matches('"').to_string())
        .unwrap_or_else(|| request.prompt.trim().to_string());

    let amount = guess_amount(&input);
    let category = guess_category(&input);
    let kind = if category == Category::Salary || input.to_lowercase().contains("thưởng") {
        TransactionKind::Income
    } else {
        TransactionKind::Expense
    };

    if let Some(tool) = &request.tool {
        return match amount {
            Some(amount) => ModelReply::from_call(
                tool.name.clone(),
                serde_json::json!({
                    "category": category.as_str(),
                    "amount": amount,
                    "type": kind.as_str(),
                    "note": input,
                }),
            ),
            None => ModelReply::from_text("This does not look like a financial transaction."),
        };
    }

    if request.prompt.contains("category|amount|note") {
        return match amount {
            Some(amount) => ModelReply::from_text(format!(
                "{}|{}|{}",
                category.vietnamese_label(),
                amount,
                input
            )),
            None => ModelReply::from_text("Không phải giao dịch."),
        };
    }

    ModelReply::from_text(format!(
        "[mock:{}] {}",
        model,
        super::truncate_for_log(&input, 80)
    ))
}

fn guess_amount(text: &str) -> Option<u64> {
    let caps = AMOUNT_RE.captures(text)?;
    let digits: String = caps[1].chars().filter(|c| c.is_ascii_digit()).collect();
    let base: u64 = digits.parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str().to_lowercase()) {
        Some(ref s) if s == "k" || s == "nghìn" => 1_000,
        Some(ref s) if s == "tr" || s == "triệu" => 1_000_000,
        _ => 1,
    };
    base.checked_mul(multiplier)
}

fn guess_category(text: &str) -> Category {
    let t = text.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| t.contains(w));

    if has(&["lương", "salary"]) {
        Category::Salary
    } else if has(&["cafe", "cà phê", "phở", "cơm", "ăn", "coffee", "lunch", "dinner"]) {
        Category::Food
    } else if has(&["grab", "taxi", "xăng", "bus", "xe"]) {
        Category::Transport
    } else if has(&["điện", "nước", "internet", "bill"]) {
        Category::Bills
    } else if has(&["phim", "game", "movie"]) {
        Category::Entertainment
    } else if has(&["cổ phiếu", "đầu tư", "stock"]) {
        Category::Investment
    } else if has(&["mua", "áo", "shop"]) {
        Category::Shopping
    } else {
        Category::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ToolSchema;

    #[tokio::test]
    async fn test_scripted_queue_repeats_last() {
        let mock = MockBackend::new()
            .with_failure("m", InvocationErrorKind::RateLimited, "slow down")
            .with_reply("m", ModelReply::from_text("ok"));

        assert!(mock.invoke("m", &ModelRequest::text("1")).await.is_err());
        let second = mock.invoke("m", &ModelRequest::text("2")).await.unwrap();
        let third = mock.invoke("m", &ModelRequest::text("3")).await.unwrap();
        assert_eq!(second.text.as_deref(), Some("ok"));
        assert_eq!(third.text.as_deref(), Some("ok"));
        assert_eq!(mock.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_requests_are_logged() {
        let mock = MockBackend::new();
        mock.invoke("m", &ModelRequest::text("remember me"))
            .await
            .unwrap();
        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].1.prompt, "remember me");
    }

    #[test]
    fn test_guess_amount() {
        assert_eq!(guess_amount("Cafe sáng 25k"), Some(25_000));
        assert_eq!(guess_amount("Lương 15tr"), Some(15_000_000));
        assert_eq!(guess_amount("Tiền điện 450.000"), Some(450_000));
        assert_eq!(guess_amount("hello"), None);
    }

    #[tokio::test]
    async fn test_heuristic_tool_call() {
        let mock = MockBackend::new();
        let tool = ToolSchema::new("record_transaction", "", serde_json::json!({}));
        let request = ModelRequest::text("Classify.\nInput: Cafe sáng 25k").with_tool(tool);

        let reply = mock.invoke("any", &request).await.unwrap();
        let call = reply.call.unwrap();
        assert_eq!(call.name, "record_transaction");
        assert_eq!(call.args["category"], "Food");
        assert_eq!(call.args["amount"], 25_000);
        assert_eq!(call.args["type"], "Expense");
    }

    #[tokio::test]
    async fn test_heuristic_delimited_line() {
        let mock = MockBackend::new();
        let request = ModelRequest::text("Reply as category|amount|note\nInput: Lương tháng 10tr");
        let reply = mock.invoke("any", &request).await.unwrap();
        assert_eq!(reply.text.as_deref(), Some("Lương|10000000|Lương tháng 10tr"));
    }
}
