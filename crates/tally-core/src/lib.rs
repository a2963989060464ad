//! Tally Core Library
//!
//! Shared functionality for the Tally bookkeeping and exam-practice tool:
//! - Pluggable model backends (hosted Gemini, OpenAI-compatible servers, mock)
//! - Sequential fallback across candidate models
//! - Candidate model configuration
//! - Prompt library for customizable prompts
//! - Free-text to transaction extraction (delimited text or structured call)
//! - Append-only ledger with CSV persistence and aggregates
//! - Essay grading and oral exam sessions

pub mod ai;
pub mod context;
pub mod error;
pub mod exam;
pub mod extract;
pub mod ledger;
pub mod model_router;
pub mod models;
pub mod prompts;

/// Test utilities including a mock Generative Language API server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    AIClient, Answer, BackendInfo, FallbackInvoker, GeminiBackend, MockBackend, ModelInvoker,
    ModelReply, ModelRequest, ModelRoute, OpenAICompatibleBackend, PinnedModel, StructuredCall,
    ToolSchema,
};
pub use context::{ConversationContext, ReferenceDocument};
pub use error::{
    Error, ExtractionError, ExtractionErrorKind, InvocationError, InvocationErrorKind, Result,
};
pub use exam::{ExamReply, ExamSession};
pub use extract::{
    DelimitedStrategy, Extracted, ExtractionStrategy, SchemaCallStrategy, StrategyKind,
};
pub use ledger::{Ledger, Totals};
pub use model_router::{CandidateConfig, TaskType};
pub use models::{Category, ChatRole, ChatTurn, NewTransaction, TransactionKind, TransactionRecord};
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary};
