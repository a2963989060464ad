//! Error types for Tally

use std::fmt;

use thiserror::Error;

/// Why a single model invocation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationErrorKind {
    /// Credential rejected by the provider
    Authentication,
    /// Model identifier unknown or unavailable
    ModelNotFound,
    /// Quota exhausted or rate limit hit
    RateLimited,
    /// Body could not be decoded, or carried neither text nor a structured call
    MalformedResponse,
    /// Connection failure or timeout
    Transport,
    /// Any other non-success status from the provider
    Upstream,
}

impl InvocationErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::ModelNotFound => "model_not_found",
            Self::RateLimited => "rate_limited",
            Self::MalformedResponse => "malformed_response",
            Self::Transport => "transport",
            Self::Upstream => "upstream",
        }
    }

    /// Map an HTTP status from a model provider to an error kind
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            404 => Self::ModelNotFound,
            429 => Self::RateLimited,
            _ => Self::Upstream,
        }
    }
}

impl fmt::Display for InvocationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A failed call to one model, carrying the provider's message
#[derive(Debug, Clone, Error)]
#[error("model '{model}' failed ({kind}): {message}")]
pub struct InvocationError {
    pub model: String,
    pub kind: InvocationErrorKind,
    pub message: String,
}

impl InvocationError {
    pub fn new(model: impl Into<String>, kind: InvocationErrorKind, message: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            kind,
            message: message.into(),
        }
    }

    /// Classify a reqwest error raised while sending or reading a request
    pub fn from_reqwest(model: &str, err: &reqwest::Error) -> Self {
        let kind = if err.is_decode() {
            InvocationErrorKind::MalformedResponse
        } else if let Some(status) = err.status() {
            InvocationErrorKind::from_status(status.as_u16())
        } else {
            InvocationErrorKind::Transport
        };
        Self::new(model, kind, err.to_string())
    }
}

/// Why free text could not be turned into a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionErrorKind {
    /// Reply did not have the expected shape (delimiter count, schema fields)
    FormatMismatch,
    /// Amount field was present but not a non-negative integer
    AmountNotNumeric,
    /// Model answered with commentary instead of classifying the input
    NotATransaction,
}

impl ExtractionErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FormatMismatch => "format_mismatch",
            Self::AmountNotNumeric => "amount_not_numeric",
            Self::NotATransaction => "not_a_transaction",
        }
    }
}

impl fmt::Display for ExtractionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("extraction failed ({kind}): {detail}")]
pub struct ExtractionError {
    pub kind: ExtractionErrorKind,
    pub detail: String,
}

impl ExtractionError {
    pub fn format_mismatch(detail: impl Into<String>) -> Self {
        Self {
            kind: ExtractionErrorKind::FormatMismatch,
            detail: detail.into(),
        }
    }

    pub fn amount_not_numeric(detail: impl Into<String>) -> Self {
        Self {
            kind: ExtractionErrorKind::AmountNotNumeric,
            detail: detail.into(),
        }
    }

    pub fn not_a_transaction(detail: impl Into<String>) -> Self {
        Self {
            kind: ExtractionErrorKind::NotATransaction,
            detail: detail.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing credential: {0}")]
    CredentialMissing(String),

    #[error(transparent)]
    Invocation(#[from] InvocationError),

    #[error("All {} candidate models failed; last error: {}", attempts.len(), last_message(attempts))]
    AllCandidatesFailed { attempts: Vec<InvocationError> },

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Config error: {0}")]
    Config(String),
}

fn last_message(attempts: &[InvocationError]) -> String {
    attempts
        .last()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no candidates attempted".to_string())
}

impl Error {
    /// The extraction failure kind, if this is an extraction error
    pub fn extraction_kind(&self) -> Option<ExtractionErrorKind> {
        match self {
            Self::Extraction(e) => Some(e.kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            InvocationErrorKind::from_status(401),
            InvocationErrorKind::Authentication
        );
        assert_eq!(
            InvocationErrorKind::from_status(403),
            InvocationErrorKind::Authentication
        );
        assert_eq!(
            InvocationErrorKind::from_status(404),
            InvocationErrorKind::ModelNotFound
        );
        assert_eq!(
            InvocationErrorKind::from_status(429),
            InvocationErrorKind::RateLimited
        );
        assert_eq!(
            InvocationErrorKind::from_status(500),
            InvocationErrorKind::Upstream
        );
    }

    #[test]
    fn test_all_candidates_failed_mentions_last_error() {
        let err = Error::AllCandidatesFailed {
            attempts: vec![
                InvocationError::new("a", InvocationErrorKind::ModelNotFound, "no such model"),
                InvocationError::new("b", InvocationErrorKind::RateLimited, "quota exceeded"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 candidate models"));
        assert!(msg.contains("quota exceeded"));
        assert!(msg.contains("'b'"));
    }

    #[test]
    fn test_extraction_kind() {
        let err: Error = ExtractionError::format_mismatch("no delimiter").into();
        assert_eq!(
            err.extraction_kind(),
            Some(ExtractionErrorKind::FormatMismatch)
        );
        assert!(Error::InvalidData("x".into()).extraction_kind().is_none());
    }
}
