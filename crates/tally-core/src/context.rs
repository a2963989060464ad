//! Prompt context for exam sessions
//!
//! A `ReferenceDocument` is study material supplied once per session and
//! prepended verbatim into prompts. A `ConversationContext` holds the ordered
//! transcript of an oral exam plus the optional reference document.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::{ChatRole, ChatTurn};

/// Raw study material (UTF-8 text, no size limit)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDocument {
    pub text: String,
    /// Where it was loaded from, if a file
    pub source: Option<PathBuf>,
}

impl ReferenceDocument {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
        }
    }

    /// Load a UTF-8 text file
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let text = String::from_utf8(bytes).map_err(|_| {
            Error::InvalidData(format!("{} is not valid UTF-8 text", path.display()))
        })?;
        Ok(Self {
            text,
            source: Some(path.to_path_buf()),
        })
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Display name (file name, or "inline text")
    pub fn name(&self) -> String {
        self.source
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "inline text".to_string())
    }
}

/// Ordered transcript plus optional reference material
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    turns: Vec<ChatTurn>,
    reference: Option<ReferenceDocument>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reference(reference: ReferenceDocument) -> Self {
        Self {
            turns: Vec::new(),
            reference: Some(reference),
        }
    }

    pub fn set_reference(&mut self, reference: Option<ReferenceDocument>) {
        self.reference = reference;
    }

    pub fn reference(&self) -> Option<&ReferenceDocument> {
        self.reference.as_ref()
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Record one completed exchange
    pub fn push_exchange(&mut self, student: impl Into<String>, examiner: impl Into<String>) {
        self.turns.push(ChatTurn::student(student));
        self.turns.push(ChatTurn::examiner(examiner));
    }

    /// Drop the transcript; the reference document is kept
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Transcript as `Student: ...` / `Examiner: ...` lines
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|turn| {
                let speaker = match turn.role {
                    ChatRole::Student => "Student",
                    ChatRole::Examiner => "Examiner",
                };
                format!("{}: {}", speaker, turn.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Template variables: `reference` (if non-blank) and `transcript` (if any)
    pub fn to_template_vars(&self) -> HashMap<&'static str, String> {
        let mut vars = HashMap::new();
        if let Some(reference) = self.reference.as_ref().filter(|r| !r.is_blank()) {
            vars.insert("reference", reference.text.clone());
        }
        if !self.turns.is_empty() {
            vars.insert("transcript", self.transcript());
        }
        vars
    }
}
