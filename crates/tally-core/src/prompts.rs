//! Prompt Library
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/tally/prompts/overrides/)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Each prompt is markdown with YAML frontmatter and two sections:
//! `# System` (sent as the system instruction) and `# User` (the prompt
//! itself). `{{var}}` placeholders and `{{#if var}}...{{/if}}` blocks are
//! filled at render time.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::ai::ModelRequest;
use crate::error::{Error, Result};

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const EXTRACT_DELIMITED: &str = include_str!("../../../prompts/extract_delimited.md");
    pub const EXTRACT_SCHEMA_CALL: &str =
        include_str!("../../../prompts/extract_schema_call.md");
    pub const GRADE_ESSAY: &str = include_str!("../../../prompts/grade_essay.md");
    pub const ORAL_EXAMINER: &str = include_str!("../../../prompts/oral_examiner.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// One `category|amount|note` line
    ExtractDelimited,
    /// `record_transaction` function call
    ExtractSchemaCall,
    GradeEssay,
    OralExaminer,
}

impl PromptId {
    /// Get the string identifier for this prompt
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtractDelimited => "extract_delimited",
            Self::ExtractSchemaCall => "extract_schema_call",
            Self::GradeEssay => "grade_essay",
            Self::OralExaminer => "oral_examiner",
        }
    }

    /// Get all known prompt IDs
    pub fn all() -> &'static [PromptId] {
        &[
            Self::ExtractDelimited,
            Self::ExtractSchemaCall,
            Self::GradeEssay,
            Self::OralExaminer,
        ]
    }

    /// Look up a prompt by its string identifier
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|id| id.as_str() == s)
    }

    /// Get the default embedded content for this prompt
    fn default_content(&self) -> &'static str {
        match self {
            Self::ExtractDelimited => defaults::EXTRACT_DELIMITED,
            Self::ExtractSchemaCall => defaults::EXTRACT_SCHEMA_CALL,
            Self::GradeEssay => defaults::GRADE_ESSAY,
            Self::OralExaminer => defaults::ORAL_EXAMINER,
        }
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    /// Unique identifier
    pub id: String,
    /// Version number for tracking changes
    pub version: u32,
    /// Task type for candidate selection (extraction, exam)
    pub task_type: String,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Metadata from frontmatter
    pub metadata: PromptMetadata,
    /// The prompt content (system + user sections)
    pub content: String,
    /// Whether this came from an override file
    pub is_override: bool,
    /// Path to override file (if any)
    pub override_path: Option<PathBuf>,
}

impl Prompt {
    /// Get the system section of the prompt
    pub fn system_section(&self) -> Option<&str> {
        extract_section(&self.content, "# System")
    }

    /// Get the user section of the prompt
    pub fn user_section(&self) -> Option<&str> {
        extract_section(&self.content, "# User")
    }

    /// Render the whole prompt with template variables replaced
    pub fn render(&self, vars: &HashMap<&str, &str>) -> String {
        render_template(&self.content, vars)
    }

    /// Render just the user section with variables
    pub fn render_user(&self, vars: &HashMap<&str, &str>) -> String {
        match self.user_section() {
            Some(user) => render_template(user, vars),
            None => self.render(vars),
        }
    }

    /// Build a model request: rendered user section plus the system section
    pub fn to_request(&self, vars: &HashMap<&str, &str>) -> ModelRequest {
        let request = ModelRequest::text(self.render_user(vars));
        match self.system_section() {
            Some(system) if !system.is_empty() => request.with_system(render_template(system, vars)),
            _ => request,
        }
    }
}

/// Prompt library for loading and caching prompts
pub struct PromptLibrary {
    /// Override directory path
    override_dir: Option<PathBuf>,
    /// Cached parsed prompts
    cache: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    /// Create a new prompt library with default paths
    pub fn new() -> Self {
        Self {
            override_dir: default_prompts_dir(),
            cache: HashMap::new(),
        }
    }

    /// Create a prompt library with a custom override directory
    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
            cache: HashMap::new(),
        }
    }

    /// Create a prompt library with no override directory (embedded only)
    pub fn embedded_only() -> Self {
        Self {
            override_dir: None,
            cache: HashMap::new(),
        }
    }

    /// Get a prompt by ID, loading from override or default
    pub fn get(&mut self, id: PromptId) -> Result<&Prompt> {
        if !self.cache.contains_key(&id) {
            let prompt = self.load(id)?;
            self.cache.insert(id, prompt);
        }
        self.cache
            .get(&id)
            .ok_or_else(|| Error::InvalidData(format!("Prompt {} not cached", id.as_str())))
    }

    /// Load a prompt (checking override first, then default)
    fn load(&self, id: PromptId) -> Result<Prompt> {
        if let Some(override_path) = self.override_path(id) {
            if override_path.exists() {
                let content = fs::read_to_string(&override_path).map_err(|e| {
                    Error::InvalidData(format!("Failed to read prompt override: {}", e))
                })?;
                let (metadata, body) = parse_prompt(&content)?;
                tracing::debug!(prompt = id.as_str(), path = %override_path.display(), "Using prompt override");
                return Ok(Prompt {
                    metadata,
                    content: body,
                    is_override: true,
                    override_path: Some(override_path),
                });
            }
        }

        let (metadata, body) = parse_prompt(id.default_content())?;
        Ok(Prompt {
            metadata,
            content: body,
            is_override: false,
            override_path: None,
        })
    }

    /// List all prompts with their override status
    pub fn list(&mut self) -> Vec<PromptInfo> {
        PromptId::all()
            .iter()
            .map(|&id| {
                let has_override = self.has_override(id);
                let override_path = if has_override {
                    self.override_path(id)
                } else {
                    None
                };
                let prompt = self.get(id).ok();
                PromptInfo {
                    id: id.as_str().to_string(),
                    version: prompt.map(|p| p.metadata.version).unwrap_or(0),
                    task_type: prompt
                        .map(|p| p.metadata.task_type.clone())
                        .unwrap_or_default(),
                    has_override,
                    override_path,
                }
            })
            .collect()
    }

    /// Check if a prompt has an override file
    pub fn has_override(&self, id: PromptId) -> bool {
        self.override_path(id).is_some_and(|p| p.exists())
    }

    /// Where an override for `id` would live
    pub fn override_path(&self, id: PromptId) -> Option<PathBuf> {
        self.override_dir
            .as_ref()
            .map(|d| d.join(format!("{}.md", id.as_str())))
    }

    /// Get the override directory path
    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }

    /// Clear the cache (useful after editing override files)
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Information about a prompt for listing
#[derive(Debug, Clone)]
pub struct PromptInfo {
    /// Prompt identifier
    pub id: String,
    /// Version from metadata
    pub version: u32,
    /// Task type for candidate selection
    pub task_type: String,
    /// Whether an override exists
    pub has_override: bool,
    /// Path to override file (if exists)
    pub override_path: Option<PathBuf>,
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("prompts").join("overrides"))
}

/// Parse a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    let Some(rest) = content.strip_prefix("---") else {
        return Err(Error::InvalidData(
            "Prompt must start with YAML frontmatter (---)".into(),
        ));
    };

    let end = rest.find("---").ok_or_else(|| {
        Error::InvalidData("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = rest[..end].trim();
    let body = rest[end + 3..].trim();

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)
        .map_err(|e| Error::InvalidData(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, body.to_string()))
}

/// Extract a section from the prompt content
fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after_header = &content[start + header.len()..];

    // Runs to the next top-level header or end of content
    let end = after_header.find("\n# ").unwrap_or(after_header.len());

    Some(after_header[..end].trim())
}

/// Resolve conditionals, then substitute variables
///
/// Conditionals go first so that user-supplied values are never parsed as
/// template syntax.
fn render_template(template: &str, vars: &HashMap<&str, &str>) -> String {
    let resolved = resolve_conditionals(template, vars);
    substitute_vars(&resolved, vars)
}

/// Single pass `{{name}}` replacement; unknown names are left as-is
fn substitute_vars(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find("}}") {
            Some(close) => {
                let name = after[..close].trim();
                match vars.get(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[open..open + 2 + close + 2]),
                }
                rest = &after[close + 2..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Keep `{{#if var}}` blocks whose variable is present and non-empty
fn resolve_conditionals(content: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = content.to_string();

    while let Some(if_start) = result.find("{{#if ") {
        let var_start = if_start + 6;
        let Some(var_end) = result[var_start..].find("}}") else {
            break;
        };
        let var_name = result[var_start..var_start + var_end].trim().to_string();
        let block_start = var_start + var_end + 2;

        let Some(endif_pos) = result[block_start..].find("{{/if}}") else {
            break;
        };
        let full_end = block_start + endif_pos + 7;

        let should_include = vars.get(var_name.as_str()).is_some_and(|v| !v.is_empty());
        result = if should_include {
            format!(
                "{}{}{}",
                &result[..if_start],
                &result[block_start..block_start + endif_pos],
                &result[full_end..]
            )
        } else {
            format!("{}{}", &result[..if_start], &result[full_end..])
        };
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prompt() {
        let content = r#"---
id: test_prompt
version: 1
task_type: extraction
---

# System
Test system prompt.

# User
Test user prompt with {{variable}}.
"#;

        let (metadata, body) = parse_prompt(content).unwrap();
        assert_eq!(metadata.id, "test_prompt");
        assert_eq!(metadata.version, 1);
        assert_eq!(metadata.task_type, "extraction");
        assert!(body.contains("# System"));
        assert!(body.contains("# User"));
    }

    #[test]
    fn test_parse_prompt_requires_frontmatter() {
        assert!(parse_prompt("# User\nhello").is_err());
        assert!(parse_prompt("---\nid: x\n").is_err());
    }

    #[test]
    fn test_extract_section() {
        let content = "# System\nSystem content here.\n\n# User\nUser content here.";

        assert_eq!(
            extract_section(content, "# System"),
            Some("System content here.")
        );
        assert_eq!(
            extract_section(content, "# User"),
            Some("User content here.")
        );
    }

    #[test]
    fn test_substitution_and_conditionals() {
        let template = "Start{{#if category}}\nCategory: {{category}}{{/if}}\nEnd {{unknown}}";

        let mut vars = HashMap::new();
        vars.insert("category", "Food");
        let result = render_template(template, &vars);
        assert!(result.contains("Category: Food"));
        assert!(result.contains("End {{unknown}}"));

        let empty_vars: HashMap<&str, &str> = HashMap::new();
        let result = render_template(template, &empty_vars);
        assert!(!result.contains("Category:"));
        assert!(result.contains("Start"));
    }

    #[test]
    fn test_values_are_not_reinterpreted() {
        let mut vars = HashMap::new();
        vars.insert("text", "{{#if x}}boom{{/if}} {{other}}");
        vars.insert("other", "leak");
        let rendered = render_template("Input: {{text}}", &vars);
        assert_eq!(rendered, "Input: {{#if x}}boom{{/if}} {{other}}");
    }

    #[test]
    fn test_prompt_library_embedded() {
        let mut lib = PromptLibrary::embedded_only();

        for id in PromptId::all() {
            let prompt = lib.get(*id).unwrap();
            assert!(!prompt.is_override);
            assert!(prompt.system_section().is_some());
            assert!(prompt.user_section().is_some());
        }
    }

    #[test]
    fn test_default_prompts_parse() {
        for id in PromptId::all() {
            let result = parse_prompt(id.default_content());
            assert!(
                result.is_ok(),
                "Failed to parse {}: {:?}",
                id.as_str(),
                result.err()
            );

            let (metadata, _) = result.unwrap();
            assert_eq!(metadata.id, id.as_str(), "Prompt ID mismatch");
        }
    }

    #[test]
    fn test_extraction_prompts_end_with_input_line() {
        let mut lib = PromptLibrary::embedded_only();
        let mut vars = HashMap::new();
        vars.insert("text", "Ăn phở 40k");

        for id in [PromptId::ExtractDelimited, PromptId::ExtractSchemaCall] {
            let request = lib.get(id).unwrap().to_request(&vars);
            let last = request.prompt.lines().last().unwrap();
            assert_eq!(last, "Input: Ăn phở 40k");
            assert!(request.system.is_some());
        }

        let delimited = lib.get(PromptId::ExtractDelimited).unwrap();
        assert!(delimited.content.contains("category|amount|note"));
        assert!(delimited.content.contains("Ăn uống|40000|Ăn phở"));
    }

    #[test]
    fn test_reference_block_is_optional() {
        let mut lib = PromptLibrary::embedded_only();
        let prompt = lib.get(PromptId::GradeEssay).unwrap();

        let mut vars = HashMap::new();
        vars.insert("question", "Q");
        vars.insert("answer", "A");
        assert!(!prompt.render_user(&vars).contains("REFERENCE MATERIAL"));

        vars.insert("reference", "Điện Biên Phủ 1954");
        let rendered = prompt.render_user(&vars);
        assert!(rendered.contains("REFERENCE MATERIAL"));
        assert!(rendered.contains("Điện Biên Phủ 1954"));
    }

    #[test]
    fn test_override_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("grade_essay.md"),
            "---\nid: grade_essay\nversion: 9\ntask_type: exam\n---\n\n# User\nCustom {{question}}",
        )
        .unwrap();

        let mut lib = PromptLibrary::with_override_dir(dir.path().to_path_buf());
        assert!(lib.has_override(PromptId::GradeEssay));
        assert!(!lib.has_override(PromptId::OralExaminer));

        let prompt = lib.get(PromptId::GradeEssay).unwrap();
        assert!(prompt.is_override);
        assert_eq!(prompt.metadata.version, 9);

        let infos = lib.list();
        assert_eq!(infos.len(), PromptId::all().len());
        let grade = infos.iter().find(|i| i.id == "grade_essay").unwrap();
        assert!(grade.has_override);
        assert!(grade.override_path.is_some());
    }

    #[test]
    fn test_prompt_id_parse() {
        assert_eq!(PromptId::parse("oral_examiner"), Some(PromptId::OralExaminer));
        assert_eq!(PromptId::parse("nope"), None);
    }
}
