//! Candidate model configuration
//!
//! Decides which models a task may use, in order. The list is handed to a
//! `FallbackInvoker`, which walks it until one model answers.
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a layered resolution:
//! 1. Check for override in data dir (~/.local/share/tally/config/models.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//! 3. `TALLY_MODELS` (comma-separated) replaces every candidate list when set

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/models.toml");

/// Environment variable that replaces the configured candidates
pub const MODELS_ENV: &str = "TALLY_MODELS";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Task types with their own candidate list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    /// Free text to transaction record
    Extraction,
    /// Essay grading and oral exam turns
    Exam,
}

impl TaskType {
    /// Get the config key for this task type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extraction => "extraction",
            Self::Exam => "exam",
        }
    }

    pub fn all() -> &'static [TaskType] {
        &[Self::Extraction, Self::Exam]
    }

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "extraction" => Some(Self::Extraction),
            "exam" => Some(Self::Exam),
            _ => None,
        }
    }
}

/// Candidates and timeout for one task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskConfig {
    pub candidates: Vec<String>,
    pub timeout: Duration,
}

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    Embedded,
    File(PathBuf),
}

/// Resolved candidate configuration
#[derive(Debug, Clone)]
pub struct CandidateConfig {
    /// Candidates for tasks without their own list
    pub default_candidates: Vec<String>,
    /// Request timeout for tasks without their own value
    pub default_timeout: Duration,
    pub tasks: HashMap<TaskType, TaskConfig>,
    pub source: ConfigSource,
    /// Set when `TALLY_MODELS` replaced the configured lists
    pub env_override: Option<Vec<String>>,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        parse_config(DEFAULT_CONFIG, ConfigSource::Embedded).unwrap_or_else(|_| Self {
            default_candidates: vec!["gemini-1.5-flash".to_string()],
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            tasks: HashMap::new(),
            source: ConfigSource::Embedded,
            env_override: None,
        })
    }
}

impl CandidateConfig {
    /// Load override file or embedded defaults, then apply `TALLY_MODELS`
    pub fn load() -> Result<Self> {
        let mut config = match default_config_path() {
            Some(path) if path.exists() => Self::from_path(&path)?,
            _ => parse_config(DEFAULT_CONFIG, ConfigSource::Embedded)?,
        };

        if let Ok(value) = std::env::var(MODELS_ENV) {
            config.apply_env_override(&value);
        }

        Ok(config)
    }

    /// Load from an explicit file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        parse_config(&content, ConfigSource::File(path.to_path_buf()))
    }

    /// Parse TOML content (for tests and embedded use)
    pub fn from_toml(content: &str) -> Result<Self> {
        parse_config(content, ConfigSource::Embedded)
    }

    /// Replace every candidate list with a comma-separated override
    ///
    /// Blank input is ignored.
    pub fn apply_env_override(&mut self, value: &str) {
        let models = parse_model_list(value);
        if models.is_empty() {
            return;
        }
        debug!(models = ?models, "Candidate list overridden from environment");
        self.env_override = Some(models);
    }

    /// Candidates for a task, in order
    pub fn candidates_for(&self, task: TaskType) -> Vec<String> {
        if let Some(models) = &self.env_override {
            return models.clone();
        }
        self.tasks
            .get(&task)
            .map(|t| t.candidates.clone())
            .unwrap_or_else(|| self.default_candidates.clone())
    }

    /// Request timeout for a task
    pub fn timeout_for(&self, task: TaskType) -> Duration {
        self.tasks
            .get(&task)
            .map(|t| t.timeout)
            .unwrap_or(self.default_timeout)
    }

    /// Longest timeout across all tasks (a backend is shared between tasks)
    pub fn max_timeout(&self) -> Duration {
        TaskType::all()
            .iter()
            .map(|t| self.timeout_for(*t))
            .max()
            .unwrap_or(self.default_timeout)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("config").join("models.toml"))
}

/// Split a comma-separated model list, dropping blanks and duplicates
pub fn parse_model_list(value: &str) -> Vec<String> {
    let mut models: Vec<String> = Vec::new();
    for name in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !models.iter().any(|m| m == name) {
            models.push(name.to_string());
        }
    }
    models
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    defaults: Option<RawDefaults>,
    tasks: Option<HashMap<String, RawTaskConfig>>,
}

#[derive(Debug, Deserialize)]
struct RawDefaults {
    candidates: Option<Vec<String>>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawTaskConfig {
    candidates: Option<Vec<String>>,
    timeout_secs: Option<u64>,
}

/// Parse config from TOML content
fn parse_config(content: &str, source: ConfigSource) -> Result<CandidateConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let defaults = raw.defaults.unwrap_or(RawDefaults {
        candidates: None,
        timeout_secs: None,
    });
    let default_candidates = defaults.candidates.unwrap_or_default();
    if default_candidates.is_empty() {
        return Err(Error::Config(
            "[defaults] candidates must name at least one model".to_string(),
        ));
    }
    let default_timeout = Duration::from_secs(defaults.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));

    let mut tasks = HashMap::new();
    for (name, task_config) in raw.tasks.unwrap_or_default() {
        let Some(task) = TaskType::from_key(&name) else {
            debug!(task = %name, "Skipping unknown task in model config");
            continue;
        };
        let candidates = task_config
            .candidates
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| default_candidates.clone());
        tasks.insert(
            task,
            TaskConfig {
                candidates,
                timeout: task_config
                    .timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(default_timeout),
            },
        );
    }

    Ok(CandidateConfig {
        default_candidates,
        default_timeout,
        tasks,
        source,
        env_override: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_config() {
        let config = CandidateConfig::from_toml(DEFAULT_CONFIG).unwrap();
        assert!(!config.default_candidates.is_empty());
        assert!(config.default_candidates[0].starts_with("gemini"));
        assert_eq!(config.source, ConfigSource::Embedded);
    }

    #[test]
    fn test_task_type_as_str() {
        assert_eq!(TaskType::Extraction.as_str(), "extraction");
        assert_eq!(TaskType::Exam.as_str(), "exam");
    }

    #[test]
    fn test_task_specific_candidates() {
        let config = CandidateConfig::from_toml(
            r#"
            [defaults]
            candidates = ["a", "b"]
            timeout_secs = 10

            [tasks.exam]
            candidates = ["big"]
            timeout_secs = 90

            [tasks.unknown]
            candidates = ["ignored"]
            "#,
        )
        .unwrap();

        assert_eq!(config.candidates_for(TaskType::Extraction), vec!["a", "b"]);
        assert_eq!(config.candidates_for(TaskType::Exam), vec!["big"]);
        assert_eq!(config.timeout_for(TaskType::Extraction), Duration::from_secs(10));
        assert_eq!(config.timeout_for(TaskType::Exam), Duration::from_secs(90));
        assert_eq!(config.max_timeout(), Duration::from_secs(90));
    }

    #[test]
    fn test_task_without_candidates_inherits_defaults() {
        let config = CandidateConfig::from_toml(
            r#"
            [defaults]
            candidates = ["a"]

            [tasks.extraction]
            timeout_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.candidates_for(TaskType::Extraction), vec!["a"]);
        assert_eq!(config.timeout_for(TaskType::Extraction), Duration::from_secs(5));
        assert_eq!(
            config.timeout_for(TaskType::Exam),
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_empty_defaults_rejected() {
        let err = CandidateConfig::from_toml("[defaults]\ncandidates = []\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(CandidateConfig::from_toml("not = [valid").is_err());
    }

    #[test]
    fn test_env_override_replaces_every_task() {
        let mut config = CandidateConfig::from_toml(DEFAULT_CONFIG).unwrap();
        config.apply_env_override(" x , y,,x ");
        assert_eq!(config.candidates_for(TaskType::Extraction), vec!["x", "y"]);
        assert_eq!(config.candidates_for(TaskType::Exam), vec!["x", "y"]);

        let mut untouched = CandidateConfig::from_toml(DEFAULT_CONFIG).unwrap();
        untouched.apply_env_override("  ,  ");
        assert!(untouched.env_override.is_none());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.toml");
        fs::write(&path, "[defaults]\ncandidates = [\"local-model\"]\n").unwrap();

        let config = CandidateConfig::from_path(&path).unwrap();
        assert_eq!(config.default_candidates, vec!["local-model"]);
        assert_eq!(config.source, ConfigSource::File(path));

        let missing = CandidateConfig::from_path(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(Error::Config(_))));
    }

    #[test]
    fn test_parse_model_list() {
        assert_eq!(parse_model_list("a,b , c"), vec!["a", "b", "c"]);
        assert!(parse_model_list("").is_empty());
    }
}
