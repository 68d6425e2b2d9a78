//! Application configuration loaded from YAML.
//!
//! ```yaml
//! job_search:
//!   keywords: ["Data Analyst"]
//!   locations: ["Dubai"]
//! resume:
//!   file: resume.pdf
//! llm:
//!   model: mistral
//! ```
//!
//! Every other key has a default. `OLLAMA_HOST`, when set, replaces
//! `llm.host`.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default per-pair search limit.
pub const DEFAULT_MAX_JOBS_PER_SEARCH: usize = 10;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

/// Environment variable overriding the language model host.
pub const OLLAMA_HOST_ENV: &str = "OLLAMA_HOST";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Job board search settings.
    pub job_search: JobSearchConfig,
    /// Resume location.
    pub resume: ResumeConfig,
    /// Language model settings.
    pub llm: LlmConfig,
    /// Where outputs are written.
    #[serde(default)]
    pub output: OutputConfig,
    /// Engine settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Loads, overrides from the environment and validates a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parses a YAML document without touching the environment.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Applies `OLLAMA_HOST` if set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var(OLLAMA_HOST_ENV) {
            if !host.trim().is_empty() {
                self.llm.host = host;
            }
        }
    }

    /// Checks values the pipeline cannot run without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.job_search.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "job_search.keywords must not be empty".into(),
            ));
        }
        if self.job_search.locations.iter().all(|l| l.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "job_search.locations must not be empty".into(),
            ));
        }
        if self.job_search.max_jobs_per_search == 0 {
            return Err(ConfigError::Invalid(
                "job_search.max_jobs_per_search must be at least 1".into(),
            ));
        }
        if self.job_search.concurrency == 0 || self.llm.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        if self.llm.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "llm.max_attempts must be at least 1".into(),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Invalid("llm.model must not be empty".into()));
        }
        if self.resume.file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("resume.file must not be empty".into()));
        }
        Ok(())
    }

    /// Path of the rendered document.
    #[must_use]
    pub fn pdf_path(&self) -> PathBuf {
        self.output.workspace.join(&self.output.pdf_file)
    }
}

/// Job board search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSearchConfig {
    /// Search keywords.
    pub keywords: Vec<String>,
    /// Search locations.
    pub locations: Vec<String>,
    /// Maximum postings per (keyword, location) pair.
    #[serde(default = "default_max_jobs")]
    pub max_jobs_per_search: usize,
    /// Pairs searched at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-pair timeout in seconds.
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl JobSearchConfig {
    /// Per-pair timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Resume location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeConfig {
    /// Path to a PDF or DOCX resume.
    pub file: PathBuf,
}

/// Language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name.
    pub model: String,
    /// Ollama base URL.
    #[serde(default = "default_host")]
    pub host: String,
    /// Per-call timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    /// Letters generated at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Attempts per call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

impl LlmConfig {
    /// Per-call timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where outputs are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory holding checkpoints and the rendered document.
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,
    /// File name of the rendered document.
    #[serde(default = "default_pdf_file")]
    pub pdf_file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            pdf_file: default_pdf_file(),
        }
    }
}

/// Engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pre-populate state from non-empty checkpoints.
    #[serde(default = "default_resume")]
    pub resume_from_checkpoints: bool,
    /// Optional deadline for each stage, in seconds.
    #[serde(default)]
    pub stage_timeout_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            resume_from_checkpoints: default_resume(),
            stage_timeout_secs: None,
        }
    }
}

impl PipelineConfig {
    /// Per-stage deadline, if configured.
    #[must_use]
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_secs.map(Duration::from_secs)
    }
}

const fn default_max_jobs() -> usize {
    DEFAULT_MAX_JOBS_PER_SEARCH
}

const fn default_concurrency() -> usize {
    1
}

const fn default_search_timeout() -> u64 {
    120
}

const fn default_llm_timeout() -> u64 {
    300
}

const fn default_max_attempts() -> usize {
    2
}

fn default_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".")
}

fn default_pdf_file() -> PathBuf {
    PathBuf::from("final_applications.pdf")
}

const fn default_resume() -> bool {
    true
}
