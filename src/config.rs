//! Run configuration.
//!
//! Defaults come from the environment (`.env` is honoured), a control surface may
//! then layer per-run overrides on top.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::RunError;

pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-lite-001";
pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Clone)]
pub struct RunConfig {
    /// In-flight batch calls per file.
    pub max_concurrency: usize,
    /// Character budget per batch.
    pub max_batch_char_limit: usize,
    /// Base backoff between attempts.
    pub retry_delay_ms: u64,
    /// Run-wide failed-attempt threshold.
    pub max_errors: usize,
    /// Backend credentials, used round-robin.
    pub keys: Vec<String>,
    pub active_model: String,
    pub endpoint: String,

    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub source_language: String,

    /// Score every new translation after merging.
    pub validate: bool,
    /// Domain description placed in front of every prompt.
    pub prompt_context: Option<String>,
    pub glossary_path: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            max_batch_char_limit: 12_000,
            retry_delay_ms: 2_000,
            max_errors: 10,
            keys: Vec::new(),
            active_model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            source_language: "en".to_string(),
            validate: false,
            prompt_context: None,
            glossary_path: None,
        }
    }
}

// Keys stay out of logs.
impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("max_concurrency", &self.max_concurrency)
            .field("max_batch_char_limit", &self.max_batch_char_limit)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("max_errors", &self.max_errors)
            .field("keys", &format_args!("[{} redacted]", self.keys.len()))
            .field("active_model", &self.active_model)
            .field("endpoint", &self.endpoint)
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .field("source_language", &self.source_language)
            .field("validate", &self.validate)
            .finish()
    }
}

impl RunConfig {
    /// Load defaults from the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut cfg = Self::default();

        if let Some(v) = env_parse("MAX_CONCURRENCY") {
            cfg.max_concurrency = v;
        }
        if let Some(v) = env_parse("MAX_BATCH_CHAR_LIMIT") {
            cfg.max_batch_char_limit = v;
        }
        if let Some(v) = env_parse("RETRY_DELAY") {
            cfg.retry_delay_ms = v;
        }
        if let Some(v) = env_parse("MAX_ERRORS") {
            cfg.max_errors = v;
        }
        if let Ok(v) = env::var("KEYS") {
            cfg.keys = split_keys(&v);
        }
        if let Ok(v) = env::var("ACTIVE_MODEL") {
            cfg.active_model = v;
        }
        if let Ok(v) = env::var("API_ENDPOINT") {
            cfg.endpoint = v;
        }
        if let Ok(v) = env::var("INPUT_DIR") {
            cfg.input_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("OUTPUT_DIR") {
            cfg.output_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("SOURCE_LANGUAGE") {
            cfg.source_language = v;
        }
        cfg.prompt_context = env::var("PROMPT_CONTEXT").ok().filter(|s| !s.trim().is_empty());
        cfg.glossary_path = env::var("GLOSSARY_PATH").ok().map(PathBuf::from);

        cfg
    }

    pub fn apply(&mut self, o: RunConfigOverrides) {
        if let Some(v) = o.max_concurrency {
            self.max_concurrency = v;
        }
        if let Some(v) = o.max_batch_char_limit {
            self.max_batch_char_limit = v;
        }
        if let Some(v) = o.retry_delay_ms {
            self.retry_delay_ms = v;
        }
        if let Some(v) = o.max_errors {
            self.max_errors = v;
        }
        if let Some(keys) = o.keys {
            self.keys = keys.into_vec();
        }
        if let Some(v) = o.active_model {
            self.active_model = v;
        }
        if let Some(v) = o.endpoint {
            self.endpoint = v;
        }
        if let Some(v) = o.input_dir {
            self.input_dir = v;
        }
        if let Some(v) = o.output_dir {
            self.output_dir = v;
        }
        if let Some(v) = o.source_language {
            self.source_language = v;
        }
        if let Some(v) = o.validate {
            self.validate = v;
        }
        if let Some(v) = o.prompt_context {
            self.prompt_context = Some(v);
        }
        if let Some(v) = o.glossary_path {
            self.glossary_path = Some(v);
        }
    }

    pub fn validate(&self) -> Result<(), RunError> {
        if self.max_concurrency == 0 {
            return Err(RunError::Config("MAX_CONCURRENCY must be at least 1".into()));
        }
        if self.max_batch_char_limit == 0 {
            return Err(RunError::Config("MAX_BATCH_CHAR_LIMIT must be at least 1".into()));
        }
        if self.max_errors == 0 {
            return Err(RunError::Config("MAX_ERRORS must be at least 1".into()));
        }
        if self.keys.iter().all(|k| k.trim().is_empty()) {
            return Err(RunError::Config("at least one API key is required".into()));
        }
        if self.active_model.trim().is_empty() {
            return Err(RunError::Config("activeModel is required".into()));
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Per-run overrides as sent by a control surface.
///
/// Accepts the canonical upper-case option names as well as the camelCase names
/// older clients send.
#[derive(Debug, Default, Deserialize)]
pub struct RunConfigOverrides {
    #[serde(default, alias = "MAX_CONCURRENCY", alias = "maxConcurrency")]
    pub max_concurrency: Option<usize>,

    #[serde(default, alias = "MAX_BATCH_CHAR_LIMIT", alias = "batchLimit")]
    pub max_batch_char_limit: Option<usize>,

    #[serde(default, alias = "RETRY_DELAY", alias = "retryDelay")]
    pub retry_delay_ms: Option<u64>,

    #[serde(default, alias = "MAX_ERRORS", alias = "maxErrors")]
    pub max_errors: Option<usize>,

    #[serde(default, alias = "KEYS", alias = "apiKeys")]
    pub keys: Option<KeyList>,

    #[serde(default, alias = "activeModel")]
    pub active_model: Option<String>,

    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default, alias = "inputDir")]
    pub input_dir: Option<PathBuf>,

    #[serde(default, alias = "outputDir")]
    pub output_dir: Option<PathBuf>,

    #[serde(default, alias = "sourceLanguage")]
    pub source_language: Option<String>,

    #[serde(default)]
    pub validate: Option<bool>,

    #[serde(default, alias = "promptContext")]
    pub prompt_context: Option<String>,

    #[serde(default, alias = "glossaryPath")]
    pub glossary_path: Option<PathBuf>,
}

/// Credentials as a JSON array or a comma-separated string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum KeyList {
    List(Vec<String>),
    Joined(String),
}

impl KeyList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            KeyList::List(v) => v
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            KeyList::Joined(s) => split_keys(&s),
        }
    }
}

fn split_keys(s: &str) -> Vec<String> {
    s.split(',')
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect()
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("ignoring invalid value for {name}: {raw:?}");
            None
        }
    }
}
