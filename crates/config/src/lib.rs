//! Configuration loading, validation, and management for loreweave.
//!
//! Runtime settings load from a TOML file with `LOREWEAVE_*` environment
//! variable overrides; characters (personas) load from JSON files with every
//! optional section defaulted. All settings are validated at load time —
//! configuration errors are raised immediately, never retried.

use loreweave_core::character::Character;
use loreweave_core::model::ModelClass;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Tunables for the runtime and the generation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// How many recent messages the composition pipeline fetches
    #[serde(default = "default_conversation_length")]
    pub conversation_length: usize,

    /// Bounded window for cross-room interaction history
    #[serde(default = "default_recent_interactions")]
    pub recent_interactions: usize,

    /// How many knowledge hits the composition pipeline surfaces
    #[serde(default = "default_knowledge_count")]
    pub knowledge_count: usize,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub tokens: TokenBudgets,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            conversation_length: default_conversation_length(),
            recent_interactions: default_recent_interactions(),
            knowledge_count: default_knowledge_count(),
            retry: RetrySettings::default(),
            tokens: TokenBudgets::default(),
        }
    }
}

fn default_conversation_length() -> usize {
    32
}
fn default_recent_interactions() -> usize {
    20
}
fn default_knowledge_count() -> usize {
    5
}

/// Retry policy knobs for the generation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// First backoff interval; doubles on each attempt
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Cumulative backoff cap for user-facing response generation
    #[serde(default = "default_generation_backoff_cap_ms")]
    pub generation_backoff_cap_ms: u64,

    /// Optional attempt cap for low-stakes classification calls.
    /// `None` keeps the original availability-over-fast-failure behavior
    /// (retry indefinitely); operators can bound it here.
    #[serde(default)]
    pub classification_max_attempts: Option<u32>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            generation_backoff_cap_ms: default_generation_backoff_cap_ms(),
            classification_max_attempts: None,
        }
    }
}

fn default_initial_delay_ms() -> u64 {
    1000
}
fn default_generation_backoff_cap_ms() -> u64 {
    32000
}

/// Maximum input tokens per response class. Context text is truncated to
/// these budgets (prefix kept) before invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBudgets {
    #[serde(default = "default_small_budget")]
    pub small: usize,
    #[serde(default = "default_medium_budget")]
    pub medium: usize,
    #[serde(default = "default_large_budget")]
    pub large: usize,
}

impl Default for TokenBudgets {
    fn default() -> Self {
        Self {
            small: default_small_budget(),
            medium: default_medium_budget(),
            large: default_large_budget(),
        }
    }
}

fn default_small_budget() -> usize {
    4096
}
fn default_medium_budget() -> usize {
    8192
}
fn default_large_budget() -> usize {
    16384
}

impl TokenBudgets {
    /// The input-token budget for a response class.
    pub fn for_class(&self, class: ModelClass) -> usize {
        match class {
            ModelClass::Small => self.small,
            ModelClass::Medium => self.medium,
            ModelClass::Large => self.large,
        }
    }
}

impl RuntimeSettings {
    /// Load settings from a TOML file, then apply environment overrides and
    /// validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut settings: RuntimeSettings =
            toml::from_str(&raw).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        settings.apply_env_overrides();
        settings.validate()?;
        debug!(?settings, "runtime settings loaded");
        Ok(settings)
    }

    /// Apply `LOREWEAVE_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse::<usize>("LOREWEAVE_CONVERSATION_LENGTH") {
            self.conversation_length = v;
        }
        if let Some(v) = env_parse::<usize>("LOREWEAVE_RECENT_INTERACTIONS") {
            self.recent_interactions = v;
        }
        if let Some(v) = env_parse::<usize>("LOREWEAVE_KNOWLEDGE_COUNT") {
            self.knowledge_count = v;
        }
        if let Some(v) = env_parse::<u64>("LOREWEAVE_RETRY_INITIAL_DELAY_MS") {
            self.retry.initial_delay_ms = v;
        }
        if let Some(v) = env_parse::<u64>("LOREWEAVE_RETRY_BACKOFF_CAP_MS") {
            self.retry.generation_backoff_cap_ms = v;
        }
        if let Some(v) = env_parse::<u32>("LOREWEAVE_RETRY_CLASSIFICATION_MAX_ATTEMPTS") {
            self.retry.classification_max_attempts = Some(v);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.conversation_length == 0 {
            return Err(ConfigError::Invalid(
                "conversation_length must be at least 1".into(),
            ));
        }
        if self.retry.initial_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "retry.initial_delay_ms must be nonzero".into(),
            ));
        }
        if self.retry.generation_backoff_cap_ms < self.retry.initial_delay_ms {
            return Err(ConfigError::Invalid(
                "retry.generation_backoff_cap_ms must be >= retry.initial_delay_ms".into(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Load a character (persona) from a JSON file.
pub fn load_character(path: impl AsRef<Path>) -> Result<Character, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let character: Character = serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    if character.name.trim().is_empty() {
        return Err(ConfigError::Invalid("character name must not be empty".into()));
    }
    Ok(character)
}
