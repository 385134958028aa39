//! Application configuration module
//! This module handles loading, validating and saving `conf.json`: the
//! completion provider, the store location, per-workflow prompt settings and
//! the log level.

use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use url::Url;

use crate::generation::PromptSettings;

/// Environment variable consulted when no API key is configured
pub const API_KEY_ENV: &str = "AZURE_API_KEY";

/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Completion provider settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// SQLite store path; the user's data directory when absent
    #[serde(default)]
    pub database_path: Option<String>,

    /// Sampling settings per workflow
    #[serde(default)]
    pub prompts: WorkflowPrompts,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Completion provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Azure,
    OpenAI,
    Ollama,
}

impl ProviderKind {
    pub fn display_name(&self) -> &str {
        match self {
            Self::Azure => "Azure OpenAI",
            Self::OpenAI => "OpenAI",
            Self::Ollama => "Ollama",
        }
    }

    /// Hosted providers need an API key
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Azure => write!(f, "azure"),
            Self::OpenAI => write!(f, "openai"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "azure" => Ok(Self::Azure),
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(anyhow!("Unknown provider: {}", s)),
        }
    }
}

/// Connection settings for the completion endpoint
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LlmConfig {
    /// Provider type
    #[serde(default)]
    pub provider: ProviderKind,

    /// Model name, or deployment name for Azure
    #[serde(default = "default_model")]
    pub model: String,

    /// API key; falls back to `AZURE_API_KEY`
    #[serde(default)]
    pub api_key: String,

    /// Service endpoint URL
    #[serde(default)]
    pub endpoint: String,

    /// Azure API version
    #[serde(default = "default_api_version")]
    pub api_version: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry count for rate limits and server errors
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff for retries (in milliseconds), doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: default_model(),
            api_key: String::new(),
            endpoint: String::new(),
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl LlmConfig {
    /// Configured key, or the environment fallback
    pub fn get_api_key(&self) -> String {
        if !self.api_key.trim().is_empty() {
            return self.api_key.clone();
        }
        std::env::var(API_KEY_ENV).unwrap_or_default()
    }

    /// Configured endpoint, or the provider default
    pub fn get_endpoint(&self) -> String {
        if !self.endpoint.trim().is_empty() {
            return self.endpoint.clone();
        }
        match self.provider {
            ProviderKind::Azure => String::new(),
            ProviderKind::OpenAI => default_openai_endpoint(),
            ProviderKind::Ollama => default_ollama_endpoint(),
        }
    }
}

/// Sampling settings for each generation workflow
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct WorkflowPrompts {
    #[serde(default = "PromptSettings::vnest")]
    pub vnest: PromptSettings,
    #[serde(default = "PromptSettings::sr")]
    pub sr: PromptSettings,
    #[serde(default = "PromptSettings::personalization")]
    pub personalization: PromptSettings,
    #[serde(default = "PromptSettings::profile")]
    pub profile: PromptSettings,
}

impl Default for WorkflowPrompts {
    fn default() -> Self {
        Self {
            vnest: PromptSettings::vnest(),
            sr: PromptSettings::sr(),
            personalization: PromptSettings::personalization(),
            profile: PromptSettings::profile(),
        }
    }
}

impl WorkflowPrompts {
    fn named(&self) -> [(&'static str, PromptSettings); 4] {
        [
            ("vnest", self.vnest),
            ("sr", self.sr),
            ("personalization", self.personalization),
            ("profile", self.profile),
        ]
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_model() -> String {
    "gpt-4.1".to_string()
}

fn default_api_version() -> Option<String> {
    Some("2024-12-01-preview".to_string())
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_retry_count() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

impl Config {
    /// Load the configuration, writing a default file when none exists
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config)
        } else {
            warn!("Config file not found at '{}', creating default config.", path.display());
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        fs::write(path, json).with_context(|| format!("Failed to write config to file: {}", path.display()))?;
        Ok(())
    }

    /// Validate settings that do not depend on the provider
    pub fn validate_settings(&self) -> Result<()> {
        for (name, settings) in self.prompts.named() {
            if !(0.0..=2.0).contains(&settings.temperature) {
                return Err(anyhow!(
                    "Temperature for '{}' must be between 0.0 and 2.0, got {}",
                    name,
                    settings.temperature
                ));
            }
            if settings.max_tokens == 0 {
                return Err(anyhow!("max_tokens for '{}' must be greater than zero", name));
            }
        }

        if let Some(path) = &self.database_path {
            if path.trim().is_empty() {
                return Err(anyhow!("database_path must not be empty when set"));
            }
        }

        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        self.validate_settings()?;

        let llm = &self.llm;
        if llm.model.trim().is_empty() {
            return Err(anyhow!("A model is required for the {} provider", llm.provider.display_name()));
        }

        if llm.provider.requires_api_key() && llm.get_api_key().trim().is_empty() {
            return Err(anyhow!(
                "API key is required for the {} provider (set llm.api_key or {})",
                llm.provider.display_name(),
                API_KEY_ENV
            ));
        }

        let endpoint = llm.get_endpoint();
        if endpoint.trim().is_empty() {
            return Err(anyhow!("An endpoint is required for the {} provider", llm.provider.display_name()));
        }
        Url::parse(&endpoint).with_context(|| format!("Invalid endpoint URL: {}", endpoint))?;

        if llm.provider == ProviderKind::Azure
            && llm.api_version.as_deref().map(str::trim).unwrap_or("").is_empty()
        {
            return Err(anyhow!("Azure OpenAI requires an api_version"));
        }

        Ok(())
    }
}
