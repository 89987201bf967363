//! Layered configuration for the assistant.
//!
//! Priority (highest to lowest):
//! 1. Environment variables prefixed with `RAG_` (`RAG_LLM__MODEL`, ...)
//! 2. The flat variables used by existing deployments (`PAPERLESS_API_URL`, ...)
//! 3. A TOML file (`~/.config/paperless-rag/config.toml` unless a path is given)
//! 4. Built-in defaults

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;

use crate::error::ConfigError;

/// Flat environment variable names and the config keys they populate.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("PAPERLESS_API_URL", "paperless.api_url"),
    ("PAPERLESS_USERNAME", "paperless.username"),
    ("PAPERLESS_PASSWORD", "paperless.password"),
    ("GEMINI_API_KEY", "llm.api_key"),
    ("OLLAMA_HOST", "embeddings.host"),
    ("DB_HOST", "database.host"),
    ("DB_PORT", "database.port"),
    ("DB_NAME", "database.name"),
    ("DB_USER", "database.user"),
    ("DB_PASSWORD", "database.password"),
    ("DATABASE_URL", "database.url"),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paperless: PaperlessConfig,
    pub database: DatabaseConfig,
    pub embeddings: EmbeddingConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperlessConfig {
    /// REST root, e.g. `https://docs.example.org/api`.
    pub api_url: String,
    pub username: String,
    pub password: String,
    pub timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub page_size: usize,
}

impl Default for PaperlessConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            username: String::new(),
            password: String::new(),
            timeout_secs: 30,
            download_timeout_secs: 60,
            page_size: 100,
        }
    }
}

impl PaperlessConfig {
    pub fn api_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Full connection URL; takes precedence over the individual fields.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            name: "paperless_rag".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        if let Some(url) = self.url.as_deref().filter(|url| !url.trim().is_empty()) {
            return url.parse();
        }

        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.name)
            .username(&self.user);
        if !self.password.is_empty() {
            options = options.password(&self.password);
        }
        Ok(options)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Host name of the Ollama server, or a full `http(s)://` URL.
    pub host: String,
    pub port: u16,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text".to_string(),
            timeout_secs: 60,
        }
    }
}

impl EmbeddingConfig {
    pub fn base_url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            self.host.trim_end_matches('/').to_string()
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.3,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Nearest neighbours requested from the vector index.
    pub top_k: usize,
    /// Characters of each document shown to the relevance ranker.
    pub preview_chars: usize,
    pub min_question_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: 7,
            preview_chars: 2000,
            min_question_chars: 3,
        }
    }
}

impl Config {
    /// Checks that every credential needed to reach the external services is set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.paperless.api_url.trim().is_empty() {
            missing.push("PAPERLESS_API_URL".to_string());
        }
        if self.paperless.username.trim().is_empty() {
            missing.push("PAPERLESS_USERNAME".to_string());
        }
        if self.paperless.password.is_empty() {
            missing.push("PAPERLESS_PASSWORD".to_string());
        }
        if self.llm.api_key.trim().is_empty() {
            missing.push("GEMINI_API_KEY".to_string());
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingSettings(missing))
        }
    }
}

/// `~/.config/paperless-rag/config.toml` on Linux, the platform equivalent elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("paperless-rag").join("config.toml"))
}

/// Load configuration from layered sources.
///
/// `path` overrides the default config file location; a missing default
/// file is skipped silently.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    match path {
        Some(path) => figment = figment.merge(Toml::file(path)),
        None => {
            if let Some(path) = default_config_path() {
                if path.exists() {
                    figment = figment.merge(Toml::file(path));
                }
            }
        }
    }

    figment = merge_legacy_env(figment).merge(Env::prefixed("RAG_").split("__"));

    figment.extract().map_err(|e| ConfigError::Load(Box::new(e)))
}

/// Merges the flat variables as plain strings, so a numeric password stays a
/// string. Only the port is read as a number; empty values are ignored.
fn merge_legacy_env(mut figment: Figment) -> Figment {
    for (name, path) in LEGACY_ENV {
        let Ok(value) = std::env::var(name) else {
            continue;
        };
        if value.trim().is_empty() {
            continue;
        }

        figment = match (*path, value.trim().parse::<u16>()) {
            ("database.port", Ok(port)) => figment.merge(Serialized::default(path, port)),
            _ => figment.merge(Serialized::default(path, value)),
        };
    }
    figment
}
