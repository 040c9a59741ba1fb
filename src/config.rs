use std::env;

use crate::errors::ConfigError;

const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_CHAT_MODEL: &str = "llama3.2";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_PORT: u16 = 8080;

/// Process configuration, read once from the environment at start-up.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub ollama_base_url: String,
    /// Model used for conversational turns.
    pub chat_model: String,
    /// Model used by the structured-generation actions.
    pub structured_model: String,
    pub session_secret: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name).filter(|v| !v.is_empty()).ok_or(ConfigError::Missing(name))
        };

        let chat_model = lookup("CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string());
        let structured_model = lookup("STRUCTURED_MODEL").unwrap_or_else(|| chat_model.clone());

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_or(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_MAX_CONNECTIONS,
            )?,
            ollama_base_url: lookup("OLLAMA_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string()),
            chat_model,
            structured_model,
            session_secret: required("SESSION_SECRET")?,
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
    }
}
