use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use reqwest::Url;

use crate::api::portal::QuizVariant;

pub const DEFAULT_API_URL: &str = "https://lamback.onrender.com";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {key} value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: Url,
    pub variant: QuizVariant,
    pub request_timeout: Duration,
    pub token_store: PathBuf,
    pub dialogue_db: String,
}

impl Config {
    /// Reads the bot settings from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: load(&lookup, "PORTAL_API_URL", DEFAULT_API_URL)?,
            variant: load(&lookup, "PORTAL_QUIZ_VARIANT", "techstack")?,
            request_timeout: Duration::from_secs(load(&lookup, "PORTAL_TIMEOUT_SECS", "15")?),
            token_store: load(&lookup, "TOKEN_STORE", "tokens.json")?,
            dialogue_db: load(&lookup, "DIALOGUE_DB", "db.sqlite")?,
        })
    }
}

fn load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = lookup(key).unwrap_or_else(|| {
        log::info!("{} not set, using default: {}", key, default);
        default.to_string()
    });
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}
