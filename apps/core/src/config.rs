//! Service configuration, read from the environment (and `.env` when present).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use url::Url;
use validator::Validate;

use crate::error::AppError;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

#[derive(Debug, Clone, Validate)]
pub struct AppConfig {
    /// Bearer token for the completion endpoint. Local OpenAI-compatible servers run without one.
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible API, without trailing slash.
    #[validate(url)]
    pub api_base: String,
    #[validate(length(min = 1, max = 200))]
    pub model: String,
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f32,
    #[validate(range(min = 1, max = 32768))]
    pub max_tokens: u32,
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    /// Longer inputs are truncated before being sent upstream.
    #[validate(range(min = 16, max = 100000))]
    pub max_input_chars: usize,
    /// Explanations allowed per client per `rate_window`.
    #[validate(range(min = 1, max = 10000))]
    pub rate_limit: usize,
    pub rate_window: Duration,
    #[validate(range(min = 1, max = 10))]
    pub retry_attempts: u32,
    pub retry_base: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 1200,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            data_dir: PathBuf::from("data"),
            max_input_chars: 4000,
            rate_limit: 10,
            rate_window: Duration::from_secs(60),
            retry_attempts: 3,
            retry_base: Duration::from_millis(500),
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| AppError::Config(format!("{} has an invalid value '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

impl AppConfig {
    /// Loads `.env` (if any), then reads the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds and validates a configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();

        let api_base: String = parse_var(&lookup, "OPENAI_BASE_URL", defaults.api_base)?;
        // Rejects relative and garbage URLs before validator sees them, with a clearer message.
        let parsed = Url::parse(&api_base)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::Config(format!(
                "OPENAI_BASE_URL must be http or https, got '{}'",
                parsed.scheme()
            )));
        }

        let config = Self {
            api_key: lookup("OPENAI_API_KEY")
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: parse_var(&lookup, "GYAANFORGE_MODEL", defaults.model)?,
            temperature: parse_var(&lookup, "GYAANFORGE_TEMPERATURE", defaults.temperature)?,
            max_tokens: parse_var(&lookup, "GYAANFORGE_MAX_TOKENS", defaults.max_tokens)?,
            bind_addr: parse_var(&lookup, "GYAANFORGE_BIND", defaults.bind_addr)?,
            data_dir: parse_var(&lookup, "GYAANFORGE_DATA_DIR", defaults.data_dir)?,
            max_input_chars: parse_var(&lookup, "GYAANFORGE_MAX_INPUT_CHARS", defaults.max_input_chars)?,
            rate_limit: parse_var(&lookup, "GYAANFORGE_RATE_LIMIT", defaults.rate_limit)?,
            rate_window: Duration::from_secs(parse_var(
                &lookup,
                "GYAANFORGE_RATE_WINDOW_SECS",
                defaults.rate_window.as_secs(),
            )?),
            retry_attempts: parse_var(&lookup, "GYAANFORGE_RETRY_ATTEMPTS", defaults.retry_attempts)?,
            retry_base: Duration::from_millis(parse_var(
                &lookup,
                "GYAANFORGE_RETRY_BASE_MS",
                defaults.retry_base.as_millis() as u64,
            )?),
        };

        config.validate()?;

        if config.rate_window.is_zero() {
            return Err(AppError::Config("GYAANFORGE_RATE_WINDOW_SECS must be positive".to_string()));
        }

        info!(
            "Configuration loaded (model: {}, api: {}, bind: {})",
            config.model, config.api_base, config.bind_addr
        );

        Ok(config)
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}
