use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub api_base_url: String,
    pub auth_token: Option<String>,
    pub request_timeout_secs: u64,
    /// Termination threshold; the server enforces the same limit authoritatively.
    pub violation_limit: u32,
    pub esc_grace_ms: u64,
    pub fullscreen_recovery_ms: u64,
    pub pause_clock_during_confirmation: bool,
}

impl SessionConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            api_base_url: get_env("EXAM_API_BASE_URL")?,
            auth_token: env::var("EXAM_AUTH_TOKEN").ok(),
            request_timeout_secs: get_env_or("EXAM_REQUEST_TIMEOUT_SECS", 10)?,
            violation_limit: get_env_or("EXAM_VIOLATION_LIMIT", 3)?,
            esc_grace_ms: get_env_or("EXAM_ESC_GRACE_MS", 500)?,
            fullscreen_recovery_ms: get_env_or("EXAM_FULLSCREEN_RECOVERY_MS", 100)?,
            pause_clock_during_confirmation: get_env_or(
                "EXAM_PAUSE_CLOCK_DURING_CONFIRMATION",
                false,
            )?,
        })
    }

    /// Engine defaults against a known service URL; embedders that carry
    /// their own credentials start here and fill in the token.
    pub fn for_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            auth_token: None,
            request_timeout_secs: 10,
            violation_limit: 3,
            esc_grace_ms: 500,
            fullscreen_recovery_ms: 100,
            pause_clock_during_confirmation: false,
        }
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}
