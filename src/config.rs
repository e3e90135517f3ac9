// src/config.rs
//! Environment-driven configuration (loaded after `dotenvy::dotenv()`)

use std::time::Duration;
use thiserror::Error;

use crate::request::PromptLocale;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Multi-reference generation is only accepted by the preview model at 720p
pub const DEFAULT_MODEL: &str = "veo-3.1-generate-preview";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_MAX_POLL_FAILURES: u32 = 5;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 20;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub bind_addr: String,
    pub base_url: String,
    pub model: String,
    pub poll_interval: Duration,
    pub max_poll_failures: u32,
    pub prompt_locale: PromptLocale,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_poll_failures: DEFAULT_MAX_POLL_FAILURES,
            prompt_locale: PromptLocale::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source so tests don't touch the process env
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = non_empty("GEMINI_API_KEY").or_else(|| non_empty("API_KEY"));

        let poll_interval = match non_empty("VEO_POLL_INTERVAL_SECS") {
            Some(raw) => match parse_number::<u64>("VEO_POLL_INTERVAL_SECS", &raw)? {
                0 => return Err(invalid("VEO_POLL_INTERVAL_SECS", &raw, "must be at least 1 second")),
                secs => Duration::from_secs(secs),
            },
            None => defaults.poll_interval,
        };
        let max_poll_failures = match non_empty("VEO_MAX_POLL_FAILURES") {
            Some(raw) => parse_number("VEO_MAX_POLL_FAILURES", &raw)?,
            None => defaults.max_poll_failures,
        };
        let max_upload_bytes = match non_empty("VEO_MAX_UPLOAD_MB") {
            Some(raw) => parse_number::<usize>("VEO_MAX_UPLOAD_MB", &raw)?
                .checked_mul(1024 * 1024)
                .ok_or_else(|| invalid("VEO_MAX_UPLOAD_MB", &raw, "too large"))?,
            None => defaults.max_upload_bytes,
        };
        let prompt_locale = match non_empty("VEO_PROMPT_LOCALE") {
            Some(raw) => raw
                .parse::<PromptLocale>()
                .map_err(|reason| invalid("VEO_PROMPT_LOCALE", &raw, reason))?,
            None => defaults.prompt_locale,
        };

        Ok(Self {
            api_key,
            bind_addr: non_empty("VEO_BIND_ADDR").unwrap_or(defaults.bind_addr),
            base_url: non_empty("VEO_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            model: non_empty("VEO_MODEL").unwrap_or(defaults.model),
            poll_interval,
            max_poll_failures,
            prompt_locale,
            max_upload_bytes,
        })
    }
}

fn invalid(name: &'static str, raw: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        name,
        value: raw.to_string(),
        reason: reason.into(),
    }
}

fn parse_number<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| invalid(name, raw, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_env_empty() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.max_poll_failures, 5);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.prompt_locale, PromptLocale::Vietnamese);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_overrides_and_api_key_fallback() {
        let config = Config::from_lookup(lookup_from(&[
            ("API_KEY", "fallback-key"),
            ("VEO_POLL_INTERVAL_SECS", "3"),
            ("VEO_MAX_POLL_FAILURES", "2"),
            ("VEO_BASE_URL", "http://127.0.0.1:9000/v1beta/"),
            ("VEO_PROMPT_LOCALE", "en"),
        ]))
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("fallback-key"));
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.max_poll_failures, 2);
        assert_eq!(config.base_url, "http://127.0.0.1:9000/v1beta");
        assert_eq!(config.prompt_locale, PromptLocale::English);
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let result = Config::from_lookup(lookup_from(&[("VEO_MAX_POLL_FAILURES", "lots")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { name: "VEO_MAX_POLL_FAILURES", .. })
        ));
    }

    #[test]
    fn test_zero_interval_and_oversized_upload_are_rejected() {
        let zero = Config::from_lookup(lookup_from(&[("VEO_POLL_INTERVAL_SECS", "0")]));
        assert!(matches!(
            zero,
            Err(ConfigError::InvalidValue { name: "VEO_POLL_INTERVAL_SECS", .. })
        ));

        let huge = usize::MAX.to_string();
        let oversized = Config::from_lookup(lookup_from(&[("VEO_MAX_UPLOAD_MB", huge.as_str())]));
        assert!(matches!(
            oversized,
            Err(ConfigError::InvalidValue { name: "VEO_MAX_UPLOAD_MB", .. })
        ));

        let config = Config::from_lookup(lookup_from(&[("VEO_MAX_UPLOAD_MB", "8")])).unwrap();
        assert_eq!(config.max_upload_bytes, 8 * 1024 * 1024);
    }
}
