use std::time::Duration;
use anyhow::{Context, Result, anyhow};

/// Relay settings, read from the environment at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub api_url: String,
    pub api_key: String,
    pub default_model: String,
    pub host: String,
    pub port: u16,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    pub history_max_sessions: usize,
    pub history_max_messages: usize,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// `API_KEY` is required. Everything else has a default suited to a local Ollama.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = var("API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("API_KEY is not set (use any placeholder for a local Ollama)"))?;

        Ok(Self {
            api_url: var("API_URL").unwrap_or_else(|| "http://localhost:11434/v1".to_string()),
            api_key,
            default_model: var("MODEL").unwrap_or_else(|| "llama3".to_string()),
            host: var("HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_or(&var, "PORT", 3001)?,
            rate_limit_max: parse_or(&var, "RATE_LIMIT_MAX", 100)?,
            rate_limit_window: Duration::from_secs(parse_or(&var, "RATE_LIMIT_WINDOW_SECS", 15 * 60)?),
            history_max_sessions: parse_or(&var, "HISTORY_MAX_SESSIONS", 256)?,
            history_max_messages: parse_or(&var, "HISTORY_MAX_MESSAGES", 200)?,
        })
    }
}

fn parse_or<F, T>(var: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_api_key_is_an_error() {
        assert!(RelayConfig::from_vars(vars(&[])).is_err());
        assert!(RelayConfig::from_vars(vars(&[("API_KEY", "  ")])).is_err());
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::from_vars(vars(&[("API_KEY", "ollama")])).unwrap();
        assert_eq!(config.api_url, "http://localhost:11434/v1");
        assert_eq!(config.default_model, "llama3");
        assert_eq!((config.host.as_str(), config.port), ("localhost", 3001));
        assert_eq!(config.rate_limit_max, 100);
        assert_eq!(config.rate_limit_window, Duration::from_secs(900));
    }

    #[test]
    fn test_overrides_and_bad_numbers() {
        let config = RelayConfig::from_vars(vars(&[
            ("API_KEY", "sk-1"),
            ("API_URL", "https://api.example.com/v1"),
            ("MODEL", "mistral"),
            ("PORT", "8080"),
            ("RATE_LIMIT_MAX", "5"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "https://api.example.com/v1");
        assert_eq!(config.default_model, "mistral");
        assert_eq!(config.port, 8080);
        assert_eq!(config.rate_limit_max, 5);

        let err = RelayConfig::from_vars(vars(&[("API_KEY", "k"), ("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
