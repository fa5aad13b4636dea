use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use simplelog::LevelFilter;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://nz.ua";
const DEFAULT_SEEN_STORE: &str = "seen_news.json";

/// Portal account the pages are fetched with.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub base_url: Url,
    pub username: String,
    pub password: String,
    pub student_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: i64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub portal: PortalConfig,
    /// Messages are only logged when no bot is configured.
    pub telegram: Option<TelegramConfig>,
    pub seen_store: PathBuf,
    pub log_level: LevelFilter,
}

impl Config {
    /// Reads the configuration from the process environment (after `.env` is loaded).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| -> Option<String> { lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) };
        let required = |name: &str| -> Result<String> {
            var(name).ok_or_else(|| anyhow!("{} environment variable not found", name))
        };

        let base_url = var("NZ_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let portal = PortalConfig {
            base_url: Url::parse(&base_url).with_context(|| format!("NZ_BASE_URL is not a valid URL: {}", base_url))?,
            username: required("NZ_USERNAME")?,
            password: required("NZ_PASSWORD")?,
            student_id: var("NZ_STUDENT_ID"),
        };

        let telegram = match (var("BOT_TOKEN"), var("CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig {
                bot_token,
                chat_id: chat_id.parse::<i64>().with_context(|| format!("CHAT_ID is not a number: {}", chat_id))?,
            }),
            (None, None) => None,
            _ => return Err(anyhow!("BOT_TOKEN and CHAT_ID must be set together")),
        };

        let log_level = match var("LOG_LEVEL") {
            Some(level) => LevelFilter::from_str(&level).map_err(|_| anyhow!("LOG_LEVEL is not a log level: {}", level))?,
            None => LevelFilter::Info,
        };

        Ok(Config {
            portal,
            telegram,
            seen_store: var("SEEN_STORE").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_SEEN_STORE)),
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[("NZ_USERNAME", "student"), ("NZ_PASSWORD", "secret")]).unwrap();
        assert_eq!(config.portal.base_url.as_str(), "https://nz.ua/");
        assert!(config.telegram.is_none());
        assert_eq!(config.seen_store, PathBuf::from("seen_news.json"));
        assert_eq!(config.log_level, LevelFilter::Info);
    }

    #[test]
    fn full_configuration() {
        let config = config(&[
            ("NZ_USERNAME", "student"),
            ("NZ_PASSWORD", "secret"),
            ("NZ_STUDENT_ID", "42"),
            ("BOT_TOKEN", "123:abc"),
            ("CHAT_ID", "-1001"),
            ("LOG_LEVEL", "debug"),
        ])
        .unwrap();
        assert_eq!(config.portal.student_id.as_deref(), Some("42"));
        assert_eq!(config.telegram.unwrap().chat_id, -1001);
        assert_eq!(config.log_level, LevelFilter::Debug);
    }

    #[test]
    fn invalid_configuration() {
        assert!(config(&[("NZ_USERNAME", "student")]).is_err());
        assert!(config(&[("NZ_USERNAME", "a"), ("NZ_PASSWORD", "b"), ("BOT_TOKEN", "t")]).is_err());
        assert!(config(&[("NZ_USERNAME", "a"), ("NZ_PASSWORD", "b"), ("BOT_TOKEN", "t"), ("CHAT_ID", "x")]).is_err());
        assert!(config(&[("NZ_USERNAME", "a"), ("NZ_PASSWORD", "b"), ("NZ_BASE_URL", "not a url")]).is_err());
    }
}
