//! # Application Configuration
//!
//! Settings for the assistant service, read once at startup from the
//! environment. Loading fails fast when a required value is missing or a
//! numeric value does not parse.
//!
//! | Variable | Required | Default |
//! |---|---|---|
//! | `OPENAI_API_KEY` | yes | |
//! | `WEBSITE_URL` | yes | |
//! | `SCHOOL_NAME` | no | `Colegio` |
//! | `ASSISTANT_NAME` | no | `Asistente Virtual` |
//! | `OPENAI_MODEL` | no | `gpt-4o-mini` |
//! | `OPENAI_BASE_URL` | no | `https://api.openai.com/v1` |
//! | `VECTOR_STORE_ID` | no | prompt-only knowledge |
//! | `DATABASE_PATH` | no | `.school-assistant/corpus.db` |
//! | `CRAWL_MAX_PAGES` | no | `20` |
//! | `CRAWL_MAX_DEPTH` | no | `3` |
//! | `UPDATE_INTERVAL_MINUTES` | no | `360` |

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::crawler::CrawlerConfig;

pub const DEFAULT_SCHOOL_NAME: &str = "Colegio";
pub const DEFAULT_ASSISTANT_NAME: &str = "Asistente Virtual";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_DATABASE_PATH: &str = ".school-assistant/corpus.db";

/// Error type for configuration loading
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set or is empty
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be used
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Configuration for the assistant service
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// API key for the completion and knowledge store APIs
    pub openai_api_key: String,

    /// Seed URL of the school website
    pub website_url: String,

    /// School name used in the persona prompt
    pub school_name: String,

    /// Name the assistant introduces itself with
    pub assistant_name: String,

    /// Completion model name
    pub model: String,

    /// Base URL of the OpenAI-compatible API
    pub api_base_url: String,

    /// Hosted vector store; when unset knowledge lives only in the prompt
    pub vector_store_id: Option<String>,

    /// Path of the libsql corpus database
    pub database_path: String,

    /// Page budget for each crawl
    pub max_pages: u32,

    /// Depth budget for each crawl
    pub max_depth: u32,

    /// Period of the background refresh
    pub update_interval: Duration,
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<String, ConfigError> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(lookup, key) {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let openai_api_key = required(&lookup, "OPENAI_API_KEY")?;
        let website_url = required(&lookup, "WEBSITE_URL")?;
        if url::Url::parse(&website_url).is_err() {
            return Err(ConfigError::Invalid {
                key: "WEBSITE_URL",
                value: website_url,
                reason: "not an absolute URL".to_string(),
            });
        }

        let school_name = optional(&lookup, "SCHOOL_NAME").unwrap_or_else(|| {
            warn!("SCHOOL_NAME not set, using '{}'", DEFAULT_SCHOOL_NAME);
            DEFAULT_SCHOOL_NAME.to_string()
        });

        let minutes: u64 = parsed(&lookup, "UPDATE_INTERVAL_MINUTES", 360)?;
        if minutes == 0 {
            return Err(ConfigError::Invalid {
                key: "UPDATE_INTERVAL_MINUTES",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            openai_api_key,
            website_url,
            school_name,
            assistant_name: optional(&lookup, "ASSISTANT_NAME")
                .unwrap_or_else(|| DEFAULT_ASSISTANT_NAME.to_string()),
            model: optional(&lookup, "OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base_url: optional(&lookup, "OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            vector_store_id: optional(&lookup, "VECTOR_STORE_ID"),
            database_path: optional(&lookup, "DATABASE_PATH")
                .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
            max_pages: parsed(&lookup, "CRAWL_MAX_PAGES", 20)?,
            max_depth: parsed(&lookup, "CRAWL_MAX_DEPTH", 3)?,
            update_interval: Duration::from_secs(minutes * 60),
        })
    }

    /// Crawler settings with this configuration's budgets
    pub fn crawler_config(&self) -> CrawlerConfig {
        CrawlerConfig::builder()
            .max_pages(self.max_pages)
            .max_depth(self.max_depth)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("OPENAI_API_KEY", "sk-test"),
        ("WEBSITE_URL", "https://example.edu/"),
    ];

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.school_name, DEFAULT_SCHOOL_NAME);
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_pages, 20);
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.update_interval, Duration::from_secs(360 * 60));
        assert!(config.vector_store_id.is_none());
    }

    #[test]
    fn test_missing_required_fails_fast() {
        let err = AppConfig::from_lookup(lookup(&[("WEBSITE_URL", "https://example.edu/")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing("OPENAI_API_KEY"));

        let err = AppConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "k"), ("WEBSITE_URL", "  ")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing("WEBSITE_URL"));
    }

    #[test]
    fn test_invalid_values() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("CRAWL_MAX_PAGES", "muchas"));
        let err = AppConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "CRAWL_MAX_PAGES", .. }));

        let err = AppConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "k"),
            ("WEBSITE_URL", "example.edu"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "WEBSITE_URL", .. }));
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("SCHOOL_NAME", "Colegio San Martín"),
            ("CRAWL_MAX_DEPTH", "2"),
            ("UPDATE_INTERVAL_MINUTES", "30"),
            ("VECTOR_STORE_ID", "vs_123"),
        ]);
        let config = AppConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.school_name, "Colegio San Martín");
        assert_eq!(config.crawler_config().max_depth, 2);
        assert_eq!(config.update_interval, Duration::from_secs(1800));
        assert_eq!(config.vector_store_id.as_deref(), Some("vs_123"));
    }
}
