use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;

use brewlog_core::sync::DEFAULT_SETTLE_DELAY;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

pub struct Config {
    pub db_path: PathBuf,
    pub openai: OpenAiConfig,
    pub settle_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub url: String,
    pub model: String,
}

impl Config {
    pub fn load(db_override: Option<PathBuf>) -> Result<Self> {
        let db_path = match db_override {
            Some(path) => path,
            None => {
                let proj_dirs = ProjectDirs::from("", "", "brewlog")
                    .context("Could not determine home directory")?;
                let data_dir = proj_dirs.data_dir().to_path_buf();
                std::fs::create_dir_all(&data_dir).with_context(|| {
                    format!("Failed to create data directory: {}", data_dir.display())
                })?;
                data_dir.join("brewlog.db")
            }
        };

        Ok(Config {
            db_path,
            openai: OpenAiConfig::from_lookup(|k| std::env::var(k).ok()),
            settle_delay: settle_delay_from(std::env::var("BREWLOG_SETTLE_MS").ok())?,
        })
    }
}

impl OpenAiConfig {
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        OpenAiConfig {
            api_key: non_empty("BREWLOG_OPENAI_API_KEY").or_else(|| non_empty("OPENAI_API_KEY")),
            url: non_empty("BREWLOG_OPENAI_URL").unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            model: non_empty("BREWLOG_OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        }
    }
}

fn settle_delay_from(raw: Option<String>) -> Result<Duration> {
    match raw {
        None => Ok(DEFAULT_SETTLE_DELAY),
        Some(ms) => {
            let ms: u64 = ms
                .trim()
                .parse()
                .with_context(|| format!("Invalid BREWLOG_SETTLE_MS '{ms}'. Use milliseconds"))?;
            Ok(Duration::from_millis(ms))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_openai_defaults() {
        let cfg = OpenAiConfig::from_lookup(lookup(&[]));
        assert!(cfg.api_key.is_none());
        assert_eq!(cfg.url, DEFAULT_OPENAI_URL);
        assert_eq!(cfg.model, DEFAULT_OPENAI_MODEL);
    }

    #[test]
    fn test_openai_key_precedence() {
        let cfg = OpenAiConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "generic"),
            ("BREWLOG_OPENAI_API_KEY", "specific"),
        ]));
        assert_eq!(cfg.api_key.as_deref(), Some("specific"));

        let cfg = OpenAiConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "generic"),
            ("BREWLOG_OPENAI_API_KEY", "  "),
        ]));
        assert_eq!(cfg.api_key.as_deref(), Some("generic"));
    }

    #[test]
    fn test_settle_delay() {
        assert_eq!(settle_delay_from(None).unwrap(), DEFAULT_SETTLE_DELAY);
        assert_eq!(
            settle_delay_from(Some("250".to_string())).unwrap(),
            Duration::from_millis(250)
        );
        assert!(settle_delay_from(Some("soon".to_string())).is_err());
    }

    #[test]
    fn test_db_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.db");
        let cfg = Config::load(Some(path.clone())).unwrap();
        assert_eq!(cfg.db_path, path);
    }
}
