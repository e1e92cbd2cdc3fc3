use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::SortBy;

const DEFAULT_ENV_PREFIX: &str = "COMMENT_SECTION";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub composer: ComposerConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            project_id: String::new(),
            access_token: None,
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.replyke.com/api/v5".to_string()
}

fn default_user_agent() -> String {
    format!("comment-section/{}", crate::VERSION)
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    #[serde(default = "default_feed_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub default_sort: SortBy,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: default_feed_page_size(),
            default_sort: SortBy::default(),
        }
    }
}

fn default_feed_page_size() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComposerConfig {
    #[serde(default = "default_mention_debounce", with = "humantime_serde")]
    pub mention_debounce: Duration,
    #[serde(default = "default_min_comment_length")]
    pub min_comment_length: usize,
    #[serde(default = "default_suggestion_limit")]
    pub suggestion_limit: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            mention_debounce: default_mention_debounce(),
            min_comment_length: default_min_comment_length(),
            suggestion_limit: default_suggestion_limit(),
        }
    }
}

fn default_mention_debounce() -> Duration {
    Duration::from_millis(300)
}

fn default_min_comment_length() -> usize {
    1
}

fn default_suggestion_limit() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaConfig {
    #[serde(default)]
    pub giphy_api_key: String,
    #[serde(default = "default_giphy_base_url")]
    pub giphy_base_url: String,
    #[serde(default = "default_media_debounce", with = "humantime_serde")]
    pub debounce: Duration,
    #[serde(default = "default_media_page_size")]
    pub page_size: usize,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_rating")]
    pub rating: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            giphy_api_key: String::new(),
            giphy_base_url: default_giphy_base_url(),
            debounce: default_media_debounce(),
            page_size: default_media_page_size(),
            max_items: default_max_items(),
            rating: default_rating(),
        }
    }
}

fn default_giphy_base_url() -> String {
    "https://api.giphy.com/v1".to_string()
}

fn default_media_debounce() -> Duration {
    Duration::from_millis(500)
}

fn default_media_page_size() -> usize {
    20
}

fn default_max_items() -> usize {
    60
}

fn default_rating() -> String {
    "pg-13".into()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = apply_env(cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.api.base_url.is_empty() {
        base.api.base_url = other.api.base_url;
    }
    if !other.api.project_id.is_empty() {
        base.api.project_id = other.api.project_id;
    }
    if other.api.access_token.is_some() {
        base.api.access_token = other.api.access_token;
    }
    if !other.api.user_agent.is_empty() {
        base.api.user_agent = other.api.user_agent;
    }
    if !other.api.timeout.is_zero() {
        base.api.timeout = other.api.timeout;
    }

    if other.feed.page_size != 0 {
        base.feed.page_size = other.feed.page_size;
    }
    base.feed.default_sort = other.feed.default_sort;

    base.composer.mention_debounce = other.composer.mention_debounce;
    base.composer.min_comment_length = other.composer.min_comment_length;
    if other.composer.suggestion_limit != 0 {
        base.composer.suggestion_limit = other.composer.suggestion_limit;
    }

    if !other.media.giphy_api_key.is_empty() {
        base.media.giphy_api_key = other.media.giphy_api_key;
    }
    if !other.media.giphy_base_url.is_empty() {
        base.media.giphy_base_url = other.media.giphy_base_url;
    }
    base.media.debounce = other.media.debounce;
    if other.media.page_size != 0 {
        base.media.page_size = other.media.page_size;
    }
    if other.media.max_items != 0 {
        base.media.max_items = other.media.max_items;
    }
    if !other.media.rating.is_empty() {
        base.media.rating = other.media.rating;
    }

    base
}

fn apply_env(mut cfg: Config, prefix: &str) -> Config {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value);
    }

    cfg
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "api.base_url" => cfg.api.base_url = value,
        "api.project_id" => cfg.api.project_id = value,
        "api.access_token" => {
            cfg.api.access_token = Some(value).filter(|token| !token.trim().is_empty());
        }
        "api.user_agent" => cfg.api.user_agent = value,
        "api.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.api.timeout = duration;
            }
        }
        "feed.page_size" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.feed.page_size = parsed;
            }
        }
        "feed.default_sort" => {
            if let Some(sort) = SortBy::from_key(&value) {
                cfg.feed.default_sort = sort;
            }
        }
        "composer.mention_debounce" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.composer.mention_debounce = duration;
            }
        }
        "composer.min_comment_length" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.composer.min_comment_length = parsed;
            }
        }
        "composer.suggestion_limit" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.composer.suggestion_limit = parsed;
            }
        }
        "media.giphy_api_key" => cfg.media.giphy_api_key = value,
        "media.giphy_base_url" => cfg.media.giphy_base_url = value,
        "media.debounce" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.media.debounce = duration;
            }
        }
        "media.page_size" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.media.page_size = parsed;
            }
        }
        "media.max_items" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.media.max_items = parsed;
            }
        }
        "media.rating" => cfg.media.rating = value,
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("comment-section").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    fn isolated(config_file: PathBuf, prefix: &str) -> LoadOptions {
        LoadOptions {
            config_file: Some(config_file),
            env_prefix: Some(prefix.to_string()),
        }
    }

    #[test]
    fn load_defaults_without_files() {
        let dir = tempdir().unwrap();
        let cfg = load(isolated(dir.path().join("missing.yaml"), "CS_TEST_DEFAULTS")).unwrap();
        assert_eq!(cfg.feed.page_size, 10);
        assert_eq!(cfg.feed.default_sort, SortBy::Top);
        assert_eq!(cfg.media.max_items, 60);
        assert_eq!(cfg.media.debounce, Duration::from_millis(500));
        assert_eq!(cfg.composer.mention_debounce, Duration::from_millis(300));
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "api:\n  project_id: proj-1\nfeed:\n  default_sort: new\nmedia:\n  debounce: 250ms\n  max_items: 40\n",
        )
        .unwrap();
        let cfg = load(isolated(path, "CS_TEST_FILE")).unwrap();
        assert_eq!(cfg.api.project_id, "proj-1");
        assert_eq!(cfg.feed.default_sort, SortBy::New);
        assert_eq!(cfg.media.debounce, Duration::from_millis(250));
        assert_eq!(cfg.media.max_items, 40);
        assert_eq!(cfg.media.page_size, 20);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "media: [not, a, map]\n").unwrap();
        assert!(load(isolated(path, "CS_TEST_MALFORMED")).is_err());
    }

    #[test]
    fn env_overrides() {
        let dir = tempdir().unwrap();
        env::set_var("CS_TEST_ENV_MEDIA__PAGE_SIZE", "30");
        env::set_var("CS_TEST_ENV_FEED__DEFAULT_SORT", "old");
        env::set_var("CS_TEST_ENV_COMPOSER__MENTION_DEBOUNCE", "1s");
        let cfg = load(isolated(dir.path().join("none.yaml"), "CS_TEST_ENV")).unwrap();
        assert_eq!(cfg.media.page_size, 30);
        assert_eq!(cfg.feed.default_sort, SortBy::Old);
        assert_eq!(cfg.composer.mention_debounce, Duration::from_secs(1));
        env::remove_var("CS_TEST_ENV_MEDIA__PAGE_SIZE");
        env::remove_var("CS_TEST_ENV_FEED__DEFAULT_SORT");
        env::remove_var("CS_TEST_ENV_COMPOSER__MENTION_DEBOUNCE");
    }
}
