//! Configuration management for dpofinder
//!
//! All configuration is loaded from `./config/dpofinder.toml` (or the path
//! given with `--config`). The shipped template is the canonical source of
//! defaults; the named constants below mirror it so that sections or keys
//! omitted from a user file still resolve to the same policy.

use serde::Deserialize;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use regex::Regex;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/dpofinder.toml";

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = include_str!("../config/dpofinder.toml");

/// Hard deadline for one page fetch.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 12;
/// Bodies are truncated past this many bytes.
pub const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024;
/// Pages visited per domain before the crawl stops.
pub const DEFAULT_MAX_PAGES: usize = 12;
/// Confidence at which the crawl short-circuits.
pub const DEFAULT_STRONG_HIT_CONFIDENCE: u8 = 70;
/// Next-link candidates kept per page.
pub const DEFAULT_MAX_NEXT_LINKS: usize = 15;
/// Forms below this score are dropped by the extractor.
pub const DEFAULT_MIN_FORM_CONFIDENCE: u8 = 40;
/// Maximum record age before a recrawl.
pub const DEFAULT_STALENESS_DAYS: i64 = 30;
/// Records below this confidence are stale; emails at or above it are sticky.
pub const DEFAULT_MIN_CONFIDENCE: u8 = 60;
/// Workers used by the batch runner.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 4;

pub const DEFAULT_SEED_PATHS: &[&str] = &[
    "privacy",
    "privacy-policy",
    "privacybeleid",
    "dataprotection",
    "gdpr",
    "legal",
    "contact",
    "about/privacy",
];

pub const DEFAULT_NEXT_LINK_PATH_PATTERN: &str =
    r"(?i)(privacy|privacybeleid|data-?protection|datenschutz|gdpr|avg|dpo|legal|imprint|impressum|contact)";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid regex pattern '{pattern_name}': {error}\n  Pattern: {pattern}")]
    InvalidRegex {
        pattern_name: String,
        pattern: String,
        error: String,
    },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Configuration field '{field}' must be a confidence between 0 and 100, got {value}")]
    ConfidenceOutOfRange { field: String, value: u8 },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default)]
    pub requests_per_second_per_host: u32,
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
            requests_per_second_per_host: 0,
        }
    }
}

/// Crawl bounds and thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_strong_hit_confidence")]
    pub strong_hit_confidence: u8,
    #[serde(default = "default_max_next_links")]
    pub max_next_links: usize,
    #[serde(default = "default_min_form_confidence")]
    pub min_form_confidence: u8,
    #[serde(default = "default_seed_paths")]
    pub seed_paths: Vec<String>,
    #[serde(default = "default_next_link_path_pattern")]
    pub next_link_path_pattern: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            strong_hit_confidence: default_strong_hit_confidence(),
            max_next_links: default_max_next_links(),
            min_form_confidence: default_min_form_confidence(),
            seed_paths: default_seed_paths(),
            next_link_path_pattern: default_next_link_path_pattern(),
        }
    }
}

/// Store location and freshness policy
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
    #[serde(default = "default_staleness_days")]
    pub staleness_days: i64,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: u8,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
            staleness_days: default_staleness_days(),
            min_confidence: default_min_confidence(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_batch_concurrency")]
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_batch_concurrency(),
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; dpofinder/0.1; privacy-contact lookup)".to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

fn default_max_pages() -> usize {
    DEFAULT_MAX_PAGES
}

fn default_strong_hit_confidence() -> u8 {
    DEFAULT_STRONG_HIT_CONFIDENCE
}

fn default_max_next_links() -> usize {
    DEFAULT_MAX_NEXT_LINKS
}

fn default_min_form_confidence() -> u8 {
    DEFAULT_MIN_FORM_CONFIDENCE
}

fn default_seed_paths() -> Vec<String> {
    DEFAULT_SEED_PATHS.iter().map(|p| p.to_string()).collect()
}

fn default_next_link_path_pattern() -> String {
    DEFAULT_NEXT_LINK_PATH_PATTERN.to_string()
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_staleness_days() -> i64 {
    DEFAULT_STALENESS_DAYS
}

fn default_min_confidence() -> u8 {
    DEFAULT_MIN_CONFIDENCE
}

fn default_batch_concurrency() -> usize {
    DEFAULT_BATCH_CONCURRENCY
}

impl AppConfig {
    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.user_agent.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "http.user_agent".to_string(),
            });
        }
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "http.request_timeout_secs".to_string(),
            });
        }
        if self.crawl.max_pages == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "crawl.max_pages".to_string(),
            });
        }
        if self.batch.concurrency == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "batch.concurrency".to_string(),
            });
        }

        self.validate_confidence("crawl.strong_hit_confidence", self.crawl.strong_hit_confidence)?;
        self.validate_confidence("crawl.min_form_confidence", self.crawl.min_form_confidence)?;
        self.validate_confidence("cache.min_confidence", self.cache.min_confidence)?;

        self.validate_regex("crawl.next_link_path_pattern", &self.crawl.next_link_path_pattern)?;

        Ok(())
    }

    fn validate_confidence(&self, field: &str, value: u8) -> Result<(), ConfigError> {
        if value > 100 {
            return Err(ConfigError::ConfidenceOutOfRange {
                field: field.to_string(),
                value,
            });
        }
        Ok(())
    }

    fn validate_regex(&self, name: &str, pattern: &str) -> Result<(), ConfigError> {
        Regex::new(pattern).map_err(|e| ConfigError::InvalidRegex {
            pattern_name: name.to_string(),
            pattern: pattern.to_string(),
            error: e.to_string(),
        })?;
        Ok(())
    }

    /// Write the default configuration file to `path`, creating parent directories
    pub fn create_default_config_at(path: &Path) -> Result<PathBuf, ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }

    /// Check if stdin is a TTY (interactive terminal)
    pub fn is_interactive() -> bool {
        io::stdin().is_terminal()
    }

    /// Prompt user to create default config at `path` (only in interactive mode)
    pub fn prompt_create_config(path: &Path) -> Result<Option<PathBuf>, ConfigError> {
        if !Self::is_interactive() {
            return Ok(None);
        }

        print!("Configuration file not found. Create default config at {}? [Y/n] ", path.display());
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input.is_empty() || input == "y" || input == "yes" {
            let path = Self::create_default_config_at(path)?;
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }
}
