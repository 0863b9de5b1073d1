//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{LABEL_DELIMITER, MessageId, PreviewSelectors};

/// Environment variable overriding `feed.channel`.
pub const ENV_CHANNEL: &str = "CHANNEL_USERNAME";
/// Environment variable overriding `feed.first_run_floor`.
pub const ENV_FIRST_RUN_FLOOR: &str = "FIRST_RUN_START_MESSAGE_ID";
/// Environment variable overriding `paths.state_file`.
pub const ENV_STATE_FILE: &str = "STATE_FILE";
/// Environment variable overriding `paths.records_file`.
pub const ENV_RECORDS_FILE: &str = "CSV_FILE";
/// Environment variable overriding `feed.base_url`.
pub const ENV_FEED_BASE_URL: &str = "FEED_BASE_URL";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Feed identity and retrieval settings
    #[serde(default)]
    pub feed: FeedConfig,

    /// Durable state locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Link and code extraction rules
    #[serde(default)]
    pub extract: ExtractConfig,

    /// Pattern rules applied to every message
    #[serde(default = "defaults::patterns")]
    pub patterns: Vec<PatternRule>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    ///
    /// A missing file is not worth a warning; the defaults are documented.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("No config file at {:?}, using defaults", path);
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            log::warn!("Config load failed from {:?}: {}. Using defaults.", path, e);
            Self::default()
        })
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_env(|name| std::env::var(name).ok());
        self
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Empty values are ignored. An unparseable floor keeps the current value.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(channel) = get(ENV_CHANNEL) {
            self.feed.channel = channel;
        }
        if let Some(floor) = get(ENV_FIRST_RUN_FLOOR) {
            match floor.parse::<MessageId>() {
                Ok(floor) => self.feed.first_run_floor = floor,
                Err(_) => log::warn!(
                    "Ignoring {}={:?}: not an integer",
                    ENV_FIRST_RUN_FLOOR,
                    floor
                ),
            }
        }
        if let Some(path) = get(ENV_STATE_FILE) {
            self.paths.state_file = PathBuf::from(path);
        }
        if let Some(path) = get(ENV_RECORDS_FILE) {
            self.paths.records_file = PathBuf::from(path);
        }
        if let Some(url) = get(ENV_FEED_BASE_URL) {
            self.feed.base_url = url;
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let channel = self.feed.channel.trim();
        if channel.is_empty() {
            return Err(AppError::config(format!(
                "feed.channel is empty (set it in the config file or {ENV_CHANNEL})"
            )));
        }
        if channel.contains('/') || channel.chars().any(char::is_whitespace) {
            return Err(AppError::validation(format!(
                "feed.channel {channel:?} must be a bare channel name"
            )));
        }
        url::Url::parse(&self.feed.base_url)
            .map_err(|e| AppError::validation(format!("feed.base_url: {e}")))?;
        url::Url::parse(&self.feed.permalink_base)
            .map_err(|e| AppError::validation(format!("feed.permalink_base: {e}")))?;
        if self.feed.timeout_secs == 0 {
            return Err(AppError::validation("feed.timeout_secs must be > 0"));
        }
        if self.paths.state_file.as_os_str().is_empty() {
            return Err(AppError::validation("paths.state_file is empty"));
        }
        if self.paths.records_file.as_os_str().is_empty() {
            return Err(AppError::validation("paths.records_file is empty"));
        }
        if self.extract.domain.trim().is_empty() {
            return Err(AppError::validation("extract.domain is empty"));
        }
        if self.extract.code_params.iter().all(|p| p.trim().is_empty()) {
            return Err(AppError::validation("extract.code_params is empty"));
        }
        if self.patterns.is_empty() {
            return Err(AppError::validation("No patterns defined"));
        }
        for rule in &self.patterns {
            if rule.label.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "Pattern {:?} has an empty label",
                    rule.regex
                )));
            }
            if rule.label.contains(LABEL_DELIMITER) {
                return Err(AppError::validation(format!(
                    "Pattern label {:?} must not contain '{}'",
                    rule.label, LABEL_DELIMITER
                )));
            }
            rule.compile()?;
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed: FeedConfig::default(),
            paths: PathsConfig::default(),
            extract: ExtractConfig::default(),
            patterns: defaults::patterns(),
        }
    }
}

/// Feed identity and HTTP retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Channel username; also the cursor key
    #[serde(default = "defaults::channel")]
    pub channel: String,

    /// Cursor used when no state exists yet
    #[serde(default = "defaults::first_run_floor")]
    pub first_run_floor: MessageId,

    /// Base URL of the public web preview
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Base URL used to build message permalinks
    #[serde(default = "defaults::permalink_base")]
    pub permalink_base: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between page requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Selectors for the preview page markup
    #[serde(default)]
    pub selectors: PreviewSelectors,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            channel: defaults::channel(),
            first_run_floor: defaults::first_run_floor(),
            base_url: defaults::base_url(),
            permalink_base: defaults::permalink_base(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            selectors: PreviewSelectors::default(),
        }
    }
}

/// Locations of the cursor and record files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::state_file")]
    pub state_file: PathBuf,

    #[serde(default = "defaults::records_file")]
    pub records_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_file: defaults::state_file(),
            records_file: defaults::records_file(),
        }
    }
}

/// Link and code extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Domain whose links are collected (subdomain `www.` is accepted)
    #[serde(default = "defaults::domain")]
    pub domain: String,

    /// Query parameter names holding codes, compared case-insensitively
    #[serde(default = "defaults::code_params")]
    pub code_params: Vec<String>,

    /// Snippet length bound in characters
    #[serde(default = "defaults::snippet_max_chars")]
    pub snippet_max_chars: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            domain: defaults::domain(),
            code_params: defaults::code_params(),
            snippet_max_chars: defaults::snippet_max_chars(),
        }
    }
}

/// A (regex, label) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatternRule {
    /// Regular expression searched anywhere in the text
    pub regex: String,

    /// Label recorded when the expression matches
    pub label: String,
}

impl PatternRule {
    pub fn new(regex: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            regex: regex.into(),
            label: label.into(),
        }
    }

    /// Compile the expression case-insensitively.
    pub fn compile(&self) -> Result<Regex> {
        Ok(RegexBuilder::new(&self.regex)
            .case_insensitive(true)
            .build()?)
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::PatternRule;
    use crate::models::MessageId;

    // Feed defaults
    pub fn channel() -> String {
        "Udemy_Free_Courses4".into()
    }
    pub fn first_run_floor() -> MessageId {
        231_689
    }
    pub fn base_url() -> String {
        "https://t.me/s".into()
    }
    pub fn permalink_base() -> String {
        "https://t.me".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; feed-scanner/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        500
    }

    // Path defaults
    pub fn state_file() -> PathBuf {
        PathBuf::from("state.json")
    }
    pub fn records_file() -> PathBuf {
        PathBuf::from("findings.csv")
    }

    // Extraction defaults
    pub fn domain() -> String {
        "udemy.com".into()
    }
    pub fn code_params() -> Vec<String> {
        vec!["couponCode".into()]
    }
    pub fn snippet_max_chars() -> usize {
        500
    }

    // Certification codes, with optional hyphen or space separators
    pub fn patterns() -> Vec<PatternRule> {
        vec![
            PatternRule::new(r"\bAZ[-\s]?104\b", "AZ-104"),
            PatternRule::new(r"\bSC[-\s]?200\b", "SC-200"),
            PatternRule::new(r"\bCCNA\b", "CCNA"),
            PatternRule::new(r"\b200[-\s]?301\b", "200-301"),
            PatternRule::new(r"CompTIA\s*Security\+", "CompTIA Security+"),
            PatternRule::new(r"\bSY0[-\s]?701\b", "SY0-701"),
        ]
    }
}
