use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

/// Caps applied to user and shared documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_filter_stories: usize,
    pub max_filters: usize,
    pub max_saved_stories: usize,
    pub max_shared_stories: usize,
    pub max_comments: usize,
    pub max_comment_chars: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_filter_stories: 15,
            max_filters: 5,
            max_saved_stories: 30,
            max_shared_stories: 30,
            max_comments: 30,
            max_comment_chars: 250,
        }
    }
}

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Feed provider
    pub feed_api_key: String,
    pub feed_base_url: String,
    pub feed_page_count: u32,
    pub feed_page_size: u32,
    pub feed_min_request_spacing: Duration,

    // Ingestion
    pub ingest_interval: Duration,
    pub ingest_on_start: bool,
    pub max_consecutive_feed_failures: u32,
    pub cascade_page_size: usize,

    // Reaper
    pub reaper_interval: Duration,
    pub shared_story_retention: chrono::Duration,

    pub limits: Limits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_api_key: String::new(),
            feed_base_url: "https://www.faroo.com/api".to_string(),
            feed_page_count: 10,
            feed_page_size: 10,
            feed_min_request_spacing: Duration::from_millis(1500),
            ingest_interval: Duration::from_secs(2 * 60 * 60),
            ingest_on_start: true,
            max_consecutive_feed_failures: 3,
            cascade_page_size: 50,
            reaper_interval: Duration::from_secs(24 * 60 * 60),
            shared_story_retention: chrono::Duration::hours(72),
            limits: Limits::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if a required var is missing or a value
    /// does not parse.
    pub fn from_env() -> Self {
        let d = Self::default();
        let dl = d.limits;
        Self {
            feed_api_key: required_env("FEED_API_KEY"),
            feed_base_url: env::var("FEED_BASE_URL").unwrap_or(d.feed_base_url),
            feed_page_count: parsed_env("FEED_PAGE_COUNT", d.feed_page_count),
            feed_page_size: parsed_env("FEED_PAGE_SIZE", d.feed_page_size),
            feed_min_request_spacing: Duration::from_millis(parsed_env(
                "FEED_MIN_REQUEST_SPACING_MS",
                1500,
            )),
            ingest_interval: Duration::from_secs(nonzero_env("INGEST_INTERVAL_SECS", 7200)),
            ingest_on_start: parsed_env("INGEST_ON_START", d.ingest_on_start),
            max_consecutive_feed_failures: parsed_env(
                "MAX_CONSECUTIVE_FEED_FAILURES",
                d.max_consecutive_feed_failures,
            ),
            cascade_page_size: parsed_env("CASCADE_PAGE_SIZE", d.cascade_page_size),
            reaper_interval: Duration::from_secs(nonzero_env("REAPER_INTERVAL_SECS", 86400)),
            shared_story_retention: chrono::Duration::hours(parsed_env(
                "SHARED_STORY_RETENTION_HOURS",
                72,
            )),
            limits: Limits {
                max_filter_stories: parsed_env("MAX_FILTER_STORIES", dl.max_filter_stories),
                max_filters: parsed_env("MAX_FILTERS", dl.max_filters),
                max_saved_stories: parsed_env("MAX_SAVED_STORIES", dl.max_saved_stories),
                max_shared_stories: parsed_env("MAX_SHARED_STORIES", dl.max_shared_stories),
                max_comments: parsed_env("MAX_COMMENTS", dl.max_comments),
                max_comment_chars: parsed_env("MAX_COMMENT_CHARS", dl.max_comment_chars),
            },
        }
    }

    /// Log the effective configuration without secrets.
    pub fn log_redacted(&self) {
        info!(
            feed_base_url = self.feed_base_url.as_str(),
            feed_api_key = if self.feed_api_key.is_empty() { "<unset>" } else { "<redacted>" },
            pages = self.feed_page_count,
            page_size = self.feed_page_size,
            spacing_ms = self.feed_min_request_spacing.as_millis() as u64,
            ingest_interval_secs = self.ingest_interval.as_secs(),
            ingest_on_start = self.ingest_on_start,
            reaper_interval_secs = self.reaper_interval.as_secs(),
            retention_hours = self.shared_story_retention.num_hours(),
            failure_threshold = self.max_consecutive_feed_failures,
            "Loaded config"
        );
        info!(limits = ?self.limits, "Document limits");
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parsed_env<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{key} has an invalid value: {raw:?}")),
        Err(_) => default,
    }
}

/// Like `parsed_env`, but zero is rejected too. Used for timer periods.
fn nonzero_env(key: &str, default: u64) -> u64 {
    let value = parsed_env(key, default);
    if value == 0 {
        panic!("{key} must be greater than zero");
    }
    value
}
