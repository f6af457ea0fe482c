// Test support for the engine.
//
// - MockFeed (FeedSource): scripted per-page responses plus a call log
// - feed_body / entry_json: provider-shaped JSON page bodies
// - story / profile_with_filter / test_config: fixtures
//
// MemoryStore lives in its own module since the binary also uses it.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;

use feed_client::{FeedError, PageRequest};
use newswatch_common::{story_identity, Config, Story, UserFilter, UserProfile};

use crate::traits::FeedSource;

// ---------------------------------------------------------------------------
// MockFeed
// ---------------------------------------------------------------------------

/// What the mock returns for one page.
#[derive(Debug, Clone)]
pub enum PageScript {
    Body(String),
    Network(String),
    Status(u16),
    /// Panic inside the fetch, as a bug in the source would.
    Panic,
}

impl PageScript {
    fn to_result(&self) -> Result<String, FeedError> {
        match self {
            PageScript::Body(body) => Ok(body.clone()),
            PageScript::Network(msg) => Err(FeedError::Network(msg.clone())),
            PageScript::Status(status) => Err(FeedError::Api {
                status: *status,
                message: "scripted failure".into(),
            }),
            PageScript::Panic => panic!("scripted feed panic"),
        }
    }
}

/// Page-index keyed responses. Unscripted pages return an empty result list.
/// Scripts can be changed between cycles with `set_page` / `set_all`.
pub struct MockFeed {
    pages: Mutex<HashMap<u32, PageScript>>,
    fallback: Mutex<Option<PageScript>>,
    calls: Mutex<Vec<PageRequest>>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            fallback: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on_page(self, index: u32, script: PageScript) -> Self {
        self.set_page(index, script);
        self
    }

    pub fn set_page(&self, index: u32, script: PageScript) {
        self.pages.lock().unwrap().insert(index, script);
    }

    /// Answer every page with `script`, overriding per-page scripts.
    pub fn set_all(&self, script: Option<PageScript>) {
        *self.fallback.lock().unwrap() = script;
    }

    pub fn calls(&self) -> Vec<PageRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedSource for MockFeed {
    async fn fetch_page_body(&self, page: PageRequest) -> Result<String, FeedError> {
        self.calls.lock().unwrap().push(page);
        // Locks are released before running the script so a panic cannot poison them.
        let fallback = self.fallback.lock().unwrap().clone();
        let script = fallback.or_else(|| self.pages.lock().unwrap().get(&page.index).cloned());
        match script {
            Some(script) => script.to_result(),
            None => Ok(feed_body(&[])),
        }
    }
}

// ---------------------------------------------------------------------------
// Provider JSON
// ---------------------------------------------------------------------------

/// A provider result entry for `(link, title)`.
pub fn entry_json(link: &str, title: &str) -> serde_json::Value {
    json!({
        "url": link,
        "iurl": format!("{link}/thumb.jpg"),
        "title": title,
        "kwic": format!("{title} snippet"),
        "domain": "news.example",
        "date": 1_700_000_000_000i64,
    })
}

/// A page body with one entry per `(link, title)`.
pub fn feed_body(entries: &[(&str, &str)]) -> String {
    let results: Vec<serde_json::Value> = entries
        .iter()
        .map(|(link, title)| entry_json(link, title))
        .collect();
    json!({ "results": results }).to_string()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn story(link: &str, title: &str) -> Story {
    Story {
        id: story_identity(link),
        link: link.to_string(),
        image_url: None,
        title: title.to_string(),
        snippet: String::new(),
        source: None,
        published_at: None,
    }
}

pub fn profile_with_filter(id: &str, keywords: &[&str]) -> UserProfile {
    let mut profile = UserProfile::new(id, &format!("{id}@example.com"), Utc::now());
    profile.id = id.to_string();
    profile.filters = vec![UserFilter::new("Test", keywords)];
    profile
}

pub fn hours_ago(hours: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::hours(hours)
}

/// Small pages, no startup delay and intervals long enough that only the
/// first tick fires during a test.
pub fn test_config() -> Config {
    Config {
        feed_api_key: "test-key".into(),
        feed_page_count: 3,
        feed_page_size: 10,
        feed_min_request_spacing: Duration::ZERO,
        ingest_interval: Duration::from_secs(3600),
        ingest_on_start: true,
        reaper_interval: Duration::from_secs(3600),
        ..Config::default()
    }
}
