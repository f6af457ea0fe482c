use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{FeedError, Result};

/// One page window of the provider's result list.
///
/// The provider numbers results from 1, so the first page of ten is
/// `start = 1, length = 10` and the second is `start = 11, length = 10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Zero-based position of this page within the cycle.
    pub index: u32,
    pub start: u32,
    pub length: u32,
}

impl PageRequest {
    /// The fixed sequence of pages fetched by one ingestion cycle.
    pub fn sequence(page_count: u32, page_size: u32) -> Vec<PageRequest> {
        (0..page_count)
            .map(|index| PageRequest {
                index,
                start: index * page_size + 1,
                length: page_size,
            })
            .collect()
    }
}

/// Provider response body for a single page.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedPage {
    pub results: Vec<RawEntry>,
}

/// A single raw result as returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEntry {
    pub url: String,
    #[serde(rename = "iurl", default)]
    pub image_url: Option<String>,
    pub title: String,
    /// Keyword-in-context snippet.
    #[serde(rename = "kwic", default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    /// Publish time in epoch milliseconds.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub date: Option<DateTime<Utc>>,
}

/// Parse one page body. Any structural problem is a `FeedError::Parse`
/// tagged with the page index so the caller can report which page broke.
pub fn parse_page(page: u32, body: &str) -> Result<FeedPage> {
    serde_json::from_str(body).map_err(|e| FeedError::Parse {
        page,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_sequence_is_one_based_and_contiguous() {
        let pages = PageRequest::sequence(3, 10);
        let starts: Vec<u32> = pages.iter().map(|p| p.start).collect();
        assert_eq!(starts, vec![1, 11, 21]);
        assert!(pages.iter().all(|p| p.length == 10));
        assert_eq!(pages[2].index, 2);
    }

    #[test]
    fn parses_provider_fields() {
        let body = r#"{
            "results": [{
                "url": "https://example.com/a",
                "iurl": "https://example.com/a.jpg",
                "title": "Apple Watch launch",
                "kwic": "Apple unveiled...",
                "domain": "example.com",
                "date": 1700000000000
            }]
        }"#;
        let page = parse_page(0, body).unwrap();
        assert_eq!(page.results.len(), 1);
        let entry = &page.results[0];
        assert_eq!(entry.title, "Apple Watch launch");
        assert_eq!(entry.snippet.as_deref(), Some("Apple unveiled..."));
        assert_eq!(entry.domain.as_deref(), Some("example.com"));
        assert_eq!(entry.date.unwrap().timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn optional_fields_may_be_missing() {
        let body = r#"{"results": [{"url": "https://example.com/b", "title": "Banana harvest"}]}"#;
        let page = parse_page(0, body).unwrap();
        assert!(page.results[0].image_url.is_none());
        assert!(page.results[0].date.is_none());
    }

    #[test]
    fn missing_results_array_is_malformed() {
        let err = parse_page(4, r#"{"count": 0}"#).unwrap_err();
        match err {
            FeedError::Parse { page, .. } => assert_eq!(page, 4),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(!parse_page(4, "<html>").unwrap_err().is_transient());
    }
}
