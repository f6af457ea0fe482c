//! Feed ingestion: Fetch → Parse → Identify → Commit → Cascade.
//!
//! Each cycle builds a brand new story set off to the side. Any page that
//! fails to fetch or parse aborts the cycle before the commit, so readers
//! only ever see the previous complete set or the new complete set.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use feed_client::{parse_page, FeedError, FeedPage, PageRequest, RawEntry};
use newswatch_common::{story_identity, Story, StorySet};

use crate::cascade::{Cascade, CascadeReport};
use crate::story_set::StorySetHandle;
use crate::traits::{DocumentStore, FeedSource};

/// Outcome of one successful cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub pages: u32,
    pub stories: usize,
    pub duplicates_dropped: usize,
    pub cascade: CascadeReport,
}

pub struct IngestionPipeline {
    feed: Arc<dyn FeedSource>,
    store: Arc<dyn DocumentStore>,
    stories: StorySetHandle,
    cascade: Cascade,
    page_count: u32,
    page_size: u32,
}

impl IngestionPipeline {
    pub fn new(
        feed: Arc<dyn FeedSource>,
        store: Arc<dyn DocumentStore>,
        stories: StorySetHandle,
        cascade: Cascade,
        page_count: u32,
        page_size: u32,
    ) -> Self {
        Self {
            feed,
            store,
            stories,
            cascade,
            page_count,
            page_size,
        }
    }

    /// Run one full cycle. An `Err` means nothing was committed.
    pub async fn run_cycle(&self) -> Result<CycleReport, FeedError> {
        info!(pages = self.page_count, page_size = self.page_size, "Ingestion cycle starting");

        // Fetch + Parse
        let pages = self.fetch_all().await?;

        // Identify
        let (stories, duplicates_dropped) = identify(pages);
        let set = Arc::new(StorySet::new(stories, Utc::now()));

        // Commit
        self.stories.replace(set.clone()).await;
        if let Err(e) = self.store.replace_story_set(&set).await {
            warn!(error = %e, "Failed to persist story set; in-memory set is still current");
        }
        info!(stories = set.len(), duplicates_dropped, "Story set committed");

        // Cascade
        let cascade = self.cascade.run(&set).await;

        Ok(CycleReport {
            pages: self.page_count,
            stories: set.len(),
            duplicates_dropped,
            cascade,
        })
    }

    async fn fetch_all(&self) -> Result<Vec<FeedPage>, FeedError> {
        let mut pages = Vec::with_capacity(self.page_count as usize);
        for request in PageRequest::sequence(self.page_count, self.page_size) {
            let body = self.feed.fetch_page_body(request).await.map_err(|e| {
                warn!(page = request.index, error = %e, "Feed page fetch failed, aborting cycle");
                e
            })?;
            let page = parse_page(request.index, &body).map_err(|e| {
                warn!(page = request.index, error = %e, "Feed page malformed, aborting cycle");
                e
            })?;
            pages.push(page);
        }
        Ok(pages)
    }
}

/// Flatten pages into stories in feed order, giving each its identity.
/// Later repeats of a link already seen this cycle are dropped.
fn identify(pages: Vec<FeedPage>) -> (Vec<Story>, usize) {
    let mut seen = HashSet::new();
    let mut stories = Vec::new();
    let mut dropped = 0usize;
    for entry in pages.into_iter().flat_map(|p| p.results) {
        let story = story_from_entry(entry);
        if seen.insert(story.id.clone()) {
            stories.push(story);
        } else {
            dropped += 1;
        }
    }
    (stories, dropped)
}

/// Map a provider entry onto a `Story`. The link is trimmed before hashing
/// so stray whitespace from the provider never changes an identity.
pub fn story_from_entry(entry: RawEntry) -> Story {
    let link = entry.url.trim().to_string();
    Story {
        id: story_identity(&link),
        link,
        image_url: entry.image_url,
        title: entry.title,
        snippet: entry.snippet.unwrap_or_default(),
        source: entry.domain,
        published_at: entry.date,
    }
}
