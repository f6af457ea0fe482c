use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use newswatch_common::StorySet;

use crate::matcher::MatchIndex;
use crate::traits::{DocumentStore, Versioned};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CascadeReport {
    pub profiles_seen: u64,
    pub profiles_updated: u64,
    pub profiles_failed: u64,
    /// The profile listing itself failed part way; later users keep stale matches.
    pub listing_failed: bool,
}

impl fmt::Display for CascadeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seen={} updated={} failed={}{}",
            self.profiles_seen,
            self.profiles_updated,
            self.profiles_failed,
            if self.listing_failed { " (listing failed)" } else { "" }
        )
    }
}

/// Re-matches every user profile against a freshly committed story set.
///
/// Profiles are streamed from the store a page at a time and written back
/// one by one. There is no checkpoint: an interrupted cascade leaves the
/// remaining users on their previous matches until the next cycle.
pub struct Cascade {
    store: Arc<dyn DocumentStore>,
    max_filter_stories: usize,
    page_size: usize,
}

impl Cascade {
    pub fn new(store: Arc<dyn DocumentStore>, max_filter_stories: usize, page_size: usize) -> Self {
        Self {
            store,
            max_filter_stories,
            page_size: page_size.max(1),
        }
    }

    pub async fn run(&self, set: &StorySet) -> CascadeReport {
        let index = MatchIndex::new(&set.stories);
        let mut report = CascadeReport::default();
        let mut cursor: Option<String> = None;

        info!(stories = set.len(), "Cascade starting");
        loop {
            let page = match self.store.list_profiles(cursor.as_deref(), self.page_size).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(error = %e, "Cascade: failed to list profiles, stopping early");
                    report.listing_failed = true;
                    break;
                }
            };

            for Versioned { doc: mut profile, etag } in page.profiles {
                report.profiles_seen += 1;
                profile.filters = index.match_filters(&profile.filters, self.max_filter_stories);
                let profile_id = profile.id.clone();

                match self.store.replace_profile(profile, &etag).await {
                    Ok(_) => {
                        report.profiles_updated += 1;
                        debug!(profile_id = profile_id.as_str(), "Cascade: profile rematched");
                    }
                    Err(e) => {
                        // Most likely a concurrent user edit won the race. Not retried.
                        report.profiles_failed += 1;
                        warn!(profile_id = profile_id.as_str(), error = %e, "Cascade: profile write failed, skipping");
                    }
                }
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(%report, "Cascade complete");
        report
    }
}
