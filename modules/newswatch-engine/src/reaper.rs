use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use newswatch_common::{StoreError, SharedStory};

use crate::traits::{DocumentStore, Versioned};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReapStats {
    pub examined: u64,
    pub deleted: u64,
    /// Expired but already removed by someone else.
    pub already_gone: u64,
    /// Expired but the delete failed; still a candidate next sweep.
    pub failed: u64,
}

impl fmt::Display for ReapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "examined={} deleted={} already_gone={} failed={}",
            self.examined, self.deleted, self.already_gone, self.failed
        )
    }
}

/// Deletes shared stories whose creation marker is older than the retention window.
pub struct Reaper {
    store: Arc<dyn DocumentStore>,
    retention: Duration,
}

impl Reaper {
    pub fn new(store: Arc<dyn DocumentStore>, retention: Duration) -> Self {
        Self { store, retention }
    }

    /// Sweep once as of `now`. Only a failure to list aborts the sweep;
    /// individual delete failures are logged and left for the next one.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<ReapStats, StoreError> {
        let shared = self.store.list_shared_stories().await?;
        let mut stats = ReapStats::default();

        for Versioned { doc, .. } in &shared {
            stats.examined += 1;
            if !self.is_expired(doc, now) {
                continue;
            }
            match self.store.delete_shared_story(&doc.id).await {
                Ok(()) => {
                    stats.deleted += 1;
                    debug!(story_id = doc.id.as_str(), "Reaper: deleted stale shared story");
                }
                Err(StoreError::NotFound { .. }) => {
                    stats.already_gone += 1;
                    debug!(story_id = doc.id.as_str(), "Reaper: shared story already deleted");
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(story_id = doc.id.as_str(), error = %e, "Reaper: delete failed, will retry next sweep");
                }
            }
        }

        info!(%stats, "Stale shared story sweep complete");
        Ok(stats)
    }

    fn is_expired(&self, story: &SharedStory, now: DateTime<Utc>) -> bool {
        if story.created_at().is_none() {
            warn!(story_id = story.id.as_str(), "Reaper: shared story has no comments, cannot age it");
            return false;
        }
        story.is_expired(now, self.retention)
    }
}
