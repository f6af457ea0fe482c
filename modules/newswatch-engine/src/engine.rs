use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use newswatch_common::{Config, StorySet};

use crate::cascade::Cascade;
use crate::ingestion::IngestionPipeline;
use crate::reaper::Reaper;
use crate::refresh::{self, ProfileRefresher, RefreshSender, REFRESH_CHANNEL_CAPACITY};
use crate::scheduler::{EngineHealth, ScheduleSettings, Scheduler};
use crate::story_set::StorySetHandle;
use crate::traits::{DocumentStore, FeedSource};

/// A running background engine: story set, scheduler and refresh inbox.
pub struct Engine {
    stories: StorySetHandle,
    refresh: RefreshSender,
    scheduler: Scheduler,
}

impl Engine {
    /// Load the last persisted story set and start every background activity.
    pub async fn start(config: &Config, feed: Arc<dyn FeedSource>, store: Arc<dyn DocumentStore>) -> Self {
        let initial = match store.read_story_set().await {
            Ok(Some(set)) => {
                info!(stories = set.len(), refreshed_at = %set.refreshed_at, "Loaded persisted story set");
                set
            }
            Ok(None) => {
                info!("No persisted story set, starting empty");
                StorySet::empty()
            }
            Err(e) => {
                warn!(error = %e, "Failed to load persisted story set, starting empty");
                StorySet::empty()
            }
        };
        let stories = StorySetHandle::new(initial);
        let max_filter_stories = config.limits.max_filter_stories;

        let cascade = Cascade::new(store.clone(), max_filter_stories, config.cascade_page_size);
        let pipeline = Arc::new(IngestionPipeline::new(
            feed,
            store.clone(),
            stories.clone(),
            cascade,
            config.feed_page_count,
            config.feed_page_size,
        ));
        let reaper = Arc::new(Reaper::new(store.clone(), config.shared_story_retention));
        let refresher = Arc::new(ProfileRefresher::new(store, stories.clone(), max_filter_stories));
        let (refresh, refresh_rx) = refresh::channel(REFRESH_CHANNEL_CAPACITY);

        let scheduler = Scheduler::start(
            ScheduleSettings::from_config(config),
            pipeline,
            reaper,
            refresher,
            refresh_rx,
        );

        Self {
            stories,
            refresh,
            scheduler,
        }
    }

    /// Handle for the request side to post RefreshStories messages.
    pub fn refresh_sender(&self) -> RefreshSender {
        self.refresh.clone()
    }

    pub fn health(&self) -> watch::Receiver<EngineHealth> {
        self.scheduler.health()
    }

    /// Shared view of the current story set.
    pub fn stories(&self) -> StorySetHandle {
        self.stories.clone()
    }

    pub async fn stop(self) {
        self.scheduler.stop().await;
    }
}
