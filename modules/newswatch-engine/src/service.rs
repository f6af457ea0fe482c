//! Request-side operations on profiles and shared stories.
//!
//! Every write is a read-modify-write pushed through the `MutationQueue`, so
//! writes from concurrent requests are applied one at a time in arrival order.
//! Reads go straight to the store.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use newswatch_common::{
    Comment, Commenter, Limits, NewsWatchError, SharedStory, Story, StoreError, UserFilter,
    UserProfile, UserSettings,
};

use crate::mutation_queue::MutationQueue;
use crate::refresh::RefreshSender;
use crate::traits::{DocumentStore, Versioned};

type Result<T> = std::result::Result<T, NewsWatchError>;

#[derive(Clone)]
pub struct NewsWatchService {
    store: Arc<dyn DocumentStore>,
    queue: MutationQueue,
    refresh: RefreshSender,
    limits: Limits,
}

impl NewsWatchService {
    pub fn new(store: Arc<dyn DocumentStore>, queue: MutationQueue, refresh: RefreshSender, limits: Limits) -> Self {
        Self {
            store,
            queue,
            refresh,
            limits,
        }
    }

    // --- Profiles ---

    pub async fn profile(&self, user_id: &str) -> Result<Versioned<UserProfile>> {
        Ok(self.store.read_profile(user_id).await?)
    }

    /// Create a profile with the starter filter and ask the engine to fill it.
    /// An email can only be registered once.
    pub async fn register_profile(&self, display_name: &str, email: &str) -> Result<Versioned<UserProfile>> {
        let store = self.store.clone();
        let profile = UserProfile::new(display_name.trim(), email.trim(), Utc::now());
        let created = self
            .queue
            .enqueue("register_profile", move || async move {
                // Checked inside the task so two racing registrations see each other.
                if store.find_profile_by_email(&profile.email).await?.is_some() {
                    return Err(NewsWatchError::EmailAlreadyRegistered(profile.email));
                }
                Ok(store.create_profile(profile).await?)
            })
            .await?;

        info!(user_id = created.doc.id.as_str(), "Profile registered");
        self.refresh.refresh_stories(created.clone());
        Ok(created)
    }

    /// Replace settings and filters. Matched stories are cleared here and
    /// recomputed by the engine after the write lands.
    pub async fn update_profile(
        &self,
        user_id: &str,
        settings: UserSettings,
        filters: Vec<UserFilter>,
    ) -> Result<Versioned<UserProfile>> {
        let max = self.limits.max_filters;
        if filters.len() > max {
            return Err(NewsWatchError::TooManyFilters { max });
        }
        let filters: Vec<UserFilter> = filters
            .into_iter()
            .map(|f| UserFilter {
                keywords: f.keywords.iter().map(|k| k.trim().to_string()).collect(),
                matched_stories: Vec::new(),
                ..f
            })
            .collect();

        let store = self.store.clone();
        let id = user_id.to_string();
        let replaced = self
            .queue
            .enqueue("update_profile", move || async move {
                let Versioned { doc: mut profile, etag } = store.read_profile(&id).await?;
                profile.settings = settings;
                profile.filters = filters;
                Ok(store.replace_profile(profile, &etag).await?)
            })
            .await?;

        self.refresh.refresh_stories(replaced.clone());
        Ok(replaced)
    }

    pub async fn delete_profile(&self, user_id: &str) -> Result<()> {
        let store = self.store.clone();
        let id = user_id.to_string();
        self.queue
            .enqueue("delete_profile", move || async move {
                Ok(store.delete_profile(&id).await?)
            })
            .await?;
        info!(user_id, "Profile deleted");
        Ok(())
    }

    // --- Saved stories ---

    pub async fn save_story(&self, user_id: &str, story: Story) -> Result<Versioned<UserProfile>> {
        let store = self.store.clone();
        let id = user_id.to_string();
        let max = self.limits.max_saved_stories;
        self.queue
            .enqueue("save_story", move || async move {
                let Versioned { doc: mut profile, etag } = store.read_profile(&id).await?;
                if profile.saved_stories.len() >= max {
                    return Err(NewsWatchError::SavedStoryLimit { max });
                }
                if profile.saved_stories.iter().any(|s| s.id == story.id) {
                    return Err(NewsWatchError::AlreadySaved(story.id));
                }
                profile.saved_stories.push(story);
                Ok(store.replace_profile(profile, &etag).await?)
            })
            .await
    }

    pub async fn delete_saved_story(&self, user_id: &str, story_id: &str) -> Result<Versioned<UserProfile>> {
        let store = self.store.clone();
        let id = user_id.to_string();
        let story_id = story_id.to_string();
        self.queue
            .enqueue("delete_saved_story", move || async move {
                let Versioned { doc: mut profile, etag } = store.read_profile(&id).await?;
                let Some(pos) = profile.saved_stories.iter().position(|s| s.id == story_id) else {
                    return Err(NewsWatchError::SavedStoryNotFound(story_id));
                };
                profile.saved_stories.remove(pos);
                Ok(store.replace_profile(profile, &etag).await?)
            })
            .await
    }

    // --- Shared stories ---

    pub async fn shared_stories(&self) -> Result<Vec<Versioned<SharedStory>>> {
        Ok(self.store.list_shared_stories().await?)
    }

    pub async fn share_story(&self, sharer: &Commenter, story: Story) -> Result<Versioned<SharedStory>> {
        let store = self.store.clone();
        let max = self.limits.max_shared_stories;
        let shared = SharedStory::new(story, sharer, Utc::now());
        let created = self
            .queue
            .enqueue("share_story", move || async move {
                if store.count_shared_stories().await? >= max {
                    return Err(NewsWatchError::SharedStoryLimit { max });
                }
                let existing = store.read_shared_story(&shared.id).await;
                match existing {
                    Ok(_) => return Err(NewsWatchError::AlreadyShared(shared.id)),
                    Err(StoreError::NotFound { .. }) => {}
                    Err(e) => return Err(e.into()),
                }
                let id = shared.id.clone();
                store.create_shared_story(shared).await.map_err(|e| match e {
                    StoreError::AlreadyExists { .. } => NewsWatchError::AlreadyShared(id),
                    other => other.into(),
                })
            })
            .await?;

        info!(
            story_id = created.doc.id.as_str(),
            user_id = sharer.user_id.as_str(),
            "Story shared"
        );
        Ok(created)
    }

    /// Append a comment. Over-long text is truncated, not rejected.
    pub async fn post_comment(&self, story_id: &str, author: &Commenter, text: &str) -> Result<Versioned<SharedStory>> {
        let store = self.store.clone();
        let id = story_id.to_string();
        let max = self.limits.max_comments;
        let comment = Comment {
            user_id: author.user_id.clone(),
            display_name: author.display_name.clone(),
            posted_at: Utc::now(),
            text: text.chars().take(self.limits.max_comment_chars).collect(),
        };
        self.queue
            .enqueue("post_comment", move || async move {
                let Versioned { doc: mut shared, etag } = store.read_shared_story(&id).await?;
                if shared.comments.len() >= max {
                    return Err(NewsWatchError::CommentLimit { max });
                }
                shared.comments.push(comment);
                Ok(store.replace_shared_story(shared, &etag).await?)
            })
            .await
    }

    pub async fn delete_shared_story(&self, story_id: &str) -> Result<()> {
        let store = self.store.clone();
        let id = story_id.to_string();
        self.queue
            .enqueue("delete_shared_story", move || async move {
                Ok(store.delete_shared_story(&id).await?)
            })
            .await
    }
}
