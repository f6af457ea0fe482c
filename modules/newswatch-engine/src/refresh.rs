//! One-way, best-effort path from the request side into the engine.
//!
//! Sending never blocks and never fails loudly: if the engine is gone or its
//! inbox is full the message is dropped, and the user's matches catch up at
//! the next ingestion cascade.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use newswatch_common::{StoreError, UserProfile};

use crate::matcher::match_filters;
use crate::story_set::StorySetHandle;
use crate::traits::{DocumentStore, Versioned};

/// Inbox depth before messages start being dropped.
pub const REFRESH_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub enum RefreshMessage {
    /// Re-run the matcher for this profile, as it was just written.
    RefreshStories(Versioned<UserProfile>),
}

#[derive(Clone)]
pub struct RefreshSender {
    tx: mpsc::Sender<RefreshMessage>,
}

impl RefreshSender {
    /// Fire and forget.
    pub fn refresh_stories(&self, profile: Versioned<UserProfile>) {
        let profile_id = profile.doc.id.clone();
        if let Err(e) = self.tx.try_send(RefreshMessage::RefreshStories(profile)) {
            debug!(profile_id = profile_id.as_str(), error = %e, "RefreshStories dropped");
        }
    }
}

pub struct RefreshReceiver {
    rx: mpsc::Receiver<RefreshMessage>,
}

impl RefreshReceiver {
    pub async fn recv(&mut self) -> Option<RefreshMessage> {
        self.rx.recv().await
    }

    /// Next message if one is already waiting.
    pub fn try_recv(&mut self) -> Option<RefreshMessage> {
        self.rx.try_recv().ok()
    }
}

pub fn channel(capacity: usize) -> (RefreshSender, RefreshReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (RefreshSender { tx }, RefreshReceiver { rx })
}

/// Re-matches a single profile against the current story set and writes it back.
pub struct ProfileRefresher {
    store: Arc<dyn DocumentStore>,
    stories: StorySetHandle,
    max_filter_stories: usize,
}

impl ProfileRefresher {
    pub fn new(store: Arc<dyn DocumentStore>, stories: StorySetHandle, max_filter_stories: usize) -> Self {
        Self {
            store,
            stories,
            max_filter_stories,
        }
    }

    /// Uses the etag the message carried, so a profile that changed again
    /// since comes back as a conflict rather than being overwritten.
    pub async fn refresh(&self, profile: Versioned<UserProfile>) -> Result<Versioned<UserProfile>, StoreError> {
        let set = self.stories.current().await;
        let Versioned { doc: mut profile, etag } = profile;
        profile.filters = match_filters(&profile.filters, &set.stories, self.max_filter_stories);
        self.store.replace_profile(profile, &etag).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::memory_store::MemoryStore;
    use crate::testing::profile_with_filter;

    #[tokio::test]
    async fn send_to_a_stopped_engine_is_silently_dropped() {
        let store = MemoryStore::new();
        let created = store.create_profile(profile_with_filter("u1", &["intel"])).await.unwrap();
        let (sender, receiver) = channel(4);
        drop(receiver);

        tokio::time::timeout(Duration::from_millis(100), async {
            sender.refresh_stories(created.clone());
        })
        .await
        .expect("refresh_stories blocked");

        assert_eq!(store.read_profile("u1").await.unwrap(), created);
        assert_eq!(store.profile_writes(), 0);
    }

    #[tokio::test]
    async fn full_inbox_drops_the_overflow() {
        let store = MemoryStore::new();
        let first = store.create_profile(profile_with_filter("u1", &["a"])).await.unwrap();
        let second = store.create_profile(profile_with_filter("u2", &["b"])).await.unwrap();
        let (sender, mut receiver) = channel(1);

        sender.refresh_stories(first.clone());
        sender.refresh_stories(second);

        let Some(RefreshMessage::RefreshStories(delivered)) = receiver.try_recv() else {
            panic!("first message missing");
        };
        assert_eq!(delivered, first);
        assert!(receiver.try_recv().is_none());
        assert_eq!(store.profile_writes(), 0);
    }
}
