//! Cascade over many profiles, with write and listing failures.

use std::sync::Arc;

use chrono::Utc;
use newswatch_common::StorySet;
use newswatch_engine::cascade::Cascade;
use newswatch_engine::testing::{profile_with_filter, story};
use newswatch_engine::{DocumentStore, MemoryStore};

fn set() -> StorySet {
    StorySet::new(
        vec![
            story("https://x/1", "Apple earnings"),
            story("https://x/2", "Google and Apple"),
            story("https://x/3", "Weather"),
        ],
        Utc::now(),
    )
}

async fn seed(store: &MemoryStore, count: usize) {
    for i in 0..count {
        store
            .create_profile(profile_with_filter(&format!("user-{i:03}"), &["apple"]))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn pages_through_every_profile() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, 7).await;

    let report = Cascade::new(store.clone(), 15, 3).run(&set()).await;

    assert_eq!(report.profiles_seen, 7);
    assert_eq!(report.profiles_updated, 7);
    assert!(!report.listing_failed);
    for i in 0..7 {
        let profile = store.read_profile(&format!("user-{i:03}")).await.unwrap().doc;
        assert_eq!(profile.filters[0].matched_stories.len(), 2);
    }
}

#[tokio::test]
async fn failed_write_is_skipped_and_others_continue() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, 4).await;
    store.fail_profile_writes("user-001");

    let report = Cascade::new(store.clone(), 15, 2).run(&set()).await;

    assert_eq!(report.profiles_seen, 4);
    assert_eq!(report.profiles_updated, 3);
    assert_eq!(report.profiles_failed, 1);
    let skipped = store.read_profile("user-001").await.unwrap().doc;
    assert!(skipped.filters[0].matched_stories.is_empty());
    let after = store.read_profile("user-002").await.unwrap().doc;
    assert_eq!(after.filters[0].matched_stories.len(), 2);
}

#[tokio::test]
async fn listing_failure_stops_cascade() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, 2).await;
    store.fail_listing(true);

    let report = Cascade::new(store.clone(), 15, 10).run(&set()).await;

    assert!(report.listing_failed);
    assert_eq!(report.profiles_seen, 0);
    assert_eq!(store.profile_writes(), 0);
}

#[tokio::test]
async fn cap_applies_per_filter() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, 1).await;

    Cascade::new(store.clone(), 1, 10).run(&set()).await;

    let profile = store.read_profile("user-000").await.unwrap().doc;
    let links: Vec<&str> = profile.filters[0].matched_stories.iter().map(|s| s.link.as_str()).collect();
    assert_eq!(links, vec!["https://x/1"]);
}
