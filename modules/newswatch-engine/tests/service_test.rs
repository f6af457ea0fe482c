//! Request-side operations through the mutation queue.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use newswatch_common::{Commenter, Limits, NewsWatchError, StorySet, UserFilter, UserSettings};
use newswatch_engine::refresh::{self, RefreshMessage, RefreshReceiver};
use newswatch_engine::testing::{story, test_config, MockFeed};
use newswatch_engine::{DocumentStore, Engine, MemoryStore, MutationQueue, NewsWatchService};

fn service_with_limits(limits: Limits) -> (NewsWatchService, Arc<MemoryStore>, RefreshReceiver) {
    let store = Arc::new(MemoryStore::new());
    let (tx, rx) = refresh::channel(16);
    let service = NewsWatchService::new(store.clone(), MutationQueue::spawn(), tx, limits);
    (service, store, rx)
}

fn service() -> (NewsWatchService, Arc<MemoryStore>, RefreshReceiver) {
    service_with_limits(Limits::default())
}

fn ada() -> Commenter {
    Commenter {
        user_id: "u1".into(),
        display_name: "Ada".into(),
    }
}

#[tokio::test]
async fn register_creates_starter_filter_and_requests_refresh() {
    let (service, _store, mut inbox) = service();

    let created = service.register_profile("Ada", "ada@example.com").await.unwrap();

    assert_eq!(created.doc.filters.len(), 1);
    assert_eq!(created.doc.filters[0].name, "Technology Companies");
    assert!(created.doc.saved_stories.is_empty());
    let Some(RefreshMessage::RefreshStories(sent)) = inbox.recv().await else {
        panic!("no refresh message");
    };
    assert_eq!(sent, created);
}

#[tokio::test]
async fn second_registration_with_same_email_is_rejected() {
    let (service, store, mut inbox) = service();
    let first = service.register_profile("Ada", "ada@example.com").await.unwrap();
    inbox.recv().await.unwrap();

    let err = service.register_profile("Ada2", " ada@example.com ").await.unwrap_err();

    assert!(matches!(err, NewsWatchError::EmailAlreadyRegistered(ref email) if email == "ada@example.com"));
    let found = store.find_profile_by_email("ada@example.com").await.unwrap().unwrap();
    assert_eq!(found.doc.id, first.doc.id);
    assert!(inbox.try_recv().is_none(), "rejected registration must not request a refresh");
}

#[tokio::test]
async fn concurrent_registrations_for_one_email_create_one_profile() {
    let (service, store, _inbox) = service();

    let (a, b) = tokio::join!(
        service.register_profile("Ada", "ada@example.com"),
        service.register_profile("Ada2", "ada@example.com"),
    );

    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    let page = store.list_profiles(None, 10).await.unwrap();
    assert_eq!(page.profiles.len(), 1);
}

#[tokio::test]
async fn update_rejects_too_many_filters() {
    let (service, _store, _inbox) = service();
    let created = service.register_profile("Ada", "ada@example.com").await.unwrap();
    let filters = vec![UserFilter::new("f", &["x"]); 6];

    let err = service
        .update_profile(&created.doc.id, UserSettings::default(), filters)
        .await
        .unwrap_err();

    assert!(matches!(err, NewsWatchError::TooManyFilters { max: 5 }));
}

#[tokio::test]
async fn update_trims_keywords_and_clears_matches() {
    let (service, _store, mut inbox) = service();
    let created = service.register_profile("Ada", "ada@example.com").await.unwrap();
    inbox.recv().await.unwrap();
    let mut filter = UserFilter::new("Space", &["  nasa ", "rocket"]);
    filter.matched_stories = vec![story("https://x/1", "stale")];

    let updated = service
        .update_profile(&created.doc.id, UserSettings::default(), vec![filter])
        .await
        .unwrap();

    assert_eq!(updated.doc.filters[0].keywords, vec!["nasa", "rocket"]);
    assert!(updated.doc.filters[0].matched_stories.is_empty());
    let Some(RefreshMessage::RefreshStories(sent)) = inbox.recv().await else {
        panic!("no refresh message");
    };
    assert_eq!(sent.etag, updated.etag);
}

#[tokio::test]
async fn saved_stories_reject_duplicates_and_overflow() {
    let limits = Limits {
        max_saved_stories: 2,
        ..Limits::default()
    };
    let (service, _store, _inbox) = service_with_limits(limits);
    let id = service.register_profile("Ada", "a@example.com").await.unwrap().doc.id;

    service.save_story(&id, story("https://x/1", "One")).await.unwrap();
    let dup = service.save_story(&id, story("https://x/1", "One")).await.unwrap_err();
    assert!(matches!(dup, NewsWatchError::AlreadySaved(_)));

    service.save_story(&id, story("https://x/2", "Two")).await.unwrap();
    let full = service.save_story(&id, story("https://x/3", "Three")).await.unwrap_err();
    assert!(matches!(full, NewsWatchError::SavedStoryLimit { max: 2 }));

    let after = service
        .delete_saved_story(&id, &story("https://x/1", "One").id)
        .await
        .unwrap();
    assert_eq!(after.doc.saved_stories.len(), 1);
    let missing = service.delete_saved_story(&id, "nope").await.unwrap_err();
    assert!(matches!(missing, NewsWatchError::SavedStoryNotFound(_)));
}

#[tokio::test]
async fn share_rejects_duplicates_and_respects_limit() {
    let limits = Limits {
        max_shared_stories: 1,
        ..Limits::default()
    };
    let (service, _store, _inbox) = service_with_limits(limits);

    let shared = service.share_story(&ada(), story("https://x/1", "One")).await.unwrap();
    assert_eq!(shared.doc.comments.len(), 1);
    assert_eq!(shared.doc.comments[0].text, "Ada thought everyone might enjoy this!");

    let over = service.share_story(&ada(), story("https://x/2", "Two")).await.unwrap_err();
    assert!(matches!(over, NewsWatchError::SharedStoryLimit { max: 1 }));
}

#[tokio::test]
async fn sharing_twice_is_already_shared() {
    let (service, _store, _inbox) = service();
    service.share_story(&ada(), story("https://x/1", "One")).await.unwrap();
    let again = service.share_story(&ada(), story("https://x/1", "One")).await.unwrap_err();
    assert!(matches!(again, NewsWatchError::AlreadyShared(_)));
}

#[tokio::test]
async fn comments_are_truncated_and_capped() {
    let limits = Limits {
        max_comments: 3,
        max_comment_chars: 10,
        ..Limits::default()
    };
    let (service, _store, _inbox) = service_with_limits(limits);
    let id = service.share_story(&ada(), story("https://x/1", "One")).await.unwrap().doc.id;

    let after = service.post_comment(&id, &ada(), "ééééééééééééééé").await.unwrap();
    assert_eq!(after.doc.comments[1].text.chars().count(), 10);

    service.post_comment(&id, &ada(), "third").await.unwrap();
    let full = service.post_comment(&id, &ada(), "fourth").await.unwrap_err();
    assert!(matches!(full, NewsWatchError::CommentLimit { max: 3 }));
}

#[tokio::test]
async fn concurrent_comments_all_land_in_order() {
    let (service, store, _inbox) = service();
    let id = service.share_story(&ada(), story("https://x/1", "One")).await.unwrap().doc.id;

    let posts: Vec<_> = (0..5)
        .map(|i| {
            let service = service.clone();
            let id = id.clone();
            async move { service.post_comment(&id, &ada(), &format!("comment {i}")).await }
        })
        .collect();
    for result in futures::future::join_all(posts).await {
        result.unwrap();
    }

    let doc = store.read_shared_story(&id).await.unwrap().doc;
    let texts: Vec<&str> = doc.comments[1..].iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["comment 0", "comment 1", "comment 2", "comment 3", "comment 4"]);
}

#[tokio::test]
async fn delete_operations_surface_not_found() {
    let (service, _store, _inbox) = service();
    let id = service.register_profile("Ada", "a@example.com").await.unwrap().doc.id;

    service.delete_profile(&id).await.unwrap();
    assert!(service.profile(&id).await.unwrap_err().is_not_found());
    assert!(service.delete_shared_story("missing").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn update_is_rematched_by_running_engine() {
    let mut config = test_config();
    config.ingest_on_start = false;
    let store = Arc::new(MemoryStore::new());
    store
        .replace_story_set(&StorySet::new(
            vec![story("https://x/1", "NASA launch"), story("https://x/2", "Apple event")],
            Utc::now(),
        ))
        .await
        .unwrap();
    let engine = Engine::start(&config, Arc::new(MockFeed::new()), store.clone()).await;
    let service = NewsWatchService::new(store.clone(), MutationQueue::spawn(), engine.refresh_sender(), config.limits);

    let id = service.register_profile("Ada", "a@example.com").await.unwrap().doc.id;
    // Let the registration refresh land before editing.
    tokio::time::sleep(Duration::from_millis(50)).await;
    service
        .update_profile(&id, UserSettings::default(), vec![UserFilter::new("Space", &["nasa"])])
        .await
        .unwrap();

    let mut matched = Vec::new();
    for _ in 0..100 {
        let profile = service.profile(&id).await.unwrap().doc;
        matched = profile.filters[0].matched_stories.iter().map(|s| s.link.clone()).collect();
        if !matched.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(matched, vec!["https://x/1".to_string()]);
    engine.stop().await;
}
