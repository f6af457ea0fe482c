//! In-process `DocumentStore`.
//!
//! Behaves like the real store where the engine cares: whole-document
//! replace guarded by an etag, `NotFound`/`AlreadyExists` on the obvious
//! cases, and a stable key order for cursor paging. Also carries a few
//! failure-injection hooks for tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use newswatch_common::{SharedStory, StoreError, StorySet, UserProfile};

use crate::traits::{DocumentStore, ProfilePage, Versioned};

#[derive(Default)]
struct Inner {
    profiles: BTreeMap<String, Versioned<UserProfile>>,
    shared: BTreeMap<String, Versioned<SharedStory>>,
    story_set: Option<StorySet>,
    next_etag: u64,
    profile_writes: u64,
    story_set_writes: u64,
    failing_profile_writes: HashSet<String>,
    failing_shared_deletes: HashSet<String>,
    fail_listing: bool,
}

impl Inner {
    fn etag(&mut self) -> String {
        self.next_etag += 1;
        format!("\"{:08x}\"", self.next_etag)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Poisoning is ignored; every write is a single map insert or remove.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every replace of this profile fail with a backend error.
    pub fn fail_profile_writes(&self, id: &str) {
        self.lock().failing_profile_writes.insert(id.to_string());
    }

    /// Make every delete of this shared story fail with a backend error.
    pub fn fail_shared_deletes(&self, id: &str) {
        self.lock().failing_shared_deletes.insert(id.to_string());
    }

    /// Make profile and shared-story listings fail.
    pub fn fail_listing(&self, fail: bool) {
        self.lock().fail_listing = fail;
    }

    /// Number of successful profile replaces so far.
    pub fn profile_writes(&self) -> u64 {
        self.lock().profile_writes
    }

    /// Number of successful story set replaces so far.
    pub fn story_set_writes(&self) -> u64 {
        self.lock().story_set_writes
    }

    pub fn shared_story_ids(&self) -> Vec<String> {
        self.lock().shared.keys().cloned().collect()
    }

    /// Insert a shared story as-is, bypassing create checks. For seeding.
    pub fn put_shared_story(&self, story: SharedStory) -> Versioned<SharedStory> {
        let mut inner = self.lock();
        let etag = inner.etag();
        let versioned = Versioned { doc: story, etag };
        inner.shared.insert(versioned.doc.id.clone(), versioned.clone());
        versioned
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_profile(&self, profile: UserProfile) -> Result<Versioned<UserProfile>, StoreError> {
        let mut inner = self.lock();
        if inner.profiles.contains_key(&profile.id) {
            return Err(StoreError::AlreadyExists { key: profile.id });
        }
        let etag = inner.etag();
        let versioned = Versioned { doc: profile, etag };
        inner.profiles.insert(versioned.doc.id.clone(), versioned.clone());
        Ok(versioned)
    }

    async fn read_profile(&self, id: &str) -> Result<Versioned<UserProfile>, StoreError> {
        self.lock()
            .profiles
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { key: id.to_string() })
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Versioned<UserProfile>>, StoreError> {
        Ok(self
            .lock()
            .profiles
            .values()
            .find(|p| p.doc.email == email)
            .cloned())
    }

    async fn replace_profile(
        &self,
        profile: UserProfile,
        etag: &str,
    ) -> Result<Versioned<UserProfile>, StoreError> {
        let mut inner = self.lock();
        if inner.failing_profile_writes.contains(&profile.id) {
            return Err(StoreError::Backend(format!("injected write failure for {}", profile.id)));
        }
        match inner.profiles.get(&profile.id) {
            None => return Err(StoreError::NotFound { key: profile.id }),
            Some(current) if current.etag != etag => {
                return Err(StoreError::Conflict { key: profile.id })
            }
            Some(_) => {}
        }
        let etag = inner.etag();
        let versioned = Versioned { doc: profile, etag };
        inner.profiles.insert(versioned.doc.id.clone(), versioned.clone());
        inner.profile_writes += 1;
        Ok(versioned)
    }

    async fn delete_profile(&self, id: &str) -> Result<(), StoreError> {
        self.lock()
            .profiles
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound { key: id.to_string() })
    }

    async fn list_profiles(&self, cursor: Option<&str>, limit: usize) -> Result<ProfilePage, StoreError> {
        let inner = self.lock();
        if inner.fail_listing {
            return Err(StoreError::Backend("injected listing failure".into()));
        }
        let mut remaining = inner
            .profiles
            .iter()
            .filter(|(id, _)| cursor.map_or(true, |c| id.as_str() > c));
        let profiles: Vec<Versioned<UserProfile>> = remaining
            .by_ref()
            .take(limit.max(1))
            .map(|(_, p)| p.clone())
            .collect();
        let next_cursor = match remaining.next() {
            Some(_) => profiles.last().map(|p| p.doc.id.clone()),
            None => None,
        };
        Ok(ProfilePage {
            profiles,
            next_cursor,
        })
    }

    async fn create_shared_story(&self, story: SharedStory) -> Result<Versioned<SharedStory>, StoreError> {
        let mut inner = self.lock();
        if inner.shared.contains_key(&story.id) {
            return Err(StoreError::AlreadyExists { key: story.id });
        }
        let etag = inner.etag();
        let versioned = Versioned { doc: story, etag };
        inner.shared.insert(versioned.doc.id.clone(), versioned.clone());
        Ok(versioned)
    }

    async fn read_shared_story(&self, id: &str) -> Result<Versioned<SharedStory>, StoreError> {
        self.lock()
            .shared
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { key: id.to_string() })
    }

    async fn replace_shared_story(
        &self,
        story: SharedStory,
        etag: &str,
    ) -> Result<Versioned<SharedStory>, StoreError> {
        let mut inner = self.lock();
        match inner.shared.get(&story.id) {
            None => return Err(StoreError::NotFound { key: story.id }),
            Some(current) if current.etag != etag => {
                return Err(StoreError::Conflict { key: story.id })
            }
            Some(_) => {}
        }
        let etag = inner.etag();
        let versioned = Versioned { doc: story, etag };
        inner.shared.insert(versioned.doc.id.clone(), versioned.clone());
        Ok(versioned)
    }

    async fn delete_shared_story(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.failing_shared_deletes.contains(id) {
            return Err(StoreError::Backend(format!("injected delete failure for {id}")));
        }
        inner
            .shared
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound { key: id.to_string() })
    }

    async fn list_shared_stories(&self) -> Result<Vec<Versioned<SharedStory>>, StoreError> {
        let inner = self.lock();
        if inner.fail_listing {
            return Err(StoreError::Backend("injected listing failure".into()));
        }
        Ok(inner.shared.values().cloned().collect())
    }

    async fn count_shared_stories(&self) -> Result<usize, StoreError> {
        Ok(self.lock().shared.len())
    }

    async fn read_story_set(&self) -> Result<Option<StorySet>, StoreError> {
        Ok(self.lock().story_set.clone())
    }

    async fn replace_story_set(&self, set: &StorySet) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.story_set = Some(set.clone());
        inner.story_set_writes += 1;
        Ok(())
    }
}
