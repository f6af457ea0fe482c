// Trait boundaries for the engine's two external collaborators.
//
// FeedSource: raw page bodies from the news provider. Parsing stays in the
//   pipeline so a malformed page is handled the same way for every source.
// DocumentStore: key-addressed documents with optimistic concurrency.
//
// Both are object-safe and shared as Arc<dyn _>; tests swap in MockFeed and
// MemoryStore.

use async_trait::async_trait;

use feed_client::{FeedClient, FeedError, PageRequest};
use newswatch_common::{SharedStory, StoreError, StorySet, UserProfile};

// ---------------------------------------------------------------------------
// FeedSource
// ---------------------------------------------------------------------------

#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the unparsed body of one page.
    async fn fetch_page_body(&self, page: PageRequest) -> Result<String, FeedError>;
}

#[async_trait]
impl FeedSource for FeedClient {
    async fn fetch_page_body(&self, page: PageRequest) -> Result<String, FeedError> {
        FeedClient::fetch_page_body(self, page).await
    }
}

// ---------------------------------------------------------------------------
// DocumentStore
// ---------------------------------------------------------------------------

/// A document together with the version tag it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub doc: T,
    pub etag: String,
}

/// One page of a profile listing. `next_cursor` is `None` on the last page.
#[derive(Debug, Clone)]
pub struct ProfilePage {
    pub profiles: Vec<Versioned<UserProfile>>,
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    // --- User profiles ---

    async fn create_profile(&self, profile: UserProfile) -> Result<Versioned<UserProfile>, StoreError>;

    async fn read_profile(&self, id: &str) -> Result<Versioned<UserProfile>, StoreError>;

    /// Exact match on the stored email.
    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Versioned<UserProfile>>, StoreError>;

    /// Replace the whole document. Fails with `Conflict` if `etag` is stale.
    async fn replace_profile(
        &self,
        profile: UserProfile,
        etag: &str,
    ) -> Result<Versioned<UserProfile>, StoreError>;

    async fn delete_profile(&self, id: &str) -> Result<(), StoreError>;

    /// Cursor-paged listing of every profile, in a stable order.
    async fn list_profiles(&self, cursor: Option<&str>, limit: usize) -> Result<ProfilePage, StoreError>;

    // --- Shared stories ---

    /// Fails with `AlreadyExists` if a shared story with this id exists.
    async fn create_shared_story(&self, story: SharedStory) -> Result<Versioned<SharedStory>, StoreError>;

    async fn read_shared_story(&self, id: &str) -> Result<Versioned<SharedStory>, StoreError>;

    async fn replace_shared_story(
        &self,
        story: SharedStory,
        etag: &str,
    ) -> Result<Versioned<SharedStory>, StoreError>;

    async fn delete_shared_story(&self, id: &str) -> Result<(), StoreError>;

    async fn list_shared_stories(&self) -> Result<Vec<Versioned<SharedStory>>, StoreError>;

    async fn count_shared_stories(&self) -> Result<usize, StoreError>;

    // --- Global story set ---

    async fn read_story_set(&self) -> Result<Option<StorySet>, StoreError>;

    async fn replace_story_set(&self, set: &StorySet) -> Result<(), StoreError>;
}
