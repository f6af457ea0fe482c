use feed_client::FeedError;
use thiserror::Error;

/// Failures reported by the document store collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic-concurrency rejection: the document changed since it was read.
    #[error("Version conflict on {key}")]
    Conflict { key: String },

    #[error("Document not found: {key}")]
    NotFound { key: String },

    #[error("Document already exists: {key}")]
    AlreadyExists { key: String },

    #[error("Store backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum NewsWatchError {
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Feed ingestion disabled after {cycles} consecutive failed cycles")]
    RepeatedFetchFailure { cycles: u32 },

    #[error("Email account already registered: {0}")]
    EmailAlreadyRegistered(String),

    #[error("Too many news filters (max {max})")]
    TooManyFilters { max: usize },

    #[error("Saved story limit reached (max {max})")]
    SavedStoryLimit { max: usize },

    #[error("Story was already saved: {0}")]
    AlreadySaved(String),

    #[error("Saved story not found: {0}")]
    SavedStoryNotFound(String),

    #[error("Shared story limit reached (max {max})")]
    SharedStoryLimit { max: usize },

    #[error("Story was already shared: {0}")]
    AlreadyShared(String),

    #[error("Comment limit reached (max {max})")]
    CommentLimit { max: usize },

    #[error("Mutation queue is closed")]
    QueueClosed,

    #[error("Mutation task aborted before reporting a result")]
    TaskAborted,

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl NewsWatchError {
    /// True when the store rejected a write because the document moved on.
    pub fn is_conflict(&self) -> bool {
        matches!(self, NewsWatchError::Store(StoreError::Conflict { .. }))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, NewsWatchError::Store(StoreError::NotFound { .. }))
    }
}
