use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeedError>;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed feed page {page}: {message}")]
    Parse { page: u32, message: String },
}

impl FeedError {
    /// Network and HTTP-status failures may clear up on their own by the next
    /// cycle. A page that does not parse is a provider contract problem.
    pub fn is_transient(&self) -> bool {
        matches!(self, FeedError::Network(_) | FeedError::Api { .. })
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        FeedError::Network(err.to_string())
    }
}
