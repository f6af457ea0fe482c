pub mod error;
pub mod types;

pub use error::{FeedError, Result};
pub use types::{parse_page, FeedPage, PageRequest, RawEntry};

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// The provider asks for no more than one call per second; keep a margin.
pub const DEFAULT_MIN_SPACING: Duration = Duration::from_millis(1500);

pub struct FeedClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    min_spacing: Duration,
    /// Time of the most recent request, shared by every caller of this client.
    last_request: Mutex<Option<Instant>>,
}

impl FeedClient {
    pub fn with_base_url(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            min_spacing: DEFAULT_MIN_SPACING,
            last_request: Mutex::new(None),
        }
    }

    pub fn min_spacing(mut self, spacing: Duration) -> Self {
        self.min_spacing = spacing;
        self
    }

    /// Fetch the raw body of one page. Waits as needed so consecutive calls
    /// are at least `min_spacing` apart.
    pub async fn fetch_page_body(&self, page: PageRequest) -> Result<String> {
        self.pace().await;
        tracing::debug!(page = page.index, start = page.start, length = page.length, "Fetching feed page");

        let start = page.start.to_string();
        let length = page.length.to_string();
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", ""),
                ("start", start.as_str()),
                ("length", length.as_str()),
                ("rlength", "0"),
                ("l", "en"),
                ("src", "news"),
                ("f", "json"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FeedError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(resp.text().await?)
    }

    /// Fetch and parse one page.
    pub async fn fetch_page(&self, page: PageRequest) -> Result<FeedPage> {
        let body = self.fetch_page_body(page).await?;
        parse_page(page.index, &body)
    }

    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.min_spacing;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
