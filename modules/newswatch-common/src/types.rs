use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Stories ---

/// A single ingested news item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    /// `story_identity(link)`.
    pub id: String,
    pub link: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

/// The current batch of ingested stories, in feed order.
///
/// Built off to the side by ingestion and swapped in whole; nothing appends
/// to a committed set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorySet {
    pub stories: Vec<Story>,
    pub refreshed_at: DateTime<Utc>,
}

impl StorySet {
    pub fn new(stories: Vec<Story>, refreshed_at: DateTime<Utc>) -> Self {
        Self {
            stories,
            refreshed_at,
        }
    }

    /// The set an engine starts with before its first ingestion.
    pub fn empty() -> Self {
        Self::new(Vec::new(), DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }
}

// --- User profiles ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFilter {
    pub name: String,
    /// Matched case-insensitively. Order matters once the per-filter cap is hit.
    pub keywords: Vec<String>,
    #[serde(default)]
    pub enable_alert: bool,
    #[serde(default)]
    pub alert_frequency: u32,
    /// Always recomputed from scratch by the matcher.
    #[serde(default)]
    pub matched_stories: Vec<Story>,
}

impl UserFilter {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            enable_alert: false,
            alert_frequency: 0,
            matched_stories: Vec::new(),
        }
    }

    /// Keywords that can actually match something. Blank entries are ignored.
    pub fn active_keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords
            .iter()
            .map(|k| k.as_str())
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub require_wifi: bool,
    pub enable_alerts: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            require_wifi: true,
            enable_alerts: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub settings: UserSettings,
    #[serde(default)]
    pub filters: Vec<UserFilter>,
    #[serde(default)]
    pub saved_stories: Vec<Story>,
}

impl UserProfile {
    /// A freshly registered profile with the starter filter.
    pub fn new(display_name: &str, email: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            display_name: display_name.to_string(),
            email: email.to_string(),
            created_at: now,
            settings: UserSettings::default(),
            filters: vec![default_filter()],
            saved_stories: Vec::new(),
        }
    }
}

/// Every new profile starts with this filter so it has something to show.
pub fn default_filter() -> UserFilter {
    UserFilter::new(
        "Technology Companies",
        &["Apple", "Microsoft", "IBM", "Amazon", "Google", "Intel"],
    )
}

// --- Shared stories ---

/// The user a request acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commenter {
    pub user_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub user_id: String,
    pub display_name: String,
    pub posted_at: DateTime<Utc>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedStory {
    /// Same as `story.id`.
    pub id: String,
    pub story: Story,
    pub comments: Vec<Comment>,
}

impl SharedStory {
    /// Share a story. The sharer's opening comment doubles as the creation marker.
    pub fn new(story: Story, sharer: &Commenter, now: DateTime<Utc>) -> Self {
        let opening = Comment {
            user_id: sharer.user_id.clone(),
            display_name: sharer.display_name.clone(),
            posted_at: now,
            text: format!("{} thought everyone might enjoy this!", sharer.display_name),
        };
        Self {
            id: story.id.clone(),
            story,
            comments: vec![opening],
        }
    }

    /// Timestamp of the first comment. `None` only for malformed records.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.comments.first().map(|c| c.posted_at)
    }

    /// Strictly older than `retention` at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        match self.created_at() {
            Some(created) => now - created > retention,
            None => false,
        }
    }
}
