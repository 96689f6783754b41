use crate::domain::values::content_type::ContentType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Engagement counters attached to social posts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialMetrics {
    pub upvotes: i64,
    pub comments: i64,
    pub subchannel: String,
}

/// A single unit of ingested text.
///
/// `id` is 0 until the item has been persisted; the repository assigns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub published_at: DateTime<Utc>,
    /// Origin plus subchannel, e.g. `네이버(한국경제)` or `reddit/r/korea`.
    pub source: String,
    pub content_type: ContentType,
    pub url: Option<String>,
    pub author: Option<String>,
    /// Company named explicitly by the source (search query, disclosure filer).
    pub company_name: Option<String>,
    pub ticker: Option<String>,
    pub social: Option<SocialMetrics>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub notified_at: Option<DateTime<Utc>>,
}

impl ContentItem {
    pub fn new(title: String, body: String, published_at: DateTime<Utc>, source: String) -> Self {
        let content_type = ContentType::from_source(&source);
        Self {
            id: 0,
            title,
            body,
            published_at,
            source,
            content_type,
            url: None,
            author: None,
            company_name: None,
            ticker: None,
            social: None,
            metadata: None,
            created_at: Utc::now(),
            notified_at: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_company_name(mut self, name: impl Into<String>) -> Self {
        self.company_name = Some(name.into());
        self
    }

    pub fn with_social(mut self, social: SocialMetrics) -> Self {
        self.social = Some(social);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }

    /// Text representation for embedding and prompting.
    pub fn searchable_text(&self) -> String {
        if self.body.is_empty() {
            self.title.clone()
        } else {
            format!("{}\n{}", self.title, self.body)
        }
    }
}
