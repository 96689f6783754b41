use super::base::HttpFetcher;
use super::{Feed, FeedError};
use crate::domain::entities::content_item::{ContentItem, SocialMetrics};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const REDDIT_AUTH_URL: &str = "https://www.reddit.com";
pub const REDDIT_API_URL: &str = "https://oauth.reddit.com";

#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    pub subreddits: Vec<String>,
    pub keywords: Vec<String>,
    pub min_upvotes: i64,
    pub min_comments: i64,
    pub lookback_hours: i64,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            user_agent: super::base::USER_AGENT.to_string(),
            subreddits: vec!["korea".into(), "stocks".into()],
            keywords: vec!["samsung".into(), "kospi".into(), "hynix".into()],
            min_upvotes: 10,
            min_comments: 2,
            lookback_hours: 24,
        }
    }
}

/// Reddit posts via the OAuth API (application-only grant).
pub struct RedditFeed {
    http: HttpFetcher,
    config: RedditConfig,
    auth_url: String,
    api_url: String,
    token: Mutex<Option<(String, Instant)>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: i64,
    pub created_utc: f64,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub upvote_ratio: Option<f64>,
    #[serde(default)]
    pub link_flair_text: Option<String>,
}

impl RedditFeed {
    pub fn new(mut config: RedditConfig) -> Result<Self, FeedError> {
        if config.client_id.is_empty() || config.client_secret.is_empty() {
            return Err(FeedError::Config("Reddit client credentials not set".into()));
        }
        config.keywords = config
            .keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Ok(Self {
            http: HttpFetcher::new(std::time::Duration::from_secs(30), std::time::Duration::from_secs(2))?,
            config,
            auth_url: REDDIT_AUTH_URL.to_string(),
            api_url: REDDIT_API_URL.to_string(),
            token: Mutex::new(None),
        })
    }

    pub fn with_urls(mut self, auth_url: &str, api_url: &str) -> Self {
        self.auth_url = auth_url.trim_end_matches('/').to_string();
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_http(mut self, http: HttpFetcher) -> Self {
        self.http = http;
        self
    }

    async fn access_token(&self) -> Result<String, FeedError> {
        let mut guard = self.token.lock().await;
        if let Some((token, expires_at)) = guard.as_ref() {
            if Instant::now() < *expires_at {
                return Ok(token.clone());
            }
        }

        let url = format!("{}/api/v1/access_token", self.auth_url);
        let resp = self
            .http
            .send("reddit_token", |c| {
                c.post(&url)
                    .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
                    .header(reqwest::header::USER_AGENT, &self.config.user_agent)
                    .form(&[("grant_type", "client_credentials")])
            })
            .await?;
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| FeedError::Parse(e.to_string()))?;

        // Refresh a minute early.
        let ttl = std::time::Duration::from_secs(token.expires_in.saturating_sub(60));
        *guard = Some((token.access_token.clone(), Instant::now() + ttl));
        Ok(token.access_token)
    }

    async fn fetch_subreddit(&self, sub: &str, limit: usize) -> Result<Vec<Post>, FeedError> {
        let token = self.access_token().await?;
        let url = format!("{}/r/{sub}/new", self.api_url);
        let resp = self
            .http
            .send(sub, |c| {
                c.get(&url)
                    .bearer_auth(&token)
                    .header(reqwest::header::USER_AGENT, &self.config.user_agent)
                    .query(&[("limit", limit.to_string())])
            })
            .await?;
        let listing: Listing = resp
            .json()
            .await
            .map_err(|e| FeedError::Parse(e.to_string()))?;
        Ok(listing.data.children.into_iter().map(|c| c.data).collect())
    }

    /// Engagement, recency and keyword filter.
    pub fn is_relevant(&self, post: &Post, now: DateTime<Utc>) -> bool {
        if post.score <= self.config.min_upvotes || post.num_comments <= self.config.min_comments {
            return false;
        }
        let Some(created) = DateTime::from_timestamp(post.created_utc as i64, 0) else {
            return false;
        };
        if created < now - Duration::hours(self.config.lookback_hours) {
            return false;
        }
        let text = format!("{} {}", post.title, post.selftext).to_lowercase();
        self.config.keywords.iter().any(|k| text.contains(k.as_str()))
    }
}

pub fn post_to_item(post: Post) -> ContentItem {
    let published_at = DateTime::from_timestamp(post.created_utc as i64, 0).unwrap_or_else(Utc::now);
    let body = if post.selftext.trim().is_empty() {
        post.title.clone()
    } else {
        post.selftext.clone()
    };
    let author = post.author.clone().unwrap_or_else(|| "[deleted]".to_string());
    let metadata = serde_json::json!({
        "post_id": post.id,
        "upvote_ratio": post.upvote_ratio,
        "link_flair_text": post.link_flair_text,
    });

    ContentItem::new(
        post.title,
        body,
        published_at,
        format!("reddit/r/{}", post.subreddit),
    )
    .with_url(format!("https://www.reddit.com{}", post.permalink))
    .with_author(author)
    .with_social(SocialMetrics {
        upvotes: post.score,
        comments: post.num_comments,
        subchannel: post.subreddit,
    })
    .with_metadata(metadata)
}

#[async_trait]
impl Feed for RedditFeed {
    fn name(&self) -> &str {
        "reddit"
    }

    async fn fetch_recent(&self, limit: usize) -> Result<Vec<ContentItem>, FeedError> {
        let now = Utc::now();
        let mut items = Vec::new();

        for sub in &self.config.subreddits {
            let posts = match self.fetch_subreddit(sub, limit).await {
                Ok(posts) => posts,
                Err(e) => {
                    tracing::error!(subreddit = %sub, error = %e, "Subreddit fetch failed");
                    continue;
                }
            };
            let total = posts.len();
            let relevant: Vec<ContentItem> = posts
                .into_iter()
                .filter(|p| self.is_relevant(p, now))
                .map(post_to_item)
                .collect();
            tracing::info!(subreddit = %sub, relevant = relevant.len(), total, "Subreddit crawled");
            items.extend(relevant);
        }

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed() -> RedditFeed {
        RedditFeed::new(RedditConfig {
            client_id: "id".into(),
            client_secret: "secret".into(),
            keywords: vec![" Samsung ".into(), "KOSPI".into()],
            ..Default::default()
        })
        .unwrap()
    }

    fn post(score: i64, comments: i64, age_hours: i64, title: &str) -> Post {
        Post {
            id: "abc".into(),
            title: title.into(),
            selftext: String::new(),
            score,
            num_comments: comments,
            created_utc: (Utc::now() - Duration::hours(age_hours)).timestamp() as f64,
            permalink: "/r/korea/comments/abc/x/".into(),
            author: None,
            subreddit: "korea".into(),
            upvote_ratio: Some(0.9),
            link_flair_text: None,
        }
    }

    #[test]
    fn test_relevance_filter() {
        let feed = feed();
        let now = Utc::now();
        assert!(feed.is_relevant(&post(50, 10, 1, "Samsung earnings beat"), now));
        assert!(feed.is_relevant(&post(50, 10, 1, "kospi hits record"), now));
        // Thresholds are strict.
        assert!(!feed.is_relevant(&post(10, 10, 1, "Samsung"), now));
        assert!(!feed.is_relevant(&post(50, 2, 1, "Samsung"), now));
        assert!(!feed.is_relevant(&post(50, 10, 30, "Samsung"), now));
        assert!(!feed.is_relevant(&post(50, 10, 1, "Kimchi recipe"), now));
    }

    #[test]
    fn test_post_to_item() {
        let item = post_to_item(post(50, 10, 1, "Samsung earnings beat"));
        assert_eq!(item.source, "reddit/r/korea");
        assert_eq!(item.author.as_deref(), Some("[deleted]"));
        assert_eq!(item.body, "Samsung earnings beat");
        assert_eq!(item.social.as_ref().map(|s| s.upvotes), Some(50));
        assert_eq!(
            item.url.as_deref(),
            Some("https://www.reddit.com/r/korea/comments/abc/x/")
        );
    }

    #[test]
    fn test_missing_credentials() {
        assert!(RedditFeed::new(RedditConfig::default()).is_err());
    }
}
