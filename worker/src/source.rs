//! Listado `new` de un subreddit a través de los endpoints JSON públicos.
//! La pausa entre pedidos la pone el recolector.

use async_trait::async_trait;
use common::collector::{Author, Comment, CollectorSourceError, Page, Post, PostSource};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://www.reddit.com";
const USER_AGENT: &str = "reddit-pipeline-worker/0.1";

pub struct RedditSource {
    client: Client,
    base_url: String,
    subreddit: String,
    page_size: u32,
}

impl RedditSource {
    pub fn new(base_url: impl Into<String>, subreddit: impl Into<String>, page_size: u32) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            subreddit: subreddit.into(),
            page_size,
        })
    }

    async fn get_json(&self, url: &str, record: &str) -> Result<Value, CollectorSourceError> {
        let fail = |message: String| CollectorSourceError {
            record: record.to_string(),
            message,
        };
        debug!("GET {}", url);
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        let res = res.error_for_status().map_err(|e| fail(e.to_string()))?;
        res.json::<Value>().await.map_err(|e| fail(e.to_string()))
    }
}

#[async_trait]
impl PostSource for RedditSource {
    fn name(&self) -> &str {
        &self.subreddit
    }

    async fn page(&self, after: Option<&str>) -> Result<Page, CollectorSourceError> {
        let mut url = format!(
            "{}/r/{}/new.json?limit={}&raw_json=1",
            self.base_url, self.subreddit, self.page_size
        );
        if let Some(after) = after {
            url.push_str("&after=");
            url.push_str(after);
        }
        let body = self
            .get_json(&url, &format!("página {}", after.unwrap_or("inicial")))
            .await?;
        Ok(parse_listing(&body))
    }

    async fn comments(&self, post_id: &str) -> Result<Vec<Comment>, CollectorSourceError> {
        let url = format!(
            "{}/r/{}/comments/{}.json?raw_json=1",
            self.base_url, self.subreddit, post_id
        );
        let body = self.get_json(&url, post_id).await?;
        // [listado del post, listado de comentarios]
        Ok(body.get(1).map(parse_comment_listing).unwrap_or_default())
    }
}

/* ---------------- parseo (puro) ---------------- */

fn str_of(data: &Value, field: &str) -> Option<String> {
    data.get(field).and_then(|v| v.as_str()).map(str::to_string)
}

fn author_of(data: &Value) -> Option<Author> {
    let name = str_of(data, "author");
    let id = str_of(data, "author_fullname");
    if name.is_none() && id.is_none() {
        None
    } else {
        Some(Author { id, name })
    }
}

fn children(listing: &Value) -> impl Iterator<Item = &Value> {
    listing
        .pointer("/data/children")
        .and_then(|c| c.as_array())
        .into_iter()
        .flatten()
}

pub fn parse_listing(body: &Value) -> Page {
    let posts = children(body)
        .filter(|c| c.get("kind").and_then(|k| k.as_str()) == Some("t3"))
        .filter_map(|c| c.get("data"))
        .filter_map(|d| {
            Some(Post {
                id: str_of(d, "id")?,
                created_utc: d.get("created_utc").and_then(|v| v.as_f64())?,
                url: str_of(d, "url"),
                score: d.get("score").and_then(|v| v.as_i64()).unwrap_or(0),
                title: str_of(d, "title"),
                selftext: str_of(d, "selftext"),
                author: author_of(d),
                post_hint: str_of(d, "post_hint"),
            })
        })
        .collect();

    Page {
        posts,
        after: body.pointer("/data/after").and_then(|v| v.as_str()).map(str::to_string),
    }
}

/// Comentarios `t1` con sus respuestas; los "more" se ignoran.
pub fn parse_comment_listing(listing: &Value) -> Vec<Comment> {
    children(listing)
        .filter(|c| c.get("kind").and_then(|k| k.as_str()) == Some("t1"))
        .filter_map(|c| c.get("data"))
        .filter_map(|d| {
            Some(Comment {
                id: str_of(d, "id")?,
                created_utc: d.get("created_utc").and_then(|v| v.as_f64()).unwrap_or(0.0),
                permalink: str_of(d, "permalink"),
                score: d.get("score").and_then(|v| v.as_i64()).unwrap_or(0),
                body: str_of(d, "body"),
                author: author_of(d),
                // "replies" viene como "" cuando no hay respuestas
                replies: d
                    .get("replies")
                    .filter(|r| r.is_object())
                    .map(parse_comment_listing)
                    .unwrap_or_default(),
            })
        })
        .collect()
}
