//! X (Twitter) API v2 client.
//!
//! Uses an OAuth 2.0 user-context bearer token. Obtaining and refreshing the
//! token happens outside this crate.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::PlatformConfig;
use crate::error::PlatformError;
use crate::platform::SocialPlatform;
use crate::platform::types::{Post, PublicMetrics, User};
use crate::retry::{RetryPolicy, with_backoff};
use crate::util::prefix_bytes;

const PLATFORM_NAME: &str = "x";

const TWEET_FIELDS: &str = "created_at,public_metrics,context_annotations,author_id";
const USER_FIELDS: &str = "username,name,description,public_metrics";

/// Largest page the v2 timeline endpoints accept.
const MAX_PAGE: usize = 100;
/// Smallest page accepted by every timeline endpoint we call.
const MIN_PAGE: usize = 10;

/// X API v2 client.
pub struct XClient {
    client: Client,
    base_url: Url,
    token: SecretString,
    retry: RetryPolicy,
}

impl XClient {
    pub fn new(config: &PlatformConfig, retry: RetryPolicy) -> Result<Self, PlatformError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| PlatformError::RequestFailed {
            platform: PLATFORM_NAME.to_string(),
            reason: format!("invalid base URL '{}': {e}", config.base_url),
        })?;
        let token = config
            .access_token
            .clone()
            .ok_or_else(|| PlatformError::AuthFailed {
                platform: PLATFORM_NAME.to_string(),
            })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PlatformError::RequestFailed {
                platform: PLATFORM_NAME.to_string(),
                reason: format!("Failed to build reqwest client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url,
            token,
            retry,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, PlatformError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PlatformError::RequestFailed {
                platform: PLATFORM_NAME.to_string(),
                reason: format!("base URL '{}' cannot take a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, PlatformError> {
        let response = request
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(|e| PlatformError::RequestFailed {
                platform: PLATFORM_NAME.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let path = response.url().path().to_string();
        let retry_after = response
            .headers()
            .get("x-rate-limit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| retry_after_from_reset(v, Utc::now()));
        let body = response.text().await.map_err(|e| PlatformError::RequestFailed {
            platform: PLATFORM_NAME.to_string(),
            reason: format!("Failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(status_error(status.as_u16(), retry_after, &body, &path));
        }

        serde_json::from_str(&body).map_err(|e| PlatformError::InvalidResponse {
            platform: PLATFORM_NAME.to_string(),
            reason: format!("JSON parse error: {e}. Raw: {}", prefix_bytes(&body, 200)),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, PlatformError> {
        tracing::debug!(path = %url.path(), "GET");
        with_backoff(&self.retry, url.path(), || {
            self.send(self.client.get(url.clone()))
        })
        .await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: Url,
        body: serde_json::Value,
    ) -> Result<T, PlatformError> {
        tracing::debug!(path = %url.path(), "POST");
        self.send(self.client.post(url).json(&body)).await
    }

    async fn fetch_user(&self, url: Url, id: &str) -> Result<User, PlatformError> {
        let single: Single<ApiUser> = self.get_json(url).await?;
        single
            .data
            .map(ApiUser::into_user)
            .ok_or_else(|| PlatformError::NotFound {
                entity: "user".to_string(),
                id: id.to_string(),
            })
    }

    /// Page through a post timeline until `count` posts are collected.
    async fn fetch_posts(&self, segments: &[&str], count: usize) -> Result<Vec<Post>, PlatformError> {
        let mut posts = Vec::new();
        let mut next_token: Option<String> = None;
        while posts.len() < count {
            let mut url = self.endpoint(segments)?;
            {
                let mut query = url.query_pairs_mut();
                query
                    .append_pair("max_results", &page_size(count - posts.len()).to_string())
                    .append_pair("tweet.fields", TWEET_FIELDS)
                    .append_pair("expansions", "author_id")
                    .append_pair("user.fields", USER_FIELDS);
                if let Some(token) = &next_token {
                    query.append_pair("pagination_token", token);
                }
            }
            let page: Page = self.get_json(url).await?;
            next_token = page.meta.next_token.clone();
            let batch = page.into_posts();
            if batch.is_empty() {
                break;
            }
            posts.extend(batch);
            if next_token.is_none() {
                break;
            }
        }
        posts.truncate(count);
        Ok(posts)
    }
}

fn page_size(remaining: usize) -> usize {
    remaining.clamp(MIN_PAGE, MAX_PAGE)
}

/// Seconds until the `x-rate-limit-reset` epoch timestamp.
fn retry_after_from_reset(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let reset: i64 = value.trim().parse().ok()?;
    let secs = (reset - now.timestamp()).max(0);
    Some(Duration::from_secs(secs as u64))
}

fn status_error(status: u16, retry_after: Option<Duration>, body: &str, path: &str) -> PlatformError {
    match status {
        401 | 403 => PlatformError::AuthFailed {
            platform: PLATFORM_NAME.to_string(),
        },
        404 => PlatformError::NotFound {
            entity: "resource".to_string(),
            id: path.to_string(),
        },
        429 => PlatformError::RateLimited {
            platform: PLATFORM_NAME.to_string(),
            retry_after,
        },
        _ => PlatformError::RequestFailed {
            platform: PLATFORM_NAME.to_string(),
            reason: format!("HTTP {status}: {}", prefix_bytes(body, 200)),
        },
    }
}

#[async_trait]
impl SocialPlatform for XClient {
    fn name(&self) -> &str {
        PLATFORM_NAME
    }

    async fn verify_credentials(&self) -> Result<User, PlatformError> {
        let mut url = self.endpoint(&["users", "me"])?;
        url.query_pairs_mut().append_pair("user.fields", USER_FIELDS);
        let user = self.fetch_user(url, "me").await?;
        tracing::info!(username = %user.username, "Verified X credentials");
        Ok(user)
    }

    async fn get_user(&self, username: &str) -> Result<User, PlatformError> {
        let username = username.trim_start_matches('@');
        let mut url = self.endpoint(&["users", "by", "username", username])?;
        url.query_pairs_mut().append_pair("user.fields", USER_FIELDS);
        self.fetch_user(url, username).await
    }

    async fn user_posts(&self, user_id: &str, count: usize) -> Result<Vec<Post>, PlatformError> {
        self.fetch_posts(&["users", user_id, "tweets"], count).await
    }

    async fn user_likes(&self, user_id: &str, count: usize) -> Result<Vec<Post>, PlatformError> {
        self.fetch_posts(&["users", user_id, "liked_tweets"], count)
            .await
    }

    async fn home_timeline(
        &self,
        user_id: &str,
        count: usize,
    ) -> Result<Vec<Post>, PlatformError> {
        self.fetch_posts(&["users", user_id, "timelines", "reverse_chronological"], count)
            .await
    }

    async fn mentions(&self, user_id: &str, count: usize) -> Result<Vec<Post>, PlatformError> {
        self.fetch_posts(&["users", user_id, "mentions"], count).await
    }

    async fn like(&self, user_id: &str, post_id: &str) -> Result<(), PlatformError> {
        let url = self.endpoint(&["users", user_id, "likes"])?;
        let _: serde_json::Value = self
            .post_json(url, serde_json::json!({ "tweet_id": post_id }))
            .await?;
        Ok(())
    }

    async fn repost(&self, user_id: &str, post_id: &str) -> Result<(), PlatformError> {
        let url = self.endpoint(&["users", user_id, "retweets"])?;
        let _: serde_json::Value = self
            .post_json(url, serde_json::json!({ "tweet_id": post_id }))
            .await?;
        Ok(())
    }

    async fn reply(&self, post_id: &str, text: &str) -> Result<String, PlatformError> {
        let url = self.endpoint(&["tweets"])?;
        let created: Single<CreatedTweet> = self
            .post_json(
                url,
                serde_json::json!({
                    "text": text,
                    "reply": { "in_reply_to_tweet_id": post_id },
                }),
            )
            .await?;
        created
            .data
            .map(|t| t.id)
            .ok_or_else(|| PlatformError::InvalidResponse {
                platform: PLATFORM_NAME.to_string(),
                reason: "reply response carried no tweet id".to_string(),
            })
    }
}

// X API v2 wire types

#[derive(Debug, Deserialize)]
struct Single<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    username: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    public_metrics: Option<ApiUserMetrics>,
}

#[derive(Debug, Deserialize)]
struct ApiUserMetrics {
    #[serde(default)]
    followers_count: u64,
}

impl ApiUser {
    fn into_user(self) -> User {
        User {
            id: self.id,
            username: self.username,
            name: self.name,
            description: self.description.unwrap_or_default(),
            followers_count: self.public_metrics.map(|m| m.followers_count),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiTweet {
    id: String,
    text: String,
    #[serde(default)]
    author_id: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    public_metrics: PublicMetrics,
    #[serde(default)]
    context_annotations: Vec<ApiAnnotation>,
}

#[derive(Debug, Deserialize)]
struct ApiAnnotation {
    entity: ApiEntity,
}

#[derive(Debug, Deserialize)]
struct ApiEntity {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<ApiUser>,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    data: Vec<ApiTweet>,
    #[serde(default)]
    includes: Includes,
    #[serde(default)]
    meta: Meta,
}

impl Page {
    /// Resolve authors from the `includes.users` expansion.
    fn into_posts(self) -> Vec<Post> {
        let users: HashMap<String, User> = self
            .includes
            .users
            .into_iter()
            .map(|u| (u.id.clone(), u.into_user()))
            .collect();
        let fetched_at = Utc::now();
        self.data
            .into_iter()
            .map(|t| {
                let author = t
                    .author_id
                    .as_deref()
                    .and_then(|id| users.get(id).cloned())
                    .unwrap_or_else(User::unknown);
                let mut topics: Vec<String> = Vec::new();
                for a in t.context_annotations {
                    if !topics.contains(&a.entity.name) {
                        topics.push(a.entity.name);
                    }
                }
                Post {
                    id: t.id,
                    text: t.text,
                    author,
                    created_at: t.created_at.unwrap_or(fetched_at),
                    metrics: t.public_metrics,
                    topics,
                }
            })
            .collect()
    }
}
