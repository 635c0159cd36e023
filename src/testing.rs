//! Test doubles shared by unit tests.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;

use crate::collector::{RecordKind, UserRecord};
use crate::db::Database;
use crate::db::libsql::LibSqlBackend;
use crate::error::{LlmError, PlatformError};
use crate::llm::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
use crate::platform::{Post, PublicMetrics, SocialPlatform, User};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> String {
    NEXT_ID.fetch_add(1, Ordering::Relaxed).to_string()
}

/// A post by `@someone` with a unique id and no engagement.
pub fn post(text: &str) -> Post {
    Post {
        id: next_id(),
        text: text.to_string(),
        author: User {
            id: "7".to_string(),
            username: "someone".to_string(),
            name: "Some One".to_string(),
            description: String::new(),
            followers_count: None,
        },
        created_at: Utc::now(),
        metrics: PublicMetrics::default(),
        topics: Vec::new(),
    }
}

/// A collected record with a unique id, timestamped now.
pub fn record(text: &str, kind: RecordKind) -> UserRecord {
    UserRecord {
        post_id: next_id(),
        content: text.to_string(),
        kind,
        timestamp: Utc::now(),
        metadata: serde_json::json!({}),
    }
}

/// A migrated libSQL database in a temporary directory.
///
/// Keep the returned `TempDir` alive for the duration of the test.
pub async fn test_db() -> (Arc<dyn Database>, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = LibSqlBackend::new_local(&dir.path().join("test.db"))
        .await
        .expect("open test db");
    backend.run_migrations().await.expect("migrations");
    (Arc::new(backend), dir)
}

/// LLM stub returning a fixed reply, or always failing.
pub struct StubLlm {
    reply: Option<String>,
    calls: AtomicUsize,
    last: Mutex<Option<CompletionRequest>>,
}

impl StubLlm {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    /// Every call fails with a non-transient error.
    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for StubLlm {
    fn model_name(&self) -> &str {
        "stub-model"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(request);
        match &self.reply {
            Some(content) => Ok(CompletionResponse {
                content: content.clone(),
                input_tokens: 10,
                output_tokens: 10,
                finish_reason: FinishReason::Stop,
            }),
            None => Err(LlmError::AuthFailed {
                provider: "stub".to_string(),
            }),
        }
    }
}

#[derive(Default)]
struct PlatformState {
    user_posts: Vec<Post>,
    user_likes: Vec<Post>,
    timeline: Vec<Post>,
    mentions: Vec<Post>,
    missing_user: bool,
    fail_writes: bool,
    liked: Vec<String>,
    reposted: Vec<String>,
    replies: Vec<(String, String)>,
}

/// In-memory platform that records every write.
pub struct StubPlatform {
    state: Mutex<PlatformState>,
    reads: AtomicUsize,
}

impl Default for StubPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl StubPlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PlatformState::default()),
            reads: AtomicUsize::new(0),
        }
    }

    /// The authenticated account.
    pub fn bot() -> User {
        User {
            id: "1".to_string(),
            username: "me".to_string(),
            name: "Me".to_string(),
            description: "Building things in Rust.".to_string(),
            followers_count: Some(120),
        }
    }

    pub fn set_user_posts(&self, posts: Vec<Post>) {
        self.state.lock().unwrap().user_posts = posts;
    }

    pub fn set_user_likes(&self, posts: Vec<Post>) {
        self.state.lock().unwrap().user_likes = posts;
    }

    pub fn set_timeline(&self, posts: Vec<Post>) {
        self.state.lock().unwrap().timeline = posts;
    }

    pub fn set_mentions(&self, posts: Vec<Post>) {
        self.state.lock().unwrap().mentions = posts;
    }

    /// `get_user` answers `NotFound` from now on.
    pub fn set_missing_user(&self) {
        self.state.lock().unwrap().missing_user = true;
    }

    /// Likes, reposts and replies fail from now on.
    pub fn fail_writes(&self) {
        self.state.lock().unwrap().fail_writes = true;
    }

    pub fn liked(&self) -> Vec<String> {
        self.state.lock().unwrap().liked.clone()
    }

    pub fn reposted(&self) -> Vec<String> {
        self.state.lock().unwrap().reposted.clone()
    }

    /// `(post_id, text)` pairs.
    pub fn replies(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().replies.clone()
    }

    /// Number of read calls made.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn read(&self, pick: impl FnOnce(&PlatformState) -> &Vec<Post>, count: usize) -> Vec<Post> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        pick(&state).iter().take(count).cloned().collect()
    }

    fn write_failure(&self) -> Option<PlatformError> {
        self.state
            .lock()
            .unwrap()
            .fail_writes
            .then(|| PlatformError::RequestFailed {
                platform: "stub".to_string(),
                reason: "write rejected".to_string(),
            })
    }
}

#[async_trait]
impl SocialPlatform for StubPlatform {
    fn name(&self) -> &str {
        "stub"
    }

    async fn verify_credentials(&self) -> Result<User, PlatformError> {
        Ok(Self::bot())
    }

    async fn get_user(&self, username: &str) -> Result<User, PlatformError> {
        if self.state.lock().unwrap().missing_user {
            return Err(PlatformError::NotFound {
                entity: "user".to_string(),
                id: username.to_string(),
            });
        }
        Ok(User {
            id: "42".to_string(),
            username: username.to_string(),
            ..Self::bot()
        })
    }

    async fn user_posts(&self, _user_id: &str, count: usize) -> Result<Vec<Post>, PlatformError> {
        Ok(self.read(|s| &s.user_posts, count))
    }

    async fn user_likes(&self, _user_id: &str, count: usize) -> Result<Vec<Post>, PlatformError> {
        Ok(self.read(|s| &s.user_likes, count))
    }

    async fn home_timeline(
        &self,
        _user_id: &str,
        count: usize,
    ) -> Result<Vec<Post>, PlatformError> {
        Ok(self.read(|s| &s.timeline, count))
    }

    async fn mentions(&self, _user_id: &str, count: usize) -> Result<Vec<Post>, PlatformError> {
        Ok(self.read(|s| &s.mentions, count))
    }

    async fn like(&self, _user_id: &str, post_id: &str) -> Result<(), PlatformError> {
        if let Some(err) = self.write_failure() {
            return Err(err);
        }
        self.state.lock().unwrap().liked.push(post_id.to_string());
        Ok(())
    }

    async fn repost(&self, _user_id: &str, post_id: &str) -> Result<(), PlatformError> {
        if let Some(err) = self.write_failure() {
            return Err(err);
        }
        self.state.lock().unwrap().reposted.push(post_id.to_string());
        Ok(())
    }

    async fn reply(&self, post_id: &str, text: &str) -> Result<String, PlatformError> {
        if let Some(err) = self.write_failure() {
            return Err(err);
        }
        let mut state = self.state.lock().unwrap();
        state.replies.push((post_id.to_string(), text.to_string()));
        Ok(format!("reply-{}", state.replies.len()))
    }
}
