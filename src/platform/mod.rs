//! Social platform integration.

pub mod types;
mod x;

use async_trait::async_trait;

pub use types::{Post, PublicMetrics, User};
pub use x::XClient;

use crate::error::PlatformError;

/// Operations the agent needs from a social platform.
///
/// Read calls return at most `count` posts, newest first.
#[async_trait]
pub trait SocialPlatform: Send + Sync {
    /// Short platform identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Check the credentials and return the authenticated account.
    async fn verify_credentials(&self) -> Result<User, PlatformError>;

    async fn get_user(&self, username: &str) -> Result<User, PlatformError>;

    async fn user_posts(&self, user_id: &str, count: usize) -> Result<Vec<Post>, PlatformError>;

    async fn user_likes(&self, user_id: &str, count: usize) -> Result<Vec<Post>, PlatformError>;

    async fn home_timeline(&self, user_id: &str, count: usize)
    -> Result<Vec<Post>, PlatformError>;

    async fn mentions(&self, user_id: &str, count: usize) -> Result<Vec<Post>, PlatformError>;

    async fn like(&self, user_id: &str, post_id: &str) -> Result<(), PlatformError>;

    async fn repost(&self, user_id: &str, post_id: &str) -> Result<(), PlatformError>;

    /// Reply to `post_id`, returning the new post's id.
    async fn reply(&self, post_id: &str, text: &str) -> Result<String, PlatformError>;
}
