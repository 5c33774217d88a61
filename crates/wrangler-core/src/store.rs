//! The post graph accessor: everything the engine needs from the chat
//! platform's storage.

use thiserror::Error;

use wrangler_types::models::{Channel, Post, Reaction, Team, User};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Busy, locked or timed out. Safe to retry the whole operation.
    #[error("{0}")]
    Transient(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A single mutation inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostWrite {
    Create(Post),
    /// Overwrites the stored post with the same id. Fails the batch if the
    /// post no longer exists.
    Update(Post),
    AddReaction(Reaction),
}

impl PostWrite {
    pub fn post_id(&self) -> &str {
        match self {
            Self::Create(post) | Self::Update(post) => &post.id,
            Self::AddReaction(reaction) => &reaction.post_id,
        }
    }
}

/// Read/write access to posts, threads and channels.
///
/// Reads only ever return live (not deleted) posts. `apply` is atomic:
/// either every write of the batch lands or none does.
pub trait PostStore: Send + Sync {
    fn get_post(&self, post_id: &str) -> StoreResult<Option<Post>>;

    /// The root post plus every live reply, in no particular order.
    fn get_thread_posts(&self, root_id: &str) -> StoreResult<Vec<Post>>;

    fn get_channel(&self, channel_id: &str) -> StoreResult<Option<Channel>>;

    fn get_team(&self, team_id: &str) -> StoreResult<Option<Team>>;

    fn get_user(&self, user_id: &str) -> StoreResult<Option<User>>;

    fn is_channel_member(&self, channel_id: &str, user_id: &str) -> StoreResult<bool>;

    fn teams_for_user(&self, user_id: &str) -> StoreResult<Vec<Team>>;

    fn channels_for_team_for_user(&self, team_id: &str, user_id: &str)
    -> StoreResult<Vec<Channel>>;

    /// Newest first.
    fn recent_channel_posts(&self, channel_id: &str, limit: usize) -> StoreResult<Vec<Post>>;

    fn get_reactions(&self, post_id: &str) -> StoreResult<Vec<Reaction>>;

    /// Direct message channel between two users, created on first use.
    fn direct_channel(&self, user_a: &str, user_b: &str) -> StoreResult<Channel>;

    fn apply(&self, writes: &[PostWrite]) -> StoreResult<()>;
}
