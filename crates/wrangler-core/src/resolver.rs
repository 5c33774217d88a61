//! Thread resolution and eligibility checks.

use std::collections::HashSet;

use wrangler_types::models::Post;

use crate::error::{Result, WranglerError};
use crate::store::PostStore;

/// Hops allowed when walking `root_id` links. The platform only nests one
/// level; anything deeper is corrupt data.
const MAX_ROOT_HOPS: usize = 8;

/// A root post plus its replies in thread order.
#[derive(Debug, Clone)]
pub struct ResolvedThread {
    pub root: Post,
    pub replies: Vec<Post>,
}

impl ResolvedThread {
    /// Number of replies.
    pub fn count(&self) -> usize {
        self.replies.len()
    }

    /// Root plus replies.
    pub fn num_posts(&self) -> usize {
        self.replies.len() + 1
    }

    pub fn channel_id(&self) -> &str {
        &self.root.channel_id
    }

    /// Root first, then replies in order.
    pub fn posts(&self) -> impl Iterator<Item = &Post> {
        std::iter::once(&self.root).chain(self.replies.iter())
    }

    pub fn post_ids(&self) -> Vec<String> {
        self.posts().map(|p| p.id.clone()).collect()
    }

    /// Authors in order of first appearance.
    pub fn participant_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.posts()
            .filter(|p| seen.insert(p.user_id.as_str()))
            .map(|p| p.user_id.clone())
            .collect()
    }

    pub fn earliest_timestamp(&self) -> i64 {
        self.posts().map(|p| p.create_at).min().unwrap_or(self.root.create_at)
    }

    pub fn latest_timestamp(&self) -> i64 {
        self.posts().map(|p| p.create_at).max().unwrap_or(self.root.create_at)
    }
}

pub fn is_system_message(post: &Post) -> bool {
    post.is_system_message()
}

pub fn is_system_combined_activity(post: &Post) -> bool {
    post.is_combined_activity()
}

pub fn is_self_target(source_id: &str, target_id: &str) -> bool {
    source_id == target_id
}

/// System and combined-activity posts can never be wrangled.
pub fn ensure_eligible(post: &Post) -> Result<()> {
    if is_system_combined_activity(post) {
        return Err(WranglerError::SystemMessageIneligible(format!(
            "Error: message {} is a combined activity message and can't be wrangled",
            post.id
        )));
    }
    if is_system_message(post) {
        return Err(WranglerError::SystemMessageIneligible(format!(
            "Error: message {} is a system message and can't be wrangled",
            post.id
        )));
    }
    Ok(())
}

pub struct ThreadResolver<'a> {
    store: &'a dyn PostStore,
}

impl<'a> ThreadResolver<'a> {
    pub fn new(store: &'a dyn PostStore) -> Self {
        Self { store }
    }

    pub fn get_post(&self, post_id: &str) -> Result<Post> {
        self.store
            .get_post(post_id)?
            .ok_or_else(|| WranglerError::not_found("message", post_id))
    }

    /// Walk `root_id` links up to the thread root. A reply whose root is gone
    /// is orphaned and resolves to `NotFound` naming the missing root.
    pub fn resolve_root(&self, post_id: &str) -> Result<Post> {
        let mut post = self.get_post(post_id)?;
        for _ in 0..MAX_ROOT_HOPS {
            if post.is_root() {
                return Ok(post);
            }
            post = self
                .store
                .get_post(&post.root_id)?
                .ok_or_else(|| WranglerError::not_found("root message", post.root_id.clone()))?;
        }
        Err(WranglerError::Internal(format!(
            "message {} has a root chain deeper than {} posts",
            post_id, MAX_ROOT_HOPS
        )))
    }

    pub fn resolve_thread(&self, post_id: &str) -> Result<ResolvedThread> {
        let root = self.resolve_root(post_id)?;
        let replies = self.replies_of(&root)?;
        Ok(ResolvedThread { root, replies })
    }

    fn replies_of(&self, root: &Post) -> Result<Vec<Post>> {
        let mut seen = HashSet::new();
        let mut replies: Vec<Post> = self
            .store
            .get_thread_posts(&root.id)?
            .into_iter()
            .filter(|p| p.id != root.id && p.root_id == root.id && !p.is_deleted())
            .filter(|p| seen.insert(p.id.clone()))
            .collect();
        replies.sort_by(|a, b| a.create_at.cmp(&b.create_at).then_with(|| a.id.cmp(&b.id)));
        Ok(replies)
    }
}
