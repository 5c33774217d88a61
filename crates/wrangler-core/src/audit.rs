//! Bot-authored announcements and author notifications.
//!
//! Nothing here can fail a wrangle: every write is best effort and failures
//! are logged.

use tracing::{debug, warn};

use wrangler_types::models::{Channel, Post, User};

use crate::config::Configuration;
use crate::format;
use crate::request::{AttachResult, MergeResult, RelocationMode, RelocationResult};
use crate::resolver::ResolvedThread;
use crate::store::{PostStore, PostWrite};

/// Preview length for the root message in a move summary.
const ROOT_PREVIEW_LENGTH: usize = 200;

pub struct AuditEmitter<'a> {
    store: &'a dyn PostStore,
    config: &'a Configuration,
    bot_user_id: &'a str,
}

impl<'a> AuditEmitter<'a> {
    pub fn new(store: &'a dyn PostStore, config: &'a Configuration, bot_user_id: &'a str) -> Self {
        Self {
            store,
            config,
            bot_user_id,
        }
    }

    /// Permalink for a post in `channel`. Team-less channels use the
    /// redirect segment.
    pub fn link(&self, channel: &Channel, post_id: &str) -> String {
        let team = if channel.team_id.is_empty() {
            None
        } else {
            match self.store.get_team(&channel.team_id) {
                Ok(team) => team,
                Err(e) => {
                    warn!(team_id = %channel.team_id, "failed to look up team for permalink: {}", e);
                    None
                }
            }
        };
        format::permalink(
            &self.config.site_url,
            team.as_ref().map(|t| t.name.as_str()),
            post_id,
        )
    }

    pub fn relocated(
        &self,
        executor: &User,
        thread: &ResolvedThread,
        result: &RelocationResult,
        show_root_in_summary: bool,
        after: i64,
    ) {
        match result.mode {
            RelocationMode::Move => {
                self.post(
                    &result.target_channel_id,
                    &format!(
                        "A thread with {} message(s) has been moved here from another channel: {}",
                        thread.num_posts(),
                        result.permalink
                    ),
                    after,
                );

                let mut summary = format!(
                    "A thread with {} message(s) has been moved: {}",
                    thread.num_posts(),
                    result.permalink
                );
                if show_root_in_summary {
                    summary.push_str("\n\n");
                    summary.push_str(&format::quote_block(&format::clean_and_trim(
                        &thread.root.message,
                        ROOT_PREVIEW_LENGTH,
                    )));
                }
                self.post(&result.source_channel_id, &summary, after);
            }
            RelocationMode::Copy => {
                self.post(
                    &result.target_channel_id,
                    &format!(
                        "A thread with {} message(s) has been copied here from another channel: {}",
                        thread.num_posts(),
                        result.permalink
                    ),
                    after,
                );
                self.post(
                    &result.source_channel_id,
                    &format!(
                        "A thread with {} message(s) has been copied: {}",
                        thread.num_posts(),
                        result.permalink
                    ),
                    after,
                );
            }
        }

        let template = match result.mode {
            RelocationMode::Move => &self.config.move_thread_message,
            RelocationMode::Copy => &self.config.copy_thread_message,
        };
        self.notify_author(&thread.root.user_id, executor, template, &result.permalink);
    }

    pub fn merged(&self, executor: &User, source: &ResolvedThread, result: &MergeResult, after: i64) {
        self.post(
            &result.target_channel_id,
            &format!(
                "A thread with {} message(s) has been merged into {}",
                source.num_posts(),
                result.permalink
            ),
            after,
        );
        if result.source_channel_id != result.target_channel_id {
            self.post(
                &result.source_channel_id,
                &format!(
                    "A thread with {} message(s) has been merged into another thread: {}",
                    source.num_posts(),
                    result.permalink
                ),
                after,
            );
        }
        self.notify_author(
            &source.root.user_id,
            executor,
            &self.config.merge_thread_message,
            &result.permalink,
        );
    }

    pub fn attached(&self, executor: &User, post: &Post, result: &AttachResult) {
        self.notify_author(
            &post.user_id,
            executor,
            &self.config.attach_message_message,
            &result.permalink,
        );
    }

    /// DM the author when someone else wrangled their post.
    fn notify_author(&self, author_id: &str, executor: &User, template: &str, link: &str) {
        if author_id == executor.id || author_id == self.bot_user_id {
            return;
        }
        let channel = match self.store.direct_channel(self.bot_user_id, author_id) {
            Ok(channel) => channel,
            Err(e) => {
                warn!(user_id = %author_id, "could not open direct channel for notification: {}", e);
                return;
            }
        };
        let message = format::render_template(template, link, &executor.username);
        self.post(&channel.id, &message, 0);
    }

    /// Bot posts are always channel-level, so no thread ever gains replies.
    fn post(&self, channel_id: &str, message: &str, after: i64) {
        let create_at = crate::now_millis().max(after + 1);
        let post = Post {
            id: crate::new_id(),
            channel_id: channel_id.to_string(),
            root_id: String::new(),
            user_id: self.bot_user_id.to_string(),
            message: message.to_string(),
            post_type: String::new(),
            create_at,
            update_at: create_at,
            delete_at: 0,
            file_ids: Vec::new(),
            attribution: None,
        };
        let post_id = post.id.clone();
        match self.store.apply(&[PostWrite::Create(post)]) {
            Ok(()) => debug!(post_id = %post_id, channel_id, "bot message posted"),
            Err(e) => warn!(channel_id, "failed to post bot message: {}", e),
        }
    }
}
