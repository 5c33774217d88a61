use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use wrangler_types::models::{Channel, User};

use crate::audit::AuditEmitter;
use crate::config::Configuration;
use crate::error::{Result, WranglerError};
use crate::locks::ThreadLocks;
use crate::policy;
use crate::request::{RequestContext, WrangleOutcome, WranglerRequest};
use crate::resolver::{ResolvedThread, ThreadResolver};
use crate::retry::RetryPolicy;
use crate::store::PostStore;

/// How many times a lock is re-taken when the thread roots changed while
/// waiting for it.
const LOCK_ATTEMPTS: usize = 3;

/// The thread wrangling engine. Cheap to clone; clones share the store,
/// configuration and lock table.
#[derive(Clone)]
pub struct Wrangler {
    store: Arc<dyn PostStore>,
    config: Arc<Configuration>,
    locks: Arc<ThreadLocks>,
    retry: RetryPolicy,
    bot_user_id: Arc<str>,
}

impl Wrangler {
    pub fn new(
        store: Arc<dyn PostStore>,
        config: Configuration,
        bot_user_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            config: Arc::new(config),
            locks: Arc::new(ThreadLocks::new()),
            retry: RetryPolicy::default(),
            bot_user_id: Arc::from(bot_user_id.into()),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn store(&self) -> &dyn PostStore {
        self.store.as_ref()
    }

    pub fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    pub(crate) fn audit(&self) -> AuditEmitter<'_> {
        AuditEmitter::new(self.store(), &self.config, &self.bot_user_id)
    }

    /// Look up the caller and apply the email-domain gate.
    pub fn authorize(&self, user_id: &str) -> Result<User> {
        self.retry
            .run("authorize", |_| policy::authorize_user(self.store(), &self.config, user_id))
    }

    /// Whether the web UI should be offered to this user.
    pub fn web_ui_enabled_for(&self, user_id: &str) -> Result<bool> {
        if !self.config.enable_web_ui {
            return Ok(false);
        }
        match self.authorize(user_id) {
            Ok(_) => Ok(true),
            Err(WranglerError::PermissionDenied(_)) | Err(WranglerError::NotFound { .. }) => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve a thread the user can see.
    pub fn thread_for_user(&self, user_id: &str, post_id: &str) -> Result<ResolvedThread> {
        self.retry.run("resolve thread", |_| {
            let thread = ThreadResolver::new(self.store()).resolve_thread(post_id)?;
            policy::check_membership(self.store(), user_id, &[thread.channel_id()])?;
            Ok(thread)
        })
    }

    /// Channels of a team the user belongs to, direct and group channels
    /// excluded.
    pub fn channels_for_team_for_user(&self, team_id: &str, user_id: &str) -> Result<Vec<Channel>> {
        self.retry.run("list channels", |_| {
            let mut channels: Vec<Channel> = self
                .store
                .channels_for_team_for_user(team_id, user_id)?
                .into_iter()
                .filter(|c| !c.is_group_or_direct())
                .collect();
            channels.sort_by(|a, b| a.display_name.cmp(&b.display_name));
            Ok(channels)
        })
    }

    /// Validate and run one wrangle.
    ///
    /// Transient storage failures re-run the whole operation, preconditions
    /// included, under the configured [`RetryPolicy`].
    pub fn execute(&self, ctx: &RequestContext, request: &WranglerRequest) -> Result<WrangleOutcome> {
        let executor = self.authorize(&ctx.user_id)?;
        let operation = request.operation();

        let outcome = self.retry.run(operation, |affected| match request {
            WranglerRequest::Relocate(req) => self
                .relocate(ctx, &executor, req, affected)
                .map(WrangleOutcome::Relocated),
            WranglerRequest::Merge(req) => self
                .merge(ctx, &executor, req, affected)
                .map(WrangleOutcome::Merged),
            WranglerRequest::Attach(req) => self
                .attach(ctx, &executor, req, affected)
                .map(WrangleOutcome::Attached),
        });

        match &outcome {
            Ok(done) => info!(
                user_id = %ctx.user_id,
                operation,
                root_id = %done.root_id(),
                channel_id = %done.channel_id(),
                post_count = done.post_ids().len(),
                "wrangle complete"
            ),
            Err(e) if e.is_user_error() => {
                info!(user_id = %ctx.user_id, operation, code = e.code(), "wrangle rejected: {}", e)
            }
            Err(e) => warn!(user_id = %ctx.user_id, operation, code = e.code(), "wrangle failed: {}", e),
        }
        outcome
    }

    /// Run `body` while holding the locks for the thread roots `lookup`
    /// returns. The roots are looked up again once the lock is held; if they
    /// moved in the meantime the lock is released and taken again.
    pub(crate) fn with_thread_lock<T>(
        &self,
        lookup: impl Fn() -> Result<Vec<String>>,
        body: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        for _ in 0..LOCK_ATTEMPTS {
            let guard = self.locks.lock(lookup()?);
            let current: BTreeSet<String> = lookup()?.into_iter().collect();
            if current.iter().eq(guard.keys()) {
                debug!(roots = ?guard.keys(), "thread roots locked");
                let out = body();
                drop(guard);
                return out;
            }
        }
        Err(WranglerError::TransientIo(
            "thread changed while waiting for its lock".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{
        AttachRequest, MergeRequest, RelocationMode, RelocationOptions, RelocationRequest,
    };
    use crate::testing::Scenario;
    use assert_matches::assert_matches;
    use std::thread;
    use wrangler_types::models::ChannelType;

    fn relocate(post_id: &str, channel_id: &str, mode: RelocationMode, silent: bool) -> WranglerRequest {
        relocate_with(post_id, channel_id, mode, RelocationOptions {
            show_root_in_summary: false,
            silent,
        })
    }

    fn relocate_with(
        post_id: &str,
        channel_id: &str,
        mode: RelocationMode,
        options: RelocationOptions,
    ) -> WranglerRequest {
        WranglerRequest::Relocate(RelocationRequest {
            post_id: post_id.to_string(),
            target_channel_id: channel_id.to_string(),
            mode,
            options,
        })
    }

    fn merge(source: &str, destination: &str) -> WranglerRequest {
        merge_with(source, destination, true)
    }

    fn merge_with(source: &str, destination: &str, silent: bool) -> WranglerRequest {
        WranglerRequest::Merge(MergeRequest {
            source_post_id: source.to_string(),
            destination_post_id: destination.to_string(),
            silent,
        })
    }

    fn merge_enabled() -> Scenario {
        let mut config = Configuration::default();
        config.enable_merge_thread = true;
        Scenario::with_config(config)
    }

    fn reply_ids(thread: &ResolvedThread) -> Vec<&str> {
        thread.replies.iter().map(|p| p.id.as_str()).collect()
    }

    fn attach(post_id: &str, destination: &str) -> WranglerRequest {
        WranglerRequest::Attach(AttachRequest {
            post_id: post_id.to_string(),
            destination_post_id: destination.to_string(),
        })
    }

    #[test]
    fn silent_move_keeps_replies_in_order() {
        let s = Scenario::new();
        let ctx = RequestContext::for_user(&s.alice.id);

        s.wrangler
            .execute(&ctx, &relocate(&s.root.id, &s.other.id, RelocationMode::Move, true))
            .unwrap();

        let thread = ThreadResolver::new(s.store.as_ref())
            .resolve_thread(&s.root.id)
            .unwrap();
        assert_eq!(thread.channel_id(), s.other.id);
        assert_eq!(
            thread.replies.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            vec![s.reply1.id.as_str(), s.reply2.id.as_str()]
        );
        assert!(thread.replies.iter().all(|p| p.channel_id == s.other.id));
        // Silent: nothing but the three thread posts exists.
        assert_eq!(s.store.bot_posts(&s.wrangler).len(), 0);
        assert_eq!(s.store.live_post_count(), 3);
    }

    #[test]
    fn move_keeps_authors_and_timestamps() {
        let s = Scenario::new();
        let ctx = RequestContext::for_user(&s.alice.id);
        s.wrangler
            .execute(&ctx, &relocate(&s.reply2.id, &s.other.id, RelocationMode::Move, true))
            .unwrap();

        let moved = s.store.get(&s.reply1.id);
        assert_eq!(moved.user_id, s.reply1.user_id);
        assert_eq!(moved.create_at, s.reply1.create_at);
        assert_eq!(moved.root_id, s.root.id);
    }

    #[test]
    fn loud_move_announces_in_both_channels_and_notifies_author() {
        let s = Scenario::new();
        let ctx = RequestContext::for_user(&s.bob.id);
        let outcome = s
            .wrangler
            .execute(&ctx, &relocate(&s.root.id, &s.other.id, RelocationMode::Move, false))
            .unwrap();

        let bot_posts = s.store.bot_posts(&s.wrangler);
        assert!(bot_posts.iter().any(|p| p.channel_id == s.other.id
            && p.root_id.is_empty()
            && p.message.contains("moved here from another channel")));
        assert!(bot_posts.iter().any(|p| p.channel_id == s.town.id
            && p.root_id.is_empty()
            && p.message.contains("has been moved")));

        // Bob moved Alice's thread, so Alice hears about it.
        let dm = bot_posts
            .iter()
            .find(|p| p.message.contains("@bob wrangled a thread"))
            .unwrap();
        assert!(dm.message.ends_with(&format!("/pl/{}", s.root.id)));
        assert_matches!(outcome, WrangleOutcome::Relocated(ref r) if r.permalink.contains("/eng/pl/"));
    }

    #[test]
    fn loud_move_leaves_the_thread_untouched() {
        let s = Scenario::new();
        let ctx = RequestContext::for_user(&s.alice.id);
        s.wrangler
            .execute(&ctx, &relocate(&s.root.id, &s.other.id, RelocationMode::Move, false))
            .unwrap();

        let thread = ThreadResolver::new(s.store.as_ref())
            .resolve_thread(&s.root.id)
            .unwrap();
        assert_eq!(reply_ids(&thread), vec![s.reply1.id.as_str(), s.reply2.id.as_str()]);
        assert!(!s.store.bot_posts(&s.wrangler).is_empty());
    }

    #[test]
    fn move_summary_quotes_root_only_when_asked() {
        let s = Scenario::new();
        let ctx = RequestContext::for_user(&s.alice.id);
        let options = RelocationOptions {
            show_root_in_summary: true,
            silent: false,
        };
        s.wrangler
            .execute(&ctx, &relocate_with(&s.root.id, &s.other.id, RelocationMode::Move, options))
            .unwrap();

        let summary = s
            .store
            .bot_posts(&s.wrangler)
            .into_iter()
            .find(|p| p.channel_id == s.town.id)
            .unwrap();
        assert!(summary.message.starts_with("A thread with 3 message(s) has been moved: "));
        assert!(summary.message.ends_with("\n\n> root"));

        let s = Scenario::new();
        let ctx = RequestContext::for_user(&s.alice.id);
        let outcome = s
            .wrangler
            .execute(&ctx, &relocate(&s.root.id, &s.other.id, RelocationMode::Move, false))
            .unwrap();
        let WrangleOutcome::Relocated(result) = outcome else {
            panic!("expected relocation");
        };
        let summary = s
            .store
            .bot_posts(&s.wrangler)
            .into_iter()
            .find(|p| p.channel_id == s.town.id)
            .unwrap();
        assert_eq!(
            summary.message,
            format!("A thread with 3 message(s) has been moved: {}", result.permalink)
        );
    }

    #[test]
    fn loud_copy_announces_in_both_channels_without_touching_threads() {
        let s = Scenario::new();
        let ctx = RequestContext::for_user(&s.alice.id);
        let outcome = s
            .wrangler
            .execute(&ctx, &relocate(&s.root.id, &s.other.id, RelocationMode::Copy, false))
            .unwrap();
        let WrangleOutcome::Relocated(result) = outcome else {
            panic!("expected relocation");
        };

        let resolver = ThreadResolver::new(s.store.as_ref());
        let original = resolver.resolve_thread(&s.root.id).unwrap();
        assert_eq!(original.channel_id(), s.town.id);
        assert_eq!(reply_ids(&original), vec![s.reply1.id.as_str(), s.reply2.id.as_str()]);
        let copy = resolver.resolve_thread(&result.new_root_id).unwrap();
        assert_eq!(copy.count(), 2);

        let bot_posts = s.store.bot_posts(&s.wrangler);
        assert!(bot_posts.iter().all(|p| p.root_id.is_empty()));
        assert!(bot_posts.iter().any(|p| p.channel_id == s.other.id
            && p.message.contains("copied here from another channel")
            && p.message.ends_with(&result.permalink)));
        assert!(bot_posts.iter().any(|p| p.channel_id == s.town.id
            && p.message.contains("has been copied: ")));
    }

    #[test]
    fn copy_leaves_original_and_attributes_copies() {
        let s = Scenario::new();
        let before = ThreadResolver::new(s.store.as_ref())
            .resolve_thread(&s.root.id)
            .unwrap();
        let ctx = RequestContext::for_user(&s.alice.id);

        let outcome = s
            .wrangler
            .execute(&ctx, &relocate(&s.root.id, &s.other.id, RelocationMode::Copy, true))
            .unwrap();
        let WrangleOutcome::Relocated(result) = outcome else {
            panic!("expected relocation");
        };

        let after = ThreadResolver::new(s.store.as_ref())
            .resolve_thread(&s.root.id)
            .unwrap();
        assert_eq!(after.root, before.root);
        assert_eq!(after.replies, before.replies);

        let copy = ThreadResolver::new(s.store.as_ref())
            .resolve_thread(&result.new_root_id)
            .unwrap();
        assert_ne!(copy.root.id, s.root.id);
        assert_eq!(copy.channel_id(), s.other.id);
        assert_eq!(copy.count(), 2);
        let messages: Vec<_> = copy.posts().map(|p| p.message.as_str()).collect();
        assert_eq!(messages, vec!["root", "first", "second"]);
        for (copied, original) in copy.posts().zip(before.posts()) {
            let attribution = copied.attribution.as_ref().unwrap();
            assert_eq!(attribution.original_post_id, original.id);
            assert_eq!(attribution.original_user_id, original.user_id);
            assert_eq!(attribution.original_channel_id, s.town.id);
            assert_eq!(attribution.original_create_at, original.create_at);
        }

        // Reactions follow the copy.
        let reactions = s.store.get_reactions(&copy.replies[0].id).unwrap();
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].emoji_name, "tada");
    }

    #[test]
    fn attachments_follow_every_operation() {
        let s = merge_enabled();
        s.store.attach_files(&s.reply1.id, &["f1"]);
        let ctx = RequestContext::for_user(&s.alice.id);

        let outcome = s
            .wrangler
            .execute(&ctx, &relocate(&s.root.id, &s.other.id, RelocationMode::Copy, true))
            .unwrap();
        let WrangleOutcome::Relocated(copied) = outcome else {
            panic!("expected relocation");
        };
        let copy = ThreadResolver::new(s.store.as_ref())
            .resolve_thread(&copied.new_root_id)
            .unwrap();
        assert_eq!(copy.replies[0].file_ids, vec!["f1"]);
        assert!(copy.root.file_ids.is_empty());

        s.wrangler
            .execute(&ctx, &relocate(&s.root.id, &s.other.id, RelocationMode::Move, true))
            .unwrap();
        assert_eq!(s.store.get(&s.reply1.id).file_ids, vec!["f1"]);

        let floating = s.store.post(&s.other, "", &s.alice.id, "screenshot", 900);
        s.store.attach_files(&floating.id, &["f2"]);
        s.wrangler.execute(&ctx, &attach(&floating.id, &s.root.id)).unwrap();
        assert_eq!(s.store.get(&floating.id).file_ids, vec!["f2"]);

        s.wrangler
            .execute(&ctx, &merge(&copied.new_root_id, &s.root.id))
            .unwrap();
        let merged = ThreadResolver::new(s.store.as_ref())
            .resolve_thread(&s.root.id)
            .unwrap();
        let with_files: Vec<_> = merged
            .replies
            .iter()
            .filter(|p| !p.file_ids.is_empty())
            .map(|p| p.file_ids.clone())
            .collect();
        assert_eq!(with_files, vec![vec!["f1"], vec!["f2"], vec!["f1"]]);
    }

    #[test]
    fn relocating_to_same_channel_is_self_target() {
        let s = Scenario::new();
        let ctx = RequestContext::for_user(&s.alice.id);
        let err = s
            .wrangler
            .execute(&ctx, &relocate(&s.root.id, &s.town.id, RelocationMode::Move, true))
            .unwrap_err();
        assert_matches!(err, WranglerError::SelfTarget(_));
    }

    #[test]
    fn relocating_to_unknown_channel_is_not_found() {
        let s = Scenario::new();
        let ctx = RequestContext::for_user(&s.alice.id);
        let err = s
            .wrangler
            .execute(&ctx, &relocate(&s.root.id, "missing", RelocationMode::Copy, true))
            .unwrap_err();
        assert_matches!(err, WranglerError::NotFound { entity: "channel", .. });
    }

    #[test]
    fn non_member_is_denied() {
        let s = Scenario::new();
        let secret = s.store.channel("team1", "secret", ChannelType::Open, &[&s.bob]);
        let ctx = RequestContext::for_user(&s.alice.id);
        let err = s
            .wrangler
            .execute(&ctx, &relocate(&s.root.id, &secret.id, RelocationMode::Move, true))
            .unwrap_err();
        assert_matches!(err, WranglerError::PermissionDenied(_));
        assert_eq!(s.store.get(&s.root.id).channel_id, s.town.id);
    }

    #[test]
    fn email_domain_gate_blocks_execution() {
        let mut config = Configuration::default();
        config.allowed_email_domain = "@corp.example".into();
        let s = Scenario::with_config(config);
        let ctx = RequestContext::for_user(&s.alice.id);
        let err = s
            .wrangler
            .execute(&ctx, &relocate(&s.root.id, &s.other.id, RelocationMode::Move, true))
            .unwrap_err();
        assert_matches!(err, WranglerError::PermissionDenied(_));
    }

    #[test]
    fn thread_size_limit() {
        let mut config = Configuration::default();
        config.move_thread_max_count = 2;
        let s = Scenario::with_config(config);
        let ctx = RequestContext::for_user(&s.alice.id);
        let err = s
            .wrangler
            .execute(&ctx, &relocate(&s.root.id, &s.other.id, RelocationMode::Move, true))
            .unwrap_err();
        assert_matches!(err, WranglerError::NotAllowed(ref msg) if msg.contains("3 posts long"));
    }

    #[test]
    fn command_must_come_from_the_threads_channel() {
        let s = Scenario::new();
        let wrong_channel = RequestContext::for_user(&s.alice.id).in_channel(&s.other.id);
        assert_matches!(
            s.wrangler
                .execute(&wrong_channel, &relocate(&s.root.id, &s.other.id, RelocationMode::Move, true)),
            Err(WranglerError::NotAllowed(_))
        );

        let inside_thread = RequestContext::for_user(&s.alice.id)
            .in_channel(&s.town.id)
            .in_thread(&s.root.id);
        assert_matches!(
            s.wrangler
                .execute(&inside_thread, &relocate(&s.root.id, &s.other.id, RelocationMode::Move, true)),
            Err(WranglerError::NotAllowed(_))
        );
    }

    #[test]
    fn system_messages_are_never_sources_or_destinations() {
        let s = Scenario::new();
        let joined = s.store.system_post(&s.town, "system_join_channel", 50);
        let combined = s.store.system_post(&s.town, "system_combined_user_activity", 60);
        let ctx = RequestContext::for_user(&s.alice.id);

        let mut config = Configuration::default();
        config.enable_merge_thread = true;
        let wrangler = s.wrangler_with(config);

        for system in [&joined, &combined] {
            assert_matches!(
                wrangler.execute(&ctx, &relocate(&system.id, &s.other.id, RelocationMode::Copy, true)),
                Err(WranglerError::SystemMessageIneligible(_))
            );
            assert_matches!(
                wrangler.execute(&ctx, &merge(&system.id, &s.root.id)),
                Err(WranglerError::SystemMessageIneligible(_))
            );
            assert_matches!(
                wrangler.execute(&ctx, &merge(&s.root.id, &system.id)),
                Err(WranglerError::SystemMessageIneligible(_))
            );
            assert_matches!(
                wrangler.execute(&ctx, &attach(&system.id, &s.root.id)),
                Err(WranglerError::SystemMessageIneligible(_))
            );
        }
    }

    #[test]
    fn merge_appends_source_after_destination() {
        let mut config = Configuration::default();
        config.enable_merge_thread = true;
        let s = Scenario::with_config(config);
        let source = s.store.post(&s.town, "", &s.bob.id, "other root", 1_000);
        let source_reply = s.store.post(&s.town, &source.id, &s.bob.id, "other reply", 1_100);
        let ctx = RequestContext::for_user(&s.alice.id);

        s.wrangler.execute(&ctx, &merge(&source_reply.id, &s.root.id)).unwrap();

        let merged = ThreadResolver::new(s.store.as_ref())
            .resolve_thread(&s.root.id)
            .unwrap();
        let ids: Vec<_> = merged.replies.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                s.reply1.id.as_str(),
                s.reply2.id.as_str(),
                source.id.as_str(),
                source_reply.id.as_str()
            ]
        );

        // The old root is now a reply and resolves to the destination.
        let absorbed = s.store.get(&source.id);
        assert_eq!(absorbed.root_id, s.root.id);
        assert_eq!(absorbed.message, "other root");
        assert_eq!(absorbed.attribution.as_ref().unwrap().original_create_at, 1_000);
        let resolved = ThreadResolver::new(s.store.as_ref())
            .resolve_thread(&source.id)
            .unwrap();
        assert_eq!(resolved.root.id, s.root.id);
    }

    #[test]
    fn merge_across_channels_moves_posts() {
        let mut config = Configuration::default();
        config.enable_merge_thread = true;
        let s = Scenario::with_config(config);
        let source = s.store.post(&s.other, "", &s.alice.id, "elsewhere", 5_000);
        let ctx = RequestContext::for_user(&s.alice.id);

        s.wrangler.execute(&ctx, &merge(&source.id, &s.reply1.id)).unwrap();

        let absorbed = s.store.get(&source.id);
        assert_eq!(absorbed.channel_id, s.town.id);
        assert_eq!(absorbed.root_id, s.root.id);
        assert_eq!(absorbed.attribution.as_ref().unwrap().original_channel_id, s.other.id);
    }

    #[test]
    fn loud_merge_appends_only_the_source_posts() {
        let s = merge_enabled();
        let source = s.store.post(&s.other, "", &s.bob.id, "elsewhere", 5_000);
        let ctx = RequestContext::for_user(&s.alice.id);

        let outcome = s
            .wrangler
            .execute(&ctx, &merge_with(&source.id, &s.root.id, false))
            .unwrap();
        let WrangleOutcome::Merged(result) = outcome else {
            panic!("expected merge");
        };

        let merged = ThreadResolver::new(s.store.as_ref())
            .resolve_thread(&s.root.id)
            .unwrap();
        assert_eq!(
            reply_ids(&merged),
            vec![s.reply1.id.as_str(), s.reply2.id.as_str(), source.id.as_str()]
        );

        let bot_posts = s.store.bot_posts(&s.wrangler);
        let announcements: Vec<_> = bot_posts
            .iter()
            .filter(|p| p.message.starts_with("A thread with 1 message(s) has been merged"))
            .collect();
        assert_eq!(announcements.len(), 2);
        assert!(announcements.iter().all(|p| p.root_id.is_empty()));
        assert!(announcements.iter().any(|p| p.channel_id == s.town.id
            && p.message.ends_with(&result.permalink)));
        assert!(announcements.iter().any(|p| p.channel_id == s.other.id
            && p.message.contains("into another thread")));
        // Bob's thread was merged by Alice.
        assert!(bot_posts.iter().any(|p| p.message.contains("@alice")));
    }

    #[test]
    fn loud_merge_in_one_channel_posts_a_single_announcement() {
        let s = merge_enabled();
        let source = s.store.post(&s.town, "", &s.alice.id, "same channel", 5_000);
        let ctx = RequestContext::for_user(&s.alice.id);

        s.wrangler
            .execute(&ctx, &merge_with(&source.id, &s.root.id, false))
            .unwrap();

        let bot_posts = s.store.bot_posts(&s.wrangler);
        assert_eq!(bot_posts.len(), 1);
        assert_eq!(bot_posts[0].channel_id, s.town.id);
        assert!(bot_posts[0].root_id.is_empty());
        assert!(!bot_posts[0].message.contains("another thread"));

        let merged = ThreadResolver::new(s.store.as_ref())
            .resolve_thread(&s.root.id)
            .unwrap();
        assert_eq!(merged.replies.last().unwrap().id, source.id);
    }

    #[test]
    fn merge_into_itself_is_invalid() {
        let mut config = Configuration::default();
        config.enable_merge_thread = true;
        let s = Scenario::with_config(config);
        let ctx = RequestContext::for_user(&s.alice.id);

        assert_matches!(
            s.wrangler.execute(&ctx, &merge(&s.root.id, &s.root.id)),
            Err(WranglerError::InvalidMerge(_))
        );
        // A reply of the same thread resolves to the same root.
        assert_matches!(
            s.wrangler.execute(&ctx, &merge(&s.reply1.id, &s.root.id)),
            Err(WranglerError::InvalidMerge(_))
        );
    }

    #[test]
    fn merge_requires_feature_flag() {
        let s = Scenario::new();
        let other_root = s.store.post(&s.town, "", &s.alice.id, "x", 900);
        let ctx = RequestContext::for_user(&s.alice.id);
        assert_matches!(
            s.wrangler.execute(&ctx, &merge(&other_root.id, &s.root.id)),
            Err(WranglerError::NotAllowed(_))
        );
    }

    #[test]
    fn attach_turns_message_into_reply() {
        let s = Scenario::new();
        let floating = s.store.post(&s.town, "", &s.bob.id, "forgot to reply", 400);
        let ctx = RequestContext::for_user(&s.alice.id).in_channel(&s.town.id);

        let outcome = s.wrangler.execute(&ctx, &attach(&floating.id, &s.reply2.id)).unwrap();
        assert_matches!(outcome, WrangleOutcome::Attached(ref r) if r.root_id == s.root.id);

        let attached = s.store.get(&floating.id);
        assert_eq!(attached.root_id, s.root.id);
        assert_eq!(attached.channel_id, s.town.id);
        assert_eq!(attached.create_at, 400);
        // Bob gets told that Alice attached his message.
        assert!(s
            .store
            .bot_posts(&s.wrangler)
            .iter()
            .any(|p| p.message.contains("@alice attached a message")));
    }

    #[test]
    fn attach_preconditions() {
        let s = Scenario::new();
        let ctx = RequestContext::for_user(&s.alice.id);

        // Same post.
        assert_matches!(
            s.wrangler.execute(&ctx, &attach(&s.root.id, &s.root.id)),
            Err(WranglerError::InvalidAttach(_))
        );
        // Already a reply.
        let other_root = s.store.post(&s.town, "", &s.alice.id, "other", 500);
        assert_matches!(
            s.wrangler.execute(&ctx, &attach(&s.reply1.id, &other_root.id)),
            Err(WranglerError::InvalidAttach(_))
        );
        // Has replies of its own.
        let parent = s.store.post(&s.town, "", &s.alice.id, "parent", 600);
        s.store.post(&s.town, &parent.id, &s.alice.id, "child", 700);
        assert_matches!(
            s.wrangler.execute(&ctx, &attach(&parent.id, &s.root.id)),
            Err(WranglerError::InvalidAttach(_))
        );
        // Different channel.
        let elsewhere = s.store.post(&s.other, "", &s.alice.id, "elsewhere", 800);
        assert_matches!(
            s.wrangler.execute(&ctx, &attach(&elsewhere.id, &s.root.id)),
            Err(WranglerError::InvalidAttach(ref msg)) if msg.contains("another channel")
        );
        // Older than the destination root.
        let early = s.store.post(&s.town, "", &s.alice.id, "early", 10);
        assert_matches!(
            s.wrangler.execute(&ctx, &attach(&early.id, &s.root.id)),
            Err(WranglerError::InvalidAttach(_))
        );
    }

    #[test]
    fn transient_write_failures_are_retried() {
        let s = Scenario::new();
        s.store.fail_next_applies(2);
        let ctx = RequestContext::for_user(&s.alice.id);

        s.wrangler
            .execute(&ctx, &relocate(&s.root.id, &s.other.id, RelocationMode::Move, true))
            .unwrap();
        assert_eq!(s.store.get(&s.root.id).channel_id, s.other.id);
    }

    #[test]
    fn exhausted_retries_report_partial_failure_without_changes() {
        let s = Scenario::new();
        s.store.fail_next_applies(10);
        let ctx = RequestContext::for_user(&s.alice.id);

        let err = s
            .wrangler
            .execute(&ctx, &relocate(&s.root.id, &s.other.id, RelocationMode::Move, true))
            .unwrap_err();
        assert_matches!(
            err,
            WranglerError::PartialFailure { operation: "move thread", ref post_ids, .. }
                if post_ids == &vec![s.root.id.clone(), s.reply1.id.clone(), s.reply2.id.clone()]
        );
        // The batch is atomic, so nothing moved.
        let thread = ThreadResolver::new(s.store.as_ref())
            .resolve_thread(&s.root.id)
            .unwrap();
        assert!(thread.posts().all(|p| p.channel_id == s.town.id));
    }

    #[test]
    fn exhausted_retries_while_reading_stay_transient() {
        let s = Scenario::new();
        let ctx = RequestContext::for_user(&s.alice.id);
        // Let the authorization read through, then fail every thread read.
        s.store.fail_reads_after(1, 100);

        let err = s
            .wrangler
            .execute(&ctx, &relocate(&s.root.id, &s.other.id, RelocationMode::Move, true))
            .unwrap_err();
        assert_matches!(err, WranglerError::TransientIo(_));
    }

    #[test]
    fn concurrent_move_and_merge_never_split_a_thread() {
        for _ in 0..20 {
            let mut config = Configuration::default();
            config.enable_merge_thread = true;
            let s = Scenario::with_config(config);
            let target = s.store.post(&s.town, "", &s.alice.id, "target", 50);

            let mover = {
                let wrangler = s.wrangler.clone();
                let request = relocate(&s.root.id, &s.other.id, RelocationMode::Move, true);
                let ctx = RequestContext::for_user(&s.alice.id);
                thread::spawn(move || wrangler.execute(&ctx, &request))
            };
            let merger = {
                let wrangler = s.wrangler.clone();
                let request = merge(&s.root.id, &target.id);
                let ctx = RequestContext::for_user(&s.alice.id);
                thread::spawn(move || wrangler.execute(&ctx, &request))
            };
            let _ = mover.join().unwrap();
            let _ = merger.join().unwrap();

            for post in s.store.all_live_posts() {
                if post.root_id.is_empty() {
                    continue;
                }
                let root = s.store.get(&post.root_id);
                assert_eq!(
                    root.channel_id, post.channel_id,
                    "reply {} lives outside its root's channel",
                    post.id
                );
            }
        }
    }

    #[test]
    fn disjoint_threads_run_in_parallel() {
        let s = Scenario::new();
        let second = s.store.post(&s.town, "", &s.alice.id, "second thread", 900);

        let handles: Vec<_> = [s.root.id.clone(), second.id.clone()]
            .into_iter()
            .map(|root| {
                let wrangler = s.wrangler.clone();
                let request = relocate(&root, &s.other.id, RelocationMode::Move, true);
                let ctx = RequestContext::for_user(&s.alice.id);
                thread::spawn(move || wrangler.execute(&ctx, &request))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(s.store.get(&s.root.id).channel_id, s.other.id);
        assert_eq!(s.store.get(&second.id).channel_id, s.other.id);
    }

    #[test]
    fn web_ui_respects_email_domain() {
        let mut config = Configuration::default();
        config.enable_web_ui = true;
        config.allowed_email_domain = "@example.com".into();
        let s = Scenario::with_config(config);
        assert!(s.wrangler.web_ui_enabled_for(&s.alice.id).unwrap());

        let outsider = s.store.user("mallory", "mallory@elsewhere.org");
        assert!(!s.wrangler.web_ui_enabled_for(&outsider.id).unwrap());
    }

    #[test]
    fn team_channel_listing_skips_direct_channels() {
        let s = Scenario::new();
        s.store.direct_channel(&s.alice.id, &s.bob.id).unwrap();
        let channels = s
            .wrangler
            .channels_for_team_for_user("team1", &s.alice.id)
            .unwrap();
        assert!(channels.iter().all(|c| !c.is_group_or_direct()));
        assert_eq!(channels.len(), 2);
    }
}
