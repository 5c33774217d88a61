//! Moving and copying whole threads between channels.

use tracing::{debug, warn};

use wrangler_types::models::{Attribution, Post, User};

use crate::engine::Wrangler;
use crate::error::{Result, WranglerError};
use crate::policy;
use crate::request::{RelocationMode, RelocationRequest, RelocationResult, RequestContext};
use crate::resolver::{self, ResolvedThread, ThreadResolver};
use crate::store::{PostStore, PostWrite};

impl Wrangler {
    pub(crate) fn relocate(
        &self,
        ctx: &RequestContext,
        executor: &User,
        request: &RelocationRequest,
        affected: &mut Vec<String>,
    ) -> Result<RelocationResult> {
        let store = self.store();
        let resolver = ThreadResolver::new(store);

        self.with_thread_lock(
            || Ok(vec![resolver.resolve_root(&request.post_id)?.id]),
            || {
                let thread = resolver.resolve_thread(&request.post_id)?;
                resolver::ensure_eligible(&thread.root)?;

                let source = policy::get_channel(store, thread.channel_id())?;
                let target = policy::get_channel(store, &request.target_channel_id)?;
                if resolver::is_self_target(&source.id, &target.id) {
                    return Err(WranglerError::SelfTarget(format!(
                        "Error: the thread is already in channel {}",
                        target.id
                    )));
                }
                policy::check_channel_gates(self.config(), &source, &target)?;
                policy::check_thread_size(self.config(), &thread)?;
                policy::check_invocation(ctx, &thread.root)?;
                policy::check_membership(store, &ctx.user_id, &[source.id.as_str(), target.id.as_str()])?;

                let now = crate::now_millis();
                let planned = match request.mode {
                    RelocationMode::Move => plan_move(&thread, &target.id, now),
                    RelocationMode::Copy => plan_copy(store, &thread, &target.id, now),
                };

                debug!(
                    user_id = %ctx.user_id,
                    root_id = %thread.root.id,
                    from = %source.id,
                    to = %target.id,
                    mode = request.mode.verb(),
                    posts = thread.num_posts(),
                    "relocating thread"
                );
                affected.clone_from(&planned.post_ids);
                store.apply(&planned.writes)?;

                let audit = self.audit();
                let result = RelocationResult {
                    mode: request.mode,
                    source_root_id: thread.root.id.clone(),
                    source_channel_id: source.id.clone(),
                    permalink: audit.link(&target, &planned.root_id),
                    new_root_id: planned.root_id,
                    target_channel_id: target.id.clone(),
                    post_ids: planned.post_ids,
                };
                if !request.options.silent {
                    audit.relocated(
                        executor,
                        &thread,
                        &result,
                        request.options.show_root_in_summary,
                        planned.latest,
                    );
                }
                Ok(result)
            },
        )
    }
}

struct Planned {
    root_id: String,
    post_ids: Vec<String>,
    writes: Vec<PostWrite>,
    /// Newest create_at in the target thread once written.
    latest: i64,
}

/// Re-home every post in place. Ids, authors and timestamps are kept.
fn plan_move(thread: &ResolvedThread, target_channel_id: &str, now: i64) -> Planned {
    let writes = thread
        .posts()
        .map(|post| {
            let mut moved = post.clone();
            moved.channel_id = target_channel_id.to_string();
            moved.update_at = now;
            PostWrite::Update(moved)
        })
        .collect();

    Planned {
        root_id: thread.root.id.clone(),
        post_ids: thread.post_ids(),
        writes,
        latest: thread.latest_timestamp(),
    }
}

/// Fresh posts with new ids, stamped in the original order, each pointing
/// back at the post it was copied from. Reactions come along.
fn plan_copy(
    store: &dyn PostStore,
    thread: &ResolvedThread,
    target_channel_id: &str,
    now: i64,
) -> Planned {
    let root_id = crate::new_id();
    let mut post_ids = Vec::with_capacity(thread.num_posts());
    let mut writes = Vec::with_capacity(thread.num_posts());
    let mut latest = now;

    for (i, original) in thread.posts().enumerate() {
        let create_at = now + i as i64;
        let copy = Post {
            id: if i == 0 { root_id.clone() } else { crate::new_id() },
            channel_id: target_channel_id.to_string(),
            root_id: if i == 0 { String::new() } else { root_id.clone() },
            user_id: original.user_id.clone(),
            message: original.message.clone(),
            post_type: original.post_type.clone(),
            create_at,
            update_at: create_at,
            delete_at: 0,
            file_ids: original.file_ids.clone(),
            attribution: Some(Attribution::of(original)),
        };
        latest = create_at;

        // Reactions are best effort; a failed lookup never blocks the copy.
        let reactions = match store.get_reactions(&original.id) {
            Ok(reactions) => reactions,
            Err(e) => {
                warn!(post_id = %original.id, "failed to read reactions: {}", e);
                Vec::new()
            }
        };

        post_ids.push(copy.id.clone());
        let copy_id = copy.id.clone();
        writes.push(PostWrite::Create(copy));
        writes.extend(reactions.into_iter().map(|mut reaction| {
            reaction.post_id = copy_id.clone();
            PostWrite::AddReaction(reaction)
        }));
    }

    Planned {
        root_id,
        post_ids,
        writes,
        latest,
    }
}
