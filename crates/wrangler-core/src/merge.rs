//! Absorbing one thread into another.

use tracing::debug;

use wrangler_types::models::{Attribution, User};

use crate::engine::Wrangler;
use crate::error::{Result, WranglerError};
use crate::policy;
use crate::request::{MergeRequest, MergeResult, RequestContext};
use crate::resolver::{self, ThreadResolver};
use crate::store::PostWrite;

impl Wrangler {
    /// Every source post, root first, becomes a reply of the destination root
    /// and is stamped after the destination's newest post. The source root is
    /// kept as a reply rather than deleted.
    pub(crate) fn merge(
        &self,
        ctx: &RequestContext,
        executor: &User,
        request: &MergeRequest,
        affected: &mut Vec<String>,
    ) -> Result<MergeResult> {
        if !self.config().enable_merge_thread {
            return Err(WranglerError::NotAllowed(
                "Merge thread command is not enabled".to_string(),
            ));
        }

        let store = self.store();
        let resolver = ThreadResolver::new(store);

        self.with_thread_lock(
            || {
                Ok(vec![
                    resolver.resolve_root(&request.source_post_id)?.id,
                    resolver.resolve_root(&request.destination_post_id)?.id,
                ])
            },
            || {
                let source = resolver.resolve_thread(&request.source_post_id)?;
                let destination = resolver.resolve_thread(&request.destination_post_id)?;
                if resolver::is_self_target(&source.root.id, &destination.root.id) {
                    return Err(WranglerError::InvalidMerge(
                        "Error: Original and target threads are the same".to_string(),
                    ));
                }
                resolver::ensure_eligible(&source.root)?;
                resolver::ensure_eligible(&destination.root)?;

                let source_channel = policy::get_channel(store, source.channel_id())?;
                let target_channel = policy::get_channel(store, destination.channel_id())?;
                policy::check_channel_gates(self.config(), &source_channel, &target_channel)?;
                policy::check_thread_size(self.config(), &source)?;
                policy::check_invocation(ctx, &source.root)?;
                policy::check_membership(
                    store,
                    &ctx.user_id,
                    &[source_channel.id.as_str(), target_channel.id.as_str()],
                )?;

                let now = crate::now_millis();
                let start = destination.latest_timestamp() + 1;
                let writes: Vec<PostWrite> = source
                    .posts()
                    .enumerate()
                    .map(|(i, post)| {
                        let mut absorbed = post.clone();
                        absorbed.attribution = Some(Attribution::of(post));
                        absorbed.root_id = destination.root.id.clone();
                        absorbed.channel_id = target_channel.id.clone();
                        absorbed.create_at = start + i as i64;
                        absorbed.update_at = now;
                        PostWrite::Update(absorbed)
                    })
                    .collect();
                let latest = start + writes.len() as i64 - 1;

                debug!(
                    user_id = %ctx.user_id,
                    source_root_id = %source.root.id,
                    target_root_id = %destination.root.id,
                    posts = source.num_posts(),
                    "merging thread"
                );
                *affected = source.post_ids();
                store.apply(&writes)?;

                let audit = self.audit();
                let result = MergeResult {
                    source_root_id: source.root.id.clone(),
                    source_channel_id: source_channel.id.clone(),
                    target_root_id: destination.root.id.clone(),
                    target_channel_id: target_channel.id.clone(),
                    post_ids: source.post_ids(),
                    permalink: audit.link(&target_channel, &destination.root.id),
                };
                if !request.silent {
                    audit.merged(executor, &source, &result, latest);
                }
                Ok(result)
            },
        )
    }
}
