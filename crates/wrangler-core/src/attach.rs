//! Turning a standalone message into a reply.

use tracing::debug;

use wrangler_types::models::User;

use crate::engine::Wrangler;
use crate::error::{Result, WranglerError};
use crate::policy;
use crate::request::{AttachRequest, AttachResult, RequestContext};
use crate::resolver::{self, ThreadResolver};
use crate::store::PostWrite;

impl Wrangler {
    pub(crate) fn attach(
        &self,
        ctx: &RequestContext,
        executor: &User,
        request: &AttachRequest,
        affected: &mut Vec<String>,
    ) -> Result<AttachResult> {
        if resolver::is_self_target(&request.post_id, &request.destination_post_id) {
            return Err(WranglerError::InvalidAttach(
                "Error: the two provided message IDs should not be the same".to_string(),
            ));
        }

        let store = self.store();
        let resolver = ThreadResolver::new(store);

        self.with_thread_lock(
            || {
                Ok(vec![
                    resolver.resolve_root(&request.post_id)?.id,
                    resolver.resolve_root(&request.destination_post_id)?.id,
                ])
            },
            || {
                let floating = resolver.get_post(&request.post_id)?;
                resolver::ensure_eligible(&floating)?;
                let destination = resolver.get_post(&request.destination_post_id)?;
                resolver::ensure_eligible(&destination)?;

                if !floating.is_root() {
                    return Err(WranglerError::InvalidAttach(
                        "Error: the message to be attached is already part of a thread"
                            .to_string(),
                    ));
                }
                if resolver.resolve_thread(&floating.id)?.count() > 0 {
                    return Err(WranglerError::InvalidAttach(
                        "Error: the message to be attached already has replies; merge the threads instead"
                            .to_string(),
                    ));
                }

                // A reply given as the destination stands for its thread.
                let root = resolver.resolve_root(&destination.id)?;
                resolver::ensure_eligible(&root)?;
                if floating.channel_id != root.channel_id {
                    return Err(WranglerError::InvalidAttach(
                        "Error: unable to attach message to a thread in another channel"
                            .to_string(),
                    ));
                }
                if floating.create_at < root.create_at {
                    return Err(WranglerError::InvalidAttach(
                        "Error: the message to be attached is older than the thread it would join"
                            .to_string(),
                    ));
                }
                policy::check_invocation(ctx, &floating)?;
                policy::check_membership(store, &ctx.user_id, &[floating.channel_id.as_str()])?;
                let channel = policy::get_channel(store, &floating.channel_id)?;

                let mut attached = floating.clone();
                attached.root_id = root.id.clone();
                attached.update_at = crate::now_millis();

                debug!(
                    user_id = %ctx.user_id,
                    post_id = %floating.id,
                    root_id = %root.id,
                    "attaching message"
                );
                *affected = vec![floating.id.clone()];
                store.apply(&[PostWrite::Update(attached)])?;

                let audit = self.audit();
                let result = AttachResult {
                    post_id: floating.id.clone(),
                    root_id: root.id.clone(),
                    channel_id: floating.channel_id.clone(),
                    permalink: audit.link(&channel, &floating.id),
                };
                audit.attached(executor, &floating, &result);
                Ok(result)
            },
        )
    }
}
