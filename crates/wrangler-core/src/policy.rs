//! Configuration gates and permission checks shared by the engines.

use wrangler_types::models::{Channel, ChannelType, Post, User};

use crate::config::Configuration;
use crate::error::{Result, WranglerError};
use crate::request::RequestContext;
use crate::resolver::ResolvedThread;
use crate::store::PostStore;

/// Source channel type and cross-team gates.
pub(crate) fn check_channel_gates(
    config: &Configuration,
    source: &Channel,
    target: &Channel,
) -> Result<()> {
    let denied = match source.channel_type {
        ChannelType::Private if !config.move_from_private => Some("private channels"),
        ChannelType::Direct if !config.move_from_direct => Some("direct message channels"),
        ChannelType::Group if !config.move_from_group => Some("group message channels"),
        _ => None,
    };
    if let Some(kind) = denied {
        return Err(WranglerError::NotAllowed(format!(
            "Wrangler is currently configured to not allow moving posts from {}",
            kind
        )));
    }

    // Direct and group channels have no team, so the team gate does not apply.
    if !source.is_group_or_direct()
        && !config.move_to_another_team
        && target.team_id != source.team_id
    {
        return Err(WranglerError::NotAllowed(
            "Wrangler is currently configured to not allow moving messages to different teams"
                .to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn check_thread_size(config: &Configuration, thread: &ResolvedThread) -> Result<()> {
    let max = config.move_thread_max_count;
    if max != 0 && thread.num_posts() > max {
        return Err(WranglerError::NotAllowed(format!(
            "Error: the thread is {} posts long, but this command is configured to only move threads of up to {} posts",
            thread.num_posts(),
            max
        )));
    }
    Ok(())
}

/// Commands must be issued from the channel holding the thread, never from
/// inside the thread itself. REST requests carry no channel and skip this.
pub(crate) fn check_invocation(ctx: &RequestContext, root: &Post) -> Result<()> {
    if ctx
        .channel_id
        .as_deref()
        .is_some_and(|channel_id| channel_id != root.channel_id)
    {
        return Err(WranglerError::NotAllowed(
            "Error: this command must be run from the channel containing the post".to_string(),
        ));
    }
    if ctx.root_id.as_deref() == Some(root.id.as_str()) {
        return Err(WranglerError::NotAllowed(
            "Error: this command cannot be run from inside the thread; please run directly in the channel containing the thread"
                .to_string(),
        ));
    }
    Ok(())
}

/// The user must belong to every channel involved.
pub(crate) fn check_membership(
    store: &dyn PostStore,
    user_id: &str,
    channel_ids: &[&str],
) -> Result<()> {
    for channel_id in channel_ids {
        if !store.is_channel_member(channel_id, user_id)? {
            return Err(WranglerError::PermissionDenied(format!(
                "Error: channel with ID {} doesn't exist or you are not a member",
                channel_id
            )));
        }
    }
    Ok(())
}

/// Look up the caller and apply the email-domain gate.
pub(crate) fn authorize_user(
    store: &dyn PostStore,
    config: &Configuration,
    user_id: &str,
) -> Result<User> {
    let user = store
        .get_user(user_id)?
        .ok_or_else(|| WranglerError::not_found("user", user_id))?;
    if !config.user_allowed(&user) {
        return Err(WranglerError::PermissionDenied(
            "Permission denied. Please talk to your system administrator to get access."
                .to_string(),
        ));
    }
    Ok(user)
}

pub(crate) fn get_channel(store: &dyn PostStore, channel_id: &str) -> Result<Channel> {
    store
        .get_channel(channel_id)?
        .ok_or_else(|| WranglerError::not_found("channel", channel_id))
}
