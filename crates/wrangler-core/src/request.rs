//! Typed wrangle requests and their results.

use wrangler_types::events::GatewayEvent;

/// Who is asking, and from where.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: String,
    /// Channel the request was issued from, if any (slash commands).
    pub channel_id: Option<String>,
    /// Set when the request was issued from inside a thread.
    pub root_id: Option<String>,
}

impl RequestContext {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    pub fn in_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn in_thread(mut self, root_id: impl Into<String>) -> Self {
        self.root_id = Some(root_id.into()).filter(|id: &String| !id.is_empty());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationMode {
    Move,
    Copy,
}

impl RelocationMode {
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Copy => "copy",
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::Move => "move thread",
            Self::Copy => "copy thread",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelocationOptions {
    pub show_root_in_summary: bool,
    pub silent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationRequest {
    pub post_id: String,
    pub target_channel_id: String,
    pub mode: RelocationMode,
    pub options: RelocationOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    pub source_post_id: String,
    pub destination_post_id: String,
    pub silent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachRequest {
    pub post_id: String,
    pub destination_post_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WranglerRequest {
    Relocate(RelocationRequest),
    Merge(MergeRequest),
    Attach(AttachRequest),
}

impl WranglerRequest {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Relocate(req) => req.mode.operation(),
            Self::Merge(_) => "merge thread",
            Self::Attach(_) => "attach message",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationResult {
    pub mode: RelocationMode,
    pub source_root_id: String,
    pub source_channel_id: String,
    /// Same as `source_root_id` for a move.
    pub new_root_id: String,
    pub target_channel_id: String,
    /// Root first, then replies, as they now exist in the target channel.
    pub post_ids: Vec<String>,
    pub permalink: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub source_root_id: String,
    pub source_channel_id: String,
    pub target_root_id: String,
    pub target_channel_id: String,
    /// Absorbed posts in their new order.
    pub post_ids: Vec<String>,
    pub permalink: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachResult {
    pub post_id: String,
    pub root_id: String,
    pub channel_id: String,
    pub permalink: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WrangleOutcome {
    Relocated(RelocationResult),
    Merged(MergeResult),
    Attached(AttachResult),
}

impl WrangleOutcome {
    /// Root of the thread the user should look at afterwards.
    pub fn root_id(&self) -> &str {
        match self {
            Self::Relocated(r) => &r.new_root_id,
            Self::Merged(r) => &r.target_root_id,
            Self::Attached(r) => &r.root_id,
        }
    }

    pub fn channel_id(&self) -> &str {
        match self {
            Self::Relocated(r) => &r.target_channel_id,
            Self::Merged(r) => &r.target_channel_id,
            Self::Attached(r) => &r.channel_id,
        }
    }

    pub fn post_ids(&self) -> Vec<String> {
        match self {
            Self::Relocated(r) => r.post_ids.clone(),
            Self::Merged(r) => r.post_ids.clone(),
            Self::Attached(r) => vec![r.post_id.clone()],
        }
    }

    /// Text shown to the user who ran the command.
    pub fn summary(&self) -> String {
        match self {
            Self::Relocated(r) => {
                let verb = match r.mode {
                    RelocationMode::Move => "moved",
                    RelocationMode::Copy => "copied",
                };
                format!("A thread has been {} to {}\n", verb, r.permalink)
            }
            Self::Merged(r) => format!(
                "A thread with {} message(s) has been merged into {}\n",
                r.post_ids.len(),
                r.permalink
            ),
            Self::Attached(r) => format!("Message successfully attached to thread: {}\n", r.permalink),
        }
    }

    pub fn event(&self) -> GatewayEvent {
        match self {
            Self::Relocated(r) => match r.mode {
                RelocationMode::Move => GatewayEvent::ThreadMoved {
                    root_id: r.new_root_id.clone(),
                    from_channel_id: r.source_channel_id.clone(),
                    to_channel_id: r.target_channel_id.clone(),
                    post_ids: r.post_ids.clone(),
                },
                RelocationMode::Copy => GatewayEvent::ThreadCopied {
                    source_root_id: r.source_root_id.clone(),
                    new_root_id: r.new_root_id.clone(),
                    from_channel_id: r.source_channel_id.clone(),
                    to_channel_id: r.target_channel_id.clone(),
                    post_ids: r.post_ids.clone(),
                },
            },
            Self::Merged(r) => GatewayEvent::ThreadMerged {
                source_root_id: r.source_root_id.clone(),
                target_root_id: r.target_root_id.clone(),
                from_channel_id: r.source_channel_id.clone(),
                to_channel_id: r.target_channel_id.clone(),
                post_ids: r.post_ids.clone(),
            },
            Self::Attached(r) => GatewayEvent::MessageAttached {
                post_id: r.post_id.clone(),
                root_id: r.root_id.clone(),
                channel_id: r.channel_id.clone(),
            },
        }
    }
}
