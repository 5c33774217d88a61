use serde::{Deserialize, Serialize};

use crate::models::Post;

// -- Settings --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsResponse {
    pub enable_web_ui: bool,
    pub enable_merge_thread: bool,
}

// -- Channels --

#[derive(Debug, Deserialize)]
pub struct ChannelsForTeamRequest {
    pub team_id: String,
}

// -- Wrangling --

/// Body for both `/move-thread` and `/copy-thread`.
#[derive(Debug, Deserialize)]
pub struct MoveThreadRequest {
    pub post_id: String,
    pub channel_id: String,
    /// Channel the user was looking at when they picked the action.
    #[serde(default)]
    pub original_channel_id: Option<String>,
    #[serde(default)]
    pub show_root_message_in_summary: bool,
    #[serde(default)]
    pub silent: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeThreadRequest {
    pub post_id: String,
    pub target_post_id: String,
    #[serde(default)]
    pub silent: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttachMessageRequest {
    pub post_id: String,
    pub target_post_id: String,
}

/// Outcome of a move, copy, merge or attach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrangleResponse {
    pub root_id: String,
    pub channel_id: String,
    pub post_ids: Vec<String>,
    pub post_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadResponse {
    pub root: Post,
    pub replies: Vec<Post>,
    pub count: usize,
}

// -- Slash commands --

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    /// Set when the command was typed inside a thread.
    #[serde(default)]
    pub root_id: Option<String>,
}

/// Slash-command registration details for the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub trigger: String,
    pub display_name: String,
    pub description: String,
    pub auto_complete: bool,
    pub auto_complete_desc: String,
    pub auto_complete_hint: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Ephemeral,
    InChannel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub response_type: ResponseType,
    pub text: String,
    pub username: String,
}

impl CommandResponse {
    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::Ephemeral,
            text: text.into(),
            username: "wrangler".to_string(),
        }
    }

    pub fn in_channel(text: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::InChannel,
            text: text.into(),
            username: "wrangler".to_string(),
        }
    }
}
