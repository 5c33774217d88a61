use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Post types starting with this prefix are generated by the platform, never typed by a user.
pub const SYSTEM_POST_TYPE_PREFIX: &str = "system_";

/// Batched join/leave activity collapsed into a single synthetic post.
pub const POST_TYPE_COMBINED_USER_ACTIVITY: &str = "system_combined_user_activity";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub is_bot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub display_name: String,
}

/// Channel visibility, using the host platform's single-letter codes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    #[serde(rename = "O")]
    Open,
    #[serde(rename = "P")]
    Private,
    #[serde(rename = "D")]
    Direct,
    #[serde(rename = "G")]
    Group,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "O",
            Self::Private => "P",
            Self::Direct => "D",
            Self::Group => "G",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "O" => Some(Self::Open),
            "P" => Some(Self::Private),
            "D" => Some(Self::Direct),
            "G" => Some(Self::Group),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    /// Empty for direct and group channels, which live outside any team.
    #[serde(default)]
    pub team_id: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub name: String,
    pub display_name: String,
}

impl Channel {
    pub fn is_group_or_direct(&self) -> bool {
        matches!(self.channel_type, ChannelType::Direct | ChannelType::Group)
    }
}

/// Where a copied or merged post originally lived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub original_post_id: String,
    pub original_user_id: String,
    pub original_channel_id: String,
    pub original_create_at: i64,
}

impl Attribution {
    pub fn of(post: &Post) -> Self {
        // A post that was already wrangled keeps pointing at its first home.
        if let Some(existing) = &post.attribution {
            return existing.clone();
        }
        Self {
            original_post_id: post.id.clone(),
            original_user_id: post.user_id.clone(),
            original_channel_id: post.channel_id.clone(),
            original_create_at: post.create_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub channel_id: String,
    /// Empty for root posts.
    #[serde(default)]
    pub root_id: String,
    pub user_id: String,
    pub message: String,
    #[serde(rename = "type", default)]
    pub post_type: String,
    /// Unix milliseconds.
    pub create_at: i64,
    #[serde(default)]
    pub update_at: i64,
    /// Non-zero once the post is soft-deleted.
    #[serde(default)]
    pub delete_at: i64,
    /// Attached files. Wrangled posts keep pointing at the same files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<Attribution>,
}

impl Post {
    pub fn is_root(&self) -> bool {
        self.root_id.is_empty()
    }

    pub fn is_deleted(&self) -> bool {
        self.delete_at != 0
    }

    pub fn is_system_message(&self) -> bool {
        self.post_type.starts_with(SYSTEM_POST_TYPE_PREFIX)
    }

    pub fn is_combined_activity(&self) -> bool {
        self.post_type == POST_TYPE_COMBINED_USER_ACTIVITY
    }

    pub fn created(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.create_at)
            .single()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub post_id: String,
    pub user_id: String,
    pub emoji_name: String,
    pub create_at: i64,
}
