use serde::{Deserialize, Serialize};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server accepted the connection
    Ready { user_id: String },

    /// A thread was re-homed into another channel
    ThreadMoved {
        root_id: String,
        from_channel_id: String,
        to_channel_id: String,
        post_ids: Vec<String>,
    },

    /// A thread was duplicated into another channel
    ThreadCopied {
        source_root_id: String,
        new_root_id: String,
        from_channel_id: String,
        to_channel_id: String,
        post_ids: Vec<String>,
    },

    /// One thread was absorbed into another
    ThreadMerged {
        source_root_id: String,
        target_root_id: String,
        from_channel_id: String,
        to_channel_id: String,
        post_ids: Vec<String>,
    },

    /// A standalone message became a reply
    MessageAttached {
        post_id: String,
        root_id: String,
        channel_id: String,
    },
}

impl GatewayEvent {
    /// Channels whose subscribers should see this event.
    /// An empty list means the event is global.
    pub fn channel_ids(&self) -> Vec<&str> {
        match self {
            Self::Ready { .. } => vec![],
            Self::ThreadMoved { from_channel_id, to_channel_id, .. }
            | Self::ThreadCopied { from_channel_id, to_channel_id, .. }
            | Self::ThreadMerged { from_channel_id, to_channel_id, .. } => {
                if from_channel_id == to_channel_id {
                    vec![from_channel_id.as_str()]
                } else {
                    vec![from_channel_id.as_str(), to_channel_id.as_str()]
                }
            }
            Self::MessageAttached { channel_id, .. } => vec![channel_id.as_str()],
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Receive channel-scoped events for these channels.
    Subscribe { channel_ids: Vec<String> },

    /// Stop receiving events for these channels.
    Unsubscribe { channel_ids: Vec<String> },
}
