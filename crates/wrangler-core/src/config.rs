use thiserror::Error;

use wrangler_types::models::User;

pub const DEFAULT_MOVE_THREAD_MESSAGE: &str =
    "@{executor} wrangled a thread you started to a new channel for you: {postLink}";
pub const DEFAULT_COPY_THREAD_MESSAGE: &str =
    "Someone wrangled a thread you started to a new channel for you: {postLink}";
pub const DEFAULT_MERGE_THREAD_MESSAGE: &str =
    "@{executor} merged a thread you started into another thread: {postLink}";
pub const DEFAULT_ATTACH_MESSAGE_MESSAGE: &str =
    "@{executor} attached a message you sent to a thread: {postLink}";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} value {value} is not a valid integer")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} ({value}) must be greater than 0")]
    NotPositive { key: &'static str, value: i64 },

    #[error("{key} value {value} is not a valid boolean")]
    InvalidBool { key: &'static str, value: String },
}

/// Plugin settings. Read once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Base URL used to build permalinks.
    pub site_url: String,
    /// When set, only users whose email ends with this value may wrangle.
    pub allowed_email_domain: String,
    pub enable_web_ui: bool,
    pub enable_merge_thread: bool,
    pub command_autocomplete: bool,
    /// 0 means unlimited.
    pub move_thread_max_count: usize,
    pub move_to_another_team: bool,
    pub move_from_private: bool,
    pub move_from_direct: bool,
    pub move_from_group: bool,
    pub move_thread_message: String,
    pub copy_thread_message: String,
    pub merge_thread_message: String,
    pub attach_message_message: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            site_url: "http://localhost:8065".to_string(),
            allowed_email_domain: String::new(),
            enable_web_ui: false,
            enable_merge_thread: false,
            command_autocomplete: false,
            move_thread_max_count: 0,
            move_to_another_team: false,
            move_from_private: false,
            move_from_direct: false,
            move_from_group: false,
            move_thread_message: DEFAULT_MOVE_THREAD_MESSAGE.to_string(),
            copy_thread_message: DEFAULT_COPY_THREAD_MESSAGE.to_string(),
            merge_thread_message: DEFAULT_MERGE_THREAD_MESSAGE.to_string(),
            attach_message_message: DEFAULT_ATTACH_MESSAGE_MESSAGE.to_string(),
        }
    }
}

impl Configuration {
    /// Load from `WRANGLER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let string = |key: &str, default: String| {
            lookup(key).filter(|v| !v.is_empty()).unwrap_or(default)
        };

        Ok(Self {
            site_url: string("WRANGLER_SITE_URL", defaults.site_url)
                .trim_end_matches('/')
                .to_string(),
            allowed_email_domain: string("WRANGLER_ALLOWED_EMAIL_DOMAIN", String::new()),
            enable_web_ui: parse_bool("WRANGLER_ENABLE_WEB_UI", lookup("WRANGLER_ENABLE_WEB_UI"))?,
            enable_merge_thread: parse_bool(
                "WRANGLER_ENABLE_MERGE_THREAD",
                lookup("WRANGLER_ENABLE_MERGE_THREAD"),
            )?,
            command_autocomplete: parse_bool(
                "WRANGLER_COMMAND_AUTOCOMPLETE",
                lookup("WRANGLER_COMMAND_AUTOCOMPLETE"),
            )?,
            move_thread_max_count: parse_max_count(
                "WRANGLER_MOVE_THREAD_MAX_COUNT",
                lookup("WRANGLER_MOVE_THREAD_MAX_COUNT"),
            )?,
            move_to_another_team: parse_bool(
                "WRANGLER_MOVE_TO_ANOTHER_TEAM",
                lookup("WRANGLER_MOVE_TO_ANOTHER_TEAM"),
            )?,
            move_from_private: parse_bool(
                "WRANGLER_MOVE_FROM_PRIVATE",
                lookup("WRANGLER_MOVE_FROM_PRIVATE"),
            )?,
            move_from_direct: parse_bool(
                "WRANGLER_MOVE_FROM_DIRECT",
                lookup("WRANGLER_MOVE_FROM_DIRECT"),
            )?,
            move_from_group: parse_bool("WRANGLER_MOVE_FROM_GROUP", lookup("WRANGLER_MOVE_FROM_GROUP"))?,
            move_thread_message: string("WRANGLER_MOVE_THREAD_MESSAGE", defaults.move_thread_message),
            copy_thread_message: string("WRANGLER_COPY_THREAD_MESSAGE", defaults.copy_thread_message),
            merge_thread_message: string(
                "WRANGLER_MERGE_THREAD_MESSAGE",
                defaults.merge_thread_message,
            ),
            attach_message_message: string(
                "WRANGLER_ATTACH_MESSAGE_MESSAGE",
                defaults.attach_message_message,
            ),
        })
    }

    /// Email-domain gate. Always passes when no domain is configured.
    pub fn user_allowed(&self, user: &User) -> bool {
        self.allowed_email_domain.is_empty() || user.email.ends_with(&self.allowed_email_domain)
    }
}

fn parse_bool(key: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        _ => Err(ConfigError::InvalidBool { key, value }),
    }
}

/// Empty means unlimited; anything else must be a positive integer.
fn parse_max_count(key: &'static str, value: Option<String>) -> Result<usize, ConfigError> {
    let value = match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => return Ok(0),
    };
    let max: i64 = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber { key, value: value.clone() })?;
    if max < 1 {
        return Err(ConfigError::NotPositive { key, value: max });
    }
    Ok(max as usize)
}
