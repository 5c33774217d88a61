//! Row mapping between SQLite and the shared models.

use rusqlite::Row;
use wrangler_types::models::{Attribution, Channel, ChannelType, Post, Reaction, Team, User};

pub const POST_COLUMNS: &str = "id, channel_id, root_id, user_id, message, type, create_at, \
     update_at, delete_at, attribution, file_ids";
pub const CHANNEL_COLUMNS: &str = "id, team_id, type, name, display_name";
pub const USER_COLUMNS: &str = "id, username, email, is_bot";
pub const TEAM_COLUMNS: &str = "id, name, display_name";
pub const REACTION_COLUMNS: &str = "post_id, user_id, emoji_name, create_at";

/// Attribution and file ids are stored as JSON text.
pub fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    let attribution: Option<String> = row.get(9)?;
    let attribution = attribution
        .map(|json| serde_json::from_str::<Attribution>(&json))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
        })?;
    let file_ids: String = row.get(10)?;
    let file_ids = serde_json::from_str::<Vec<String>>(&file_ids).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Post {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        root_id: row.get(2)?,
        user_id: row.get(3)?,
        message: row.get(4)?,
        post_type: row.get(5)?,
        create_at: row.get(6)?,
        update_at: row.get(7)?,
        delete_at: row.get(8)?,
        file_ids,
        attribution,
    })
}

pub fn channel_from_row(row: &Row<'_>) -> rusqlite::Result<Channel> {
    let code: String = row.get(2)?;
    let channel_type = ChannelType::parse(&code).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown channel type {}", code).into(),
        )
    })?;

    Ok(Channel {
        id: row.get(0)?,
        team_id: row.get(1)?,
        channel_type,
        name: row.get(3)?,
        display_name: row.get(4)?,
    })
}

pub fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        is_bot: row.get(3)?,
    })
}

pub fn team_from_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        name: row.get(1)?,
        display_name: row.get(2)?,
    })
}

pub fn reaction_from_row(row: &Row<'_>) -> rusqlite::Result<Reaction> {
    Ok(Reaction {
        post_id: row.get(0)?,
        user_id: row.get(1)?,
        emoji_name: row.get(2)?,
        create_at: row.get(3)?,
    })
}

pub fn file_ids_json(post: &Post) -> anyhow::Result<String> {
    Ok(serde_json::to_string(&post.file_ids)?)
}

pub fn attribution_json(post: &Post) -> anyhow::Result<Option<String>> {
    Ok(post
        .attribution
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?)
}
