use crate::Database;
use crate::models::{
    CHANNEL_COLUMNS, POST_COLUMNS, REACTION_COLUMNS, TEAM_COLUMNS, USER_COLUMNS,
    attribution_json, channel_from_row, file_ids_json, post_from_row, reaction_from_row, team_from_row,
    user_from_row,
};
use anyhow::Result;
use rusqlite::Connection;
use wrangler_types::models::{Channel, ChannelType, Post, Reaction, Team, User};

impl Database {
    // -- Users --

    pub fn create_user(&self, username: &str, email: &str, is_bot: bool) -> Result<User> {
        let user = User {
            id: new_id(),
            username: username.to_string(),
            email: email.to_string(),
            is_bot,
        };
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, is_bot) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![user.id, user.username, user.email, user.is_bot],
            )?;
            Ok(())
        })?;
        Ok(user)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    /// The bot account the audit trail posts as. Created on first start.
    pub fn ensure_bot(&self, username: &str) -> Result<User> {
        if let Some(existing) = self.get_user_by_username(username)? {
            return Ok(existing);
        }
        self.create_user(username, "", true)
    }

    // -- Teams --

    pub fn create_team(&self, name: &str, display_name: &str) -> Result<Team> {
        let team = Team {
            id: new_id(),
            name: name.to_string(),
            display_name: display_name.to_string(),
        };
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO teams (id, name, display_name) VALUES (?1, ?2, ?3)",
                (&team.id, &team.name, &team.display_name),
            )?;
            Ok(())
        })?;
        Ok(team)
    }

    // -- Channels --

    pub fn create_channel(
        &self,
        team_id: &str,
        channel_type: ChannelType,
        name: &str,
        display_name: &str,
    ) -> Result<Channel> {
        let channel = Channel {
            id: new_id(),
            team_id: team_id.to_string(),
            channel_type,
            name: name.to_string(),
            display_name: display_name.to_string(),
        };
        self.with_conn_mut(|conn| {
            insert_channel(conn, &channel)?;
            Ok(())
        })?;
        Ok(channel)
    }

    /// Joining a team channel also joins its team.
    pub fn add_channel_member(&self, channel_id: &str, user_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            add_member(&tx, channel_id, user_id)?;
            tx.commit()?;
            Ok(())
        })
    }

    // -- Posts --

    pub fn insert_post(&self, post: &Post) -> Result<()> {
        self.with_conn_mut(|conn| insert_post(conn, post))
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

// -- Query helpers (operate on a borrowed connection) --

pub(crate) fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    conn.query_row(&sql, [id], user_from_row).optional()
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS);
    conn.query_row(&sql, [username], user_from_row).optional()
}

pub(crate) fn query_team(conn: &Connection, id: &str) -> Result<Option<Team>> {
    let sql = format!("SELECT {} FROM teams WHERE id = ?1", TEAM_COLUMNS);
    conn.query_row(&sql, [id], team_from_row).optional()
}

pub(crate) fn query_teams_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Team>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name, t.display_name
         FROM teams t
         JOIN team_members m ON m.team_id = t.id
         WHERE m.user_id = ?1
         ORDER BY t.display_name",
    )?;
    let rows = stmt
        .query_map([user_id], team_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn query_channel(conn: &Connection, id: &str) -> Result<Option<Channel>> {
    let sql = format!("SELECT {} FROM channels WHERE id = ?1", CHANNEL_COLUMNS);
    conn.query_row(&sql, [id], channel_from_row).optional()
}

pub(crate) fn query_channels_for_team_for_user(
    conn: &Connection,
    team_id: &str,
    user_id: &str,
) -> Result<Vec<Channel>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.team_id, c.type, c.name, c.display_name
         FROM channels c
         JOIN channel_members m ON m.channel_id = c.id
         WHERE c.team_id = ?1 AND m.user_id = ?2
         ORDER BY c.display_name",
    )?;
    let rows = stmt
        .query_map([team_id, user_id], channel_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn query_is_member(conn: &Connection, channel_id: &str, user_id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM channel_members WHERE channel_id = ?1 AND user_id = ?2",
            [channel_id, user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn query_post(conn: &Connection, id: &str) -> Result<Option<Post>> {
    let sql = format!(
        "SELECT {} FROM posts WHERE id = ?1 AND delete_at = 0",
        POST_COLUMNS
    );
    conn.query_row(&sql, [id], post_from_row).optional()
}

pub(crate) fn query_thread_posts(conn: &Connection, root_id: &str) -> Result<Vec<Post>> {
    let sql = format!(
        "SELECT {} FROM posts WHERE (id = ?1 OR root_id = ?1) AND delete_at = 0",
        POST_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([root_id], post_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn query_recent_posts(
    conn: &Connection,
    channel_id: &str,
    limit: usize,
) -> Result<Vec<Post>> {
    let sql = format!(
        "SELECT {} FROM posts
         WHERE channel_id = ?1 AND delete_at = 0
         ORDER BY create_at DESC, id DESC
         LIMIT ?2",
        POST_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params![channel_id, limit as i64], post_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn query_reactions(conn: &Connection, post_id: &str) -> Result<Vec<Reaction>> {
    let sql = format!(
        "SELECT {} FROM reactions WHERE post_id = ?1 ORDER BY create_at, user_id",
        REACTION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([post_id], reaction_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// -- Write helpers --

pub(crate) fn insert_channel(conn: &Connection, channel: &Channel) -> Result<usize> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO channels (id, team_id, type, name, display_name)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            &channel.id,
            &channel.team_id,
            channel.channel_type.as_str(),
            &channel.name,
            &channel.display_name,
        ),
    )?;
    Ok(changed)
}

pub(crate) fn add_member(conn: &Connection, channel_id: &str, user_id: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO channel_members (channel_id, user_id) VALUES (?1, ?2)",
        [channel_id, user_id],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO team_members (team_id, user_id)
         SELECT team_id, ?2 FROM channels WHERE id = ?1 AND team_id != ''",
        [channel_id, user_id],
    )?;
    Ok(())
}

pub(crate) fn insert_post(conn: &Connection, post: &Post) -> Result<()> {
    conn.execute(
        "INSERT INTO posts
         (id, channel_id, root_id, user_id, message, type, create_at, update_at, delete_at,
          attribution, file_ids)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
            post.id,
            post.channel_id,
            post.root_id,
            post.user_id,
            post.message,
            post.post_type,
            post.create_at,
            post.update_at,
            post.delete_at,
            attribution_json(post)?,
            file_ids_json(post)?,
        ],
    )?;
    Ok(())
}

/// Returns the number of rows touched; 0 means the post is gone.
pub(crate) fn update_post(conn: &Connection, post: &Post) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE posts SET
            channel_id = ?2, root_id = ?3, user_id = ?4, message = ?5, type = ?6,
            create_at = ?7, update_at = ?8, delete_at = ?9, attribution = ?10, file_ids = ?11
         WHERE id = ?1 AND delete_at = 0",
        rusqlite::params![
            post.id,
            post.channel_id,
            post.root_id,
            post.user_id,
            post.message,
            post.post_type,
            post.create_at,
            post.update_at,
            post.delete_at,
            attribution_json(post)?,
            file_ids_json(post)?,
        ],
    )?;
    Ok(changed)
}

pub(crate) fn insert_reaction(conn: &Connection, reaction: &Reaction) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO reactions (post_id, user_id, emoji_name, create_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            reaction.post_id,
            reaction.user_id,
            reaction.emoji_name,
            reaction.create_at
        ],
    )?;
    Ok(())
}

// -- Helpers --

trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
