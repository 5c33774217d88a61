use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                email       TEXT NOT NULL DEFAULT '',
                is_bot      INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE teams (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL UNIQUE,
                display_name    TEXT NOT NULL
            );

            CREATE TABLE team_members (
                team_id     TEXT NOT NULL REFERENCES teams(id),
                user_id     TEXT NOT NULL REFERENCES users(id),
                PRIMARY KEY (team_id, user_id)
            );

            -- team_id is empty for direct and group channels
            CREATE TABLE channels (
                id              TEXT PRIMARY KEY,
                team_id         TEXT NOT NULL DEFAULT '',
                type            TEXT NOT NULL,
                name            TEXT NOT NULL,
                display_name    TEXT NOT NULL
            );

            CREATE TABLE channel_members (
                channel_id  TEXT NOT NULL REFERENCES channels(id),
                user_id     TEXT NOT NULL REFERENCES users(id),
                PRIMARY KEY (channel_id, user_id)
            );

            CREATE TABLE posts (
                id          TEXT PRIMARY KEY,
                channel_id  TEXT NOT NULL REFERENCES channels(id),
                root_id     TEXT NOT NULL DEFAULT '',
                user_id     TEXT NOT NULL,
                message     TEXT NOT NULL,
                type        TEXT NOT NULL DEFAULT '',
                create_at   INTEGER NOT NULL,
                update_at   INTEGER NOT NULL,
                delete_at   INTEGER NOT NULL DEFAULT 0,
                attribution TEXT
            );

            CREATE INDEX idx_posts_channel ON posts(channel_id, create_at);
            CREATE INDEX idx_posts_root ON posts(root_id);

            CREATE TABLE reactions (
                post_id     TEXT NOT NULL REFERENCES posts(id),
                user_id     TEXT NOT NULL,
                emoji_name  TEXT NOT NULL,
                create_at   INTEGER NOT NULL,
                PRIMARY KEY (post_id, user_id, emoji_name)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (post attachments)");
        conn.execute_batch(
            "
            ALTER TABLE posts ADD COLUMN file_ids TEXT NOT NULL DEFAULT '[]';

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
