use anyhow::{Result, bail};
use rusqlite::{Connection, ErrorCode, TransactionBehavior};
use tracing::debug;
use wrangler_core::store::{PostStore, PostWrite, StoreError, StoreResult};
use wrangler_types::models::{Channel, ChannelType, Post, Reaction, Team, User};

use crate::Database;
use crate::queries::{
    add_member, insert_channel, insert_post, insert_reaction, query_channel,
    query_channels_for_team_for_user, query_is_member, query_post, query_reactions,
    query_recent_posts, query_team, query_teams_for_user, query_thread_posts, query_user_by_id,
    update_post,
};

impl Database {
    fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> StoreResult<T> {
        self.with_conn(f).map_err(classify)
    }
}

/// Busy and locked databases are worth retrying; everything else is not.
fn classify(err: anyhow::Error) -> StoreError {
    let transient = err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(e, _))
                if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        )
    });
    if transient {
        StoreError::Transient(err.to_string())
    } else {
        StoreError::Backend(err)
    }
}

fn direct_channel_id(user_a: &str, user_b: &str) -> String {
    if user_a <= user_b {
        format!("{}__{}", user_a, user_b)
    } else {
        format!("{}__{}", user_b, user_a)
    }
}

fn apply_write(conn: &Connection, write: &PostWrite) -> Result<()> {
    match write {
        PostWrite::Create(post) => insert_post(conn, post),
        PostWrite::Update(post) => {
            if update_post(conn, post)? == 0 {
                bail!("post {} no longer exists", post.id);
            }
            Ok(())
        }
        PostWrite::AddReaction(reaction) => insert_reaction(conn, reaction),
    }
}

impl PostStore for Database {
    fn get_post(&self, post_id: &str) -> StoreResult<Option<Post>> {
        self.read(|conn| query_post(conn, post_id))
    }

    fn get_thread_posts(&self, root_id: &str) -> StoreResult<Vec<Post>> {
        self.read(|conn| query_thread_posts(conn, root_id))
    }

    fn get_channel(&self, channel_id: &str) -> StoreResult<Option<Channel>> {
        self.read(|conn| query_channel(conn, channel_id))
    }

    fn get_team(&self, team_id: &str) -> StoreResult<Option<Team>> {
        self.read(|conn| query_team(conn, team_id))
    }

    fn get_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        self.read(|conn| query_user_by_id(conn, user_id))
    }

    fn is_channel_member(&self, channel_id: &str, user_id: &str) -> StoreResult<bool> {
        self.read(|conn| query_is_member(conn, channel_id, user_id))
    }

    fn teams_for_user(&self, user_id: &str) -> StoreResult<Vec<Team>> {
        self.read(|conn| query_teams_for_user(conn, user_id))
    }

    fn channels_for_team_for_user(
        &self,
        team_id: &str,
        user_id: &str,
    ) -> StoreResult<Vec<Channel>> {
        self.read(|conn| query_channels_for_team_for_user(conn, team_id, user_id))
    }

    fn recent_channel_posts(&self, channel_id: &str, limit: usize) -> StoreResult<Vec<Post>> {
        self.read(|conn| query_recent_posts(conn, channel_id, limit))
    }

    fn get_reactions(&self, post_id: &str) -> StoreResult<Vec<Reaction>> {
        self.read(|conn| query_reactions(conn, post_id))
    }

    fn direct_channel(&self, user_a: &str, user_b: &str) -> StoreResult<Channel> {
        let id = direct_channel_id(user_a, user_b);
        let channel = Channel {
            id: id.clone(),
            team_id: String::new(),
            channel_type: ChannelType::Direct,
            name: id,
            display_name: String::new(),
        };
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if insert_channel(&tx, &channel)? > 0 {
                add_member(&tx, &channel.id, user_a)?;
                add_member(&tx, &channel.id, user_b)?;
                debug!("Created direct channel {}", channel.id);
            }
            tx.commit()?;
            Ok(())
        })
        .map_err(classify)?;
        Ok(channel)
    }

    fn apply(&self, writes: &[PostWrite]) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            for write in writes {
                apply_write(&tx, write)?;
            }
            tx.commit()?;
            debug!("Applied batch of {} writes", writes.len());
            Ok(())
        })
        .map_err(classify)
    }
}
