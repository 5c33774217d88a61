//! In-memory post store and fixtures for engine tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use wrangler_types::models::{Channel, ChannelType, Post, Reaction, Team, User};

use crate::config::Configuration;
use crate::engine::Wrangler;
use crate::retry::RetryPolicy;
use crate::store::{PostStore, PostWrite, StoreError, StoreResult};

#[derive(Debug, Default, Clone)]
struct State {
    users: HashMap<String, User>,
    teams: HashMap<String, Team>,
    channels: HashMap<String, Channel>,
    /// (channel_id, user_id)
    members: HashSet<(String, String)>,
    posts: HashMap<String, Post>,
    reactions: Vec<Reaction>,
}

impl State {
    fn write(&mut self, write: &PostWrite) -> StoreResult<()> {
        match write {
            PostWrite::Create(post) => {
                if self.posts.contains_key(&post.id) {
                    return Err(anyhow::anyhow!("post {} already exists", post.id).into());
                }
                self.posts.insert(post.id.clone(), post.clone());
            }
            PostWrite::Update(post) => match self.posts.get(&post.id) {
                Some(existing) if !existing.is_deleted() => {
                    self.posts.insert(post.id.clone(), post.clone());
                }
                _ => return Err(anyhow::anyhow!("post {} not found", post.id).into()),
            },
            PostWrite::AddReaction(reaction) => self.reactions.push(reaction.clone()),
        }
        Ok(())
    }
}

/// A [`PostStore`] over plain maps. Batches are applied to a copy that only
/// replaces the live state once every write succeeded.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    failing_applies: AtomicUsize,
    /// (reads to let through, reads to fail afterwards)
    read_faults: Mutex<(usize, usize)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn read(&self) -> StoreResult<MutexGuard<'_, State>> {
        let mut faults = self.read_faults.lock().unwrap();
        if faults.0 > 0 {
            faults.0 -= 1;
        } else if faults.1 > 0 {
            faults.1 -= 1;
            return Err(StoreError::Transient("database is locked".into()));
        }
        drop(faults);
        Ok(self.state())
    }

    /// Fail the next `n` batches with a transient error.
    pub fn fail_next_applies(&self, n: usize) {
        self.failing_applies.store(n, Ordering::SeqCst);
    }

    /// Let `skip` reads succeed, then fail the following `n`.
    pub fn fail_reads_after(&self, skip: usize, n: usize) {
        *self.read_faults.lock().unwrap() = (skip, n);
    }

    pub fn team(&self, id: &str, name: &str) -> Team {
        let team = Team {
            id: id.into(),
            name: name.into(),
            display_name: name.into(),
        };
        self.state().teams.insert(team.id.clone(), team.clone());
        team
    }

    pub fn user(&self, username: &str, email: &str) -> User {
        let user = User {
            id: crate::new_id(),
            username: username.into(),
            email: email.into(),
            is_bot: false,
        };
        self.state().users.insert(user.id.clone(), user.clone());
        user
    }

    pub fn bot(&self, username: &str) -> User {
        let user = User {
            id: crate::new_id(),
            username: username.into(),
            email: String::new(),
            is_bot: true,
        };
        self.state().users.insert(user.id.clone(), user.clone());
        user
    }

    pub fn channel(
        &self,
        team_id: &str,
        name: &str,
        channel_type: ChannelType,
        members: &[&User],
    ) -> Channel {
        let channel = Channel {
            id: crate::new_id(),
            team_id: team_id.into(),
            channel_type,
            name: name.into(),
            display_name: name.into(),
        };
        let mut state = self.state();
        state.channels.insert(channel.id.clone(), channel.clone());
        for member in members {
            state.members.insert((channel.id.clone(), member.id.clone()));
        }
        channel
    }

    /// Open channel without members.
    pub fn open_channel(&self, team_id: &str, name: &str) -> Channel {
        self.channel(team_id, name, ChannelType::Open, &[])
    }

    pub fn post(
        &self,
        channel: &Channel,
        root_id: &str,
        user_id: &str,
        message: &str,
        create_at: i64,
    ) -> Post {
        let post = Post {
            id: crate::new_id(),
            channel_id: channel.id.clone(),
            root_id: root_id.into(),
            user_id: user_id.into(),
            message: message.into(),
            post_type: String::new(),
            create_at,
            update_at: create_at,
            delete_at: 0,
            file_ids: Vec::new(),
            attribution: None,
        };
        self.state().posts.insert(post.id.clone(), post.clone());
        post
    }

    pub fn attach_files(&self, post_id: &str, file_ids: &[&str]) {
        if let Some(post) = self.state().posts.get_mut(post_id) {
            post.file_ids = file_ids.iter().map(|id| id.to_string()).collect();
        }
    }

    pub fn system_post(&self, channel: &Channel, post_type: &str, create_at: i64) -> Post {
        let mut post = self.post(channel, "", "system", "user joined the channel", create_at);
        post.post_type = post_type.into();
        self.state().posts.insert(post.id.clone(), post.clone());
        post
    }

    pub fn react(&self, post_id: &str, user_id: &str, emoji_name: &str) {
        self.state().reactions.push(Reaction {
            post_id: post_id.into(),
            user_id: user_id.into(),
            emoji_name: emoji_name.into(),
            create_at: 1,
        });
    }

    pub fn soft_delete(&self, post_id: &str) {
        if let Some(post) = self.state().posts.get_mut(post_id) {
            post.delete_at = 1;
        }
    }

    /// Stored post, deleted or not. Panics when missing.
    pub fn get(&self, post_id: &str) -> Post {
        self.state()
            .posts
            .get(post_id)
            .cloned()
            .unwrap_or_else(|| panic!("no post {}", post_id))
    }

    pub fn all_live_posts(&self) -> Vec<Post> {
        self.state()
            .posts
            .values()
            .filter(|p| !p.is_deleted())
            .cloned()
            .collect()
    }

    pub fn live_post_count(&self) -> usize {
        self.all_live_posts().len()
    }

    pub fn bot_posts(&self, wrangler: &Wrangler) -> Vec<Post> {
        self.all_live_posts()
            .into_iter()
            .filter(|p| p.user_id == wrangler.bot_user_id())
            .collect()
    }
}

impl PostStore for MemoryStore {
    fn get_post(&self, post_id: &str) -> StoreResult<Option<Post>> {
        Ok(self
            .read()?
            .posts
            .get(post_id)
            .filter(|p| !p.is_deleted())
            .cloned())
    }

    fn get_thread_posts(&self, root_id: &str) -> StoreResult<Vec<Post>> {
        Ok(self
            .read()?
            .posts
            .values()
            .filter(|p| !p.is_deleted() && (p.id == root_id || p.root_id == root_id))
            .cloned()
            .collect())
    }

    fn get_channel(&self, channel_id: &str) -> StoreResult<Option<Channel>> {
        Ok(self.read()?.channels.get(channel_id).cloned())
    }

    fn get_team(&self, team_id: &str) -> StoreResult<Option<Team>> {
        Ok(self.read()?.teams.get(team_id).cloned())
    }

    fn get_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(user_id).cloned())
    }

    fn is_channel_member(&self, channel_id: &str, user_id: &str) -> StoreResult<bool> {
        Ok(self
            .read()?
            .members
            .contains(&(channel_id.to_string(), user_id.to_string())))
    }

    fn teams_for_user(&self, user_id: &str) -> StoreResult<Vec<Team>> {
        let state = self.read()?;
        let team_ids: HashSet<&str> = state
            .members
            .iter()
            .filter(|(_, member)| member == user_id)
            .filter_map(|(channel_id, _)| state.channels.get(channel_id))
            .map(|c| c.team_id.as_str())
            .collect();
        let mut teams: Vec<Team> = team_ids
            .into_iter()
            .filter_map(|id| state.teams.get(id).cloned())
            .collect();
        teams.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(teams)
    }

    fn channels_for_team_for_user(
        &self,
        team_id: &str,
        user_id: &str,
    ) -> StoreResult<Vec<Channel>> {
        let state = self.read()?;
        Ok(state
            .channels
            .values()
            .filter(|c| c.team_id == team_id)
            .filter(|c| state.members.contains(&(c.id.clone(), user_id.to_string())))
            .cloned()
            .collect())
    }

    fn recent_channel_posts(&self, channel_id: &str, limit: usize) -> StoreResult<Vec<Post>> {
        let state = self.read()?;
        let mut posts: Vec<Post> = state
            .posts
            .values()
            .filter(|p| p.channel_id == channel_id && !p.is_deleted())
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.create_at.cmp(&a.create_at));
        posts.truncate(limit);
        Ok(posts)
    }

    fn get_reactions(&self, post_id: &str) -> StoreResult<Vec<Reaction>> {
        Ok(self
            .read()?
            .reactions
            .iter()
            .filter(|r| r.post_id == post_id)
            .cloned()
            .collect())
    }

    fn direct_channel(&self, user_a: &str, user_b: &str) -> StoreResult<Channel> {
        let mut pair = [user_a, user_b];
        pair.sort();
        let id = format!("{}__{}", pair[0], pair[1]);

        let mut state = self.state();
        if let Some(channel) = state.channels.get(&id) {
            return Ok(channel.clone());
        }
        let channel = Channel {
            id: id.clone(),
            team_id: String::new(),
            channel_type: ChannelType::Direct,
            name: id.clone(),
            display_name: String::new(),
        };
        state.channels.insert(id.clone(), channel.clone());
        state.members.insert((id.clone(), user_a.to_string()));
        state.members.insert((id, user_b.to_string()));
        Ok(channel)
    }

    fn apply(&self, writes: &[PostWrite]) -> StoreResult<()> {
        let pending = self.failing_applies.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_applies.store(pending - 1, Ordering::SeqCst);
            return Err(StoreError::Transient("database is locked".into()));
        }

        let mut state = self.state();
        let mut next = state.clone();
        for write in writes {
            next.write(write)?;
        }
        *state = next;
        Ok(())
    }
}

/// Team `eng` with channels `town-square` and `off-topic`, both joined by
/// alice and bob, and one thread in town-square:
/// root (alice, t=100), first (bob, t=200, reacted), second (alice, t=300).
pub struct Scenario {
    pub store: Arc<MemoryStore>,
    pub wrangler: Wrangler,
    pub bot: User,
    pub alice: User,
    pub bob: User,
    pub town: Channel,
    pub other: Channel,
    pub root: Post,
    pub reply1: Post,
    pub reply2: Post,
}

impl Scenario {
    pub fn new() -> Self {
        Self::with_config(Configuration::default())
    }

    pub fn with_config(config: Configuration) -> Self {
        let store = Arc::new(MemoryStore::new());
        store.team("team1", "eng");
        let bot = store.bot("wrangler");
        let alice = store.user("alice", "alice@example.com");
        let bob = store.user("bob", "bob@example.com");
        let town = store.channel("team1", "town-square", ChannelType::Open, &[&alice, &bob]);
        let other = store.channel("team1", "off-topic", ChannelType::Open, &[&alice, &bob]);

        let root = store.post(&town, "", &alice.id, "root", 100);
        let reply1 = store.post(&town, &root.id, &bob.id, "first", 200);
        let reply2 = store.post(&town, &root.id, &alice.id, "second", 300);
        store.react(&reply1.id, &alice.id, "tada");

        let wrangler = Wrangler::new(store.clone(), config, bot.id.clone())
            .with_retry_policy(RetryPolicy::immediate(3));

        Self {
            store,
            wrangler,
            bot,
            alice,
            bob,
            town,
            other,
            root,
            reply1,
            reply2,
        }
    }

    /// Another engine over the same store.
    pub fn wrangler_with(&self, config: Configuration) -> Wrangler {
        Wrangler::new(self.store.clone(), config, self.bot.id.clone())
            .with_retry_policy(RetryPolicy::immediate(3))
    }
}
