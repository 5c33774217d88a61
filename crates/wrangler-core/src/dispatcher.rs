use tracing::{error, info, warn};

use wrangler_types::api::CommandResponse;

use crate::command::{self, Command, HELP_TEXT};
use crate::engine::Wrangler;
use crate::error::{Result, WranglerError};
use crate::format::{clean_and_trim, code_block};
use crate::policy;
use crate::request::{RelocationMode, RequestContext, WrangleOutcome, WranglerRequest};

const UNKNOWN_ERROR: &str = "An unknown error occurred. Please talk to your administrator for help.";
const BUSY_ERROR: &str = "Wrangler is busy right now. Please try again in a moment.";
const SKIPPED_SYSTEM_MESSAGE: &str = "[     system message     ] - <skipped>";

/// Result of running one slash command.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub response: CommandResponse,
    /// Set when the command changed a thread.
    pub outcome: Option<WrangleOutcome>,
}

impl Dispatched {
    fn reply(response: CommandResponse) -> Self {
        Self {
            response,
            outcome: None,
        }
    }
}

/// Turns slash commands into engine calls and engine results into replies.
#[derive(Clone)]
pub struct CommandDispatcher {
    wrangler: Wrangler,
}

impl CommandDispatcher {
    pub fn new(wrangler: Wrangler) -> Self {
        Self { wrangler }
    }

    pub fn wrangler(&self) -> &Wrangler {
        &self.wrangler
    }

    /// Run a slash command. Never fails: every error becomes a reply.
    pub fn execute(&self, ctx: &RequestContext, input: &str) -> Dispatched {
        info!(user_id = %ctx.user_id, command = %input, "running command");
        match self.run(ctx, input) {
            Ok(dispatched) => dispatched,
            Err(e) => Dispatched::reply(render_error(&e)),
        }
    }

    /// Run an already-typed request (REST surface).
    pub fn execute_request(
        &self,
        ctx: &RequestContext,
        request: &WranglerRequest,
    ) -> Result<WrangleOutcome> {
        self.wrangler.execute(ctx, request)
    }

    fn run(&self, ctx: &RequestContext, input: &str) -> Result<Dispatched> {
        // The email-domain gate covers every command, help included.
        self.wrangler.authorize(&ctx.user_id)?;

        let command = command::parse(input, &self.wrangler.config().site_url)?;
        let response = match command {
            Command::Help => CommandResponse::ephemeral(HELP_TEXT),
            Command::Usage(usage) => CommandResponse::ephemeral(usage),
            Command::Info => CommandResponse::ephemeral(format!(
                "Wrangler version: {}\n\n",
                env!("CARGO_PKG_VERSION")
            )),
            Command::ListChannels {
                team_filter,
                channel_filter,
            } => self.list_channels(ctx, team_filter.as_deref(), channel_filter.as_deref())?,
            Command::ListMessages { count, trim_length } => {
                self.list_messages(ctx, count, trim_length)?
            }
            Command::Wrangle(request) => {
                let outcome = self.wrangler.execute(ctx, &request)?;
                let response = if is_loud_move(&request) {
                    CommandResponse::in_channel(outcome.summary())
                } else {
                    CommandResponse::ephemeral(outcome.summary())
                };
                return Ok(Dispatched {
                    response,
                    outcome: Some(outcome),
                });
            }
        };
        Ok(Dispatched::reply(response))
    }

    fn list_channels(
        &self,
        ctx: &RequestContext,
        team_filter: Option<&str>,
        channel_filter: Option<&str>,
    ) -> Result<CommandResponse> {
        let store = self.wrangler.store();
        let mut msg = String::new();

        for team in store.teams_for_user(&ctx.user_id)? {
            if team_filter.is_some_and(|f| !team.name.contains(f)) {
                continue;
            }
            let channels: Vec<_> = self
                .wrangler
                .channels_for_team_for_user(&team.id, &ctx.user_id)?
                .into_iter()
                .filter(|c| channel_filter.is_none_or(|f| c.name.contains(f)))
                .collect();
            if channels.is_empty() {
                continue;
            }

            let mut group = team.name.clone();
            for channel in &channels {
                group.push_str(&format!("\n{} - {}", channel.id, channel.name));
            }
            msg.push_str(&code_block(&group));
            msg.push('\n');
        }

        if msg.is_empty() {
            msg = "No results found".to_string();
        }
        Ok(CommandResponse::ephemeral(msg))
    }

    fn list_messages(
        &self,
        ctx: &RequestContext,
        count: usize,
        trim_length: usize,
    ) -> Result<CommandResponse> {
        let channel_id = ctx.channel_id.as_deref().ok_or_else(|| {
            WranglerError::InvalidCommand("list messages must be run from a channel".to_string())
        })?;
        let store = self.wrangler.store();
        policy::check_membership(store, &ctx.user_id, &[channel_id])?;

        let mut msg = format!("The last {} messages in this channel:\n", count);
        for post in store.recent_channel_posts(channel_id, count)? {
            if post.is_system_message() {
                msg.push_str(SKIPPED_SYSTEM_MESSAGE);
            } else {
                msg.push_str(&format!(
                    "{} - {}",
                    post.id,
                    clean_and_trim(&post.message, trim_length)
                ));
            }
            msg.push('\n');
        }
        Ok(CommandResponse::ephemeral(code_block(msg.trim_end_matches('\n'))))
    }
}

fn is_loud_move(request: &WranglerRequest) -> bool {
    matches!(
        request,
        WranglerRequest::Relocate(r) if r.mode == RelocationMode::Move && !r.options.silent
    )
}

/// User-facing text for an engine error.
pub fn render_error(err: &WranglerError) -> CommandResponse {
    match err {
        e if e.is_user_error() => CommandResponse::ephemeral(format!(
            "__Error: {}__\n\nRun `/wrangler help` for usage instructions.",
            e
        )),
        WranglerError::PartialFailure { .. } => {
            error!(code = err.code(), "command left posts to reconcile: {}", err);
            CommandResponse::ephemeral(format!(
                "__Error: {}__\n\nPlease talk to your administrator for help.",
                err
            ))
        }
        WranglerError::TransientIo(_) => {
            warn!(code = err.code(), "command failed: {}", err);
            CommandResponse::ephemeral(BUSY_ERROR)
        }
        _ => {
            error!(code = err.code(), "command failed: {}", err);
            CommandResponse::ephemeral(UNKNOWN_ERROR)
        }
    }
}
