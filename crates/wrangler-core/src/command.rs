//! `/wrangler` slash-command grammar.

use clap::error::ErrorKind;
use clap::{ArgAction, Args, Parser, Subcommand};

use wrangler_types::api::CommandDefinition;

use crate::config::Configuration;
use crate::error::{Result, WranglerError};
use crate::format::post_id_from_link;
use crate::request::{
    AttachRequest, MergeRequest, RelocationMode, RelocationOptions, RelocationRequest,
    WranglerRequest,
};

pub const TRIGGER: &str = "/wrangler";

pub const DEFAULT_LIST_COUNT: i64 = 20;
pub const MIN_LIST_COUNT: i64 = 1;
pub const MAX_LIST_COUNT: i64 = 100;
pub const DEFAULT_TRIM_LENGTH: i64 = 50;
pub const MIN_TRIM_LENGTH: i64 = 10;
pub const MAX_TRIM_LENGTH: i64 = 500;

pub const HELP_TEXT: &str = "**Wrangler Plugin - Slash Command Help**

* `/wrangler move thread [MESSAGE_ID] [CHANNEL_ID]` - Move a given message, along with the thread it belongs to, to a given channel
  * This can be on any channel in any team that you have joined
  * Obtain the message ID by running `/wrangler list messages` or via the `Permalink` message dropdown option (it's the last part of the URL)
  * Obtain the channel ID by running `/wrangler list channels` or via the channel `View Info` option
* `/wrangler copy thread [MESSAGE_ID] [CHANNEL_ID]` - Copy a given message, along with the thread it belongs to, to a given channel
* `/wrangler merge thread [MESSAGE_ID] [ROOT_MESSAGE_ID]` - Merge the thread of a given message into another thread
* `/wrangler attach message [MESSAGE_ID] [ROOT_MESSAGE_ID]` - Attach a given message to a thread in the same channel
* `/wrangler list channels` - List the IDs of all channels you have joined
* `/wrangler list messages` - List the IDs of recent messages in this channel
* `/wrangler info` - Shows plugin information";

const MOVE_THREAD_USAGE: &str = "Error: missing arguments\n\nUsage: `/wrangler move thread [MESSAGE_ID] [CHANNEL_ID] [--show-root-message-in-summary=true|false] [--silent=true|false]`";
const COPY_THREAD_USAGE: &str = "Error: missing arguments\n\nUsage: `/wrangler copy thread [MESSAGE_ID] [CHANNEL_ID] [--silent=true|false]`";
const MERGE_THREAD_USAGE: &str = "Error: missing arguments\n\nUsage: `/wrangler merge thread [MESSAGE_ID] [ROOT_MESSAGE_ID] [--silent=true|false]`";
const ATTACH_MESSAGE_USAGE: &str =
    "Error: missing arguments\n\nUsage: `/wrangler attach message [MESSAGE_ID] [ROOT_MESSAGE_ID]`";

/// Registration details for `/wrangler`. Merge is only advertised when
/// enabled.
pub fn definition(config: &Configuration) -> CommandDefinition {
    let mut verbs = vec!["move", "copy"];
    if config.enable_merge_thread {
        verbs.push("merge");
    }
    verbs.extend(["attach", "list", "info"]);

    CommandDefinition {
        trigger: TRIGGER.trim_start_matches('/').to_string(),
        display_name: "Wrangler".to_string(),
        description: "Manage messages and threads".to_string(),
        auto_complete: config.command_autocomplete,
        auto_complete_desc: format!("Available commands: {}", verbs.join(", ")),
        auto_complete_hint: "[command]".to_string(),
    }
}

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Wrangle(WranglerRequest),
    ListChannels {
        team_filter: Option<String>,
        channel_filter: Option<String>,
    },
    ListMessages {
        count: usize,
        trim_length: usize,
    },
    Info,
    Help,
    /// Known verb, missing arguments.
    Usage(&'static str),
}

#[derive(Parser, Debug)]
#[command(
    name = "wrangler",
    disable_help_subcommand = true,
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Cli {
    #[command(subcommand)]
    verb: Verb,
}

#[derive(Subcommand, Debug)]
enum Verb {
    Move {
        #[command(subcommand)]
        target: Option<MoveTarget>,
    },
    Copy {
        #[command(subcommand)]
        target: Option<CopyTarget>,
    },
    Merge {
        #[command(subcommand)]
        target: Option<MergeTarget>,
    },
    Attach {
        #[command(subcommand)]
        target: Option<AttachTarget>,
    },
    List {
        #[command(subcommand)]
        target: Option<ListTarget>,
    },
    Info,
    Help,
}

#[derive(Subcommand, Debug)]
enum MoveTarget {
    Thread(MoveThreadArgs),
}

#[derive(Subcommand, Debug)]
enum CopyTarget {
    Thread(CopyThreadArgs),
}

#[derive(Subcommand, Debug)]
enum MergeTarget {
    Thread(MergeThreadArgs),
}

#[derive(Subcommand, Debug)]
enum AttachTarget {
    Message(AttachMessageArgs),
}

#[derive(Subcommand, Debug)]
enum ListTarget {
    Channels(ListChannelsArgs),
    Messages(ListMessagesArgs),
}

#[derive(Args, Debug)]
struct MoveThreadArgs {
    post_id: Option<String>,
    channel_id: Option<String>,
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = false,
        default_missing_value = "true"
    )]
    show_root_message_in_summary: bool,
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = false,
        default_missing_value = "true"
    )]
    silent: bool,
}

#[derive(Args, Debug)]
struct CopyThreadArgs {
    post_id: Option<String>,
    channel_id: Option<String>,
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = false,
        default_missing_value = "true"
    )]
    silent: bool,
}

#[derive(Args, Debug)]
struct MergeThreadArgs {
    post_id: Option<String>,
    root_post_id: Option<String>,
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = false,
        default_missing_value = "true"
    )]
    silent: bool,
}

#[derive(Args, Debug)]
struct AttachMessageArgs {
    post_id: Option<String>,
    root_post_id: Option<String>,
}

#[derive(Args, Debug)]
struct ListChannelsArgs {
    /// Only teams whose name contains this value.
    #[arg(long)]
    team_filter: Option<String>,
    /// Only channels whose name contains this value.
    #[arg(long)]
    channel_filter: Option<String>,
}

#[derive(Args, Debug)]
struct ListMessagesArgs {
    #[arg(long, default_value_t = DEFAULT_LIST_COUNT)]
    count: i64,
    #[arg(long, default_value_t = DEFAULT_TRIM_LENGTH)]
    trim_length: i64,
}

/// Parse a full command line such as `/wrangler move thread <id> <channel>`.
/// Post ids may be given as permalinks under `site_url`.
pub fn parse(input: &str, site_url: &str) -> Result<Command> {
    let mut tokens = input.split_whitespace();
    if tokens.next() != Some(TRIGGER) {
        return Err(WranglerError::InvalidCommand(format!(
            "commands must start with {}",
            TRIGGER
        )));
    }
    let args: Vec<&str> = tokens.collect();
    if args.is_empty() {
        return Ok(Command::Help);
    }

    let cli = match Cli::try_parse_from(std::iter::once("wrangler").chain(args)) {
        Ok(cli) => cli,
        Err(e) => {
            return match e.kind() {
                ErrorKind::InvalidSubcommand
                | ErrorKind::UnknownArgument
                | ErrorKind::MissingSubcommand
                | ErrorKind::DisplayHelp
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => Ok(Command::Help),
                _ => Err(WranglerError::InvalidCommand(clap_message(&e))),
            };
        }
    };

    let id = |raw: String| post_id_from_link(&raw, site_url).to_string();

    let command = match cli.verb {
        Verb::Move { target } => match target {
            Some(MoveTarget::Thread(MoveThreadArgs {
                post_id: Some(post_id),
                channel_id: Some(channel_id),
                show_root_message_in_summary,
                silent,
            })) => relocate(
                id(post_id),
                channel_id,
                RelocationMode::Move,
                RelocationOptions {
                    show_root_in_summary: show_root_message_in_summary,
                    silent,
                },
            ),
            _ => Command::Usage(MOVE_THREAD_USAGE),
        },
        Verb::Copy { target } => match target {
            Some(CopyTarget::Thread(CopyThreadArgs {
                post_id: Some(post_id),
                channel_id: Some(channel_id),
                silent,
            })) => relocate(
                id(post_id),
                channel_id,
                RelocationMode::Copy,
                RelocationOptions {
                    show_root_in_summary: false,
                    silent,
                },
            ),
            _ => Command::Usage(COPY_THREAD_USAGE),
        },
        Verb::Merge { target } => match target {
            Some(MergeTarget::Thread(MergeThreadArgs {
                post_id: Some(post_id),
                root_post_id: Some(root_post_id),
                silent,
            })) => Command::Wrangle(WranglerRequest::Merge(MergeRequest {
                source_post_id: id(post_id),
                destination_post_id: id(root_post_id),
                silent,
            })),
            _ => Command::Usage(MERGE_THREAD_USAGE),
        },
        Verb::Attach { target } => match target {
            Some(AttachTarget::Message(AttachMessageArgs {
                post_id: Some(post_id),
                root_post_id: Some(root_post_id),
            })) => Command::Wrangle(WranglerRequest::Attach(AttachRequest {
                post_id: id(post_id),
                destination_post_id: id(root_post_id),
            })),
            _ => Command::Usage(ATTACH_MESSAGE_USAGE),
        },
        Verb::List { target } => match target {
            Some(ListTarget::Channels(args)) => Command::ListChannels {
                team_filter: args.team_filter.filter(|f| !f.is_empty()),
                channel_filter: args.channel_filter.filter(|f| !f.is_empty()),
            },
            Some(ListTarget::Messages(args)) => Command::ListMessages {
                count: bounded("count", args.count, MIN_LIST_COUNT, MAX_LIST_COUNT)?,
                trim_length: bounded(
                    "trim-length",
                    args.trim_length,
                    MIN_TRIM_LENGTH,
                    MAX_TRIM_LENGTH,
                )?,
            },
            None => Command::Help,
        },
        Verb::Info => Command::Info,
        Verb::Help => Command::Help,
    };
    Ok(command)
}

fn relocate(
    post_id: String,
    target_channel_id: String,
    mode: RelocationMode,
    options: RelocationOptions,
) -> Command {
    Command::Wrangle(WranglerRequest::Relocate(RelocationRequest {
        post_id,
        target_channel_id,
        mode,
        options,
    }))
}

fn bounded(flag: &str, value: i64, min: i64, max: i64) -> Result<usize> {
    if value < min || value > max {
        return Err(WranglerError::InvalidCommand(format!(
            "{} ({}) must be between {} and {}",
            flag, value, min, max
        )));
    }
    Ok(value as usize)
}

/// First line of a clap error, without its `error: ` prefix.
fn clap_message(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let first = rendered.lines().next().unwrap_or_default();
    first.trim_start_matches("error: ").to_string()
}
