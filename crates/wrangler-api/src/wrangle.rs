use axum::{Extension, Json, extract::State};
use tracing::info;

use wrangler_core::request::{
    AttachRequest, MergeRequest, RelocationMode, RelocationOptions, RelocationRequest,
    RequestContext, WranglerRequest,
};
use wrangler_core::command;
use wrangler_types::api::{
    AttachMessageRequest, CommandDefinition, CommandRequest, CommandResponse, MergeThreadRequest,
    MoveThreadRequest, WrangleResponse,
};

use crate::error::ApiError;
use crate::middleware::UserId;
use crate::{AppState, blocking};

pub async fn move_thread(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(req): Json<MoveThreadRequest>,
) -> Result<Json<WrangleResponse>, ApiError> {
    relocate(state, user_id, req, RelocationMode::Move).await
}

pub async fn copy_thread(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(req): Json<MoveThreadRequest>,
) -> Result<Json<WrangleResponse>, ApiError> {
    relocate(state, user_id, req, RelocationMode::Copy).await
}

pub async fn merge_thread(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(req): Json<MergeThreadRequest>,
) -> Result<Json<WrangleResponse>, ApiError> {
    let request = WranglerRequest::Merge(MergeRequest {
        source_post_id: req.post_id,
        destination_post_id: req.target_post_id,
        silent: req.silent,
    });
    wrangle(state, RequestContext::for_user(user_id), request).await
}

pub async fn attach_message(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(req): Json<AttachMessageRequest>,
) -> Result<Json<WrangleResponse>, ApiError> {
    let request = WranglerRequest::Attach(AttachRequest {
        post_id: req.post_id,
        destination_post_id: req.target_post_id,
    });
    wrangle(state, RequestContext::for_user(user_id), request).await
}

/// Slash command entry point. Errors come back as ephemeral replies.
pub async fn command(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let mut ctx = RequestContext::for_user(user_id);
    ctx.channel_id = req.channel_id;
    if let Some(root_id) = req.root_id {
        ctx = ctx.in_thread(root_id);
    }

    let input = req.command;
    let dispatched = blocking(&state, move |d| Ok(d.execute(&ctx, &input))).await?;
    if let Some(outcome) = &dispatched.outcome {
        state.gateway.broadcast(&outcome.event());
    }
    Ok(Json(dispatched.response))
}

/// How the host should register `/wrangler`.
pub async fn command_definition(State(state): State<AppState>) -> Json<CommandDefinition> {
    Json(command::definition(state.dispatcher.wrangler().config()))
}

async fn relocate(
    state: AppState,
    user_id: String,
    req: MoveThreadRequest,
    mode: RelocationMode,
) -> Result<Json<WrangleResponse>, ApiError> {
    let mut ctx = RequestContext::for_user(user_id);
    ctx.channel_id = req.original_channel_id.filter(|id| !id.is_empty());

    let request = WranglerRequest::Relocate(RelocationRequest {
        post_id: req.post_id,
        target_channel_id: req.channel_id,
        mode,
        options: RelocationOptions {
            show_root_in_summary: req.show_root_message_in_summary,
            silent: req.silent,
        },
    });
    wrangle(state, ctx, request).await
}

async fn wrangle(
    state: AppState,
    ctx: RequestContext,
    request: WranglerRequest,
) -> Result<Json<WrangleResponse>, ApiError> {
    let outcome = blocking(&state, move |d| d.execute_request(&ctx, &request)).await?;
    state.gateway.broadcast(&outcome.event());

    let post_ids = outcome.post_ids();
    info!(
        root_id = %outcome.root_id(),
        channel_id = %outcome.channel_id(),
        "Wrangle served over HTTP"
    );
    Ok(Json(WrangleResponse {
        root_id: outcome.root_id().to_string(),
        channel_id: outcome.channel_id().to_string(),
        post_count: post_ids.len(),
        post_ids,
    }))
}
