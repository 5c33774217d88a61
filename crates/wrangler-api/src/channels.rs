use axum::{
    Extension, Json,
    extract::{Path, State},
};

use wrangler_types::api::{ChannelsForTeamRequest, SettingsResponse, ThreadResponse};
use wrangler_types::models::Channel;

use crate::error::ApiError;
use crate::middleware::UserId;
use crate::{AppState, blocking};

pub async fn settings(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let enable_merge_thread = state.dispatcher.wrangler().config().enable_merge_thread;
    let enable_web_ui =
        blocking(&state, move |d| d.wrangler().web_ui_enabled_for(&user_id)).await?;

    Ok(Json(SettingsResponse {
        enable_web_ui,
        enable_merge_thread,
    }))
}

/// Candidate destinations for the move/copy dialog.
pub async fn channels_for_team_for_user(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(req): Json<ChannelsForTeamRequest>,
) -> Result<Json<Vec<Channel>>, ApiError> {
    let channels = blocking(&state, move |d| {
        d.wrangler().authorize(&user_id)?;
        d.wrangler().channels_for_team_for_user(&req.team_id, &user_id)
    })
    .await?;
    Ok(Json(channels))
}

pub async fn get_thread(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Extension(UserId(user_id)): Extension<UserId>,
) -> Result<Json<ThreadResponse>, ApiError> {
    let thread = blocking(&state, move |d| {
        d.wrangler().authorize(&user_id)?;
        d.wrangler().thread_for_user(&user_id, &post_id)
    })
    .await?;

    let count = thread.count();
    Ok(Json(ThreadResponse {
        root: thread.root,
        replies: thread.replies,
        count,
    }))
}
