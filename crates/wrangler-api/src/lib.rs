//! HTTP surface: REST handlers for the web UI plus the slash command hook.

pub mod channels;
pub mod error;
pub mod middleware;
pub mod wrangle;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    middleware as axum_middleware,
    routing::{get, post},
};
use serde_json::{Value, json};
use tracing::warn;

use wrangler_core::CommandDispatcher;
use wrangler_gateway::connection::ChannelAccess;
use wrangler_gateway::dispatcher::Dispatcher;

use crate::error::ApiError;
use crate::middleware::require_user;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub dispatcher: CommandDispatcher,
    pub gateway: Dispatcher,
}

/// Gateway subscriptions follow channel membership.
impl ChannelAccess for AppStateInner {
    fn can_watch(&self, user_id: &str, channel_id: &str) -> bool {
        let store = self.dispatcher.wrangler().store();
        match store.is_channel_member(channel_id, user_id) {
            Ok(member) => member,
            Err(e) => {
                warn!(%user_id, %channel_id, "membership check failed: {}", e);
                false
            }
        }
    }
}

/// Run engine work off the async runtime. Storage calls block.
pub(crate) async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&CommandDispatcher) -> wrangler_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    Ok(tokio::task::spawn_blocking(move || f(&state.dispatcher)).await??)
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "gateway_connections": state.gateway.connection_count(),
    }))
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/settings", get(channels::settings))
        .route(
            "/channels-for-team-for-user",
            post(channels::channels_for_team_for_user),
        )
        .route("/threads/{post_id}", get(channels::get_thread))
        .route("/move-thread", post(wrangle::move_thread))
        .route("/copy-thread", post(wrangle::copy_thread))
        .route("/merge-thread", post(wrangle::merge_thread))
        .route("/attach-message", post(wrangle::attach_message))
        .route(
            "/command",
            get(wrangle::command_definition).post(wrangle::command),
        )
        .layer(axum_middleware::from_fn(require_user));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .with_state(state)
}
