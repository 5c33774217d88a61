use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use wrangler_api::middleware::user_id_from_headers;
use wrangler_api::{AppState, AppStateInner, router};
use wrangler_core::{CommandDispatcher, Configuration, Wrangler, command};
use wrangler_gateway::connection;
use wrangler_gateway::dispatcher::Dispatcher;

const BOT_USERNAME: &str = "wrangler";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wrangler=debug,tower_http=debug".into()),
        )
        .init();

    // Config: bad plugin settings stop startup
    let config = Configuration::from_env()?;
    let db_path = std::env::var("WRANGLER_DB_PATH").unwrap_or_else(|_| "wrangler.db".into());
    let host = std::env::var("WRANGLER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("WRANGLER_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    let db = wrangler_db::Database::open(&PathBuf::from(&db_path))?;
    let bot = db.ensure_bot(BOT_USERNAME)?;
    info!(bot_user_id = %bot.id, "Bot account ready");

    let definition = command::definition(&config);
    info!(
        trigger = %definition.trigger,
        auto_complete = definition.auto_complete,
        "Slash command ready"
    );

    let wrangler = Wrangler::new(Arc::new(db), config, bot.id);
    let state = Arc::new(AppStateInner {
        dispatcher: CommandDispatcher::new(wrangler),
        gateway: Dispatcher::new(),
    });

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state.clone());

    let app = router(state)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Wrangler server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Wrangler server stopped");
    Ok(())
}

async fn ws_upgrade(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(user_id) = user_id_from_headers(&headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let gateway = state.gateway.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, gateway, state, user_id))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
