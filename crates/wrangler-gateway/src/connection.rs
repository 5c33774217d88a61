use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use wrangler_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

type Subscriptions = Arc<RwLock<HashSet<String>>>;

/// Decides which channels a user may watch. May block on storage, so it is
/// only called from blocking tasks.
pub trait ChannelAccess: Send + Sync + 'static {
    fn can_watch(&self, user_id: &str, channel_id: &str) -> bool;
}

/// Serve one WebSocket client. The user id was already taken from the
/// upgrade request, so the client goes straight to Ready.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    access: Arc<dyn ChannelAccess>,
    user_id: String,
) {
    let (mut sender, mut receiver) = socket.split();
    let conn_id = Uuid::new_v4();

    info!(%user_id, %conn_id, "Connected to gateway");

    let ready = GatewayEvent::Ready {
        user_id: user_id.clone(),
    };
    let Ok(ready) = serde_json::to_string(&ready) else {
        return;
    };
    if sender.send(Message::Text(ready.into())).await.is_err() {
        return;
    }

    dispatcher.connection_opened();

    let mut broadcast_rx = dispatcher.subscribe();
    let subscriptions: Subscriptions = Arc::new(RwLock::new(HashSet::new()));
    let send_subscriptions = subscriptions.clone();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let msg = match result {
                        Ok(msg) => msg,
                        Err(RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} messages", n);
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };

                    let wanted = {
                        let subs = send_subscriptions.read().unwrap_or_else(|e| e.into_inner());
                        msg.concerns(&subs)
                    };
                    if !wanted {
                        continue;
                    }

                    if sender.send(Message::Text(msg.json.to_string().into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let recv_user = user_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        let cmd = authorize_command(&access, &recv_user, cmd).await;
                        handle_command(&recv_user, cmd, &subscriptions);
                    }
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            recv_user,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.connection_closed();
    info!(%user_id, %conn_id, "Disconnected from gateway");
}

/// Drop subscriptions to channels the user is not a member of.
async fn authorize_command(
    access: &Arc<dyn ChannelAccess>,
    user_id: &str,
    cmd: GatewayCommand,
) -> GatewayCommand {
    let GatewayCommand::Subscribe { channel_ids } = cmd else {
        return cmd;
    };
    let access = access.clone();
    let user = user_id.to_string();
    let channel_ids =
        match tokio::task::spawn_blocking(move || permitted(access.as_ref(), &user, channel_ids))
            .await
        {
            Ok(ids) => ids,
            Err(e) => {
                warn!("{} subscription check failed: {}", user_id, e);
                Vec::new()
            }
        };
    GatewayCommand::Subscribe { channel_ids }
}

fn permitted(access: &dyn ChannelAccess, user_id: &str, channel_ids: Vec<String>) -> Vec<String> {
    channel_ids
        .into_iter()
        .filter(|channel_id| {
            let allowed = access.can_watch(user_id, channel_id);
            if !allowed {
                warn!(%user_id, %channel_id, "Refused subscription to channel");
            }
            allowed
        })
        .collect()
}

fn handle_command(user_id: &str, cmd: GatewayCommand, subscriptions: &Subscriptions) {
    let mut subs = subscriptions.write().unwrap_or_else(|e| e.into_inner());
    apply_command(&mut subs, cmd);
    debug!("{} now subscribed to {} channels", user_id, subs.len());
}

fn apply_command(subs: &mut HashSet<String>, cmd: GatewayCommand) {
    match cmd {
        GatewayCommand::Subscribe { channel_ids } => subs.extend(channel_ids),
        GatewayCommand::Unsubscribe { channel_ids } => {
            for id in &channel_ids {
                subs.remove(id);
            }
        }
    }
}
