use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use huddle_db::Database;
use huddle_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle a WebSocket connection whose token was validated at the HTTP
/// upgrade. Sends `Ready`, then relays events for the workspaces the client
/// subscribes to.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    user_id: Uuid,
    name: String,
) {
    let (mut sender, mut receiver) = socket.split();

    info!("{} ({}) connected to gateway", name, user_id);

    let ready = GatewayEvent::Ready {
        user_id,
        name: name.clone(),
    };
    if send_event(&mut sender, &ready).await.is_err() {
        return;
    }

    let mut broadcast_rx = dispatcher.subscribe();

    // Replies to commands, produced by the recv task and written by the send task
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<GatewayEvent>();

    let subscriptions: Arc<RwLock<Vec<Uuid>>> = Arc::new(RwLock::new(Vec::new()));
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
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} messages", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    let visible = match send_subscriptions.read() {
                        Ok(subs) => msg.is_visible_to(user_id, &subs),
                        Err(_) => break,
                    };
                    if !visible {
                        continue;
                    }

                    if send_event(&mut sender, &msg.event).await.is_err() {
                        break;
                    }

                    if let GatewayEvent::WorkspaceDelete { workspace_id } = msg.event {
                        if let Ok(mut subs) = send_subscriptions.write() {
                            subs.retain(|id| *id != workspace_id);
                        }
                    }
                }
                reply = reply_rx.recv() => {
                    let Some(event) = reply else { break };
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!(
                                "Heartbeat timeout (missed {} pongs), dropping connection",
                                missed_heartbeats
                            );
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

    let name_recv = name.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&db, user_id, &name_recv, cmd, &subscriptions, &reply_tx)
                            .await;
                    }
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            name_recv,
                            user_id,
                            e,
                            &text[..text.len().min(200)]
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

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("{} ({}) disconnected from gateway", name, user_id);
}

async fn send_event(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), ()> {
    let text = serde_json::to_string(event).map_err(|e| {
        error!("Failed to serialize gateway event: {}", e);
    })?;
    sender.send(Message::Text(text.into())).await.map_err(|_| ())
}

async fn handle_command(
    db: &Arc<Database>,
    user_id: Uuid,
    name: &str,
    cmd: GatewayCommand,
    subscriptions: &Arc<RwLock<Vec<Uuid>>>,
    reply_tx: &mpsc::UnboundedSender<GatewayEvent>,
) {
    match cmd {
        GatewayCommand::Subscribe { workspace_ids } => {
            let requested = workspace_ids.len();
            let db = db.clone();
            let allowed = tokio::task::spawn_blocking(move || {
                member_workspaces(&db, user_id, workspace_ids)
            })
            .await;

            let allowed = match allowed {
                Ok(Ok(ids)) => ids,
                Ok(Err(e)) => {
                    error!("Subscription lookup failed for {}: {}", user_id, e);
                    return;
                }
                Err(e) => {
                    error!("spawn_blocking join error: {}", e);
                    return;
                }
            };

            debug!(
                "{} ({}) subscribed to {} of {} requested workspaces",
                name,
                user_id,
                allowed.len(),
                requested
            );

            match subscriptions.write() {
                Ok(mut subs) => *subs = allowed.clone(),
                Err(_) => return,
            }
            let _ = reply_tx.send(GatewayEvent::Subscribed {
                workspace_ids: allowed,
            });
        }
    }
}

/// Keeps the workspaces `user_id` belongs to, in request order, without duplicates.
fn member_workspaces(
    db: &Database,
    user_id: Uuid,
    workspace_ids: Vec<Uuid>,
) -> anyhow::Result<Vec<Uuid>> {
    let mut allowed = Vec::with_capacity(workspace_ids.len());
    for workspace_id in workspace_ids {
        if allowed.contains(&workspace_id) {
            continue;
        }
        if db.get_member_by_user(workspace_id, user_id)?.is_some() {
            allowed.push(workspace_id);
        }
    }
    Ok(allowed)
}
