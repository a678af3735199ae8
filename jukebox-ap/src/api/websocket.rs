//! `/playerEvents` WebSocket
//!
//! Each connection first receives the full status, then one JSON message per
//! player, queue, scan or repeat-mode event:
//!
//! ```text
//! {"Offset":n}  {"Volume":n}  {"State":"Playing"}  {"Queue":[...]}
//! {"Error":"msg"}  {"Scan":record|null}  {"RepeatMode":"RepeatAll"}
//! ```
//!
//! A state change into `Paused` or `Empty` sends the full status instead,
//! since the loaded track may have changed.

use crate::error::Result;
use crate::playback::{Event, PlayerState, RepeatMode};
use crate::state::AppContext;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use jukebox_common::db::TrackRecord;
use jukebox_common::Subscriber;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};

/// Deadline for a single WebSocket write
const WRITE_TIMEOUT: Duration = Duration::from_millis(10);

/// Buffer of each subscription held by a connection
const SUBSCRIPTION_BUFFER: usize = 16;

/// GET /playerEvents
pub async fn player_events(ws: WebSocketUpgrade, State(ctx): State<AppContext>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx))
}

/// A connection's subscriptions to the three event tees. Dropping it removes
/// them from their tees.
struct Subscriptions {
    player: Subscriber<Event>,
    scan: Subscriber<Option<TrackRecord>>,
    repeat: Subscriber<RepeatMode>,
    ctx: AppContext,
}

impl Subscriptions {
    async fn new(ctx: &AppContext) -> Self {
        Self {
            player: ctx.player_events.subscribe(SUBSCRIPTION_BUFFER).await,
            scan: ctx.scan_events.subscribe(SUBSCRIPTION_BUFFER).await,
            repeat: ctx.repeat_events.subscribe(SUBSCRIPTION_BUFFER).await,
            ctx: ctx.clone(),
        }
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        let mut player = std::mem::replace(&mut self.player, Subscriber::new(1));
        let mut scan = std::mem::replace(&mut self.scan, Subscriber::new(1));
        let mut repeat = std::mem::replace(&mut self.repeat, Subscriber::new(1));
        let player_events = self.ctx.player_events.clone();
        let scan_events = self.ctx.scan_events.clone();
        let repeat_events = self.ctx.repeat_events.clone();

        tokio::spawn(async move {
            player_events.del(&mut player).await;
            scan_events.del(&mut scan).await;
            repeat_events.del(&mut repeat).await;
            debug!("WebSocket subscriptions removed");
        });
    }
}

async fn send_json(socket: &mut WebSocket, value: &Value) -> bool {
    let text = value.to_string();
    match tokio::time::timeout(WRITE_TIMEOUT, socket.send(Message::Text(text))).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            error!("Writing to WebSocket failed: {}", e);
            false
        }
        Err(_) => {
            error!("Writing to WebSocket timed out");
            false
        }
    }
}

async fn full_status_message(ctx: &AppContext) -> Result<Value> {
    let status = ctx.full_status().await?;
    Ok(json!(status))
}

async fn event_message(ctx: &AppContext, event: Event) -> Result<Value> {
    let message = match event {
        Event::OffsetChange(offset) => json!({ "Offset": offset }),
        Event::VolumeChange(volume) => json!({ "Volume": volume }),
        Event::StateChange(state @ PlayerState::Playing) => json!({ "State": state }),
        Event::StateChange(_) => full_status_message(ctx).await?,
        Event::QueueChange => json!({ "Queue": ctx.queue_listing().await? }),
        Event::Error(msg) => json!({ "Error": msg }),
    };
    Ok(message)
}

async fn handle_socket(mut socket: WebSocket, ctx: AppContext) {
    info!("WebSocket connection opened");

    match full_status_message(&ctx).await {
        Ok(status) => {
            if !send_json(&mut socket, &status).await {
                return;
            }
        }
        Err(e) => {
            error!("Building full status failed: {}", e);
            return;
        }
    }

    let mut subs = Subscriptions::new(&ctx).await;

    loop {
        let message = tokio::select! {
            event = subs.player.recv() => {
                let Some(event) = event else {
                    error!("Player event stream closed");
                    break;
                };
                match event_message(&ctx, event).await {
                    Ok(message) => Some(message),
                    Err(e) => {
                        error!("Building event message failed: {}", e);
                        continue;
                    }
                }
            }
            scanned = subs.scan.recv() => {
                let Some(scanned) = scanned else {
                    error!("Scan event stream closed");
                    break;
                };
                Some(json!({ "Scan": scanned }))
            }
            mode = subs.repeat.recv() => {
                let Some(mode) = mode else {
                    error!("Repeat mode stream closed");
                    break;
                };
                Some(json!({ "RepeatMode": mode.to_string() }))
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => None,
                }
            }
        };

        if let Some(message) = message {
            if !send_json(&mut socket, &message).await {
                break;
            }
        }
    }

    drop(subs);
    info!("WebSocket handler exiting");
}
