//! WebSocket session handling.
//!
//! One session per client connection: an initial all-books snapshot on
//! connect, then a select loop that answers each request frame on the
//! same connection and forwards engine-wide trade broadcasts as they
//! happen.

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::protocol::{ServerMessage, TradeBroadcast};
use crate::{handler, AppState};

pub async fn handle_session(socket: WebSocket, state: AppState) {
    let session = Uuid::new_v4();
    info!("client connected: session={session}");

    let (mut sender, mut receiver) = socket.split();
    // Subscribe before the welcome snapshot so no trade can fall between.
    let mut trade_rx = state.engine.subscribe_trades();

    let welcome = handler::full_snapshot(&state.engine).await;
    if !send_message(&mut sender, &welcome).await {
        info!("client left during welcome snapshot: session={session}");
        return;
    }

    loop {
        tokio::select! {
            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        debug!("session={session} request: {text}");
                        let response = handler::handle_text(&state.engine, &text).await;
                        if !send_message(&mut sender, &response).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        // Text-frame protocol only.
                        warn!("session={session} sent a binary frame, ignoring");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) => {
                        info!("client closed: session={session}");
                        break;
                    }
                    Some(Err(err)) => {
                        error!("websocket error: session={session} {err}");
                        break;
                    }
                    None => break,
                }
            }

            trade = trade_rx.recv() => {
                match trade {
                    Ok(trade) => {
                        let notification = ServerMessage::Trade(TradeBroadcast::from(&trade));
                        if !send_message(&mut sender, &notification).await {
                            warn!("failed to push trade notification: session={session}");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("session={session} lagging, {skipped} trade notification(s) dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    info!("session ended: session={session}");
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> bool {
    match serde_json::to_string(message) {
        Ok(json) => sender.send(Message::Text(json)).await.is_ok(),
        Err(err) => {
            error!("failed to serialise response: {err}");
            true
        }
    }
}
