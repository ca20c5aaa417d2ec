//! Live channel endpoint.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use market_client::{ChannelEvent, Directive, Frame};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::state::MarketState;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<MarketState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: MarketState) {
    let (mut write, mut read) = socket.split();
    let mut events = state.events.subscribe();
    debug!("Socket connected");

    loop {
        tokio::select! {
            incoming = read.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    if let Some(reply) = handle_frame(&state, &text).await {
                        if send_event(&mut write, &reply).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Socket error: {}", e);
                    break;
                }
            },
            event = events.recv() => match event {
                Ok(event) => {
                    if send_event(&mut write, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!("Socket lagged, {} events dropped", skipped),
                Err(RecvError::Closed) => break,
            },
        }
    }

    debug!("Socket disconnected");
}

/// Apply one client frame; returns an event for this socket only, if any.
async fn handle_frame(state: &MarketState, text: &str) -> Option<ChannelEvent> {
    let directive = match Frame::parse(text).map(Directive::from_frame) {
        Ok(Ok(Some(directive))) => directive,
        Ok(Ok(None)) => {
            debug!("Ignoring unknown frame: {}", text);
            return None;
        }
        Ok(Err(e)) | Err(e) => {
            warn!("Bad frame {}: {}", text, e);
            return None;
        }
    };

    let mut inner = state.inner.lock().await;
    inner.received.push(directive.clone());

    match directive {
        Directive::Join(params) => {
            let user = inner.resolve_ref(&params.user_id);
            info!("Socket joined as {} ({:?})", params.user_id, user);
            match user {
                Some(user) if inner.behaviour.replay_history_on_join => {
                    Some(ChannelEvent::MessageHistory(inner.involving(user)))
                }
                _ => None,
            }
        }
        Directive::SendMessage(params) => {
            let sender = inner.resolve_ref(&params.sender_id);
            let recipient = inner.resolve_ref(&params.recipient_id);
            let body = params.body.trim().to_string();
            match (sender, recipient) {
                (Some(sender), Some(recipient)) if !body.is_empty() => {
                    let message = inner.store(sender, recipient, body);
                    drop(inner);
                    state.broadcast(ChannelEvent::NewMessage(message));
                }
                _ => warn!("Rejected send_message from {}", params.sender_id),
            }
            None
        }
    }
}

async fn send_event<S>(write: &mut S, event: &ChannelEvent) -> Result<(), ()>
where
    S: futures::Sink<WsMessage> + Unpin,
{
    let text = match event.to_frame().and_then(|f| f.map(|f| f.encode()).transpose()) {
        Ok(Some(text)) => text,
        Ok(None) => return Ok(()),
        Err(e) => {
            warn!("Failed to encode {}: {}", event.event(), e);
            return Ok(());
        }
    };
    write.send(WsMessage::Text(text)).await.map_err(|_| ())
}
