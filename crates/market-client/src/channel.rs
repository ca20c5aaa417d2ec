//! Live chat channel over WebSocket.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::error::ClientError;
use crate::types::{ChannelEvent, Directive, Frame};

enum Outbound {
    Text(String),
    Close,
}

/// A live channel connection.
///
/// The connection is driven by a background task. Events, including the
/// lifecycle events `Connected`, `ConnectError` and `Disconnected`, are read
/// with [`next_event`](Self::next_event) or through the [`Stream`] impl.
/// The stream ends after the final lifecycle event. Directives emitted before
/// the connection is up are queued and flushed once it is.
///
/// Dropping the channel aborts the connection task; call
/// [`close`](Self::close) first for an orderly close frame.
pub struct LiveChannel {
    outbound: mpsc::UnboundedSender<Outbound>,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    task: JoinHandle<()>,
}

impl LiveChannel {
    /// Open a connection to the given `ws://` or `wss://` URL.
    pub fn open(url: String) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        info!("Opening live channel to {}", url);
        let task = tokio::spawn(run_connection(url, outbound_rx, events_tx));

        Self {
            outbound: outbound_tx,
            events: events_rx,
            task,
        }
    }

    /// Queue a directive for sending.
    ///
    /// Fails with [`ClientError::ChannelClosed`] once the connection task has
    /// ended.
    pub fn emit(&self, directive: &Directive) -> Result<(), ClientError> {
        let text = directive.to_frame()?.encode()?;
        debug!("Emitting {}", directive.event());
        self.outbound
            .send(Outbound::Text(text))
            .map_err(|_| ClientError::ChannelClosed)
    }

    /// Wait for the next event. Returns `None` once the connection is gone.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// Ask the connection task to send a close frame and stop.
    pub fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }

    /// Whether the connection task is still running.
    pub fn is_open(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Stream for LiveChannel {
    type Item = ChannelEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for LiveChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveChannel")
            .field("open", &self.is_open())
            .finish()
    }
}

async fn run_connection(
    url: String,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    let ws = match connect_async(url.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            let err = ClientError::from(e);
            error!("Live channel connect error: {}", err);
            let _ = events.send(ChannelEvent::ConnectError(err.to_string()));
            return;
        }
    };

    info!("Live channel connected to {}", url);
    if events.send(ChannelEvent::Connected).is_err() {
        return;
    }

    let (mut write, mut read) = ws.split();

    let reason = loop {
        tokio::select! {
            out = outbound.recv() => match out {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = write.send(WsMessage::Text(text)).await {
                        let err = ClientError::from(e);
                        warn!("Live channel send failed: {}", err);
                        break format!("send failed: {}", err);
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    break "client closed".to_string();
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => dispatch(&text, &events),
                Some(Ok(WsMessage::Close(frame))) => {
                    break frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "server closed".to_string());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let err = ClientError::from(e);
                    error!("Live channel error: {}", err);
                    break err.to_string();
                }
                None => break "stream ended".to_string(),
            },
        }
    };

    info!("Live channel disconnected: {}", reason);
    let _ = events.send(ChannelEvent::Disconnected { reason });
}

fn dispatch(text: &str, events: &mpsc::UnboundedSender<ChannelEvent>) {
    let frame = match Frame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Failed to parse live channel frame: {}", e);
            debug!("Raw frame: {}", text);
            return;
        }
    };

    let name = frame.event.clone();
    match ChannelEvent::from_frame(frame) {
        Ok(Some(event)) => {
            debug!("Received live channel event: {}", name);
            let _ = events.send(event);
        }
        Ok(None) => debug!("Ignoring live channel event: {}", name),
        Err(e) => warn!("Failed to decode {} payload: {}", name, e),
    }
}
