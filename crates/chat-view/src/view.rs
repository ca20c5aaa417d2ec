//! The active conversation view.
//!
//! [`ChatView::activate`] opens one live channel, starts the identity lookup
//! and the first transcript load, and spawns a single task that owns the
//! [`ChatState`]. Everything that mutates the state goes through that task:
//! commands from the [`ChatHandle`], channel events and lookup results.
//! Snapshots are published on a watch channel after every step.

use std::time::Duration;

use market_client::{
    ChannelEvent, ClientError, Directive, LiveChannel, MarketClient, Me, Message,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ViewError;
use crate::route::RouteParams;
use crate::state::{ChatState, Effect, HistoryRequest, ViewSnapshot};

/// How long deactivation waits for the channel's close handshake.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Input accepted by an active view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewCommand {
    SetDraft(String),
    Submit,
    ChangePartner(String),
    Deactivate,
}

enum Lookup {
    Identity(Result<Me, ClientError>),
    History(HistoryRequest, Result<Vec<Message>, ClientError>),
}

/// A conversation view that has not been activated yet.
#[derive(Debug, Clone)]
pub struct ChatView {
    client: MarketClient,
    route: RouteParams,
}

impl ChatView {
    pub fn new(client: MarketClient, route: RouteParams) -> Self {
        Self { client, route }
    }

    /// Open the live channel and start the view task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn activate(self) -> Result<ChatHandle, ViewError> {
        let channel = self.client.open_channel()?;
        let state = ChatState::new(self.route);
        let (snapshots_tx, snapshots_rx) = watch::channel(state.snapshot());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (lookups_tx, lookups_rx) = mpsc::unbounded_channel();

        info!(
            "Activating chat view ({} <-> {})",
            state.route().me,
            state.route().other
        );

        let task = ViewTask {
            client: self.client,
            state,
            channel: Some(channel),
            lookups_tx,
            lookups_rx,
            in_flight: Vec::new(),
            snapshots: snapshots_tx,
        };

        Ok(ChatHandle {
            commands: commands_tx,
            snapshots: snapshots_rx,
            task: tokio::spawn(task.run(commands_rx)),
        })
    }
}

/// Owner of an active view.
///
/// Dropping the handle deactivates the view in the background; call
/// [`deactivate`](Self::deactivate) to wait for teardown.
#[derive(Debug)]
pub struct ChatHandle {
    commands: mpsc::UnboundedSender<ViewCommand>,
    snapshots: watch::Receiver<ViewSnapshot>,
    task: JoinHandle<()>,
}

impl ChatHandle {
    pub fn set_draft(&self, text: impl Into<String>) -> Result<(), ViewError> {
        self.command(ViewCommand::SetDraft(text.into()))
    }

    /// Send the current draft.
    pub fn submit(&self) -> Result<(), ViewError> {
        self.command(ViewCommand::Submit)
    }

    /// Replace the draft with `text` and submit it.
    pub fn send(&self, text: impl Into<String>) -> Result<(), ViewError> {
        self.set_draft(text)?;
        self.submit()
    }

    /// Switch the conversation to another partner.
    pub fn change_partner(&self, other: impl Into<String>) -> Result<(), ViewError> {
        self.command(ViewCommand::ChangePartner(other.into()))
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> ViewSnapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver notified on every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<ViewSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until a snapshot satisfies `predicate`.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&ViewSnapshot) -> bool,
    ) -> Result<ViewSnapshot, ViewError> {
        let snapshot = self
            .snapshots
            .wait_for(predicate)
            .await
            .map_err(|_| ViewError::Closed)?;
        Ok(snapshot.clone())
    }

    /// Whether the view task is still running.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Tear the view down and return the final snapshot.
    pub async fn deactivate(self) -> ViewSnapshot {
        let _ = self.commands.send(ViewCommand::Deactivate);
        if let Err(e) = self.task.await {
            warn!("Chat view task ended abnormally: {}", e);
        }
        let snapshot = self.snapshots.borrow().clone();
        snapshot
    }

    fn command(&self, command: ViewCommand) -> Result<(), ViewError> {
        self.commands.send(command).map_err(|_| ViewError::Closed)
    }
}

struct ViewTask {
    client: MarketClient,
    state: ChatState,
    channel: Option<LiveChannel>,
    lookups_tx: mpsc::UnboundedSender<Lookup>,
    lookups_rx: mpsc::UnboundedReceiver<Lookup>,
    in_flight: Vec<JoinHandle<()>>,
    snapshots: watch::Sender<ViewSnapshot>,
}

impl ViewTask {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<ViewCommand>) {
        let effects = self.state.activated();
        self.apply(effects);
        self.spawn_identity_lookup();
        self.publish();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(ViewCommand::Deactivate) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(lookup) = self.lookups_rx.recv() => self.handle_lookup(lookup),
                event = next_event(&mut self.channel) => match event {
                    Some(event) => {
                        let effects = self.state.channel_event(event);
                        self.apply(effects);
                    }
                    None => {
                        debug!("Live channel stream ended");
                        self.channel = None;
                    }
                },
            }
            self.publish();
        }

        self.teardown().await;
    }

    fn handle_command(&mut self, command: ViewCommand) {
        match command {
            ViewCommand::SetDraft(text) => self.state.set_draft(text),
            ViewCommand::Submit => match self.state.submit() {
                Ok(directive) => match self.emit(&directive) {
                    Ok(()) => self.state.send_succeeded(),
                    Err(e) => self.state.send_failed(&e),
                },
                Err(rejected) => debug!("Submit rejected: {}", rejected),
            },
            ViewCommand::ChangePartner(other) => {
                let effects = self.state.partner_changed(other);
                self.apply(effects);
            }
            // Handled by the run loop.
            ViewCommand::Deactivate => {}
        }
    }

    fn handle_lookup(&mut self, lookup: Lookup) {
        let effects = match lookup {
            Lookup::Identity(result) => {
                let me = match result {
                    Ok(me) => Some(me),
                    Err(e) => {
                        debug!("Identity lookup failed, keeping route hint: {}", e);
                        None
                    }
                };
                self.state.identity_resolved(me)
            }
            Lookup::History(request, result) => self
                .state
                .history_loaded(&request, result.map_err(|e| e.to_string())),
        };
        self.apply(effects);
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::LoadHistory(request) => self.spawn_history(request),
                Effect::Emit(directive) => {
                    if let Err(e) = self.emit(&directive) {
                        warn!("Failed to emit {}: {}", directive.event(), e);
                    }
                }
                // Carried by the snapshot's scroll epoch.
                Effect::ScrollToLatest => {}
            }
        }
    }

    fn emit(&self, directive: &Directive) -> Result<(), ClientError> {
        self.channel
            .as_ref()
            .ok_or(ClientError::ChannelClosed)?
            .emit(directive)
    }

    fn spawn_identity_lookup(&mut self) {
        let client = self.client.clone();
        let tx = self.lookups_tx.clone();
        self.track(tokio::spawn(async move {
            let _ = tx.send(Lookup::Identity(client.me().await));
        }));
    }

    fn spawn_history(&mut self, request: HistoryRequest) {
        let client = self.client.clone();
        let tx = self.lookups_tx.clone();
        self.track(tokio::spawn(async move {
            let result = client
                .history(&request.key.user1, &request.key.user2)
                .await;
            let _ = tx.send(Lookup::History(request, result));
        }));
    }

    fn track(&mut self, handle: JoinHandle<()>) {
        self.in_flight.retain(|h| !h.is_finished());
        self.in_flight.push(handle);
    }

    fn publish(&self) {
        let next = self.state.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    async fn teardown(mut self) {
        for handle in self.in_flight.drain(..) {
            handle.abort();
        }
        self.state.deactivated();

        if let Some(mut channel) = self.channel.take() {
            channel.close();
            let drained = tokio::time::timeout(CLOSE_GRACE, async {
                while let Some(event) = channel.next_event().await {
                    if matches!(event, ChannelEvent::Disconnected { .. }) {
                        break;
                    }
                }
            })
            .await;
            if drained.is_err() {
                warn!("Live channel did not close within {:?}", CLOSE_GRACE);
            }
        }

        self.publish();
        info!("Chat view deactivated");
    }
}

async fn next_event(channel: &mut Option<LiveChannel>) -> Option<ChannelEvent> {
    match channel {
        Some(channel) => channel.next_event().await,
        None => std::future::pending().await,
    }
}
