//! Terminal chat example.
//!
//! Opens a conversation view and prints it as it changes. Lines typed on
//! stdin are sent; `/to <user>` switches partner and `/quit` exits.
//!
//! Run with: cargo run -p chat-view --example terminal_chat
//!
//! Configuration via .env file or environment variables:
//!   MARKET_API_URL     - Backend base URL (default: http://localhost:5001)
//!   MARKET_SOCKET_PATH - Live channel path (default: /ws)
//!   MARKET_USERNAME    - Local user; also used as the route hint (required)
//!   MARKET_PASSWORD    - Log in first if set
//!   MARKET_PARTNER     - Conversation partner, username or id (required)
//!   RUST_LOG           - Log filter (default: info)

use std::env;

use chat_view::{ChatView, RouteParams, ViewSnapshot};
use market_client::{ClientConfig, MarketClient};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present (searches current dir and parents)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let username = env::var("MARKET_USERNAME")?;
    let partner = env::var("MARKET_PARTNER")?;

    let config = ClientConfig::from_env()?;
    println!("Connecting to {}...", config.base_url);
    let client = MarketClient::new(config)?;

    if let Ok(password) = env::var("MARKET_PASSWORD") {
        client.login(&username, &password).await?;
        println!("Logged in as {}", username);
    }

    let view = ChatView::new(client, RouteParams::new(username, partner)).activate()?;
    let mut updates = view.subscribe();

    let printer = tokio::spawn(async move {
        let mut shown = 0;
        let mut partner = String::new();
        let mut last_error = None;
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            render(&snapshot, &mut shown, &mut partner, &mut last_error);
        }
    });

    println!("Type a message and press enter. /to <user> switches, /quit exits.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/quit" => break,
            cmd if cmd.starts_with("/to ") => view.change_partner(cmd[4..].trim())?,
            _ => view.send(line.as_str())?,
        }
    }

    view.deactivate().await;
    printer.await?;
    Ok(())
}

fn render(
    snapshot: &ViewSnapshot,
    shown: &mut usize,
    partner: &mut String,
    last_error: &mut Option<String>,
) {
    if *partner != snapshot.partner {
        *partner = snapshot.partner.clone();
        *shown = 0;
        println!(
            "--- you: {} | other: {} ---",
            snapshot.identity.display_name(),
            partner
        );
    }
    // History reloads can shrink the transcript.
    if snapshot.messages.len() < *shown {
        *shown = 0;
    }
    for rendered in &snapshot.messages[*shown..] {
        let who = if rendered.mine {
            "you".to_string()
        } else {
            rendered
                .message
                .sender_username
                .clone()
                .or_else(|| rendered.message.sender_id.as_ref().map(|s| s.to_string()))
                .unwrap_or_else(|| "?".to_string())
        };
        println!("[{}] {}: {}", snapshot.connection, who, rendered.message.body);
    }
    *shown = snapshot.messages.len();

    if snapshot.error != *last_error {
        if let Some(error) = &snapshot.error {
            eprintln!("! {}", error);
        }
        *last_error = snapshot.error.clone();
    }
}
