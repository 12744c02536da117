/// LiveChat demo: a terminal chat window against the loopback agent
use colored::*;
use livechat_core::chat_types::{Availability, ChatSnapshot, Event, User};
use livechat_core::sdk::loopback::LoopbackClient;
use livechat_core::{ChatSession, WidgetConfig};
use std::collections::HashSet;
use std::env;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn render_event(snapshot: &ChatSnapshot, event: &Event) {
    let time = event.created_at.format("%H:%M:%S").to_string().dimmed();
    if event.system {
        println!("{} {}", time, event.text.yellow().italic());
        return;
    }
    let author = snapshot
        .users
        .get(&event.author_id)
        .map(|u| u.name.clone())
        .unwrap_or_else(|| event.author_id.clone());
    let status = if event.pending { " …".dimmed() } else { "".normal() };
    let is_customer = snapshot.customer.as_ref().map(|c| c.id.as_str()) == Some(event.author_id.as_str());
    let author = if is_customer {
        author.bright_cyan().bold()
    } else {
        author.bright_green().bold()
    };
    println!("{} {}: {}{}", time, author, event.text, status);
    for reply in &event.quick_replies {
        println!("      {} {}", "▸".cyan(), reply.title);
    }
}

fn render(snapshot: &ChatSnapshot, seen: &mut HashSet<String>) {
    if snapshot.events.is_empty() {
        seen.clear();
    }
    for event in &snapshot.events {
        if seen.insert(event.id.clone()) {
            render_event(snapshot, event);
        }
    }
    if snapshot.is_typing {
        println!("{}", "agent is typing…".dimmed());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let config = WidgetConfig::from_args(&args)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    println!("{}", config.chat_title.bright_cyan().bold());
    info!("License {}", config.license_id);

    let client = Arc::new(LoopbackClient::new("Anna", Availability::Online));
    let mut handle = ChatSession::new(client, config)
        .with_background_hook(Box::new(|event: &Event, author: &User| {
            println!("{} {}: {}", "🔔".bold(), author.name, event.text);
        }))
        .spawn();
    handle.open_chat()?;

    let mut seen = HashSet::new();
    let mut prompt: Option<String> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            snapshot = handle.changed() => {
                let snapshot = snapshot?;
                if snapshot.header_text != prompt {
                    if let Some(text) = &snapshot.header_text {
                        println!("{}", text.bright_white());
                    }
                    prompt = snapshot.header_text.clone();
                }
                render(&snapshot, &mut seen);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "" => {}
                    "/quit" => break,
                    "/open" => handle.open_chat()?,
                    "/close" => handle.close_chat()?,
                    text => {
                        if handle.snapshot().composer_disabled {
                            println!("{}", "Composer is disabled right now".red());
                            continue;
                        }
                        handle.input_changed(text)?;
                        handle.send_message(text)?;
                    }
                }
            }
        }
    }

    handle.shutdown().await?;
    Ok(())
}
