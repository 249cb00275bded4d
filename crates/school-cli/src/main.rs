use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use messaging::{group_by_day, ChannelState, MessagingSession, SocketConnector, SyncUpdate};
use school_client::{ClientConfig, ConversationId, SchoolClient};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Delay before re-opening a dropped real-time channel in `watch`.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "school-cli")]
#[command(about = "Read and send school messages from the terminal")]
struct Args {
    /// Backend base URL (overrides SCHOOL_API_URL)
    #[arg(long)]
    url: Option<String>,

    /// Account username
    #[arg(long, env = "SCHOOL_USERNAME")]
    username: String,

    /// Account password
    #[arg(long, env = "SCHOOL_PASSWORD", hide_env_values = true)]
    password: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List conversations with unread counts
    Conversations,
    /// Show a conversation's history grouped by day
    Messages { conversation_id: ConversationId },
    /// Send a message
    Send {
        conversation_id: ConversationId,
        /// Message text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Mark a conversation as read
    MarkRead { conversation_id: ConversationId },
    /// Total unread messages
    Unread,
    /// Print conversation and message updates as they arrive
    Watch,
    /// Search accounts to start a conversation with
    Search { query: String },
    /// Today's attendance and totals
    Attendance {
        /// Also list this many recent records
        #[arg(long, default_value_t = 0)]
        history: u32,
    },
    /// Upcoming and past meetings
    Meetings,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("school_client=info".parse()?)
                .add_directive("messaging=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let password = SecretString::from(args.password);

    let mut config = ClientConfig::from_env()?;
    if let Some(url) = args.url {
        config = ClientConfig::new(url)
            .with_socket_path(config.socket_path.clone())
            .with_request_timeout(config.request_timeout);
        config.validate()?;
    }

    let client = SchoolClient::new(config)?;
    let user = client
        .login(&args.username, password.expose_secret())
        .await?;
    info!("Signed in as {} ({})", user.display_name(), user.role);

    // Commands that do not need the messaging session.
    match &args.command {
        Command::Unread => {
            println!("{}", client.unread_count().await?);
            return logout(&client).await;
        }
        Command::Search { query } => {
            for contact in client.search_users(query).await? {
                println!(
                    "{:>6}  {:<14} {} {} <{}>",
                    contact.id,
                    contact.role.as_str(),
                    contact.first_name,
                    contact.last_name,
                    contact.username
                );
            }
            return logout(&client).await;
        }
        Command::Attendance { history } => {
            show_attendance(&client, *history).await?;
            return logout(&client).await;
        }
        Command::Meetings => {
            for meeting in client.meetings().await? {
                println!(
                    "{} {}-{}  [{:?}] {}{}",
                    meeting.meeting_date,
                    meeting.start_time,
                    meeting.end_time,
                    meeting.status,
                    meeting.title,
                    meeting
                        .student_name
                        .as_deref()
                        .map(|s| format!(" ({})", s))
                        .unwrap_or_default()
                );
            }
            return logout(&client).await;
        }
        _ => {}
    }

    let session = MessagingSession::start(
        Arc::new(client.clone()),
        Arc::new(SocketConnector::new(client.clone())),
        user,
    )
    .await;

    let result = run(&session, args.command).await;
    session.end();
    result?;
    logout(&client).await
}

async fn run(
    session: &MessagingSession,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Conversations => {
            session.refresh_conversations().await?;
            print_conversations(session);
        }
        Command::Messages { conversation_id } => {
            session.load_messages(conversation_id).await?;
            print_messages(session, conversation_id);
        }
        Command::Send {
            conversation_id,
            text,
        } => {
            let content = text.join(" ");
            if content.trim().is_empty() {
                return Err("message is empty".into());
            }
            let sent = session.send(conversation_id, content.trim()).await?;
            println!("Sent message {} at {}", sent.id, sent.created_at);
        }
        Command::MarkRead { conversation_id } => {
            let result = session.mark_read(conversation_id).await?;
            println!("Marked {} messages read", result.updated);
            print_conversations(session);
        }
        Command::Watch => watch(session).await?,
        Command::Unread
        | Command::Search { .. }
        | Command::Attendance { .. }
        | Command::Meetings => {}
    }
    Ok(())
}

async fn watch(session: &MessagingSession) -> Result<(), Box<dyn std::error::Error>> {
    let mut updates = session.subscribe();
    session.refresh_conversations().await?;
    print_conversations(session);
    println!("Watching for updates (Ctrl-C to stop)...");

    // The channel may already be down if the connect in `start` failed.
    let mut retry = needs_reconnect(session.channel_state());
    loop {
        if retry {
            warn!("Real-time channel down, retrying in {:?}", RECONNECT_DELAY);
            tokio::select! {
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Stopping");
                    break;
                }
            }
            if let Err(e) = session.reconnect().await {
                warn!("Reconnect failed: {}", e);
            }
            retry = needs_reconnect(session.channel_state());
            continue;
        }

        tokio::select! {
            update = updates.recv() => match update {
                Ok(SyncUpdate::Conversations) => {
                    println!("-- conversations updated, {} unread", session.unread_total());
                }
                Ok(SyncUpdate::Messages(id)) => {
                    if let Some(last) = session.messages(id).last() {
                        println!("[{}] {}: {}", id, last.sender_id, last.content);
                    }
                }
                Ok(SyncUpdate::Channel(state)) => {
                    info!("Real-time channel {}", state);
                    retry = needs_reconnect(session.channel_state());
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Skipped {} updates, resyncing", skipped);
                    session.refresh_conversations().await?;
                    retry = needs_reconnect(session.channel_state());
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping");
                break;
            }
        }
    }
    Ok(())
}

/// Only a settled Disconnected channel is retried; Connecting is left to finish.
fn needs_reconnect(state: ChannelState) -> bool {
    state == ChannelState::Disconnected
}

fn print_conversations(session: &MessagingSession) {
    let conversations = session.conversations();
    if conversations.is_empty() {
        println!("No conversations.");
        return;
    }
    for conversation in conversations {
        println!(
            "{:>6}  {:<30} {:>3} unread  {}",
            conversation.id,
            conversation.title,
            conversation.unread_count,
            conversation.last_message_preview.as_deref().unwrap_or("")
        );
    }
}

fn print_messages(session: &MessagingSession, conversation_id: ConversationId) {
    let messages = session.messages(conversation_id);
    if messages.is_empty() {
        println!("No messages.");
        return;
    }
    for group in group_by_day(&messages) {
        match group.day {
            Some(day) => println!("== {} ==", day.format("%A, %B %-d, %Y")),
            None => println!("== undated =="),
        }
        for message in &group.messages {
            let who = if message.is_from(session.user()) {
                "me".to_string()
            } else {
                format!("{} #{}", message.sender_role, message.sender_id)
            };
            let time = message
                .created_at_utc()
                .map(|at| at.format("%H:%M").to_string())
                .unwrap_or_else(|| message.created_at.clone());
            println!("  {} {:<18} {}", time, who, message.content);
        }
    }
}

async fn show_attendance(
    client: &SchoolClient,
    history: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let summary = client.attendance_summary().await?;
    println!("Student {}", summary.student_id);
    if summary.today.is_empty() {
        println!("No attendance recorded today.");
    }
    for item in &summary.today {
        println!(
            "  {:<10} {}",
            item.status,
            item.subject.as_deref().unwrap_or("-")
        );
    }
    for (status, count) in &summary.totals {
        println!("  total {:<10} {}", status, count);
    }

    if history > 0 {
        let records = client.attendance_history(history).await?;
        println!("Last {} records:", records.items.len());
        for item in records.items {
            println!(
                "  {} {:<10} {}",
                item.date.as_deref().unwrap_or("?"),
                item.status,
                item.subject.as_deref().unwrap_or("-")
            );
        }
    }
    Ok(())
}

async fn logout(client: &SchoolClient) -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = client.logout().await {
        warn!("Logout failed: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_reconnect() {
        assert!(needs_reconnect(ChannelState::Disconnected));
        assert!(!needs_reconnect(ChannelState::Connecting));
        assert!(!needs_reconnect(ChannelState::Connected));
    }

    #[test]
    fn test_watch_args() {
        let args = Args::try_parse_from([
            "school-cli",
            "--username",
            "jane",
            "--password",
            "pw",
            "watch",
        ])
        .unwrap();
        assert!(matches!(args.command, Command::Watch));
    }
}
