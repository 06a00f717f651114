//! Chat commands: the conversation list and an interactive live session.
//!
//! In a session, stdin lines are sent to the open conversation and new
//! messages are printed as the change feed delivers them. Lines starting
//! with `/` are commands:
//!
//! ```text
//! /open <user-id>   switch conversation
//! /close            leave the conversation (back to idle)
//! /quit             exit
//! ```

use std::io::{self, Write};
use std::str::FromStr;

use tokio::io::{AsyncBufReadExt, BufReader};

use star_admin::data::DataService;
use star_admin::services::{MessageSynchronizer, format_timestamp, load_conversations};
use star_admin_core::{Conversation, Message, UNKNOWN_USER_LABEL, UserId};

use super::{Backend, CliError};

/// Print conversations, most recent first.
///
/// # Errors
///
/// Returns `CliError::Conversations` if the aggregation fails.
pub async fn conversations(backend: &Backend) -> Result<(), CliError> {
    let conversations = load_conversations(backend.data()).await?;
    write_conversations(&mut io::stdout().lock(), &conversations)?;
    Ok(())
}

fn write_conversations(out: &mut impl Write, conversations: &[Conversation]) -> io::Result<()> {
    if conversations.is_empty() {
        return writeln!(out, "No active conversations.");
    }
    for conversation in conversations {
        writeln!(
            out,
            "{:<32}  {}  {}",
            conversation.email,
            format_timestamp(conversation.last_message_time),
            conversation.user_id
        )?;
    }
    Ok(())
}

/// One line of session input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Blank,
    Quit,
    Close,
    Open(&'a str),
    Unknown(&'a str),
    Send(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Blank;
    }

    let (command, arg) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(command, rest)| (command, rest.trim()));

    match command {
        "/quit" => Input::Quit,
        "/close" => Input::Close,
        "/open" => Input::Open(arg),
        _ if command.starts_with('/') => Input::Unknown(command),
        _ => Input::Send(line),
    }
}

fn write_message(
    out: &mut impl Write,
    message: &Message,
    admin: UserId,
    counterpart_label: &str,
) -> io::Result<()> {
    let author = if message.is_from(admin) {
        "You"
    } else {
        counterpart_label
    };
    writeln!(
        out,
        "[{}] {author}: {}",
        format_timestamp(message.created_at),
        message.content
    )
}

fn report(message: &str) -> io::Result<()> {
    writeln!(io::stderr().lock(), "{message}")
}

/// Display label for a counterpart, from a fresh conversation list.
async fn counterpart_label(data: &dyn DataService, counterpart: UserId) -> String {
    match load_conversations(data).await {
        Ok(conversations) => conversations
            .into_iter()
            .find(|c| c.user_id == counterpart)
            .map_or_else(|| UNKNOWN_USER_LABEL.to_string(), |c| c.email),
        Err(e) => {
            tracing::warn!(error = %e, "Could not resolve counterpart label");
            UNKNOWN_USER_LABEL.to_string()
        }
    }
}

struct Session {
    sync: MessageSynchronizer,
    admin: UserId,
    label: String,
}

impl Session {
    /// Select `counterpart` and print its history. Failures are reported and
    /// leave the session idle.
    async fn open(&mut self, data: &dyn DataService, counterpart: UserId) -> io::Result<()> {
        self.label = counterpart_label(data, counterpart).await;

        match self.sync.select(counterpart).await {
            Ok(history) => {
                let mut out = io::stdout().lock();
                writeln!(out, "--- {} ({counterpart}) ---", self.label)?;
                if history.is_empty() {
                    writeln!(out, "No messages yet.")?;
                }
                for message in history {
                    write_message(&mut out, message, self.admin, &self.label)?;
                }
                Ok(())
            }
            Err(e) => report(&e.to_string()),
        }
    }
}

/// Run an interactive session starting with `counterpart`.
///
/// # Errors
///
/// Returns `CliError::Io` if stdin or stdout fails.
pub async fn open(backend: &Backend, counterpart: UserId) -> Result<(), CliError> {
    let admin = backend.admin_user_id();
    let mut session = Session {
        sync: MessageSynchronizer::new(backend.data_handle(), admin),
        admin,
        label: UNKNOWN_USER_LABEL.to_string(),
    };

    session.open(backend.data(), counterpart).await?;
    writeln!(
        io::stdout().lock(),
        "Type a message and press Enter. Commands: /open <user-id>, /close, /quit"
    )?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_input(&line) {
                    Input::Blank => {}
                    Input::Quit => break,
                    Input::Close => {
                        session.sync.clear();
                        writeln!(io::stdout().lock(), "Conversation closed. Use /open <user-id> to select one.")?;
                    }
                    Input::Open(raw) => match UserId::from_str(raw) {
                        Ok(id) => session.open(backend.data(), id).await?,
                        Err(_) => report(&format!("Invalid user id: {raw}"))?,
                    },
                    Input::Unknown(command) => report(&format!("Unknown command: {command}"))?,
                    Input::Send(text) => {
                        if let Err(e) = session.sync.send(text).await {
                            report(&e.to_string())?;
                        }
                    }
                }
            }
            message = session.sync.next_message(), if session.sync.is_live() => match message {
                Some(message) => {
                    write_message(&mut io::stdout().lock(), &message, session.admin, &session.label)?;
                }
                None => {
                    tracing::warn!("Message feed closed");
                    session.sync.clear();
                    report("Live updates stopped. Use /open <user-id> to reconnect.")?;
                }
            },
        }
    }

    session.sync.clear();
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use star_admin_core::MessageId;

    #[test]
    fn test_parse_input_commands() {
        assert_eq!(parse_input("  "), Input::Blank);
        assert_eq!(parse_input("/quit"), Input::Quit);
        assert_eq!(parse_input("/close\n"), Input::Close);
        assert_eq!(
            parse_input("/open  6f1c2a4e-0b7d-4c55-9a43-2f6f0e8b1d11 "),
            Input::Open("6f1c2a4e-0b7d-4c55-9a43-2f6f0e8b1d11")
        );
        assert_eq!(parse_input("/open"), Input::Open(""));
        assert_eq!(parse_input("/help me"), Input::Unknown("/help"));
    }

    #[test]
    fn test_parse_input_message_is_trimmed() {
        assert_eq!(parse_input("  hello there \n"), Input::Send("hello there"));
    }

    #[test]
    fn test_write_message_author() {
        let admin = UserId::new(uuid::Uuid::from_u128(1));
        let customer = UserId::new(uuid::Uuid::from_u128(2));
        let message = Message {
            id: MessageId::new(1),
            sender_id: customer,
            receiver_id: admin,
            content: "Hi".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        };

        let mut out = Vec::new();
        write_message(&mut out, &message, admin, "ada@example.com").unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[2024-05-01 12:00:00 UTC] ada@example.com: Hi\n"
        );

        let mut out = Vec::new();
        write_message(&mut out, &message, customer, "admin").unwrap();
        assert!(String::from_utf8(out).unwrap().contains("] You: Hi"));
    }

    #[test]
    fn test_write_conversations_empty() {
        let mut out = Vec::new();
        write_conversations(&mut out, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No active conversations.\n");
    }
}
