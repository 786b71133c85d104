//! CLI channel — stdin/stdout REPL for local testing.
//!
//! Input lines become text events from a switchable local identity.
//! Directives cover the payload shapes a terminal cannot produce:
//!
//! ```text
//! /as 42              switch the sending identity
//! contact:+100        a contact payload
//! photo:some-token    a photo payload
//! action:{"a":"my_orders"}   a structured menu action
//! ```

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Channel, EventStream};
use crate::dispatch::{Event, Menu, MenuAction, Outgoing};
use crate::error::ChannelError;
use crate::model::Identity;

/// A simple CLI channel that reads from stdin and writes to stdout.
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn one input line into an event from `identity`, or a new identity
/// for the `/as` directive.
fn parse_line(identity: Identity, line: &str) -> Option<Result<Event, Identity>> {
    if let Some(rest) = line.strip_prefix("/as ") {
        return match rest.trim().parse::<Identity>() {
            Ok(id) => Some(Err(id)),
            Err(_) => {
                eprintln!("usage: /as <numeric id>");
                None
            }
        };
    }
    if let Some(phone) = line.strip_prefix("contact:") {
        return Some(Ok(Event::contact(identity, phone.trim())));
    }
    if let Some(token) = line.strip_prefix("photo:") {
        return Some(Ok(Event::photo(identity, token.trim())));
    }
    if let Some(raw) = line.strip_prefix("action:") {
        return match serde_json::from_str::<MenuAction>(raw.trim()) {
            Ok(action) => Some(Ok(Event::action(identity, action))),
            Err(e) => {
                eprintln!("bad action payload: {e}");
                None
            }
        };
    }
    Some(Ok(Event::text(identity, line)))
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();
            let mut identity: Identity = 1;

            eprint!("({identity})> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            eprint!("({identity})> ");
                            continue;
                        }
                        match parse_line(identity, &line) {
                            Some(Ok(event)) => {
                                if tx.send(event).is_err() {
                                    break;
                                }
                            }
                            Some(Err(new_identity)) => {
                                identity = new_identity;
                                eprintln!("now sending as {identity}");
                            }
                            None => {}
                        }
                        eprint!("({identity})> ");
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send(&self, note: &Outgoing) -> Result<(), ChannelError> {
        println!("\n[to {}] {}", note.to, note.text);
        if let Some(menu) = &note.menu {
            println!("  {}", describe_menu(menu));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

fn describe_menu(menu: &Menu) -> String {
    match menu {
        Menu::User => "[menu: orders / contact admin / report]".into(),
        Menu::Admin => "[menu: users]".into(),
        Menu::UsersDirectory => "[menu: active / pending]".into(),
        Menu::ActiveUsers(entries) => format!("[menu: remove one of {} users]", entries.len()),
        Menu::PendingUsers(entries) => {
            format!("[menu: approve one of {} applicants]", entries.len())
        }
        Menu::RoleChoice { roles } => format!("[menu: role? {}]", roles.join(" / ")),
        Menu::CancelOnly => "[menu: cancel]".into(),
        Menu::ShareContact => "[menu: share contact]".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::EventPayload;

    #[test]
    fn plain_line_is_text_from_current_identity() {
        let event = parse_line(7, "hello").unwrap().unwrap();
        assert_eq!(event.from, 7);
        assert_eq!(event.payload, EventPayload::Text("hello".into()));
    }

    #[test]
    fn directives_produce_typed_payloads() {
        let event = parse_line(7, "contact:+100").unwrap().unwrap();
        assert_eq!(event.payload, EventPayload::Contact { phone: "+100".into() });

        let event = parse_line(7, "photo:tok").unwrap().unwrap();
        assert_eq!(event.payload, EventPayload::Photo { token: "tok".into() });

        let event = parse_line(7, r#"action:{"a":"my_orders"}"#).unwrap().unwrap();
        assert_eq!(event.payload, EventPayload::Action(MenuAction::MyOrders));
    }

    #[test]
    fn as_directive_switches_identity() {
        assert_eq!(parse_line(7, "/as 42"), Some(Err(42)));
        assert_eq!(parse_line(7, "/as nope"), None);
    }

    #[test]
    fn bad_action_payload_is_swallowed() {
        assert_eq!(parse_line(7, "action:garbage"), None);
    }
}
