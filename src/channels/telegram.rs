//! Telegram channel — long-polls the Bot API for updates.
//!
//! Text, contact, and photo messages become plain events; inline-keyboard
//! presses arrive as callback queries whose data field carries a
//! structured action payload in JSON. Menus render to inline keyboards,
//! except the contact-sharing prompt which needs a reply keyboard with
//! `request_contact`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use crate::channels::{Channel, EventStream};
use crate::dispatch::event::{ActiveEntry, PendingEntry};
use crate::dispatch::labels;
use crate::dispatch::{Event, EventPayload, Menu, MenuAction, Outgoing};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Telegram channel — connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.bot_token.expose_secret()
        )
    }

    /// Send a text message, splitting anything over Telegram's 4096-char
    /// limit. The keyboard, if any, rides on the final chunk.
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<serde_json::Value>,
    ) -> Result<(), ChannelError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len() - 1;

        for (i, chunk) in chunks.iter().enumerate() {
            let mut body = json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            if i == last {
                if let Some(markup) = &reply_markup {
                    body["reply_markup"] = markup.clone();
                }
            }

            let resp = self
                .client
                .post(self.api_url("sendMessage"))
                .json(&body)
                .send()
                .await
                .map_err(|e| ChannelError::SendFailed {
                    name: "telegram".into(),
                    reason: e.to_string(),
                })?;

            if !resp.status().is_success() {
                let status = resp.status();
                let err = resp.text().await.unwrap_or_default();
                return Err(ChannelError::SendFailed {
                    name: "telegram".into(),
                    reason: format!("sendMessage returned {status}: {err}"),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let answer_url = self.api_url("answerCallbackQuery");
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for updates...");

            loop {
                let body = json!({
                    "offset": offset,
                    "timeout": 30,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: serde_json::Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(serde_json::Value::as_array)
                else {
                    continue;
                };

                for update in results {
                    if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64)
                    {
                        offset = uid + 1;
                    }

                    if let Some(query) = update.get("callback_query") {
                        // Acknowledge the press so the client stops the spinner.
                        if let Some(qid) = query.get("id").and_then(|i| i.as_str()) {
                            let _ = client
                                .post(&answer_url)
                                .json(&json!({ "callback_query_id": qid }))
                                .send()
                                .await;
                        }
                    }

                    let Some(event) = parse_update(update) else {
                        continue;
                    };
                    if tx.send(event).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send(&self, note: &Outgoing) -> Result<(), ChannelError> {
        let markup = note.menu.as_ref().map(render_menu);
        self.send_message(note.to, &note.text, markup).await
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Update parsing ──────────────────────────────────────────────────

/// Reduce one Bot API update to an [`Event`], or `None` for shapes the
/// bot has no use for (edits, stickers, channel posts, ...).
fn parse_update(update: &serde_json::Value) -> Option<Event> {
    if let Some(query) = update.get("callback_query") {
        let from = query.get("from")?.get("id")?.as_i64()?;
        let data = query.get("data")?.as_str()?;
        let action: MenuAction = match serde_json::from_str(data) {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(from, data, "Unrecognized callback payload: {e}");
                return None;
            }
        };
        let handle = query
            .get("from")
            .and_then(|f| f.get("username"))
            .and_then(|u| u.as_str());
        let mut event = Event::action(from, action);
        if let Some(handle) = handle {
            event = event.with_handle(handle);
        }
        return Some(event);
    }

    let message = update.get("message")?;
    let from = message.get("from")?.get("id")?.as_i64()?;
    let handle = message
        .get("from")
        .and_then(|f| f.get("username"))
        .and_then(|u| u.as_str());

    let payload = if let Some(text) = message.get("text").and_then(|t| t.as_str()) {
        EventPayload::Text(text.to_string())
    } else if let Some(contact) = message.get("contact") {
        let phone = contact.get("phone_number")?.as_str()?;
        EventPayload::Contact {
            phone: phone.to_string(),
        }
    } else if let Some(sizes) = message.get("photo").and_then(|p| p.as_array()) {
        // The largest rendition is last.
        let token = sizes.last()?.get("file_id")?.as_str()?;
        EventPayload::Photo {
            token: token.to_string(),
        }
    } else {
        return None;
    };

    let mut event = Event {
        from,
        handle: None,
        payload,
    };
    if let Some(handle) = handle {
        event = event.with_handle(handle);
    }
    Some(event)
}

// ── Menu rendering ──────────────────────────────────────────────────

fn button(text: &str, action: &MenuAction) -> serde_json::Value {
    // The serializer only fails on non-string-keyed maps, which these
    // payloads cannot contain.
    let data = serde_json::to_string(action).unwrap_or_default();
    json!({ "text": text, "callback_data": data })
}

fn inline(rows: Vec<Vec<serde_json::Value>>) -> serde_json::Value {
    json!({ "inline_keyboard": rows })
}

/// Render a menu descriptor to a Telegram `reply_markup` object.
fn render_menu(menu: &Menu) -> serde_json::Value {
    match menu {
        Menu::User => inline(vec![
            vec![button(labels::MY_ORDERS, &MenuAction::MyOrders)],
            vec![button(labels::CONTACT_ADMIN, &MenuAction::ComposeFeedback)],
            vec![button(labels::REPORT_TO_ADMIN, &MenuAction::ReportHelp)],
        ]),
        Menu::Admin => inline(vec![vec![button(labels::USERS, &MenuAction::BrowseUsers)]]),
        Menu::UsersDirectory => inline(vec![
            vec![button(labels::ACTIVE_USERS, &MenuAction::ListActive)],
            vec![button(labels::PENDING_USERS, &MenuAction::ListPending)],
        ]),
        Menu::ActiveUsers(entries) => {
            let mut rows: Vec<Vec<serde_json::Value>> = entries
                .iter()
                .map(|ActiveEntry { id, name, role }| {
                    vec![button(
                        &format!("{} {name} ({role})", labels::DELETE),
                        &MenuAction::RemoveUser { id: *id },
                    )]
                })
                .collect();
            rows.push(vec![button(labels::BACK, &MenuAction::Back)]);
            inline(rows)
        }
        Menu::PendingUsers(entries) => {
            let mut rows: Vec<Vec<serde_json::Value>> = entries
                .iter()
                .map(|PendingEntry { id, name }| {
                    vec![button(
                        &format!("{} {name}", labels::APPROVE),
                        &MenuAction::ApproveUser { id: *id },
                    )]
                })
                .collect();
            rows.push(vec![button(labels::BACK, &MenuAction::Back)]);
            inline(rows)
        }
        Menu::RoleChoice { roles } => inline(
            roles
                .iter()
                .map(|role| {
                    vec![button(
                        role,
                        &MenuAction::ChooseRole { role: role.clone() },
                    )]
                })
                .collect(),
        ),
        Menu::CancelOnly => inline(vec![vec![button(labels::CANCEL, &MenuAction::Cancel)]]),
        Menu::ShareContact => json!({
            "keyboard": [[{ "text": labels::SHARE_CONTACT, "request_contact": true }]],
            "resize_keyboard": true,
            "one_time_keyboard": true,
        }),
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts at the last
/// char boundary so multi-byte text never lands mid-character.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        // Byte max_len can fall inside a multi-byte char; back off to the
        // nearest boundary before slicing.
        let mut hard_cut = max_len;
        while !remaining.is_char_boundary(hard_cut) {
            hard_cut -= 1;
        }

        let chunk = &remaining[..hard_cut];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(hard_cut);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { hard_cut } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telegram_channel_name() {
        let ch = TelegramChannel::new(SecretString::from("fake-token"));
        assert_eq!(ch.name(), "telegram");
    }

    #[test]
    fn telegram_api_url() {
        let ch = TelegramChannel::new(SecretString::from("123:ABC"));
        assert_eq!(
            ch.api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
    }

    // ── Update parsing ──────────────────────────────────────────────

    #[test]
    fn parses_text_message() {
        let update = json!({
            "update_id": 1,
            "message": {
                "from": { "id": 42, "username": "ann" },
                "text": "hello"
            }
        });
        let event = parse_update(&update).unwrap();
        assert_eq!(event.from, 42);
        assert_eq!(event.handle.as_deref(), Some("ann"));
        assert_eq!(event.payload, EventPayload::Text("hello".into()));
    }

    #[test]
    fn parses_contact_message() {
        let update = json!({
            "update_id": 1,
            "message": {
                "from": { "id": 42 },
                "contact": { "phone_number": "+100" }
            }
        });
        let event = parse_update(&update).unwrap();
        assert_eq!(event.handle, None);
        assert_eq!(event.payload, EventPayload::Contact { phone: "+100".into() });
    }

    #[test]
    fn photo_reduces_to_largest_file_id() {
        let update = json!({
            "update_id": 1,
            "message": {
                "from": { "id": 42 },
                "photo": [
                    { "file_id": "small" },
                    { "file_id": "large" }
                ]
            }
        });
        let event = parse_update(&update).unwrap();
        assert_eq!(event.payload, EventPayload::Photo { token: "large".into() });
    }

    #[test]
    fn parses_callback_query_action() {
        let update = json!({
            "update_id": 1,
            "callback_query": {
                "id": "q1",
                "from": { "id": 99, "username": "boss" },
                "data": r#"{"a":"approve_user","id":42}"#
            }
        });
        let event = parse_update(&update).unwrap();
        assert_eq!(event.from, 99);
        assert_eq!(
            event.payload,
            EventPayload::Action(MenuAction::ApproveUser { id: 42 })
        );
    }

    #[test]
    fn garbage_callback_data_is_dropped() {
        let update = json!({
            "update_id": 1,
            "callback_query": {
                "id": "q1",
                "from": { "id": 99 },
                "data": "not-json"
            }
        });
        assert!(parse_update(&update).is_none());
    }

    #[test]
    fn sticker_updates_are_ignored() {
        let update = json!({
            "update_id": 1,
            "message": {
                "from": { "id": 42 },
                "sticker": { "file_id": "s" }
            }
        });
        assert!(parse_update(&update).is_none());
    }

    // ── Menu rendering ──────────────────────────────────────────────

    #[test]
    fn user_menu_renders_inline_keyboard() {
        let markup = render_menu(&Menu::User);
        let rows = markup["inline_keyboard"].as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0]["text"], labels::MY_ORDERS);
        assert_eq!(rows[0][0]["callback_data"], r#"{"a":"my_orders"}"#);
    }

    #[test]
    fn share_contact_is_a_reply_keyboard() {
        let markup = render_menu(&Menu::ShareContact);
        assert!(markup.get("inline_keyboard").is_none());
        assert_eq!(markup["keyboard"][0][0]["request_contact"], true);
    }

    #[test]
    fn pending_menu_has_one_approve_button_per_entry_plus_back() {
        let markup = render_menu(&Menu::PendingUsers(vec![
            PendingEntry { id: 1, name: "A".into() },
            PendingEntry { id: 2, name: "B".into() },
        ]));
        let rows = markup["inline_keyboard"].as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0]["callback_data"], r#"{"a":"approve_user","id":1}"#);
        assert_eq!(rows[2][0]["callback_data"], r#"{"a":"back"}"#);
    }

    #[test]
    fn active_menu_buttons_target_the_entry_identity() {
        // Button text carries the full label; callback_data only the id,
        // which stays under Telegram's 64-byte cap regardless of name.
        let long_name = "Ы".repeat(32);
        let markup = render_menu(&Menu::ActiveUsers(vec![ActiveEntry {
            id: 6_398_798_394,
            name: long_name.clone(),
            role: "Restorer".into(),
        }]));
        let entry = &markup["inline_keyboard"][0][0];
        assert!(entry["text"].as_str().unwrap().contains(&long_name));
        let data = entry["callback_data"].as_str().unwrap();
        assert!(data.len() <= 64, "{data} is {} bytes", data.len());
        let action: MenuAction = serde_json::from_str(data).unwrap();
        assert_eq!(action, MenuAction::RemoveUser { id: 6_398_798_394 });
    }

    #[test]
    fn role_choice_renders_one_row_per_role() {
        let markup = render_menu(&Menu::RoleChoice {
            roles: vec!["Shoemaker".into(), "Restorer".into()],
        });
        let rows = markup["inline_keyboard"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0]["text"], "Restorer");
    }

    // ── Message splitting ───────────────────────────────────────────

    #[test]
    fn split_message_short() {
        let chunks = split_message("Hello", 4096);
        assert_eq!(chunks, vec!["Hello"]);
    }

    #[test]
    fn split_message_over_limit_on_newline() {
        let msg = format!("{}\n{}", "a".repeat(2000), "b".repeat(3000));
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(2000));
        assert_eq!(chunks[1], "b".repeat(3000));
    }

    #[test]
    fn split_message_no_good_split_point() {
        let msg = "a".repeat(5000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[1].len(), 904);
    }

    #[test]
    fn split_message_never_cuts_multibyte_chars() {
        // One leading ASCII byte shifts every following two-byte char so
        // that byte 4096 falls mid-character.
        let msg = format!("a{}", "д".repeat(3000));
        let chunks = split_message(&msg, 4096);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 4096);
        }
        // No whitespace to trim, so nothing may be lost or mangled.
        assert_eq!(chunks.concat(), msg);
    }

    #[test]
    fn split_message_multibyte_with_spaces_splits_on_them() {
        let word = "слово".repeat(100); // 1000 bytes
        let msg = format!("{word} {word} {word} {word} {word}");
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() <= 4096));
        assert_eq!(chunks.join(" "), msg);
    }
}
