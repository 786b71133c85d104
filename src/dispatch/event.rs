//! Inbound events, structured menu actions, and outbound notifications.
//!
//! The dispatcher is transport-free: channels reduce whatever the chat
//! network delivers to an [`Event`], and render [`Outgoing`] notifications
//! (text plus an optional menu descriptor) back into transport-specific
//! shapes. Menu actions are structured payloads carried out-of-band from
//! display text, so nothing downstream ever re-parses button labels.

use serde::{Deserialize, Serialize};

use crate::model::Identity;

/// One inbound event from a conversation participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// The originating conversation identity.
    pub from: Identity,
    /// Channel-level handle of the sender (e.g. a username), if any.
    pub handle: Option<String>,
    pub payload: EventPayload,
}

impl Event {
    pub fn text(from: Identity, text: impl Into<String>) -> Self {
        Self {
            from,
            handle: None,
            payload: EventPayload::Text(text.into()),
        }
    }

    pub fn action(from: Identity, action: MenuAction) -> Self {
        Self {
            from,
            handle: None,
            payload: EventPayload::Action(action),
        }
    }

    pub fn contact(from: Identity, phone: impl Into<String>) -> Self {
        Self {
            from,
            handle: None,
            payload: EventPayload::Contact {
                phone: phone.into(),
            },
        }
    }

    pub fn photo(from: Identity, token: impl Into<String>) -> Self {
        Self {
            from,
            handle: None,
            payload: EventPayload::Photo {
                token: token.into(),
            },
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }
}

/// The shapes of inbound input the core accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// Free-text message.
    Text(String),
    /// A shared contact/phone payload.
    Contact { phone: String },
    /// A photographic-evidence event, reduced to an opaque token.
    Photo { token: String },
    /// A structured menu interaction.
    Action(MenuAction),
}

/// Structured interaction payloads attached to menu buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "a", rename_all = "snake_case")]
pub enum MenuAction {
    MyOrders,
    ComposeFeedback,
    ReportHelp,
    Cancel,
    BrowseUsers,
    ListActive,
    ListPending,
    Back,
    ApproveUser { id: Identity },
    RemoveUser { id: Identity },
    ChooseRole { role: String },
}

/// Command-style control inputs, recognized by fixed literal patterns
/// regardless of session state. A `None` argument means the argument was
/// missing or unparseable; the dispatcher answers with usage text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    CreateOrder { owner: Option<Identity> },
    StartWork { order: Option<i64> },
    FinishWork { order: Option<i64> },
}

impl Command {
    /// Parse a command literal; non-commands return `None`.
    pub fn parse(text: &str) -> Option<Command> {
        let mut parts = text.trim().split_whitespace();
        let head = parts.next()?;
        let arg = parts.next();
        let num = |a: Option<&str>| a.and_then(|s| s.parse::<i64>().ok());
        match head {
            "/start" => Some(Command::Start),
            "/create_order" => Some(Command::CreateOrder { owner: num(arg) }),
            "/start_work" => Some(Command::StartWork { order: num(arg) }),
            "/finish_work" => Some(Command::FinishWork { order: num(arg) }),
            _ => None,
        }
    }
}

/// An entry on the active-users directory menu. The identity rides along
/// so per-entry actions can target it directly; button text shows only
/// name and role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveEntry {
    pub id: Identity,
    pub name: String,
    pub role: String,
}

/// An entry on the pending-users directory menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub id: Identity,
    pub name: String,
}

/// Menu descriptor attached to an outbound notification. A small closed
/// set keyed to effective role and session state; button layout is the
/// channel's business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Menu {
    /// Worker menu: own orders, contact admin.
    User,
    /// Admin panel entry menu.
    Admin,
    /// Active/pending category chooser.
    UsersDirectory,
    /// The active-users listing with per-entry removal.
    ActiveUsers(Vec<ActiveEntry>),
    /// The pending-users listing with per-entry approval.
    PendingUsers(Vec<PendingEntry>),
    /// Role choice for a pending approval.
    RoleChoice { roles: Vec<String> },
    /// Cancel as the only option.
    CancelOnly,
    /// Contact-sharing prompt shown during registration.
    ShareContact,
}

/// One outbound notification: recipient, text, optional menu descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub to: Identity,
    pub text: String,
    pub menu: Option<Menu>,
}

impl Outgoing {
    pub fn text(to: Identity, text: impl Into<String>) -> Self {
        Self {
            to,
            text: text.into(),
            menu: None,
        }
    }

    pub fn with_menu(mut self, menu: Menu) -> Self {
        self.menu = Some(menu);
        self
    }
}
