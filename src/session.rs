//! Per-identity session state — which pending interaction, if any, the
//! next inbound event from that identity continues.
//!
//! One owned table holds every in-flight interaction. Sessions are never
//! persisted; a restart drops in-flight conversations (accepted tradeoff).

use std::collections::HashMap;

use crate::model::Identity;

/// The mutually exclusive per-identity conversation states.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No pending interaction.
    #[default]
    Idle,
    /// Guest asked to register; next free text is a display-name submission.
    AwaitingRegistrationName,
    /// Name captured; waiting for a contact/phone payload.
    AwaitingRegistrationContact { name: String },
    /// Approver picked a pending user; waiting for a role choice.
    AwaitingRoleChoice { target: Identity },
    /// Waiting for a feedback message to forward to the admins.
    AwaitingFeedback,
    /// Waiting for the start-of-work photo for this order.
    AwaitingStartEvidence { order: i64 },
    /// Waiting for the end-of-work photo for this order.
    AwaitingFinishEvidence { order: i64 },
}

/// Owned table of active sessions, keyed by identity. Accessed only by the
/// dispatcher; created on first relevant input, cleared on completion,
/// cancellation, or a superseding event.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<Identity, SessionState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state for an identity; absent means `Idle`.
    pub fn get(&self, id: Identity) -> SessionState {
        self.sessions.get(&id).cloned().unwrap_or_default()
    }

    /// Replace the identity's state. Setting `Idle` clears the entry.
    pub fn set(&mut self, id: Identity, state: SessionState) {
        if state == SessionState::Idle {
            self.sessions.remove(&id);
        } else {
            self.sessions.insert(id, state);
        }
    }

    /// Return the identity to `Idle`.
    pub fn clear(&mut self, id: Identity) {
        self.sessions.remove(&id);
    }
}
