//! Core data model — identities, roles, user records, and work orders.

use serde::{Deserialize, Serialize};

/// Opaque, stable conversation id. Never reused, never owned by more than
/// one record.
pub type Identity = i64;

/// An approved account's role.
///
/// `Worker` kinds range over a fixed, configurable set of job categories
/// (see [`crate::config::BotConfig::worker_roles`]). Exactly one
/// `SystemAdmin` exists; it is seeded at startup and never reassignable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SystemAdmin,
    Admin,
    Worker(String),
}

impl Role {
    /// Whether this role grants admin privileges.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::SystemAdmin | Role::Admin)
    }

    /// The label used in registry files and role-choice menus.
    pub fn label(&self) -> &str {
        match self {
            Role::SystemAdmin => "system_admin",
            Role::Admin => "admin",
            Role::Worker(kind) => kind,
        }
    }

    /// Parse a registry-file role field. Any label that is not one of the
    /// two admin literals is a worker kind.
    pub fn from_label(label: &str) -> Role {
        match label {
            "system_admin" => Role::SystemAdmin,
            "admin" => Role::Admin,
            other => Role::Worker(other.to_string()),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Single source of truth for what an identity currently is.
///
/// Collapses the "known user / pending user / constant override" presence
/// checks into one tagged value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountStatus {
    Guest,
    Pending,
    Approved(Role),
}

impl AccountStatus {
    pub fn is_admin(&self) -> bool {
        matches!(self, AccountStatus::Approved(role) if role.is_admin())
    }

    pub fn is_system_admin(&self) -> bool {
        matches!(self, AccountStatus::Approved(Role::SystemAdmin))
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, AccountStatus::Approved(_))
    }
}

/// An approved user. Presence in the user registry *is* approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Identity,
    pub display_name: String,
    pub role: Role,
    pub contact_handle: String,
    pub phone: String,
}

/// A submitted-but-unapproved registration — a [`UserRecord`] without a
/// role, awaiting an admin decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecord {
    pub id: Identity,
    pub display_name: String,
    pub contact_handle: String,
    pub phone: String,
}

impl PendingRecord {
    /// Promote to an approved record with the granted role.
    pub fn approve(self, role: Role) -> UserRecord {
        UserRecord {
            id: self.id,
            display_name: self.display_name,
            role,
            contact_handle: self.contact_handle,
            phone: self.phone,
        }
    }
}

/// Work-order lifecycle status. Monotonic: `Active` → `Completed`, never
/// the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Active,
    Completed,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Active => write!(f, "active"),
            OrderStatus::Completed => write!(f, "completed"),
        }
    }
}

/// A work order. Evidence tokens are opaque references to submitted
/// photographs; `end_evidence` can only be set once `start_evidence` is
/// present, and a completed order carries both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub owner: Identity,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_evidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_evidence: Option<String>,
}

impl Order {
    /// A freshly created order: active, no evidence yet.
    pub fn new(id: i64, owner: Identity) -> Self {
        Self {
            id,
            owner,
            status: OrderStatus::Active,
            start_evidence: None,
            end_evidence: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_label_roundtrip() {
        for role in [
            Role::SystemAdmin,
            Role::Admin,
            Role::Worker("Restorer".into()),
        ] {
            assert_eq!(Role::from_label(role.label()), role);
        }
    }

    #[test]
    fn worker_kind_is_not_admin() {
        assert!(Role::SystemAdmin.is_admin());
        assert!(Role::Admin.is_admin());
        assert!(!Role::Worker("Shoemaker".into()).is_admin());
    }

    #[test]
    fn approve_keeps_identity_and_contact() {
        let pending = PendingRecord {
            id: 42,
            display_name: "Ann 2".into(),
            contact_handle: "ann".into(),
            phone: "+100".into(),
        };
        let user = pending.approve(Role::Worker("Restorer".into()));
        assert_eq!(user.id, 42);
        assert_eq!(user.display_name, "Ann 2");
        assert_eq!(user.contact_handle, "ann");
        assert_eq!(user.phone, "+100");
        assert_eq!(user.role, Role::Worker("Restorer".into()));
    }

    #[test]
    fn new_order_is_active_without_evidence() {
        let order = Order::new(1, 42);
        assert_eq!(order.status, OrderStatus::Active);
        assert!(order.start_evidence.is_none());
        assert!(order.end_evidence.is_none());
    }

    #[test]
    fn order_serde_roundtrip() {
        let order = Order {
            id: 3,
            owner: 42,
            status: OrderStatus::Completed,
            start_evidence: Some("photo-a".into()),
            end_evidence: Some("photo-b".into()),
        };
        let json = serde_json::to_string(&order).unwrap();
        let parsed: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, order);
    }
}
