//! Reserved menu-label literals.
//!
//! These strings appear on buttons; a display name that exactly matches
//! one of them is rejected during registration so rendered directories
//! can never be confused with controls.

pub const MY_ORDERS: &str = "📦 My orders";
pub const CONTACT_ADMIN: &str = "💬 Contact admin";
pub const USERS: &str = "👥 Users";
pub const SHARE_CONTACT: &str = "📱 Share contact";
pub const REPORT_TO_ADMIN: &str = "🛠 Report to admin";
pub const CANCEL: &str = "❌ Cancel";
pub const ACTIVE_USERS: &str = "✅ Active";
pub const PENDING_USERS: &str = "⏳ Pending";
pub const APPROVE: &str = "✅ Approve";
pub const REJECT: &str = "❌ Reject";
pub const DELETE: &str = "🗑 Delete";
pub const BACK: &str = "⬅️ Back";

/// The role label offered to system admins on the role-choice menu.
pub const ADMIN_ROLE_LABEL: &str = "Administrator";

/// The closed set of control strings a display name may not equal.
/// Worker-role labels come from configuration and are appended by the
/// caller at validation time.
pub const RESERVED_LABELS: &[&str] = &[
    MY_ORDERS,
    CONTACT_ADMIN,
    USERS,
    SHARE_CONTACT,
    REPORT_TO_ADMIN,
    CANCEL,
    ACTIVE_USERS,
    PENDING_USERS,
    APPROVE,
    REJECT,
    DELETE,
    BACK,
    ADMIN_ROLE_LABEL,
];
