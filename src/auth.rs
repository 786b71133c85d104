//! Role & authorization policy.
//!
//! Pure functions over the registries plus the two administrator
//! constants. Nothing here mutates state; the dispatcher computes a
//! caller's status once per event and routes on it.

use crate::config::SYSTEM_ADMIN_ID;
use crate::model::{AccountStatus, Identity, PendingRecord, Role, UserRecord};

/// Derive an identity's account status.
///
/// Precedence: the fixed system-admin identity always resolves to
/// `SystemAdmin` regardless of registry contents; else the registry role
/// if present; else `Admin` for the configured business-admin identity;
/// else `Pending` or `Guest` depending on pending-store membership.
pub fn account_status(
    id: Identity,
    users: &[UserRecord],
    pending: &[PendingRecord],
    admin_id: Identity,
) -> AccountStatus {
    if id == SYSTEM_ADMIN_ID {
        return AccountStatus::Approved(Role::SystemAdmin);
    }
    if let Some(user) = users.iter().find(|u| u.id == id) {
        return AccountStatus::Approved(user.role.clone());
    }
    if id == admin_id {
        return AccountStatus::Approved(Role::Admin);
    }
    if pending.iter().any(|p| p.id == id) {
        return AccountStatus::Pending;
    }
    AccountStatus::Guest
}

/// The active-users listing for a directory viewer.
///
/// Excludes the viewer's own administrative entry and, for
/// non-system-admins, all `Admin`/`SystemAdmin` entries.
pub fn visible_active_users<'a>(
    viewer: Identity,
    viewer_is_system_admin: bool,
    users: &'a [UserRecord],
) -> Vec<&'a UserRecord> {
    users
        .iter()
        .filter(|u| {
            if u.id == viewer && u.role.is_admin() {
                return false;
            }
            if u.role.is_admin() && !viewer_is_system_admin {
                return false;
            }
            true
        })
        .collect()
}
