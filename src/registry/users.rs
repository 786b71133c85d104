//! User registry and pending-registration store.
//!
//! Presence in the user registry *is* approval. An identity appears in at
//! most one of {users, pending}; approval moves it atomically from one to
//! the other. Every mutation is a full read-modify-write of the backing
//! collection.

use std::sync::Arc;

use crate::config::SYSTEM_ADMIN_ID;
use crate::error::RegistryError;
use crate::model::{Identity, PendingRecord, Role, UserRecord};
use crate::store::Storage;

/// Approved users plus pending registrations, backed by [`Storage`].
pub struct UserRegistry {
    store: Arc<dyn Storage>,
}

impl UserRegistry {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    /// Seed the system administrator record if it is not persisted yet.
    /// Runs once at startup.
    pub async fn ensure_system_admin(&self) -> Result<(), RegistryError> {
        let mut users = self.store.load_users().await?;
        if users.iter().any(|u| u.id == SYSTEM_ADMIN_ID) {
            return Ok(());
        }
        users.push(UserRecord {
            id: SYSTEM_ADMIN_ID,
            display_name: "Superadmin".into(),
            role: Role::SystemAdmin,
            contact_handle: "superadmin".into(),
            phone: String::new(),
        });
        self.store.save_users(&users).await?;
        tracing::info!(id = SYSTEM_ADMIN_ID, "Seeded system administrator record");
        Ok(())
    }

    /// All approved users.
    pub async fn users(&self) -> Result<Vec<UserRecord>, RegistryError> {
        Ok(self.store.load_users().await?)
    }

    /// All pending registrations.
    pub async fn pending(&self) -> Result<Vec<PendingRecord>, RegistryError> {
        Ok(self.store.load_pending().await?)
    }

    /// File a registration application. Re-submission by the same identity
    /// replaces the earlier application.
    pub async fn submit_pending(&self, record: PendingRecord) -> Result<(), RegistryError> {
        let mut pending = self.store.load_pending().await?;
        pending.retain(|p| p.id != record.id);
        pending.push(record);
        self.store.save_pending(&pending).await?;
        Ok(())
    }

    /// Approve a pending registration with the chosen role.
    ///
    /// Moves the record from the pending store into the user registry.
    /// Exactly-once: a second approval for the same identity fails with
    /// `PendingNotFound` instead of double-applying. The user registry is
    /// saved before the pending store is pruned, so a crash in between
    /// cannot lose the approval.
    pub async fn approve(
        &self,
        target: Identity,
        role: Role,
    ) -> Result<UserRecord, RegistryError> {
        let mut pending = self.store.load_pending().await?;
        let idx = pending
            .iter()
            .position(|p| p.id == target)
            .ok_or(RegistryError::PendingNotFound(target))?;
        let record = pending.remove(idx);
        let approved = record.approve(role);

        let mut users = self.store.load_users().await?;
        users.retain(|u| u.id != target);
        users.push(approved.clone());
        self.store.save_users(&users).await?;
        self.store.save_pending(&pending).await?;

        tracing::info!(id = target, role = %approved.role, "Registration approved");
        Ok(approved)
    }

    /// Remove an approved user. The system administrator is immutable.
    pub async fn remove(&self, id: Identity) -> Result<UserRecord, RegistryError> {
        if id == SYSTEM_ADMIN_ID {
            return Err(RegistryError::SystemAdminImmutable);
        }
        let mut users = self.store.load_users().await?;
        let idx = users
            .iter()
            .position(|u| u.id == id)
            .ok_or(RegistryError::UserNotFound(id))?;
        let removed = users.remove(idx);
        self.store.save_users(&users).await?;
        tracing::info!(id, "User removed");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FlatFileStore;

    async fn registry() -> (UserRegistry, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FlatFileStore::new(dir.path()).await.unwrap());
        (UserRegistry::new(store), dir)
    }

    fn pending(id: Identity, name: &str) -> PendingRecord {
        PendingRecord {
            id,
            display_name: name.into(),
            contact_handle: "h".into(),
            phone: "+1".into(),
        }
    }

    #[tokio::test]
    async fn system_admin_seeded_once() {
        let (reg, _dir) = registry().await;
        reg.ensure_system_admin().await.unwrap();
        reg.ensure_system_admin().await.unwrap();
        let users = reg.users().await.unwrap();
        let admins: Vec<_> = users.iter().filter(|u| u.id == SYSTEM_ADMIN_ID).collect();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].role, Role::SystemAdmin);
    }

    #[tokio::test]
    async fn approval_moves_record_exactly_once() {
        let (reg, _dir) = registry().await;
        reg.submit_pending(pending(42, "Ann 2")).await.unwrap();

        let approved = reg
            .approve(42, Role::Worker("Restorer".into()))
            .await
            .unwrap();
        assert_eq!(approved.display_name, "Ann 2");

        // Absent from pending, present in users with the chosen role.
        assert!(reg.pending().await.unwrap().is_empty());
        let users = reg.users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role, Role::Worker("Restorer".into()));

        // Repeating the approval fails rather than double-applying.
        let err = reg.approve(42, Role::Worker("Restorer".into())).await;
        assert!(matches!(err, Err(RegistryError::PendingNotFound(42))));
    }

    #[tokio::test]
    async fn approving_vanished_pending_is_not_found() {
        let (reg, _dir) = registry().await;
        let err = reg.approve(5, Role::Admin).await;
        assert!(matches!(err, Err(RegistryError::PendingNotFound(5))));
    }

    #[tokio::test]
    async fn resubmission_replaces_earlier_application() {
        let (reg, _dir) = registry().await;
        reg.submit_pending(pending(42, "First")).await.unwrap();
        reg.submit_pending(pending(42, "Second")).await.unwrap();
        let all = reg.pending().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].display_name, "Second");
    }

    #[tokio::test]
    async fn remove_deletes_only_that_user() {
        let (reg, _dir) = registry().await;
        reg.submit_pending(pending(1, "A")).await.unwrap();
        reg.submit_pending(pending(2, "B")).await.unwrap();
        reg.approve(1, Role::Worker("Shoemaker".into())).await.unwrap();
        reg.approve(2, Role::Worker("Shoemaker".into())).await.unwrap();

        reg.remove(1).await.unwrap();
        let users = reg.users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, 2);

        assert!(matches!(
            reg.remove(1).await,
            Err(RegistryError::UserNotFound(1))
        ));
    }

    #[tokio::test]
    async fn system_admin_cannot_be_removed() {
        let (reg, _dir) = registry().await;
        reg.ensure_system_admin().await.unwrap();
        assert!(matches!(
            reg.remove(SYSTEM_ADMIN_ID).await,
            Err(RegistryError::SystemAdminImmutable)
        ));
    }
}
