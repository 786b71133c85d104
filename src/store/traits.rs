//! `Storage` trait — single async interface for registry persistence.
//!
//! Every mutation is a full read-modify-write of the whole collection; a
//! failed save must leave the previously persisted state intact.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::model::{Order, PendingRecord, UserRecord};

/// Backend-agnostic persistence for the three registries.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Load all approved users. A missing backing file is an empty list.
    async fn load_users(&self) -> Result<Vec<UserRecord>, StorageError>;

    /// Replace the approved-users collection.
    async fn save_users(&self, users: &[UserRecord]) -> Result<(), StorageError>;

    /// Load all pending registrations. A missing backing file is an empty list.
    async fn load_pending(&self) -> Result<Vec<PendingRecord>, StorageError>;

    /// Replace the pending-registrations collection.
    async fn save_pending(&self, pending: &[PendingRecord]) -> Result<(), StorageError>;

    /// Load all orders. A missing backing file is an empty list.
    async fn load_orders(&self) -> Result<Vec<Order>, StorageError>;

    /// Replace the orders collection.
    async fn save_orders(&self, orders: &[Order]) -> Result<(), StorageError>;
}
