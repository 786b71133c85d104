//! Flat-file storage backend.
//!
//! Users and pending registrations are colon-delimited lines, one record
//! per line; orders are a JSON array. Consumers tolerate a missing file as
//! an empty collection and skip lines with fewer fields than the schema
//! requires rather than failing the whole load. Writes go through a temp
//! file in the same directory and an atomic rename, so a failed write
//! never leaves a truncated registry behind.
//!
//! File schemas:
//! - `known_users.txt`:   `id:displayName:role:contactHandle:phone`
//! - `pending_names.txt`: `id:displayName:contactHandle:phone`
//! - `orders.json`:       `[{id, owner, status, start_evidence?, end_evidence?}]`

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::model::{Order, PendingRecord, Role, UserRecord};
use crate::store::Storage;

const USERS_FILE: &str = "known_users.txt";
const PENDING_FILE: &str = "pending_names.txt";
const ORDERS_FILE: &str = "orders.json";

/// Flat-file backend rooted at a data directory.
pub struct FlatFileStore {
    users_path: PathBuf,
    pending_path: PathBuf,
    orders_path: PathBuf,
}

impl FlatFileStore {
    /// Create a store rooted at `data_dir`, creating the directory if needed.
    pub async fn new(data_dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = data_dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        Ok(Self {
            users_path: dir.join(USERS_FILE),
            pending_path: dir.join(PENDING_FILE),
            orders_path: dir.join(ORDERS_FILE),
        })
    }

    /// Read a file, mapping "not found" to `None`.
    async fn read_optional(path: &Path) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write via temp file + rename so readers never observe a partial file.
    async fn write_atomic(path: &Path, contents: &str) -> Result<(), StorageError> {
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for FlatFileStore {
    async fn load_users(&self) -> Result<Vec<UserRecord>, StorageError> {
        let Some(data) = Self::read_optional(&self.users_path).await? else {
            return Ok(Vec::new());
        };
        Ok(data.lines().filter_map(parse_user_line).collect())
    }

    async fn save_users(&self, users: &[UserRecord]) -> Result<(), StorageError> {
        let body: String = users.iter().map(format_user_line).collect();
        Self::write_atomic(&self.users_path, &body).await
    }

    async fn load_pending(&self) -> Result<Vec<PendingRecord>, StorageError> {
        let Some(data) = Self::read_optional(&self.pending_path).await? else {
            return Ok(Vec::new());
        };
        Ok(data.lines().filter_map(parse_pending_line).collect())
    }

    async fn save_pending(&self, pending: &[PendingRecord]) -> Result<(), StorageError> {
        let body: String = pending.iter().map(format_pending_line).collect();
        Self::write_atomic(&self.pending_path, &body).await
    }

    async fn load_orders(&self) -> Result<Vec<Order>, StorageError> {
        let Some(data) = Self::read_optional(&self.orders_path).await? else {
            return Ok(Vec::new());
        };
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&data).map_err(|e| StorageError::Corrupt {
            file: ORDERS_FILE.into(),
            reason: e.to_string(),
        })
    }

    async fn save_orders(&self, orders: &[Order]) -> Result<(), StorageError> {
        let body =
            serde_json::to_string_pretty(orders).map_err(|e| StorageError::Corrupt {
                file: ORDERS_FILE.into(),
                reason: e.to_string(),
            })?;
        Self::write_atomic(&self.orders_path, &body).await
    }
}

// ── Line codecs ─────────────────────────────────────────────────────

fn parse_user_line(line: &str) -> Option<UserRecord> {
    if line.is_empty() {
        return None;
    }
    let parts: Vec<&str> = line.splitn(5, ':').collect();
    if parts.len() < 5 {
        return None;
    }
    Some(UserRecord {
        id: parts[0].parse().ok()?,
        display_name: parts[1].to_string(),
        role: Role::from_label(parts[2]),
        contact_handle: parts[3].to_string(),
        phone: parts[4].to_string(),
    })
}

fn format_user_line(user: &UserRecord) -> String {
    format!(
        "{}:{}:{}:{}:{}\n",
        user.id,
        user.display_name,
        user.role.label(),
        user.contact_handle,
        user.phone
    )
}

fn parse_pending_line(line: &str) -> Option<PendingRecord> {
    if line.is_empty() {
        return None;
    }
    let parts: Vec<&str> = line.splitn(4, ':').collect();
    if parts.len() < 4 {
        return None;
    }
    Some(PendingRecord {
        id: parts[0].parse().ok()?,
        display_name: parts[1].to_string(),
        contact_handle: parts[2].to_string(),
        phone: parts[3].to_string(),
    })
}

fn format_pending_line(pending: &PendingRecord) -> String {
    format!(
        "{}:{}:{}:{}\n",
        pending.id, pending.display_name, pending.contact_handle, pending.phone
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OrderStatus;

    fn sample_user() -> UserRecord {
        UserRecord {
            id: 42,
            display_name: "Ann 2".into(),
            role: Role::Worker("Restorer".into()),
            contact_handle: "ann".into(),
            phone: "+100200300".into(),
        }
    }

    #[test]
    fn user_line_roundtrip() {
        let user = sample_user();
        let line = format_user_line(&user);
        assert_eq!(line, "42:Ann 2:Restorer:ann:+100200300\n");
        assert_eq!(parse_user_line(line.trim_end()), Some(user));
    }

    #[test]
    fn pending_line_roundtrip() {
        let pending = PendingRecord {
            id: 42,
            display_name: "Ann 2".into(),
            contact_handle: "ann".into(),
            phone: "+100".into(),
        };
        let line = format_pending_line(&pending);
        assert_eq!(parse_pending_line(line.trim_end()), Some(pending));
    }

    #[test]
    fn short_lines_are_skipped_not_fatal() {
        assert!(parse_user_line("42:Ann").is_none());
        assert!(parse_user_line("").is_none());
        assert!(parse_pending_line("42:Ann:handle").is_none());
        assert!(parse_user_line("not-a-number:Ann:admin:h:+1").is_none());
    }

    #[test]
    fn phone_field_keeps_embedded_colons() {
        // splitn(5) — the last field swallows any further delimiters.
        let parsed = parse_user_line("1:Bob:admin:bob:+1:ext:9").unwrap();
        assert_eq!(parsed.phone, "+1:ext:9");
    }

    #[tokio::test]
    async fn missing_files_load_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatFileStore::new(dir.path()).await.unwrap();
        assert!(store.load_users().await.unwrap().is_empty());
        assert!(store.load_pending().await.unwrap().is_empty());
        assert!(store.load_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn users_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatFileStore::new(dir.path()).await.unwrap();
        let users = vec![
            sample_user(),
            UserRecord {
                id: 7,
                display_name: "Boss".into(),
                role: Role::Admin,
                contact_handle: "boss".into(),
                phone: "".into(),
            },
        ];
        store.save_users(&users).await.unwrap();
        assert_eq!(store.load_users().await.unwrap(), users);
    }

    #[tokio::test]
    async fn pending_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatFileStore::new(dir.path()).await.unwrap();
        let pending = vec![PendingRecord {
            id: 42,
            display_name: "Ann 2".into(),
            contact_handle: "ann".into(),
            phone: "+100".into(),
        }];
        store.save_pending(&pending).await.unwrap();
        assert_eq!(store.load_pending().await.unwrap(), pending);
    }

    #[tokio::test]
    async fn orders_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatFileStore::new(dir.path()).await.unwrap();
        let orders = vec![Order {
            id: 1,
            owner: 42,
            status: OrderStatus::Active,
            start_evidence: Some("photo".into()),
            end_evidence: None,
        }];
        store.save_orders(&orders).await.unwrap();
        assert_eq!(store.load_orders().await.unwrap(), orders);
    }

    #[tokio::test]
    async fn corrupt_orders_file_is_an_error_not_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatFileStore::new(dir.path()).await.unwrap();
        tokio::fs::write(dir.path().join(ORDERS_FILE), "{ not json")
            .await
            .unwrap();
        assert!(matches!(
            store.load_orders().await,
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn mixed_valid_and_short_lines_load_partial() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatFileStore::new(dir.path()).await.unwrap();
        tokio::fs::write(
            dir.path().join(USERS_FILE),
            "42:Ann 2:Restorer:ann:+1\nbroken line\n7:Boss:admin:boss:+2\n",
        )
        .await
        .unwrap();
        let users = store.load_users().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, 42);
        assert_eq!(users[1].id, 7);
    }
}
