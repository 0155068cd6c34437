//! Persistence gateway for the whole-state snapshot.
//!
//! # Responsibility
//! - Own the single embedded database and its one snapshot record.
//! - Expose async `initialize`/`save`/`load`/`clear` over that record.
//! - Run every SQLite call on the blocking pool so callers never stall the
//!   async runtime.
//!
//! # Invariants
//! - Opening is idempotent and race-tolerant: concurrent callers await the
//!   same initializer; a failed open leaves the gateway unopened so a later
//!   call retries.
//! - `save` replaces the record under the fixed key; the last completed
//!   write wins.
//! - `load` always passes through the validated decode step, so instants
//!   reach callers as `DateTime<Utc>`.
//! - `clear` on a missing record succeeds.

mod error;

pub use error::{StorageError, StorageErrorKind, StorageResult};

use crate::config::{ConfigError, DbLocation, StoreConfig};
use crate::db::{open_db, open_db_in_memory};
use crate::model::snapshot::{decode_snapshot, encode_snapshot, Snapshot};
use crate::repo::snapshot_repo::{SnapshotRepository, SqliteSnapshotRepository};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::OnceCell;

type SharedConnection = Arc<Mutex<Connection>>;

/// Durable home of exactly one snapshot record.
pub struct PersistenceGateway {
    location: DbLocation,
    snapshot_key: String,
    conn: OnceCell<SharedConnection>,
}

impl PersistenceGateway {
    /// Creates an unopened gateway for the record under `snapshot_key`.
    ///
    /// # Errors
    /// - `snapshot_key` is blank after trimming.
    pub fn new(
        location: DbLocation,
        snapshot_key: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let snapshot_key = snapshot_key.into();
        let trimmed = snapshot_key.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::Invalid {
                key: "snapshot_key",
                value: snapshot_key,
            });
        }
        Ok(Self {
            location,
            snapshot_key: trimmed.to_string(),
            conn: OnceCell::new(),
        })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self, ConfigError> {
        Self::new(config.db_location.clone(), config.snapshot_key.clone())
    }

    pub fn snapshot_key(&self) -> &str {
        &self.snapshot_key
    }

    pub fn is_initialized(&self) -> bool {
        self.conn.initialized()
    }

    /// Opens the database and applies migrations once.
    ///
    /// # Errors
    /// - `StorageErrorKind::Unavailable` when the engine cannot be opened.
    pub async fn initialize(&self) -> StorageResult<()> {
        self.connection().await.map(|_| ())
    }

    /// Commits `snapshot` as the sole record, opening the database first
    /// when needed.
    ///
    /// # Errors
    /// - `StorageErrorKind::Write` on encode or commit failure. Not retried;
    ///   the previously committed record stays in place.
    pub async fn save(&self, snapshot: &Snapshot) -> StorageResult<()> {
        let started_at = Instant::now();
        let payload = encode_snapshot(snapshot).map_err(StorageError::Encode)?;
        let payload_bytes = payload.len();
        let key = self.snapshot_key.clone();

        let result = self
            .with_connection(StorageErrorKind::Write, move |conn| {
                SqliteSnapshotRepository::new(conn)
                    .put_payload(&key, &payload)
                    .map_err(StorageError::WriteFailed)
            })
            .await;

        match &result {
            Ok(()) => debug!(
                "event=snapshot_save module=gateway status=ok duration_ms={} bytes={} boards={} lists={} tasks={}",
                started_at.elapsed().as_millis(),
                payload_bytes,
                snapshot.boards.len(),
                snapshot.lists.len(),
                snapshot.tasks.len()
            ),
            Err(err) => error!(
                "event=snapshot_save module=gateway status=error duration_ms={} error_code={} {}",
                started_at.elapsed().as_millis(),
                err.kind().as_str(),
                err.log_detail()
            ),
        }
        result
    }

    /// Returns the stored snapshot, or `None` when nothing was saved yet.
    ///
    /// # Errors
    /// - `StorageErrorKind::Read` on engine failure or a corrupt record.
    pub async fn load(&self) -> StorageResult<Option<Snapshot>> {
        let started_at = Instant::now();
        let key = self.snapshot_key.clone();

        let payload = self
            .with_connection(StorageErrorKind::Read, move |conn| {
                SqliteSnapshotRepository::new(conn)
                    .get_payload(&key)
                    .map_err(StorageError::ReadFailed)
            })
            .await;

        let result = payload.and_then(|payload| match payload {
            Some(payload) => decode_snapshot(&payload)
                .map(Some)
                .map_err(StorageError::Corrupted),
            None => Ok(None),
        });

        match &result {
            Ok(Some(snapshot)) => info!(
                "event=snapshot_load module=gateway status=ok duration_ms={} found=true boards={} lists={} tasks={}",
                started_at.elapsed().as_millis(),
                snapshot.boards.len(),
                snapshot.lists.len(),
                snapshot.tasks.len()
            ),
            Ok(None) => info!(
                "event=snapshot_load module=gateway status=ok duration_ms={} found=false",
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=snapshot_load module=gateway status=error duration_ms={} error_code={} {}",
                started_at.elapsed().as_millis(),
                err.kind().as_str(),
                err.log_detail()
            ),
        }
        result
    }

    /// Deletes the snapshot record. Idempotent.
    pub async fn clear(&self) -> StorageResult<()> {
        let key = self.snapshot_key.clone();
        let removed = self
            .with_connection(StorageErrorKind::Write, move |conn| {
                SqliteSnapshotRepository::new(conn)
                    .delete_payload(&key)
                    .map_err(StorageError::WriteFailed)
            })
            .await;

        match &removed {
            Ok(removed) => info!(
                "event=snapshot_clear module=gateway status=ok removed={}",
                removed
            ),
            Err(err) => warn!(
                "event=snapshot_clear module=gateway status=error error_code={} {}",
                err.kind().as_str(),
                err.log_detail()
            ),
        }
        removed.map(|_| ())
    }

    async fn connection(&self) -> StorageResult<SharedConnection> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let location = self.location.clone();
                let opened = tokio::task::spawn_blocking(move || match location {
                    DbLocation::File(path) => open_db(path),
                    DbLocation::Memory => open_db_in_memory(),
                })
                .await;
                match opened {
                    Ok(Ok(conn)) => Ok(Arc::new(Mutex::new(conn))),
                    Ok(Err(err)) => Err(StorageError::Unavailable(err)),
                    Err(err) => Err(StorageError::Worker {
                        kind: StorageErrorKind::Unavailable,
                        message: err.to_string(),
                    }),
                }
            })
            .await?;
        Ok(Arc::clone(conn))
    }

    async fn with_connection<T, F>(&self, kind: StorageErrorKind, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StorageResult<T> + Send + 'static,
    {
        let conn = self.connection().await?;
        tokio::task::spawn_blocking(move || -> StorageResult<T> {
            let guard = conn.lock().map_err(|_| StorageError::Worker {
                kind,
                message: "connection lock poisoned".to_string(),
            })?;
            op(&*guard)
        })
        .await
        .map_err(|err| StorageError::Worker {
            kind,
            message: err.to_string(),
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::{PersistenceGateway, StorageError, StorageErrorKind};
    use crate::config::{ConfigError, DbLocation};
    use crate::model::board::{Board, NewBoard};
    use crate::model::snapshot::{decode_snapshot, Snapshot};
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let gateway = PersistenceGateway::new(DbLocation::Memory, "state").unwrap();
        assert!(!gateway.is_initialized());
        gateway.initialize().await.unwrap();
        gateway.initialize().await.unwrap();
        assert!(gateway.is_initialized());
    }

    #[test]
    fn blank_key_is_rejected_at_construction() {
        let err = PersistenceGateway::new(DbLocation::Memory, "  ").err().unwrap();
        assert!(matches!(err, ConfigError::Invalid { key: "snapshot_key", .. }));
    }

    #[test]
    fn key_is_trimmed() {
        let gateway = PersistenceGateway::new(DbLocation::Memory, " state ").unwrap();
        assert_eq!(gateway.snapshot_key(), "state");
    }

    #[tokio::test]
    async fn unwritable_snapshot_is_a_write_error_with_text_free_detail() {
        let gateway = PersistenceGateway::new(DbLocation::Memory, "state").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let mut board = Board::create(NewBoard::titled("secret plans"), now);
        board.updated_at = Utc.with_ymd_and_hms(12000, 1, 1, 0, 0, 0).unwrap();
        let snapshot = Snapshot {
            boards: vec![board],
            ..Snapshot::default()
        };

        let err = gateway.save(&snapshot).await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::Write);
        assert_eq!(
            err.log_detail(),
            "reason=instant_out_of_range entity=board field=updatedAt"
        );
        assert!(gateway.load().await.unwrap().is_none());
    }

    #[test]
    fn corrupt_record_detail_omits_stored_text() {
        let err = StorageError::Corrupted(
            decode_snapshot(r#"{"boards":[],"lists":[],"tasks":[],"secret plans":1}"#)
                .unwrap_err(),
        );
        let detail = err.log_detail();
        assert_eq!(detail, "reason=malformed_record");
        assert!(!detail.contains("secret"));
    }
}
