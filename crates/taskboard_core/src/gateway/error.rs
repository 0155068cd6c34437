//! Gateway error taxonomy.

use crate::db::DbError;
use crate::model::snapshot::{DecodeError, EncodeError};
use crate::repo::snapshot_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StorageResult<T> = Result<T, StorageError>;

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// The embedded engine could not be opened.
    Unavailable,
    /// Loading or decoding the snapshot failed.
    Read,
    /// Committing or clearing the snapshot failed.
    Write,
}

impl StorageErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unavailable => "storage_unavailable",
            Self::Read => "storage_read_error",
            Self::Write => "storage_write_error",
        }
    }
}

/// Failure of a gateway operation.
#[derive(Debug)]
pub enum StorageError {
    Unavailable(DbError),
    ReadFailed(RepoError),
    /// Stored record exists but is not a valid snapshot.
    Corrupted(DecodeError),
    WriteFailed(RepoError),
    /// Snapshot would not read back; nothing was written.
    Encode(EncodeError),
    /// Blocking worker panicked or the connection lock was poisoned.
    Worker {
        kind: StorageErrorKind,
        message: String,
    },
}

impl StorageError {
    pub fn kind(&self) -> StorageErrorKind {
        match self {
            Self::Unavailable(_) => StorageErrorKind::Unavailable,
            Self::ReadFailed(_) | Self::Corrupted(_) => StorageErrorKind::Read,
            Self::WriteFailed(_) | Self::Encode(_) => StorageErrorKind::Write,
            Self::Worker { kind, .. } => *kind,
        }
    }

    /// Log-safe description: reason codes and entity/field names only, never
    /// stored board or task text.
    pub fn log_detail(&self) -> String {
        let (reason, location) = match self {
            Self::Corrupted(err) => (err.reason(), err.location()),
            Self::Encode(err) => (err.reason(), err.location()),
            Self::Unavailable(err) => (err.reason(), None),
            Self::ReadFailed(_) => ("read_failed", None),
            Self::WriteFailed(_) => ("write_failed", None),
            Self::Worker { .. } => ("worker_failed", None),
        };
        match location {
            Some((entity, field)) => format!("reason={reason} entity={entity} field={field}"),
            None => format!("reason={reason}"),
        }
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(err) => write!(f, "storage unavailable: {err}"),
            Self::ReadFailed(err) => write!(f, "snapshot read failed: {err}"),
            Self::Corrupted(err) => write!(f, "snapshot read failed: {err}"),
            Self::WriteFailed(err) => write!(f, "snapshot write failed: {err}"),
            Self::Encode(err) => write!(f, "snapshot write failed: {err}"),
            Self::Worker { kind, message } => write!(f, "{}: {message}", kind.as_str()),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Unavailable(err) => Some(err),
            Self::ReadFailed(err) | Self::WriteFailed(err) => Some(err),
            Self::Corrupted(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::Worker { .. } => None,
        }
    }
}
