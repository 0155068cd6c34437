//! Client-resident data store for boards, lists and tasks.
//!
//! The [`BoardStore`] owns the live model; every change is written through
//! to a single snapshot record by the [`PersistenceGateway`].

pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod repo;
pub mod sample;
pub mod store;

pub use config::{ConfigError, DbLocation, StoreConfig};
pub use gateway::{PersistenceGateway, StorageError, StorageErrorKind, StorageResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::board::{
    Board, BoardId, BoardList, BoardPatch, ListId, ListPatch, NewBoard, NewList,
};
pub use model::snapshot::{
    decode_snapshot, encode_snapshot, DecodeError, EncodeError, Snapshot,
};
pub use model::task::{NewTask, Task, TaskId, TaskPatch, TaskPriority};
pub use repo::snapshot_repo::{RepoError, RepoResult, SnapshotRepository, SqliteSnapshotRepository};
pub use sample::{generate_sample_data, SampleData};
pub use store::{
    BoardStore, Clock, SaveStatus, StoreChange, StoreEvent, StoreOptions, StoreOrigin,
    SubscriptionId, SystemClock,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
