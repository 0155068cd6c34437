//! Schema versions of the snapshot database.
//!
//! The schema is tiny: one key/payload table. Versions still go through an
//! ordered list so a later column or index lands as a new step instead of
//! an edit to `0001_init.sql`.
//!
//! # Invariants
//! - Steps are listed in strictly increasing version order.
//! - `PRAGMA user_version` always names the last step applied.
//! - All pending steps commit in one transaction or not at all.
//! - A database stamped newer than the last known step is refused.

use crate::db::{DbError, DbResult};
use rusqlite::Connection;

const SCHEMA_STEPS: &[(u32, &str)] = &[(1, include_str!("0001_init.sql"))];

/// Outcome of bringing a connection up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: u32,
    pub to_version: u32,
}

impl MigrationReport {
    pub fn applied_any(&self) -> bool {
        self.to_version > self.from_version
    }
}

/// Newest schema version this build can open.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |(version, _)| *version)
}

/// Reads the version stamped on `conn`.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Runs every step newer than the stamped version.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<MigrationReport> {
    let from_version = schema_version(conn)?;
    let latest = latest_version();

    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }

    let pending: Vec<_> = SCHEMA_STEPS
        .iter()
        .filter(|(version, _)| *version > from_version)
        .collect();
    if let Some((last, _)) = pending.last() {
        let tx = conn.transaction()?;
        for (_, sql) in &pending {
            tx.execute_batch(sql)?;
        }
        tx.pragma_update(None, "user_version", *last)?;
        tx.commit()?;
    }

    Ok(MigrationReport {
        from_version,
        to_version: latest,
    })
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, latest_version, schema_version, SCHEMA_STEPS};
    use rusqlite::Connection;

    #[test]
    fn steps_are_strictly_increasing_from_one() {
        assert_eq!(SCHEMA_STEPS.first().map(|(version, _)| *version), Some(1));
        assert!(SCHEMA_STEPS
            .windows(2)
            .all(|pair| pair[0].0 < pair[1].0));
    }

    #[test]
    fn second_run_reports_nothing_applied() {
        let mut conn = Connection::open_in_memory().unwrap();

        let first = apply_migrations(&mut conn).unwrap();
        assert_eq!(first.from_version, 0);
        assert!(first.applied_any());

        let second = apply_migrations(&mut conn).unwrap();
        assert!(!second.applied_any());
        assert_eq!(schema_version(&conn).unwrap(), latest_version());
    }
}
