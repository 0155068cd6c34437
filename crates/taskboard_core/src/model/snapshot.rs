//! Whole-state snapshot and its persisted codec.
//!
//! # Responsibility
//! - Define `Snapshot`, the unit of durability (boards, lists, tasks and the
//!   active board selector).
//! - Encode snapshots to the persisted JSON record.
//! - Decode persisted records through an explicit validation step that
//!   rehydrates every instant into `DateTime<Utc>`.
//!
//! # Invariants
//! - Decoding never yields a partially-typed snapshot: unknown fields, bad
//!   ids, unparsable instants and duplicate ids are all errors.
//! - Encoding refuses anything decoding would reject, so a record that was
//!   written can always be read back.
//! - Instants are accepted as RFC 3339 strings or integer epoch milliseconds
//!   and are always written back as RFC 3339 strings with years 0000-9999.
//! - Decoding keeps field values as stored; normalization happens when
//!   entities are created or patched, not on load.
//! - Absent optional fields (`dueDate`, `description`, `color`) stay absent.

use crate::model::board::{Board, BoardId, BoardList};
use crate::model::task::{Task, TaskPriority};
use chrono::{DateTime, Datelike, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Complete application state persisted as one atomic unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub boards: Vec<Board>,
    pub lists: Vec<BoardList>,
    pub tasks: Vec<Task>,
    pub active_board_id: Option<BoardId>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }
}

/// Error produced when a persisted record cannot become a typed snapshot.
#[derive(Debug)]
pub enum DecodeError {
    /// Payload is not valid JSON or does not have the record shape.
    Json(serde_json::Error),
    InvalidInstant {
        entity: &'static str,
        field: &'static str,
        value: String,
    },
    DuplicateId {
        entity: &'static str,
        id: Uuid,
    },
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "malformed snapshot record: {err}"),
            Self::InvalidInstant {
                entity,
                field,
                value,
            } => write!(f, "invalid instant `{value}` in {entity}.{field}"),
            Self::DuplicateId { entity, id } => write!(f, "duplicate {entity} id {id}"),
        }
    }
}

impl DecodeError {
    /// Stable reason code without any stored text, for log lines.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Json(_) => "malformed_record",
            Self::InvalidInstant { .. } => "invalid_instant",
            Self::DuplicateId { .. } => "duplicate_id",
        }
    }

    /// `(entity, field)` the failure points at, when known.
    pub fn location(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Json(_) => None,
            Self::InvalidInstant { entity, field, .. } => Some((*entity, *field)),
            Self::DuplicateId { entity, .. } => Some((*entity, "id")),
        }
    }
}

impl Error for DecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Error produced when a snapshot cannot be written as a readable record.
#[derive(Debug)]
pub enum EncodeError {
    Json(serde_json::Error),
    /// Instant year falls outside the RFC 3339 range 0000-9999.
    InstantOutOfRange {
        entity: &'static str,
        field: &'static str,
        id: Uuid,
    },
    DuplicateId {
        entity: &'static str,
        id: Uuid,
    },
}

impl EncodeError {
    /// Stable reason code without any stored text, for log lines.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Json(_) => "serialize_failed",
            Self::InstantOutOfRange { .. } => "instant_out_of_range",
            Self::DuplicateId { .. } => "duplicate_id",
        }
    }

    /// `(entity, field)` the failure points at, when known.
    pub fn location(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Json(_) => None,
            Self::InstantOutOfRange { entity, field, .. } => Some((*entity, *field)),
            Self::DuplicateId { entity, .. } => Some((*entity, "id")),
        }
    }
}

impl Display for EncodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "cannot serialize snapshot: {err}"),
            Self::InstantOutOfRange { entity, field, id } => write!(
                f,
                "{entity}.{field} of {id} is outside years 0000-9999"
            ),
            Self::DuplicateId { entity, id } => write!(f, "duplicate {entity} id {id}"),
        }
    }
}

impl Error for EncodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for EncodeError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Serializes a snapshot into the persisted record format.
///
/// # Errors
/// - Duplicate ids within boards, lists or tasks.
/// - An instant outside years 0000-9999.
pub fn encode_snapshot(snapshot: &Snapshot) -> Result<String, EncodeError> {
    let duplicates = [
        ("board", first_duplicate(snapshot.boards.iter().map(|board| board.id))),
        ("list", first_duplicate(snapshot.lists.iter().map(|list| list.id))),
        ("task", first_duplicate(snapshot.tasks.iter().map(|task| task.id))),
    ];
    for (entity, duplicate) in duplicates {
        if let Some(id) = duplicate {
            return Err(EncodeError::DuplicateId { entity, id });
        }
    }

    for board in &snapshot.boards {
        ensure_in_range("board", "createdAt", board.id, &board.created_at)?;
        ensure_in_range("board", "updatedAt", board.id, &board.updated_at)?;
    }
    for list in &snapshot.lists {
        ensure_in_range("list", "createdAt", list.id, &list.created_at)?;
        ensure_in_range("list", "updatedAt", list.id, &list.updated_at)?;
    }
    for task in &snapshot.tasks {
        ensure_in_range("task", "createdAt", task.id, &task.created_at)?;
        ensure_in_range("task", "updatedAt", task.id, &task.updated_at)?;
        if let Some(due_date) = &task.due_date {
            ensure_in_range("task", "dueDate", task.id, due_date)?;
        }
    }

    Ok(serde_json::to_string(snapshot)?)
}

fn ensure_in_range(
    entity: &'static str,
    field: &'static str,
    id: Uuid,
    instant: &DateTime<Utc>,
) -> Result<(), EncodeError> {
    if (0..=9999).contains(&instant.year()) {
        Ok(())
    } else {
        Err(EncodeError::InstantOutOfRange { entity, field, id })
    }
}

/// Parses and validates a persisted record, rehydrating all instants.
pub fn decode_snapshot(payload: &str) -> Result<Snapshot, DecodeError> {
    let record: PersistedSnapshot = serde_json::from_str(payload)?;

    let boards = record
        .boards
        .into_iter()
        .map(PersistedBoard::into_board)
        .collect::<Result<Vec<_>, _>>()?;
    let lists = record
        .lists
        .into_iter()
        .map(PersistedList::into_list)
        .collect::<Result<Vec<_>, _>>()?;
    let tasks = record
        .tasks
        .into_iter()
        .map(PersistedTask::into_task)
        .collect::<Result<Vec<_>, _>>()?;

    ensure_unique("board", boards.iter().map(|board| board.id))?;
    ensure_unique("list", lists.iter().map(|list| list.id))?;
    ensure_unique("task", tasks.iter().map(|task| task.id))?;

    Ok(Snapshot {
        boards,
        lists,
        tasks,
        active_board_id: record.active_board_id,
    })
}

fn ensure_unique(
    entity: &'static str,
    ids: impl Iterator<Item = Uuid>,
) -> Result<(), DecodeError> {
    match first_duplicate(ids) {
        Some(id) => Err(DecodeError::DuplicateId { entity, id }),
        None => Ok(()),
    }
}

fn first_duplicate(mut ids: impl Iterator<Item = Uuid>) -> Option<Uuid> {
    let mut seen = HashSet::new();
    ids.find(|id| !seen.insert(*id))
}

/// Instant as found on disk, before rehydration.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PersistedInstant {
    EpochMillis(i64),
    Text(String),
}

impl PersistedInstant {
    fn rehydrate(
        self,
        entity: &'static str,
        field: &'static str,
    ) -> Result<DateTime<Utc>, DecodeError> {
        let parsed = match &self {
            Self::EpochMillis(millis) => DateTime::<Utc>::from_timestamp_millis(*millis),
            // Also accepts signed years beyond 9999 (`+10000-01-01T00:00:00Z`).
            Self::Text(text) => text
                .trim()
                .parse::<DateTime<FixedOffset>>()
                .ok()
                .map(|value| value.with_timezone(&Utc)),
        };
        parsed.ok_or_else(|| DecodeError::InvalidInstant {
            entity,
            field,
            value: match self {
                Self::EpochMillis(millis) => millis.to_string(),
                Self::Text(text) => text,
            },
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PersistedSnapshot {
    boards: Vec<PersistedBoard>,
    lists: Vec<PersistedList>,
    tasks: Vec<PersistedTask>,
    #[serde(default)]
    active_board_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PersistedBoard {
    id: Uuid,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    color: Option<String>,
    created_at: PersistedInstant,
    updated_at: PersistedInstant,
}

impl PersistedBoard {
    fn into_board(self) -> Result<Board, DecodeError> {
        Ok(Board {
            id: self.id,
            title: self.title,
            description: self.description,
            color: self.color,
            created_at: self.created_at.rehydrate("board", "createdAt")?,
            updated_at: self.updated_at.rehydrate("board", "updatedAt")?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PersistedList {
    id: Uuid,
    board_id: Uuid,
    title: String,
    position: i64,
    created_at: PersistedInstant,
    updated_at: PersistedInstant,
}

impl PersistedList {
    fn into_list(self) -> Result<BoardList, DecodeError> {
        Ok(BoardList {
            id: self.id,
            board_id: self.board_id,
            title: self.title,
            position: self.position,
            created_at: self.created_at.rehydrate("list", "createdAt")?,
            updated_at: self.updated_at.rehydrate("list", "updatedAt")?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PersistedTask {
    id: Uuid,
    list_id: Uuid,
    board_id: Uuid,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    priority: TaskPriority,
    #[serde(default)]
    due_date: Option<PersistedInstant>,
    position: i64,
    created_at: PersistedInstant,
    updated_at: PersistedInstant,
}

impl PersistedTask {
    fn into_task(self) -> Result<Task, DecodeError> {
        let due_date = match self.due_date {
            Some(value) => Some(value.rehydrate("task", "dueDate")?),
            None => None,
        };
        Ok(Task {
            id: self.id,
            list_id: self.list_id,
            board_id: self.board_id,
            title: self.title,
            description: self.description,
            tags: self.tags,
            priority: self.priority,
            due_date,
            position: self.position,
            created_at: self.created_at.rehydrate("task", "createdAt")?,
            updated_at: self.updated_at.rehydrate("task", "updatedAt")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_snapshot, encode_snapshot, DecodeError, EncodeError, Snapshot};
    use crate::model::board::{Board, BoardList, NewBoard, NewList};
    use crate::model::task::{NewTask, Task};
    use chrono::{Datelike, TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn decode_accepts_epoch_millis_and_rfc3339() {
        let payload = json!({
            "boards": [{
                "id": "7d1f1c9e-4d8e-4a43-9c3c-1b2f3e4d5a6b",
                "title": "Ops",
                "createdAt": 1_700_000_000_000_i64,
                "updatedAt": "2023-11-14T22:13:20.000Z"
            }],
            "lists": [],
            "tasks": [],
            "activeBoardId": null
        })
        .to_string();

        let snapshot = decode_snapshot(&payload).expect("record should decode");
        let board = &snapshot.boards[0];
        assert_eq!(board.created_at, board.updated_at);
        assert_eq!(board.created_at.timestamp_millis(), 1_700_000_000_000);
        assert!(snapshot.active_board_id.is_none());
    }

    #[test]
    fn decode_rejects_unparsable_instant() {
        let payload = json!({
            "boards": [{
                "id": "7d1f1c9e-4d8e-4a43-9c3c-1b2f3e4d5a6b",
                "title": "Ops",
                "createdAt": "yesterday",
                "updatedAt": "2023-11-14T22:13:20Z"
            }],
            "lists": [],
            "tasks": []
        })
        .to_string();

        let err = decode_snapshot(&payload).expect_err("bad instant must fail");
        assert!(matches!(
            err,
            DecodeError::InvalidInstant { entity: "board", field: "createdAt", .. }
        ));
    }

    #[test]
    fn decode_rejects_unknown_fields() {
        let payload = json!({
            "boards": [],
            "lists": [],
            "tasks": [],
            "theme": "dark"
        })
        .to_string();

        let err = decode_snapshot(&payload).expect_err("unknown field must fail");
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn encode_writes_rfc3339_strings_and_skips_absent_optionals() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let board = Board::create(NewBoard::titled("Home"), now);
        let snapshot = Snapshot {
            active_board_id: Some(board.id),
            boards: vec![board],
            ..Snapshot::default()
        };

        let encoded = encode_snapshot(&snapshot).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["boards"][0]["createdAt"], "2024-01-02T03:04:05Z");
        assert!(value["boards"][0].get("description").is_none());
        assert!(value.get("activeBoardId").is_some());
    }

    fn one_task_snapshot() -> Snapshot {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let board = Board::create(NewBoard::titled("Home"), now);
        let list = BoardList::create(NewList::new(board.id, "Todo"), 0, now);
        let task = Task::create(NewTask::new(board.id, list.id, "Water plants"), 0, now);
        Snapshot {
            active_board_id: Some(board.id),
            boards: vec![board],
            lists: vec![list],
            tasks: vec![task],
        }
    }

    #[test]
    fn decode_accepts_signed_years_beyond_9999() {
        let payload = json!({
            "boards": [{
                "id": "7d1f1c9e-4d8e-4a43-9c3c-1b2f3e4d5a6b",
                "title": "Ops",
                "createdAt": "+10000-01-01T00:00:00Z",
                "updatedAt": "2023-11-14T22:13:20Z"
            }],
            "lists": [],
            "tasks": []
        })
        .to_string();

        let snapshot = decode_snapshot(&payload).expect("signed year should decode");
        assert_eq!(snapshot.boards[0].created_at.year(), 10000);
    }

    #[test]
    fn encode_rejects_instant_outside_four_digit_years() {
        let mut snapshot = one_task_snapshot();
        snapshot.tasks[0].due_date = Some(Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap());

        let err = encode_snapshot(&snapshot).expect_err("year 10000 must not be written");
        assert!(matches!(
            err,
            EncodeError::InstantOutOfRange { entity: "task", field: "dueDate", .. }
        ));
        assert_eq!(err.location(), Some(("task", "dueDate")));
    }

    #[test]
    fn encode_rejects_duplicate_ids() {
        let mut snapshot = one_task_snapshot();
        let copy = snapshot.tasks[0].clone();
        snapshot.tasks.push(copy);

        let err = encode_snapshot(&snapshot).expect_err("duplicate task ids must not be written");
        assert!(matches!(err, EncodeError::DuplicateId { entity: "task", .. }));
    }

    #[test]
    fn decode_keeps_tags_as_stored() {
        let mut snapshot = one_task_snapshot();
        snapshot.tasks[0].tags = vec![" a ".to_string(), "A".to_string()];

        let decoded = decode_snapshot(&encode_snapshot(&snapshot).unwrap()).unwrap();
        assert_eq!(decoded, snapshot);
    }
}
