//! Board and list records.
//!
//! # Responsibility
//! - Define the `Board` root entity and the `BoardList` columns it owns.
//! - Merge partial updates into existing records.
//!
//! # Invariants
//! - `BoardList::board_id` is fixed at creation; lists never change boards.
//! - Applying a patch always refreshes `updated_at`, even when no field
//!   value changes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Stable board identifier.
pub type BoardId = Uuid;
/// Stable list identifier.
pub type ListId = Uuid;

/// Root of a board's lists and tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: BoardId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form color token used by views (for example `#4f46e5`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a board.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewBoard {
    pub title: String,
    pub description: Option<String>,
    pub color: Option<String>,
}

impl NewBoard {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial board update. `None` leaves a field untouched; for clearable
/// fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub color: Option<Option<String>>,
}

impl Board {
    /// Creates a board with a fresh id and both timestamps set to `now`.
    pub fn create(input: NewBoard, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            color: input.color,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merges `patch` into this board.
    pub fn apply(&mut self, patch: BoardPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        self.updated_at = now;
    }
}

/// Ordered column of tasks inside one board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardList {
    pub id: ListId,
    pub board_id: BoardId,
    pub title: String,
    /// Display order among lists of the same board, ascending.
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewList {
    pub board_id: BoardId,
    pub title: String,
    /// `None` places the list after the current last list of the board.
    pub position: Option<i64>,
}

impl NewList {
    pub fn new(board_id: BoardId, title: impl Into<String>) -> Self {
        Self {
            board_id,
            title: title.into(),
            position: None,
        }
    }

    pub fn at_position(mut self, position: i64) -> Self {
        self.position = Some(position);
        self
    }
}

/// Partial list update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPatch {
    pub title: Option<String>,
    pub position: Option<i64>,
}

impl BoardList {
    /// Creates a list with a fresh id at an already resolved position.
    pub fn create(input: NewList, position: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            board_id: input.board_id,
            title: input.title,
            position,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merges `patch` into this list.
    pub fn apply(&mut self, patch: ListPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        self.updated_at = now;
    }
}
