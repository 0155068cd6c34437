//! Task record.
//!
//! # Responsibility
//! - Define the `Task` entity, its priority and tag-set normalization.
//! - Merge partial updates and list moves into existing records.
//!
//! # Invariants
//! - `tags` holds no blank values and no case-insensitive duplicates; the
//!   first spelling of a tag wins.
//! - `board_id` is denormalized from the owning list and kept in step with
//!   it by `relocate`.

use crate::model::board::{BoardId, ListId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Stable task identifier.
pub type TaskId = Uuid;

/// Task urgency shown by views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

/// Work item inside one list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub list_id: ListId,
    pub board_id: BoardId,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub priority: TaskPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    /// Order within the owning list, ascending.
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub list_id: ListId,
    /// Replaced by the owning list's board when that list exists.
    pub board_id: BoardId,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    /// `None` places the task after the current last task of the list.
    pub position: Option<i64>,
}

impl NewTask {
    pub fn new(board_id: BoardId, list_id: ListId, title: impl Into<String>) -> Self {
        Self {
            list_id,
            board_id,
            title: title.into(),
            description: String::new(),
            tags: Vec::new(),
            priority: TaskPriority::default(),
            due_date: None,
            position: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Partial task update. List/board membership changes go through
/// `BoardStore::move_task` instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub position: Option<i64>,
}

impl Task {
    /// Creates a task with a fresh id at an already resolved position.
    pub fn create(input: NewTask, position: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            list_id: input.list_id,
            board_id: input.board_id,
            title: input.title,
            description: input.description,
            tags: normalize_tags(input.tags),
            priority: input.priority,
            due_date: input.due_date,
            position,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merges `patch` into this task.
    pub fn apply(&mut self, patch: TaskPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(tags) = patch.tags {
            self.tags = normalize_tags(tags);
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        self.updated_at = now;
    }

    /// Moves this task into another list (possibly on another board).
    pub fn relocate(
        &mut self,
        list_id: ListId,
        board_id: BoardId,
        position: i64,
        now: DateTime<Utc>,
    ) {
        self.list_id = list_id;
        self.board_id = board_id;
        self.position = position;
        self.updated_at = now;
    }

    /// Case-insensitive substring match over title, description and tags.
    ///
    /// `needle` must already be lowercased.
    pub fn matches_lowercase(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
            || self
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(needle))
    }
}

/// Trims tags, drops blanks and removes case-insensitive duplicates.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(tags.len());
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            normalized.push(trimmed.to_string());
        }
    }
    normalized
}
