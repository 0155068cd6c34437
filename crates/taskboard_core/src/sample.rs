//! Initial dataset for first launch.
//!
//! # Responsibility
//! - Produce a small, referentially consistent set of boards, lists and
//!   tasks used when no saved snapshot can be adopted.
//!
//! # Invariants
//! - Every produced list references a produced board; every produced task
//!   references a produced list and that list's board.

use crate::model::board::{Board, BoardList, NewBoard, NewList};
use crate::model::snapshot::Snapshot;
use crate::model::task::{NewTask, Task, TaskPriority};
use chrono::{DateTime, Duration, Utc};

/// Collections produced by a sample-data producer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleData {
    pub boards: Vec<Board>,
    pub lists: Vec<BoardList>,
    pub tasks: Vec<Task>,
}

impl SampleData {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Converts to a snapshot with the first board active.
    pub fn into_snapshot(self) -> Snapshot {
        let active_board_id = self.boards.first().map(|board| board.id);
        Snapshot {
            boards: self.boards,
            lists: self.lists,
            tasks: self.tasks,
            active_board_id,
        }
    }
}

/// Default sample-data producer stamped with the current time.
pub fn generate_sample_data() -> SampleData {
    generate_sample_data_at(Utc::now())
}

/// Sample data with every timestamp derived from `now`.
pub fn generate_sample_data_at(now: DateTime<Utc>) -> SampleData {
    let mut data = SampleData::default();

    let product = data.board(
        NewBoard {
            title: "Product Launch".to_string(),
            description: Some("Everything needed to ship v1".to_string()),
            color: Some("#4f46e5".to_string()),
        },
        now,
    );
    let backlog = data.list(&product, "Backlog", now);
    let doing = data.list(&product, "In Progress", now);
    let done = data.list(&product, "Done", now);

    data.task(
        &backlog,
        NewTask::new(product.id, backlog.id, "Write release notes")
            .with_description("Summarize user-facing changes for the announcement")
            .with_tags(["docs", "marketing"]),
        now,
    );
    data.task(
        &backlog,
        NewTask {
            priority: TaskPriority::High,
            due_date: Some(now + Duration::days(7)),
            ..NewTask::new(product.id, backlog.id, "Fix checkout timeout")
                .with_description("Payments hang after 30s on slow networks")
                .with_tags(["urgent", "backend"])
        },
        now,
    );
    data.task(
        &doing,
        NewTask::new(product.id, doing.id, "Design onboarding flow")
            .with_tags(["design"]),
        now,
    );
    data.task(
        &done,
        NewTask {
            priority: TaskPriority::Low,
            ..NewTask::new(product.id, done.id, "Set up CI pipeline").with_tags(["infra"])
        },
        now,
    );

    let personal = data.board(
        NewBoard {
            title: "Personal".to_string(),
            description: None,
            color: Some("#16a34a".to_string()),
        },
        now,
    );
    let todo = data.list(&personal, "To Do", now);
    data.list(&personal, "Someday", now);
    data.task(
        &todo,
        NewTask {
            due_date: Some(now + Duration::days(2)),
            ..NewTask::new(personal.id, todo.id, "Renew passport").with_tags(["errands"])
        },
        now,
    );

    data
}

impl SampleData {
    fn board(&mut self, input: NewBoard, now: DateTime<Utc>) -> Board {
        let board = Board::create(input, now);
        self.boards.push(board.clone());
        board
    }

    fn list(&mut self, board: &Board, title: &str, now: DateTime<Utc>) -> BoardList {
        let position = self
            .lists
            .iter()
            .filter(|list| list.board_id == board.id)
            .count() as i64;
        let list = BoardList::create(NewList::new(board.id, title), position, now);
        self.lists.push(list.clone());
        list
    }

    fn task(&mut self, list: &BoardList, mut input: NewTask, now: DateTime<Utc>) {
        input.board_id = list.board_id;
        input.list_id = list.id;
        let position = self
            .tasks
            .iter()
            .filter(|task| task.list_id == list.id)
            .count() as i64;
        self.tasks.push(Task::create(input, position, now));
    }
}

#[cfg(test)]
mod tests {
    use super::generate_sample_data;
    use std::collections::HashSet;

    #[test]
    fn sample_data_is_referentially_consistent() {
        let data = generate_sample_data();
        assert!(!data.boards.is_empty());

        let board_ids: HashSet<_> = data.boards.iter().map(|board| board.id).collect();
        for list in &data.lists {
            assert!(board_ids.contains(&list.board_id));
        }
        for task in &data.tasks {
            let list = data
                .lists
                .iter()
                .find(|list| list.id == task.list_id)
                .expect("task list should exist");
            assert_eq!(list.board_id, task.board_id);
        }
    }

    #[test]
    fn into_snapshot_activates_first_board() {
        let data = generate_sample_data();
        let first = data.boards[0].id;
        assert_eq!(data.into_snapshot().active_board_id, Some(first));
    }
}
