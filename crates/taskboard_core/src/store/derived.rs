//! Selections computed from the base collections.
//!
//! # Invariants
//! - Recomputed synchronously after every store change; never edited in place.
//! - `filtered_tasks` spans all boards, not only the active one.

use crate::model::board::{Board, BoardId, BoardList};
use crate::model::task::Task;

#[derive(Debug, Clone, Default)]
pub(crate) struct DerivedState {
    pub active_board: Option<usize>,
    pub active_board_lists: Vec<BoardList>,
    pub active_board_tasks: Vec<Task>,
    pub filtered_tasks: Vec<Task>,
}

impl DerivedState {
    pub fn compute(
        boards: &[Board],
        lists: &[BoardList],
        tasks: &[Task],
        active_board_id: Option<BoardId>,
        search_query: &str,
    ) -> Self {
        let active_board = active_board_id
            .and_then(|active| boards.iter().position(|board| board.id == active));

        let (active_board_lists, active_board_tasks) = match active_board_id {
            Some(active) => {
                let mut lists: Vec<BoardList> = lists
                    .iter()
                    .filter(|list| list.board_id == active)
                    .cloned()
                    .collect();
                lists.sort_by_key(|list| list.position);
                let tasks = tasks
                    .iter()
                    .filter(|task| task.board_id == active)
                    .cloned()
                    .collect();
                (lists, tasks)
            }
            None => (Vec::new(), Vec::new()),
        };

        Self {
            active_board,
            active_board_lists,
            active_board_tasks,
            filtered_tasks: filter_tasks(tasks, search_query),
        }
    }
}

/// Tasks whose title, description or a tag contains the trimmed query,
/// ignoring case. A blank query keeps every task.
pub fn filter_tasks(tasks: &[Task], query: &str) -> Vec<Task> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return tasks.to_vec();
    }
    tasks
        .iter()
        .filter(|task| task.matches_lowercase(&needle))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::filter_tasks;
    use crate::model::task::{NewTask, Task};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn task(title: &str, tags: &[&str]) -> Task {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        Task::create(
            NewTask::new(Uuid::new_v4(), Uuid::new_v4(), title).with_tags(tags.iter().copied()),
            0,
            now,
        )
    }

    #[test]
    fn whitespace_query_keeps_all_tasks() {
        let tasks = vec![task("a", &[]), task("b", &[])];
        assert_eq!(filter_tasks(&tasks, "   "), tasks);
    }

    #[test]
    fn query_matches_tags_ignoring_case() {
        let tasks = vec![task("deploy", &["urgent"]), task("lunch", &[])];
        let hits = filter_tasks(&tasks, " URGENT ");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "deploy");
    }
}
