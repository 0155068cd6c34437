//! In-memory board store with write-through persistence.
//!
//! # Responsibility
//! - Own boards, lists and tasks; every external mutation goes through here.
//! - Recompute derived selections synchronously after each change.
//! - Notify subscribers and enqueue a snapshot save after each change.
//! - Bootstrap from the persisted snapshot, or from sample data when there is
//!   none or it cannot be read.
//!
//! # Invariants
//! - Deleting a board removes its lists and tasks; deleting a list removes
//!   its tasks. Nothing else is touched.
//! - A task's `board_id` always follows the list it lives in.
//! - Persistence failures never roll back or block an in-memory mutation.
//! - Starting from sample data after a failed load never overwrites the
//!   stored record by itself.
//! - Mutations on unknown ids are no-ops and emit no event.

mod clock;
mod derived;
mod writer;

pub use clock::{Clock, SystemClock};
pub use derived::filter_tasks;
pub use writer::SaveStatus;

use crate::config::StoreConfig;
use crate::gateway::PersistenceGateway;
use crate::model::board::{
    Board, BoardId, BoardList, BoardPatch, ListId, ListPatch, NewBoard, NewList,
};
use crate::model::snapshot::Snapshot;
use crate::model::task::{NewTask, Task, TaskId, TaskPatch};
use crate::sample::SampleData;
use chrono::{DateTime, Utc};
use derived::DerivedState;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use writer::SnapshotWriter;

/// Where the store's starting state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOrigin {
    /// Adopted a previously saved snapshot.
    Restored,
    /// Generated from the sample-data producer.
    Sample,
}

/// What changed in one store transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    BoardAdded(BoardId),
    BoardUpdated(BoardId),
    BoardDeleted {
        id: BoardId,
        lists_removed: usize,
        tasks_removed: usize,
    },
    ListAdded(ListId),
    ListUpdated(ListId),
    ListDeleted {
        id: ListId,
        tasks_removed: usize,
    },
    TaskAdded(TaskId),
    TaskUpdated(TaskId),
    TaskMoved {
        id: TaskId,
        from_list: ListId,
        to_list: ListId,
    },
    TaskDeleted(TaskId),
    ActiveBoardChanged(Option<BoardId>),
    SearchQueryChanged,
    /// Whole state replaced by `reset_with`.
    Reset,
}

impl StoreChange {
    /// Whether the change touches persisted state.
    pub fn is_persisted(&self) -> bool {
        !matches!(self, Self::SearchQueryChanged)
    }
}

/// Notification delivered to subscribers after a change is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    /// Monotonic counter, one step per applied change.
    pub revision: u64,
    pub change: StoreChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&StoreEvent) + Send>;

/// Construction options for `BoardStore`.
#[derive(Clone)]
pub struct StoreOptions {
    pub save_debounce: Duration,
    pub clock: Arc<dyn Clock>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            save_debounce: Duration::ZERO,
            clock: Arc::new(SystemClock),
        }
    }
}

impl StoreOptions {
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            save_debounce: config.save_debounce,
            ..Self::default()
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Authoritative in-memory model of boards, lists and tasks.
pub struct BoardStore {
    boards: Vec<Board>,
    lists: Vec<BoardList>,
    tasks: Vec<Task>,
    active_board_id: Option<BoardId>,
    search_query: String,
    derived: DerivedState,
    origin: StoreOrigin,
    revision: u64,
    clock: Arc<dyn Clock>,
    gateway: Arc<PersistenceGateway>,
    writer: SnapshotWriter,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl BoardStore {
    /// Opens a store with default options. See [`BoardStore::open_with`].
    pub async fn open<F>(gateway: Arc<PersistenceGateway>, sample: F) -> Self
    where
        F: FnOnce() -> SampleData,
    {
        Self::open_with(gateway, StoreOptions::default(), sample).await
    }

    /// Loads the persisted snapshot or falls back to `sample`.
    ///
    /// A snapshot with at least one board is adopted verbatim. An absent or
    /// empty snapshot, or any load failure, adopts the sample data with its
    /// first board active. The sample is saved right away only when the load
    /// succeeded; after a failed load the stored record is left untouched
    /// until the first mutation.
    ///
    /// Must be called inside a tokio runtime; the snapshot writer is spawned
    /// on it.
    pub async fn open_with<F>(
        gateway: Arc<PersistenceGateway>,
        options: StoreOptions,
        sample: F,
    ) -> Self
    where
        F: FnOnce() -> SampleData,
    {
        let mut load_failed = false;
        let loaded = match gateway.load().await {
            Ok(Some(snapshot)) if !snapshot.is_empty() => Some(snapshot),
            Ok(Some(_)) | Ok(None) => None,
            Err(err) => {
                load_failed = true;
                warn!(
                    "event=store_init module=store status=degraded error_code={} {}",
                    err.kind().as_str(),
                    err.log_detail()
                );
                None
            }
        };

        let (snapshot, origin) = match loaded {
            Some(snapshot) => (snapshot, StoreOrigin::Restored),
            None => (sample().into_snapshot(), StoreOrigin::Sample),
        };

        let writer = SnapshotWriter::spawn(Arc::clone(&gateway), options.save_debounce);
        let mut store = Self {
            boards: Vec::new(),
            lists: Vec::new(),
            tasks: Vec::new(),
            active_board_id: None,
            search_query: String::new(),
            derived: DerivedState::default(),
            origin,
            revision: 0,
            clock: options.clock,
            gateway,
            writer,
            listeners: Vec::new(),
            next_subscription: 0,
        };
        store.adopt(snapshot);

        info!(
            "event=store_init module=store status=ok source={} boards={} lists={} tasks={}",
            match origin {
                StoreOrigin::Restored => "snapshot",
                StoreOrigin::Sample => "sample",
            },
            store.boards.len(),
            store.lists.len(),
            store.tasks.len()
        );

        if origin == StoreOrigin::Sample && !load_failed {
            store.schedule_save();
        }
        store
    }

    pub fn boards(&self) -> &[Board] {
        &self.boards
    }

    pub fn lists(&self) -> &[BoardList] {
        &self.lists
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn active_board_id(&self) -> Option<BoardId> {
        self.active_board_id
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn active_board(&self) -> Option<&Board> {
        self.derived
            .active_board
            .and_then(|index| self.boards.get(index))
    }

    /// Lists of the active board ordered by position.
    pub fn active_board_lists(&self) -> &[BoardList] {
        &self.derived.active_board_lists
    }

    pub fn active_board_tasks(&self) -> &[Task] {
        &self.derived.active_board_tasks
    }

    pub fn filtered_tasks(&self) -> &[Task] {
        &self.derived.filtered_tasks
    }

    pub fn board(&self, id: BoardId) -> Option<&Board> {
        self.boards.iter().find(|board| board.id == id)
    }

    pub fn list(&self, id: ListId) -> Option<&BoardList> {
        self.lists.iter().find(|list| list.id == id)
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Lists of `board_id` ordered by position; ties keep collection order.
    pub fn lists_for_board(&self, board_id: BoardId) -> Vec<&BoardList> {
        let mut lists: Vec<&BoardList> = self
            .lists
            .iter()
            .filter(|list| list.board_id == board_id)
            .collect();
        lists.sort_by_key(|list| list.position);
        lists
    }

    /// Tasks of `list_id` ordered by position; ties keep collection order.
    pub fn tasks_for_list(&self, list_id: ListId) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|task| task.list_id == list_id)
            .collect();
        tasks.sort_by_key(|task| task.position);
        tasks
    }

    pub fn origin(&self) -> StoreOrigin {
        self.origin
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Full current state as one value.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            boards: self.boards.clone(),
            lists: self.lists.clone(),
            tasks: self.tasks.clone(),
            active_board_id: self.active_board_id,
        }
    }

    pub fn save_status(&self) -> SaveStatus {
        self.writer.status()
    }

    /// Registers `listener`, called synchronously after every change.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&StoreEvent) + Send + 'static,
    {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` when it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub fn add_board(&mut self, input: NewBoard) -> Board {
        let board = Board::create(input, self.now());
        self.boards.push(board.clone());
        self.commit(StoreChange::BoardAdded(board.id));
        board
    }

    pub fn update_board(&mut self, id: BoardId, patch: BoardPatch) -> Option<Board> {
        let now = self.now();
        let board = self.boards.iter_mut().find(|board| board.id == id)?;
        board.apply(patch, now);
        let updated = board.clone();
        self.commit(StoreChange::BoardUpdated(id));
        Some(updated)
    }

    /// Removes a board with its lists and tasks. Returns whether it existed.
    ///
    /// When the removed board was active, the first remaining board becomes
    /// active (or none when no board is left).
    pub fn delete_board(&mut self, id: BoardId) -> bool {
        let before = self.boards.len();
        self.boards.retain(|board| board.id != id);
        if self.boards.len() == before {
            return false;
        }

        let removed_lists: HashSet<ListId> = self
            .lists
            .iter()
            .filter(|list| list.board_id == id)
            .map(|list| list.id)
            .collect();
        self.lists.retain(|list| list.board_id != id);

        let tasks_before = self.tasks.len();
        self.tasks
            .retain(|task| task.board_id != id && !removed_lists.contains(&task.list_id));
        let tasks_removed = tasks_before - self.tasks.len();

        if self.active_board_id == Some(id) {
            self.active_board_id = self.boards.first().map(|board| board.id);
        }

        self.commit(StoreChange::BoardDeleted {
            id,
            lists_removed: removed_lists.len(),
            tasks_removed,
        });
        true
    }

    /// Appends a list. Without an explicit position it goes after the last
    /// list of its board.
    pub fn add_list(&mut self, input: NewList) -> BoardList {
        let position = input.position.unwrap_or_else(|| {
            next_position(
                self.lists
                    .iter()
                    .filter(|list| list.board_id == input.board_id)
                    .map(|list| list.position),
            )
        });
        let list = BoardList::create(input, position, self.now());
        self.lists.push(list.clone());
        self.commit(StoreChange::ListAdded(list.id));
        list
    }

    pub fn update_list(&mut self, id: ListId, patch: ListPatch) -> Option<BoardList> {
        let now = self.now();
        let list = self.lists.iter_mut().find(|list| list.id == id)?;
        list.apply(patch, now);
        let updated = list.clone();
        self.commit(StoreChange::ListUpdated(id));
        Some(updated)
    }

    pub fn reorder_list(&mut self, id: ListId, new_position: i64) -> Option<BoardList> {
        self.update_list(
            id,
            ListPatch {
                position: Some(new_position),
                ..ListPatch::default()
            },
        )
    }

    /// Removes a list with its tasks. Returns whether it existed.
    pub fn delete_list(&mut self, id: ListId) -> bool {
        let before = self.lists.len();
        self.lists.retain(|list| list.id != id);
        if self.lists.len() == before {
            return false;
        }

        let tasks_before = self.tasks.len();
        self.tasks.retain(|task| task.list_id != id);
        let tasks_removed = tasks_before - self.tasks.len();

        self.commit(StoreChange::ListDeleted { id, tasks_removed });
        true
    }

    /// Appends a task. The owning list's board wins over `input.board_id`
    /// when that list exists.
    pub fn add_task(&mut self, mut input: NewTask) -> Task {
        if let Some(list) = self.list(input.list_id) {
            input.board_id = list.board_id;
        }
        let position = input.position.unwrap_or_else(|| {
            next_position(
                self.tasks
                    .iter()
                    .filter(|task| task.list_id == input.list_id)
                    .map(|task| task.position),
            )
        });
        let task = Task::create(input, position, self.now());
        self.tasks.push(task.clone());
        self.commit(StoreChange::TaskAdded(task.id));
        task
    }

    pub fn update_task(&mut self, id: TaskId, patch: TaskPatch) -> Option<Task> {
        let now = self.now();
        let task = self.tasks.iter_mut().find(|task| task.id == id)?;
        task.apply(patch, now);
        let updated = task.clone();
        self.commit(StoreChange::TaskUpdated(id));
        Some(updated)
    }

    /// Moves a task into `target_list_id` at `position`.
    ///
    /// The task adopts the target list's board, so moves across boards keep
    /// `board_id` consistent. Unknown task or list ids leave the store
    /// untouched and return `None`.
    pub fn move_task(
        &mut self,
        id: TaskId,
        target_list_id: ListId,
        position: i64,
    ) -> Option<Task> {
        let target_board = self.list(target_list_id)?.board_id;
        let now = self.now();
        let task = self.tasks.iter_mut().find(|task| task.id == id)?;
        let from_list = task.list_id;
        task.relocate(target_list_id, target_board, position, now);
        let moved = task.clone();
        self.commit(StoreChange::TaskMoved {
            id,
            from_list,
            to_list: target_list_id,
        });
        Some(moved)
    }

    /// Removes one task. Returns whether it existed.
    pub fn delete_task(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        if self.tasks.len() == before {
            return false;
        }
        self.commit(StoreChange::TaskDeleted(id));
        true
    }

    pub fn set_active_board_id(&mut self, id: Option<BoardId>) {
        if self.active_board_id == id {
            return;
        }
        self.active_board_id = id;
        self.commit(StoreChange::ActiveBoardChanged(id));
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        let query = query.into();
        if self.search_query == query {
            return;
        }
        self.search_query = query;
        self.commit(StoreChange::SearchQueryChanged);
    }

    /// Clears the persisted snapshot and restarts from `sample`.
    ///
    /// A failed clear is logged; the new state is saved regardless and
    /// supersedes whatever was stored.
    pub async fn reset_with<F>(&mut self, sample: F)
    where
        F: FnOnce() -> SampleData,
    {
        if let Err(err) = self.gateway.clear().await {
            warn!(
                "event=store_reset module=store status=degraded error_code={} {}",
                err.kind().as_str(),
                err.log_detail()
            );
        }
        self.adopt(sample().into_snapshot());
        self.origin = StoreOrigin::Sample;
        self.commit(StoreChange::Reset);
    }

    /// Waits until the newest scheduled snapshot has been written or failed.
    pub async fn flush(&self) {
        self.writer.flush().await;
    }

    /// Flushes pending saves and stops the writer task.
    pub async fn shutdown(self) {
        self.writer.shutdown().await;
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn adopt(&mut self, snapshot: Snapshot) {
        self.boards = snapshot.boards;
        self.lists = snapshot.lists;
        self.tasks = snapshot.tasks;
        self.active_board_id = snapshot.active_board_id;
        self.recompute();
    }

    fn recompute(&mut self) {
        self.derived = DerivedState::compute(
            &self.boards,
            &self.lists,
            &self.tasks,
            self.active_board_id,
            &self.search_query,
        );
    }

    fn schedule_save(&mut self) -> u64 {
        let snapshot = self.snapshot();
        self.writer.schedule(snapshot)
    }

    /// Post-mutation hook: derived state, then save, then listeners.
    fn commit(&mut self, change: StoreChange) {
        self.recompute();
        self.revision += 1;

        if change.is_persisted() {
            let generation = self.schedule_save();
            debug!(
                "event=store_mutation module=store status=ok revision={} save_generation={}",
                self.revision, generation
            );
        } else {
            debug!(
                "event=store_mutation module=store status=ok revision={} save_generation=none",
                self.revision
            );
        }

        let event = StoreEvent {
            revision: self.revision,
            change,
        };
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }
}

fn next_position(positions: impl Iterator<Item = i64>) -> i64 {
    positions.max().map_or(0, |max| max.saturating_add(1))
}
