use chrono::{Duration, TimeZone, Utc};
use rusqlite::Connection;
use serde_json::json;
use taskboard_core::db::open_db;
use taskboard_core::{
    Board, BoardList, DbLocation, NewBoard, NewList, NewTask, PersistenceGateway, Snapshot,
    SnapshotRepository, SqliteSnapshotRepository, StorageErrorKind, Task, TaskPriority,
};

const KEY: &str = "taskboard-state";

fn sample_snapshot() -> Snapshot {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap() + Duration::milliseconds(250);
    let board = Board::create(NewBoard::titled("Launch"), now);
    let list = BoardList::create(NewList::new(board.id, "Backlog"), 0, now);
    let with_due = Task::create(
        NewTask {
            priority: TaskPriority::High,
            due_date: Some(now + Duration::days(3)),
            ..NewTask::new(board.id, list.id, "Ship it").with_tags(["urgent"])
        },
        0,
        now,
    );
    let without_due = Task::create(NewTask::new(board.id, list.id, "Tidy up"), 1, now);

    Snapshot {
        active_board_id: Some(board.id),
        boards: vec![board],
        lists: vec![list],
        tasks: vec![with_due, without_due],
    }
}

#[tokio::test]
async fn load_on_fresh_store_returns_none() {
    let gateway = PersistenceGateway::new(DbLocation::Memory, KEY).unwrap();
    assert!(gateway.load().await.unwrap().is_none());
}

#[tokio::test]
async fn save_then_load_roundtrips_with_real_instants() {
    let gateway = PersistenceGateway::new(DbLocation::Memory, KEY).unwrap();
    let snapshot = sample_snapshot();

    gateway.save(&snapshot).await.unwrap();
    let loaded = gateway.load().await.unwrap().unwrap();

    assert_eq!(loaded, snapshot);
    assert!(loaded.tasks[0].due_date.is_some());
    assert!(loaded.tasks[1].due_date.is_none());
}

#[tokio::test]
async fn save_replaces_previous_snapshot() {
    let gateway = PersistenceGateway::new(DbLocation::Memory, KEY).unwrap();
    let first = sample_snapshot();
    let second = sample_snapshot();

    gateway.save(&first).await.unwrap();
    gateway.save(&second).await.unwrap();

    assert_eq!(gateway.load().await.unwrap().unwrap(), second);
}

#[tokio::test]
async fn snapshot_survives_reopening_the_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.sqlite3");
    let snapshot = sample_snapshot();

    PersistenceGateway::new(DbLocation::File(path.clone()), KEY)
        .unwrap()
        .save(&snapshot)
        .await
        .unwrap();

    let reopened = PersistenceGateway::new(DbLocation::File(path), KEY).unwrap();
    assert_eq!(reopened.load().await.unwrap().unwrap(), snapshot);
}

#[tokio::test]
async fn clear_is_idempotent() {
    let gateway = PersistenceGateway::new(DbLocation::Memory, KEY).unwrap();

    gateway.clear().await.unwrap();
    gateway.save(&sample_snapshot()).await.unwrap();
    gateway.clear().await.unwrap();
    gateway.clear().await.unwrap();

    assert!(gateway.load().await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_calls_before_initialization_share_one_open() {
    let dir = tempfile::tempdir().unwrap();
    let gateway =
        PersistenceGateway::new(DbLocation::File(dir.path().join("race.sqlite3")), KEY).unwrap();
    let snapshot = sample_snapshot();

    let (init, saved, loaded) =
        tokio::join!(gateway.initialize(), gateway.save(&snapshot), gateway.load());

    init.unwrap();
    saved.unwrap();
    loaded.unwrap();
    assert!(gateway.is_initialized());
    assert_eq!(gateway.load().await.unwrap().unwrap(), snapshot);
}

#[tokio::test]
async fn epoch_millis_instants_are_rehydrated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.sqlite3");
    let payload = json!({
        "boards": [{
            "id": "0b6b3a5e-5f0a-4c5e-9d43-7f7f0d7f2a11",
            "title": "Legacy",
            "createdAt": 1_717_243_200_000_i64,
            "updatedAt": 1_717_243_260_000_i64
        }],
        "lists": [{
            "id": "1c7c4b6f-6a1b-4d6f-8e54-8a8a1e8a3b22",
            "boardId": "0b6b3a5e-5f0a-4c5e-9d43-7f7f0d7f2a11",
            "title": "Todo",
            "position": 0,
            "createdAt": "2024-06-01T12:00:00Z",
            "updatedAt": "2024-06-01T12:00:00Z"
        }],
        "tasks": [{
            "id": "2d8d5c70-7b2c-4e70-9f65-9b9b2f9b4c33",
            "listId": "1c7c4b6f-6a1b-4d6f-8e54-8a8a1e8a3b22",
            "boardId": "0b6b3a5e-5f0a-4c5e-9d43-7f7f0d7f2a11",
            "title": "Migrate",
            "tags": ["ops"],
            "dueDate": "2024-06-03T09:00:00+02:00",
            "position": 0,
            "createdAt": 1_717_243_200_000_i64,
            "updatedAt": "2024-06-01T12:00:00.000Z"
        }],
        "activeBoardId": "0b6b3a5e-5f0a-4c5e-9d43-7f7f0d7f2a11"
    })
    .to_string();
    {
        let conn = open_db(&path).unwrap();
        SqliteSnapshotRepository::new(&conn)
            .put_payload(KEY, &payload)
            .unwrap();
    }

    let gateway = PersistenceGateway::new(DbLocation::File(path), KEY).unwrap();
    let loaded = gateway.load().await.unwrap().unwrap();

    let board = &loaded.boards[0];
    assert_eq!(board.created_at, Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
    assert_eq!(board.updated_at - board.created_at, Duration::minutes(1));
    let task = &loaded.tasks[0];
    assert_eq!(task.due_date, Some(Utc.with_ymd_and_hms(2024, 6, 3, 7, 0, 0).unwrap()));
    assert_eq!(task.created_at, task.updated_at);
    assert_eq!(task.priority, TaskPriority::Medium);
    assert!(task.description.is_empty());
}

#[tokio::test]
async fn corrupt_record_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.sqlite3");
    {
        let conn = open_db(&path).unwrap();
        SqliteSnapshotRepository::new(&conn)
            .put_payload(KEY, "{\"boards\": \"nope\"}")
            .unwrap();
    }

    let gateway = PersistenceGateway::new(DbLocation::File(path), KEY).unwrap();
    let err = gateway.load().await.unwrap_err();
    assert_eq!(err.kind(), StorageErrorKind::Read);
}

#[tokio::test]
async fn unopenable_location_is_unavailable_and_retried_later() {
    let blocker = tempfile::NamedTempFile::new().unwrap();
    let path = blocker.path().join("nested").join("state.sqlite3");
    let gateway = PersistenceGateway::new(DbLocation::File(path), KEY).unwrap();

    let err = gateway.initialize().await.unwrap_err();
    assert_eq!(err.kind(), StorageErrorKind::Unavailable);
    assert!(!gateway.is_initialized());

    let err = gateway.save(&sample_snapshot()).await.unwrap_err();
    assert_eq!(err.kind(), StorageErrorKind::Unavailable);
}

#[tokio::test]
async fn newer_schema_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let gateway = PersistenceGateway::new(DbLocation::File(path), KEY).unwrap();
    let err = gateway.load().await.unwrap_err();
    assert_eq!(err.kind(), StorageErrorKind::Unavailable);
}

#[tokio::test]
async fn unwritable_snapshot_leaves_previous_record_in_place() {
    let gateway = PersistenceGateway::new(DbLocation::Memory, KEY).unwrap();
    let good = sample_snapshot();
    gateway.save(&good).await.unwrap();

    let mut far_future = good.clone();
    far_future.tasks[1].due_date = Some(Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap());
    let err = gateway.save(&far_future).await.unwrap_err();
    assert_eq!(err.kind(), StorageErrorKind::Write);

    let mut duplicated = good.clone();
    duplicated.lists.push(good.lists[0].clone());
    let err = gateway.save(&duplicated).await.unwrap_err();
    assert_eq!(err.kind(), StorageErrorKind::Write);

    assert_eq!(gateway.load().await.unwrap().unwrap(), good);
}
