use serde_json::json;
use tempfile::TempDir;

use offlineq::{
    persist::sqlite::SqliteQueueSink,
    types::{MutationStatus, OperationType},
};

#[test]
fn sqlite_reload_round_trips_records_and_order() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("queue.db");

    let mut store = SqliteQueueSink::open(&db_path)
        .expect("open sqlite")
        .load_store()
        .expect("load");
    assert!(store.is_durable());

    let a = store
        .enqueue(OperationType::CreateTask, json!({"title": "A"}), Some("tmp-a".into()))
        .expect("enqueue a");
    let b = store
        .enqueue(OperationType::UpdateTask, json!({"id": 7, "done": true}), None)
        .expect("enqueue b");
    let c = store
        .enqueue(OperationType::DeleteEvent, json!({"id": "ev-3"}), None)
        .expect("enqueue c");

    store
        .set_status(&b, MutationStatus::Failed, Some("API error: 503 Service Unavailable".into()))
        .expect("fail b");
    assert!(store.remove(&c).expect("remove c"));

    let before = store.list_all_cloned();
    drop(store);

    let reopened = SqliteQueueSink::open(&db_path)
        .expect("reopen")
        .load_store()
        .expect("reload");

    assert_eq!(reopened.list_all_cloned(), before);
    assert_eq!(reopened.stats().pending, 1);
    assert_eq!(reopened.stats().failed, 1);
    assert!(reopened.get(&c).is_none());

    let failed = reopened.get(&b).expect("b");
    assert_eq!(failed.retry_count, 1);
    assert_eq!(
        failed.last_error.as_deref(),
        Some("API error: 503 Service Unavailable")
    );
    assert_eq!(
        reopened.get(&a).and_then(|r| r.correlation_id.clone()).as_deref(),
        Some("tmp-a")
    );
}

#[test]
fn new_ids_after_reload_keep_fifo_order() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("fifo.db");

    let mut store = SqliteQueueSink::open(&db_path)
        .expect("open")
        .load_store()
        .expect("load");
    let first = store
        .enqueue(OperationType::LogMood, json!({"rating": 1}), None)
        .expect("enqueue");
    drop(store);

    let mut store = SqliteQueueSink::open(&db_path)
        .expect("reopen")
        .load_store()
        .expect("reload");
    let second = store
        .enqueue(OperationType::LogMood, json!({"rating": 2}), None)
        .expect("enqueue");

    let order: Vec<_> = store
        .list_by_status(MutationStatus::Pending)
        .into_iter()
        .map(|r| r.id.clone())
        .collect();
    assert_eq!(order, vec![first, second]);
}

#[test]
fn clear_and_import_reach_disk() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("diag.db");

    let mut store = SqliteQueueSink::open(&db_path)
        .expect("open")
        .load_store()
        .expect("load");
    for i in 0..5 {
        store
            .enqueue(OperationType::CreateGoal, json!({"n": i}), None)
            .expect("enqueue");
    }
    let exported = store.list_all_cloned();
    assert_eq!(store.clear().expect("clear"), 5);
    drop(store);

    let sink = SqliteQueueSink::open(&db_path).expect("reopen");
    assert_eq!(sink.row_count().expect("count"), 0);

    let mut store = sink.load_store().expect("reload");
    assert_eq!(store.import(exported.clone()).expect("import"), 5);
    drop(store);

    let sink = SqliteQueueSink::open(&db_path).expect("reopen");
    let ids: Vec<_> = sink
        .load_records()
        .expect("records")
        .into_iter()
        .map(|r| r.id)
        .collect();
    let expected: Vec<_> = exported.into_iter().map(|r| r.id).collect();
    assert_eq!(ids, expected);
}

#[test]
fn in_memory_sink_accepts_writes() {
    let mut store = SqliteQueueSink::open_in_memory()
        .expect("open")
        .load_store()
        .expect("load");
    let id = store
        .enqueue(OperationType::LogActivity, json!({"kind": "walk"}), None)
        .expect("enqueue");
    assert!(store.remove(&id).expect("remove"));
}
