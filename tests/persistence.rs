//! Read/write policy of the persistence service against a fake remote.

mod common;

use campus_store::{RecordKey, Source, ANNUAL_RECORDS, FEES, STUDENTS, USERS};
use common::{harness, rec};
use serde_json::json;
use std::time::Duration;

// --- Read path ---

#[tokio::test]
async fn test_unreachable_remote_serves_local() {
    let h = harness();
    h.remote.set_offline(true);
    h.service
        .put_all(STUDENTS, &[rec(json!({"id": "1", "name": "Amit"}))])
        .await
        .unwrap();

    let all = h.service.get_all(STUDENTS).await;

    assert_eq!(all, vec![rec(json!({"id": "1", "name": "Amit"}))]);
    assert_eq!(all, h.service.get_local(STUDENTS).unwrap());
    assert_eq!(h.stats.local_fallbacks(), 1);
}

#[tokio::test]
async fn test_remote_read_converges_local() {
    let h = harness();
    h.service
        .put_all(STUDENTS, &[rec(json!({"id": "1", "name": "Amit"}))])
        .await
        .unwrap();
    h.remote
        .seed(STUDENTS, "id", vec![rec(json!({"id": "2", "name": "Priya"}))]);

    let fetched = h.service.fetch(STUDENTS).await;

    let expected = vec![rec(json!({"id": "2", "name": "Priya"}))];
    assert_eq!(fetched.source, Source::Remote);
    assert_eq!(fetched.records, expected);
    assert_eq!(h.service.get_local(STUDENTS).unwrap(), expected);
}

#[tokio::test]
async fn test_empty_remote_result_is_authoritative() {
    let h = harness();
    h.remote.set_offline(true);
    h.service
        .put(FEES, &rec(json!({"id": "f1", "amount": 100})))
        .await
        .unwrap();
    h.remote.set_offline(false);

    // Remote has no fees table at all.
    assert!(h.service.get_all(FEES).await.is_empty());
    assert!(h.service.get_local(FEES).unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_slow_remote_read_times_out_to_local() {
    let h = harness();
    h.service
        .put(STUDENTS, &rec(json!({"id": "1", "name": "Amit"})))
        .await
        .unwrap();
    h.remote
        .seed(STUDENTS, "id", vec![rec(json!({"id": "2", "name": "Priya"}))]);
    h.remote.set_fetch_delay(Duration::from_secs(30));

    let fetched = h.service.fetch(STUDENTS).await;

    assert_eq!(fetched.source, Source::Local);
    assert_eq!(fetched.records, vec![rec(json!({"id": "1", "name": "Amit"}))]);
    assert_eq!(h.stats.remote_failures(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_read_overtaken_by_local_write_is_discarded() {
    let h = harness();
    h.remote
        .seed(STUDENTS, "id", vec![rec(json!({"id": "1", "name": "Amit"}))]);
    h.remote.set_fetch_delay(Duration::from_secs(2));

    let service = h.service.clone();
    let read = tokio::spawn(async move { service.fetch(STUDENTS).await });
    while h.remote.fetches() == 0 {
        tokio::task::yield_now().await;
    }

    let priya = rec(json!({"id": "2", "name": "Priya"}));
    h.service.put(STUDENTS, &priya).await.unwrap();

    let fetched = read.await.unwrap();
    assert_eq!(fetched.source, Source::LocalNewer);
    assert_eq!(fetched.records, vec![priya.clone()]);
    assert_eq!(h.service.get_local(STUDENTS).unwrap(), vec![priya]);
    assert_eq!(h.stats.stale_reads(), 1);
}

// --- Write paths ---

#[tokio::test]
async fn test_put_survives_remote_failure() {
    let h = harness();
    h.remote.set_offline(true);

    h.service
        .put(FEES, &rec(json!({"id": "f1", "amount": 100})))
        .await
        .unwrap();

    assert_eq!(h.service.get_local(FEES).unwrap().len(), 1);
    assert!(h.remote.rows(FEES).is_empty());
    assert_eq!(h.stats.remote_failures(), 1);
}

#[tokio::test]
async fn test_sequential_puts_last_writer_wins() {
    let h = harness();

    h.service
        .put(FEES, &rec(json!({"id": "f1", "amount": 100})))
        .await
        .unwrap();
    h.service
        .put(FEES, &rec(json!({"id": "f1", "amount": 250})))
        .await
        .unwrap();

    let expected = vec![rec(json!({"id": "f1", "amount": 250}))];
    assert_eq!(h.service.get_local(FEES).unwrap(), expected);
    assert_eq!(h.remote.rows(FEES), expected);
}

#[tokio::test]
async fn test_empty_bulk_save_leaves_remote_untouched() {
    let h = harness();
    h.remote.seed(
        STUDENTS,
        "id",
        vec![rec(json!({"id": "1"})), rec(json!({"id": "2"}))],
    );
    h.service
        .put_all(STUDENTS, &[rec(json!({"id": "1"}))])
        .await
        .unwrap();
    let calls_before = h.remote.calls().len();

    h.service.put_all(STUDENTS, &[]).await.unwrap();

    assert!(h.service.get_local(STUDENTS).unwrap().is_empty());
    assert_eq!(h.remote.calls().len(), calls_before);
    assert_eq!(h.remote.count("delete_all:students"), 0);
    assert_eq!(h.remote.rows(STUDENTS).len(), 2);
}

#[tokio::test]
async fn test_bulk_save_upserts_without_deleting_remote_extras() {
    let h = harness();
    h.remote.seed(USERS, "id", vec![rec(json!({"id": "old"}))]);

    h.service
        .put_all(USERS, &[rec(json!({"id": "new"}))])
        .await
        .unwrap();

    assert_eq!(h.service.get_local(USERS).unwrap(), vec![rec(json!({"id": "new"}))]);
    assert_eq!(h.remote.rows(USERS).len(), 2);
}

#[tokio::test]
async fn test_annual_records_route_by_student_id() {
    let h = harness();
    let row = rec(json!({"studentId": "s1", "attendance": 180}));

    h.service.put(ANNUAL_RECORDS, &row).await.unwrap();

    assert_eq!(h.service.get_local(ANNUAL_RECORDS).unwrap(), vec![row.clone()]);
    assert_eq!(h.remote.rows("annual_records"), vec![row]);
    assert_eq!(h.remote.count("upsert:annual_records"), 1);
    assert_eq!(h.stats.remote_failures(), 0);
}

#[tokio::test]
async fn test_delete_both_tiers() {
    let h = harness();
    h.service
        .put_all(FEES, &[rec(json!({"id": "a"})), rec(json!({"id": "b"}))])
        .await
        .unwrap();

    h.service.delete(FEES, &RecordKey::from("a")).await.unwrap();

    assert_eq!(h.service.get_local(FEES).unwrap(), vec![rec(json!({"id": "b"}))]);
    assert_eq!(h.remote.rows(FEES), vec![rec(json!({"id": "b"}))]);
}

#[tokio::test]
async fn test_failed_remote_delete_lets_record_reappear() {
    let h = harness();
    h.service.put(FEES, &rec(json!({"id": "a"}))).await.unwrap();

    h.remote.set_offline(true);
    h.service.delete(FEES, &RecordKey::from("a")).await.unwrap();
    assert!(h.service.get_local(FEES).unwrap().is_empty());

    h.remote.set_offline(false);
    assert_eq!(h.service.get_all(FEES).await, vec![rec(json!({"id": "a"}))]);
}

#[tokio::test]
async fn test_clear_both_tiers() {
    let h = harness();
    h.service
        .put_all(STUDENTS, &[rec(json!({"id": "1"})), rec(json!({"id": "2"}))])
        .await
        .unwrap();

    h.service.clear(STUDENTS).await.unwrap();

    assert!(h.service.get_local(STUDENTS).unwrap().is_empty());
    assert!(h.remote.rows(STUDENTS).is_empty());
    assert_eq!(h.remote.count("delete_all:students"), 1);
}

#[tokio::test]
async fn test_clear_offline_still_clears_local() {
    let h = harness();
    h.service.put(STUDENTS, &rec(json!({"id": "1"}))).await.unwrap();
    h.remote.set_offline(true);

    h.service.clear(STUDENTS).await.unwrap();

    assert!(h.service.get_local(STUDENTS).unwrap().is_empty());
    assert_eq!(h.remote.rows(STUDENTS).len(), 1);
}
