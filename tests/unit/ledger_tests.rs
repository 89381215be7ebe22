use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use helpdesk_bridge::models::thread::ChatThreadRef;
use helpdesk_bridge::persistence::db;
use helpdesk_bridge::persistence::ledger::{DedupLedger, LedgerNamespace};
use helpdesk_bridge::persistence::thread_repo::ThreadRepo;
use helpdesk_bridge::AppError;

async fn ledger() -> DedupLedger {
    let pool = db::connect_memory().await.expect("db connect");
    DedupLedger::new(Arc::new(pool))
}

#[tokio::test]
async fn in_memory_connect_creates_tables() {
    let pool = db::connect_memory().await.expect("db connect");
    for table in ["ledger_flag", "watermark", "chat_thread", "sla_state"] {
        let query = format!("SELECT COUNT(*) FROM {table}");
        let row: (i64,) = sqlx::query_as(&query)
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("table '{table}' should be queryable: {e}"));
        assert_eq!(row.0, 0, "table '{table}' should start empty");
    }
}

#[tokio::test]
async fn mark_then_has() {
    let ledger = ledger().await;

    assert!(!ledger
        .has(LedgerNamespace::ProcessedEmail, "INBOX-1")
        .await
        .expect("has"));
    ledger
        .mark(LedgerNamespace::ProcessedEmail, "INBOX-1")
        .await
        .expect("mark");
    assert!(ledger
        .has(LedgerNamespace::ProcessedEmail, "INBOX-1")
        .await
        .expect("has"));
}

#[tokio::test]
async fn mark_is_idempotent() {
    let ledger = ledger().await;
    for _ in 0..3 {
        ledger
            .mark(LedgerNamespace::SentComment, "77")
            .await
            .expect("mark");
    }
    assert!(ledger
        .has(LedgerNamespace::SentComment, "77")
        .await
        .expect("has"));
}

#[tokio::test]
async fn namespaces_are_independent() {
    let ledger = ledger().await;
    ledger
        .mark(LedgerNamespace::ClosedNotified, "5")
        .await
        .expect("mark");

    assert!(!ledger
        .has(LedgerNamespace::ReopenedNotified, "5")
        .await
        .expect("has"));
    assert!(!ledger
        .has(LedgerNamespace::SentComment, "5")
        .await
        .expect("has"));
}

#[tokio::test]
async fn lifecycle_flags_clear() {
    let ledger = ledger().await;
    ledger
        .mark(LedgerNamespace::ReopenedNotified, "9")
        .await
        .expect("mark");
    ledger
        .clear(LedgerNamespace::ReopenedNotified, "9")
        .await
        .expect("clear");
    assert!(!ledger
        .has(LedgerNamespace::ReopenedNotified, "9")
        .await
        .expect("has"));

    ledger
        .clear(LedgerNamespace::ClosedNotified, "absent")
        .await
        .expect("clearing an absent key is a no-op");
}

#[tokio::test]
async fn dedup_namespaces_refuse_clear() {
    let ledger = ledger().await;
    ledger
        .mark(LedgerNamespace::ProcessedEmail, "INBOX-3")
        .await
        .expect("mark");

    let err = ledger
        .clear(LedgerNamespace::ProcessedEmail, "INBOX-3")
        .await
        .expect_err("processed flags are permanent");
    assert!(matches!(err, AppError::Config(_)));
    assert!(ledger
        .has(LedgerNamespace::ProcessedEmail, "INBOX-3")
        .await
        .expect("has"));

    assert!(ledger
        .clear(LedgerNamespace::SentComment, "1")
        .await
        .is_err());
}

#[tokio::test]
async fn watermark_starts_empty_and_only_moves_forward() {
    let ledger = ledger().await;
    assert_eq!(ledger.watermark().await.expect("watermark"), None);

    let t1 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    ledger.advance_watermark(t1).await.expect("advance");
    assert_eq!(ledger.watermark().await.expect("watermark"), Some(t1));

    ledger
        .advance_watermark(t1 - Duration::hours(1))
        .await
        .expect("advance");
    assert_eq!(ledger.watermark().await.expect("watermark"), Some(t1));

    let t2 = t1 + Duration::milliseconds(250);
    ledger.advance_watermark(t2).await.expect("advance");
    assert_eq!(ledger.watermark().await.expect("watermark"), Some(t2));
}

#[tokio::test]
async fn file_ledger_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state").join("ledger.db");
    let mark_time = Utc.with_ymd_and_hms(2024, 5, 2, 8, 30, 0).unwrap();

    {
        let pool = db::connect(&path).await.expect("open ledger");
        let ledger = DedupLedger::new(Arc::new(pool.clone()));
        ledger
            .mark(LedgerNamespace::ProcessedEmail, "INBOX-11")
            .await
            .expect("mark");
        ledger.advance_watermark(mark_time).await.expect("advance");
        ThreadRepo::new(Arc::new(pool.clone()))
            .store(11, &ChatThreadRef::new("C1", "1700000000.000100"))
            .await
            .expect("store thread");
        pool.close().await;
    }

    let pool = Arc::new(db::connect(&path).await.expect("reopen ledger"));
    let ledger = DedupLedger::new(Arc::clone(&pool));
    assert!(ledger
        .has(LedgerNamespace::ProcessedEmail, "INBOX-11")
        .await
        .expect("has"));
    assert_eq!(ledger.watermark().await.expect("watermark"), Some(mark_time));
    assert_eq!(
        ThreadRepo::new(pool).get(11).await.expect("get thread"),
        Some(ChatThreadRef::new("C1", "1700000000.000100"))
    );
}

#[tokio::test]
async fn thread_reference_is_write_once() {
    let pool = Arc::new(db::connect_memory().await.expect("db connect"));
    let threads = ThreadRepo::new(pool);

    assert_eq!(threads.get(4).await.expect("get"), None);
    threads
        .store(4, &ChatThreadRef::new("C1", "111.1"))
        .await
        .expect("store");
    threads
        .store(4, &ChatThreadRef::new("C2", "222.2"))
        .await
        .expect("store again");
    assert_eq!(
        threads.get(4).await.expect("get"),
        Some(ChatThreadRef::new("C1", "111.1"))
    );
}
