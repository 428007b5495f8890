//! Database integration tests against an on-disk SQLite file

use pretty_assertions::assert_eq;

use crate::common::logging::{init_test_logging, log_test_data, log_test_step};
use crate::common::test_data::{date, snapshot};
use crate::common::init_fresh_test_database;
use etf_watchtower::database::DatabaseManager;
use etf_watchtower::models::Provider;

#[tokio::test]
async fn test_snapshot_history_workflow() {
    init_test_logging();
    log_test_step("Storing a month of staggered snapshots");

    let test_db = init_fresh_test_database().await.expect("Failed to create test database");
    let db = &test_db.db;

    // ARKK every weekday, IVV only on Fridays
    let mut stored = 0;
    for day in 1..=30u32 {
        let d = date(2026, 9, day);
        let weekday = chrono::Datelike::weekday(&d).number_from_monday();
        if weekday > 5 {
            continue;
        }
        db.upsert_snapshot(&snapshot("ARKK", d, &[("TSLA", 1000.0 + day as f64), ("ROKU", 500.0)]), Provider::Ark)
            .await
            .unwrap();
        stored += 1;
        if weekday == 5 {
            db.upsert_snapshot(&snapshot("IVV", d, &[("AAPL", 200_000.0)]), Provider::IShares)
                .await
                .unwrap();
        }
    }
    log_test_data("ARKK snapshots stored", &stored);

    let stats = db.get_stats().await.unwrap();
    assert_eq!(stats.total_etfs, 2);
    assert_eq!(stats.oldest_snapshot_date, Some(date(2026, 9, 1)));
    assert_eq!(stats.newest_snapshot_date, Some(date(2026, 9, 30)));

    // Wednesday 2026-09-23: ARKK has that day, IVV only has the previous Friday
    let resolved = db.resolve_as_of_dates(date(2026, 9, 23)).await.unwrap();
    assert_eq!(
        resolved,
        vec![
            ("ARKK".to_string(), date(2026, 9, 23)),
            ("IVV".to_string(), date(2026, 9, 18)),
        ]
    );

    // Weekend target resolves to Friday
    assert_eq!(
        db.resolve_as_of_date("ARKK", date(2026, 9, 27)).await.unwrap(),
        Some(date(2026, 9, 25))
    );

    let dates = db.list_snapshot_dates("ARKK").await.unwrap();
    assert_eq!(dates.len(), stored);
    assert_eq!(dates.first(), Some(&date(2026, 9, 30)));
}

#[tokio::test]
async fn test_reingest_is_idempotent_across_reopen() {
    init_test_logging();
    log_test_step("Re-ingesting the same snapshot after reopening the database");

    let test_db = init_fresh_test_database().await.unwrap();
    let day = date(2026, 10, 14);
    let snap = snapshot("ARKK", day, &[("TSLA", 100.0), ("ROKU", 50.0), ("COIN", 25.0)]);

    test_db.db.upsert_snapshot(&snap, Provider::Ark).await.unwrap();
    test_db.db.clone().close().await;

    let reopened = DatabaseManager::new(&test_db.path).await.unwrap();
    reopened.upsert_snapshot(&snap, Provider::Ark).await.unwrap();
    reopened.upsert_snapshot(&snap, Provider::Ark).await.unwrap();

    assert_eq!(reopened.snapshot_row_count("ARKK", day).await.unwrap(), 3);
    let loaded = reopened.load_snapshot("ARKK", day).await.unwrap().unwrap();
    assert_eq!(loaded.total_shares(), 175.0);
}

#[tokio::test]
async fn test_prune_keeps_recent_history() {
    init_test_logging();

    let test_db = init_fresh_test_database().await.unwrap();
    let db = &test_db.db;
    for day in [10, 11, 14, 15] {
        db.upsert_snapshot(&snapshot("ARKK", date(2026, 10, day), &[("TSLA", 1.0), ("ROKU", 2.0)]), Provider::Ark)
            .await
            .unwrap();
        db.upsert_snapshot(&snapshot("ARKW", date(2026, 10, day), &[("COIN", 3.0)]), Provider::Ark)
            .await
            .unwrap();
    }

    let removed = db.prune_snapshots_before(Some("ARKK"), date(2026, 10, 14)).await.unwrap();
    assert_eq!(removed, 4);
    assert_eq!(
        db.list_snapshot_dates("ARKK").await.unwrap(),
        vec![date(2026, 10, 15), date(2026, 10, 14)]
    );
    assert_eq!(db.list_snapshot_dates("ARKW").await.unwrap().len(), 4);
}
