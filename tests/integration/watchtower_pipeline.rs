//! End-to-end: HTTP download, normalization, storage and change detection

use pretty_assertions::assert_eq;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::fixtures;
use crate::common::logging::{init_test_logging, log_test_data, log_test_step};
use crate::common::test_data::date;
use etf_watchtower::config::{Config, EtfSource};
use etf_watchtower::database::DatabaseManager;
use etf_watchtower::export::{write_change_sets, OutputFormat};
use etf_watchtower::fetchers::HttpHoldingsFetcher;
use etf_watchtower::models::{ChangeAction, FetchOutcome, Provider};
use etf_watchtower::watchtower::{ChangeService, JobConfig, WatchtowerJob};

fn test_config() -> Config {
    Config {
        requests_per_minute: 600,
        http_timeout_secs: 5,
        retry_attempts: 1,
        ..Config::default()
    }
}

async fn serve(server: &MockServer, route: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

fn job(config: &Config, db: DatabaseManager) -> WatchtowerJob {
    let fetcher = HttpHoldingsFetcher::new(config).expect("Failed to build fetcher");
    WatchtowerJob::new(Arc::new(fetcher), db, JobConfig::from(config))
}

#[tokio::test]
async fn test_two_days_of_downloads_produce_changes() {
    init_test_logging();
    log_test_step("Day 1 download");

    let server = MockServer::start().await;
    let config = test_config();
    let db = DatabaseManager::in_memory().await.unwrap();
    let job = job(&config, db.clone());

    let sources = vec![
        EtfSource::new("ARKK", Provider::Ark, &format!("{}/arkk.csv", server.uri())),
        EtfSource::new("SPY", Provider::Spdr, &format!("{}/spy.xlsx", server.uri())),
        EtfSource::new("ARKW", Provider::Ark, &format!("{}/arkw.csv", server.uri())),
    ];

    serve(
        &server,
        "/arkk.csv",
        fixtures::ark_csv(13, &[("TSLA", "TESLA INC", "1,000"), ("ROKU", "ROKU INC", "500"), ("PATH", "UIPATH INC", "300")])
            .into_bytes(),
    )
    .await;
    serve(
        &server,
        "/spy.xlsx",
        fixtures::spdr_workbook("13-Oct-2026", &[("NVIDIA CORP", "NVDA", 100.0), ("APPLE INC", "AAPL", 90.0)]),
    )
    .await;
    // ARKW is unmounted: the mock server answers 404

    let report = job.run(&sources, date(2026, 10, 13)).await.unwrap();
    log_test_data("Day 1 report", &report);
    assert_eq!(report.stored.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "ARKW");
    assert!(report.failures[0].1.contains("404"));

    log_test_step("Day 2 download");
    server.reset().await;
    serve(
        &server,
        "/arkk.csv",
        fixtures::ark_csv(14, &[("TSLA", "TESLA INC", "1,100"), ("ROKU", "ROKU INC", "500"), ("HOOD", "ROBINHOOD MARKETS INC", "250")])
            .into_bytes(),
    )
    .await;
    // SPY publishes late: still serving the 13th

    serve(
        &server,
        "/spy.xlsx",
        fixtures::spdr_workbook("13-Oct-2026", &[("NVIDIA CORP", "NVDA", 100.0), ("APPLE INC", "AAPL", 90.0)]),
    )
    .await;

    let report = job.run(&sources, date(2026, 10, 14)).await.unwrap();
    assert_eq!(report.stored.len(), 2);

    log_test_step("Changes as of the 14th");
    let service = ChangeService::new(db.clone());
    let sets = service.changes_for_all(date(2026, 10, 14)).await.unwrap();

    // SPY has a single snapshot (the 13th, stored twice), so only ARKK reports
    assert_eq!(sets.len(), 1);
    let arkk = &sets[0];
    assert_eq!(arkk.etf_ticker, "ARKK");
    assert_eq!((arkk.prev_date, arkk.curr_date), (date(2026, 10, 13), date(2026, 10, 14)));

    let summary: Vec<(&str, ChangeAction, f64)> = arkk
        .changes
        .iter()
        .map(|c| (c.holding_ticker.as_str(), c.action, c.share_delta))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("PATH", ChangeAction::Sell, -300.0),
            ("HOOD", ChangeAction::Buy, 250.0),
            ("TSLA", ChangeAction::Buy, 100.0),
        ]
    );

    assert_eq!(db.list_snapshot_dates("SPY").await.unwrap(), vec![date(2026, 10, 13)]);
    assert_eq!(db.snapshot_row_count("SPY", date(2026, 10, 13)).await.unwrap(), 2);

    let runs = db.recent_fetch_runs(20).await.unwrap();
    assert_eq!(runs.len(), 6);
    assert_eq!(runs.iter().filter(|r| r.outcome == FetchOutcome::Failed).count(), 2);

    let mut csv = Vec::new();
    write_change_sets(&sets, OutputFormat::Csv, &mut csv).unwrap();
    assert_eq!(String::from_utf8(csv).unwrap().lines().count(), 4);
}

#[tokio::test]
async fn test_server_error_is_recorded_not_fatal() {
    init_test_logging();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/arkk.csv"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = test_config();
    let db = DatabaseManager::in_memory().await.unwrap();
    let job = job(&config, db.clone());
    let sources = vec![EtfSource::new("ARKK", Provider::Ark, &format!("{}/arkk.csv", server.uri()))];

    let report = job.run(&sources, date(2026, 10, 14)).await.unwrap();
    assert!(report.stored.is_empty());
    assert!(report.failures[0].1.contains("503"));

    let runs = db.recent_fetch_runs(5).await.unwrap();
    assert_eq!(runs[0].outcome, FetchOutcome::Failed);
    assert!(runs[0].error.as_deref().unwrap_or("").contains("503"));
    assert!(db.list_etfs().await.unwrap().is_empty());
}
