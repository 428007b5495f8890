//! Watchtower job: fetch every configured ETF, normalize and store snapshots
//!
//! ETFs are processed concurrently with a bounded number of in-flight
//! fetches. A failing ETF is logged and recorded in the run log; the rest of
//! the run continues.

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::{Config, EtfSource};
use crate::database::DatabaseManager;
use crate::fetchers::{HoldingsFetcher, RawHoldingsFile};
use crate::models::{FetchOutcome, FetchRun, HoldingsSnapshot, Provider};
use crate::parsers::{parse_holdings, DateSource};

pub const LAST_RUN_KEY: &str = "last_watchtower_run";

/// Tuning for a job run
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub concurrency: usize,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl From<&Config> for JobConfig {
    fn from(config: &Config) -> Self {
        Self {
            concurrency: config.fetch_concurrency,
            retry_attempts: config.retry_attempts,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// A snapshot that made it into the database
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSnapshot {
    pub etf_ticker: String,
    pub as_of_date: NaiveDate,
    pub date_source: DateSource,
    pub rows_stored: i64,
    pub skipped_rows: usize,
}

/// Result of one job run
#[derive(Debug, Default)]
pub struct JobReport {
    pub total_sources: usize,
    pub stored: Vec<StoredSnapshot>,
    pub failures: Vec<(String, String)>,
}

impl JobReport {
    pub fn rows_stored(&self) -> i64 {
        self.stored.iter().map(|s| s.rows_stored).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct WatchtowerJob {
    fetcher: Arc<dyn HoldingsFetcher>,
    database: DatabaseManager,
    config: JobConfig,
}

impl WatchtowerJob {
    pub fn new(fetcher: Arc<dyn HoldingsFetcher>, database: DatabaseManager, config: JobConfig) -> Self {
        Self {
            fetcher,
            database,
            config,
        }
    }

    pub fn database(&self) -> &DatabaseManager {
        &self.database
    }

    /// Fetch and store every enabled source
    pub async fn run(&self, sources: &[EtfSource], run_date: NaiveDate) -> Result<JobReport> {
        let enabled: Vec<&EtfSource> = sources.iter().filter(|s| s.enabled).collect();
        info!("🚀 Watchtower run for {}: {} ETFs, {} concurrent", run_date, enabled.len(), self.config.concurrency);

        let mut report = JobReport {
            total_sources: enabled.len(),
            ..Default::default()
        };

        // The run log is written inside each future so no connection is held
        // by a future the stream is not polling
        let mut results = stream::iter(enabled)
            .map(|source| async move {
                let started_at = Utc::now();
                let result = self.process_source(source, run_date).await;
                self.record_run(source, started_at, &result).await;
                (source, result)
            })
            .buffer_unordered(self.config.concurrency.max(1));

        while let Some((source, result)) = results.next().await {
            match result {
                Ok(stored) => {
                    info!(
                        "✅ {}: stored {} holdings as of {}",
                        stored.etf_ticker, stored.rows_stored, stored.as_of_date
                    );
                    report.stored.push(stored);
                }
                Err(e) => {
                    error!("❌ {}: {:#}", source.etf_ticker, e);
                    report.failures.push((source.etf_ticker.clone(), format!("{:#}", e)));
                }
            }
        }

        self.database.set_metadata(LAST_RUN_KEY, &run_date.to_string()).await?;

        info!(
            "📊 Watchtower run complete: {} stored, {} failed, {} rows",
            report.stored.len(),
            report.failures.len(),
            report.rows_stored()
        );
        Ok(report)
    }

    async fn record_run(&self, source: &EtfSource, started_at: DateTime<Utc>, result: &Result<StoredSnapshot>) {
        let run = FetchRun {
            id: None,
            etf_ticker: source.etf_ticker.clone(),
            started_at,
            finished_at: Utc::now(),
            outcome: if result.is_ok() { FetchOutcome::Stored } else { FetchOutcome::Failed },
            as_of_date: result.as_ref().ok().map(|stored| stored.as_of_date),
            rows_stored: result.as_ref().map(|stored| stored.rows_stored).unwrap_or(0),
            error: result.as_ref().err().map(|e| format!("{:#}", e)),
        };

        if let Err(e) = self.database.record_fetch_run(&run).await {
            warn!("Could not record run for {}: {}", source.etf_ticker, e);
        }
    }

    async fn process_source(&self, source: &EtfSource, run_date: NaiveDate) -> Result<StoredSnapshot> {
        let raw = self.fetch_with_retry(source).await?;
        self.ingest(&raw, source.provider, run_date, None).await
    }

    async fn fetch_with_retry(&self, source: &EtfSource) -> Result<RawHoldingsFile> {
        let attempts_allowed = self.config.retry_attempts.max(1);
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < attempts_allowed {
            match self.fetcher.fetch(source).await {
                Ok(raw) => return Ok(raw),
                Err(e) => {
                    attempts += 1;
                    if attempts < attempts_allowed {
                        warn!("Attempt {} failed for {}: {}. Retrying...", attempts, source.etf_ticker, e);
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("No fetch attempts made for {}", source.etf_ticker)))
    }

    /// Parse a raw file and store it as a snapshot; see [`ingest_file`]
    pub async fn ingest(
        &self,
        raw: &RawHoldingsFile,
        provider: Provider,
        fallback_date: NaiveDate,
        date_override: Option<NaiveDate>,
    ) -> Result<StoredSnapshot> {
        ingest_file(&self.database, raw, provider, fallback_date, date_override).await
    }
}

/// Parse a raw file and store it as a snapshot.
///
/// `date_override` wins over any date found in the file; otherwise the
/// file's own date is used, then `fallback_date`.
pub async fn ingest_file(
    database: &DatabaseManager,
    raw: &RawHoldingsFile,
    provider: Provider,
    fallback_date: NaiveDate,
    date_override: Option<NaiveDate>,
) -> Result<StoredSnapshot> {
    let parsed = parse_holdings(raw, provider, fallback_date)
        .map_err(|e| anyhow!("{} ({}): {}", raw.etf_ticker, raw.origin, e))?;

    let (as_of_date, date_source) = match date_override {
        Some(date) => (date, DateSource::Fallback),
        None => (parsed.as_of_date, parsed.date_source),
    };

    if date_source == DateSource::Fallback && date_override.is_none() {
        warn!("⚠️  {}: no date in file, using {}", raw.etf_ticker, as_of_date);
    }

    let snapshot = HoldingsSnapshot::new(&raw.etf_ticker, as_of_date, parsed.holdings);
    let rows_stored = database.upsert_snapshot(&snapshot, provider).await?;

    Ok(StoredSnapshot {
        etf_ticker: snapshot.etf_ticker,
        as_of_date,
        date_source,
        rows_stored,
        skipped_rows: parsed.skipped_rows,
    })
}
