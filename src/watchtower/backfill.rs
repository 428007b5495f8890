use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::job::{ingest_file, StoredSnapshot};
use crate::config::EtfSource;
use crate::database::DatabaseManager;
use crate::fetchers::LocalFileFetcher;
use crate::models::Provider;
use crate::utils::parse_flexible_date;

/// A holdings file found in an archive directory
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivedFile {
    pub path: PathBuf,
    pub etf_ticker: String,
    pub file_date: NaiveDate,
}

#[derive(Debug, Default)]
pub struct BackfillReport {
    pub stored: Vec<StoredSnapshot>,
    pub skipped_files: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, String)>,
}

/// Split an archive file name like `ARKK_2026-10-14.csv` or
/// `spy-20261014.xlsx` into ticker and date.
pub fn parse_archive_name(path: &Path) -> Option<(String, NaiveDate)> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    if extension != "csv" && extension != "xlsx" {
        return None;
    }

    let stem = path.file_stem()?.to_str()?;
    let (ticker, date_part) = stem.split_once(['_', '-'])?;
    let ticker = ticker.trim();
    if ticker.is_empty() || !ticker.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    let date = parse_flexible_date(date_part)?;
    Some((ticker.to_uppercase(), date))
}

/// Archive files in `dir`, ordered by ETF then date. Unrecognized names are returned separately.
pub fn scan_archive(dir: &Path) -> Result<(Vec<ArchivedFile>, Vec<PathBuf>)> {
    let entries = std::fs::read_dir(dir).map_err(|e| anyhow!("Failed to read {}: {}", dir.display(), e))?;

    let mut files = Vec::new();
    let mut unrecognized = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        match parse_archive_name(&path) {
            Some((etf_ticker, file_date)) => files.push(ArchivedFile {
                path,
                etf_ticker,
                file_date,
            }),
            None => unrecognized.push(path),
        }
    }

    files.sort_by(|a, b| (&a.etf_ticker, a.file_date).cmp(&(&b.etf_ticker, b.file_date)));
    unrecognized.sort();
    Ok((files, unrecognized))
}

/// Import every archive file in `dir`.
///
/// The provider comes from `provider_override`, else from the ETF's entry in
/// `sources`, else the generic layout. The date in the file name is used when
/// the file itself carries no date.
pub async fn backfill_directory(
    database: &DatabaseManager,
    dir: &Path,
    sources: &[EtfSource],
    provider_override: Option<Provider>,
) -> Result<BackfillReport> {
    let (files, unrecognized) = scan_archive(dir)?;
    info!("📂 Backfilling {} files from {}", files.len(), dir.display());

    let mut report = BackfillReport {
        skipped_files: unrecognized,
        ..Default::default()
    };
    for path in &report.skipped_files {
        warn!("Skipping {}: name is not <ETF>_<date>.csv|xlsx", path.display());
    }

    for file in files {
        let provider = provider_override
            .or_else(|| {
                sources
                    .iter()
                    .find(|s| s.etf_ticker == file.etf_ticker)
                    .map(|s| s.provider)
            })
            .unwrap_or(Provider::Generic);

        let result = match LocalFileFetcher::new(&file.path).read(&file.etf_ticker) {
            Ok(raw) => ingest_file(database, &raw, provider, file.file_date, None).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(stored) => {
                info!("✅ {} {}: {} holdings", stored.etf_ticker, stored.as_of_date, stored.rows_stored);
                report.stored.push(stored);
            }
            Err(e) => {
                warn!("❌ {}: {:#}", file.path.display(), e);
                report.failures.push((file.path, format!("{:#}", e)));
            }
        }
    }

    Ok(report)
}
