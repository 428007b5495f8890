use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::database::DatabaseManager;
use crate::diff::{compute_changes, summarize, ChangeSummary};
use crate::models::HoldingChange;

/// Changes for one ETF between two stored snapshot dates
#[derive(Debug, Clone, Serialize)]
pub struct EtfChangeSet {
    pub etf_ticker: String,
    pub prev_date: NaiveDate,
    pub curr_date: NaiveDate,
    pub summary: ChangeSummary,
    pub changes: Vec<HoldingChange>,
}

/// Answers "what did each ETF buy and sell as of a date" from stored snapshots.
///
/// Dates are resolved per ETF: each fund uses its own latest snapshot on or
/// before the target date, so funds that publish on different days are never
/// compared against a date they have no data for.
pub struct ChangeService {
    database: DatabaseManager,
}

impl ChangeService {
    pub fn new(database: DatabaseManager) -> Self {
        Self { database }
    }

    /// Changes for a single ETF.
    ///
    /// The current snapshot is the latest on or before `target`. When
    /// `previous` is given it is resolved the same way; otherwise the snapshot
    /// immediately before the current one is used. Returns `None` when either
    /// snapshot is missing.
    pub async fn changes_for_etf(
        &self,
        etf_ticker: &str,
        target: NaiveDate,
        previous: Option<NaiveDate>,
    ) -> Result<Option<EtfChangeSet>> {
        let etf_ticker = etf_ticker.to_uppercase();

        let Some(curr_date) = self.database.resolve_as_of_date(&etf_ticker, target).await? else {
            debug!("{}: no snapshot on or before {}", etf_ticker, target);
            return Ok(None);
        };

        let prev_date = match previous {
            Some(previous) => {
                let resolved = self.database.resolve_as_of_date(&etf_ticker, previous).await?;
                if let Some(resolved) = resolved {
                    if resolved >= curr_date {
                        return Err(anyhow!(
                            "{}: previous snapshot {} is not before current snapshot {}",
                            etf_ticker,
                            resolved,
                            curr_date
                        ));
                    }
                }
                resolved
            }
            None => self.database.previous_snapshot_date(&etf_ticker, curr_date).await?,
        };

        let Some(prev_date) = prev_date else {
            debug!("{}: only one snapshot up to {}", etf_ticker, curr_date);
            return Ok(None);
        };

        self.diff_dates(&etf_ticker, prev_date, curr_date).await
    }

    /// Changes for every stored ETF as of `target`, ordered by ETF ticker.
    /// ETFs without two snapshots up to `target` are left out.
    pub async fn changes_for_all(&self, target: NaiveDate) -> Result<Vec<EtfChangeSet>> {
        let resolved = self.database.resolve_as_of_dates(target).await?;
        let mut sets = Vec::with_capacity(resolved.len());

        for (etf_ticker, curr_date) in resolved {
            let Some(prev_date) = self.database.previous_snapshot_date(&etf_ticker, curr_date).await? else {
                debug!("{}: no earlier snapshot than {}", etf_ticker, curr_date);
                continue;
            };
            if let Some(set) = self.diff_dates(&etf_ticker, prev_date, curr_date).await? {
                sets.push(set);
            }
        }

        info!("🔍 Computed changes for {} ETFs as of {}", sets.len(), target);
        Ok(sets)
    }

    async fn diff_dates(&self, etf_ticker: &str, prev_date: NaiveDate, curr_date: NaiveDate) -> Result<Option<EtfChangeSet>> {
        let previous = self.database.load_snapshot(etf_ticker, prev_date).await?;
        let current = self.database.load_snapshot(etf_ticker, curr_date).await?;

        let (Some(previous), Some(current)) = (previous, current) else {
            return Ok(None);
        };

        let changes = compute_changes(&previous, &current)?;
        Ok(Some(EtfChangeSet {
            etf_ticker: etf_ticker.to_string(),
            prev_date,
            curr_date,
            summary: summarize(&changes),
            changes,
        }))
    }
}
