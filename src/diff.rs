//! Share-count diffing between two snapshots of the same ETF

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{ChangeAction, HoldingChange, HoldingsSnapshot, SHARE_EPSILON};

/// Compute BUY/SELL changes from `previous` to `current`.
///
/// Holdings are outer-joined on ticker with missing shares treated as zero,
/// so a holding only in `current` is a BUY with `prev_shares == 0` and a
/// holding only in `previous` is a SELL with `curr_shares == 0`. Unchanged
/// holdings are not returned. The action of a held-on-both-sides position
/// follows the sign of the delta, which also covers short positions. Results are ordered by absolute share delta,
/// largest first, then by ticker.
pub fn compute_changes(previous: &HoldingsSnapshot, current: &HoldingsSnapshot) -> Result<Vec<HoldingChange>> {
    if previous.etf_ticker != current.etf_ticker {
        return Err(anyhow!(
            "Cannot diff snapshots of different ETFs: {} vs {}",
            previous.etf_ticker,
            current.etf_ticker
        ));
    }

    // ticker -> (prev_shares, curr_shares, prev_name, curr_name); None when absent on that side
    let mut joined: BTreeMap<&str, (Option<f64>, Option<f64>, Option<&str>, Option<&str>)> = BTreeMap::new();

    for holding in &previous.holdings {
        let entry = joined.entry(holding.ticker.as_str()).or_insert((None, None, None, None));
        entry.0 = Some(entry.0.unwrap_or(0.0) + holding.shares);
        entry.2 = entry.2.or(holding.name.as_deref());
    }
    for holding in &current.holdings {
        let entry = joined.entry(holding.ticker.as_str()).or_insert((None, None, None, None));
        entry.1 = Some(entry.1.unwrap_or(0.0) + holding.shares);
        entry.3 = entry.3.or(holding.name.as_deref());
    }

    let mut changes: Vec<HoldingChange> = joined
        .into_iter()
        .filter_map(|(ticker, (prev, curr, prev_name, curr_name))| {
            let prev_shares = prev.unwrap_or(0.0);
            let curr_shares = curr.unwrap_or(0.0);
            let share_delta = curr_shares - prev_shares;
            if share_delta.abs() <= SHARE_EPSILON {
                return None;
            }

            let action = match (prev, curr) {
                (None, Some(_)) => ChangeAction::Buy,
                (Some(_), None) => ChangeAction::Sell,
                _ if share_delta > 0.0 => ChangeAction::Buy,
                _ => ChangeAction::Sell,
            };
            let pct_change = if prev_shares > SHARE_EPSILON {
                Some(share_delta * 100.0 / prev_shares)
            } else {
                None
            };

            Some(HoldingChange {
                etf_ticker: current.etf_ticker.clone(),
                holding_ticker: ticker.to_string(),
                holding_name: curr_name.or(prev_name).map(str::to_string),
                prev_date: previous.as_of_date,
                curr_date: current.as_of_date,
                prev_shares,
                curr_shares,
                share_delta,
                pct_change,
                action,
            })
        })
        .collect();

    changes.sort_by(|a, b| {
        b.share_delta
            .abs()
            .total_cmp(&a.share_delta.abs())
            .then_with(|| a.holding_ticker.cmp(&b.holding_ticker))
    });

    Ok(changes)
}

/// Counts over a change set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    pub buys: usize,
    pub sells: usize,
    pub new_positions: usize,
    pub exited_positions: usize,
}

pub fn summarize(changes: &[HoldingChange]) -> ChangeSummary {
    changes.iter().fold(ChangeSummary::default(), |mut summary, change| {
        match change.action {
            ChangeAction::Buy => summary.buys += 1,
            ChangeAction::Sell => summary.sells += 1,
        }
        if change.is_new_position() {
            summary.new_positions += 1;
        }
        if change.is_exit() {
            summary.exited_positions += 1;
        }
        summary
    })
}
