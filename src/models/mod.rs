use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One normalized line of an ETF holdings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub ticker: String,
    pub name: Option<String>,
    pub shares: f64,
}

impl Holding {
    pub fn new(ticker: &str, name: Option<&str>, shares: f64) -> Self {
        Self {
            ticker: ticker.to_string(),
            name: name.map(|n| n.to_string()),
            shares,
        }
    }
}

/// The set of holdings for one ETF on one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingsSnapshot {
    pub etf_ticker: String,
    pub as_of_date: NaiveDate,
    pub holdings: Vec<Holding>,
}

impl HoldingsSnapshot {
    pub fn new(etf_ticker: &str, as_of_date: NaiveDate, holdings: Vec<Holding>) -> Self {
        Self {
            etf_ticker: etf_ticker.to_uppercase(),
            as_of_date,
            holdings,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn total_shares(&self) -> f64 {
        self.holdings.iter().map(|h| h.shares).sum()
    }
}

/// Direction of a share-count change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeAction {
    Buy,
    Sell,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeAction::Buy => write!(f, "BUY"),
            ChangeAction::Sell => write!(f, "SELL"),
        }
    }
}

/// Share counts are stored as REAL; differences at or below this are noise
pub const SHARE_EPSILON: f64 = 1e-9;

/// Share-count change of one holding between two snapshots of the same ETF
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingChange {
    pub etf_ticker: String,
    pub holding_ticker: String,
    pub holding_name: Option<String>,
    pub prev_date: NaiveDate,
    pub curr_date: NaiveDate,
    pub prev_shares: f64,
    pub curr_shares: f64,
    pub share_delta: f64,
    /// `None` when the holding is new (no previous shares)
    pub pct_change: Option<f64>,
    pub action: ChangeAction,
}

impl HoldingChange {
    pub fn is_new_position(&self) -> bool {
        self.prev_shares.abs() <= SHARE_EPSILON
    }

    pub fn is_exit(&self) -> bool {
        self.curr_shares.abs() <= SHARE_EPSILON
    }
}

/// Holdings file layout family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// ARK Invest daily CSV
    Ark,
    /// iShares CSV with a fund preamble
    #[serde(rename = "ishares")]
    #[value(name = "ishares")]
    IShares,
    /// SPDR daily holdings workbook
    Spdr,
    /// Global X full holdings CSV
    #[serde(rename = "globalx")]
    #[value(name = "globalx")]
    GlobalX,
    /// Anything with recognizable ticker/shares headers
    Generic,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Ark => "ark",
            Provider::IShares => "ishares",
            Provider::Spdr => "spdr",
            Provider::GlobalX => "globalx",
            Provider::Generic => "generic",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ark" => Ok(Provider::Ark),
            "ishares" => Ok(Provider::IShares),
            "spdr" => Ok(Provider::Spdr),
            "globalx" | "global_x" => Ok(Provider::GlobalX),
            "generic" => Ok(Provider::Generic),
            other => Err(anyhow::anyhow!("Unknown provider: {}", other)),
        }
    }
}

/// Outcome of one ETF in a watchtower run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchOutcome {
    Stored,
    Failed,
}

impl FetchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchOutcome::Stored => "stored",
            FetchOutcome::Failed => "failed",
        }
    }
}

/// Job run log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRun {
    pub id: Option<i64>,
    pub etf_ticker: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: FetchOutcome,
    pub as_of_date: Option<NaiveDate>,
    pub rows_stored: i64,
    pub error: Option<String>,
}

/// Database statistics for the status command
#[derive(Debug, Clone, Default)]
pub struct DatabaseStats {
    pub total_etfs: usize,
    pub total_snapshots: usize,
    pub total_holding_rows: usize,
    pub oldest_snapshot_date: Option<NaiveDate>,
    pub newest_snapshot_date: Option<NaiveDate>,
}
