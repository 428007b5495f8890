//! Holdings file normalization
//!
//! Every provider file is first flattened into a grid of text cells
//! ([`grid`]), then [`normalize`] locates the header row, maps the
//! provider's column names onto the common schema and cleans each row.

use chrono::NaiveDate;
use thiserror::Error;

use crate::fetchers::{FileFormat, RawHoldingsFile};
use crate::models::{Holding, Provider};

pub mod grid;
pub mod normalize;

pub use normalize::normalize_grid;

/// Errors raised while turning a holdings file into normalized rows
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("holdings file is empty")]
    EmptyFile,

    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to open workbook: {0}")]
    InvalidWorkbook(String),

    #[error("no ticker/shares header row found for {provider} layout")]
    HeaderNotFound { provider: Provider },

    #[error("header found but no holdings rows could be parsed")]
    NoHoldings,
}

/// Where the snapshot date of a parsed file came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    /// A date column inside the holdings table
    Column,
    /// An "as of" line above the header row
    Preamble,
    /// Neither was present; the caller's date was used
    Fallback,
}

/// Normalized content of one holdings file
#[derive(Debug, Clone)]
pub struct ParsedHoldings {
    pub as_of_date: NaiveDate,
    pub date_source: DateSource,
    pub holdings: Vec<Holding>,
    pub skipped_rows: usize,
}

/// Parse a raw holdings file into normalized holdings
pub fn parse_holdings(
    raw: &RawHoldingsFile,
    provider: Provider,
    fallback_date: NaiveDate,
) -> Result<ParsedHoldings, ParseError> {
    if raw.bytes.is_empty() {
        return Err(ParseError::EmptyFile);
    }

    match raw.format {
        FileFormat::Csv => {
            let cells = grid::csv_to_grid(&raw.bytes)?;
            normalize_grid(&cells, provider, fallback_date)
        }
        FileFormat::Xlsx => {
            // Providers sometimes put a cover sheet before the holdings table
            let sheets = grid::xlsx_to_grids(&raw.bytes)?;
            let mut last_err = ParseError::HeaderNotFound { provider };
            for cells in &sheets {
                match normalize_grid(cells, provider, fallback_date) {
                    Ok(parsed) => return Ok(parsed),
                    Err(e) => last_err = e,
                }
            }
            Err(last_err)
        }
    }
}
