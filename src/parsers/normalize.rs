use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::debug;

use super::{grid::Grid, DateSource, ParseError, ParsedHoldings};
use crate::models::{Holding, Provider};
use crate::utils::parse_flexible_date;

// Header rows are expected near the top; anything further down is a footer
const MAX_HEADER_SCAN_ROWS: usize = 60;

const GENERIC_TICKER: &[&str] = &["ticker", "ticker symbol", "symbol", "holding ticker", "bloomberg ticker"];
const GENERIC_SHARES: &[&str] = &[
    "shares",
    "shares held",
    "quantity",
    "share count",
    "number of shares",
    "units",
    "position",
];
const GENERIC_NAME: &[&str] = &["name", "company", "security name", "holding name", "holding", "description"];
const GENERIC_DATE: &[&str] = &["date", "as of date", "as of", "holdings date"];

const PLACEHOLDER_TICKERS: &[&str] = &["-", "--", "N/A", "NA", "CASH", "USD"];
const EXCHANGE_SUFFIXES: &[&str] = &[
    "US", "UN", "UW", "UQ", "UA", "UR", "UP", "LN", "JP", "JT", "HK", "CN", "CT", "GR", "GY", "FP", "NA", "SW", "SE",
    "IM", "SM", "AU", "KS", "TT", "IT",
];

/// Column names a provider uses, tried before the generic aliases
struct ProviderColumns {
    ticker: &'static [&'static str],
    shares: &'static [&'static str],
    name: &'static [&'static str],
    date: &'static [&'static str],
}

fn provider_columns(provider: Provider) -> ProviderColumns {
    match provider {
        Provider::Ark => ProviderColumns {
            ticker: &["ticker"],
            shares: &["shares"],
            name: &["company"],
            date: &["date"],
        },
        Provider::IShares => ProviderColumns {
            ticker: &["ticker"],
            shares: &["quantity", "shares"],
            name: &["name"],
            date: &[],
        },
        Provider::Spdr | Provider::GlobalX => ProviderColumns {
            ticker: &["ticker"],
            shares: &["shares held"],
            name: &["name"],
            date: &[],
        },
        Provider::Generic => ProviderColumns {
            ticker: &[],
            shares: &[],
            name: &[],
            date: &[],
        },
    }
}

fn candidates(specific: &'static [&'static str], generic: &'static [&'static str]) -> Vec<&'static str> {
    specific.iter().chain(generic.iter()).copied().collect()
}

/// Column positions of the holdings table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderLayout {
    pub row: usize,
    pub ticker: usize,
    pub shares: usize,
    pub name: Option<usize>,
    pub date: Option<usize>,
}

fn normalize_header(cell: &str) -> String {
    cell.trim()
        .trim_end_matches(':')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn find_column(headers: &[String], aliases: &[&str], exclude: &[usize]) -> Option<usize> {
    aliases.iter().find_map(|alias| {
        headers
            .iter()
            .enumerate()
            .find(|(idx, header)| header.as_str() == *alias && !exclude.contains(idx))
            .map(|(idx, _)| idx)
    })
}

/// Locate the header row: the first row naming both a ticker and a shares column
pub fn find_header(cells: &Grid, provider: Provider) -> Option<HeaderLayout> {
    let columns = provider_columns(provider);
    let ticker_aliases = candidates(columns.ticker, GENERIC_TICKER);
    let shares_aliases = candidates(columns.shares, GENERIC_SHARES);
    let name_aliases = candidates(columns.name, GENERIC_NAME);
    let date_aliases = candidates(columns.date, GENERIC_DATE);

    cells.iter().take(MAX_HEADER_SCAN_ROWS).enumerate().find_map(|(row_idx, row)| {
        let headers: Vec<String> = row.iter().map(|c| normalize_header(c)).collect();
        let ticker = find_column(&headers, &ticker_aliases, &[])?;
        let shares = find_column(&headers, &shares_aliases, &[ticker])?;
        let name = find_column(&headers, &name_aliases, &[ticker, shares]);
        let date = find_column(&headers, &date_aliases, &[ticker, shares]);

        Some(HeaderLayout {
            row: row_idx,
            ticker,
            shares,
            name,
            date,
        })
    })
}

/// Clean a ticker cell; `None` for blanks and cash/placeholder lines
pub fn clean_ticker(raw: &str) -> Option<String> {
    let ticker = raw.trim().trim_matches('"').trim().to_uppercase();
    if ticker.is_empty() || PLACEHOLDER_TICKERS.contains(&ticker.as_str()) {
        return None;
    }

    match ticker.rsplit_once(' ') {
        Some((base, suffix)) if EXCHANGE_SUFFIXES.contains(&suffix) && !base.trim().is_empty() => {
            Some(base.trim().to_string())
        }
        _ => Some(ticker),
    }
}

/// Parse a share count such as `1,234,567`, `"12,000.0"` or `(1,500)`
pub fn parse_shares(raw: &str) -> Option<f64> {
    let mut value = raw.trim().trim_matches('"').trim().to_string();
    if value.is_empty() || matches!(value.to_lowercase().as_str(), "-" | "--" | "n/a" | "na") {
        return None;
    }

    let negative = value.starts_with('(') && value.ends_with(')');
    if negative {
        value = value[1..value.len() - 1].to_string();
    }
    value.retain(|c| c != ',' && !c.is_whitespace());

    let parsed: f64 = value.parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    Some(if negative { -parsed } else { parsed })
}

fn clean_name(raw: &str) -> Option<String> {
    let name = raw.trim().trim_matches('"').trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Text following the first case-insensitive "as of" in `cell`
fn after_as_of(cell: &str) -> Option<&str> {
    const MARKER: &str = "as of";
    cell.char_indices().find_map(|(idx, _)| {
        cell.get(idx..idx + MARKER.len())
            .filter(|candidate| candidate.eq_ignore_ascii_case(MARKER))
            .map(|_| &cell[idx + MARKER.len()..])
    })
}

/// Find an "as of" date in the lines above the header row
pub fn preamble_date(preamble: &[Vec<String>]) -> Option<NaiveDate> {
    for row in preamble {
        for (idx, cell) in row.iter().enumerate() {
            let Some(tail) = after_as_of(cell) else {
                continue;
            };
            let remainder = tail
                .trim_start_matches(|c: char| c == ':' || c == ',' || c.is_whitespace())
                .trim();

            if let Some(date) = date_from_phrase(remainder) {
                return Some(date);
            }

            // iShares puts the date in the next cell: `Fund Holdings as of,"Oct 14, 2026"`
            if let Some(date) = row[idx + 1..]
                .iter()
                .filter(|c| !c.trim().is_empty())
                .find_map(|c| date_from_phrase(c))
            {
                return Some(date);
            }
        }
    }
    None
}

fn date_from_phrase(phrase: &str) -> Option<NaiveDate> {
    if phrase.is_empty() {
        return None;
    }
    if let Some(date) = parse_flexible_date(phrase) {
        return Some(date);
    }

    let tokens: Vec<&str> = phrase.split_whitespace().collect();
    (1..=tokens.len().min(3))
        .rev()
        .find_map(|n| parse_flexible_date(&tokens[..n].join(" ")))
}

/// Normalize one grid of cells into holdings
pub fn normalize_grid(
    cells: &Grid,
    provider: Provider,
    fallback_date: NaiveDate,
) -> Result<ParsedHoldings, ParseError> {
    let layout = find_header(cells, provider).ok_or(ParseError::HeaderNotFound { provider })?;
    debug!("Header row {} for {} layout: {:?}", layout.row, provider, layout);

    let mut holdings: Vec<Holding> = Vec::new();
    let mut index_by_ticker: HashMap<String, usize> = HashMap::new();
    let mut column_date: Option<NaiveDate> = None;
    let mut skipped_rows = 0;

    for row in &cells[layout.row + 1..] {
        if row.iter().all(|c| c.is_empty()) {
            continue;
        }

        let cell = |idx: usize| row.get(idx).map(String::as_str).unwrap_or("");

        let (Some(ticker), Some(shares)) = (clean_ticker(cell(layout.ticker)), parse_shares(cell(layout.shares)))
        else {
            skipped_rows += 1;
            continue;
        };

        if column_date.is_none() {
            column_date = layout.date.and_then(|idx| parse_flexible_date(cell(idx)));
        }

        let name = layout.name.and_then(|idx| clean_name(cell(idx)));

        // Duplicate tickers (e.g. multiple share lines) are merged
        match index_by_ticker.get(&ticker) {
            Some(&existing) => {
                let holding = &mut holdings[existing];
                holding.shares += shares;
                if holding.name.is_none() {
                    holding.name = name;
                }
            }
            None => {
                index_by_ticker.insert(ticker.clone(), holdings.len());
                holdings.push(Holding { ticker, name, shares });
            }
        }
    }

    if holdings.is_empty() {
        return Err(ParseError::NoHoldings);
    }

    let (as_of_date, date_source) = match column_date {
        Some(date) => (date, DateSource::Column),
        None => match preamble_date(&cells[..layout.row]) {
            Some(date) => (date, DateSource::Preamble),
            None => (fallback_date, DateSource::Fallback),
        },
    };

    Ok(ParsedHoldings {
        as_of_date,
        date_source,
        holdings,
        skipped_rows,
    })
}
