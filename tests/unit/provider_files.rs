//! Provider holdings files through the full parse path

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use test_log::test;

use crate::common::fixtures;
use crate::common::test_data::date;
use etf_watchtower::fetchers::{FileFormat, RawHoldingsFile};
use etf_watchtower::models::{Holding, Provider};
use etf_watchtower::parsers::{parse_holdings, DateSource, ParseError};

fn raw(etf: &str, bytes: Vec<u8>) -> RawHoldingsFile {
    RawHoldingsFile::new(etf, "fixture", bytes)
}

#[test]
fn test_ark_csv() {
    let csv = fixtures::ark_csv(14, &[("TSLA", "TESLA INC", "2,345,678"), ("ROKU", "ROKU INC", "500")]);
    let parsed = parse_holdings(&raw("ARKK", csv.into_bytes()), Provider::Ark, date(2026, 1, 1)).unwrap();

    assert_eq!(parsed.as_of_date, date(2026, 10, 14));
    assert_eq!(parsed.date_source, DateSource::Column);
    assert_eq!(parsed.holdings[0], Holding::new("TSLA", Some("TESLA INC"), 2_345_678.0));
    assert_eq!(parsed.holdings.len(), 2);
}

#[test]
fn test_ishares_csv() {
    let parsed = parse_holdings(
        &raw("IVV", fixtures::ISHARES_IVV_CSV.as_bytes().to_vec()),
        Provider::IShares,
        date(2026, 1, 1),
    )
    .unwrap();

    assert_eq!(parsed.as_of_date, date(2026, 10, 14));
    assert_eq!(parsed.date_source, DateSource::Preamble);
    assert_eq!(parsed.holdings[0], Holding::new("AAPL", Some("APPLE INC"), 200_000.0));
    assert_eq!(parsed.holdings[1], Holding::new("MSFT", Some("MICROSOFT CORP"), 150_000.0));
    assert!(parsed.holdings.iter().all(|h| h.ticker != "USD"));
}

#[test]
fn test_globalx_csv() {
    let parsed = parse_holdings(
        &raw("BOTZ", fixtures::GLOBALX_BOTZ_CSV.as_bytes().to_vec()),
        Provider::GlobalX,
        date(2026, 1, 1),
    )
    .unwrap();

    assert_eq!(parsed.as_of_date, date(2026, 10, 14));
    assert_eq!(
        parsed.holdings,
        vec![
            Holding::new("NVDA", Some("NVIDIA CORP"), 1_250_000.0),
            Holding::new("6954", Some("FANUC CORP"), 3_000_000.0),
        ]
    );
    assert_eq!(parsed.skipped_rows, 1);
}

#[test]
fn test_spdr_workbook_skips_cover_sheet() {
    let bytes = fixtures::spdr_workbook(
        "14-Oct-2026",
        &[("NVIDIA CORP", "NVDA", 420_000_000.0), ("APPLE INC", "AAPL", 380_000_000.0)],
    );
    let file = raw("SPY", bytes);
    assert_eq!(file.format, FileFormat::Xlsx);

    let parsed = parse_holdings(&file, Provider::Spdr, date(2026, 1, 1)).unwrap();
    assert_eq!(parsed.as_of_date, date(2026, 10, 14));
    assert_eq!(parsed.date_source, DateSource::Preamble);
    assert_eq!(parsed.holdings[1], Holding::new("AAPL", Some("APPLE INC"), 380_000_000.0));
}

#[test]
fn test_excel_date_cells() {
    // 46309 is 2026-10-14 in the 1900 date system
    let bytes = fixtures::dated_workbook(46309.0, &[("TSLA", 10.0), ("ROKU", 20.0)]);
    let parsed = parse_holdings(&raw("ARKK", bytes), Provider::Generic, date(2026, 1, 1)).unwrap();

    assert_eq!(parsed.as_of_date, date(2026, 10, 14));
    assert_eq!(parsed.date_source, DateSource::Column);
    assert_eq!(parsed.holdings.len(), 2);
}

#[test]
fn test_unrecognized_files() {
    let fallback = date(2026, 10, 15);

    assert_matches!(parse_holdings(&raw("ARKK", Vec::new()), Provider::Ark, fallback), Err(ParseError::EmptyFile));
    assert_matches!(
        parse_holdings(&raw("ARKK", b"<html><body>Access denied</body></html>".to_vec()), Provider::Ark, fallback),
        Err(ParseError::HeaderNotFound { provider: Provider::Ark })
    );
    assert_matches!(
        parse_holdings(&raw("SPY", b"PK\x03\x04garbage".to_vec()), Provider::Spdr, fallback),
        Err(ParseError::InvalidWorkbook(_))
    );
}
