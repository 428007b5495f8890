//! Provider-shaped holdings files

use rust_xlsxwriter::{Format, Workbook};

/// ARK daily CSV for ARKK. `day` is the October 2026 trading day.
pub fn ark_csv(day: u32, rows: &[(&str, &str, &str)]) -> String {
    let mut csv = String::from("date,fund,company,ticker,cusip,shares,\"market value ($)\",\"weight (%)\"\n");
    for (ticker, company, shares) in rows {
        csv.push_str(&format!(
            "10/{:02}/2026,ARKK,\"{}\",{},000000000,\"{}\",\"$1,000.00\",1.00%\n",
            day, company, ticker, shares
        ));
    }
    csv.push_str("\n\"Investors should carefully consider the investment objectives and risks.\"\n");
    csv
}

pub const ISHARES_IVV_CSV: &str = "iShares Core S&P 500 ETF
Fund Holdings as of,\"Oct 14, 2026\"
Inception Date,\"May 15, 2000\"
\u{a0}
Ticker,Name,Sector,Asset Class,Market Value,Weight (%),Notional Value,Quantity,Price,Location,Exchange,Currency
\"AAPL\",\"APPLE INC\",\"Information Technology\",\"Equity\",\"46,000,000.00\",\"7.01\",\"46,000,000.00\",\"200,000.00\",\"230.00\",\"United States\",\"NASDAQ\",\"USD\"
\"MSFT\",\"MICROSOFT CORP\",\"Information Technology\",\"Equity\",\"63,000,000.00\",\"6.50\",\"63,000,000.00\",\"150,000.00\",\"420.00\",\"United States\",\"NASDAQ\",\"USD\"
\"XTSLA\",\"BLK CSH FND TREASURY SL AGENCY\",\"Cash and/or Derivatives\",\"Money Market\",\"100.00\",\"0.01\",\"100.00\",\"100.00\",\"1.00\",\"United States\",\"-\",\"USD\"
\"USD\",\"USD CASH\",\"Cash and/or Derivatives\",\"Cash\",\"50.00\",\"0.00\",\"50.00\",\"50.00\",\"100.00\",\"United States\",\"-\",\"USD\"
\" \"
\"The content contained herein is owned or licensed by BlackRock and/or its third-party information providers\"
";

pub const GLOBALX_BOTZ_CSV: &str = "Global X Robotics & Artificial Intelligence ETF
Fund Holdings Data as of 10/14/2026
% of Net Assets,Ticker,Name,SEDOL,Market Price ($),Shares Held,Market Value ($)
9.12,NVDA US,NVIDIA CORP,2379504,180.00,\"1,250,000\",\"225,000,000.00\"
4.01,6954 JP,FANUC CORP,6356934,30.00,\"3,000,000\",\"90,000,000.00\"
0.05,,CASH,,1.00,\"(5,000)\",\"-5,000.00\"
";

/// SPDR-style workbook: a cover sheet, then the holdings sheet with an
/// "As of" preamble and a disclaimer footer
pub fn spdr_workbook(as_of: &str, rows: &[(&str, &str, f64)]) -> Vec<u8> {
    let mut workbook = Workbook::new();

    let cover = workbook.add_worksheet();
    cover.set_name("Disclosures").unwrap();
    cover.write_string(0, 0, "Important information about this fund").unwrap();

    let sheet = workbook.add_worksheet();
    sheet.set_name("holdings").unwrap();
    sheet.write_string(0, 0, "Fund Name:").unwrap();
    sheet.write_string(0, 1, "SPDR S&P 500 ETF Trust").unwrap();
    sheet.write_string(1, 0, "Ticker Symbol:").unwrap();
    sheet.write_string(1, 1, "SPY").unwrap();
    sheet.write_string(2, 0, "Holdings:").unwrap();
    sheet.write_string(2, 1, &format!("As of {}", as_of)).unwrap();

    let headers = ["Name", "Ticker", "Identifier", "SEDOL", "Weight", "Sector", "Shares Held", "Local Currency"];
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(4, col as u16, *header).unwrap();
    }

    for (i, (name, ticker, shares)) in rows.iter().enumerate() {
        let row = 5 + i as u32;
        sheet.write_string(row, 0, *name).unwrap();
        sheet.write_string(row, 1, *ticker).unwrap();
        sheet.write_string(row, 2, "000000000").unwrap();
        sheet.write_string(row, 3, "0000000").unwrap();
        sheet.write_number(row, 4, 1.0).unwrap();
        sheet.write_string(row, 5, "Information Technology").unwrap();
        sheet.write_number(row, 6, *shares).unwrap();
        sheet.write_string(row, 7, "USD").unwrap();
    }

    let footer = 5 + rows.len() as u32 + 2;
    sheet
        .write_string(footer, 0, "Past performance is not a reliable indicator of future performance.")
        .unwrap();

    workbook.save_to_buffer().unwrap()
}

/// Workbook whose date column holds real Excel date cells
pub fn dated_workbook(serial: f64, rows: &[(&str, f64)]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");

    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Date").unwrap();
    sheet.write_string(0, 1, "Ticker").unwrap();
    sheet.write_string(0, 2, "Shares").unwrap();

    for (i, (ticker, shares)) in rows.iter().enumerate() {
        let row = 1 + i as u32;
        sheet.write_number_with_format(row, 0, serial, &date_format).unwrap();
        sheet.write_string(row, 1, *ticker).unwrap();
        sheet.write_number(row, 2, *shares).unwrap();
    }

    workbook.save_to_buffer().unwrap()
}
