use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;

use super::ParseError;
use crate::utils::excel_serial_to_date;

/// Rows of trimmed text cells
pub type Grid = Vec<Vec<String>>;

/// Read CSV bytes into a grid. Rows may have different lengths: provider
/// preambles and footers rarely match the table width.
pub fn csv_to_grid(bytes: &[u8]) -> Result<Grid, ParseError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        let row: Vec<String> = record
            .iter()
            .map(|field| String::from_utf8_lossy(field).trim().to_string())
            .collect();
        rows.push(row);
    }

    if rows.iter().all(|row| row.iter().all(|cell| cell.is_empty())) {
        return Err(ParseError::EmptyFile);
    }

    Ok(rows)
}

/// Read every worksheet of an xlsx workbook into its own grid
pub fn xlsx_to_grids(bytes: &[u8]) -> Result<Vec<Grid>, ParseError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ParseError::InvalidWorkbook(e.to_string()))?;

    let sheet_names = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(ParseError::InvalidWorkbook("workbook contains no sheets".to_string()));
    }

    let mut grids = Vec::with_capacity(sheet_names.len());
    for sheet_name in &sheet_names {
        let range = workbook
            .worksheet_range(sheet_name)
            .map_err(|e| ParseError::InvalidWorkbook(format!("sheet '{}': {}", sheet_name, e)))?;

        let grid: Grid = range
            .rows()
            .map(|row| row.iter().map(cell_to_text).collect())
            .collect();
        grids.push(grid);
    }

    Ok(grids)
}

fn cell_to_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            excel_serial_to_date(serial)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| serial.to_string())
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}
