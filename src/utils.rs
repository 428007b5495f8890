use chrono::{Datelike, Duration, NaiveDate, Weekday};

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    // two-digit years first: "%Y" would accept "26" as year 26
    "%m/%d/%y",
    "%m/%d/%Y",
    "%d-%b-%y",
    "%d-%b-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%d %b %Y",
    "%Y%m%d",
];

/// Parse a date in any of the formats providers put in holdings files
pub fn parse_flexible_date(value: &str) -> Option<NaiveDate> {
    let cleaned = value.trim().trim_matches('"').trim();
    if cleaned.is_empty() {
        return None;
    }

    // Timestamps such as "2026-10-14 00:00:00" or "2026-10-14T00:00:00"
    let date_part = cleaned
        .split(|c| c == 'T' || c == ' ')
        .next()
        .filter(|part| part.len() == 10 && part.as_bytes().get(4) == Some(&b'-'))
        .unwrap_or(cleaned);

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Convert an Excel serial day number (1900 date system) to a date
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

/// Most recent weekday on or before the given date
pub fn last_weekday_on_or_before(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date - Duration::days(2),
        _ => date,
    }
}
