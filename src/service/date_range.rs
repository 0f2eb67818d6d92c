use chrono::NaiveDate;

use crate::error::ChecklistError;

/// Widest range a single checklist may span
pub const MAX_RANGE_DAYS: usize = 62;

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Every date from `start` to `end` inclusive; empty when `start > end`.
pub fn expand_dates(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }
    start.iter_days().take_while(|day| *day <= end).collect()
}

/// String form of [`expand_dates`]; invalid dates yield an empty range.
pub fn expand_date_range(start: &str, end: &str) -> Vec<NaiveDate> {
    match (parse_date(start), parse_date(end)) {
        (Some(start), Some(end)) => expand_dates(start, end),
        _ => Vec::new(),
    }
}

/// Validated expansion used before any fetch: rejects unparsable dates,
/// inverted ranges and ranges longer than `max_days`.
pub fn checked_date_range(
    start: &str,
    end: &str,
    max_days: usize,
) -> Result<Vec<NaiveDate>, ChecklistError> {
    let start_date = parse_date(start).ok_or_else(|| {
        ChecklistError::Validation(format!("start date '{}' is not a valid YYYY-MM-DD date", start))
    })?;
    let end_date = parse_date(end).ok_or_else(|| {
        ChecklistError::Validation(format!("end date '{}' is not a valid YYYY-MM-DD date", end))
    })?;
    if start_date > end_date {
        return Err(ChecklistError::Validation(format!(
            "start date {} is after end date {}",
            start_date, end_date
        )));
    }

    let span = (end_date - start_date).num_days() + 1;
    if span > max_days as i64 {
        return Err(ChecklistError::Validation(format!(
            "range {}..{} spans {} days, maximum is {}",
            start_date, end_date, span, max_days
        )));
    }

    Ok(expand_dates(start_date, end_date))
}
