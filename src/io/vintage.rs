//! Vintage snapshot parsing.
//!
//! A snapshot exported by the statistics portal looks like:
//!
//! ```text
//! "Title","Job vacancies (thousands): UK: Total"
//! "CDID","AP2Y"
//! "Source dataset ID","LMS"
//! "PreUnit",""
//! "Unit","Thousands"
//! "Release date","13-10-2025"
//! "Next release","11 November 2025"
//! "Important notes",""
//! "2001","682"
//! "2001 Q2","680"
//! "2001 MAY","680"
//! ...
//! ```
//!
//! The metadata block sits above the table at a fixed row count. Only rows whose
//! period label is a strict `YYYY MON` survive; annual and quarterly rows,
//! footnotes and blank lines are dropped without error.
//!
//! Design goals:
//! - **Partial tolerance**: a bad value is an absent value, not a failed snapshot
//! - **Deterministic behavior**: within one snapshot a repeated period keeps its last row
//! - **Separation of concerns**: no precedence/reconciliation logic here

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::domain::{Period, RawVintage, VintageId, VintageRecord};
use crate::error::ParseError;

/// Number of metadata lines above the table section.
pub const HEADER_LINES: usize = 7;

/// Expected column count of the table section (`period,value`).
const TABLE_COLUMNS: usize = 2;

/// Parse output for one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedVintage {
    pub vintage_id: VintageId,
    pub release_date: Option<NaiveDate>,
    /// Monthly records sorted by period.
    pub records: Vec<VintageRecord>,
    /// Rows read from the table section (including dropped rows).
    pub rows_read: usize,
    /// Rows dropped by the monthly period filter.
    pub rows_dropped: usize,
}

impl ParsedVintage {
    /// Monthly rows whose value column did not parse.
    pub fn unparseable_values(&self) -> usize {
        self.records.iter().filter(|r| r.value.is_none()).count()
    }
}

/// Outcome of parsing a batch of snapshots.
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    /// Successfully parsed vintages, in input order.
    pub parsed: Vec<ParsedVintage>,
    /// Snapshots that were skipped.
    pub failures: Vec<ParseError>,
}

impl ParseReport {
    /// Vintages parsed without a usable release date.
    pub fn missing_release_dates(&self) -> Vec<VintageId> {
        self.parsed
            .iter()
            .filter(|v| v.release_date.is_none())
            .map(|v| v.vintage_id)
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.parsed.iter().map(|v| v.records.len()).sum()
    }
}

/// Parse one raw snapshot.
///
/// `vintage_id` is the snapshot's file identity supplied by the caller; it is
/// never derived from content.
pub fn parse_snapshot(raw: &[u8], vintage_id: VintageId) -> Result<ParsedVintage, ParseError> {
    let text = String::from_utf8_lossy(raw);
    // Spreadsheet exports occasionally carry a UTF-8 BOM.
    let text = text.trim_start_matches('\u{feff}');

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut release_date = None;
    let mut rows: BTreeMap<Period, Option<f64>> = BTreeMap::new();
    let mut rows_read = 0usize;
    let mut rows_dropped = 0usize;
    let mut max_columns = 0usize;

    for result in reader.records() {
        let record = result.map_err(|e| ParseError::Row {
            vintage: vintage_id,
            line: e.position().map(|p| p.line()).unwrap_or(0),
            message: e.to_string(),
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0) as usize;

        if release_date.is_none() && is_release_date_key(record.get(0)) {
            release_date = record.get(1).and_then(parse_release_date);
        }

        if line <= HEADER_LINES {
            continue;
        }

        rows_read += 1;
        max_columns = max_columns.max(record.len());

        let Some(period) = record.get(0).and_then(Period::parse_label) else {
            rows_dropped += 1;
            continue;
        };
        rows.insert(period, record.get(1).and_then(parse_value));
    }

    if rows_read == 0 {
        return Err(ParseError::MissingTable {
            vintage: vintage_id,
            header_lines: HEADER_LINES,
        });
    }
    if max_columns < TABLE_COLUMNS {
        return Err(ParseError::TooFewColumns {
            vintage: vintage_id,
            found: max_columns,
        });
    }

    if release_date.is_none() {
        warn!(vintage = %vintage_id, "release date missing or malformed; vintage ranks as oldest");
    }

    let records: Vec<VintageRecord> = rows
        .into_iter()
        .map(|(period, value)| VintageRecord {
            period,
            value,
            release_date,
            vintage_id,
        })
        .collect();

    debug!(
        vintage = %vintage_id,
        rows_read,
        monthly = records.len(),
        dropped = rows_dropped,
        "parsed snapshot"
    );

    Ok(ParsedVintage {
        vintage_id,
        release_date,
        records,
        rows_read,
        rows_dropped,
    })
}

/// Parse many snapshots in parallel.
///
/// Failures are logged and collected, never propagated: reconciliation proceeds
/// with whatever parsed.
pub fn parse_all(raw: &[RawVintage]) -> ParseReport {
    let results: Vec<Result<ParsedVintage, ParseError>> = raw
        .par_iter()
        .map(|v| parse_snapshot(&v.bytes, v.id))
        .collect();

    let mut report = ParseReport::default();
    for result in results {
        match result {
            Ok(parsed) => report.parsed.push(parsed),
            Err(err) => {
                warn!(vintage = %err.vintage(), error = %err, "skipping vintage");
                report.failures.push(err);
            }
        }
    }
    report
}

fn is_release_date_key(field: Option<&str>) -> bool {
    field
        .map(|k| k.trim().trim_matches('"').trim().eq_ignore_ascii_case("release date"))
        .unwrap_or(false)
}

/// Parse a day-first release date.
fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim().trim_matches('"').trim();
    // The portal writes `13-10-2025`; the others show up in hand-edited or
    // re-saved files. ISO is accepted as an unambiguous fallback.
    const FMTS: [&str; 5] = ["%d-%m-%Y", "%d/%m/%Y", "%d %B %Y", "%d %b %Y", "%Y-%m-%d"];
    FMTS.iter().find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

fn parse_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let v = trimmed.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
