//! Reporting utilities: series statistics, vintage contributions, and
//! formatted terminal output.

use std::collections::BTreeMap;

use crate::domain::{CanonicalSeries, Period, VintageId};

pub mod format;

pub use format::*;

/// Descriptive statistics of a canonical series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesStats {
    pub first: Period,
    pub last: Period,
    /// Periods present in the series (observed + gaps).
    pub periods: usize,
    pub observed: usize,
    pub gaps: usize,
    /// Months between `first` and `last` not present at all.
    pub unseen: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Compute statistics; `None` when the series has no observed value.
pub fn series_stats(series: &CanonicalSeries) -> Option<SeriesStats> {
    let first = series.first_period()?;
    let last = series.last_period()?;

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut observed = 0usize;
    for (_, v) in series.observations() {
        min = min.min(v);
        max = max.max(v);
        sum += v;
        observed += 1;
    }
    if observed == 0 {
        return None;
    }

    let span = first.months_until(last) as usize + 1;
    Some(SeriesStats {
        first,
        last,
        periods: series.len(),
        observed,
        gaps: series.gap_count(),
        unseen: span - series.len(),
        min,
        max,
        mean: sum / observed as f64,
    })
}

/// How many canonical values each vintage supplied, newest vintage first.
pub fn vintage_contributions(series: &CanonicalSeries) -> Vec<(VintageId, usize)> {
    let mut counts: BTreeMap<VintageId, usize> = BTreeMap::new();
    for (_, point) in series.iter() {
        if let Some(source) = point.source {
            *counts.entry(source.vintage_id).or_default() += 1;
        }
    }
    counts.into_iter().rev().collect()
}
