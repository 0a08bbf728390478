//! Vintage reconciliation.
//!
//! Every vintage re-publishes the full history as known on its release date, so
//! the same month appears many times with (possibly) revised values. For each
//! month we keep exactly one value: the one from the record with the greatest
//! `(release_date, vintage_id)` among records that actually carry a value.
//!
//! - an absent release date ranks below every present one
//! - an absent value never displaces a present one, whatever its precedence
//! - a month seen only with absent values stays in the series as a gap
//!
//! The merge is commutative and associative, so vintages can be folded in any
//! order or reduced in parallel (`reconcile_parallel`) with identical results.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::info;

use crate::domain::{CanonicalPoint, CanonicalSeries, Period, Provenance, VintageId, VintageRecord};
use crate::error::ReconcileError;
use crate::io::vintage::ParsedVintage;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    release_date: Option<NaiveDate>,
    vintage_id: VintageId,
    value: f64,
}

impl Candidate {
    /// Precedence order. The final value comparison only matters when one
    /// vintage is fed twice with different contents; it keeps the merge
    /// independent of input order.
    fn precedence(&self, other: &Candidate) -> Ordering {
        (self.release_date, self.vintage_id)
            .cmp(&(other.release_date, other.vintage_id))
            .then_with(|| self.value.total_cmp(&other.value))
    }
}

/// Incremental reconciler.
///
/// `ingest` folds vintages in; `merge` combines two partial reconcilers.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    slots: BTreeMap<Period, Option<Candidate>>,
    vintages: usize,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vintages folded in so far.
    pub fn vintages(&self) -> usize {
        self.vintages
    }

    pub fn ingest(&mut self, vintage: &ParsedVintage) {
        for record in &vintage.records {
            self.ingest_record(record);
        }
        self.vintages += 1;
    }

    pub fn ingest_record(&mut self, record: &VintageRecord) {
        let slot = self.slots.entry(record.period).or_insert(None);
        let Some(value) = record.value else {
            return;
        };
        let candidate = Candidate {
            release_date: record.release_date,
            vintage_id: record.vintage_id,
            value,
        };
        offer(slot, candidate);
    }

    /// Combine two partial results.
    pub fn merge(mut self, other: Reconciler) -> Reconciler {
        for (period, theirs) in other.slots {
            let slot = self.slots.entry(period).or_insert(None);
            if let Some(candidate) = theirs {
                offer(slot, candidate);
            }
        }
        self.vintages += other.vintages;
        self
    }

    /// Freeze into a canonical series.
    pub fn finish(self) -> Result<CanonicalSeries, ReconcileError> {
        if self.slots.values().all(Option::is_none) {
            return Err(ReconcileError::Empty {
                vintages: self.vintages,
            });
        }

        let points = self
            .slots
            .into_iter()
            .map(|(period, slot)| {
                let point = match slot {
                    Some(c) => CanonicalPoint {
                        value: Some(c.value),
                        source: Some(Provenance {
                            vintage_id: c.vintage_id,
                            release_date: c.release_date,
                        }),
                    },
                    None => CanonicalPoint {
                        value: None,
                        source: None,
                    },
                };
                (period, point)
            })
            .collect();

        Ok(CanonicalSeries::from_points(points))
    }
}

fn offer(slot: &mut Option<Candidate>, candidate: Candidate) {
    let outranked = slot
        .as_ref()
        .is_none_or(|current| current.precedence(&candidate) == Ordering::Less);
    if outranked {
        *slot = Some(candidate);
    }
}

/// Reconcile parsed vintages into one canonical monthly series.
pub fn reconcile(vintages: &[ParsedVintage]) -> Result<CanonicalSeries, ReconcileError> {
    let mut reconciler = Reconciler::new();
    for vintage in vintages {
        reconciler.ingest(vintage);
    }
    let series = reconciler.finish()?;
    info!(
        vintages = vintages.len(),
        periods = series.len(),
        gaps = series.gap_count(),
        "reconciled series"
    );
    Ok(series)
}

/// Parallel reduction; yields the same series as [`reconcile`].
pub fn reconcile_parallel(vintages: &[ParsedVintage]) -> Result<CanonicalSeries, ReconcileError> {
    let merged = vintages
        .par_iter()
        .fold(Reconciler::new, |mut acc, v| {
            acc.ingest(v);
            acc
        })
        .reduce(Reconciler::new, Reconciler::merge);
    let folded = merged.vintages();
    let series = merged.finish()?;
    info!(
        vintages = folded,
        periods = series.len(),
        gaps = series.gap_count(),
        "reconciled series"
    );
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn p(label: &str) -> Period {
        Period::parse_label(label).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    fn vintage(id: u32, release: Option<NaiveDate>, rows: &[(&str, Option<f64>)]) -> ParsedVintage {
        let vintage_id = VintageId::Numbered(id);
        ParsedVintage {
            vintage_id,
            release_date: release,
            records: rows
                .iter()
                .map(|(label, value)| VintageRecord {
                    period: p(label),
                    value: *value,
                    release_date: release,
                    vintage_id,
                })
                .collect(),
            rows_read: rows.len(),
            rows_dropped: 0,
        }
    }

    #[test]
    fn merge_counts_every_vintage() {
        let a = vintage(1, date(2020, 4, 10), &[("2020 MAR", Some(500.0))]);
        let b = vintage(2, date(2020, 5, 10), &[("2020 MAR", Some(520.0))]);
        let c = vintage(3, None, &[("2020 APR", None)]);

        let mut left = Reconciler::new();
        left.ingest(&a);
        let mut right = Reconciler::new();
        right.ingest(&b);
        right.ingest(&c);

        let merged = left.merge(right);
        assert_eq!(merged.vintages(), 3);
        let series = merged.finish().unwrap();
        assert_eq!(series.value(p("2020 MAR")), Some(520.0));
        assert_eq!(series.value(p("2020 APR")), None);
    }

    #[test]
    fn later_release_wins() {
        let a = vintage(1, date(2020, 4, 10), &[("2020 MAR", Some(500.0))]);
        let b = vintage(2, date(2020, 5, 10), &[("2020 MAR", Some(520.0))]);
        let series = reconcile(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(series.value(p("2020 MAR")), Some(520.0));

        let reversed = reconcile(&[b, a]).unwrap();
        assert_eq!(reversed.value(p("2020 MAR")), Some(520.0));
        let source = reversed.get(p("2020 MAR")).unwrap().source.unwrap();
        assert_eq!(source.vintage_id, VintageId::Numbered(2));
    }

    #[test]
    fn release_date_beats_vintage_number() {
        // A higher vintage number with an older release date loses.
        let old_date_high_id = vintage(9, date(2020, 4, 10), &[("2020 MAR", Some(1.0))]);
        let new_date_low_id = vintage(3, date(2020, 5, 10), &[("2020 MAR", Some(2.0))]);
        let series = reconcile(&[old_date_high_id, new_date_low_id]).unwrap();
        assert_eq!(series.value(p("2020 MAR")), Some(2.0));
    }

    #[test]
    fn same_release_date_breaks_tie_on_vintage_id() {
        let a = vintage(117, date(2020, 5, 10), &[("2020 MAR", Some(1.0))]);
        let b = vintage(118, date(2020, 5, 10), &[("2020 MAR", Some(2.0))]);
        let series = reconcile(&[b, a]).unwrap();
        assert_eq!(series.value(p("2020 MAR")), Some(2.0));
    }

    #[test]
    fn missing_release_date_ranks_oldest() {
        let undated = vintage(200, None, &[("2020 MAR", Some(1.0))]);
        let dated = vintage(1, date(2019, 1, 1), &[("2020 MAR", Some(2.0))]);
        let series = reconcile(&[undated, dated]).unwrap();
        assert_eq!(series.value(p("2020 MAR")), Some(2.0));

        // All undated: vintage id decides.
        let a = vintage(4, None, &[("2020 MAR", Some(4.0))]);
        let b = vintage(5, None, &[("2020 MAR", Some(5.0))]);
        let series = reconcile(&[b, a]).unwrap();
        assert_eq!(series.value(p("2020 MAR")), Some(5.0));
    }

    #[test]
    fn absent_value_does_not_overwrite() {
        let older = vintage(1, date(2020, 4, 10), &[("2020 MAR", Some(500.0))]);
        let newer = vintage(2, date(2020, 5, 10), &[("2020 MAR", None)]);
        let series = reconcile(&[older, newer]).unwrap();
        assert_eq!(series.value(p("2020 MAR")), Some(500.0));
    }

    #[test]
    fn gaps_are_preserved_not_zeroed() {
        let a = vintage(
            1,
            date(2020, 4, 10),
            &[("2020 JAN", Some(1.0)), ("2020 FEB", None), ("2020 APR", Some(3.0))],
        );
        let series = reconcile(&[a]).unwrap();
        assert_eq!(series.len(), 3);
        let feb = series.get(p("2020 FEB")).unwrap();
        assert_eq!(feb.value, None);
        assert_eq!(feb.source, None);
        // Never seen by any vintage.
        assert!(series.get(p("2020 MAR")).is_none());
    }

    #[test]
    fn no_usable_values_is_an_error() {
        let a = vintage(1, date(2020, 4, 10), &[("2020 MAR", None)]);
        assert_eq!(reconcile(&[a]), Err(ReconcileError::Empty { vintages: 1 }));
        assert_eq!(reconcile(&[]), Err(ReconcileError::Empty { vintages: 0 }));
    }

    #[test]
    fn every_permutation_gives_the_same_series() {
        let vintages = vec![
            vintage(1, date(2020, 4, 10), &[("2020 JAN", Some(10.0)), ("2020 FEB", Some(20.0))]),
            vintage(2, date(2020, 5, 10), &[("2020 FEB", Some(21.0)), ("2020 MAR", None)]),
            vintage(3, None, &[("2020 JAN", Some(99.0)), ("2020 APR", Some(40.0))]),
            vintage(4, date(2020, 5, 10), &[("2020 FEB", Some(22.0)), ("2020 MAR", Some(30.0))]),
        ];

        let expected = reconcile(&vintages).unwrap();
        assert_eq!(expected.value(p("2020 JAN")), Some(10.0));
        assert_eq!(expected.value(p("2020 FEB")), Some(22.0));
        assert_eq!(expected.value(p("2020 MAR")), Some(30.0));
        assert_eq!(expected.value(p("2020 APR")), Some(40.0));

        for perm in permutations(vintages.len()) {
            let shuffled: Vec<ParsedVintage> = perm.iter().map(|&i| vintages[i].clone()).collect();
            assert_eq!(reconcile(&shuffled).unwrap(), expected);
            assert_eq!(reconcile_parallel(&shuffled).unwrap(), expected);
        }
    }

    #[test]
    fn duplicate_vintage_with_different_contents_is_order_independent() {
        let a = vintage(7, date(2020, 5, 10), &[("2020 MAR", Some(1.0))]);
        let b = vintage(7, date(2020, 5, 10), &[("2020 MAR", Some(2.0))]);
        assert_eq!(
            reconcile(&[a.clone(), b.clone()]).unwrap(),
            reconcile(&[b, a]).unwrap()
        );
    }

    fn permutations(n: usize) -> Vec<Vec<usize>> {
        fn go(prefix: &mut Vec<usize>, used: &mut [bool], out: &mut Vec<Vec<usize>>) {
            if prefix.len() == used.len() {
                out.push(prefix.clone());
                return;
            }
            for i in 0..used.len() {
                if !used[i] {
                    used[i] = true;
                    prefix.push(i);
                    go(prefix, used, out);
                    prefix.pop();
                    used[i] = false;
                }
            }
        }
        let mut out = Vec::new();
        go(&mut Vec::new(), &mut vec![false; n], &mut out);
        out
    }
}
