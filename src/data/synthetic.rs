//! Synthetic vintage generation for offline runs and tests.
//!
//! Each generated vintage is a snapshot file in the portal's export layout: an
//! eight-line metadata block (with a release date) followed by annual,
//! quarterly and monthly rows. Consecutive vintages extend the series by one
//! month and revise the most recent months, which is exactly what
//! reconciliation has to untangle.

use std::fmt::Write as _;

use chrono::Duration;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Period, RawVintage, VintageId};
use crate::error::AppError;

/// Days between the end of the last reported month and its release.
const RELEASE_LAG_DAYS: i64 = 12;

#[derive(Debug, Clone, PartialEq)]
pub struct SynthConfig {
    pub seed: u64,
    /// First month of every vintage.
    pub start: Period,
    /// Months covered by the oldest vintage.
    pub base_months: usize,
    /// Number of numbered vintages; one `latest` snapshot is added on top.
    pub vintages: u32,
    pub first_vintage: u32,
    pub level: f64,
    /// Monthly drift.
    pub trend: f64,
    /// Seasonal amplitude.
    pub amplitude: f64,
    /// Standard deviation of the month-to-month noise.
    pub noise_sd: f64,
    /// Standard deviation of revisions applied to recent months.
    pub revision_sd: f64,
    /// How many trailing months each vintage may revise.
    pub revision_window: usize,
    /// Probability that a monthly cell is published as unparseable (`..`).
    pub missing_prob: f64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            start: Period::january(2015),
            base_months: 96,
            vintages: 25,
            first_vintage: 117,
            level: 780.0,
            trend: 1.2,
            amplitude: 45.0,
            noise_sd: 8.0,
            revision_sd: 6.0,
            revision_window: 3,
            missing_prob: 0.01,
        }
    }
}

/// Generate `config.vintages + 1` snapshots (numbered vintages plus `latest`).
pub fn generate_vintages(config: &SynthConfig) -> Result<Vec<RawVintage>, AppError> {
    if config.base_months == 0 {
        return Err(AppError::new(2, "Synthetic history must cover at least one month."));
    }
    if config.vintages == 0 {
        return Err(AppError::new(2, "Synthetic vintage count must be > 0."));
    }
    if !(0.0..1.0).contains(&config.missing_prob) {
        return Err(AppError::new(2, "Missing-value probability must be in [0, 1)."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let noise = Normal::new(0.0, config.noise_sd)
        .map_err(|e| AppError::new(2, format!("Noise distribution error: {e}")))?;
    let revision = Normal::new(0.0, config.revision_sd)
        .map_err(|e| AppError::new(2, format!("Revision distribution error: {e}")))?;

    let releases = config.vintages as usize + 1;
    let total_months = config.base_months + releases - 1;
    let mut truth: Vec<f64> = (0..total_months)
        .map(|t| {
            let season = 2.0 * std::f64::consts::PI * (t as f64) / 12.0;
            config.level + config.trend * t as f64 + config.amplitude * season.sin() + noise.sample(&mut rng)
        })
        .collect();

    let mut out = Vec::with_capacity(releases);
    for k in 0..releases {
        let months = config.base_months + k;
        // Revise the trailing window in place so later vintages inherit the revision.
        let from = months.saturating_sub(config.revision_window);
        for value in &mut truth[from..months] {
            *value += revision.sample(&mut rng);
        }

        let id = if k + 1 == releases {
            VintageId::Latest
        } else {
            VintageId::Numbered(config.first_vintage + k as u32)
        };
        let text = render_snapshot(config, &truth[..months], &mut rng);
        out.push(RawVintage {
            id,
            bytes: text.into_bytes(),
        });
    }

    Ok(out)
}

fn render_snapshot(config: &SynthConfig, values: &[f64], rng: &mut StdRng) -> String {
    let last = config.start.offset(values.len() as i64 - 1);
    let release = last.succ().first_day() + Duration::days(RELEASE_LAG_DAYS);
    let next = release + Duration::days(28);

    let mut s = String::new();
    let _ = writeln!(s, "\"Title\",\"Job vacancies (thousands): UK: Total: SA\"");
    let _ = writeln!(s, "\"CDID\",\"AP2Y\"");
    let _ = writeln!(s, "\"Source dataset ID\",\"LMS\"");
    let _ = writeln!(s, "\"PreUnit\",\"\"");
    let _ = writeln!(s, "\"Unit\",\"Thousands\"");
    let _ = writeln!(s, "\"Release date\",\"{}\"", release.format("%d-%m-%Y"));
    let _ = writeln!(s, "\"Next release\",\"{}\"", next.format("%d %B %Y"));
    let _ = writeln!(s, "\"Important notes\",\"\"");

    // Annual and quarterly aggregates come first, as in real exports.
    let first_year = config.start.year();
    for year in first_year..=last.year() {
        let in_year: Vec<f64> = values
            .iter()
            .enumerate()
            .filter(|(i, _)| config.start.offset(*i as i64).year() == year)
            .map(|(_, v)| *v)
            .collect();
        if in_year.len() == 12 {
            let _ = writeln!(s, "\"{year}\",\"{:.0}\"", mean(&in_year));
        }
    }
    for (q, chunk) in values.chunks(3).enumerate() {
        let p = config.start.offset(3 * q as i64);
        if chunk.len() == 3 && (p.month() - 1) % 3 == 0 {
            let _ = writeln!(s, "\"{} Q{}\",\"{:.0}\"", p.year(), (p.month() - 1) / 3 + 1, mean(chunk));
        }
    }
    for (i, v) in values.iter().enumerate() {
        let p = config.start.offset(i as i64);
        let label = p.to_string();
        // The newest month is always published so every vintage has an anchored end.
        let newest = i + 1 == values.len();
        if !newest && config.missing_prob > 0.0 && rng.gen_bool(config.missing_prob) {
            let _ = writeln!(s, "\"{label}\",\"..\"");
        } else {
            let _ = writeln!(s, "\"{label}\",\"{v:.0}\"");
        }
    }
    s
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len().max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::vintage::parse_snapshot;

    fn small() -> SynthConfig {
        SynthConfig {
            base_months: 30,
            vintages: 4,
            missing_prob: 0.0,
            ..SynthConfig::default()
        }
    }

    #[test]
    fn generation_is_seeded() {
        let a = generate_vintages(&small()).unwrap();
        let b = generate_vintages(&small()).unwrap();
        assert_eq!(a.len(), 5);
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.id, y.id);
            assert_eq!(x.bytes, y.bytes);
        }
        assert_eq!(a[0].id, VintageId::Numbered(117));
        assert_eq!(a[4].id, VintageId::Latest);
    }

    #[test]
    fn snapshots_parse_and_grow_by_one_month() {
        let vintages = generate_vintages(&small()).unwrap();
        let first = parse_snapshot(&vintages[0].bytes, vintages[0].id).unwrap();
        let last = parse_snapshot(&vintages[4].bytes, vintages[4].id).unwrap();

        assert_eq!(first.records.len(), 30);
        assert_eq!(last.records.len(), 34);
        assert!(first.rows_dropped > 0, "annual/quarterly rows are filtered");
        assert!(first.release_date.is_some());
        assert!(first.release_date < last.release_date);
    }

    #[test]
    fn rejects_empty_history() {
        let cfg = SynthConfig {
            base_months: 0,
            ..SynthConfig::default()
        };
        assert!(generate_vintages(&cfg).is_err());
    }
}
