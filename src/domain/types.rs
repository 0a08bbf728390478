//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed between the parser, reconciler and forecast engine in-memory
//! - exported to CSV/JSON
//! - reloaded later for plotting or comparisons

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Month abbreviations used by the portal's period labels (`2020 MAR`).
pub const MONTH_ABBREVIATIONS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// A calendar month (year + month, no day component).
///
/// Ordering is chronological. The textual form is `YYYY MON`, e.g. `2020 MAR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// Build a period from a four-digit year and a 1-based month.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if !(0..=9999).contains(&year) || !(1..=12).contains(&month) {
            return None;
        }
        Some(Self { year, month })
    }

    /// January of `year`.
    pub fn january(year: i32) -> Self {
        Self { year, month: 1 }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    /// 1-based month number.
    pub fn month(self) -> u32 {
        self.month
    }

    pub fn month_abbrev(self) -> &'static str {
        MONTH_ABBREVIATIONS[(self.month - 1) as usize]
    }

    /// Parse a strict `YYYY MON` label.
    ///
    /// Surrounding whitespace is ignored; anything else (quarterly `2020 Q1`,
    /// annual `2020`, lowercase months, trailing annotations) is rejected.
    pub fn parse_label(label: &str) -> Option<Self> {
        let label = label.trim();
        let bytes = label.as_bytes();
        if bytes.len() != 8 || bytes[4] != b' ' {
            return None;
        }
        if !bytes[..4].iter().all(u8::is_ascii_digit) {
            return None;
        }
        if !bytes[5..].iter().all(u8::is_ascii_uppercase) {
            return None;
        }
        let year: i32 = label[..4].parse().ok()?;
        let month = MONTH_ABBREVIATIONS.iter().position(|m| *m == &label[5..])? as u32 + 1;
        Self::new(year, month)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// First calendar day of the month.
    pub fn first_day(self) -> NaiveDate {
        // Every four-digit year is inside chrono's supported range.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// The period `months` months after (or before, if negative) this one.
    pub fn offset(self, months: i64) -> Self {
        Self::from_ordinal(self.ordinal() + months)
    }

    pub fn succ(self) -> Self {
        self.offset(1)
    }

    /// Number of months from `self` to `later` (negative if `later` is earlier).
    pub fn months_until(self, later: Period) -> i64 {
        later.ordinal() - self.ordinal()
    }

    /// Fractional year used as a continuous x-coordinate in charts.
    pub fn as_fractional_year(self) -> f64 {
        self.year as f64 + (self.month - 1) as f64 / 12.0
    }

    fn ordinal(self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    fn from_ordinal(ordinal: i64) -> Self {
        Self {
            year: ordinal.div_euclid(12) as i32,
            month: ordinal.rem_euclid(12) as u32 + 1,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04} {}", self.year, self.month_abbrev())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_label(s).ok_or_else(|| format!("Invalid period '{s}'. Expected `YYYY MON`, e.g. `2020 MAR`."))
    }
}

impl TryFrom<String> for Period {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(value: Period) -> Self {
        value.to_string()
    }
}

/// Identity of a vintage file.
///
/// Numbered vintages (`v117.csv`) come from the portal's `/previous/vN`
/// archive; a higher number is a newer release. `Latest` is the portal's
/// current release and ranks above every numbered vintage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VintageId {
    Numbered(u32),
    Latest,
}

impl VintageId {
    /// Recognise a vintage from a file stem (`v117`, `latest`).
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        let stem = stem.trim();
        if stem.eq_ignore_ascii_case("latest") {
            return Some(VintageId::Latest);
        }
        let digits = stem.strip_prefix('v').or_else(|| stem.strip_prefix('V'))?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(VintageId::Numbered)
    }

    pub fn file_name(self) -> String {
        format!("{self}.csv")
    }
}

impl fmt::Display for VintageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VintageId::Numbered(n) => write!(f, "v{n}"),
            VintageId::Latest => write!(f, "latest"),
        }
    }
}

impl TryFrom<String> for VintageId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_file_stem(&value).ok_or_else(|| format!("Invalid vintage id '{value}'."))
    }
}

impl From<VintageId> for String {
    fn from(value: VintageId) -> Self {
        value.to_string()
    }
}

/// One raw vintage snapshot as handed over by the downloader or the disk store.
#[derive(Debug, Clone)]
pub struct RawVintage {
    pub id: VintageId,
    pub bytes: Vec<u8>,
}

/// A single monthly observation as reported by one vintage.
#[derive(Debug, Clone, PartialEq)]
pub struct VintageRecord {
    pub period: Period,
    /// `None` when the value column did not parse as a number.
    pub value: Option<f64>,
    /// `None` when the snapshot's metadata had no usable release date.
    pub release_date: Option<NaiveDate>,
    pub vintage_id: VintageId,
}

/// Which vintage a canonical value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub vintage_id: VintageId,
    pub release_date: Option<NaiveDate>,
}

/// One resolved month of the canonical series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanonicalPoint {
    /// `None` marks a genuine data gap: the period was seen but no vintage
    /// supplied a usable value.
    pub value: Option<f64>,
    /// `None` for gaps and for series reloaded from CSV.
    pub source: Option<Provenance>,
}

/// The reconciled monthly series, sorted by period.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CanonicalSeries {
    points: BTreeMap<Period, CanonicalPoint>,
}

impl CanonicalSeries {
    pub fn from_points(points: BTreeMap<Period, CanonicalPoint>) -> Self {
        Self { points }
    }

    /// Build a series without provenance (e.g. when reloading the persisted CSV).
    pub fn from_values(values: impl IntoIterator<Item = (Period, Option<f64>)>) -> Self {
        let points = values
            .into_iter()
            .map(|(period, value)| (period, CanonicalPoint { value, source: None }))
            .collect();
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, period: Period) -> Option<&CanonicalPoint> {
        self.points.get(&period)
    }

    pub fn value(&self, period: Period) -> Option<f64> {
        self.points.get(&period).and_then(|p| p.value)
    }

    /// Iterate in ascending period order.
    pub fn iter(&self) -> impl Iterator<Item = (Period, &CanonicalPoint)> + '_ {
        self.points.iter().map(|(p, point)| (*p, point))
    }

    /// `(period, value)` pairs with present values only.
    pub fn observations(&self) -> impl Iterator<Item = (Period, f64)> + '_ {
        self.points.iter().filter_map(|(p, point)| point.value.map(|v| (*p, v)))
    }

    pub fn first_period(&self) -> Option<Period> {
        self.points.keys().next().copied()
    }

    pub fn last_period(&self) -> Option<Period> {
        self.points.keys().next_back().copied()
    }

    pub fn observed_count(&self) -> usize {
        self.points.values().filter(|p| p.value.is_some()).count()
    }

    pub fn gap_count(&self) -> usize {
        self.len() - self.observed_count()
    }
}

/// Forecast engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Season length in months.
    pub seasonal_period: usize,
    /// Number of future months to forecast.
    pub horizon: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            seasonal_period: 12,
            horizon: 24,
        }
    }
}

/// Holt-Winters smoothing weights, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothingParams {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

/// Level/trend/seasonal components at one point of the recursion.
///
/// `seasonal[j]` is the most recent seasonal effect for season `j`, where the
/// season of observation `t` (0-based from the first fitted month) is `t % m`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentState {
    pub level: f64,
    pub trend: f64,
    pub seasonal: Vec<f64>,
}

/// Diagnostics from the parameter search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerReport {
    pub method: String,
    pub grid_points: usize,
    pub grid_best_sse: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub converged: bool,
}

/// Everything needed to reproduce a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub seasonal_period: usize,
    pub params: SmoothingParams,
    /// State before the first fitted observation.
    pub initial: ComponentState,
    /// State after the last fitted observation (the forecast origin).
    pub final_state: ComponentState,
    /// Sum of squared one-step-ahead residuals.
    pub sse: f64,
    pub rmse: f64,
    /// Number of monthly observations fitted (after gap filling).
    pub n_obs: usize,
    /// How many of those were filled by interpolation.
    pub n_interpolated: usize,
    pub first_period: Period,
    pub last_period: Period,
    pub optimizer: OptimizerReport,
}

/// One forecast month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub period: Period,
    pub value: f64,
}

impl ForecastPoint {
    /// Presentation value: the series is a count in thousands.
    pub fn rounded(&self) -> i64 {
        self.value.round() as i64
    }
}

/// Fitted model plus the forecast it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub points: Vec<ForecastPoint>,
    pub model: FittedModel,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus environment defaults).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding vintage files and derived CSVs.
    pub data_dir: PathBuf,
    /// Directory for SVG charts.
    pub plots_dir: PathBuf,
    pub canonical_csv: PathBuf,
    pub forecast_csv: PathBuf,
    /// Optional JSON export of the fitted model + forecast.
    pub export_model: Option<PathBuf>,
    pub forecast: ForecastConfig,

    /// Print the ASCII chart to the terminal.
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    /// Write a provenance bundle into `debug/`.
    pub debug: bool,
}

impl PipelineConfig {
    pub const CANONICAL_FILE: &'static str = "cleaned_monthly_series.csv";
    pub const FORECAST_FILE: &'static str = "forecasting.csv";

    /// Defaults rooted at the given data/plots directories.
    pub fn with_dirs(data_dir: PathBuf, plots_dir: PathBuf) -> Self {
        Self {
            canonical_csv: data_dir.join(Self::CANONICAL_FILE),
            forecast_csv: data_dir.join(Self::FORECAST_FILE),
            data_dir,
            plots_dir,
            export_model: None,
            forecast: ForecastConfig::default(),
            plot: true,
            plot_width: 100,
            plot_height: 25,
            debug: false,
        }
    }
}
