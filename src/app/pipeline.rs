//! Shared pipeline steps used by every subcommand.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! fetch -> parse -> reconcile -> persist -> plot -> fit/forecast -> persist
//!
//! The CLI handlers can then focus on presentation.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::data::{FetchPlan, FetchSummary, OnsClient, load_vintages};
use crate::domain::{CanonicalSeries, ForecastPoint, ForecastResult, PipelineConfig, RawVintage};
use crate::error::AppError;
use crate::io::vintage::{ParseReport, parse_all};

const PANELS_SIZE: (u32, u32) = (1200, 1400);
const CHART_SIZE: (u32, u32) = (1200, 600);

/// Parse report plus the reconciled series.
#[derive(Debug, Clone)]
pub struct CleanOutput {
    pub report: ParseReport,
    pub series: CanonicalSeries,
}

/// All computed outputs of a single `vacancy run`.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub fetch: Option<FetchSummary>,
    pub clean: CleanOutput,
    pub forecast: ForecastResult,
    pub plots: Vec<PathBuf>,
}

/// Download vintages into the data directory.
pub fn run_fetch(config: &PipelineConfig, plan: &FetchPlan) -> Result<FetchSummary, AppError> {
    let client = OnsClient::from_env()?;
    Ok(client.fetch_vintages(&config.data_dir, plan)?)
}

/// Parse snapshots (in parallel) and reconcile them.
pub fn clean_snapshots(raw: &[RawVintage]) -> Result<CleanOutput, AppError> {
    let report = parse_all(raw);
    let series = crate::reconcile::reconcile_parallel(&report.parsed)?;
    Ok(CleanOutput { report, series })
}

/// Load the vintage store, reconcile, and persist the canonical series.
pub fn run_clean(config: &PipelineConfig) -> Result<CleanOutput, AppError> {
    let raw = load_vintages(&config.data_dir)?;
    info!(vintages = raw.len(), dir = %config.data_dir.display(), "loaded vintage files");

    let out = clean_snapshots(&raw)?;
    crate::io::export::write_canonical_csv(&config.canonical_csv, &out.series)?;
    info!(
        periods = out.series.len(),
        path = %config.canonical_csv.display(),
        "wrote canonical series"
    );
    Ok(out)
}

/// Fit and persist the forecast (CSV, plus JSON when requested).
///
/// Outputs of an earlier run are removed first, so a failed fit leaves no
/// forecast on disk next to the freshly written canonical series.
pub fn run_forecast(config: &PipelineConfig, series: &CanonicalSeries) -> Result<ForecastResult, AppError> {
    crate::io::remove_stale(&config.forecast_csv)?;
    if let Some(path) = &config.export_model {
        crate::io::remove_stale(path)?;
    }

    let result = crate::fit::fit_and_forecast(series, &config.forecast)?;

    crate::io::export::write_forecast_csv(&config.forecast_csv, &result)?;
    info!(
        months = result.points.len(),
        path = %config.forecast_csv.display(),
        "wrote forecast"
    );
    if let Some(path) = &config.export_model {
        crate::io::model::write_model_json(path, &result)?;
    }
    Ok(result)
}

/// Render every chart available for the inputs.
pub fn run_plots(config: &PipelineConfig, series: &CanonicalSeries, forecast: Option<&[ForecastPoint]>) -> Vec<PathBuf> {
    let mut written = Vec::new();
    written.extend(plot_history(config, series));
    if let Some(points) = forecast {
        written.extend(plot_forecast(config, series, points));
    }
    written
}

/// Month-by-month panels. Failures are logged and skipped.
pub fn plot_history(config: &PipelineConfig, series: &CanonicalSeries) -> Option<PathBuf> {
    let path = config.plots_dir.join(crate::plot::MONTHLY_PANELS_FILE);
    ensure_plots_dir(config)?;
    match crate::plot::write_monthly_panels(&path, series, PANELS_SIZE) {
        Ok(()) => Some(path),
        Err(e) => {
            warn!(error = %e, "monthly chart skipped");
            None
        }
    }
}

/// History + forecast chart. Failures are logged and skipped.
pub fn plot_forecast(config: &PipelineConfig, series: &CanonicalSeries, points: &[ForecastPoint]) -> Option<PathBuf> {
    let path = config.plots_dir.join(crate::plot::FORECAST_CHART_FILE);
    ensure_plots_dir(config)?;
    match crate::plot::write_forecast_chart(&path, series, points, CHART_SIZE) {
        Ok(()) => Some(path),
        Err(e) => {
            warn!(error = %e, "forecast chart skipped");
            None
        }
    }
}

fn ensure_plots_dir(config: &PipelineConfig) -> Option<()> {
    match std::fs::create_dir_all(&config.plots_dir) {
        Ok(()) => Some(()),
        Err(e) => {
            warn!(dir = %config.plots_dir.display(), error = %e, "cannot create plots directory");
            None
        }
    }
}

/// Execute the full pipeline. `fetch = None` runs offline.
pub fn run_all(config: &PipelineConfig, fetch: Option<&FetchPlan>) -> Result<RunOutput, AppError> {
    // 1) Download (optional).
    let fetch = fetch.map(|plan| run_fetch(config, plan)).transpose()?;

    // 2) Parse + reconcile + persist.
    let clean = run_clean(config)?;

    // 3) History chart, before fitting so it survives a failed fit.
    let mut plots: Vec<PathBuf> = plot_history(config, &clean.series).into_iter().collect();

    // 4) Fit + forecast + persist.
    let forecast = run_forecast(config, &clean.series)?;
    plots.extend(plot_forecast(config, &clean.series, &forecast.points));

    Ok(RunOutput {
        fetch,
        clean,
        forecast,
        plots,
    })
}
