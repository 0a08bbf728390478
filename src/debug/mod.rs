//! Debug bundle writer: provenance of a pipeline run as a markdown file.
//!
//! The bundle answers "where did this number come from?": which vintages parsed
//! or failed, which vintage won each month, and what the model fitted.

use std::fmt::Write as _;
use std::fs::{create_dir_all, write};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::domain::{CanonicalSeries, ForecastResult};
use crate::error::AppError;
use crate::io::vintage::ParseReport;

/// Write the bundle into `dir` and return its path.
pub fn write_debug_bundle(
    dir: &Path,
    report: &ParseReport,
    series: &CanonicalSeries,
    forecast: Option<&ForecastResult>,
) -> Result<PathBuf, AppError> {
    create_dir_all(dir).map_err(|e| AppError::new(2, format!("Failed to create debug dir: {e}")))?;

    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("vacancy_debug_{ts}.md"));

    let mut text = format!("# vacancy debug bundle\n- generated: {}\n", Local::now().to_rfc3339());
    text.push_str(&render_debug_bundle(report, series, forecast));

    write(&path, text).map_err(|e| AppError::new(2, format!("Failed to write debug file: {e}")))?;
    Ok(path)
}

/// Bundle body (without the timestamped header).
pub fn render_debug_bundle(report: &ParseReport, series: &CanonicalSeries, forecast: Option<&ForecastResult>) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "\n## Vintages");
    let _ = writeln!(out, "| vintage | release_date | rows_read | monthly | dropped | unparseable |");
    let _ = writeln!(out, "| - | - | - | - | - | - |");
    let mut parsed: Vec<_> = report.parsed.iter().collect();
    parsed.sort_by_key(|v| v.vintage_id);
    for v in parsed {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} |",
            v.vintage_id,
            v.release_date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
            v.rows_read,
            v.records.len(),
            v.rows_dropped,
            v.unparseable_values()
        );
    }
    if !report.failures.is_empty() {
        let _ = writeln!(out, "\n### Skipped");
        for err in &report.failures {
            let _ = writeln!(out, "- {err}");
        }
    }

    let _ = writeln!(out, "\n## Canonical series");
    let _ = writeln!(out, "| period | value | vintage | release_date |");
    let _ = writeln!(out, "| - | - | - | - |");
    for (period, point) in series.iter() {
        let value = point.value.map(|v| format!("{v}")).unwrap_or_else(|| "-".to_string());
        let (vintage, released) = match point.source {
            Some(src) => (
                src.vintage_id.to_string(),
                src.release_date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
            ),
            None => ("-".to_string(), "-".to_string()),
        };
        let _ = writeln!(out, "| {period} | {value} | {vintage} | {released} |");
    }

    if let Some(fc) = forecast {
        let m = &fc.model;
        let _ = writeln!(out, "\n## Model");
        let _ = writeln!(
            out,
            "- params: alpha={:.6}, beta={:.6}, gamma={:.6}",
            m.params.alpha, m.params.beta, m.params.gamma
        );
        let _ = writeln!(out, "- sse: {:.6}, rmse: {:.6}", m.sse, m.rmse);
        let _ = writeln!(
            out,
            "- fitted: {} .. {} (n={}, interpolated={})",
            m.first_period, m.last_period, m.n_obs, m.n_interpolated
        );
        let _ = writeln!(
            out,
            "- optimizer: {} grid={} iters={} evals={} converged={}",
            m.optimizer.method, m.optimizer.grid_points, m.optimizer.iterations, m.optimizer.evaluations, m.optimizer.converged
        );
        let _ = writeln!(out, "\n| period | forecast |");
        let _ = writeln!(out, "| - | - |");
        for p in &fc.points {
            let _ = writeln!(out, "| {} | {:.3} |", p.period, p.value);
        }
    }

    out
}
