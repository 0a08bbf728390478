//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the parsing/fitting code stays clean and testable
//! - output changes are localized (snapshot tests below)

use crate::domain::{CanonicalSeries, FittedModel, ForecastPoint};
use crate::io::vintage::ParseReport;
use crate::report::{series_stats, vintage_contributions};

/// Summary of a clean (parse + reconcile) run.
pub fn format_clean_summary(report: &ParseReport, series: &CanonicalSeries) -> String {
    let mut out = String::new();

    out.push_str("=== vacancy - vintage reconciliation ===\n");
    out.push_str(&format!(
        "Vintages: parsed={} skipped={} | monthly records={}\n",
        report.parsed.len(),
        report.failures.len(),
        report.record_count()
    ));
    let undated = report.missing_release_dates();
    if !undated.is_empty() {
        let ids: Vec<String> = undated.iter().map(|id| id.to_string()).collect();
        out.push_str(&format!("Undated (ranked oldest): {}\n", ids.join(", ")));
    }
    for err in &report.failures {
        out.push_str(&format!("  (skipped) {err}\n"));
    }

    if let Some(stats) = series_stats(series) {
        out.push_str(&format!(
            "Series: {} .. {} | periods={} observed={} gaps={} unseen={}\n",
            stats.first, stats.last, stats.periods, stats.observed, stats.gaps, stats.unseen
        ));
        out.push_str(&format!(
            "Values: min={:.0} max={:.0} mean={:.1}\n",
            stats.min, stats.max, stats.mean
        ));
    }

    let contributions = vintage_contributions(series);
    if !contributions.is_empty() {
        out.push_str("\nWinning vintage counts:\n");
        for (id, n) in contributions {
            out.push_str(&format!("  {:<8} {n:>5}\n", id.to_string()));
        }
    }

    out
}

/// Fitted parameters and optimizer diagnostics.
pub fn format_model_summary(model: &FittedModel) -> String {
    let mut out = String::new();

    out.push_str("=== vacancy - Holt-Winters (additive) ===\n");
    out.push_str(&format!(
        "Fitted: {} .. {} | n={} (interpolated {}) | m={}\n",
        model.first_period, model.last_period, model.n_obs, model.n_interpolated, model.seasonal_period
    ));
    out.push_str(&format!(
        "Params: alpha={:.6} beta={:.6} gamma={:.6}\n",
        model.params.alpha, model.params.beta, model.params.gamma
    ));
    out.push_str(&format!("Fit: SSE={:.3} RMSE={:.3}\n", model.sse, model.rmse));
    out.push_str(&format!(
        "Optimizer: {} | grid={} (best SSE={:.3}) | iters={} evals={} converged={}\n",
        model.optimizer.method,
        model.optimizer.grid_points,
        model.optimizer.grid_best_sse,
        model.optimizer.iterations,
        model.optimizer.evaluations,
        model.optimizer.converged
    ));
    out.push_str(&format!(
        "State: level={:.3} trend={:.3} seasonal={}\n",
        model.final_state.level,
        model.final_state.trend,
        fmt_vec(&model.final_state.seasonal)
    ));

    out
}

/// Forecast table (period, rounded value).
pub fn format_forecast_table(points: &[ForecastPoint]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<10} {:>20}\n", "Period", "Predicted Vacancies"));
    out.push_str(&format!("{:-<10} {:-<20}\n", "", ""));
    for p in points {
        out.push_str(&format!("{:<10} {:>20}\n", p.period.first_day(), p.rounded()));
    }
    out
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.2}")).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Period, VintageId};
    use crate::error::ParseError;
    use pretty_assertions::assert_eq;

    fn p(label: &str) -> Period {
        Period::parse_label(label).unwrap()
    }

    #[test]
    fn forecast_table_snapshot() {
        let points = vec![
            ForecastPoint {
                period: p("2024 JAN"),
                value: 912.49,
            },
            ForecastPoint {
                period: p("2024 FEB"),
                value: 907.5,
            },
        ];
        let expected = "\
Period      Predicted Vacancies
---------- --------------------
2024-01-01                  912
2024-02-01                  908
";
        assert_eq!(format_forecast_table(&points), expected);
    }

    #[test]
    fn clean_summary_lists_skipped_vintages() {
        let report = ParseReport {
            parsed: Vec::new(),
            failures: vec![ParseError::MissingTable {
                vintage: VintageId::Numbered(130),
                header_lines: 7,
            }],
        };
        let series = CanonicalSeries::from_values([(p("2020 JAN"), Some(800.0)), (p("2020 FEB"), None)]);
        let text = format_clean_summary(&report, &series);
        assert!(text.contains("parsed=0 skipped=1"));
        assert!(text.contains("v130: no table section"));
        assert!(text.contains("2020 JAN .. 2020 FEB | periods=2 observed=1 gaps=1 unseen=0"));
    }
}
