//! SVG charts rendered with Plotters.
//!
//! - `monthly_vacancies.svg`: one panel per calendar month, value across years
//! - `forecasting_plot.svg`: history line plus the forecast
//!
//! Charts are a convenience: callers log failures and carry on.

use std::error::Error;
use std::path::Path;

use plotters::prelude::*;

use crate::domain::{CanonicalSeries, ForecastPoint, MONTH_ABBREVIATIONS, Period};
use crate::error::AppError;

pub const MONTHLY_PANELS_FILE: &str = "monthly_vacancies.svg";
pub const FORECAST_CHART_FILE: &str = "forecasting_plot.svg";

type DrawResult = Result<(), Box<dyn Error>>;

/// `(year, value)` pairs for each calendar month, January first.
pub fn monthly_panels(series: &CanonicalSeries) -> [Vec<(i32, f64)>; 12] {
    let mut panels: [Vec<(i32, f64)>; 12] = Default::default();
    for (period, value) in series.observations() {
        panels[(period.month() - 1) as usize].push((period.year(), value));
    }
    panels
}

/// Split one panel into runs of consecutive years; a missing year breaks the line.
pub fn year_runs(points: &[(i32, f64)]) -> Vec<&[(i32, f64)]> {
    points.chunk_by(|a, b| b.0 == a.0 + 1).collect()
}

/// Twelve panels (4 rows × 3 columns), one per calendar month.
pub fn write_monthly_panels(path: &Path, series: &CanonicalSeries, size: (u32, u32)) -> Result<(), AppError> {
    draw_monthly_panels(path, series, size)
        .map_err(|e| AppError::new(2, format!("Failed to render '{}': {e}", path.display())))
}

/// History line plus forecast line on one chart.
pub fn write_forecast_chart(
    path: &Path,
    series: &CanonicalSeries,
    forecast: &[ForecastPoint],
    size: (u32, u32),
) -> Result<(), AppError> {
    draw_forecast_chart(path, series, forecast, size)
        .map_err(|e| AppError::new(2, format!("Failed to render '{}': {e}", path.display())))
}

fn draw_monthly_panels(path: &Path, series: &CanonicalSeries, size: (u32, u32)) -> DrawResult {
    let panels = monthly_panels(series);
    let (y0, y1) = padded(series.observations().map(|(_, v)| v)).ok_or("series has no observed values")?;
    let (x0, x1) = padded(panels.iter().flatten().map(|(y, _)| *y as f64)).ok_or("series has no observed values")?;

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled("Job vacancies by calendar month", ("sans-serif", 22))?;

    for (month, (area, points)) in root.split_evenly((4, 3)).iter().zip(panels.iter()).enumerate() {
        let mut chart = ChartBuilder::on(area)
            .caption(MONTH_ABBREVIATIONS[month], ("sans-serif", 16))
            .margin(6)
            .x_label_area_size(22)
            .y_label_area_size(40)
            .build_cartesian_2d(x0..x1, y0..y1)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(4)
            .y_labels(4)
            .x_label_formatter(&|v| format!("{v:.0}"))
            .y_label_formatter(&|v| format!("{v:.0}"))
            .draw()?;

        for run in year_runs(points) {
            chart.draw_series(LineSeries::new(run.iter().map(|&(year, v)| (year as f64, v)), &BLUE))?;
        }
        chart.draw_series(
            points
                .iter()
                .map(|&(year, v)| Circle::new((year as f64, v), 2, BLUE.filled())),
        )?;
    }

    root.present()?;
    Ok(())
}

fn draw_forecast_chart(
    path: &Path,
    series: &CanonicalSeries,
    forecast: &[ForecastPoint],
    size: (u32, u32),
) -> DrawResult {
    let observed: Vec<(Period, f64)> = series.observations().collect();
    let history: Vec<(f64, f64)> = observed
        .iter()
        .map(|(p, v)| (p.as_fractional_year(), *v))
        .collect();
    let mut ahead: Vec<(f64, f64)> = Vec::with_capacity(forecast.len() + 1);
    ahead.extend(history.last().copied());
    ahead.extend(forecast.iter().map(|p| (p.period.as_fractional_year(), p.value)));

    let (x0, x1) = padded(history.iter().chain(ahead.iter()).map(|p| p.0)).ok_or("nothing to plot")?;
    let (y0, y1) = padded(history.iter().chain(ahead.iter()).map(|p| p.1)).ok_or("nothing to plot")?;

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Job vacancies: history and forecast", ("sans-serif", 22))
        .margin(12)
        .x_label_area_size(36)
        .y_label_area_size(56)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .x_desc("Period")
        .y_desc("Vacancies (thousands)")
        .x_label_formatter(&fmt_period)
        .y_label_formatter(&|v| format!("{v:.0}"))
        .draw()?;

    // Gaps in the history break the line.
    for (i, run) in observed.chunk_by(|a, b| a.0.succ() == b.0).enumerate() {
        let drawn = chart.draw_series(LineSeries::new(
            run.iter().map(|(p, v)| (p.as_fractional_year(), *v)),
            &BLUE,
        ))?;
        if i == 0 {
            drawn
                .label("History")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], BLUE));
        }
    }
    chart
        .draw_series(LineSeries::new(ahead.iter().copied(), &RED))?
        .label("Forecast")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], RED));
    chart.draw_series(
        ahead
            .iter()
            .skip(1)
            .map(|&p| Circle::new(p, 2, RED.filled())),
    )?;

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn fmt_period(x: &f64) -> String {
    let months = (x * 12.0).round() as i64;
    let year = months.div_euclid(12) as i32;
    let month = months.rem_euclid(12) as u32 + 1;
    Period::new(year, month).map(|p| p.to_string()).unwrap_or_default()
}

fn padded(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !(lo.is_finite() && hi.is_finite()) {
        return None;
    }
    let pad = ((hi - lo) * 0.05).max(0.5);
    Some((lo - pad, hi + pad))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(label: &str) -> Period {
        Period::parse_label(label).unwrap()
    }

    #[test]
    fn panels_group_by_calendar_month() {
        let series = CanonicalSeries::from_values([
            (p("2019 MAR"), Some(1.0)),
            (p("2020 MAR"), Some(2.0)),
            (p("2020 APR"), None),
            (p("2020 DEC"), Some(3.0)),
        ]);
        let panels = monthly_panels(&series);
        assert_eq!(panels[2], vec![(2019, 1.0), (2020, 2.0)]);
        assert!(panels[3].is_empty());
        assert_eq!(panels[11], vec![(2020, 3.0)]);
    }

    #[test]
    fn missing_years_split_a_panel() {
        let points = [(2016, 1.0), (2017, 2.0), (2019, 3.0), (2020, 4.0), (2022, 5.0)];
        let runs = year_runs(&points);
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0], &points[..2]);
        assert_eq!(runs[1], &points[2..4]);
        assert_eq!(runs[2], &points[4..]);
        assert!(year_runs(&[]).is_empty());
    }

    #[test]
    fn panels_with_gaps_render() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MONTHLY_PANELS_FILE);
        let start = p("2015 JAN");
        // 2017 is missing entirely.
        let series = CanonicalSeries::from_values(
            (0..72)
                .filter(|i| !(24..36).contains(i))
                .map(|i| (start.offset(i), Some(700.0 + i as f64))),
        );

        write_monthly_panels(&path, &series, (900, 1000)).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"));
    }

    #[test]
    fn period_axis_labels() {
        assert_eq!(fmt_period(&p("2024 JUL").as_fractional_year()), "2024 JUL");
    }

    #[test]
    fn forecast_chart_writes_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FORECAST_CHART_FILE);
        let start = p("2020 JAN");
        let series = CanonicalSeries::from_values((0..24).map(|i| (start.offset(i), Some(700.0 + i as f64))));
        let forecast = [ForecastPoint {
            period: start.offset(24),
            value: 725.0,
        }];

        write_forecast_chart(&path, &series, &forecast, (800, 480)).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"));
    }
}
