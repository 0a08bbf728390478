//! Canonical series and forecast CSV files.
//!
//! Both files are meant to be easy to consume in spreadsheets or downstream
//! scripts:
//!
//! - `cleaned_monthly_series.csv`: `Period` (`YYYY MON`), `Vacancies` (blank for gaps)
//! - `forecasting.csv`: `Period` (first-of-month date), `Predicted Vacancies` (integer)

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{CanonicalSeries, ForecastPoint, ForecastResult, Period};
use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
struct CanonicalRow {
    #[serde(rename = "Period")]
    period: Period,
    #[serde(rename = "Vacancies")]
    vacancies: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ForecastRow {
    #[serde(rename = "Period")]
    period: NaiveDate,
    #[serde(rename = "Predicted Vacancies")]
    predicted: i64,
}

/// Write the canonical series (gaps as blank cells).
pub fn write_canonical_csv(path: &Path, series: &CanonicalSeries) -> Result<(), AppError> {
    write_atomically(path, |writer| {
        for (period, point) in series.iter() {
            writer.serialize(CanonicalRow {
                period,
                vacancies: point.value,
            })?;
        }
        Ok(())
    })
}

/// Read a canonical series CSV written by [`write_canonical_csv`].
///
/// Provenance is not stored in the file, so the returned points carry none.
pub fn read_canonical_csv(path: &Path) -> Result<CanonicalSeries, AppError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to open series CSV '{}': {e}", path.display())))?;

    let mut values = Vec::new();
    for (idx, row) in reader.deserialize::<CanonicalRow>().enumerate() {
        let row = row.map_err(|e| {
            AppError::new(
                2,
                format!("Invalid series CSV '{}' at row {}: {e}", path.display(), idx + 2),
            )
        })?;
        values.push((row.period, row.vacancies));
    }
    Ok(CanonicalSeries::from_values(values))
}

/// Write the forecast with values rounded to whole vacancies.
pub fn write_forecast_csv(path: &Path, forecast: &ForecastResult) -> Result<(), AppError> {
    write_atomically(path, |writer| {
        for point in &forecast.points {
            writer.serialize(ForecastRow {
                period: point.period.first_day(),
                predicted: point.rounded(),
            })?;
        }
        Ok(())
    })
}

/// Read a forecast CSV written by [`write_forecast_csv`].
pub fn read_forecast_csv(path: &Path) -> Result<Vec<ForecastPoint>, AppError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to open forecast CSV '{}': {e}", path.display())))?;

    let mut out = Vec::new();
    for (idx, row) in reader.deserialize::<ForecastRow>().enumerate() {
        let row = row.map_err(|e| {
            AppError::new(
                2,
                format!("Invalid forecast CSV '{}' at row {}: {e}", path.display(), idx + 2),
            )
        })?;
        out.push(ForecastPoint {
            period: Period::from_date(row.period),
            value: row.predicted as f64,
        });
    }
    Ok(out)
}

fn write_atomically<F>(path: &Path, fill: F) -> Result<(), AppError>
where
    F: FnOnce(&mut csv::Writer<fs::File>) -> Result<(), csv::Error>,
{
    super::write_replacing(path, |file| {
        let mut writer = csv::Writer::from_writer(file);
        fill(&mut writer)?;
        writer.flush()?;
        Ok::<(), csv::Error>(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ComponentState, FittedModel, OptimizerReport, SmoothingParams};
    use pretty_assertions::assert_eq;

    fn p(label: &str) -> Period {
        Period::parse_label(label).unwrap()
    }

    #[test]
    fn canonical_csv_keeps_gaps_blank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaned_monthly_series.csv");
        let series = CanonicalSeries::from_values([
            (p("2020 JAN"), Some(800.0)),
            (p("2020 FEB"), None),
            (p("2020 MAR"), Some(45.2)),
        ]);

        write_canonical_csv(&path, &series).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Period,Vacancies\n2020 JAN,800.0\n2020 FEB,\n2020 MAR,45.2\n");

        let back = read_canonical_csv(&path).unwrap();
        assert_eq!(back, series);
    }

    #[test]
    fn forecast_csv_uses_dates_and_integers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("forecasting.csv");
        let forecast = ForecastResult {
            points: vec![
                ForecastPoint {
                    period: p("2024 JAN"),
                    value: 801.4,
                },
                ForecastPoint {
                    period: p("2024 FEB"),
                    value: 799.6,
                },
            ],
            model: FittedModel {
                seasonal_period: 12,
                params: SmoothingParams {
                    alpha: 0.5,
                    beta: 0.1,
                    gamma: 0.2,
                },
                initial: ComponentState {
                    level: 0.0,
                    trend: 0.0,
                    seasonal: vec![0.0; 12],
                },
                final_state: ComponentState {
                    level: 0.0,
                    trend: 0.0,
                    seasonal: vec![0.0; 12],
                },
                sse: 0.0,
                rmse: 0.0,
                n_obs: 24,
                n_interpolated: 0,
                first_period: p("2022 JAN"),
                last_period: p("2023 DEC"),
                optimizer: OptimizerReport {
                    method: "test".to_string(),
                    grid_points: 0,
                    grid_best_sse: 0.0,
                    iterations: 0,
                    evaluations: 0,
                    converged: true,
                },
            },
        };

        write_forecast_csv(&path, &forecast).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "Period,Predicted Vacancies\n2024-01-01,801\n2024-02-01,800\n"
        );
        assert!(!crate::io::temp_path(&path).exists());

        let back = read_forecast_csv(&path).unwrap();
        assert_eq!(back[1].period, p("2024 FEB"));
        assert_eq!(back[1].value, 800.0);
    }

    #[test]
    fn malformed_series_csv_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "Period,Vacancies\n2020 Q1,10\n").unwrap();
        let err = read_canonical_csv(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
