//! Forecast engine: fit Holt-Winters to the canonical series and extrapolate.
//!
//! Given the canonical series we:
//! - lay it on a contiguous monthly grid (missing months become gaps)
//! - check the preconditions (anchored ends, two full seasons, not constant)
//! - fill interior gaps by linear interpolation (local copy only)
//! - estimate the initial state by regression on the first two seasons
//! - search `(α, β, γ)`: parallel grid, then bounded Nelder–Mead
//! - extrapolate `horizon` months from the last observed month
//!
//! Everything is deterministic: the grid is evaluated in parallel but the
//! winner is chosen by `(sse, grid index)`, and Nelder–Mead has no randomness.

use nalgebra::Vector3;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::{
    CanonicalSeries, FittedModel, ForecastConfig, ForecastPoint, ForecastResult, OptimizerReport, Period,
    SmoothingParams,
};
use crate::error::ModelFitError;
use crate::fit::optimizer::{NelderMeadOptions, minimize};
use crate::fit::param_grid::{GRID_MAX, GRID_MIN, GRID_STEPS, smoothing_grid};
use crate::math::interpolate_linear;
use crate::models::{forecast, initial_state, smooth, sse};

/// Relative spread below which a series counts as constant.
const CONSTANT_TOL: f64 = 1e-9;

/// A canonical series laid out on an unbroken monthly grid.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyGrid {
    pub start: Period,
    pub values: Vec<Option<f64>>,
}

impl MonthlyGrid {
    pub fn from_series(series: &CanonicalSeries) -> Option<Self> {
        let start = series.first_period()?;
        let end = series.last_period()?;
        let len = start.months_until(end) as usize + 1;
        let values = (0..len)
            .map(|i| series.value(start.offset(i as i64)))
            .collect();
        Some(Self { start, values })
    }

    pub fn end(&self) -> Period {
        self.start.offset(self.values.len() as i64 - 1)
    }

    pub fn observed(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Fit the model and forecast `config.horizon` months past the series end.
pub fn fit_and_forecast(series: &CanonicalSeries, config: &ForecastConfig) -> Result<ForecastResult, ModelFitError> {
    let m = config.seasonal_period;
    if m < 2 {
        return Err(ModelFitError::InvalidConfig(format!(
            "seasonal period must be >= 2 (got {m})"
        )));
    }
    if config.horizon == 0 {
        return Err(ModelFitError::InvalidConfig("horizon must be >= 1".to_string()));
    }

    let grid = MonthlyGrid::from_series(series).ok_or(ModelFitError::EmptySeries)?;

    let required = 2 * m;
    let observed = grid.observed();
    if observed < required {
        return Err(ModelFitError::InsufficientHistory {
            required,
            actual: observed,
        });
    }
    if grid.values.first().copied().flatten().is_none() {
        return Err(ModelFitError::MissingBoundaryValue { period: grid.start });
    }
    if grid.values.last().copied().flatten().is_none() {
        return Err(ModelFitError::MissingBoundaryValue { period: grid.end() });
    }

    let (y, n_interpolated) =
        interpolate_linear(&grid.values).ok_or(ModelFitError::MissingBoundaryValue { period: grid.start })?;
    if n_interpolated > 0 {
        debug!(n_interpolated, "filled interior gaps by linear interpolation");
    }

    ensure_not_constant(&y)?;

    let init = initial_state(&y, m).ok_or(ModelFitError::InitialState)?;

    // 1) Coarse grid.
    let candidates = smoothing_grid(GRID_MIN, GRID_MAX, GRID_STEPS)?;
    let scores: Vec<f64> = candidates.par_iter().map(|&p| sse(&y, p, &init)).collect();
    let (best_idx, grid_best_sse) = scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, s)| s.is_finite())
        // Deterministic selection: minimum SSE, ties broken by grid index.
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
        .ok_or(ModelFitError::NonFinite("grid search"))?;
    let start = candidates[best_idx];

    // 2) Local refinement.
    let opts = NelderMeadOptions::default();
    let objective = |x: &Vector3<f64>| sse(&y, to_params(x), &init);
    let minimum = minimize(objective, Vector3::new(start.alpha, start.beta, start.gamma), &opts);
    if !minimum.converged {
        return Err(ModelFitError::NonConvergence {
            iterations: minimum.iterations,
        });
    }
    if !minimum.f.is_finite() {
        return Err(ModelFitError::NonFinite("objective"));
    }
    let params = to_params(&minimum.x);

    // 3) Final pass at the chosen parameters.
    let (fit_sse, final_state, _) = smooth(&y, params, &init);
    let values = forecast(&final_state, y.len(), config.horizon);
    if !values.iter().all(|v| v.is_finite()) {
        return Err(ModelFitError::NonFinite("forecast"));
    }

    let last = grid.end();
    let points = values
        .into_iter()
        .enumerate()
        .map(|(i, value)| ForecastPoint {
            period: last.offset(i as i64 + 1),
            value,
        })
        .collect();

    info!(
        alpha = params.alpha,
        beta = params.beta,
        gamma = params.gamma,
        sse = fit_sse,
        iterations = minimum.iterations,
        "fitted Holt-Winters model"
    );

    Ok(ForecastResult {
        points,
        model: FittedModel {
            seasonal_period: m,
            params,
            initial: init,
            final_state,
            sse: fit_sse,
            rmse: (fit_sse / y.len() as f64).sqrt(),
            n_obs: y.len(),
            n_interpolated,
            first_period: grid.start,
            last_period: last,
            optimizer: OptimizerReport {
                method: "grid+nelder-mead".to_string(),
                grid_points: candidates.len(),
                grid_best_sse,
                iterations: minimum.iterations,
                evaluations: minimum.evaluations,
                converged: minimum.converged,
            },
        },
    })
}

fn to_params(x: &Vector3<f64>) -> SmoothingParams {
    SmoothingParams {
        alpha: x[0].clamp(0.0, 1.0),
        beta: x[1].clamp(0.0, 1.0),
        gamma: x[2].clamp(0.0, 1.0),
    }
}

fn ensure_not_constant(y: &[f64]) -> Result<(), ModelFitError> {
    let (min, max) = y
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let scale = min.abs().max(max.abs()).max(1.0);
    if (max - min) <= CONSTANT_TOL * scale {
        return Err(ModelFitError::ConstantSeries);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn p(label: &str) -> Period {
        Period::parse_label(label).unwrap()
    }

    fn series_from(start: Period, values: &[f64]) -> CanonicalSeries {
        CanonicalSeries::from_values(
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| (start.offset(i as i64), Some(v))),
        )
    }

    fn truth(t: usize) -> f64 {
        let t = t as f64;
        700.0 + 1.5 * t + 40.0 * (2.0 * PI * t / 12.0).sin()
    }

    fn noisy(n: usize) -> Vec<f64> {
        // Deterministic wiggle that is not seasonal-periodic.
        (0..n).map(|t| truth(t) + 3.0 * (t as f64 * 1.7).sin()).collect()
    }

    #[test]
    fn horizon_covers_the_next_24_months() {
        let start = p("2021 JAN");
        let series = series_from(start, &noisy(36));
        assert_eq!(series.last_period(), Some(p("2023 DEC")));

        let result = fit_and_forecast(&series, &ForecastConfig::default()).unwrap();
        assert_eq!(result.points.len(), 24);
        assert_eq!(result.points[0].period, p("2024 JAN"));
        assert_eq!(result.points[23].period, p("2025 DEC"));
        for pair in result.points.windows(2) {
            assert_eq!(pair[0].period.succ(), pair[1].period);
        }
    }

    #[test]
    fn tracks_a_trending_seasonal_series() {
        let n = 72;
        let series = series_from(p("2015 JAN"), &noisy(n));
        let result = fit_and_forecast(&series, &ForecastConfig::default()).unwrap();

        let m = &result.model;
        assert!(m.optimizer.converged);
        assert!(m.sse <= m.optimizer.grid_best_sse + 1e-9);
        for v in [m.params.alpha, m.params.beta, m.params.gamma] {
            assert!((0.0..=1.0).contains(&v));
        }
        for (h, point) in result.points.iter().enumerate() {
            let expected = truth(n + h);
            assert!(
                (point.value - expected).abs() < 25.0,
                "h={h}: forecast {} vs truth {expected}",
                point.value
            );
        }
    }

    #[test]
    fn fewer_than_two_seasons_fails() {
        let series = series_from(p("2020 JAN"), &noisy(23));
        let err = fit_and_forecast(&series, &ForecastConfig::default()).unwrap_err();
        assert_eq!(
            err,
            ModelFitError::InsufficientHistory {
                required: 24,
                actual: 23
            }
        );
    }

    #[test]
    fn constant_series_fails() {
        let series = series_from(p("2020 JAN"), &[500.0; 36]);
        let err = fit_and_forecast(&series, &ForecastConfig::default()).unwrap_err();
        assert_eq!(err, ModelFitError::ConstantSeries);
    }

    #[test]
    fn interior_gaps_are_interpolated_locally() {
        let start = p("2018 JAN");
        let mut values: Vec<(Period, Option<f64>)> = noisy(48)
            .into_iter()
            .enumerate()
            .map(|(i, v)| (start.offset(i as i64), Some(v)))
            .collect();
        // One explicit gap and one month missing altogether.
        values[10].1 = None;
        values.remove(20);
        let series = CanonicalSeries::from_values(values);

        let result = fit_and_forecast(&series, &ForecastConfig::default()).unwrap();
        assert_eq!(result.model.n_obs, 48);
        assert_eq!(result.model.n_interpolated, 2);
        // The caller's series is untouched.
        assert_eq!(series.get(start.offset(10)).unwrap().value, None);
        assert!(series.get(start.offset(20)).is_none());
    }

    #[test]
    fn trailing_gap_is_rejected() {
        let start = p("2018 JAN");
        let mut values: Vec<(Period, Option<f64>)> = noisy(30)
            .into_iter()
            .enumerate()
            .map(|(i, v)| (start.offset(i as i64), Some(v)))
            .collect();
        values.push((start.offset(30), None));
        let series = CanonicalSeries::from_values(values);

        let err = fit_and_forecast(&series, &ForecastConfig::default()).unwrap_err();
        assert_eq!(err, ModelFitError::MissingBoundaryValue { period: start.offset(30) });
    }

    #[test]
    fn refitting_is_reproducible() {
        let series = series_from(p("2016 JAN"), &noisy(60));
        let a = fit_and_forecast(&series, &ForecastConfig::default()).unwrap();
        let b = fit_and_forecast(&series, &ForecastConfig::default()).unwrap();
        for (x, y) in a.points.iter().zip(b.points.iter()) {
            assert!((x.value - y.value).abs() < 0.5);
            assert_eq!(x.rounded(), y.rounded());
        }
    }

    /// xorshift64*; the stream is fixed independently of the `rand` version.
    struct XorShift(u64);

    impl XorShift {
        fn new(seed: u64) -> Self {
            let x = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(1);
            Self(if x == 0 { 1 } else { x })
        }

        fn unit(&mut self) -> f64 {
            let mut x = self.0;
            x ^= x >> 12;
            x ^= x << 25;
            x ^= x >> 27;
            self.0 = x;
            (x.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 11) as f64 / (1u64 << 53) as f64
        }

        /// Roughly normal, mean 0.
        fn noise(&mut self) -> f64 {
            (0..4).map(|_| self.unit()).sum::<f64>() - 2.0
        }
    }

    fn random_walk_seasonal(seed: u64, n: usize) -> Vec<f64> {
        let mut rng = XorShift::new(seed);
        let mut level = 0.0;
        (0..n)
            .map(|t| {
                level += 6.0 * rng.noise();
                700.0 + level + 40.0 * (2.0 * PI * t as f64 / 12.0).sin() + 4.0 * rng.noise()
            })
            .collect()
    }

    #[test]
    fn beats_a_dense_grid_near_the_trend_edge() {
        // Optimum at a small positive beta with gamma pulled away from 1.
        let y = random_walk_seasonal(37, 96);
        let series = series_from(p("2016 JAN"), &y);
        let result = fit_and_forecast(&series, &ForecastConfig::default()).unwrap();

        let init = initial_state(&y, 12).unwrap();
        let dense = smoothing_grid(0.0, 1.0, 41)
            .unwrap()
            .into_iter()
            .map(|params| sse(&y, params, &init))
            .fold(f64::INFINITY, f64::min);

        let m = &result.model;
        assert!(m.optimizer.converged);
        assert!(m.sse <= dense, "engine sse {} vs dense grid {dense}", m.sse);
        assert!(m.params.beta > 0.0 && m.params.beta < 0.05, "{:?}", m.params);
    }

    #[test]
    fn rejects_bad_config() {
        let series = series_from(p("2016 JAN"), &noisy(60));
        let cfg = ForecastConfig {
            seasonal_period: 12,
            horizon: 0,
        };
        assert!(matches!(
            fit_and_forecast(&series, &cfg),
            Err(ModelFitError::InvalidConfig(_))
        ));
    }
}
