//! Least squares solver.
//!
//! The forecast engine estimates its starting level, trend and seasonal
//! effects by regressing the first two seasonal cycles on:
//!
//! ```text
//! y_t = a + b·t + s_{t mod m} + ε_t,   Σ s_j = 0
//! ```
//!
//! Implementation choices:
//! - We solve with SVD so tall design matrices (more rows than columns) are fine.
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - The system is tiny (24 × 13 for monthly data), so SVD cost is irrelevant.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Fit `y_t = a + b·t + s_{t mod m}` with sum-to-zero seasonal effects.
///
/// Returns `(a, b, s)` where `s.len() == m`. Requires `y.len() >= m + 1`
/// and `m >= 2`.
pub fn fit_trend_with_seasonal_effects(y: &[f64], m: usize) -> Option<(f64, f64, Vec<f64>)> {
    let n = y.len();
    if m < 2 || n < m + 1 {
        return None;
    }

    // Columns: intercept, time, then m-1 effect-coded season columns.
    let cols = m + 1;
    let mut x = DMatrix::<f64>::zeros(n, cols);
    for t in 0..n {
        x[(t, 0)] = 1.0;
        x[(t, 1)] = t as f64;
        let season = t % m;
        if season == m - 1 {
            for j in 0..m - 1 {
                x[(t, 2 + j)] = -1.0;
            }
        } else {
            x[(t, 2 + season)] = 1.0;
        }
    }
    let yv = DVector::from_column_slice(y);

    let coef = solve_least_squares(&x, &yv)?;
    let mut seasonal: Vec<f64> = (0..m - 1).map(|j| coef[2 + j]).collect();
    let last = -seasonal.iter().sum::<f64>();
    seasonal.push(last);

    Some((coef[0], coef[1], seasonal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn recovers_trend_and_seasonal_effects() {
        let effects = [5.0, -2.0, -3.0, 0.0];
        let y: Vec<f64> = (0..8).map(|t| 100.0 + 1.5 * t as f64 + effects[t % 4]).collect();

        let (a, b, s) = fit_trend_with_seasonal_effects(&y, 4).unwrap();
        assert!((a - 100.0).abs() < 1e-8);
        assert!((b - 1.5).abs() < 1e-8);
        for (got, want) in s.iter().zip(effects.iter()) {
            assert!((got - want).abs() < 1e-8, "{got} vs {want}");
        }
    }
}
