//! Smoothing-parameter grid generation.
//!
//! The parameter search starts with a deterministic grid over `(α, β, γ)` and
//! refines the best grid point with Nelder–Mead.
//!
//! Why a grid first?
//! - The SSE surface of Holt-Winters is often multi-modal; a coarse grid keeps
//!   the local search away from poor basins.
//! - It is deterministic given the same inputs.
//! - 729 cheap recursions are negligible next to I/O.

use crate::domain::SmoothingParams;
use crate::error::ModelFitError;

/// Default grid resolution per parameter.
pub const GRID_STEPS: usize = 9;
/// Grid bounds; the refinement stage may still move to the box edges.
pub const GRID_MIN: f64 = 0.05;
pub const GRID_MAX: f64 = 0.95;

/// Generate `steps` evenly spaced points between `min` and `max` (inclusive).
pub fn lin_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, ModelFitError> {
    if !(min.is_finite() && max.is_finite() && max > min) {
        return Err(ModelFitError::InvalidConfig(format!(
            "invalid grid range: min={min}, max={max} (must be finite and max>min)"
        )));
    }
    if steps < 2 {
        return Err(ModelFitError::InvalidConfig("grid steps must be >= 2".to_string()));
    }

    let step = (max - min) / (steps as f64 - 1.0);
    Ok((0..steps).map(|i| min + step * i as f64).collect())
}

/// Full `(α, β, γ)` cube in lexicographic order (α outermost).
pub fn smoothing_grid(min: f64, max: f64, steps: usize) -> Result<Vec<SmoothingParams>, ModelFitError> {
    let values = lin_space(min, max, steps)?;
    let mut out = Vec::with_capacity(values.len().pow(3));
    for &alpha in &values {
        for &beta in &values {
            for &gamma in &values {
                out.push(SmoothingParams { alpha, beta, gamma });
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lin_space_includes_endpoints() {
        let v = lin_space(0.05, 0.95, GRID_STEPS).unwrap();
        assert_eq!(v.len(), 9);
        assert!((v[0] - 0.05).abs() < 1e-12);
        assert!((v[v.len() - 1] - 0.95).abs() < 1e-12);
    }

    #[test]
    fn grid_is_a_full_cube() {
        let grid = smoothing_grid(GRID_MIN, GRID_MAX, 3).unwrap();
        assert_eq!(grid.len(), 27);
        assert!(grid.iter().all(|p| (0.0..=1.0).contains(&p.alpha)
            && (0.0..=1.0).contains(&p.beta)
            && (0.0..=1.0).contains(&p.gamma)));
    }

    #[test]
    fn rejects_degenerate_ranges() {
        assert!(lin_space(0.5, 0.5, 3).is_err());
        assert!(lin_space(0.0, 1.0, 1).is_err());
    }
}
