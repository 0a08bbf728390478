//! Additive Holt-Winters (triple exponential smoothing).
//!
//! Error-correction form, with `m` the season length:
//!
//! ```text
//! ŷ_t = l_{t-1} + b_{t-1} + s_{t-m}
//! l_t = α (y_t − s_{t-m}) + (1 − α)(l_{t-1} + b_{t-1})
//! b_t = β (l_t − l_{t-1}) + (1 − β) b_{t-1}
//! s_t = γ (y_t − l_t) + (1 − γ) s_{t-m}
//! ```
//!
//! Forecasts extrapolate `l_n + h·b_n + s_{n+h-m}`.
//!
//! These are small, pure functions so the parameter search can call them many
//! thousands of times without allocation.

use crate::domain::{ComponentState, SmoothingParams};
use crate::math::fit_trend_with_seasonal_effects;

/// Estimate the state before the first observation from the first two cycles.
///
/// The regression `y_t = a + b·t + s_{t mod m}` is evaluated one step before
/// `t = 0`, so the first one-step prediction equals `a + s_0`.
pub fn initial_state(y: &[f64], m: usize) -> Option<ComponentState> {
    let window = y.get(..2 * m)?;
    let (a, b, seasonal) = fit_trend_with_seasonal_effects(window, m)?;
    Some(ComponentState {
        level: a - b,
        trend: b,
        seasonal,
    })
}

/// Sum of squared one-step-ahead residuals.
pub fn sse(y: &[f64], params: SmoothingParams, init: &ComponentState) -> f64 {
    let mut state = init.clone();
    run(y, params, &mut state, |_, _| {})
}

/// Run the recursion and return `(sse, final_state, one_step_predictions)`.
pub fn smooth(y: &[f64], params: SmoothingParams, init: &ComponentState) -> (f64, ComponentState, Vec<f64>) {
    let mut state = init.clone();
    let mut fitted = Vec::with_capacity(y.len());
    let sse = run(y, params, &mut state, |_, pred| fitted.push(pred));
    (sse, state, fitted)
}

/// Extrapolate `horizon` steps from the state reached after `n_obs` observations.
pub fn forecast(state: &ComponentState, n_obs: usize, horizon: usize) -> Vec<f64> {
    let m = state.seasonal.len();
    (1..=horizon)
        .map(|h| {
            let season = (n_obs + h - 1) % m;
            state.level + h as f64 * state.trend + state.seasonal[season]
        })
        .collect()
}

fn run(
    y: &[f64],
    params: SmoothingParams,
    state: &mut ComponentState,
    mut on_prediction: impl FnMut(usize, f64),
) -> f64 {
    let SmoothingParams { alpha, beta, gamma } = params;
    let m = state.seasonal.len();
    let mut sse = 0.0;

    for (t, &obs) in y.iter().enumerate() {
        let season = t % m;
        let prev_level = state.level;
        let prev_seasonal = state.seasonal[season];

        let pred = prev_level + state.trend + prev_seasonal;
        on_prediction(t, pred);
        let r = obs - pred;
        sse += r * r;

        state.level = alpha * (obs - prev_seasonal) + (1.0 - alpha) * (prev_level + state.trend);
        state.trend = beta * (state.level - prev_level) + (1.0 - beta) * state.trend;
        state.seasonal[season] = gamma * (obs - state.level) + (1.0 - gamma) * prev_seasonal;
    }

    sse
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seasonal_line(n: usize) -> Vec<f64> {
        let effects = [10.0, 4.0, -2.0, -12.0];
        (0..n).map(|t| 50.0 + 0.5 * t as f64 + effects[t % 4]).collect()
    }

    #[test]
    fn exact_initial_state_gives_zero_error() {
        let y = seasonal_line(16);
        let init = initial_state(&y, 4).unwrap();
        let params = SmoothingParams {
            alpha: 0.4,
            beta: 0.2,
            gamma: 0.3,
        };
        assert!(sse(&y, params, &init) < 1e-12);

        let (s, state, fitted) = smooth(&y, params, &init);
        assert!(s < 1e-12);
        assert_eq!(fitted.len(), y.len());
        assert!((state.trend - 0.5).abs() < 1e-9);
    }

    #[test]
    fn forecast_continues_the_pattern() {
        let y = seasonal_line(16);
        let init = initial_state(&y, 4).unwrap();
        let params = SmoothingParams {
            alpha: 0.5,
            beta: 0.1,
            gamma: 0.1,
        };
        let (_, state, _) = smooth(&y, params, &init);
        let ahead = forecast(&state, y.len(), 6);
        let truth = seasonal_line(22);
        for (h, v) in ahead.iter().enumerate() {
            assert!((v - truth[16 + h]).abs() < 1e-8, "h={h}: {v} vs {}", truth[16 + h]);
        }
    }

    #[test]
    fn initial_state_needs_two_cycles() {
        assert!(initial_state(&[1.0; 7], 4).is_none());
    }
}
