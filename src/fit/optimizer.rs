//! Bounded Nelder–Mead minimisation on the unit cube.
//!
//! Box constraints are handled by projection: every trial point (reflection,
//! expansion, contraction, shrink) is clamped to the box before it is
//! evaluated or stored, so the simplex never leaves `[0, 1]³`.
//!
//! Clamping can flatten the simplex onto a face or edge of the box, after
//! which it cannot move back inside. The search therefore runs one pass per
//! entry of `initial_steps`, each restarting from the best point so far with a
//! fresh simplex of that size.
//!
//! Pinned settings (changing any of them changes forecasts):
//! - reflection 1, expansion 2, contraction 0.5, shrink 0.5
//! - passes with initial steps 0.1, 0.01, 0.001: start point plus the step
//!   along each axis (stepping inward when that would cross the upper bound)
//! - a pass converges when the objective spread across the simplex is at most
//!   `f_tol · (|f_best| + 1e-12)` or the simplex diameter is at most `x_tol`
//! - each pass is bounded by `max_iters`; a pass that hits the bound ends the
//!   search unconverged

use nalgebra::Vector3;

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct NelderMeadOptions {
    /// Iteration bound per pass.
    pub max_iters: usize,
    /// Initial simplex size of each pass, in order.
    pub initial_steps: Vec<f64>,
    pub f_tol: f64,
    pub x_tol: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            initial_steps: vec![0.1, 0.01, 0.001],
            f_tol: 1e-10,
            x_tol: 1e-9,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Minimum {
    pub x: Vector3<f64>,
    pub f: f64,
    /// Iterations summed over all passes.
    pub iterations: usize,
    pub evaluations: usize,
    pub converged: bool,
}

/// Minimise `f` over `[0, 1]³` starting from `start`.
///
/// Non-finite objective values are treated as `+∞` so the simplex moves away
/// from them.
pub fn minimize<F>(f: F, start: Vector3<f64>, opts: &NelderMeadOptions) -> Minimum
where
    F: Fn(&Vector3<f64>) -> f64,
{
    let mut evaluations = 0usize;
    let mut eval = |x: &Vector3<f64>| {
        evaluations += 1;
        let v = f(x);
        if v.is_finite() { v } else { f64::INFINITY }
    };

    let mut best = project(&start);
    let mut f_best = f64::INFINITY;
    let mut iterations = 0usize;
    let mut converged = false;

    for &step in &opts.initial_steps {
        let pass = simplex_pass(&mut eval, best, step, opts);
        iterations += pass.iterations;
        converged = pass.converged;
        // Ties keep the earlier point.
        if pass.f < f_best {
            best = pass.x;
            f_best = pass.f;
        }
        if !converged {
            break;
        }
    }

    Minimum {
        x: best,
        f: f_best,
        iterations,
        evaluations,
        converged,
    }
}

struct Pass {
    x: Vector3<f64>,
    f: f64,
    iterations: usize,
    converged: bool,
}

fn simplex_pass(
    eval: &mut impl FnMut(&Vector3<f64>) -> f64,
    start: Vector3<f64>,
    step: f64,
    opts: &NelderMeadOptions,
) -> Pass {
    let mut simplex: Vec<(Vector3<f64>, f64)> = Vec::with_capacity(4);
    simplex.push((start, eval(&start)));
    for axis in 0..3 {
        let mut x = start;
        x[axis] = if start[axis] + step <= 1.0 {
            start[axis] + step
        } else {
            start[axis] - step
        };
        let x = project(&x);
        let fx = eval(&x);
        simplex.push((x, fx));
    }

    let mut iterations = 0usize;
    let mut converged = false;

    while iterations < opts.max_iters {
        // Stable sort keeps ties in insertion order, so runs are reproducible.
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        let f_best = simplex[0].1;
        let f_worst = simplex[3].1;
        let spread = f_worst - f_best;
        let diameter = simplex[1..]
            .iter()
            .map(|(x, _)| (x - simplex[0].0).norm())
            .fold(0.0, f64::max);
        if (spread.is_finite() && spread <= opts.f_tol * (f_best.abs() + 1e-12)) || diameter <= opts.x_tol {
            converged = true;
            break;
        }

        iterations += 1;

        let centroid = (simplex[0].0 + simplex[1].0 + simplex[2].0) / 3.0;
        let (worst, f_w) = simplex[3];

        let reflected = project(&(centroid + (centroid - worst) * REFLECT));
        let f_r = eval(&reflected);

        if f_r < simplex[0].1 {
            let expanded = project(&(centroid + (reflected - centroid) * EXPAND));
            let f_e = eval(&expanded);
            simplex[3] = if f_e < f_r { (expanded, f_e) } else { (reflected, f_r) };
            continue;
        }
        if f_r < simplex[2].1 {
            simplex[3] = (reflected, f_r);
            continue;
        }

        let contracted = if f_r < f_w {
            project(&(centroid + (reflected - centroid) * CONTRACT))
        } else {
            project(&(centroid + (worst - centroid) * CONTRACT))
        };
        let f_c = eval(&contracted);
        if f_c < f_r.min(f_w) {
            simplex[3] = (contracted, f_c);
            continue;
        }

        let best = simplex[0].0;
        for vertex in simplex.iter_mut().skip(1) {
            let x = project(&(best + (vertex.0 - best) * SHRINK));
            vertex.1 = eval(&x);
            vertex.0 = x;
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (x, f) = simplex[0];
    Pass {
        x,
        f,
        iterations,
        converged,
    }
}

fn project(x: &Vector3<f64>) -> Vector3<f64> {
    x.map(|v| v.clamp(0.0, 1.0))
}
