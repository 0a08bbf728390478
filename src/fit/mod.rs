//! Model fitting orchestration.
//!
//! Responsibilities:
//!
//! - generate the smoothing-parameter grid
//! - evaluate every grid candidate (parallel) and refine the best one
//! - produce the fitted model plus the forecast horizon

pub mod fitter;
pub mod optimizer;
pub mod param_grid;

pub use fitter::*;
pub use optimizer::*;
pub use param_grid::*;
