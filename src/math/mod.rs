//! Mathematical utilities: least squares and gap interpolation.

pub mod interpolate;
pub mod ols;

pub use interpolate::*;
pub use ols::*;
