//! `vacancy-vintages` library crate.
//!
//! The binary (`vacancy`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the parser, reconciler and forecast engine are reusable on their own
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod debug;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod reconcile;
pub mod report;
