//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - calendar months and vintage identities (`Period`, `VintageId`)
//! - per-vintage observations (`VintageRecord`) and the reconciled series (`CanonicalSeries`)
//! - forecast outputs (`ForecastResult`, `FittedModel`, etc.)
//! - run configuration (`PipelineConfig`)

pub mod types;

pub use types::*;
