//! Data sources: the statistics portal, the local vintage store, and a seeded
//! synthetic generator for offline runs.

pub mod ons;
pub mod store;
pub mod synthetic;

pub use ons::{FetchPlan, FetchSummary, OnsClient};
pub use store::{load_vintages, save_vintages};
pub use synthetic::{SynthConfig, generate_vintages};
