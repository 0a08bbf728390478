//! Plotting: terminal ASCII charts and SVG files.

pub mod ascii;
pub mod chart;

pub use ascii::render_series_plot;
pub use chart::{FORECAST_CHART_FILE, MONTHLY_PANELS_FILE, write_forecast_chart, write_monthly_panels};
