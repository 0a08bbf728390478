//! Command-line parsing for the vacancy vintage pipeline.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the parsing/reconciliation/forecasting code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::data::{FetchPlan, SynthConfig};
use crate::domain::Period;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "vacancy", version, about = "Vacancy vintage reconciliation and Holt-Winters forecasting")]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Full pipeline: fetch, clean, plot, forecast.
    Run(RunArgs),
    /// Download the latest vintages from the statistics portal.
    Fetch(FetchArgs),
    /// Parse and reconcile vintages into the canonical monthly series.
    Clean(CleanArgs),
    /// Fit Holt-Winters to the canonical series and write the forecast.
    Forecast(ForecastArgs),
    /// Render charts from the canonical series (and forecast, if present).
    Plot(PlotArgs),
    /// Write seeded synthetic vintage files for offline runs.
    Synth(SynthArgs),
}

/// Where inputs and outputs live.
#[derive(Debug, Args, Clone)]
pub struct DirArgs {
    /// Directory holding vintage files and derived CSVs.
    #[arg(long, env = "VACANCY_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory for SVG charts.
    #[arg(long, env = "VACANCY_PLOTS_DIR", default_value = "plots")]
    pub plots_dir: PathBuf,
}

/// Which vintages to download.
#[derive(Debug, Args, Clone)]
pub struct FetchPlanArgs {
    /// Highest vintage number to probe when detecting the latest release.
    #[arg(long, default_value_t = 200)]
    pub probe_start: u32,

    /// Lowest vintage accepted as "latest".
    #[arg(long, default_value_t = 117)]
    pub floor: u32,

    /// Number of vintages before the latest to download.
    #[arg(long, default_value_t = 24)]
    pub window: u32,
}

impl FetchPlanArgs {
    pub fn plan(&self) -> FetchPlan {
        FetchPlan {
            probe_start: self.probe_start,
            floor: self.floor,
            window: self.window,
        }
    }
}

/// Forecast and terminal output options.
#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Months to forecast past the last observed month.
    #[arg(long, default_value_t = 24)]
    pub horizon: usize,

    /// Export the fitted model + forecast to JSON.
    #[arg(long = "export-model")]
    pub export_model: Option<PathBuf>,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub dirs: DirArgs,

    #[command(flatten)]
    pub fetch: FetchPlanArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Skip the download step and use the vintage files already on disk.
    #[arg(long)]
    pub offline: bool,

    /// Write a provenance bundle into `debug/`.
    #[arg(long)]
    pub debug: bool,
}

#[derive(Debug, Args, Clone)]
pub struct FetchArgs {
    #[command(flatten)]
    pub dirs: DirArgs,

    #[command(flatten)]
    pub fetch: FetchPlanArgs,
}

#[derive(Debug, Args, Clone)]
pub struct CleanArgs {
    #[command(flatten)]
    pub dirs: DirArgs,

    /// Write a provenance bundle into `debug/`.
    #[arg(long)]
    pub debug: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ForecastArgs {
    #[command(flatten)]
    pub dirs: DirArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    #[command(flatten)]
    pub dirs: DirArgs,

    /// Take the forecast from a model JSON (`--export-model`) instead of the forecast CSV.
    #[arg(long, value_name = "JSON")]
    pub model: Option<PathBuf>,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    #[command(flatten)]
    pub dirs: DirArgs,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// First month of every vintage (`YYYY MON`).
    #[arg(long, default_value = "2015 JAN")]
    pub start: Period,

    /// Months covered by the oldest vintage.
    #[arg(long, default_value_t = 96)]
    pub months: usize,

    /// Number of numbered vintages (a `latest` file is added on top).
    #[arg(long, default_value_t = 25)]
    pub vintages: u32,

    /// Number of the oldest generated vintage.
    #[arg(long, default_value_t = 117)]
    pub first_vintage: u32,
}

impl SynthArgs {
    pub fn config(&self) -> SynthConfig {
        SynthConfig {
            seed: self.seed,
            start: self.start,
            base_months: self.months,
            vintages: self.vintages,
            first_vintage: self.first_vintage,
            ..SynthConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults() {
        let cli = Cli::try_parse_from(["vacancy", "run", "--offline", "--data-dir", "/tmp/x"]).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.offline);
        assert_eq!(args.dirs.data_dir, PathBuf::from("/tmp/x"));
        assert_eq!(args.output.horizon, 24);
        assert_eq!(args.fetch.plan(), FetchPlan::default());
    }

    #[test]
    fn synth_parses_the_start_month() {
        let cli = Cli::try_parse_from(["vacancy", "-v", "synth", "--start", "2018 MAR"]).unwrap();
        assert!(cli.verbose);
        let Command::Synth(args) = cli.command else {
            panic!("expected synth");
        };
        assert_eq!(args.config().start, Period::new(2018, 3).unwrap());
        assert!(Cli::try_parse_from(["vacancy", "synth", "--start", "2018 Q1"]).is_err());
    }
}
