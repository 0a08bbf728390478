//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - initializes logging
//! - runs the requested pipeline steps
//! - prints summaries/tables/plots

use std::path::Path;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{CleanArgs, Command, DirArgs, FetchArgs, ForecastArgs, OutputArgs, PlotArgs, RunArgs, SynthArgs};
use crate::domain::{ForecastConfig, PipelineConfig};
use crate::error::AppError;

pub mod pipeline;

/// Provenance bundles land here, relative to the working directory.
const DEBUG_DIR: &str = "debug";

/// Entry point for the `vacancy` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    // `vacancy` and `vacancy --offline` behave like `vacancy run ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Fetch(args) => handle_fetch(args),
        Command::Clean(args) => handle_clean(args),
        Command::Forecast(args) => handle_forecast(args),
        Command::Plot(args) => handle_plot(args),
        Command::Synth(args) => handle_synth(args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    // A second init (tests, embedding) is harmless; keep the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = pipeline_config(&args.dirs, Some(&args.output), args.debug)?;
    let plan = args.fetch.plan();
    let fetch = if args.offline { None } else { Some(&plan) };

    let run = pipeline::run_all(&config, fetch)?;

    if let Some(summary) = &run.fetch {
        println!(
            "Fetched: latest=v{} downloaded={} skipped={} failed={}",
            summary.latest,
            summary.downloaded.len(),
            summary.skipped.len(),
            summary.failed.len()
        );
    }
    println!("{}", crate::report::format_clean_summary(&run.clean.report, &run.clean.series));
    println!("{}", crate::report::format_model_summary(&run.forecast.model));
    println!("{}", crate::report::format_forecast_table(&run.forecast.points));
    if config.plot {
        println!(
            "{}",
            crate::plot::render_series_plot(&run.clean.series, &run.forecast.points, config.plot_width, config.plot_height)
        );
    }
    for path in &run.plots {
        println!("Chart: {}", path.display());
    }

    if config.debug {
        let path = crate::debug::write_debug_bundle(
            Path::new(DEBUG_DIR),
            &run.clean.report,
            &run.clean.series,
            Some(&run.forecast),
        )?;
        info!(path = %path.display(), "wrote debug bundle");
    }
    Ok(())
}

fn handle_fetch(args: FetchArgs) -> Result<(), AppError> {
    let config = pipeline_config(&args.dirs, None, false)?;
    let summary = pipeline::run_fetch(&config, &args.fetch.plan())?;
    println!(
        "Fetched: latest=v{} downloaded={} skipped={} failed={}",
        summary.latest,
        summary.downloaded.len(),
        summary.skipped.len(),
        summary.failed.len()
    );
    Ok(())
}

fn handle_clean(args: CleanArgs) -> Result<(), AppError> {
    let config = pipeline_config(&args.dirs, None, args.debug)?;
    let out = pipeline::run_clean(&config)?;
    println!("{}", crate::report::format_clean_summary(&out.report, &out.series));
    println!("Wrote {}", config.canonical_csv.display());

    if config.debug {
        let path = crate::debug::write_debug_bundle(Path::new(DEBUG_DIR), &out.report, &out.series, None)?;
        info!(path = %path.display(), "wrote debug bundle");
    }
    Ok(())
}

fn handle_forecast(args: ForecastArgs) -> Result<(), AppError> {
    let config = pipeline_config(&args.dirs, Some(&args.output), false)?;
    let series = crate::io::export::read_canonical_csv(&config.canonical_csv)?;
    let result = pipeline::run_forecast(&config, &series)?;

    println!("{}", crate::report::format_model_summary(&result.model));
    println!("{}", crate::report::format_forecast_table(&result.points));
    if config.plot {
        println!(
            "{}",
            crate::plot::render_series_plot(&series, &result.points, config.plot_width, config.plot_height)
        );
    }
    println!("Wrote {}", config.forecast_csv.display());
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let mut config = pipeline_config(&args.dirs, None, false)?;
    config.plot_width = args.width;
    config.plot_height = args.height;

    let series = crate::io::export::read_canonical_csv(&config.canonical_csv)?;
    let forecast = if let Some(path) = &args.model {
        let result = crate::io::model::read_model_json(path)?.into_result();
        println!("{}", crate::report::format_model_summary(&result.model));
        Some(result.points)
    } else if config.forecast_csv.exists() {
        Some(crate::io::export::read_forecast_csv(&config.forecast_csv)?)
    } else {
        None
    };

    let written = pipeline::run_plots(&config, &series, forecast.as_deref());
    println!(
        "{}",
        crate::plot::render_series_plot(
            &series,
            forecast.as_deref().unwrap_or_default(),
            config.plot_width,
            config.plot_height
        )
    );
    for path in written {
        println!("Chart: {}", path.display());
    }
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let vintages = crate::data::generate_vintages(&args.config())?;
    crate::data::save_vintages(&args.dirs.data_dir, &vintages)?;
    println!(
        "Wrote {} synthetic vintage files to {}",
        vintages.len(),
        args.dirs.data_dir.display()
    );
    Ok(())
}

/// Gather the run configuration from CLI args (env defaults already applied by clap).
pub fn pipeline_config(dirs: &DirArgs, output: Option<&OutputArgs>, debug: bool) -> Result<PipelineConfig, AppError> {
    let mut config = PipelineConfig::with_dirs(dirs.data_dir.clone(), dirs.plots_dir.clone());
    config.debug = debug;

    if let Some(out) = output {
        if out.horizon == 0 {
            return Err(AppError::new(2, "Horizon must be >= 1."));
        }
        config.forecast = ForecastConfig {
            horizon: out.horizon,
            ..ForecastConfig::default()
        };
        config.export_model = out.export_model.clone();
        config.plot = !out.no_plot;
        config.plot_width = out.width;
        config.plot_height = out.height;
    }
    Ok(config)
}

/// Rewrite argv so `vacancy` defaults to `vacancy run`.
///
/// Rules:
/// - `vacancy`                      -> `vacancy run`
/// - `vacancy --offline ...`        -> `vacancy run --offline ...`
/// - `vacancy --help/--version/-h`  -> unchanged (show top-level help/version)
/// - `vacancy -v` / `--verbose` alone count as flags for `run`
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    let has_subcommand = argv
        .iter()
        .skip(1)
        .any(|a| matches!(a.as_str(), "run" | "fetch" | "clean" | "forecast" | "plot" | "synth"));
    if has_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "run flags".
    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}
