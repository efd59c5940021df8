//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and environment defaults
//! - sets up logging
//! - loads data and model files
//! - runs the fit session
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, FitArgs, PlotArgs, SimulateArgs};
use crate::data::SimulateOptions;
use crate::domain::ModelConfig;
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `rose` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Simulate(args) => handle_simulate(args),
        Command::Plot(args) => handle_plot(args),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A second init (e.g. in tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let dataset = crate::io::read_dataset(&args.data)?;
    let mut config = crate::io::read_model_config(&args.model)?;
    apply_overrides(&mut config, &args, &Defaults::from_env()?);

    let run = pipeline::run_fit(dataset, config, args.top)?;

    println!(
        "{}",
        crate::report::format_run_summary(&run.dataset, &run.config, &run.result)
    );
    println!("{}", crate::report::format_outliers(&run.outliers));

    if args.plot && !args.no_plot {
        let plot = crate::plot::render_ascii_plot(&run.result.residuals, args.width, args.height, Some(&run.outliers));
        println!("{plot}");
        if args.profile {
            println!(
                "{}",
                crate::plot::render_profile_plot(&run.result.sld_profile, args.width, args.height)
            );
        }
    }

    // Optional exports.
    if let Some(path) = &args.export {
        crate::io::write_residuals_csv(path, &run.result.residuals)?;
    }
    if let Some(path) = &args.report {
        let report = crate::io::FitReport::new(run.config, run.result, Some(args.data.as_path()));
        crate::io::write_report_json(path, &report)?;
    }

    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let config = crate::io::read_model_config(&args.model)?;
    let defaults = Defaults::from_env()?;
    let opts = SimulateOptions {
        q_min: args.q_min,
        q_max: args.q_max,
        points: args.points,
        log_grid: args.log_grid,
        relative_error: args.relative_error,
        noise: args.noise,
        seed: args.seed.or(defaults.seed).unwrap_or(0),
    };
    let dataset = crate::data::simulate(&config, &opts)?;
    crate::io::write_dataset(&args.output, &dataset)?;
    tracing::info!(path = %args.output.display(), points = dataset.len(), "wrote synthetic curve");
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let report = crate::io::read_report_json(&args.report)?;
    if let Some(file) = &report.data_file {
        println!("Data: {file} | method: {}", report.result.method.display_name());
    }

    let plot = crate::plot::render_ascii_plot(&report.result.residuals, args.width, args.height, None);
    println!("{plot}");
    if args.profile {
        println!(
            "{}",
            crate::plot::render_profile_plot(&report.result.sld_profile, args.width, args.height)
        );
    }
    Ok(())
}

/// Run defaults taken from the environment (`.env` included).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Defaults {
    seed: Option<u64>,
    workers: Option<usize>,
}

impl Defaults {
    fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            seed: env_number("ROSE_SEED")?,
            workers: env_number("ROSE_WORKERS")?,
        })
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Result<Option<T>, AppError> {
    match std::env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AppError::new(2, format!("{key} must be a non-negative integer, got '{raw}'"))),
        Err(_) => Ok(None),
    }
}

/// CLI flags beat environment defaults, which beat the model file.
fn apply_overrides(config: &mut ModelConfig, args: &FitArgs, defaults: &Defaults) {
    let fit = &mut config.fit;
    if let Some(method) = args.method {
        fit.method = method;
    }
    if let Some(seed) = args.seed.or(defaults.seed) {
        fit.seed = seed;
    }
    if let Some(n) = args.max_iterations {
        fit.max_iterations = n;
    }
    if let Some(workers) = args.workers.or(defaults.workers) {
        fit.workers = Some(workers);
    }
    if let Some(space) = args.cost_space {
        fit.cost_space = space;
    }
}
