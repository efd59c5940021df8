//! Command-line parsing for the reflectivity fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::domain::{CostSpace, Method};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "rose", version, about = "Reflectivity Open Science Engine: fit thin-film reflectivity curves")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a layer model to a measured curve, print diagnostics and optionally plot/export.
    Fit(FitArgs),
    /// Write a synthetic curve computed from a model file.
    Simulate(SimulateArgs),
    /// Plot a previously exported fit report.
    Plot(PlotArgs),
}

/// Options for fitting. Flags left unset fall back to the model file's `fit` block.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Data file with `Q R dR [dQ]` columns.
    #[arg(short, long, value_name = "FILE")]
    pub data: PathBuf,

    /// Model JSON (layers, bounds, ties, resolution, fit settings).
    #[arg(short, long, value_name = "JSON")]
    pub model: PathBuf,

    /// Search strategy.
    #[arg(long, value_enum)]
    pub method: Option<Method>,

    /// Random seed (defaults to `ROSE_SEED`, then the model file).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Iterations, generations or ensemble steps.
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Worker threads (defaults to `ROSE_WORKERS`, then all cores).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Residual weighting space.
    #[arg(long, value_enum)]
    pub cost_space: Option<CostSpace>,

    /// Show the top-N positive and negative residuals.
    #[arg(long, default_value_t = 5)]
    pub top: usize,

    /// Render an ASCII plot in the terminal (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Also plot the fitted SLD profile.
    #[arg(long)]
    pub profile: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Export per-point residuals to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Write the full fit report (model + result) to JSON.
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Options for simulating a curve.
#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    /// Model JSON; the starting values are simulated.
    #[arg(short, long, value_name = "JSON")]
    pub model: PathBuf,

    /// Output data file.
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Lowest Q (1/A).
    #[arg(long, default_value_t = 0.005)]
    pub q_min: f64,

    /// Highest Q (1/A).
    #[arg(long, default_value_t = 0.3)]
    pub q_max: f64,

    /// Number of points.
    #[arg(long, default_value_t = 200)]
    pub points: usize,

    /// Space the points logarithmically in Q.
    #[arg(long)]
    pub log_grid: bool,

    /// Relative error bar dR/R.
    #[arg(long, default_value_t = 0.05)]
    pub relative_error: f64,

    /// Add noise consistent with the error bars.
    #[arg(long)]
    pub noise: bool,

    /// Noise seed (defaults to `ROSE_SEED`, then 0).
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Options for plotting a saved report.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Report JSON file produced by `rose fit --report`.
    #[arg(long, value_name = "JSON")]
    pub report: PathBuf,

    /// Also plot the fitted SLD profile.
    #[arg(long)]
    pub profile: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_flags_parse() {
        let cli = Cli::parse_from([
            "rose",
            "-vv",
            "fit",
            "--data",
            "film.dat",
            "--model",
            "film.json",
            "--method",
            "differential-evolution",
            "--cost-space",
            "linear",
            "--no-plot",
        ]);
        assert_eq!(cli.verbose, 2);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.method, Some(Method::DifferentialEvolution));
        assert_eq!(args.cost_space, Some(CostSpace::Linear));
        assert!(args.no_plot);
        assert!(args.seed.is_none());
    }

    #[test]
    fn simulate_defaults() {
        let cli = Cli::parse_from(["rose", "simulate", "-m", "film.json", "-o", "film.dat"]);
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.points, 200);
        assert!(!args.noise);
    }
}
