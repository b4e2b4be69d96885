//! Command-line parsing for the tracer inversion tool.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! estimation code. Every tunable has a default here; `app` turns the parsed
//! arguments into pipeline configs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::Units;
use crate::predictors::Predictor;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "tracer", version, about = "Taylor-solution tracer inversion for stream reaches")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Locate an unknown release: estimate source distance and mass (K, U known).
    Locate(LocateArgs),
    /// Calibrate a reach: estimate K and U from a release of known mass and distance.
    Calibrate(CalibrateArgs),
    /// Write a synthetic breakthrough curve to CSV.
    Simulate(SimulateArgs),
    /// Print stream geometry and the empirical dispersion predictors for a site.
    Predict(PredictArgs),
    /// Redraw a result JSON written by `--json`.
    Plot(PlotArgs),
}

/// Observed series input shared by `locate` and `calibrate`.
#[derive(Debug, Args, Clone)]
pub struct SeriesArgs {
    /// CSV file with a time column (seconds) and a value column.
    #[arg(long, value_name = "CSV")]
    pub data: PathBuf,

    /// Name of the time column.
    #[arg(long, default_value = "time")]
    pub time_column: String,

    /// Name of the value column.
    #[arg(long, default_value = "value")]
    pub value_column: String,

    /// Treat values as specific conductance (µS/cm) instead of concentration (mg/L).
    #[arg(long)]
    pub conductance: bool,

    /// Sample index of the pre-event conductance baseline.
    #[arg(long, default_value_t = 0)]
    pub baseline_index: usize,

    /// Lower rising-front bound as a fraction of the peak.
    #[arg(long, default_value_t = 0.5)]
    pub lower_fraction: f64,

    /// Upper rising-front bound as a fraction of the peak.
    #[arg(long, default_value_t = 0.999)]
    pub upper_fraction: f64,
}

/// Output options shared by `locate` and `calibrate`.
#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Render an ASCII plot in the terminal (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Export observed/synthetic series to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the result (parameters + series) to JSON.
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Write an SVG comparison plot.
    #[arg(long)]
    pub svg: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct LocateArgs {
    #[command(flatten)]
    pub series: SeriesArgs,

    /// Site file (JSON: units, area, width, slope, flow).
    #[arg(long, value_name = "JSON")]
    pub site: PathBuf,

    /// Known dispersion coefficient (site length units squared per second).
    #[arg(long, conflicts_with = "predictor")]
    pub dispersion: Option<f64>,

    /// Derive K from an empirical predictor instead of `--dispersion`.
    #[arg(long, value_enum)]
    pub predictor: Option<Predictor>,

    /// Known mean velocity (site units per second); defaults to Q / A.
    #[arg(long)]
    pub velocity: Option<f64>,

    /// Smallest candidate source distance (site units).
    #[arg(long, default_value_t = 10.0)]
    pub distance_min: f64,

    /// Largest candidate source distance (site units).
    #[arg(long, default_value_t = 1000.0)]
    pub distance_max: f64,

    /// Distance grid samples.
    #[arg(long, default_value_t = 1000)]
    pub distance_steps: usize,

    /// Mass grid samples.
    #[arg(long, default_value_t = 50)]
    pub mass_steps: usize,

    /// Relative half-width of the mass grid around the integrated estimate.
    #[arg(long, default_value_t = crate::fit::DEFAULT_MASS_SPREAD)]
    pub mass_spread: f64,

    /// Time steps per simulated curve.
    #[arg(long, default_value_t = 5000)]
    pub simulation_steps: usize,

    /// Reject candidates whose slope difference is not below this value.
    #[arg(long)]
    pub slope_sentinel: Option<f64>,

    /// Abort the grid search after this many seconds.
    #[arg(long)]
    pub time_budget: Option<f64>,

    /// Mass multipliers for the sensitivity sweep (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub sweep: Vec<f64>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct CalibrateArgs {
    #[command(flatten)]
    pub series: SeriesArgs,

    /// Site file (JSON: units, area, width, slope, flow).
    #[arg(long, value_name = "JSON")]
    pub site: PathBuf,

    /// Released mass (g).
    #[arg(long)]
    pub mass: f64,

    /// Distance from release to monitoring point (site units).
    #[arg(long)]
    pub distance: f64,

    /// Initial K guess (m²/s).
    #[arg(long, default_value_t = 0.1)]
    pub k0: f64,

    /// Initial U guess (m/s).
    #[arg(long, default_value_t = 0.1)]
    pub u0: f64,

    /// Levenberg-Marquardt iteration budget.
    #[arg(long, default_value_t = 200)]
    pub max_iterations: usize,

    /// Points in the log-spaced seed scan per axis (below 2 disables it).
    #[arg(long, default_value_t = 21)]
    pub seed_steps: usize,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    /// Released mass (g).
    #[arg(long)]
    pub mass: f64,

    /// Distance from release to monitoring point (m).
    #[arg(long)]
    pub distance: f64,

    /// Dispersion coefficient (m²/s).
    #[arg(long)]
    pub dispersion: f64,

    /// Mean velocity (m/s).
    #[arg(long)]
    pub velocity: f64,

    /// Cross-sectional area (m²).
    #[arg(long)]
    pub area: f64,

    /// Record length (s).
    #[arg(long, default_value_t = 3600.0)]
    pub duration: f64,

    /// Sampling interval (s).
    #[arg(long, default_value_t = 1.0)]
    pub interval: f64,

    /// Standard deviation of additive Gaussian noise (mg/L).
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Random seed for the noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Write specific conductance over this background (µS/cm) instead of concentration.
    #[arg(long)]
    pub background: Option<f64>,

    /// Output CSV path.
    #[arg(long, short = 'o')]
    pub output: PathBuf,
}

#[derive(Debug, Parser, Clone)]
pub struct PredictArgs {
    /// Site file (JSON: units, area, width, slope, flow).
    #[arg(long, value_name = "JSON")]
    pub site: PathBuf,

    /// Override the site's unit system.
    #[arg(long, value_enum)]
    pub units: Option<Units>,
}

/// Options for redrawing a saved result.
#[derive(Debug, Parser, Clone)]
pub struct PlotArgs {
    /// Result JSON produced by `tracer locate --json` or `tracer calibrate --json`.
    #[arg(long, value_name = "JSON")]
    pub result: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Also write an SVG comparison plot.
    #[arg(long)]
    pub svg: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_locate_with_defaults() {
        let cli = Cli::try_parse_from([
            "tracer", "locate", "--data", "obs.csv", "--site", "site.json", "--dispersion", "0.4", "--sweep",
            "0.8,1.0,1.2",
        ])
        .unwrap();
        let Command::Locate(args) = cli.command else {
            panic!("expected locate");
        };
        assert_eq!(args.series.time_column, "time");
        assert_eq!(args.distance_steps, 1000);
        assert_eq!(args.sweep, vec![0.8, 1.0, 1.2]);
        assert!(args.output.plot);
    }

    #[test]
    fn dispersion_and_predictor_conflict() {
        let res = Cli::try_parse_from([
            "tracer", "locate", "--data", "a.csv", "--site", "s.json", "--dispersion", "0.4", "--predictor",
            "elder",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn parses_calibrate() {
        let cli = Cli::try_parse_from([
            "tracer", "calibrate", "--data", "a.csv", "--site", "s.json", "--mass", "1000", "--distance", "88",
            "--conductance",
        ])
        .unwrap();
        let Command::Calibrate(args) = cli.command else {
            panic!("expected calibrate");
        };
        assert!(args.series.conductance);
        assert_eq!(args.max_iterations, 200);
    }

    #[test]
    fn parses_plot_of_saved_result() {
        let cli = Cli::try_parse_from(["tracer", "plot", "--result", "run.json", "--svg", "run.svg"]).unwrap();
        let Command::Plot(args) = cli.command else {
            panic!("expected plot");
        };
        assert_eq!(args.result, PathBuf::from("run.json"));
        assert_eq!(args.width, 100);
        assert!(args.svg.is_some());
    }
}
