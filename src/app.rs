//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - initializes logging
//! - parses CLI arguments
//! - loads the site file and observed series
//! - runs the estimation pipeline
//! - prints reports/plots and writes optional exports

use std::path::Path;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{
    CalibrateArgs, Command, LocateArgs, OutputArgs, PlotArgs, PredictArgs, SeriesArgs, SimulateArgs,
};
use crate::convert::ConductanceRegression;
use crate::domain::{
    FrontBounds, KnownFlow, KnownRelease, SiteConfig, StreamGeometry, TimeSeries, TransportParameters,
    Units,
};
use crate::error::AppError;
use crate::fit::NonlinearFitConfig;
use crate::io::{
    ResultFile, load_series, read_result_json, write_result_json, write_series_csv, write_single_series_csv,
};

pub mod pipeline;

use pipeline::{CalibrateConfig, LocateConfig, RunOutput, SeriesKind};

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "TRACER_LOG";

/// Entry point for the `tracer` binary.
pub fn run() -> Result<(), AppError> {
    // Optional: a missing .env is not an error.
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Locate(args) => handle_locate(args),
        Command::Calibrate(args) => handle_calibrate(args),
        Command::Simulate(args) => handle_simulate(args),
        Command::Predict(args) => handle_predict(args),
        Command::Plot(args) => handle_plot(args),
    }
}

fn init_tracing() {
    // Logs go to stderr so reports on stdout stay pipeable.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
                .unwrap_or_else(|_| "tracer_inverse=info".into()),
        )
        .init();
}

fn handle_locate(args: LocateArgs) -> Result<(), AppError> {
    let site = SiteConfig::load(&args.site)?;
    let geometry = site.geometry()?;
    let units = site.units;

    let velocity = args
        .velocity
        .map(|u| units.velocity_to_si(u))
        .unwrap_or_else(|| geometry.mean_velocity());
    let dispersion = known_dispersion(&args, units, &geometry, velocity)?;

    let config = LocateConfig {
        kind: series_kind(&args.series),
        known: KnownFlow {
            dispersion,
            velocity,
            area: geometry.area(),
        },
        flow: geometry.flow(),
        bounds: front_bounds(&args.series),
        distance_range: (units.length_to_si(args.distance_min), units.length_to_si(args.distance_max)),
        distance_samples: args.distance_steps,
        mass_samples: args.mass_steps,
        mass_spread: args.mass_spread,
        simulation_steps: args.simulation_steps,
        slope_sentinel: args.slope_sentinel,
        time_budget: args.time_budget.map(duration_from_secs).transpose()?,
        sweep_multipliers: args.sweep.clone(),
    };
    info!(
        dispersion,
        velocity,
        area = geometry.area(),
        flow = geometry.flow(),
        "locating release"
    );

    let raw = load_observed(&args.series)?;
    let run = pipeline::run_locate(&raw, &config)?;

    println!("{}", crate::report::format_locate_summary(&run));
    write_outputs(&run, geometry.area(), &args.output)
}

fn handle_calibrate(args: CalibrateArgs) -> Result<(), AppError> {
    let site = SiteConfig::load(&args.site)?;
    let geometry = site.geometry()?;

    let config = CalibrateConfig {
        kind: series_kind(&args.series),
        known: KnownRelease {
            mass: args.mass,
            distance: site.units.length_to_si(args.distance),
            area: geometry.area(),
        },
        initial: (args.k0, args.u0),
        fit: NonlinearFitConfig {
            max_iterations: args.max_iterations,
            seed_steps: args.seed_steps,
            ..NonlinearFitConfig::default()
        },
        bounds: front_bounds(&args.series),
    };

    let raw = load_observed(&args.series)?;
    let run = pipeline::run_calibrate(&raw, &config)?;

    println!("{}", crate::report::format_calibrate_summary(&run));
    write_outputs(&run, geometry.area(), &args.output)
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let config = crate::data::SyntheticConfig {
        params: TransportParameters {
            mass: args.mass,
            velocity: args.velocity,
            dispersion: args.dispersion,
            distance: args.distance,
        },
        area: args.area,
        duration: args.duration,
        interval: args.interval,
        noise_sd: args.noise,
        seed: args.seed,
    };
    let series = crate::data::generate_observed(&config)?;

    // Written times start at zero again, matching a logger export.
    let shifted: Vec<f64> = series
        .time()
        .iter()
        .map(|t| t - crate::domain::TIME_OFFSET_SECONDS)
        .collect();

    let (series, label) = match args.background {
        Some(bg) => (
            crate::data::to_conductance(&series, bg, &ConductanceRegression::default())?,
            "conductance",
        ),
        None => (series, "concentration"),
    };
    let out = TimeSeries::new(shifted, series.value().to_vec())?;
    write_single_series_csv(&args.output, &out, label)?;

    info!(path = %args.output.display(), samples = out.len(), "wrote synthetic series");
    Ok(())
}

fn handle_predict(args: PredictArgs) -> Result<(), AppError> {
    let mut site = SiteConfig::load(&args.site)?;
    if let Some(units) = args.units {
        site.units = units;
    }
    let geometry = site.geometry()?;
    println!("{}", crate::report::format_predictor_table(&geometry));
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let saved = read_result_json(&args.result)?;

    println!("{}", crate::report::format_result_file(&saved));
    let plot = crate::plot::render_ascii_plot(&saved.observed, Some(&saved.synthetic), args.width, args.height);
    println!("{plot}");

    if let Some(path) = &args.svg {
        crate::plot::write_svg_plot(
            path,
            &saved.observed,
            Some(&saved.synthetic),
            saved.observed_front.as_ref(),
            (1024, 640),
        )?;
        log_written(path, "SVG plot");
    }
    Ok(())
}

/// K in SI: an explicit `--dispersion` is given in site units, predictors return SI.
fn known_dispersion(
    args: &LocateArgs,
    units: Units,
    geometry: &StreamGeometry,
    velocity: f64,
) -> Result<f64, AppError> {
    match (args.dispersion, args.predictor) {
        (Some(k), _) => Ok(units.dispersion_to_si(k)),
        (None, Some(p)) => {
            let k = p.dispersion_with_velocity(geometry, velocity);
            info!(predictor = p.display_name(), dispersion = k, "dispersion from predictor");
            Ok(k)
        }
        (None, None) => Err(AppError::new(2, "Provide either --dispersion or --predictor.")),
    }
}

fn series_kind(args: &SeriesArgs) -> SeriesKind {
    if args.conductance {
        SeriesKind::Conductance {
            baseline_index: args.baseline_index,
            regression: ConductanceRegression::default(),
        }
    } else {
        SeriesKind::Concentration
    }
}

fn front_bounds(args: &SeriesArgs) -> FrontBounds {
    FrontBounds {
        lower: args.lower_fraction,
        upper: args.upper_fraction,
    }
}

fn duration_from_secs(secs: f64) -> Result<Duration, AppError> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| AppError::new(2, format!("Invalid --time-budget {secs}: {e}")))
}

fn load_observed(args: &SeriesArgs) -> Result<TimeSeries, AppError> {
    let ingested = load_series(&args.data, &args.time_column, &args.value_column)?;
    for err in ingested.row_errors.iter().take(5) {
        debug!(line = err.line, message = %err.message, "skipped row");
    }
    info!(
        path = %args.data.display(),
        rows = ingested.rows_used,
        skipped = ingested.row_errors.len(),
        "loaded observed series"
    );
    Ok(ingested.series)
}

fn write_outputs(run: &RunOutput, area: f64, output: &OutputArgs) -> Result<(), AppError> {
    if output.plot && !output.no_plot {
        let plot =
            crate::plot::render_ascii_plot(&run.observed, Some(&run.synthetic), output.width, output.height);
        println!("{plot}");
    }

    if let Some(path) = &output.export {
        write_series_csv(path, &run.observed, &run.synthetic)?;
        log_written(path, "series CSV");
    }
    if let Some(path) = &output.json {
        let file = ResultFile::new(run.result, area, run.front, run.observed.clone(), run.synthetic.clone());
        write_result_json(path, &file)?;
        log_written(path, "result JSON");
    }
    if let Some(path) = &output.svg {
        crate::plot::write_svg_plot(path, &run.observed, Some(&run.synthetic), run.front.as_ref(), (1024, 640))?;
        log_written(path, "SVG plot");
    }
    Ok(())
}

fn log_written(path: &Path, what: &str) {
    info!(path = %path.display(), "wrote {what}");
}
