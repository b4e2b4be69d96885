//! Formatted terminal output for estimation runs.
//!
//! We keep formatting code in one place so:
//! - the estimators stay free of presentation concerns
//! - output changes are localized (important for snapshot-style tests)

use crate::app::pipeline::RunOutput;
use crate::domain::{EstimationMode, EstimationResult, StreamGeometry, TimeSeries};
use crate::io::ResultFile;
use crate::predictors::Predictor;

/// Format the Mode A summary: front, integrated mass, estimate and sweep.
pub fn format_locate_summary(run: &RunOutput) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== tracer - {} ===\n", run.result.mode.display_name()));
    out.push_str(&format_series_line(&run.observed));
    out.push_str(&format_front(run));

    if let Some(mass) = &run.mass {
        out.push_str(&format!(
            "Mass discharge: area={:.3} mg*s/L | mass={:.3} g\n",
            mass.area, mass.mass_grams
        ));
    }

    let p = &run.result.params;
    out.push_str(&format!(
        "Known: K={:.4} m2/s | U={:.4} m/s\n",
        p.dispersion, p.velocity
    ));

    out.push_str("\nEstimate:\n");
    out.push_str(&format!("- distance    : {:.2} m\n", p.distance));
    out.push_str(&format!("- mass        : {:.3} g\n", p.mass));
    out.push_str(&format!("- |slope diff|: {:.6e}\n", run.result.residual));
    out.push_str(&format!("- grid points : {}\n", run.result.evaluations));

    if !run.sweep.is_empty() {
        out.push_str("\nMass-variance sweep:\n");
        out.push_str(&format_sweep_table(&run.sweep));
    }

    out
}

/// Format the Mode B summary: known release, fitted K and U, residual.
pub fn format_calibrate_summary(run: &RunOutput) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== tracer - {} ===\n", run.result.mode.display_name()));
    out.push_str(&format_series_line(&run.observed));
    out.push_str(&format_front(run));

    let p = &run.result.params;
    out.push_str(&format!("Known: M={:.3} g | x={:.2} m\n", p.mass, p.distance));

    out.push_str("\nEstimate:\n");
    out.push_str(&format!("- K         : {:.6} m2/s\n", p.dispersion));
    out.push_str(&format!("- U         : {:.6} m/s\n", p.velocity));
    out.push_str(&format!("- SSE       : {:.6e}\n", run.result.residual));
    out.push_str(&format!("- iterations: {}\n", run.result.evaluations));

    out
}

/// Format the header of a saved result file.
pub fn format_result_file(file: &ResultFile) -> String {
    let mut out = String::new();
    let r = &file.result;
    let p = &r.params;

    out.push_str(&format!("=== tracer - {} ===\n", r.mode.display_name()));
    out.push_str(&format!(
        "Saved: {} by {} {}\n",
        file.generated.format("%Y-%m-%d %H:%M:%S UTC"),
        file.tool,
        file.version
    ));
    out.push_str(&format_series_line(&file.observed));
    out.push_str(&format!(
        "Parameters: x={:.2} m | M={:.3} g | K={:.6} m2/s | U={:.6} m/s | A={:.4} m2\n",
        p.distance, p.mass, p.dispersion, p.velocity, file.area
    ));
    let residual = match r.mode {
        EstimationMode::DistanceMass => "|slope diff|",
        EstimationMode::DispersionVelocity => "SSE",
    };
    out.push_str(&format!("{residual}={:.6e} | evaluations={}\n", r.residual, r.evaluations));

    out
}

/// Format derived geometry and every empirical K predictor for a reach.
pub fn format_predictor_table(geometry: &StreamGeometry) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Geometry: A={:.3} m2 | W={:.3} m | H={:.3} m | R={:.3} m | S={:.5}\n",
        geometry.area(),
        geometry.width(),
        geometry.depth(),
        geometry.hydraulic_radius(),
        geometry.slope()
    ));
    out.push_str(&format!(
        "Hydraulics: Q={:.4} m3/s | U={:.4} m/s | u*={:.4} m/s\n\n",
        geometry.flow(),
        geometry.mean_velocity(),
        geometry.shear_velocity()
    ));

    out.push_str(format!("{:<30} {:>12}", "predictor", "K (m2/s)").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<30} {:-<12}", "", "").trim_end());
    out.push('\n');
    for predictor in Predictor::ALL {
        out.push_str(&format!(
            "{:<30} {:>12.4}\n",
            predictor.display_name(),
            predictor.dispersion(geometry)
        ));
    }

    out
}

fn format_series_line(series: &TimeSeries) -> String {
    let t = series.time();
    let (t0, t1) = (t.first().copied().unwrap_or(0.0), t.last().copied().unwrap_or(0.0));
    let dt = series
        .mean_interval()
        .map(|dt| format!("{dt:.2}"))
        .unwrap_or_else(|| "n/a".to_string());
    format!("Series: n={} | t=[{t0:.1}, {t1:.1}] s | dt={dt} s\n", series.len())
}

fn format_front(run: &RunOutput) -> String {
    match &run.front {
        Some(f) => format!(
            "Front: peak={:.4} mg/L at t={:.1} s | window=[{:.1}, {:.1}] s (idx {}..{}) | slope={:.6e} mg/L/s\n",
            f.peak, f.peak_time, f.lower_time, f.upper_time, f.lower_index, f.upper_index, f.slope
        ),
        None => "Front: not characterized\n".to_string(),
    }
}

fn format_sweep_table(sweep: &[(f64, EstimationResult)]) -> String {
    let mut out = String::new();
    out.push_str(format!("{:>10} {:>14} {:>12} {:>14}", "multiplier", "mass (g)", "distance (m)", "|slope diff|").trim_end());
    out.push('\n');
    out.push_str(format!("{:->10} {:->14} {:->12} {:->14}", "", "", "", "").trim_end());
    out.push('\n');
    for (multiplier, r) in sweep {
        out.push_str(&format!(
            "{:>10.2} {:>14.3} {:>12.2} {:>14.6e}\n",
            multiplier, r.params.mass, r.params.distance, r.residual
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::MassDischarge;
    use crate::domain::{FrontCharacterization, TransportParameters};

    fn run(mode: EstimationMode) -> RunOutput {
        let observed = TimeSeries::new(vec![1.0, 2.0, 3.0], vec![0.0, 2.0, 1.0]).unwrap();
        let result = EstimationResult {
            mode,
            params: TransportParameters {
                mass: 1000.0,
                velocity: 0.157,
                dispersion: 0.367,
                distance: 88.0,
            },
            residual: 1e-4,
            evaluations: 42,
        };
        RunOutput {
            synthetic: observed.clone(),
            observed,
            front: Some(FrontCharacterization {
                peak: 2.0,
                peak_time: 2.0,
                front_start: 2.0,
                lower_index: 1,
                upper_index: 1,
                lower_time: 2.0,
                upper_time: 2.0,
                slope: 0.5,
            }),
            mass: Some(MassDischarge {
                area: 2.5,
                mass_grams: 1000.0,
            }),
            result,
            sweep: vec![(1.0, result)],
        }
    }

    #[test]
    fn locate_summary_lists_estimate_and_sweep() {
        let txt = format_locate_summary(&run(EstimationMode::DistanceMass));
        assert!(txt.contains("- distance    : 88.00 m"));
        assert!(txt.contains("Mass-variance sweep:"));
        assert!(txt.contains("mass=1000.000 g"));
        assert!(txt.contains("Series: n=3"));
    }

    #[test]
    fn calibrate_summary_lists_k_and_u() {
        let txt = format_calibrate_summary(&run(EstimationMode::DispersionVelocity));
        assert!(txt.contains("- K         : 0.367000 m2/s"));
        assert!(txt.contains("- iterations: 42"));
        assert!(!txt.contains("sweep"));
    }

    #[test]
    fn saved_result_header_names_mode_and_residual() {
        let run = run(EstimationMode::DispersionVelocity);
        let file = ResultFile::new(run.result, 0.113, run.front, run.observed, run.synthetic);
        let txt = format_result_file(&file);
        assert!(txt.contains("nonlinear fit (K, U)"));
        assert!(txt.contains("SSE=1.000000e-4"));
        assert!(txt.contains("A=0.1130 m2"));
        assert!(txt.contains("by tracer"));
    }

    #[test]
    fn predictor_table_has_one_row_per_predictor() {
        let geometry = StreamGeometry::new(2.0, 4.0, 0.001, 1.0).unwrap();
        let txt = format_predictor_table(&geometry);
        for p in Predictor::ALL {
            assert!(txt.contains(p.display_name()));
        }
    }
}
