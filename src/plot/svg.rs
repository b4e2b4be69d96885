//! SVG comparison chart: observed breakthrough curve vs the synthetic curve
//! re-simulated at the estimate.
//!
//! The chart is rendered into a string first so it can be tested without
//! touching the filesystem.

use std::path::Path;

use plotters::prelude::*;

use crate::domain::{FrontCharacterization, TimeSeries};
use crate::error::AppError;

/// Render and write the comparison chart.
pub fn write_svg_plot(
    path: &Path,
    observed: &TimeSeries,
    synthetic: Option<&TimeSeries>,
    front: Option<&FrontCharacterization>,
    size: (u32, u32),
) -> Result<(), AppError> {
    let svg = render_svg(observed, synthetic, front, size)?;
    std::fs::write(path, svg)
        .map_err(|e| AppError::new(2, format!("Failed to write SVG '{}': {e}", path.display())))
}

/// Render the comparison chart to an SVG document.
pub fn render_svg(
    observed: &TimeSeries,
    synthetic: Option<&TimeSeries>,
    front: Option<&FrontCharacterization>,
    size: (u32, u32),
) -> Result<String, AppError> {
    let t_min = observed.time().first().copied().unwrap_or(0.0);
    let t_max = observed.time().last().copied().unwrap_or(1.0).max(t_min + 1.0);
    let c_max = observed
        .value()
        .iter()
        .chain(synthetic.map(TimeSeries::value).unwrap_or(&[]))
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max)
        .max(1e-10);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Tracer breakthrough", ("sans-serif", 24).into_font())
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(t_min..t_max, 0.0..(c_max * 1.1))
            .map_err(plot_error)?;

        chart
            .configure_mesh()
            .x_desc("Time since release (s)")
            .y_desc("Concentration (mg/L)")
            .x_label_formatter(&|x| format!("{x:.0}"))
            .y_label_formatter(&|y| format!("{y:.3}"))
            .draw()
            .map_err(plot_error)?;

        let observed_color = RGBColor(40, 40, 40);
        chart
            .draw_series(
                observed
                    .time()
                    .iter()
                    .zip(observed.value())
                    .map(|(&t, &c)| Circle::new((t, c), 2, observed_color.filled())),
            )
            .map_err(plot_error)?
            .label("Observed")
            .legend(move |(x, y)| Circle::new((x + 10, y), 3, observed_color.filled()));

        if let Some(synthetic) = synthetic {
            chart
                .draw_series(LineSeries::new(
                    synthetic.time().iter().copied().zip(synthetic.value().iter().copied()),
                    BLUE.stroke_width(2),
                ))
                .map_err(plot_error)?
                .label("Synthetic")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE.stroke_width(2)));
        }

        // Front window markers.
        if let Some(front) = front {
            for t in [front.lower_time, front.upper_time] {
                chart
                    .draw_series(LineSeries::new(vec![(t, 0.0), (t, c_max * 1.1)], RED.mix(0.5)))
                    .map_err(plot_error)?;
            }
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(plot_error)?;

        root.present().map_err(plot_error)?;
    }
    Ok(svg)
}

fn plot_error(e: impl std::fmt::Display) -> AppError {
    AppError::new(4, format!("Failed to render plot: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_an_svg_document() {
        let observed = TimeSeries::new(vec![1.0, 2.0, 3.0, 4.0], vec![0.0, 1.0, 2.0, 1.0]).unwrap();
        let synthetic = observed.with_values(vec![0.1, 1.1, 1.9, 0.9]).unwrap();
        let svg = render_svg(&observed, Some(&synthetic), None, (400, 300)).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("</svg>"));
    }
}
