//! Plot rendering: terminal ASCII for quick checks, SVG for reports.

pub mod ascii;
pub mod svg;

pub use ascii::render_ascii_plot;
pub use svg::{render_svg, write_svg_plot};
