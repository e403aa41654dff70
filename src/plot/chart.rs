//! Server-side SVG rendering of a [`PlotConfig`] with plotters.

use anyhow::Result;
use plotters::prelude::*;
use std::collections::HashMap;

use super::PlotConfig;
use crate::types::{AppError, AppResult};

/// Parse `#rrggbb`.
fn hex_color(hex: &str) -> Option<RGBColor> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
    Some(RGBColor(channel(0)?, channel(2)?, channel(4)?))
}

/// Sample `expr` over `domain`, split into runs of drawable points.
fn sample_segments(
    expr: &crate::algebra::Expr,
    variable: &str,
    domain: [f64; 2],
    y_domain: [f64; 2],
    samples: u32,
) -> Vec<Vec<(f64, f64)>> {
    let n = samples.max(2) as usize;
    let span = (y_domain[1] - y_domain[0]).abs().max(f64::EPSILON);
    let (low, high) = (y_domain[0].min(y_domain[1]) - 10.0 * span, y_domain[0].max(y_domain[1]) + 10.0 * span);

    let mut vars = HashMap::with_capacity(1);
    let mut segments = Vec::new();
    let mut current = Vec::new();
    for i in 0..n {
        let x = domain[0] + (domain[1] - domain[0]) * i as f64 / (n - 1) as f64;
        vars.insert(variable.to_string(), x);
        match expr.eval(&vars) {
            Ok(y) if y.is_finite() && y >= low && y <= high => current.push((x, y)),
            _ => {
                if current.len() > 1 {
                    segments.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
            }
        }
    }
    if current.len() > 1 {
        segments.push(current);
    }
    segments
}

fn draw(buffer: &mut String, config: &PlotConfig, variable: &str) -> Result<()> {
    let root = SVGBackend::with_string(buffer, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let [x0, x1] = config.x_axis.domain;
    let [y0, y1] = config.y_axis.domain;
    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(&config.title, ("sans-serif", 18))
        .x_label_area_size(35)
        .y_label_area_size(45)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    let mut mesh = chart.configure_mesh();
    mesh.x_desc(config.x_axis.label.as_str())
        .y_desc(config.y_axis.label.as_str());
    if !config.grid {
        mesh.disable_mesh();
    }
    mesh.draw()?;

    for series in &config.data {
        let color = hex_color(&series.color).unwrap_or(BLACK);
        let segments = sample_segments(&series.expr, variable, config.x_axis.domain, config.y_axis.domain, series.samples);
        for (i, segment) in segments.into_iter().enumerate() {
            let drawn = chart.draw_series(LineSeries::new(segment, color.stroke_width(2)))?;
            if let (0, Some(title)) = (i, series.title.as_ref()) {
                drawn
                    .label(title.as_str())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
            }
        }
    }

    if config.legend.is_some() {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerMiddle)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }

    root.present()?;
    Ok(())
}

/// Render the chart as an SVG document.
pub fn render_svg(config: &PlotConfig, variable: &str) -> AppResult<String> {
    let mut buffer = String::new();
    draw(&mut buffer, config, variable).map_err(|e| AppError::Render(e.to_string()))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::{latex, normalize};

    #[test]
    fn test_hex_color() {
        assert_eq!(hex_color("#17a2b8"), Some(RGBColor(0x17, 0xa2, 0xb8)));
        assert_eq!(hex_color("17a2b8"), None);
        assert_eq!(hex_color("#17a2"), None);
        assert_eq!(hex_color("#zz0000"), None);
    }

    #[test]
    fn test_sampling_breaks_at_poles() {
        let expr = normalize::normalize(&latex::parse("\\frac{1}{x}").unwrap()).unwrap();
        let segments = sample_segments(&expr, "x", [-1.0, 1.0], [-10.0, 10.0], 201);
        assert_eq!(segments.len(), 2);
        assert!(segments[0].iter().all(|(x, _)| *x < 0.0));
        assert!(segments[1].iter().all(|(x, _)| *x > 0.0));
    }

    #[test]
    fn test_sampling_covers_domain() {
        let expr = latex::parse("x^2").unwrap();
        let segments = sample_segments(&expr, "x", [-2.0, 2.0], [-10.0, 10.0], 5);
        assert_eq!(segments, vec![vec![(-2.0, 4.0), (-1.0, 1.0), (0.0, 0.0), (1.0, 1.0), (2.0, 4.0)]]);
    }
}
