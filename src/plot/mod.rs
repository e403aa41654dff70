//! Plot adapter
//!
//! Turns one formula per line into a function-plot configuration the page
//! hands straight to the charting library. Lines that fail are reported next
//! to the chart instead of aborting it. [`chart`] draws the same series to SVG.

pub mod chart;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::algebra::{AlgebraEngine, EngineError, Expr};

pub const PALETTE: [&str; 6] = ["#17a2b8", "#dc3545", "#ffc107", "#28a745", "#6f42c1", "#fd7e14"];
pub const DEFAULT_BOUND: f64 = 10.0;
pub const PLOT_HEIGHT: u32 = 400;

/// The variable name the charting library samples over.
const PLOT_VARIABLE: &str = "x";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PlotError {
    #[error("no valid expression")]
    NoExpressions,
    /// Every line failed; one message per line.
    #[error("{}", .0.join("\n"))]
    AllFailed(Vec<String>),
}

/// One curve in function-plot's `data` array.
#[derive(Debug, Clone, Serialize)]
pub struct PlotSeries {
    #[serde(rename = "fn")]
    pub function: String,
    pub color: String,
    #[serde(rename = "graphType")]
    pub graph_type: &'static str,
    #[serde(rename = "nSamples")]
    pub samples: u32,
    pub sampler: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Parsed curve, kept for server-side sampling.
    #[serde(skip)]
    pub expr: Expr,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Tip {
    #[serde(rename = "xLine")]
    pub x_line: bool,
    #[serde(rename = "yLine")]
    pub y_line: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Axis {
    pub label: String,
    pub domain: [f64; 2],
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Legend {
    pub position: &'static str,
}

/// Options object for `functionPlot(...)`, minus the DOM target.
#[derive(Debug, Clone, Serialize)]
pub struct PlotConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub tip: Tip,
    #[serde(rename = "xAxis")]
    pub x_axis: Axis,
    #[serde(rename = "yAxis")]
    pub y_axis: Axis,
    pub grid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legend: Option<Legend>,
    pub data: Vec<PlotSeries>,
}

/// Axis fields exactly as typed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AxisInput {
    #[serde(rename = "xMin", default)]
    pub x_min: String,
    #[serde(rename = "xMax", default)]
    pub x_max: String,
    #[serde(rename = "yMin", default)]
    pub y_min: String,
    #[serde(rename = "yMax", default)]
    pub y_max: String,
}

impl AxisInput {
    pub fn x_domain(&self) -> [f64; 2] {
        [parse_bound(&self.x_min, -DEFAULT_BOUND), parse_bound(&self.x_max, DEFAULT_BOUND)]
    }

    pub fn y_domain(&self) -> [f64; 2] {
        [parse_bound(&self.y_min, -DEFAULT_BOUND), parse_bound(&self.y_max, DEFAULT_BOUND)]
    }
}

/// Blank, non-numeric, non-finite and zero all fall back to `default`.
pub fn parse_bound(text: &str, default: f64) -> f64 {
    match text.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value != 0.0 => value,
        _ => default,
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlotRequest {
    /// One formula per line.
    pub formulas: String,
    #[serde(default)]
    pub variable: String,
    #[serde(default)]
    pub legend: bool,
    #[serde(default = "default_true")]
    pub grid: bool,
    #[serde(default)]
    pub axes: AxisInput,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlotOutcome {
    pub config: PlotConfig,
    /// One message per line that could not be plotted.
    pub errors: Vec<String>,
    /// Static rendering of the same chart, when it could be drawn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub svg: Option<String>,
    pub warnings: Vec<String>,
}

impl PlotOutcome {
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Replace whole-token occurrences of `name` with the plotting variable.
pub fn rename_variable(function: &str, name: &str) -> String {
    if name == PLOT_VARIABLE {
        return function.to_string();
    }
    match Regex::new(&format!(r"\b{}\b", regex::escape(name))) {
        Ok(re) => re.replace_all(function, PLOT_VARIABLE).into_owned(),
        Err(e) => {
            warn!("Could not build variable pattern for {:?}: {}", name, e);
            function.to_string()
        }
    }
}

pub struct Plotter {
    engine: Arc<dyn AlgebraEngine>,
    samples: u32,
    width: u32,
}

impl Plotter {
    pub fn new(engine: Arc<dyn AlgebraEngine>, samples: u32, width: u32) -> Self {
        Self { engine, samples, width }
    }

    /// The curve to draw for one line. `y = …` and `f(x) = …` plot their right side.
    fn curve(&self, line: &str, variable: &str) -> Result<Expr, EngineError> {
        let parsed = self.engine.parse_latex(line)?;
        let expr = match parsed {
            Expr::Eq(lhs, rhs) if !rhs.contains_symbol(variable) && lhs.contains_symbol(variable) => {
                return Err(EngineError::Unsupported(format!(
                    "only the right-hand side may depend on {}",
                    variable
                )))
            }
            Expr::Eq(lhs, rhs) => match *lhs {
                Expr::Sym(_) => *rhs,
                Expr::Mul(ref factors) if factors.iter().all(|f| matches!(f, Expr::Sym(_))) => *rhs,
                _ => return Err(EngineError::Unsupported("equations cannot be plotted".to_string())),
            },
            other => other,
        };
        self.engine.simplify(&expr)
    }

    fn series(&self, line: &str, index: usize, variable: &str, legend: bool) -> Result<PlotSeries, String> {
        let expr = self
            .curve(line, variable)
            .map_err(|e| format!("unable to parse or convert function ${}$: {}", line, e))?;
        let function = rename_variable(&self.engine.to_plot_syntax(&expr), variable);
        Ok(PlotSeries {
            function,
            color: PALETTE[index % PALETTE.len()].to_string(),
            graph_type: "polyline",
            samples: self.samples,
            sampler: "builtIn",
            title: legend.then(|| format!("f_{}({}) = {}", index + 1, variable, line)),
            expr,
        })
    }

    pub fn plot(&self, request: &PlotRequest) -> Result<PlotOutcome, PlotError> {
        let lines: Vec<&str> = request
            .formulas
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() {
            return Err(PlotError::NoExpressions);
        }

        let variable = match request.variable.trim() {
            "" => PLOT_VARIABLE.to_string(),
            v => v.trim_start_matches('\\').to_string(),
        };

        let mut data = Vec::with_capacity(lines.len());
        let mut errors = Vec::new();
        for (index, line) in lines.iter().enumerate() {
            match self.series(line, index, &variable, request.legend) {
                Ok(series) => data.push(series),
                Err(message) => errors.push(message),
            }
        }
        if data.is_empty() {
            return Err(PlotError::AllFailed(errors));
        }
        debug!(series = data.len(), failed = errors.len(), "Plot series built");

        let title = format!(
            "Function plot: {}",
            lines.iter().map(|l| format!("${}$", l)).collect::<Vec<_>>().join(", ")
        );
        let config = PlotConfig {
            title,
            width: self.width,
            height: PLOT_HEIGHT,
            tip: Tip { x_line: true, y_line: true },
            x_axis: Axis {
                label: variable.clone(),
                domain: request.axes.x_domain(),
            },
            y_axis: Axis {
                label: format!("f({})", variable),
                domain: request.axes.y_domain(),
            },
            grid: request.grid,
            legend: request.legend.then_some(Legend { position: "bottom" }),
            data,
        };

        let mut warnings = Vec::new();
        let svg = match chart::render_svg(&config, &variable) {
            Ok(svg) => Some(svg),
            Err(e) => {
                warn!("Static chart rendering failed: {}", e);
                warnings.push(format!("The static chart could not be drawn: {}", e));
                None
            }
        };

        Ok(PlotOutcome {
            config,
            errors,
            svg,
            warnings,
        })
    }
}
