// Symbolic algebra engine

pub mod calculus;
pub mod cas;
pub mod expr;
pub mod format;
pub mod latex;
pub mod normalize;
pub mod number;
pub mod polynomial;
pub mod solve;

pub use expr::{Constant, Expr, Func};
use normalize::normalize;
use number::Number;
pub use solve::SolveOutput;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("domain error: {0}")]
    Domain(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("evaluation error: {0}")]
    Evaluation(String),
}

/// Everything the operation dispatcher needs from a computer-algebra system.
///
/// Implementations must be callable from blocking worker threads.
pub trait AlgebraEngine: Send + Sync {
    fn parse_latex(&self, input: &str) -> Result<Expr, EngineError>;
    fn simplify(&self, expr: &Expr) -> Result<Expr, EngineError>;
    fn differentiate(&self, expr: &Expr, var: &str) -> Result<Expr, EngineError>;
    fn integrate(&self, expr: &Expr, var: &str) -> Result<Expr, EngineError>;
    fn solve(&self, expr: &Expr, var: &str) -> Result<SolveOutput, EngineError>;
    fn factor(&self, expr: &Expr) -> Result<Expr, EngineError>;
    fn expand(&self, expr: &Expr) -> Result<Expr, EngineError>;
    fn substitute(&self, expr: &Expr, var: &str, value: &Expr) -> Result<Expr, EngineError>;
    fn evaluate(&self, expr: &Expr) -> Result<f64, EngineError>;
    fn to_latex(&self, expr: &Expr) -> String;
    fn to_plot_syntax(&self, expr: &Expr) -> String;
}

/// Simplification, differentiation and numeric evaluation run on the
/// `symb_anafis` CAS; integration, solving, factoring and expansion are
/// polynomial and table work done in-crate on the normalized tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct Symbolic;

/// Exact input must not come back with numbers that only overflow produced.
fn exact_result(input: &Expr, output: Expr) -> Result<Expr, EngineError> {
    if !input.any_number(&|n: Number| !n.is_exact()) && output.any_number(&|n: Number| n.is_lossy()) {
        return Err(EngineError::Unsupported(
            "numbers in the result are too large to compute exactly".to_string(),
        ));
    }
    Ok(output)
}

impl AlgebraEngine for Symbolic {
    fn parse_latex(&self, input: &str) -> Result<Expr, EngineError> {
        latex::parse(input)
    }

    fn simplify(&self, expr: &Expr) -> Result<Expr, EngineError> {
        exact_result(expr, cas::simplify(&normalize(expr)?)?)
    }

    fn differentiate(&self, expr: &Expr, var: &str) -> Result<Expr, EngineError> {
        exact_result(expr, cas::differentiate(&normalize(expr)?, var)?)
    }

    fn integrate(&self, expr: &Expr, var: &str) -> Result<Expr, EngineError> {
        exact_result(expr, calculus::integrate(expr, var)?)
    }

    fn solve(&self, expr: &Expr, var: &str) -> Result<SolveOutput, EngineError> {
        Ok(match solve::solve(expr, var)? {
            SolveOutput::Single(root) => SolveOutput::Single(exact_result(expr, root)?),
            SolveOutput::Multiple(roots) => SolveOutput::Multiple(
                roots
                    .into_iter()
                    .map(|root| exact_result(expr, root))
                    .collect::<Result<_, _>>()?,
            ),
            SolveOutput::Unrepresentable => SolveOutput::Unrepresentable,
        })
    }

    fn factor(&self, expr: &Expr) -> Result<Expr, EngineError> {
        exact_result(expr, polynomial::factor(expr)?)
    }

    fn expand(&self, expr: &Expr) -> Result<Expr, EngineError> {
        exact_result(expr, polynomial::expand(expr)?)
    }

    fn substitute(&self, expr: &Expr, var: &str, value: &Expr) -> Result<Expr, EngineError> {
        self.simplify(&expr.substitute(var, value))
    }

    fn evaluate(&self, expr: &Expr) -> Result<f64, EngineError> {
        let expr = normalize(expr)?;
        if let Expr::Eq(..) = expr {
            return Err(EngineError::Unsupported("an equation has no numeric value".to_string()));
        }
        cas::evaluate(&expr)
    }

    fn to_latex(&self, expr: &Expr) -> String {
        format::latex(expr)
    }

    fn to_plot_syntax(&self, expr: &Expr) -> String {
        format::plot(expr)
    }
}
