//! Polynomial equation solving.

use super::expr::Expr;
use super::number::Number;
use super::polynomial::{coefficients, primitive_part, rational_coefficients, rational_roots};
use super::normalize::{self, normalize};
use super::EngineError;

/// Raw solver result. The dispatcher normalises it into a solution list.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutput {
    /// Every value satisfies the equation (`0 = 0`), so no finite list exists.
    Unrepresentable,
    Single(Expr),
    /// Possibly empty.
    Multiple(Vec<Expr>),
}

impl SolveOutput {
    fn from_roots(mut roots: Vec<Expr>) -> Self {
        match roots.len() {
            1 => SolveOutput::Single(roots.remove(0)),
            _ => SolveOutput::Multiple(roots),
        }
    }
}

/// Solve `expr = 0` (or the equation `lhs = rhs`) for `var`.
pub fn solve(expr: &Expr, var: &str) -> Result<SolveOutput, EngineError> {
    let target = match expr {
        Expr::Eq(l, r) => normalize(&Expr::sub((**l).clone(), (**r).clone()))?,
        other => normalize(other)?,
    };
    if !target.contains_symbol(var) {
        return Ok(if target.is_zero() {
            SolveOutput::Unrepresentable
        } else {
            SolveOutput::Multiple(Vec::new())
        });
    }
    let coeffs = coefficients(&target, var)?.ok_or_else(|| {
        EngineError::Unsupported(format!("cannot solve for {}: not a polynomial in {}", var, var))
    })?;

    let roots = match rational_coefficients(&coeffs).as_deref().and_then(primitive_part) {
        Some(primitive) => exact_roots(&primitive.coeffs, var)?,
        None => closed_form(&coeffs)?,
    };
    Ok(SolveOutput::from_roots(roots))
}

/// Rational roots first, then closed forms for whatever is left.
fn exact_roots(coeffs: &[i128], var: &str) -> Result<Vec<Expr>, EngineError> {
    let (found, residual) = rational_roots(coeffs);
    let mut roots = Vec::new();
    for (p, q, _) in found {
        let root = i64::try_from(p)
            .ok()
            .zip(i64::try_from(q).ok())
            .and_then(|(p, q)| Number::rational(p, q))
            .ok_or_else(|| EngineError::Unsupported("root is out of range".to_string()))?;
        roots.push(Expr::Num(root));
    }
    if residual.len() > 1 {
        let residual = residual
            .iter()
            .map(|&c| i64::try_from(c).map(Expr::int))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| EngineError::Unsupported(format!("coefficients too large to solve for {}", var)))?;
        roots.extend(closed_form(&residual)?);
    }
    Ok(roots)
}

/// Linear and quadratic formulas over arbitrary coefficient expressions.
fn closed_form(coeffs: &[Expr]) -> Result<Vec<Expr>, EngineError> {
    match coeffs {
        [_] => Ok(Vec::new()),
        [c0, c1] => Ok(vec![normalize(&Expr::neg(Expr::div(c0.clone(), c1.clone())))?]),
        [c, b, a] => {
            let discriminant = normalize(&Expr::sub(
                Expr::pow(b.clone(), Expr::int(2)),
                Expr::Mul(vec![Expr::int(4), a.clone(), c.clone()]),
            ))?;
            if discriminant.as_number().is_some_and(Number::is_negative) {
                return Ok(Vec::new());
            }
            let denominator = Expr::mul(Expr::int(2), a.clone());
            if discriminant.is_zero() {
                return Ok(vec![normalize(&Expr::div(Expr::neg(b.clone()), denominator))?]);
            }
            let root = normalize::pow(discriminant, Expr::half())?;
            let minus = normalize(&Expr::div(Expr::sub(Expr::neg(b.clone()), root.clone()), denominator.clone()))?;
            let plus = normalize(&Expr::div(Expr::add(Expr::neg(b.clone()), root), denominator))?;
            Ok(vec![minus, plus])
        }
        _ => Err(EngineError::Unsupported(format!(
            "no closed form for a polynomial of degree {}",
            coeffs.len() - 1
        ))),
    }
}
