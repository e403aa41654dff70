//! Table-driven integration over normalized expressions.

use super::expr::{Constant, Expr, Func};
use super::format;
use super::polynomial;
use super::normalize::normalize;
use super::EngineError;

/// Antiderivative of `expr` with respect to `var`, without the constant.
pub fn integrate(expr: &Expr, var: &str) -> Result<Expr, EngineError> {
    let expr = normalize(expr)?;
    if let Expr::Eq(..) = expr {
        return Err(EngineError::Unsupported("cannot integrate an equation".to_string()));
    }
    normalize(&antiderivative(&expr, var)?)
}

fn unable(expr: &Expr) -> EngineError {
    EngineError::Unsupported(format!("unable to integrate {}", format::plain(expr)))
}

/// `Some(a)` when `u` is `a*var + b` with `a` constant and non-zero.
fn linear_slope(u: &Expr, var: &str) -> Result<Option<Expr>, EngineError> {
    Ok(match polynomial::coefficients(u, var)? {
        Some(mut coeffs) if coeffs.len() == 2 => coeffs.pop(),
        _ => None,
    })
}

fn antiderivative(expr: &Expr, var: &str) -> Result<Expr, EngineError> {
    if !expr.contains_symbol(var) {
        return Ok(Expr::mul(expr.clone(), Expr::sym(var)));
    }
    match expr {
        Expr::Sym(_) => Ok(Expr::mul(Expr::half(), Expr::pow(expr.clone(), Expr::int(2)))),
        Expr::Add(items) => Ok(Expr::Add(
            items.iter().map(|e| antiderivative(e, var)).collect::<Result<_, _>>()?,
        )),
        Expr::Mul(items) => {
            let (constant, dependent): (Vec<Expr>, Vec<Expr>) =
                items.iter().cloned().partition(|f| !f.contains_symbol(var));
            if dependent.len() == 1 {
                let inner = antiderivative(&dependent[0], var)?;
                let mut factors = constant;
                factors.push(inner);
                return Ok(Expr::Mul(factors));
            }
            integrate_expanded(expr, var)
        }
        Expr::Pow(b, e) => {
            let (b, e) = (&**b, &**e);
            if !e.contains_symbol(var) {
                if let Some(slope) = linear_slope(b, var)? {
                    if e.as_number().is_some_and(|n| n == super::number::Number::int(-1)) {
                        return Ok(Expr::div(Expr::func(Func::Ln, Expr::func(Func::Abs, b.clone())), slope));
                    }
                    let raised = normalize(&Expr::add(e.clone(), Expr::one()))?;
                    return Ok(Expr::div(Expr::pow(b.clone(), raised.clone()), Expr::mul(raised, slope)));
                }
                return integrate_expanded(expr, var);
            }
            if !b.contains_symbol(var) {
                if let Some(slope) = linear_slope(e, var)? {
                    let scale = if *b == Expr::Const(Constant::E) {
                        slope
                    } else {
                        Expr::mul(slope, Expr::func(Func::Ln, b.clone()))
                    };
                    return Ok(Expr::div(expr.clone(), scale));
                }
            }
            Err(unable(expr))
        }
        Expr::Func(f, u) => {
            let Some(slope) = linear_slope(u, var)? else {
                return Err(unable(expr));
            };
            let u = (**u).clone();
            let primitive = match f {
                Func::Sin => Expr::neg(Expr::func(Func::Cos, u)),
                Func::Cos => Expr::func(Func::Sin, u),
                Func::Tan => Expr::neg(Expr::func(Func::Ln, Expr::func(Func::Abs, Expr::func(Func::Cos, u)))),
                Func::Sinh => Expr::func(Func::Cosh, u),
                Func::Cosh => Expr::func(Func::Sinh, u),
                Func::Tanh => Expr::func(Func::Ln, Expr::func(Func::Cosh, u)),
                Func::Ln => Expr::sub(Expr::mul(u.clone(), Expr::func(Func::Ln, u.clone())), u),
                Func::Sec => Expr::func(
                    Func::Ln,
                    Expr::func(Func::Abs, Expr::add(Expr::func(Func::Sec, u.clone()), Expr::func(Func::Tan, u))),
                ),
                _ => return Err(unable(expr)),
            };
            Ok(Expr::div(primitive, slope))
        }
        Expr::Num(_) | Expr::Const(_) | Expr::Eq(..) => Err(unable(expr)),
    }
}

/// Products of several dependent factors are integrated after expansion.
fn integrate_expanded(expr: &Expr, var: &str) -> Result<Expr, EngineError> {
    let expanded = polynomial::expand(expr)?;
    match &expanded {
        Expr::Add(_) if expanded != *expr => antiderivative(&expanded, var),
        _ => Err(unable(expr)),
    }
}
