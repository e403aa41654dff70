//! Canonical normal form.
//!
//! Sums and products are flattened, exact numbers folded, like terms and equal
//! bases collected, and the result sorted so structurally equal inputs print
//! alike. Every expression handed to or read back from the CAS passes through
//! here.

use std::cmp::Ordering;

use super::expr::{Constant, Expr, Func};
use super::format;
use super::number::Number;
use super::EngineError;

pub fn normalize(expr: &Expr) -> Result<Expr, EngineError> {
    match expr {
        Expr::Num(n) => {
            if n.to_f64().is_finite() {
                Ok(expr.clone())
            } else {
                Err(EngineError::Evaluation("result is not a finite number".to_string()))
            }
        }
        Expr::Sym(_) | Expr::Const(_) => Ok(expr.clone()),
        Expr::Add(items) => add(items.iter().map(normalize).collect::<Result<Vec<_>, _>>()?),
        Expr::Mul(items) => mul(items.iter().map(normalize).collect::<Result<Vec<_>, _>>()?),
        Expr::Pow(b, e) => pow(normalize(b)?, normalize(e)?),
        Expr::Func(f, a) => func(*f, normalize(a)?),
        Expr::Eq(l, r) => Ok(Expr::Eq(Box::new(normalize(l)?), Box::new(normalize(r)?))),
    }
}

/// Sum of already simplified terms.
pub fn add(terms: Vec<Expr>) -> Result<Expr, EngineError> {
    let mut flat = Vec::with_capacity(terms.len());
    for term in terms {
        match term {
            Expr::Add(inner) => flat.extend(inner),
            Expr::Mul(factors) => match factors.as_slice() {
                // numeric multiple of a sum inside a sum: distribute
                [Expr::Num(c), Expr::Add(inner)] => {
                    for item in inner {
                        flat.push(mul(vec![Expr::Num(*c), item.clone()])?);
                    }
                }
                _ => flat.push(Expr::Mul(factors)),
            },
            other => flat.push(other),
        }
    }

    let mut constant = Number::int(0);
    let mut groups: Vec<(Expr, Number)> = Vec::new();
    for term in flat {
        if let Expr::Num(n) = term {
            constant = constant.add(n);
            continue;
        }
        let (coeff, rest) = term.split_coefficient();
        match groups.iter_mut().find(|(r, _)| *r == rest) {
            Some(slot) => slot.1 = slot.1.add(coeff),
            None => groups.push((rest, coeff)),
        }
    }

    let mut out: Vec<Expr> = groups
        .into_iter()
        .filter(|(_, c)| !c.is_zero())
        .map(|(rest, c)| with_coefficient(c, rest))
        .collect();
    if !constant.is_zero() {
        out.push(Expr::Num(constant));
    }
    sort_terms(&mut out);

    Ok(match out.len() {
        0 => Expr::zero(),
        1 => out.remove(0),
        _ => Expr::Add(out),
    })
}

fn with_coefficient(coeff: Number, rest: Expr) -> Expr {
    if rest.is_one() {
        return Expr::Num(coeff);
    }
    if coeff.is_one() {
        return rest;
    }
    match rest {
        Expr::Mul(mut items) => {
            items.insert(0, Expr::Num(coeff));
            Expr::Mul(items)
        }
        other => Expr::Mul(vec![Expr::Num(coeff), other]),
    }
}

/// Product of already simplified factors.
pub fn mul(factors: Vec<Expr>) -> Result<Expr, EngineError> {
    let mut flat = Vec::with_capacity(factors.len());
    for factor in factors {
        match factor {
            Expr::Mul(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }

    let mut coeff = Number::int(1);
    let mut bases: Vec<(Expr, Vec<Expr>)> = Vec::new();
    for factor in flat {
        let (base, exp) = match factor {
            Expr::Num(n) => {
                coeff = coeff.mul(n);
                continue;
            }
            Expr::Pow(b, e) => (*b, *e),
            other => (other, Expr::one()),
        };
        match bases.iter_mut().find(|(b, _)| *b == base) {
            Some(slot) => slot.1.push(exp),
            None => bases.push((base, vec![exp])),
        }
    }

    let mut out = Vec::with_capacity(bases.len());
    for (base, exps) in bases {
        let exp = add(exps)?;
        match pow(base, exp)? {
            Expr::Num(n) => coeff = coeff.mul(n),
            Expr::Mul(inner) => {
                for item in inner {
                    match item {
                        Expr::Num(n) => coeff = coeff.mul(n),
                        other => out.push(other),
                    }
                }
            }
            other => out.push(other),
        }
    }

    if coeff.is_zero() {
        return Ok(Expr::zero());
    }
    if !coeff.to_f64().is_finite() {
        return Err(EngineError::Evaluation("result is not a finite number".to_string()));
    }
    sort_factors(&mut out);

    Ok(match (out.len(), coeff.is_one()) {
        (0, _) => Expr::Num(coeff),
        (1, true) => out.remove(0),
        (_, true) => Expr::Mul(out),
        _ => {
            out.insert(0, Expr::Num(coeff));
            Expr::Mul(out)
        }
    })
}

/// Power of already simplified operands.
pub fn pow(base: Expr, exp: Expr) -> Result<Expr, EngineError> {
    if exp.is_zero() {
        return Ok(Expr::one());
    }
    if exp.is_one() {
        return Ok(base);
    }
    match (&base, &exp) {
        (Expr::Num(b), Expr::Num(e)) => {
            if b.is_zero() && e.is_negative() {
                return Err(EngineError::DivisionByZero);
            }
            match b.pow(*e) {
                Some(value) => Ok(Expr::Num(value)),
                None => match extract_root(*b, *e) {
                    Some((outside, inside)) => mul(vec![Expr::Num(outside), Expr::pow(Expr::Num(inside), exp)]),
                    None => Ok(Expr::pow(base, exp)),
                },
            }
        }
        (Expr::Num(b), _) if b.is_one() => Ok(Expr::one()),
        (Expr::Pow(inner_base, inner_exp), Expr::Num(e)) if e.is_integer() => {
            let combined = mul(vec![(**inner_exp).clone(), exp.clone()])?;
            pow((**inner_base).clone(), combined)
        }
        (Expr::Mul(items), Expr::Num(e)) if e.is_integer() => {
            let powered = items
                .iter()
                .map(|f| pow(f.clone(), exp.clone()))
                .collect::<Result<Vec<_>, _>>()?;
            mul(powered)
        }
        (Expr::Const(Constant::E), Expr::Func(Func::Ln, arg)) => Ok((**arg).clone()),
        _ => Ok(Expr::pow(base, exp)),
    }
}

/// Split `b^(p/q)` into `k^p * r^(p/q)` where `k^q` is the largest q-th power dividing `b`.
fn extract_root(b: Number, e: Number) -> Option<(Number, Number)> {
    let (Number::Rational(value, 1), Number::Rational(p, q)) = (b, e) else {
        return None;
    };
    if value < 2 || q < 2 || q > 16 {
        return None;
    }
    let q = q as u32;
    let mut best = 1i64;
    let mut k = 2i64;
    while let Some(power) = k.checked_pow(q).filter(|power| *power <= value && k <= 10_000) {
        if value % power == 0 {
            best = k;
        }
        k += 1;
    }
    if best == 1 {
        return None;
    }
    let inside = value / best.pow(q);
    let outside = Number::int(best).pow(Number::int(p))?;
    Some((outside, Number::int(inside)))
}

/// Function application on an already simplified argument.
pub fn func(f: Func, arg: Expr) -> Result<Expr, EngineError> {
    if let Expr::Num(n) = arg {
        if let Some(value) = exact_function_value(f, n)? {
            return Ok(value);
        }
        if !n.is_exact() {
            let value = f.apply(n.to_f64());
            if !value.is_finite() {
                return Err(EngineError::Domain(format!(
                    "{} is undefined at {}",
                    f.name(),
                    n
                )));
            }
            return Ok(Expr::Num(Number::Real(value)));
        }
        return Ok(Expr::func(f, arg));
    }

    match (f, &arg) {
        (Func::Sin | Func::Tan, Expr::Const(Constant::Pi)) => Ok(Expr::zero()),
        (Func::Cos, Expr::Const(Constant::Pi)) => Ok(Expr::int(-1)),
        (Func::Ln, Expr::Const(Constant::E)) => Ok(Expr::one()),
        (Func::Ln, Expr::Pow(b, e)) if **b == Expr::Const(Constant::E) => Ok((**e).clone()),
        (Func::Abs, Expr::Func(Func::Abs, _)) => Ok(arg),
        _ => Ok(Expr::func(f, arg)),
    }
}

fn exact_function_value(f: Func, n: Number) -> Result<Option<Expr>, EngineError> {
    let zero = n.is_zero();
    let one = n.is_one();
    let value = match f {
        Func::Abs => Some(Expr::Num(n.abs())),
        Func::Ln | Func::Log10 if zero => {
            return Err(EngineError::Domain("logarithm of zero is undefined".to_string()))
        }
        Func::Ln | Func::Log10 if n.is_negative() => {
            return Err(EngineError::Domain(
                "logarithm of a negative number is undefined".to_string(),
            ))
        }
        Func::Ln | Func::Log10 if one => Some(Expr::zero()),
        Func::Log10 => power_of_ten(n).map(Expr::int),
        Func::Sin | Func::Tan | Func::Asin | Func::Atan | Func::Sinh | Func::Tanh if zero => {
            Some(Expr::zero())
        }
        Func::Cos | Func::Cosh | Func::Sec if zero => Some(Expr::one()),
        Func::Acos if one => Some(Expr::zero()),
        Func::Cot | Func::Csc if zero => {
            return Err(EngineError::Domain(format!("{} is undefined at 0", f.name())))
        }
        _ => None,
    };
    Ok(value)
}

fn power_of_ten(n: Number) -> Option<i64> {
    let mut value = n.as_integer()?;
    let mut k = 0;
    if value <= 0 {
        return None;
    }
    while value % 10 == 0 {
        value /= 10;
        k += 1;
    }
    (value == 1).then_some(k)
}

/// Degree used to order the terms of a sum, highest first.
pub fn degree(expr: &Expr) -> f64 {
    match expr {
        Expr::Num(_) | Expr::Const(_) | Expr::Eq(..) => 0.0,
        Expr::Sym(_) | Expr::Func(..) => 1.0,
        Expr::Pow(b, e) => match e.as_number() {
            Some(n) => degree(b) * n.to_f64(),
            None => degree(b),
        },
        Expr::Mul(items) => items.iter().map(degree).sum(),
        Expr::Add(items) => items.iter().map(degree).fold(0.0, f64::max),
    }
}

fn sort_terms(terms: &mut [Expr]) {
    terms.sort_by(|a, b| {
        degree(b)
            .partial_cmp(&degree(a))
            .unwrap_or(Ordering::Equal)
            .then_with(|| format::plain(&a.split_coefficient().1).cmp(&format::plain(&b.split_coefficient().1)))
    });
}

fn factor_rank(expr: &Expr) -> u8 {
    match expr {
        Expr::Num(_) => 0,
        Expr::Const(_) => 1,
        Expr::Sym(_) => 2,
        Expr::Pow(b, _) if matches!(**b, Expr::Sym(_)) => 2,
        Expr::Func(..) => 3,
        Expr::Pow(..) => 4,
        Expr::Add(_) => 5,
        Expr::Mul(_) | Expr::Eq(..) => 6,
    }
}

fn sort_factors(factors: &mut [Expr]) {
    factors.sort_by_cached_key(|f| {
        let key = match f {
            Expr::Pow(b, _) => format::plain(b),
            other => format::plain(other),
        };
        (factor_rank(f), key)
    });
}
