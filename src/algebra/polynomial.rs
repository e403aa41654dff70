//! Polynomial expansion, coefficient extraction and factoring over the rationals.

use std::collections::BTreeSet;

use super::expr::Expr;
use super::number::Number;
use super::normalize::{self, normalize};
use super::EngineError;

const MAX_EXPANSION_EXPONENT: i64 = 32;
/// Highest degree accepted when reading an expression as a polynomial.
pub const MAX_DEGREE: usize = 1024;
/// Bound on |coefficient| for divisor enumeration in the rational root search.
const MAX_ROOT_SEARCH: i128 = 1_000_000_000_000;

/// Distribute products over sums and expand non-negative integer powers of sums.
pub fn expand(expr: &Expr) -> Result<Expr, EngineError> {
    let expr = normalize(expr)?;
    expand_simplified(&expr)
}

fn expand_simplified(expr: &Expr) -> Result<Expr, EngineError> {
    match expr {
        Expr::Add(items) => normalize::add(items.iter().map(expand_simplified).collect::<Result<_, _>>()?),
        Expr::Mul(items) => {
            let mut product = Expr::one();
            for item in items {
                product = distribute(&product, &expand_simplified(item)?)?;
            }
            Ok(product)
        }
        Expr::Pow(b, e) => {
            let base = expand_simplified(b)?;
            match (e.as_number().and_then(Number::as_integer), &base) {
                (Some(n), Expr::Add(_)) if (2..=MAX_EXPANSION_EXPONENT).contains(&n) => {
                    let mut product = base.clone();
                    for _ in 1..n {
                        product = distribute(&product, &base)?;
                    }
                    Ok(product)
                }
                (Some(n), Expr::Add(_)) if n > MAX_EXPANSION_EXPONENT => Err(EngineError::Unsupported(
                    format!("exponent {} is too large to expand", n),
                )),
                _ => normalize::pow(base, expand_simplified(e)?),
            }
        }
        Expr::Func(f, a) => normalize::func(*f, expand_simplified(a)?),
        Expr::Eq(l, r) => Ok(Expr::Eq(Box::new(expand_simplified(l)?), Box::new(expand_simplified(r)?))),
        Expr::Num(_) | Expr::Sym(_) | Expr::Const(_) => Ok(expr.clone()),
    }
}

fn terms(expr: &Expr) -> Vec<Expr> {
    match expr {
        Expr::Add(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn distribute(a: &Expr, b: &Expr) -> Result<Expr, EngineError> {
    let mut out = Vec::new();
    for left in terms(a) {
        for right in terms(b) {
            out.push(normalize::mul(vec![left.clone(), right])?);
        }
    }
    normalize::add(out)
}

/// Coefficients of `expr` as a polynomial in `var`, lowest degree first.
/// `None` when `var` appears other than in non-negative integer powers.
pub fn coefficients(expr: &Expr, var: &str) -> Result<Option<Vec<Expr>>, EngineError> {
    let expanded = expand(expr)?;
    let mut buckets: Vec<Vec<Expr>> = Vec::new();
    for term in terms(&expanded) {
        let factors = match term {
            Expr::Mul(items) => items,
            other => vec![other],
        };
        let mut power = 0usize;
        let mut rest = Vec::new();
        for factor in factors {
            let step = match &factor {
                Expr::Sym(s) if s == var => 1,
                Expr::Pow(b, e) if matches!(&**b, Expr::Sym(s) if s == var) => {
                    match e.as_number().and_then(Number::as_integer) {
                        Some(n) if n > 0 => usize::try_from(n).unwrap_or(usize::MAX),
                        _ => return Ok(None),
                    }
                }
                f if f.contains_symbol(var) => return Ok(None),
                _ => {
                    rest.push(factor);
                    continue;
                }
            };
            power = power.saturating_add(step);
            if power > MAX_DEGREE {
                return Err(EngineError::Unsupported(format!(
                    "polynomials of degree above {} are not supported",
                    MAX_DEGREE
                )));
            }
        }
        if buckets.len() <= power {
            buckets.resize(power + 1, Vec::new());
        }
        buckets[power].push(normalize::mul(rest)?);
    }
    let mut coeffs = buckets
        .into_iter()
        .map(normalize::add)
        .collect::<Result<Vec<_>, _>>()?;
    while coeffs.len() > 1 && coeffs.last().is_some_and(Expr::is_zero) {
        coeffs.pop();
    }
    if coeffs.is_empty() {
        coeffs.push(Expr::zero());
    }
    Ok(Some(coeffs))
}

/// Exact rational coefficients, if every coefficient is one.
pub fn rational_coefficients(coeffs: &[Expr]) -> Option<Vec<(i64, i64)>> {
    coeffs
        .iter()
        .map(|c| match c.as_number()? {
            Number::Rational(n, d) => Some((n, d)),
            Number::Real(_) => None,
        })
        .collect()
}

fn gcd(a: i128, b: i128) -> i128 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// A polynomial with rational coefficients split into `content * primitive`,
/// where `primitive` has coprime integer coefficients and a positive leading term.
pub struct Primitive {
    pub content: Number,
    pub coeffs: Vec<i128>,
}

pub fn primitive_part(coeffs: &[(i64, i64)]) -> Option<Primitive> {
    let mut lcm: i128 = 1;
    for &(_, d) in coeffs {
        let d = d as i128;
        lcm = lcm.checked_mul(d / gcd(lcm, d))?;
    }
    let scaled: Vec<i128> = coeffs
        .iter()
        .map(|&(n, d)| (n as i128).checked_mul(lcm / d as i128))
        .collect::<Option<_>>()?;
    let mut g = scaled.iter().fold(0, |acc, &c| gcd(acc, c));
    if g == 0 {
        return None;
    }
    if scaled.last().is_some_and(|&c| c < 0) {
        g = -g;
    }
    let content = Number::rational(i64::try_from(g).ok()?, i64::try_from(lcm).ok()?)?;
    Some(Primitive {
        content,
        coeffs: scaled.iter().map(|c| c / g).collect(),
    })
}

fn divisors(n: i128) -> Vec<i128> {
    let n = n.abs();
    let mut out = Vec::new();
    let mut i = 1;
    while i * i <= n {
        if n % i == 0 {
            out.push(i);
            if i * i != n {
                out.push(n / i);
            }
        }
        i += 1;
    }
    out.sort_unstable();
    out
}

/// Whether `p/q` is a root, evaluated as `sum c_k p^k q^(n-k)` in exact integers.
fn vanishes_at(coeffs: &[i128], p: i128, q: i128) -> bool {
    let mut acc: i128 = 0;
    let mut q_pow: i128 = 1;
    // Horner on the homogenised polynomial, leading coefficient first
    for &c in coeffs.iter().rev() {
        let step = acc
            .checked_mul(p)
            .zip(c.checked_mul(q_pow))
            .and_then(|(a, b)| a.checked_add(b));
        match (step, q_pow.checked_mul(q)) {
            (Some(next), Some(next_q)) => {
                acc = next;
                q_pow = next_q;
            }
            _ => return false,
        }
    }
    acc == 0
}

/// Divide by `(q x - p)`; exact for a primitive polynomial with root `p/q`.
fn deflate(coeffs: &[i128], p: i128, q: i128) -> Option<Vec<i128>> {
    let n = coeffs.len() - 1;
    let mut quotient = vec![0i128; n];
    let mut next: i128 = 0;
    for k in (1..=n).rev() {
        let numerator = coeffs[k].checked_add(p.checked_mul(next)?)?;
        if numerator % q != 0 {
            return None;
        }
        next = numerator / q;
        quotient[k - 1] = next;
    }
    Some(quotient)
}

/// Rational roots `(p, q, multiplicity)` of a primitive integer polynomial,
/// ascending, with the residual factor left after dividing them out.
pub fn rational_roots(coeffs: &[i128]) -> (Vec<(i128, i128, usize)>, Vec<i128>) {
    let mut poly = coeffs.to_vec();
    let mut roots = Vec::new();

    let zeros = poly.iter().take_while(|&&c| c == 0).count();
    if zeros > 0 && zeros < poly.len() {
        poly.drain(..zeros);
        roots.push((0, 1, zeros));
    }
    if poly.len() < 2 {
        return (roots, poly);
    }

    let constant = poly[0];
    let leading = poly[poly.len() - 1];
    if constant.abs() > MAX_ROOT_SEARCH || leading.abs() > MAX_ROOT_SEARCH {
        return (roots, poly);
    }
    let mut candidates: Vec<(i128, i128)> = Vec::new();
    for p in divisors(constant) {
        for q in divisors(leading) {
            if gcd(p, q) == 1 {
                candidates.push((p, q));
                candidates.push((-p, q));
            }
        }
    }
    candidates.sort_by(|a, b| (a.0 * b.1).cmp(&(b.0 * a.1)));

    for (p, q) in candidates {
        let mut multiplicity = 0;
        while poly.len() > 1 && vanishes_at(&poly, p, q) {
            match deflate(&poly, p, q) {
                Some(next) => {
                    poly = next;
                    multiplicity += 1;
                }
                None => break,
            }
        }
        if multiplicity > 0 {
            roots.push((p, q, multiplicity));
        }
    }
    roots.sort_by(|a, b| (a.0 * b.1).cmp(&(b.0 * a.1)));
    (roots, poly)
}

pub fn from_coefficients(coeffs: &[Expr], var: &str) -> Result<Expr, EngineError> {
    let terms = coeffs
        .iter()
        .enumerate()
        .map(|(k, c)| normalize::mul(vec![c.clone(), normalize::pow(Expr::sym(var), Expr::int(k as i64))?]))
        .collect::<Result<Vec<_>, _>>()?;
    normalize::add(terms)
}

fn integer_poly(coeffs: &[i128], var: &str) -> Result<Expr, EngineError> {
    let exprs = coeffs
        .iter()
        .map(|&c| i64::try_from(c).map(Expr::int))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| EngineError::Unsupported("coefficient too large".to_string()))?;
    from_coefficients(&exprs, var)
}

/// Factor over the rationals.
pub fn factor(expr: &Expr) -> Result<Expr, EngineError> {
    let expr = normalize(expr)?;
    if let Expr::Eq(..) = expr {
        return Err(EngineError::Unsupported("cannot factor an equation".to_string()));
    }
    let symbols = expr.free_symbols();
    if symbols.len() == 1 {
        if let Some(var) = symbols.iter().next() {
            if let Some(factored) = factor_univariate(&expr, var)? {
                return Ok(factored);
            }
        }
    }
    factor_common(&expr, &symbols)
}

fn factor_univariate(expr: &Expr, var: &str) -> Result<Option<Expr>, EngineError> {
    let Some(coeffs) = coefficients(expr, var)? else {
        return Ok(None);
    };
    if coeffs.len() < 2 {
        return Ok(None);
    }
    let Some(rational) = rational_coefficients(&coeffs) else {
        return Ok(None);
    };
    let Some(primitive) = primitive_part(&rational) else {
        return Ok(None);
    };
    let (roots, residual) = rational_roots(&primitive.coeffs);

    let mut factors = vec![Expr::Num(primitive.content)];
    for (p, q, multiplicity) in roots {
        let linear = integer_poly(&[-p, q], var)?;
        factors.push(normalize::pow(linear, Expr::int(multiplicity as i64))?);
    }
    match residual.as_slice() {
        [] => {}
        [c] => factors.push(Expr::int(i64::try_from(*c).unwrap_or(1))),
        _ => factors.push(integer_poly(&residual, var)?),
    }
    Ok(Some(normalize::mul(factors)?))
}

/// Pull out the numeric content and the common monomial of a sum.
fn factor_common(expr: &Expr, symbols: &BTreeSet<String>) -> Result<Expr, EngineError> {
    let Expr::Add(items) = expr else {
        return Ok(expr.clone());
    };
    let mut common = Vec::new();

    let coeffs: Option<Vec<(i64, i64)>> = items
        .iter()
        .map(|t| match t.split_coefficient().0 {
            Number::Rational(n, d) => Some((n, d)),
            Number::Real(_) => None,
        })
        .collect();
    if let Some(primitive) = coeffs.as_deref().and_then(primitive_part) {
        // keep the sign of the leading term inside the bracket
        let content = primitive.content.abs();
        if !content.is_one() {
            common.push(Expr::Num(content));
        }
    }

    for symbol in symbols {
        let min_power = items
            .iter()
            .map(|t| symbol_power(t, symbol))
            .min()
            .unwrap_or(0);
        if min_power > 0 {
            common.push(normalize::pow(Expr::sym(symbol.as_str()), Expr::int(min_power))?);
        }
    }
    if common.is_empty() {
        return Ok(expr.clone());
    }

    let divisor = normalize::mul(common)?;
    let inverse = normalize::pow(divisor.clone(), Expr::int(-1))?;
    let remaining = items
        .iter()
        .map(|t| normalize::mul(vec![t.clone(), inverse.clone()]))
        .collect::<Result<Vec<_>, _>>()?;
    let bracket = normalize::add(remaining)?;
    Ok(match divisor {
        Expr::Mul(mut factors) => {
            factors.push(bracket);
            Expr::Mul(factors)
        }
        other => Expr::Mul(vec![other, bracket]),
    })
}

fn symbol_power(term: &Expr, symbol: &str) -> i64 {
    let factors = match term {
        Expr::Mul(items) => items.as_slice(),
        other => std::slice::from_ref(other),
    };
    factors
        .iter()
        .map(|f| match f {
            Expr::Sym(s) if s == symbol => 1,
            Expr::Pow(b, e) if matches!(&**b, Expr::Sym(s) if s == symbol) => {
                e.as_number().and_then(Number::as_integer).filter(|n| *n > 0).unwrap_or(0)
            }
            _ => 0,
        })
        .fold(0, i64::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::format::plain;
    use crate::algebra::latex::parse;

    fn expanded(input: &str) -> String {
        plain(&expand(&parse(input).unwrap()).unwrap())
    }

    fn factored(input: &str) -> String {
        plain(&factor(&parse(input).unwrap()).unwrap())
    }

    #[test]
    fn test_expand_square_of_sum() {
        assert_eq!(expanded("(x+1)^2"), "x^2 + 2*x + 1");
        assert_eq!(expanded("(x+1)(x-1)"), "x^2 - 1");
    }

    #[test]
    fn test_expand_rejects_huge_exponent() {
        assert!(expand(&parse("(x+1)^{40}").unwrap()).is_err());
    }

    #[test]
    fn test_coefficients() {
        let coeffs = coefficients(&parse("3x^2 - 2x + 5").unwrap(), "x").unwrap().unwrap();
        assert_eq!(coeffs, vec![Expr::int(5), Expr::int(-2), Expr::int(3)]);
        assert!(coefficients(&parse("\\sin x").unwrap(), "x").unwrap().is_none());
    }

    #[test]
    fn test_coefficients_reject_huge_degree() {
        for input in ["x^{1000000000}", "x^{600} x^{600}", "x^{1025} + 1"] {
            let err = coefficients(&parse(input).unwrap(), "x").unwrap_err();
            assert!(err.to_string().contains("degree above 1024"), "{}: {}", input, err);
        }
        let coeffs = coefficients(&parse("x^{1024}").unwrap(), "x").unwrap().unwrap();
        assert_eq!(coeffs.len(), MAX_DEGREE + 1);
    }

    #[test]
    fn test_factor_huge_degree_is_an_error() {
        assert!(factor(&parse("x^{1000000000} - 1").unwrap()).is_err());
    }

    #[test]
    fn test_rational_roots_with_multiplicity() {
        // 2x^3 - 3x^2 + 1 = (x - 1)^2 (2x + 1)
        let (roots, residual) = rational_roots(&[1, 0, -3, 2]);
        assert_eq!(roots, vec![(-1, 2, 1), (1, 1, 2)]);
        assert_eq!(residual, vec![1]);
    }

    #[test]
    fn test_factor_difference_of_squares() {
        assert_eq!(factored("x^2 - 1"), "(x + 1)*(x - 1)");
        assert_eq!(factored("x^2 - 2x + 1"), "(x - 1)^2");
    }

    #[test]
    fn test_factor_keeps_irreducible_residual() {
        assert_eq!(factored("2x^3 + 2x"), "2*x*(x^2 + 1)");
    }

    #[test]
    fn test_factor_multivariate_common_part() {
        assert_eq!(factored("2xy + 4x"), "2*x*(y + 2)");
    }
}
