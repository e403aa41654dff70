//! Scalar values used by the symbolic engine.
//!
//! Numbers stay exact (reduced `i64` fractions) for as long as the arithmetic
//! allows and fall back to `f64` on overflow or when a real operand is mixed in.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy)]
pub enum Number {
    /// Reduced fraction, denominator always positive.
    Rational(i64, i64),
    Real(f64),
}

/// 2^53: beyond this an `f64` no longer holds every integer.
const EXACT_LIMIT: f64 = 9_007_199_254_740_992.0;

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a as i64
}

impl Number {
    pub fn int(n: i64) -> Self {
        Number::Rational(n, 1)
    }

    /// Build a reduced fraction. Returns `None` for a zero denominator.
    pub fn rational(num: i64, den: i64) -> Option<Self> {
        if den == 0 {
            return None;
        }
        if num == 0 {
            return Some(Number::Rational(0, 1));
        }
        let g = gcd(num, den).max(1);
        let (mut n, mut d) = (num / g, den / g);
        if d < 0 {
            match (n.checked_neg(), d.checked_neg()) {
                (Some(nn), Some(dd)) => {
                    n = nn;
                    d = dd;
                }
                _ => return Some(Number::Real(num as f64 / den as f64)),
            }
        }
        Some(Number::Rational(n, d))
    }

    /// Integral finite values become exact, everything else stays real.
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 {
            Number::Rational(value as i64, 1)
        } else {
            Number::Real(value)
        }
    }

    /// Parse a decimal literal such as `12`, `0.25` or `3.` exactly when it fits.
    pub fn parse_decimal(text: &str) -> Option<Self> {
        let (int_part, frac_part) = match text.split_once('.') {
            Some((i, f)) => (i, f),
            None => (text, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
            return None;
        }
        let digits = format!("{}{}", int_part, frac_part);
        let scale = 10i64.checked_pow(frac_part.len() as u32);
        match (digits.parse::<i64>(), scale) {
            (Ok(num), Some(den)) => Number::rational(num, den),
            _ => text.parse::<f64>().ok().map(Number::Real),
        }
    }

    /// The fraction with the smallest denominator (at most 10000) that matches
    /// this value to float precision; unchanged when there is none.
    pub fn rationalize(self) -> Number {
        const MAX_DENOMINATOR: i64 = 10_000;
        if let Number::Rational(_, d) = self {
            if d <= MAX_DENOMINATOR {
                return self;
            }
        }
        let value = self.to_f64();
        if !value.is_finite() || value.abs() >= EXACT_LIMIT {
            return self;
        }
        // continued-fraction convergents h/k
        let (mut h0, mut h1, mut k0, mut k1) = (0i64, 1i64, 1i64, 0i64);
        let mut x = value;
        for _ in 0..64 {
            let a = x.floor();
            if a.abs() >= EXACT_LIMIT {
                break;
            }
            let a = a as i64;
            let next = a
                .checked_mul(h1)
                .and_then(|v| v.checked_add(h0))
                .zip(a.checked_mul(k1).and_then(|v| v.checked_add(k0)));
            let Some((h2, k2)) = next else {
                break;
            };
            if k2 > MAX_DENOMINATOR {
                break;
            }
            (h0, h1, k0, k1) = (h1, h2, k1, k2);
            if (h1 as f64 / k1 as f64 - value).abs() <= 1e-12 * value.abs().max(1.0) {
                return Number::rational(h1, k1).unwrap_or(self);
            }
            let rest = x - a as f64;
            if rest == 0.0 {
                break;
            }
            x = 1.0 / rest;
        }
        self
    }

    /// A real that exact arithmetic could only have produced by overflowing.
    pub fn is_lossy(self) -> bool {
        match self {
            Number::Rational(..) => false,
            Number::Real(v) => v.abs() >= EXACT_LIMIT || (v != 0.0 && v.abs() <= 1.0 / EXACT_LIMIT),
        }
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Number::Rational(n, d) => n as f64 / d as f64,
            Number::Real(v) => v,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Rational(n, _) => n == 0,
            Number::Real(v) => v == 0.0,
        }
    }

    pub fn is_one(self) -> bool {
        match self {
            Number::Rational(n, d) => n == 1 && d == 1,
            Number::Real(v) => v == 1.0,
        }
    }

    pub fn is_negative(self) -> bool {
        self.to_f64() < 0.0
    }

    pub fn is_integer(self) -> bool {
        match self {
            Number::Rational(_, d) => d == 1,
            Number::Real(_) => false,
        }
    }

    pub fn as_integer(self) -> Option<i64> {
        match self {
            Number::Rational(n, 1) => Some(n),
            _ => None,
        }
    }

    pub fn is_exact(self) -> bool {
        matches!(self, Number::Rational(..))
    }

    pub fn neg(self) -> Self {
        match self {
            Number::Rational(n, d) => match n.checked_neg() {
                Some(n) => Number::Rational(n, d),
                None => Number::Real(-(n as f64) / d as f64),
            },
            Number::Real(v) => Number::Real(-v),
        }
    }

    pub fn abs(self) -> Self {
        if self.is_negative() {
            self.neg()
        } else {
            self
        }
    }

    pub fn add(self, other: Number) -> Number {
        if let (Number::Rational(a, b), Number::Rational(c, d)) = (self, other) {
            let exact = a
                .checked_mul(d)
                .zip(c.checked_mul(b))
                .and_then(|(x, y)| x.checked_add(y))
                .zip(b.checked_mul(d));
            if let Some((num, den)) = exact {
                if let Some(n) = Number::rational(num, den) {
                    return n;
                }
            }
        }
        Number::Real(self.to_f64() + other.to_f64())
    }

    pub fn sub(self, other: Number) -> Number {
        self.add(other.neg())
    }

    pub fn mul(self, other: Number) -> Number {
        if let (Number::Rational(a, b), Number::Rational(c, d)) = (self, other) {
            if let Some((num, den)) = a.checked_mul(c).zip(b.checked_mul(d)) {
                if let Some(n) = Number::rational(num, den) {
                    return n;
                }
            }
        }
        Number::Real(self.to_f64() * other.to_f64())
    }

    /// Division; `None` when dividing by zero.
    pub fn div(self, other: Number) -> Option<Number> {
        if other.is_zero() {
            return None;
        }
        Some(self.mul(other.recip()?))
    }

    pub fn recip(self) -> Option<Number> {
        match self {
            Number::Rational(0, _) => None,
            Number::Rational(n, d) => Number::rational(d, n),
            Number::Real(v) if v == 0.0 => None,
            Number::Real(v) => Some(Number::Real(1.0 / v)),
        }
    }

    /// Power with a numeric exponent. Returns `None` when the exact result is
    /// not representable (irrational root of a rational) or undefined.
    pub fn pow(self, exp: Number) -> Option<Number> {
        match (self, exp) {
            (Number::Rational(..), Number::Rational(p, 1)) => self.pow_int(p),
            (Number::Rational(..), Number::Rational(p, q)) => {
                let root = self.exact_root(q)?;
                root.pow_int(p)
            }
            _ => {
                let value = self.to_f64().powf(exp.to_f64());
                if value.is_finite() {
                    Some(Number::Real(value))
                } else {
                    None
                }
            }
        }
    }

    fn pow_int(self, exp: i64) -> Option<Number> {
        if exp < 0 {
            return self.recip()?.pow_int(exp.checked_neg()?);
        }
        let mut acc = Number::int(1);
        let mut base = self;
        let mut e = exp as u64;
        while e > 0 {
            if e & 1 == 1 {
                acc = acc.mul(base);
            }
            e >>= 1;
            if e > 0 {
                base = base.mul(base);
            }
        }
        Some(acc)
    }

    fn exact_root(self, degree: i64) -> Option<Number> {
        let Number::Rational(n, d) = self else {
            return None;
        };
        if degree <= 0 || degree > 64 {
            return None;
        }
        if n < 0 && degree % 2 == 0 {
            return None;
        }
        let rn = integer_root(n.abs(), degree as u32)?;
        let rd = integer_root(d, degree as u32)?;
        Number::rational(if n < 0 { -rn } else { rn }, rd)
    }
}

fn integer_root(value: i64, degree: u32) -> Option<i64> {
    if value < 2 {
        return Some(value);
    }
    let guess = (value as f64).powf(1.0 / degree as f64).round() as i64;
    for candidate in guess.saturating_sub(1)..=guess.saturating_add(1) {
        if candidate >= 0 && candidate.checked_pow(degree) == Some(value) {
            return Some(candidate);
        }
    }
    None
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Rational(a, b), Number::Rational(c, d)) => a == c && b == d,
            _ => self.to_f64() == other.to_f64(),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.to_f64().partial_cmp(&other.to_f64())
    }
}

/// Render a real with at most ten decimals and no trailing zeros. Very small
/// and very large magnitudes use scientific notation (`1.5e-20`).
pub fn format_real(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    if value.abs() < 1e-6 || value.abs() >= 1e15 {
        let text = format!("{:.9e}", value);
        return match text.split_once('e') {
            Some((mantissa, exponent)) => {
                let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
                format!("{}e{}", mantissa, exponent)
            }
            None => text,
        };
    }
    let text = format!("{:.10}", value);
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Rational(n, 1) => write!(f, "{}", n),
            Number::Rational(n, d) => write!(f, "{}/{}", n, d),
            Number::Real(v) => write!(f, "{}", format_real(*v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rational_reduction() {
        assert_eq!(Number::rational(4, -8), Some(Number::Rational(-1, 2)));
        assert_eq!(Number::rational(1, 0), None);
        assert_eq!(Number::int(3).add(Number::rational(1, 2).unwrap()), Number::Rational(7, 2));
    }

    #[test]
    fn test_decimal_literals_stay_exact() {
        assert_eq!(Number::parse_decimal("0.25"), Some(Number::Rational(1, 4)));
        assert_eq!(Number::parse_decimal("12"), Some(Number::Rational(12, 1)));
        assert_eq!(Number::parse_decimal("."), None);
    }

    #[test]
    fn test_exact_powers_and_roots() {
        assert_eq!(Number::int(2).pow(Number::int(10)), Some(Number::int(1024)));
        assert_eq!(Number::int(4).pow(Number::rational(1, 2).unwrap()), Some(Number::int(2)));
        assert_eq!(Number::int(2).pow(Number::rational(1, 2).unwrap()), None);
        assert_eq!(Number::int(2).pow(Number::int(-2)), Some(Number::Rational(1, 4)));
        assert_eq!(Number::int(0).pow(Number::int(-1)), None);
    }

    #[test]
    fn test_overflow_falls_back_to_real() {
        let big = Number::int(i64::MAX);
        assert!(!big.mul(Number::int(2)).is_exact());
    }

    #[test]
    fn test_format_real() {
        assert_eq!(format_real(2.0), "2");
        assert_eq!(format_real(0.125), "0.125");
        assert_eq!(format_real(1.0 / 3.0), "0.3333333333");
        assert_eq!(format_real(-0.0), "0");
    }

    #[test]
    fn test_format_real_extreme_magnitudes() {
        assert_eq!(format_real(1e-20), "1e-20");
        assert_eq!(format_real(-2.5e-11), "-2.5e-11");
        assert_eq!(format_real(0.000001), "0.000001");
        assert_eq!(format_real(1.5e300), "1.5e300");
        assert_eq!(format_real(1e15), "1e15");
        assert_eq!(format_real(123456789012345.5), "123456789012345.5");
        assert_eq!(format_real(9.2233720368547758e18), "9.223372037e18");
    }

    #[test]
    fn test_rationalize_recovers_small_fractions() {
        let third = Number::parse_decimal("0.3333333333333333").unwrap();
        assert_eq!(third.rationalize(), Number::Rational(1, 3));
        assert_eq!(Number::Real(-0.75).rationalize(), Number::Rational(-3, 4));
        assert_eq!(Number::Real(2.0).rationalize(), Number::int(2));
        assert!(!Number::Real(std::f64::consts::PI).rationalize().is_exact());
        assert!(!Number::Real(1e-20).rationalize().is_exact());
        assert_eq!(Number::parse_decimal("0.123456789").unwrap().rationalize(), Number::Rational(123456789, 1_000_000_000));
    }

    #[test]
    fn test_lossy_reals() {
        assert!(Number::int(i64::MAX).add(Number::int(1)).is_lossy());
        assert!(Number::Real(1e-30).is_lossy());
        assert!(!Number::Real(0.5).is_lossy());
        assert!(!Number::int(3).is_lossy());
    }
}
