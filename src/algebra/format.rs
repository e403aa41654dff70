//! Printers: plain text, function-plot syntax and LaTeX.

use super::expr::{Constant, Expr, Func};
use super::number::{format_real, Number};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Flavor {
    Plain,
    Plot,
}

/// Plain infix text, e.g. `x^2 + 3*x - sin(x)/2`.
pub fn plain(expr: &Expr) -> String {
    infix(expr, Flavor::Plain)
}

/// Syntax accepted by function-plot's built-in evaluator.
pub fn plot(expr: &Expr) -> String {
    infix(expr, Flavor::Plot)
}

/// Separate a term into its sign and magnitude for printing sums.
fn split_sign(expr: &Expr) -> (bool, Expr) {
    match expr {
        Expr::Num(n) if n.is_negative() => (true, Expr::Num(n.neg())),
        Expr::Mul(items) => match items.first() {
            Some(Expr::Num(n)) if n.is_negative() => {
                let mut rest = items.clone();
                let magnitude = n.neg();
                if magnitude.is_one() {
                    rest.remove(0);
                } else {
                    rest[0] = Expr::Num(magnitude);
                }
                let positive = match rest.len() {
                    0 => Expr::one(),
                    1 => rest.remove(0),
                    _ => Expr::Mul(rest),
                };
                (true, positive)
            }
            _ => (false, expr.clone()),
        },
        _ => (false, expr.clone()),
    }
}

/// Split a product into numerator and denominator factors.
fn fraction_parts(items: &[Expr]) -> (Vec<Expr>, Vec<Expr>) {
    let mut num = Vec::new();
    let mut den = Vec::new();
    for item in items {
        match item {
            Expr::Num(Number::Rational(n, d)) if *d != 1 => {
                if *n != 1 {
                    num.push(Expr::int(*n));
                }
                den.push(Expr::int(*d));
            }
            Expr::Pow(b, e) => match e.as_number() {
                Some(n) if n.is_negative() => {
                    let positive = n.neg();
                    if positive.is_one() {
                        den.push((**b).clone());
                    } else {
                        den.push(Expr::pow((**b).clone(), Expr::Num(positive)));
                    }
                }
                _ => num.push(item.clone()),
            },
            other => num.push(other.clone()),
        }
    }
    (num, den)
}

fn number_text(n: Number) -> String {
    match n {
        Number::Real(v) => format_real(v),
        other => other.to_string(),
    }
}

fn infix(expr: &Expr, flavor: Flavor) -> String {
    match expr {
        Expr::Num(n) => number_text(*n),
        Expr::Sym(s) => s.clone(),
        Expr::Const(Constant::Pi) => if flavor == Flavor::Plot { "PI" } else { "pi" }.to_string(),
        Expr::Const(Constant::E) => if flavor == Flavor::Plot { "E" } else { "e" }.to_string(),
        Expr::Add(items) => {
            let mut out = String::new();
            for (i, item) in items.iter().enumerate() {
                let (negative, magnitude) = split_sign(item);
                let text = infix_factor(&magnitude, flavor, false);
                match (i, negative) {
                    (0, true) => out.push_str(&format!("-{}", text)),
                    (0, false) => out.push_str(&text),
                    (_, true) => out.push_str(&format!(" - {}", text)),
                    (_, false) => out.push_str(&format!(" + {}", text)),
                }
            }
            out
        }
        Expr::Mul(items) => {
            let (negative, magnitude) = split_sign(expr);
            if negative {
                return format!("-{}", infix_factor(&magnitude, flavor, true));
            }
            let (num, den) = fraction_parts(items);
            let num_text = if num.is_empty() {
                "1".to_string()
            } else {
                num.iter()
                    .map(|f| infix_factor(f, flavor, true))
                    .collect::<Vec<_>>()
                    .join("*")
            };
            if den.is_empty() {
                return num_text;
            }
            let den_text = if den.len() == 1 {
                infix_factor(&den[0], flavor, true)
            } else {
                format!(
                    "({})",
                    den.iter().map(|f| infix_factor(f, flavor, true)).collect::<Vec<_>>().join("*")
                )
            };
            format!("{}/{}", num_text, den_text)
        }
        Expr::Pow(b, e) => {
            if let Some(n) = e.as_number() {
                if n == Number::Rational(1, 2) {
                    return format!("sqrt({})", infix(b, flavor));
                }
                if n.is_negative() {
                    let positive = Expr::pow((**b).clone(), Expr::Num(n.neg()));
                    let den = if n.neg().is_one() { (**b).clone() } else { positive };
                    return format!("1/{}", infix_factor(&den, flavor, true));
                }
            }
            if **b == Expr::Const(Constant::E) {
                return format!("exp({})", infix(e, flavor));
            }
            format!("{}^{}", infix_atom(b, flavor), infix_atom(e, flavor))
        }
        Expr::Func(f, a) => {
            let name = match (flavor, f) {
                (Flavor::Plot, Func::Ln) => "log",
                _ => f.name(),
            };
            format!("{}({})", name, infix(a, flavor))
        }
        Expr::Eq(l, r) => format!("{} = {}", infix(l, flavor), infix(r, flavor)),
    }
}

/// Wrap sums (and, inside products, fractions) in parentheses.
fn infix_factor(expr: &Expr, flavor: Flavor, in_product: bool) -> String {
    let text = infix(expr, flavor);
    let needs_parens = match expr {
        Expr::Add(_) | Expr::Eq(..) => true,
        Expr::Num(Number::Rational(_, d)) => in_product && *d != 1,
        Expr::Num(n) => in_product && n.is_negative(),
        _ => false,
    };
    if needs_parens {
        format!("({})", text)
    } else {
        text
    }
}

fn infix_atom(expr: &Expr, flavor: Flavor) -> String {
    let text = infix(expr, flavor);
    let atomic = match expr {
        Expr::Sym(_) | Expr::Const(_) | Expr::Func(..) => true,
        Expr::Num(Number::Rational(n, 1)) => *n >= 0,
        Expr::Num(Number::Real(v)) => *v >= 0.0,
        _ => false,
    };
    if atomic {
        text
    } else {
        format!("({})", text)
    }
}

const GREEK: &[&str] = &[
    "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota", "kappa",
    "lambda", "mu", "nu", "xi", "rho", "sigma", "tau", "upsilon", "phi", "chi", "psi", "omega",
    "Gamma", "Delta", "Theta", "Lambda", "Xi", "Sigma", "Phi", "Psi", "Omega",
];

pub fn is_greek(name: &str) -> bool {
    GREEK.contains(&name)
}

fn latex_symbol(name: &str) -> String {
    let (head, sub) = match name.split_once('_') {
        Some((h, s)) => (h, Some(s)),
        None => (name, None),
    };
    let head = if is_greek(head) { format!("\\{}", head) } else { head.to_string() };
    match sub {
        Some(s) if s.chars().count() == 1 => format!("{}_{}", head, s),
        Some(s) => format!("{}_{{{}}}", head, s),
        None => head,
    }
}

fn latex_number(n: Number) -> String {
    match n {
        Number::Rational(p, 1) => p.to_string(),
        Number::Rational(p, q) if p < 0 => format!("-\\frac{{{}}}{{{}}}", -p, q),
        Number::Rational(p, q) => format!("\\frac{{{}}}{{{}}}", p, q),
        Number::Real(v) => latex_real(v),
    }
}

/// `1.5e-20` as `1.5 \times 10^{-20}`.
fn latex_real(value: f64) -> String {
    let text = format_real(value);
    match text.split_once('e') {
        Some((mantissa, exponent)) => format!("{} \\times 10^{{{}}}", mantissa, exponent),
        None => text,
    }
}

/// LaTeX rendering, e.g. `\frac{x^{2}}{2} + \sin\left(x\right)`.
pub fn latex(expr: &Expr) -> String {
    match expr {
        Expr::Num(n) => latex_number(*n),
        Expr::Sym(s) => latex_symbol(s),
        Expr::Const(Constant::Pi) => "\\pi".to_string(),
        Expr::Const(Constant::E) => "e".to_string(),
        Expr::Add(items) => {
            let mut out = String::new();
            for (i, item) in items.iter().enumerate() {
                let (negative, magnitude) = split_sign(item);
                let text = latex_factor(&magnitude);
                match (i, negative) {
                    (0, true) => out.push_str(&format!("-{}", text)),
                    (0, false) => out.push_str(&text),
                    (_, true) => out.push_str(&format!(" - {}", text)),
                    (_, false) => out.push_str(&format!(" + {}", text)),
                }
            }
            out
        }
        Expr::Mul(items) => {
            let (negative, magnitude) = split_sign(expr);
            if negative {
                return format!("-{}", latex_factor(&magnitude));
            }
            let (num, den) = fraction_parts(items);
            let num_text = latex_product(&num);
            if den.is_empty() {
                return num_text;
            }
            format!("\\frac{{{}}}{{{}}}", num_text, latex_product(&den))
        }
        Expr::Pow(b, e) => {
            if let Some(n) = e.as_number() {
                if let Number::Rational(1, q) = n {
                    if q == 2 {
                        return format!("\\sqrt{{{}}}", latex(b));
                    }
                    if q > 2 {
                        return format!("\\sqrt[{}]{{{}}}", q, latex(b));
                    }
                }
                if n.is_negative() {
                    let den = if n.neg().is_one() {
                        (**b).clone()
                    } else {
                        Expr::pow((**b).clone(), Expr::Num(n.neg()))
                    };
                    return format!("\\frac{{1}}{{{}}}", latex(&den));
                }
            }
            format!("{}^{{{}}}", latex_base(b), latex(e))
        }
        Expr::Func(f, a) => {
            let arg = latex(a);
            match f {
                Func::Abs => format!("\\left|{}\\right|", arg),
                Func::Log10 => format!("\\log_{{10}}\\left({}\\right)", arg),
                Func::Asin => format!("\\arcsin\\left({}\\right)", arg),
                Func::Acos => format!("\\arccos\\left({}\\right)", arg),
                Func::Atan => format!("\\arctan\\left({}\\right)", arg),
                other => format!("\\{}\\left({}\\right)", other.name(), arg),
            }
        }
        Expr::Eq(l, r) => format!("{} = {}", latex(l), latex(r)),
    }
}

fn latex_product(factors: &[Expr]) -> String {
    if factors.is_empty() {
        return "1".to_string();
    }
    let mut out = String::new();
    for (i, factor) in factors.iter().enumerate() {
        let text = latex_factor(factor);
        if i > 0 {
            let starts_numeric = text.starts_with(|c: char| c.is_ascii_digit() || c == '-');
            out.push_str(if starts_numeric { " \\cdot " } else { " " });
        }
        out.push_str(&text);
    }
    out
}

fn latex_factor(expr: &Expr) -> String {
    match expr {
        Expr::Add(_) | Expr::Eq(..) => format!("\\left({}\\right)", latex(expr)),
        _ => latex(expr),
    }
}

fn latex_base(expr: &Expr) -> String {
    match expr {
        Expr::Sym(_) | Expr::Const(_) => latex(expr),
        Expr::Num(Number::Rational(n, 1)) if *n >= 0 => latex(expr),
        _ => format!("\\left({}\\right)", latex(expr)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expr {
        Expr::sym("x")
    }

    #[test]
    fn test_plain_sum_with_negative_terms() {
        let e = Expr::Add(vec![
            Expr::pow(x(), Expr::int(2)),
            Expr::Mul(vec![Expr::int(-3), x()]),
            Expr::int(-1),
        ]);
        assert_eq!(plain(&e), "x^2 - 3*x - 1");
    }

    #[test]
    fn test_plot_flavor_names() {
        let e = Expr::Add(vec![Expr::func(Func::Ln, x()), Expr::Const(Constant::Pi)]);
        assert_eq!(plot(&e), "log(x) + PI");
        assert_eq!(plain(&e), "ln(x) + pi");
    }

    #[test]
    fn test_latex_fraction_and_root() {
        let e = Expr::Mul(vec![Expr::Num(Number::Rational(1, 3)), Expr::pow(x(), Expr::int(3))]);
        assert_eq!(latex(&e), "\\frac{x^{3}}{3}");
        assert_eq!(latex(&Expr::pow(x(), Expr::half())), "\\sqrt{x}");
    }

    #[test]
    fn test_latex_greek_and_subscript() {
        assert_eq!(latex(&Expr::sym("theta")), "\\theta");
        assert_eq!(latex(&Expr::sym("x_12")), "x_{12}");
    }

    #[test]
    fn test_latex_scientific_real() {
        assert_eq!(latex(&Expr::Num(Number::Real(1e-20))), "1 \\times 10^{-20}");
        assert_eq!(latex(&Expr::Num(Number::Real(0.5))), "0.5");
    }

    #[test]
    fn test_latex_function() {
        let e = Expr::Mul(vec![Expr::int(2), Expr::func(Func::Cos, x())]);
        assert_eq!(latex(&e), "2 \\cos\\left(x\\right)");
    }
}
