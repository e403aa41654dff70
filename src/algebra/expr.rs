//! Expression tree for the symbolic engine.
//!
//! Subtraction and division are not separate nodes: `a - b` is
//! `Add[a, Mul[-1, b]]` and `a / b` is `Mul[a, Pow(b, -1)]`.

use std::collections::{BTreeSet, HashMap};

use super::number::Number;
use super::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Constant {
    Pi,
    E,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Cot,
    Sec,
    Csc,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    /// Natural logarithm.
    Ln,
    /// Base-10 logarithm.
    Log10,
    Abs,
}

impl Func {
    pub fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Cot => "cot",
            Func::Sec => "sec",
            Func::Csc => "csc",
            Func::Asin => "asin",
            Func::Acos => "acos",
            Func::Atan => "atan",
            Func::Sinh => "sinh",
            Func::Cosh => "cosh",
            Func::Tanh => "tanh",
            Func::Ln => "ln",
            Func::Log10 => "log10",
            Func::Abs => "abs",
        }
    }

    /// The inverse function, for `\sin^{-1}` style input.
    pub fn inverse(self) -> Option<Func> {
        match self {
            Func::Sin => Some(Func::Asin),
            Func::Cos => Some(Func::Acos),
            Func::Tan => Some(Func::Atan),
            Func::Asin => Some(Func::Sin),
            Func::Acos => Some(Func::Cos),
            Func::Atan => Some(Func::Tan),
            _ => None,
        }
    }

    pub fn apply(self, x: f64) -> f64 {
        match self {
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tan => x.tan(),
            Func::Cot => 1.0 / x.tan(),
            Func::Sec => 1.0 / x.cos(),
            Func::Csc => 1.0 / x.sin(),
            Func::Asin => x.asin(),
            Func::Acos => x.acos(),
            Func::Atan => x.atan(),
            Func::Sinh => x.sinh(),
            Func::Cosh => x.cosh(),
            Func::Tanh => x.tanh(),
            Func::Ln => x.ln(),
            Func::Log10 => x.log10(),
            Func::Abs => x.abs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(Number),
    Sym(String),
    Const(Constant),
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Func(Func, Box<Expr>),
    /// An equation `lhs = rhs`; only meaningful at the top level.
    Eq(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn int(n: i64) -> Expr {
        Expr::Num(Number::int(n))
    }

    pub fn zero() -> Expr {
        Expr::int(0)
    }

    pub fn one() -> Expr {
        Expr::int(1)
    }

    pub fn half() -> Expr {
        Expr::Num(Number::Rational(1, 2))
    }

    pub fn sym(name: impl Into<String>) -> Expr {
        Expr::Sym(name.into())
    }

    pub fn add(a: Expr, b: Expr) -> Expr {
        Expr::Add(vec![a, b])
    }

    pub fn sub(a: Expr, b: Expr) -> Expr {
        Expr::Add(vec![a, Expr::neg(b)])
    }

    pub fn mul(a: Expr, b: Expr) -> Expr {
        Expr::Mul(vec![a, b])
    }

    pub fn div(a: Expr, b: Expr) -> Expr {
        Expr::Mul(vec![a, Expr::recip(b)])
    }

    pub fn neg(a: Expr) -> Expr {
        match a {
            Expr::Num(n) => Expr::Num(n.neg()),
            other => Expr::Mul(vec![Expr::int(-1), other]),
        }
    }

    pub fn recip(a: Expr) -> Expr {
        Expr::pow(a, Expr::int(-1))
    }

    pub fn pow(base: Expr, exp: Expr) -> Expr {
        Expr::Pow(Box::new(base), Box::new(exp))
    }

    pub fn func(f: Func, arg: Expr) -> Expr {
        Expr::Func(f, Box::new(arg))
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Expr::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_number().is_some_and(Number::is_zero)
    }

    pub fn is_one(&self) -> bool {
        self.as_number().is_some_and(Number::is_one)
    }

    pub fn contains_symbol(&self, name: &str) -> bool {
        match self {
            Expr::Sym(s) => s == name,
            Expr::Num(_) | Expr::Const(_) => false,
            Expr::Add(items) | Expr::Mul(items) => items.iter().any(|e| e.contains_symbol(name)),
            Expr::Pow(b, e) | Expr::Eq(b, e) => b.contains_symbol(name) || e.contains_symbol(name),
            Expr::Func(_, a) => a.contains_symbol(name),
        }
    }

    /// Whether any number in the tree passes `test`.
    pub fn any_number(&self, test: &impl Fn(Number) -> bool) -> bool {
        match self {
            Expr::Num(n) => test(*n),
            Expr::Sym(_) | Expr::Const(_) => false,
            Expr::Add(items) | Expr::Mul(items) => items.iter().any(|e| e.any_number(test)),
            Expr::Pow(b, e) | Expr::Eq(b, e) => b.any_number(test) || e.any_number(test),
            Expr::Func(_, a) => a.any_number(test),
        }
    }

    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Sym(s) => {
                out.insert(s.clone());
            }
            Expr::Num(_) | Expr::Const(_) => {}
            Expr::Add(items) | Expr::Mul(items) => items.iter().for_each(|e| e.collect_symbols(out)),
            Expr::Pow(b, e) | Expr::Eq(b, e) => {
                b.collect_symbols(out);
                e.collect_symbols(out);
            }
            Expr::Func(_, a) => a.collect_symbols(out),
        }
    }

    /// Replace every occurrence of the symbol `name` with `value`.
    pub fn substitute(&self, name: &str, value: &Expr) -> Expr {
        match self {
            Expr::Sym(s) if s == name => value.clone(),
            Expr::Num(_) | Expr::Const(_) | Expr::Sym(_) => self.clone(),
            Expr::Add(items) => Expr::Add(items.iter().map(|e| e.substitute(name, value)).collect()),
            Expr::Mul(items) => Expr::Mul(items.iter().map(|e| e.substitute(name, value)).collect()),
            Expr::Pow(b, e) => Expr::pow(b.substitute(name, value), e.substitute(name, value)),
            Expr::Eq(l, r) => Expr::Eq(
                Box::new(l.substitute(name, value)),
                Box::new(r.substitute(name, value)),
            ),
            Expr::Func(f, a) => Expr::func(*f, a.substitute(name, value)),
        }
    }

    /// Numeric evaluation. Symbols must be bound in `vars`.
    pub fn eval(&self, vars: &HashMap<String, f64>) -> Result<f64, EngineError> {
        match self {
            Expr::Num(n) => Ok(n.to_f64()),
            Expr::Const(Constant::Pi) => Ok(std::f64::consts::PI),
            Expr::Const(Constant::E) => Ok(std::f64::consts::E),
            Expr::Sym(s) => vars
                .get(s)
                .copied()
                .ok_or_else(|| EngineError::Evaluation(format!("expression still depends on '{}'", s))),
            Expr::Add(items) => items.iter().try_fold(0.0, |acc, e| Ok(acc + e.eval(vars)?)),
            Expr::Mul(items) => items.iter().try_fold(1.0, |acc, e| Ok(acc * e.eval(vars)?)),
            Expr::Pow(b, e) => Ok(b.eval(vars)?.powf(e.eval(vars)?)),
            Expr::Func(f, a) => Ok(f.apply(a.eval(vars)?)),
            Expr::Eq(..) => Err(EngineError::Unsupported(
                "an equation has no numeric value".to_string(),
            )),
        }
    }

    /// Split a term into its numeric coefficient and the remaining factor.
    pub fn split_coefficient(&self) -> (Number, Expr) {
        match self {
            Expr::Num(n) => (*n, Expr::one()),
            Expr::Mul(items) => {
                let mut coeff = Number::int(1);
                let mut rest = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Expr::Num(n) => coeff = coeff.mul(*n),
                        other => rest.push(other.clone()),
                    }
                }
                let rest = match rest.len() {
                    0 => Expr::one(),
                    1 => rest.remove(0),
                    _ => Expr::Mul(rest),
                };
                (coeff, rest)
            }
            other => (Number::int(1), other.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_and_eval() {
        let e = Expr::add(Expr::pow(Expr::sym("x"), Expr::int(2)), Expr::sym("y"));
        let e = e.substitute("x", &Expr::int(3));
        let mut vars = HashMap::new();
        vars.insert("y".to_string(), 1.0);
        assert_eq!(e.eval(&vars).unwrap(), 10.0);
    }

    #[test]
    fn test_eval_reports_unbound_symbol() {
        let err = Expr::sym("t").eval(&HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("'t'"));
    }

    #[test]
    fn test_split_coefficient() {
        let term = Expr::Mul(vec![Expr::int(-3), Expr::sym("x")]);
        let (c, rest) = term.split_coefficient();
        assert_eq!(c, Number::int(-3));
        assert_eq!(rest, Expr::sym("x"));
    }
}
