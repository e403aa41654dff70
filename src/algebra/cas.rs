//! Bridge to the `symb_anafis` computer-algebra system.
//!
//! Expressions are printed in the crate's infix syntax, simplified,
//! differentiated or evaluated there, and the textual result is read back
//! into an [`Expr`] and normalized. Symbols the crate would not accept as
//! single letters travel under letters-only aliases that are passed as known
//! symbols and mapped back on the way in.

use std::collections::HashMap;

use tracing::debug;

use super::expr::{Constant, Expr, Func};
use super::normalize::normalize;
use super::number::Number;
use super::EngineError;

/// Deepest nesting accepted when reading a result back.
const MAX_DEPTH: usize = 256;

const PI_ALIAS: &str = "qqcpi";
const E_ALIAS: &str = "qqce";

/// Workbench symbols and the names they carry inside the CAS.
#[derive(Debug, Default)]
struct Names {
    outgoing: HashMap<String, String>,
    incoming: HashMap<String, Expr>,
}

fn is_plain_letter(name: &str) -> bool {
    let mut chars = name.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_lowercase() && c != 'e' && c != 'i')
}

/// `qqva`, `qqvb`, ..., `qqvz`, `qqvba`, ...
fn alias(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push((b'a' + (index % 26) as u8) as char);
        index /= 26;
        if index == 0 {
            break;
        }
    }
    letters.reverse();
    format!("qqv{}", letters.into_iter().collect::<String>())
}

impl Names {
    fn for_expr(expr: &Expr) -> Self {
        let mut names = Names::default();
        for (index, symbol) in expr.free_symbols().into_iter().enumerate() {
            let name = if is_plain_letter(&symbol) { symbol.clone() } else { alias(index) };
            names.incoming.insert(name.clone(), Expr::Sym(symbol.clone()));
            names.outgoing.insert(symbol, name);
        }
        names.incoming.insert(PI_ALIAS.to_string(), Expr::Const(Constant::Pi));
        names.incoming.insert(E_ALIAS.to_string(), Expr::Const(Constant::E));
        names
    }

    fn name<'a>(&'a self, symbol: &'a str) -> &'a str {
        self.outgoing.get(symbol).map(String::as_str).unwrap_or(symbol)
    }

    /// Multi-letter names the CAS must treat as single symbols.
    fn known(&self) -> Vec<&str> {
        self.incoming.keys().map(String::as_str).filter(|name| name.len() > 1).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Constants {
    Symbolic,
    Numeric,
}

fn number_text(n: Number) -> String {
    match n {
        Number::Rational(p, 1) if p >= 0 => p.to_string(),
        Number::Rational(p, 1) => format!("({})", p),
        Number::Rational(p, q) => format!("({}/{})", p, q),
        // f64 Display never switches to exponent notation
        Number::Real(v) if v < 0.0 => format!("({})", v),
        Number::Real(v) => v.to_string(),
    }
}

fn print(expr: &Expr, names: &Names, constants: Constants) -> Result<String, EngineError> {
    let join = |items: &[Expr], sep: &str| -> Result<String, EngineError> {
        Ok(items
            .iter()
            .map(|e| print(e, names, constants))
            .collect::<Result<Vec<_>, _>>()?
            .join(sep))
    };
    Ok(match expr {
        Expr::Num(n) => number_text(*n),
        Expr::Sym(s) => names.name(s).to_string(),
        Expr::Const(c) => match (constants, c) {
            (Constants::Symbolic, Constant::Pi) => PI_ALIAS.to_string(),
            (Constants::Symbolic, Constant::E) => E_ALIAS.to_string(),
            (Constants::Numeric, Constant::Pi) => std::f64::consts::PI.to_string(),
            (Constants::Numeric, Constant::E) => std::f64::consts::E.to_string(),
        },
        Expr::Add(items) => format!("({})", join(items, " + ")?),
        Expr::Mul(items) => format!("({})", join(items, "*")?),
        Expr::Pow(b, e) => format!("({})^({})", print(b, names, constants)?, print(e, names, constants)?),
        Expr::Func(f, a) => {
            let arg = print(a, names, constants)?;
            match f {
                Func::Cot => format!("(1/tan({}))", arg),
                Func::Sec => format!("(1/cos({}))", arg),
                Func::Csc => format!("(1/sin({}))", arg),
                Func::Log10 => format!("(ln({})/ln(10))", arg),
                other => format!("{}({})", other.name(), arg),
            }
        }
        Expr::Eq(..) => {
            return Err(EngineError::Unsupported(
                "an equation has to be split into its sides first".to_string(),
            ))
        }
    })
}

fn backend_error(operation: &str, e: impl std::fmt::Display) -> EngineError {
    EngineError::Unsupported(format!("unable to {} this expression: {}", operation, e))
}

/// Simplify through the CAS. Both sides of an equation are simplified separately.
pub fn simplify(expr: &Expr) -> Result<Expr, EngineError> {
    match expr {
        Expr::Eq(l, r) => Ok(Expr::Eq(Box::new(simplify(l)?), Box::new(simplify(r)?))),
        Expr::Num(_) => Ok(expr.clone()),
        _ => {
            let names = Names::for_expr(expr);
            let text = print(expr, &names, Constants::Symbolic)?;
            let simplified = symb_anafis::simplify(&text, &names.known(), None)
                .map_err(|e| backend_error("simplify", e))?;
            debug!(input = %text, output = %simplified, "CAS simplify");
            read(&simplified, &names)
        }
    }
}

/// Derivative with respect to `var`, computed by the CAS.
pub fn differentiate(expr: &Expr, var: &str) -> Result<Expr, EngineError> {
    if let Expr::Eq(..) = expr {
        return Err(EngineError::Unsupported("cannot differentiate an equation".to_string()));
    }
    // the CAS rejects a variable that does not occur
    if !expr.contains_symbol(var) {
        return Ok(Expr::zero());
    }
    let names = Names::for_expr(expr);
    let text = print(expr, &names, Constants::Symbolic)?;
    let derivative = symb_anafis::diff(&text, names.name(var), &names.known(), None)
        .map_err(|e| backend_error("differentiate", e))?;
    debug!(input = %text, var = %var, output = %derivative, "CAS diff");
    read(&derivative, &names)
}

/// Numeric value of an expression without free symbols.
pub fn evaluate(expr: &Expr) -> Result<f64, EngineError> {
    if let Some(symbol) = expr.free_symbols().into_iter().next() {
        return Err(EngineError::Evaluation(format!("expression still depends on '{}'", symbol)));
    }
    if let Expr::Num(n) = expr {
        return finite(n.to_f64());
    }
    let names = Names::default();
    let text = print(expr, &names, Constants::Numeric)?;
    let no_variables: [(&str, f64); 0] = [];
    let result = symb_anafis::evaluate_str(&text, &no_variables)
        .map_err(|e| backend_error("evaluate", e))?
        .to_string();
    debug!(input = %text, output = %result, "CAS evaluate");
    let value = result
        .trim()
        .parse::<f64>()
        .map_err(|_| EngineError::Evaluation(format!("'{}' did not reduce to a number", result.trim())))?;
    finite(value)
}

fn finite(value: f64) -> Result<f64, EngineError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EngineError::Evaluation("result is not a finite number".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Lexeme {
    Num(String),
    Name(String),
    Op(char),
}

fn lex(text: &str) -> Result<Vec<Lexeme>, EngineError> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            // exponent only when digits follow, so `2e` stays a product with e
            if matches!(chars.get(i), Some('e' | 'E')) {
                let digits_at = match chars.get(i + 1) {
                    Some('+' | '-') => i + 2,
                    _ => i + 1,
                };
                if chars.get(digits_at).is_some_and(char::is_ascii_digit) {
                    i = digits_at;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            out.push(Lexeme::Num(chars[start..i].iter().collect()));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let name: String = chars[start..i].iter().collect();
            out.push(Lexeme::Name(if name == "π" { "pi".to_string() } else { name }));
        } else if c == '*' && chars.get(i + 1) == Some(&'*') {
            out.push(Lexeme::Op('^'));
            i += 2;
        } else if "+-*/^(),".contains(c) {
            out.push(Lexeme::Op(c));
            i += 1;
        } else {
            return Err(EngineError::Unsupported(format!("unexpected '{}' in a CAS result", c)));
        }
    }
    Ok(out)
}

/// Read CAS output back into a normalized expression.
fn read(text: &str, names: &Names) -> Result<Expr, EngineError> {
    let mut reader = Reader {
        lexemes: lex(text)?,
        pos: 0,
        depth: 0,
        names,
    };
    let expr = reader.sum()?;
    if let Some(extra) = reader.lexemes.get(reader.pos) {
        return Err(EngineError::Unsupported(format!("unexpected {:?} in a CAS result", extra)));
    }
    normalize(&expr)
}

struct Reader<'a> {
    lexemes: Vec<Lexeme>,
    pos: usize,
    depth: usize,
    names: &'a Names,
}

impl Reader<'_> {
    fn peek(&self) -> Option<&Lexeme> {
        self.lexemes.get(self.pos)
    }

    fn eat(&mut self, op: char) -> bool {
        if self.peek() == Some(&Lexeme::Op(op)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, op: char) -> Result<(), EngineError> {
        if self.eat(op) {
            Ok(())
        } else {
            Err(EngineError::Unsupported(format!("expected '{}' in a CAS result", op)))
        }
    }

    fn nested<T>(&mut self, production: impl FnOnce(&mut Self) -> Result<T, EngineError>) -> Result<T, EngineError> {
        if self.depth >= MAX_DEPTH {
            return Err(EngineError::Unsupported("CAS result is nested too deeply".to_string()));
        }
        self.depth += 1;
        let out = production(self);
        self.depth -= 1;
        out
    }

    fn sum(&mut self) -> Result<Expr, EngineError> {
        let mut terms = vec![self.product()?];
        loop {
            if self.eat('+') {
                terms.push(self.product()?);
            } else if self.eat('-') {
                terms.push(Expr::neg(self.product()?));
            } else {
                return Ok(if terms.len() == 1 { terms.remove(0) } else { Expr::Add(terms) });
            }
        }
    }

    fn product(&mut self) -> Result<Expr, EngineError> {
        let mut factors = vec![self.signed()?];
        loop {
            if self.eat('*') {
                factors.push(self.signed()?);
            } else if self.eat('/') {
                factors.push(Expr::recip(self.signed()?));
            } else if matches!(self.peek(), Some(Lexeme::Num(_) | Lexeme::Name(_) | Lexeme::Op('('))) {
                factors.push(self.power()?);
            } else {
                return Ok(if factors.len() == 1 { factors.remove(0) } else { Expr::Mul(factors) });
            }
        }
    }

    fn signed(&mut self) -> Result<Expr, EngineError> {
        if self.eat('-') {
            Ok(Expr::neg(self.nested(Self::signed)?))
        } else if self.eat('+') {
            self.nested(Self::signed)
        } else {
            self.power()
        }
    }

    /// `a^b^c` is `a^(b^c)`; `x^-1` is accepted.
    fn power(&mut self) -> Result<Expr, EngineError> {
        let base = self.nested(Self::atom)?;
        if self.eat('^') {
            let exp = self.nested(Self::signed)?;
            Ok(Expr::pow(base, exp))
        } else {
            Ok(base)
        }
    }

    fn atom(&mut self) -> Result<Expr, EngineError> {
        let lexeme = self
            .lexemes
            .get(self.pos)
            .cloned()
            .ok_or_else(|| EngineError::Unsupported("CAS result ended early".to_string()))?;
        self.pos += 1;
        match lexeme {
            Lexeme::Num(text) => number(&text).map(Expr::Num),
            Lexeme::Op('(') => {
                let inner = self.sum()?;
                self.expect(')')?;
                Ok(inner)
            }
            Lexeme::Name(name) if self.eat('(') => {
                let mut args = vec![self.sum()?];
                while self.eat(',') {
                    args.push(self.sum()?);
                }
                self.expect(')')?;
                call(&name, args)
            }
            Lexeme::Name(name) => self.name(&name),
            Lexeme::Op(op) => Err(EngineError::Unsupported(format!("unexpected '{}' in a CAS result", op))),
        }
    }

    fn name(&self, name: &str) -> Result<Expr, EngineError> {
        if let Some(expr) = self.names.incoming.get(name) {
            return Ok(expr.clone());
        }
        match name {
            "pi" | "PI" => Ok(Expr::Const(Constant::Pi)),
            "e" => Ok(Expr::Const(Constant::E)),
            n if ["inf", "infinity", "nan"].contains(&n.to_ascii_lowercase().as_str()) => {
                Err(EngineError::Evaluation("result is not a finite number".to_string()))
            }
            other => Ok(Expr::sym(other)),
        }
    }
}

fn number(text: &str) -> Result<Number, EngineError> {
    let exact = if text.contains(['e', 'E']) { None } else { Number::parse_decimal(text) };
    let value = match exact {
        Some(n) => n,
        None => text
            .parse::<f64>()
            .map(Number::from_f64)
            .map_err(|_| EngineError::Unsupported(format!("malformed number '{}' in a CAS result", text)))?,
    };
    Ok(value.rationalize())
}

fn func_named(name: &str) -> Option<Func> {
    Some(match name {
        "sin" => Func::Sin,
        "cos" => Func::Cos,
        "tan" => Func::Tan,
        "cot" => Func::Cot,
        "sec" => Func::Sec,
        "csc" => Func::Csc,
        "asin" | "arcsin" => Func::Asin,
        "acos" | "arccos" => Func::Acos,
        "atan" | "arctan" => Func::Atan,
        "sinh" => Func::Sinh,
        "cosh" => Func::Cosh,
        "tanh" => Func::Tanh,
        "ln" => Func::Ln,
        "log10" => Func::Log10,
        "abs" => Func::Abs,
        _ => return None,
    })
}

fn call(name: &str, mut args: Vec<Expr>) -> Result<Expr, EngineError> {
    let unsupported = || EngineError::Unsupported(format!("the result uses {}(), which cannot be displayed", name));
    if args.len() == 2 && name == "log" {
        // log(base, x)
        let x = args.pop().ok_or_else(unsupported)?;
        let base = args.pop().ok_or_else(unsupported)?;
        return Ok(Expr::div(Expr::func(Func::Ln, x), Expr::func(Func::Ln, base)));
    }
    if args.len() != 1 {
        return Err(unsupported());
    }
    let arg = args.remove(0);
    if let Some(f) = func_named(name) {
        return Ok(Expr::func(f, arg));
    }
    Ok(match name {
        "log" => Expr::func(Func::Ln, arg),
        "log2" => Expr::div(Expr::func(Func::Ln, arg), Expr::func(Func::Ln, Expr::int(2))),
        "exp" => Expr::pow(Expr::Const(Constant::E), arg),
        "sqrt" => Expr::pow(arg, Expr::half()),
        "cbrt" => Expr::pow(arg, Expr::Num(Number::Rational(1, 3))),
        "sign" | "signum" | "sgn" => Expr::div(arg.clone(), Expr::func(Func::Abs, arg)),
        _ => return Err(unsupported()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::format::plain;
    use crate::algebra::latex::parse;

    fn prepared(input: &str) -> Expr {
        normalize(&parse(input).unwrap()).unwrap()
    }

    fn d(input: &str) -> String {
        plain(&differentiate(&prepared(input), "x").unwrap())
    }

    #[test]
    fn test_aliases_for_multi_letter_symbols() {
        let names = Names::for_expr(&prepared("x + \\theta + y_1 + e"));
        assert_eq!(names.name("x"), "x");
        assert_eq!(names.name("theta"), "qqva");
        assert_eq!(names.name("y_1"), "qqvc");
        let mut known = names.known();
        known.sort_unstable();
        assert_eq!(known, vec!["qqce", "qqcpi", "qqva", "qqvc"]);
        assert_eq!(alias(27), "qqvbb");
    }

    #[test]
    fn test_print_uses_cas_syntax() {
        let expr = prepared("\\frac{\\sin x}{2} - \\cot(x) + \\pi");
        let names = Names::for_expr(&expr);
        let text = print(&expr, &names, Constants::Symbolic).unwrap();
        assert!(text.contains("(1/tan(x))"), "{}", text);
        assert!(text.contains("(1/2)"), "{}", text);
        assert!(text.contains(PI_ALIAS), "{}", text);
        let numeric = print(&Expr::Const(Constant::Pi), &names, Constants::Numeric).unwrap();
        assert_eq!(numeric, "3.141592653589793");
    }

    #[test]
    fn test_read_back_forms() {
        let names = Names::for_expr(&prepared("\\theta x"));
        let read_plain = |text: &str| plain(&read(text, &names).unwrap());
        assert_eq!(read_plain("cos(x) + 3*x^2"), "3*x^2 + cos(x)");
        assert_eq!(read_plain("x^-1"), "1/x");
        assert_eq!(read_plain("2*qqva*x"), "2*theta*x");
        assert_eq!(read_plain("e^(x^2)"), "exp(x^2)");
        assert_eq!(read_plain("0.3333333333333333*x"), "x/3");
        assert_eq!(read_plain("1e-20"), "1e-20");
        assert_eq!(read_plain("log(2, x)"), "ln(x)/ln(2)");
        assert!(matches!(read("gamma(x)", &names), Err(EngineError::Unsupported(_))));
        assert!(matches!(read("1/inf + NaN", &names), Err(EngineError::Evaluation(_))));
    }

    #[test]
    fn test_read_rejects_deep_nesting() {
        let names = Names::default();
        let deep = format!("{}x{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(matches!(read(&deep, &names), Err(EngineError::Unsupported(_))));
        let signs = format!("{}1", "-".repeat(10_000));
        assert!(read(&signs, &names).is_err());
    }

    #[test]
    fn test_power_rule() {
        assert_eq!(d("x^2"), "2*x");
        assert_eq!(d("x^3 + 5x"), "3*x^2 + 5");
        assert_eq!(d("7"), "0");
    }

    #[test]
    fn test_chain_and_product_rules() {
        assert_eq!(d("\\sin(x)"), "cos(x)");
        assert_eq!(d("\\cos(2x)"), "-2*sin(2*x)");
    }

    #[test]
    fn test_other_symbols_are_constants() {
        assert_eq!(plain(&differentiate(&prepared("x y + y^2"), "x").unwrap()), "y");
        assert_eq!(plain(&differentiate(&prepared("\\theta x^2"), "x").unwrap()), "2*theta*x");
        assert_eq!(plain(&differentiate(&prepared("\\theta^2"), "theta").unwrap()), "2*theta");
    }

    #[test]
    fn test_differentiate_equation_is_an_error() {
        assert!(differentiate(&parse("x = 1").unwrap(), "x").is_err());
    }

    #[test]
    fn test_simplify() {
        assert_eq!(plain(&simplify(&prepared("x + x")).unwrap()), "2*x");
        assert_eq!(plain(&simplify(&prepared("\\ln x + \\pi")).unwrap()), "ln(x) + pi");
        let eq = simplify(&parse("2x = 4").unwrap()).unwrap();
        assert!(matches!(eq, Expr::Eq(..)));
    }

    #[test]
    fn test_evaluate() {
        assert_eq!(evaluate(&prepared("3^2 + \\frac{1}{2}")).unwrap(), 9.5);
        assert!((evaluate(&prepared("\\sin(\\pi / 2)")).unwrap() - 1.0).abs() < 1e-12);
        let err = evaluate(&prepared("x + 1")).unwrap_err();
        assert_eq!(err, EngineError::Evaluation("expression still depends on 'x'".to_string()));
    }
}
