//! LaTeX (and plain infix) input parser.
//!
//! Identifiers are single letters as in typeset math (`xy` is `x*y`); the
//! usual function names (`sin`, `ln`, `sqrt`, ...) are recognised inside
//! letter runs so plain input such as `sin(x)^2` parses too.

use super::expr::{Constant, Expr, Func};
use super::format::is_greek;
use super::number::Number;
use super::EngineError;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(String),
    Ident(String),
    Command(String),
    Op(char),
}

const WORDS: &[&str] = &[
    "arcsin", "arccos", "arctan", "asin", "acos", "atan", "sinh", "cosh", "tanh", "sqrt", "sin",
    "cos", "tan", "cot", "sec", "csc", "exp", "abs", "log", "ln", "pi",
];

const SPACING: &[&str] = &["quad", "qquad", ",", ";", ":", "!", " ", "displaystyle"];

fn tokenize(input: &str) -> Result<Vec<Token>, EngineError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            tokens.push(Token::Num(chars[start..i].iter().collect()));
        } else if c.is_ascii_alphabetic() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_alphabetic() {
                i += 1;
            }
            let run: String = chars[start..i].iter().collect();
            split_letter_run(&run, &mut tokens);
        } else if c == '\\' {
            i += 1;
            let start = i;
            while i < chars.len() && chars[i].is_ascii_alphabetic() {
                i += 1;
            }
            if i == start {
                // control symbol such as \, \{ or \|
                let symbol = chars.get(i).copied().unwrap_or(' ');
                i += 1;
                match symbol {
                    '{' => tokens.push(Token::Op('(')),
                    '}' => tokens.push(Token::Op(')')),
                    '|' => tokens.push(Token::Op('|')),
                    s if SPACING.contains(&s.to_string().as_str()) => {}
                    '\\' => {}
                    other => {
                        return Err(EngineError::Parse(format!("unexpected control symbol '\\{}'", other)))
                    }
                }
            } else {
                let name: String = chars[start..i].iter().collect();
                if !SPACING.contains(&name.as_str()) {
                    tokens.push(Token::Command(name));
                }
            }
        } else if "+-*/^_=(){}[]|".contains(c) {
            tokens.push(Token::Op(c));
            i += 1;
        } else if c == '·' || c == '×' {
            tokens.push(Token::Op('*'));
            i += 1;
        } else {
            return Err(EngineError::Parse(format!("unexpected character '{}'", c)));
        }
    }
    Ok(tokens)
}

fn split_letter_run(run: &str, tokens: &mut Vec<Token>) {
    let mut rest = run;
    while !rest.is_empty() {
        if let Some(word) = WORDS.iter().find(|w| rest.starts_with(**w)) {
            tokens.push(Token::Ident((*word).to_string()));
            rest = &rest[word.len()..];
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                tokens.push(Token::Ident(c.to_string()));
            }
            rest = chars.as_str();
        }
    }
}

fn func_for_word(word: &str) -> Option<Func> {
    Some(match word {
        "sin" => Func::Sin,
        "cos" => Func::Cos,
        "tan" => Func::Tan,
        "cot" => Func::Cot,
        "sec" => Func::Sec,
        "csc" => Func::Csc,
        "arcsin" | "asin" => Func::Asin,
        "arccos" | "acos" => Func::Acos,
        "arctan" | "atan" => Func::Atan,
        "sinh" => Func::Sinh,
        "cosh" => Func::Cosh,
        "tanh" => Func::Tanh,
        "ln" | "log" => Func::Ln,
        "lg" => Func::Log10,
        "abs" => Func::Abs,
        _ => return None,
    })
}

/// Deepest bracket, unary sign or exponent nesting accepted.
pub const MAX_NESTING: usize = 128;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

/// Parse a formula, optionally containing a single `=`.
pub fn parse(input: &str) -> Result<Expr, EngineError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(EngineError::Parse("empty expression".to_string()));
    }
    let mut parser = Parser { tokens, pos: 0, depth: 0 };
    let lhs = parser.expr()?;
    let result = if parser.eat_op('=') {
        let rhs = parser.expr()?;
        Expr::Eq(Box::new(lhs), Box::new(rhs))
    } else {
        lhs
    };
    match parser.peek() {
        None => Ok(result),
        Some(token) => Err(EngineError::Parse(format!("unexpected {}", describe(token)))),
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Num(n) => format!("number '{}'", n),
        Token::Ident(s) => format!("'{}'", s),
        Token::Command(c) => format!("command '\\{}'", c),
        Token::Op(c) => format!("'{}'", c),
    }
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_op(&mut self, op: char) -> bool {
        if self.peek() == Some(&Token::Op(op)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_command(&mut self, name: &str) -> bool {
        if matches!(self.peek(), Some(Token::Command(c)) if c == name) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: char) -> Result<(), EngineError> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(EngineError::Parse(match self.peek() {
                Some(t) => format!("expected '{}' but found {}", op, describe(t)),
                None => format!("expected '{}' at end of input", op),
            }))
        }
    }

    /// Run one nested production, failing once the nesting limit is reached.
    fn descend<T>(&mut self, production: impl FnOnce(&mut Self) -> Result<T, EngineError>) -> Result<T, EngineError> {
        if self.depth >= MAX_NESTING {
            return Err(EngineError::Parse("expression is nested too deeply".to_string()));
        }
        self.depth += 1;
        let out = production(self);
        self.depth -= 1;
        out
    }

    // Sums and products are collected flat so long chains stay shallow.
    fn expr(&mut self) -> Result<Expr, EngineError> {
        let mut terms = vec![self.term()?];
        loop {
            if self.eat_op('+') {
                terms.push(self.term()?);
            } else if self.eat_op('-') {
                terms.push(Expr::neg(self.term()?));
            } else {
                return Ok(collect(terms, Expr::Add));
            }
        }
    }

    fn term(&mut self) -> Result<Expr, EngineError> {
        let mut factors = vec![self.unary()?];
        loop {
            if self.eat_op('*') || self.eat_command("cdot") || self.eat_command("times") || self.eat_command("ast") {
                factors.push(self.unary()?);
            } else if self.eat_op('/') || self.eat_command("div") {
                factors.push(Expr::recip(self.unary()?));
            } else if self.starts_operand() {
                factors.push(self.power()?);
            } else {
                return Ok(collect(factors, Expr::Mul));
            }
        }
    }

    fn unary(&mut self) -> Result<Expr, EngineError> {
        if self.eat_op('-') {
            Ok(Expr::neg(self.descend(Self::unary)?))
        } else if self.eat_op('+') {
            self.descend(Self::unary)
        } else {
            self.power()
        }
    }

    fn starts_operand(&self) -> bool {
        match self.peek() {
            Some(Token::Num(_)) | Some(Token::Ident(_)) => true,
            Some(Token::Op(c)) => matches!(c, '(' | '[' | '{'),
            Some(Token::Command(c)) => {
                matches!(
                    c.as_str(),
                    "frac" | "dfrac" | "tfrac" | "sqrt" | "left" | "pi" | "exp" | "ln" | "log" | "lg"
                        | "operatorname" | "mathrm" | "text"
                ) || func_for_word(c).is_some()
                    || is_greek(c)
            }
            None => false,
        }
    }

    fn power(&mut self) -> Result<Expr, EngineError> {
        let base = self.primary()?;
        if self.eat_op('^') {
            let exp = self.exponent()?;
            Ok(Expr::pow(base, exp))
        } else {
            Ok(base)
        }
    }

    /// Exponent or fraction argument: a braced group or one character.
    fn exponent(&mut self) -> Result<Expr, EngineError> {
        match self.peek().cloned() {
            Some(Token::Op('{')) => self.group(),
            Some(Token::Op('(')) => self.primary(),
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(Expr::neg(self.descend(Self::exponent)?))
            }
            Some(Token::Num(text)) => {
                self.pos += 1;
                self.single_digit(&text)
            }
            Some(_) => self.primary(),
            None => Err(EngineError::Parse("missing exponent".to_string())),
        }
    }

    /// `x^23` binds only the `2`; the rest is pushed back as a new number.
    fn single_digit(&mut self, text: &str) -> Result<Expr, EngineError> {
        let mut chars = text.chars();
        let first = chars.next().unwrap_or('0');
        let rest: String = chars.collect();
        if first == '.' {
            return Err(EngineError::Parse(format!("malformed number '{}'", text)));
        }
        if !rest.is_empty() {
            self.tokens.insert(self.pos, Token::Num(rest));
        }
        Ok(Expr::int(first.to_digit(10).unwrap_or(0) as i64))
    }

    fn group(&mut self) -> Result<Expr, EngineError> {
        self.expect_op('{')?;
        let inner = self.expr()?;
        self.expect_op('}')?;
        Ok(inner)
    }

    fn group_or_single(&mut self) -> Result<Expr, EngineError> {
        match self.peek().cloned() {
            Some(Token::Op('{')) => self.group(),
            Some(Token::Num(text)) => {
                self.pos += 1;
                self.single_digit(&text)
            }
            _ => self.primary(),
        }
    }

    fn number(&self, text: &str) -> Result<Expr, EngineError> {
        let value = Number::parse_decimal(text)
            .ok_or_else(|| EngineError::Parse(format!("malformed number '{}'", text)))?;
        if !text.contains('.') && !value.is_exact() {
            return Err(EngineError::Parse(format!("integer '{}' is too large", text)));
        }
        Ok(Expr::Num(value))
    }

    fn primary(&mut self) -> Result<Expr, EngineError> {
        self.descend(Self::atom)
    }

    fn atom(&mut self) -> Result<Expr, EngineError> {
        let token = self
            .next()
            .ok_or_else(|| EngineError::Parse("unexpected end of input".to_string()))?;
        match token {
            Token::Num(text) => self.number(&text),
            Token::Ident(word) => self.word(&word),
            Token::Op('(') => {
                let inner = self.expr()?;
                self.expect_op(')')?;
                Ok(inner)
            }
            Token::Op('[') => {
                let inner = self.expr()?;
                self.expect_op(']')?;
                Ok(inner)
            }
            Token::Op('{') => {
                let inner = self.expr()?;
                self.expect_op('}')?;
                Ok(inner)
            }
            Token::Op('|') => {
                let inner = self.expr()?;
                self.expect_op('|')?;
                Ok(Expr::func(Func::Abs, inner))
            }
            Token::Command(name) => self.command(&name),
            other => Err(EngineError::Parse(format!("unexpected {}", describe(&other)))),
        }
    }

    fn word(&mut self, word: &str) -> Result<Expr, EngineError> {
        match word {
            "pi" => Ok(Expr::Const(Constant::Pi)),
            "e" => Ok(Expr::Const(Constant::E)),
            "sqrt" => Ok(Expr::pow(self.function_argument()?, Expr::half())),
            "exp" => Ok(Expr::pow(Expr::Const(Constant::E), self.function_argument()?)),
            w => match func_for_word(w) {
                Some(f) => self.function(f),
                None => self.symbol(w.to_string()),
            },
        }
    }

    /// A symbol with an optional `_` subscript folded into its name.
    fn symbol(&mut self, name: String) -> Result<Expr, EngineError> {
        if !self.eat_op('_') {
            return Ok(Expr::Sym(name));
        }
        let subscript = match self.next() {
            Some(Token::Op('{')) => {
                let mut text = String::new();
                loop {
                    match self.next() {
                        Some(Token::Op('}')) => break,
                        Some(Token::Num(n)) => text.push_str(&n),
                        Some(Token::Ident(s)) => text.push_str(&s),
                        Some(Token::Command(c)) => text.push_str(&c),
                        Some(Token::Op(c)) => text.push(c),
                        None => return Err(EngineError::Parse("unterminated subscript".to_string())),
                    }
                }
                text
            }
            Some(Token::Num(n)) => {
                let mut chars = n.chars();
                let first = chars.next().map(|c| c.to_string()).unwrap_or_default();
                let rest: String = chars.collect();
                if !rest.is_empty() {
                    self.tokens.insert(self.pos, Token::Num(rest));
                }
                first
            }
            Some(Token::Ident(s)) => s,
            _ => return Err(EngineError::Parse("malformed subscript".to_string())),
        };
        Ok(Expr::Sym(format!("{}_{}", name, subscript)))
    }

    fn command(&mut self, name: &str) -> Result<Expr, EngineError> {
        match name {
            "frac" | "dfrac" | "tfrac" => {
                let num = self.group_or_single()?;
                let den = self.group_or_single()?;
                Ok(Expr::div(num, den))
            }
            "sqrt" => {
                let index = if self.eat_op('[') {
                    let index = self.expr()?;
                    self.expect_op(']')?;
                    Some(index)
                } else {
                    None
                };
                let radicand = self.group_or_single()?;
                Ok(match index {
                    Some(n) => Expr::pow(radicand, Expr::recip(n)),
                    None => Expr::pow(radicand, Expr::half()),
                })
            }
            "left" => {
                let open = self.next();
                let close = match open {
                    Some(Token::Op('(')) => ')',
                    Some(Token::Op('[')) => ']',
                    Some(Token::Op('|')) => '|',
                    _ => return Err(EngineError::Parse("unsupported \\left delimiter".to_string())),
                };
                let inner = self.expr()?;
                if !self.eat_command("right") {
                    return Err(EngineError::Parse("missing \\right".to_string()));
                }
                self.expect_op(close)?;
                Ok(if close == '|' { Expr::func(Func::Abs, inner) } else { inner })
            }
            "pi" => Ok(Expr::Const(Constant::Pi)),
            "exp" => Ok(Expr::pow(Expr::Const(Constant::E), self.function_argument()?)),
            "log" if self.peek() == Some(&Token::Op('_')) => {
                self.pos += 1;
                let base = self.group_or_single()?;
                let arg = self.function_argument()?;
                if base == Expr::int(10) {
                    Ok(Expr::func(Func::Log10, arg))
                } else {
                    Ok(Expr::div(Expr::func(Func::Ln, arg), Expr::func(Func::Ln, base)))
                }
            }
            "operatorname" | "mathrm" | "text" => {
                self.expect_op('{')?;
                let mut word = String::new();
                while let Some(Token::Ident(s)) = self.peek().cloned() {
                    word.push_str(&s);
                    self.pos += 1;
                }
                self.expect_op('}')?;
                if word.is_empty() {
                    return Err(EngineError::Parse(format!("empty \\{}", name)));
                }
                self.word(&word)
            }
            g if is_greek(g) => self.symbol(g.to_string()),
            other => match func_for_word(other) {
                Some(f) => self.function(f),
                None => Err(EngineError::Parse(format!("unsupported command '\\{}'", other))),
            },
        }
    }

    /// `\sin^2 x`, `\sin(x)`, `\sin 2x`; `\sin^{-1} x` is the arcsine.
    fn function(&mut self, f: Func) -> Result<Expr, EngineError> {
        let power = if self.eat_op('^') { Some(self.exponent()?) } else { None };
        let argument = self.function_argument()?;
        Ok(match (power, f.inverse()) {
            (Some(p), Some(inverse)) if p.as_number() == Some(Number::int(-1)) => Expr::func(inverse, argument),
            (Some(p), _) => Expr::pow(Expr::func(f, argument), p),
            (None, _) => Expr::func(f, argument),
        })
    }

    fn function_argument(&mut self) -> Result<Expr, EngineError> {
        match self.peek() {
            // `sin(x)^2` squares the sine, not its argument
            Some(Token::Op('(' | '[' | '{')) => self.primary(),
            Some(Token::Command(c)) if c == "left" => self.primary(),
            Some(Token::Command(_)) => self.power(),
            _ => {
                // bare argument: a run of numbers and plain letters
                let mut factors = vec![self.power()?];
                while matches!(self.peek(), Some(Token::Num(_)))
                    || matches!(self.peek(), Some(Token::Ident(s)) if s.chars().count() == 1 && s != "e")
                {
                    factors.push(self.power()?);
                }
                Ok(collect(factors, Expr::Mul))
            }
        }
    }
}

fn collect(mut items: Vec<Expr>, build: fn(Vec<Expr>) -> Expr) -> Expr {
    if items.len() == 1 {
        items.remove(0)
    } else {
        build(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::format::plain;
    use crate::algebra::normalize::normalize;

    fn parsed(input: &str) -> String {
        plain(&normalize(&parse(input).unwrap()).unwrap())
    }

    #[test]
    fn test_polynomial_with_implicit_multiplication() {
        assert_eq!(parsed("x^2 + 2x + 1"), "x^2 + 2*x + 1");
    }

    #[test]
    fn test_fraction_and_sqrt() {
        assert_eq!(parsed("\\frac{1}{2}x"), "x/2");
        assert_eq!(parsed("\\sqrt{x}"), "sqrt(x)");
        assert_eq!(parsed("\\frac12"), "1/2");
    }

    #[test]
    fn test_single_character_exponent() {
        assert_eq!(parsed("x^23"), "3*x^2");
    }

    #[test]
    fn test_functions_and_left_right() {
        assert_eq!(parsed("\\sin\\left(x\\right)"), "sin(x)");
        assert_eq!(parsed("\\sin^2 x"), "sin(x)^2");
        assert_eq!(parsed("sin(x)"), "sin(x)");
        assert_eq!(parsed("\\ln x"), "ln(x)");
    }

    #[test]
    fn test_equation() {
        let e = parse("x^2 = 4").unwrap();
        assert!(matches!(e, Expr::Eq(..)));
    }

    #[test]
    fn test_subscripts_and_greek() {
        assert_eq!(parsed("x_1 + \\theta"), "theta + x_1");
    }

    #[test]
    fn test_inverse_trig_superscript() {
        assert_eq!(parsed("\\sin^{-1} x"), "asin(x)");
        assert_eq!(parsed("\\cos^{-1}(x)"), "acos(x)");
        assert_eq!(parsed("\\tan^{-1}\\left(2x\\right)"), "atan(2*x)");
        assert_eq!(parsed("\\sin^{-2} x"), "1/sin(x)^2");
        assert_eq!(parsed("\\ln^{-1} x"), "1/ln(x)");
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        for input in [
            format!("{}x{}", "(".repeat(50_000), ")".repeat(50_000)),
            format!("{}x", "-".repeat(50_000)),
            format!("{}x{}", "{".repeat(50_000), "}".repeat(50_000)),
            format!("x{}", "^{x".repeat(50_000)),
            "\\sqrt{".repeat(50_000),
        ] {
            let err = parse(&input).unwrap_err();
            assert_eq!(err, EngineError::Parse("expression is nested too deeply".to_string()));
        }
        let fine = format!("{}x{}", "(".repeat(MAX_NESTING / 2), ")".repeat(MAX_NESTING / 2));
        assert_eq!(parse(&fine).unwrap(), Expr::sym("x"));
    }

    #[test]
    fn test_long_flat_chains_stay_shallow() {
        let sum = vec!["x"; 20_000].join(" + ");
        match parse(&sum).unwrap() {
            Expr::Add(items) => assert_eq!(items.len(), 20_000),
            other => panic!("expected a flat sum, got {:?}", other),
        }
        assert_eq!(parsed(&sum), "20000*x");
        let product = vec!["x"; 5_000].join("");
        assert!(matches!(parse(&product).unwrap(), Expr::Mul(items) if items.len() == 5_000));
    }

    #[test]
    fn test_oversized_integer_literal_is_rejected() {
        let err = parse("123456789012345678901234567890 x").unwrap_err();
        assert!(err.to_string().contains("too large"));
        assert!(parse("0.00000000000000000001").is_ok());
    }

    #[test]
    fn test_errors() {
        assert!(parse("").is_err());
        assert!(parse("x +").is_err());
        assert!(parse("\\foo{x}").is_err());
        assert!(parse("(x + 1").is_err());
    }
}
