//! Operation dispatcher
//!
//! Maps a requested operation, formula and variable onto the algebra engine
//! and folds whatever the engine returns into one [`OperationResult`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::algebra::format::is_greek;
use crate::algebra::number::format_real;
use crate::algebra::{AlgebraEngine, EngineError, Expr, SolveOutput};

/// Variable used when the request leaves it blank.
pub const DEFAULT_VARIABLE: &str = "x";

pub const NO_SOLUTION_LATEX: &str = "\\text{no solution}";
pub const UNREPRESENTABLE_LATEX: &str = "\\text{unable to solve or represent the solution}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Simplify,
    Differentiate,
    Integrate,
    Solve,
    Factor,
    Expand,
    Substitute,
    Evaluate,
}

impl OperationKind {
    pub const ALL: [OperationKind; 8] = [
        OperationKind::Simplify,
        OperationKind::Differentiate,
        OperationKind::Integrate,
        OperationKind::Solve,
        OperationKind::Factor,
        OperationKind::Expand,
        OperationKind::Substitute,
        OperationKind::Evaluate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Simplify => "simplify",
            OperationKind::Differentiate => "differentiate",
            OperationKind::Integrate => "integrate",
            OperationKind::Solve => "solve",
            OperationKind::Factor => "factor",
            OperationKind::Expand => "expand",
            OperationKind::Substitute => "substitute",
            OperationKind::Evaluate => "evaluate",
        }
    }

    /// Whether the operation reads a `var=value` parameter.
    pub fn takes_assignment(self) -> bool {
        matches!(self, OperationKind::Substitute | OperationKind::Evaluate)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "diff" => Ok(OperationKind::Differentiate),
            name => OperationKind::ALL
                .into_iter()
                .find(|kind| kind.as_str() == name)
                .ok_or_else(|| format!("unknown operation: {}", s.trim())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Rejected before the engine was called.
    Validation,
    /// The engine raised while converting or computing.
    Engine,
}

/// Exactly one outcome per request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum OperationResult {
    RenderableExpression(String),
    /// LaTeX of each solution, in engine order. Possibly empty.
    SolutionSet(Vec<String>),
    EvaluatedValue(String),
    Failure { kind: FailureKind, message: String },
}

impl OperationResult {
    pub fn validation(message: impl Into<String>) -> Self {
        OperationResult::Failure {
            kind: FailureKind::Validation,
            message: message.into(),
        }
    }

    pub fn engine(err: &EngineError) -> Self {
        OperationResult::Failure {
            kind: FailureKind::Engine,
            message: err.to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, OperationResult::Failure { .. })
    }

    /// The single display string. `variable_latex` names solutions.
    pub fn display_latex(&self, variable_latex: &str) -> String {
        match self {
            OperationResult::RenderableExpression(latex) | OperationResult::EvaluatedValue(latex) => latex.clone(),
            OperationResult::SolutionSet(solutions) if solutions.is_empty() => NO_SOLUTION_LATEX.to_string(),
            OperationResult::SolutionSet(solutions) => solutions
                .iter()
                .map(|s| format!("{} = {}", variable_latex, s))
                .collect::<Vec<_>>()
                .join(", "),
            OperationResult::Failure { message, .. } => message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OperationRequest {
    pub kind: OperationKind,
    pub formula: String,
    #[serde(default)]
    pub variable: String,
    #[serde(default)]
    pub parameter: Option<String>,
}

impl OperationRequest {
    pub fn new(kind: OperationKind, formula: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            kind,
            formula: formula.into(),
            variable: variable.into(),
            parameter: None,
        }
    }

    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }

    /// Engine symbol name for the requested variable, `x` when blank.
    pub fn variable_name(&self) -> String {
        normalize_symbol(&self.variable).unwrap_or_else(|| DEFAULT_VARIABLE.to_string())
    }
}

/// `\theta` → `theta`, `x_{1}` → `x_1`. `None` when blank.
fn normalize_symbol(text: &str) -> Option<String> {
    let name: String = text
        .trim()
        .trim_start_matches('\\')
        .chars()
        .filter(|c| !matches!(c, '{' | '}') && !c.is_whitespace())
        .collect();
    (!name.is_empty()).then_some(name)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_alphabetic())
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// One `name=value` pair of a substitute/evaluate parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub value: String,
}

const ASSIGNMENT_HINT: &str = "Use the form variable=value, for example x=2 (separate several with ';').";

impl Assignment {
    /// Parse `x=2; y=\frac{1}{2}`. Any malformed pair rejects the whole parameter.
    pub fn parse_list(parameter: &str) -> Result<Vec<Assignment>, String> {
        let pairs: Vec<&str> = parameter.split(';').map(str::trim).filter(|p| !p.is_empty()).collect();
        if pairs.is_empty() {
            return Err(format!("Missing parameter. {}", ASSIGNMENT_HINT));
        }
        pairs
            .into_iter()
            .map(|pair| {
                let (name, value) = pair
                    .split_once('=')
                    .ok_or_else(|| format!("'{}' has no '='. {}", pair, ASSIGNMENT_HINT))?;
                let value = value.trim();
                let name = normalize_symbol(name).unwrap_or_default();
                if name.is_empty() || value.is_empty() {
                    return Err(format!("'{}' has an empty side. {}", pair, ASSIGNMENT_HINT));
                }
                if !is_identifier(&name) {
                    return Err(format!("'{}' is not a variable name. {}", name, ASSIGNMENT_HINT));
                }
                Ok(Assignment {
                    name,
                    value: value.to_string(),
                })
            })
            .collect()
    }
}

/// Runs operations against an [`AlgebraEngine`]. Blocking; call from a worker thread.
#[derive(Clone)]
pub struct Dispatcher {
    engine: Arc<dyn AlgebraEngine>,
}

impl Dispatcher {
    pub fn new(engine: Arc<dyn AlgebraEngine>) -> Self {
        Self { engine }
    }

    /// LaTeX for a variable name, used to label solutions.
    pub fn variable_latex(&self, name: &str) -> String {
        if is_greek(name) || name.contains('_') {
            self.engine.to_latex(&Expr::sym(name))
        } else {
            name.to_string()
        }
    }

    pub fn execute(&self, request: &OperationRequest) -> OperationResult {
        if request.formula.trim().is_empty() {
            return OperationResult::validation("Enter a LaTeX formula before running an operation.");
        }

        let assignments = if request.kind.takes_assignment() {
            match Assignment::parse_list(request.parameter.as_deref().unwrap_or_default()) {
                Ok(list) => list,
                Err(message) => return OperationResult::validation(message),
            }
        } else {
            Vec::new()
        };

        let variable = request.variable_name();
        debug!(operation = %request.kind, variable = %variable, "Dispatching operation");

        match self.run(request.kind, request.formula.trim(), &variable, &assignments) {
            Ok(result) => result,
            Err(e) => OperationResult::engine(&e),
        }
    }

    fn run(
        &self,
        kind: OperationKind,
        formula: &str,
        variable: &str,
        assignments: &[Assignment],
    ) -> Result<OperationResult, EngineError> {
        let engine = self.engine.as_ref();
        let expr = engine.parse_latex(formula)?;
        let rendered = |e: Expr| OperationResult::RenderableExpression(engine.to_latex(&e));

        Ok(match kind {
            OperationKind::Simplify => rendered(engine.simplify(&expr)?),
            OperationKind::Differentiate => rendered(engine.differentiate(&expr, variable)?),
            OperationKind::Integrate => rendered(engine.integrate(&expr, variable)?),
            OperationKind::Factor => rendered(engine.factor(&expr)?),
            OperationKind::Expand => rendered(engine.expand(&expr)?),
            OperationKind::Solve => match engine.solve(&expr, variable)? {
                SolveOutput::Unrepresentable => OperationResult::RenderableExpression(UNREPRESENTABLE_LATEX.to_string()),
                SolveOutput::Single(root) => OperationResult::SolutionSet(vec![engine.to_latex(&root)]),
                SolveOutput::Multiple(roots) => {
                    OperationResult::SolutionSet(roots.iter().map(|r| engine.to_latex(r)).collect())
                }
            },
            OperationKind::Substitute => rendered(self.substitute_all(expr, assignments)?),
            OperationKind::Evaluate => {
                let value = engine.evaluate(&self.substitute_all(expr, assignments)?)?;
                OperationResult::EvaluatedValue(format_real(value))
            }
        })
    }

    fn substitute_all(&self, mut expr: Expr, assignments: &[Assignment]) -> Result<Expr, EngineError> {
        for assignment in assignments {
            let value = self.engine.parse_latex(&assignment.value)?;
            expr = self.engine.substitute(&expr, &assignment.name, &value)?;
        }
        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Symbolic;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts every engine call and forwards to the built-in engine.
    #[derive(Default)]
    struct SpyEngine {
        calls: AtomicUsize,
    }

    impl SpyEngine {
        fn hit(&self) -> Symbolic {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Symbolic
        }
    }

    impl AlgebraEngine for SpyEngine {
        fn parse_latex(&self, input: &str) -> Result<Expr, EngineError> {
            self.hit().parse_latex(input)
        }
        fn simplify(&self, expr: &Expr) -> Result<Expr, EngineError> {
            self.hit().simplify(expr)
        }
        fn differentiate(&self, expr: &Expr, var: &str) -> Result<Expr, EngineError> {
            self.hit().differentiate(expr, var)
        }
        fn integrate(&self, expr: &Expr, var: &str) -> Result<Expr, EngineError> {
            self.hit().integrate(expr, var)
        }
        fn solve(&self, expr: &Expr, var: &str) -> Result<SolveOutput, EngineError> {
            self.hit().solve(expr, var)
        }
        fn factor(&self, expr: &Expr) -> Result<Expr, EngineError> {
            self.hit().factor(expr)
        }
        fn expand(&self, expr: &Expr) -> Result<Expr, EngineError> {
            self.hit().expand(expr)
        }
        fn substitute(&self, expr: &Expr, var: &str, value: &Expr) -> Result<Expr, EngineError> {
            self.hit().substitute(expr, var, value)
        }
        fn evaluate(&self, expr: &Expr) -> Result<f64, EngineError> {
            self.hit().evaluate(expr)
        }
        fn to_latex(&self, expr: &Expr) -> String {
            self.hit().to_latex(expr)
        }
        fn to_plot_syntax(&self, expr: &Expr) -> String {
            self.hit().to_plot_syntax(expr)
        }
    }

    /// Engine whose solver returns a fixed shape.
    struct FixedSolve(SolveOutput);

    impl AlgebraEngine for FixedSolve {
        fn parse_latex(&self, input: &str) -> Result<Expr, EngineError> {
            Symbolic.parse_latex(input)
        }
        fn simplify(&self, expr: &Expr) -> Result<Expr, EngineError> {
            Ok(expr.clone())
        }
        fn differentiate(&self, expr: &Expr, _var: &str) -> Result<Expr, EngineError> {
            Ok(expr.clone())
        }
        fn integrate(&self, expr: &Expr, _var: &str) -> Result<Expr, EngineError> {
            Ok(expr.clone())
        }
        fn solve(&self, _expr: &Expr, _var: &str) -> Result<SolveOutput, EngineError> {
            Ok(self.0.clone())
        }
        fn factor(&self, expr: &Expr) -> Result<Expr, EngineError> {
            Ok(expr.clone())
        }
        fn expand(&self, expr: &Expr) -> Result<Expr, EngineError> {
            Ok(expr.clone())
        }
        fn substitute(&self, expr: &Expr, _var: &str, _value: &Expr) -> Result<Expr, EngineError> {
            Ok(expr.clone())
        }
        fn evaluate(&self, _expr: &Expr) -> Result<f64, EngineError> {
            Ok(0.0)
        }
        fn to_latex(&self, expr: &Expr) -> String {
            Symbolic.to_latex(expr)
        }
        fn to_plot_syntax(&self, expr: &Expr) -> String {
            Symbolic.to_plot_syntax(expr)
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(Symbolic))
    }

    fn run(kind: OperationKind, formula: &str) -> OperationResult {
        dispatcher().execute(&OperationRequest::new(kind, formula, "x"))
    }

    #[test]
    fn test_operation_names() {
        assert_eq!("diff".parse::<OperationKind>().unwrap(), OperationKind::Differentiate);
        assert_eq!(" Solve ".parse::<OperationKind>().unwrap(), OperationKind::Solve);
        assert_eq!("limit".parse::<OperationKind>().unwrap_err(), "unknown operation: limit");
        for kind in OperationKind::ALL {
            assert_eq!(kind.as_str().parse::<OperationKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_differentiate() {
        assert_eq!(
            run(OperationKind::Differentiate, "x^2"),
            OperationResult::RenderableExpression("2 x".to_string())
        );
    }

    #[test]
    fn test_empty_formula_is_validation_without_engine_call() {
        let spy = Arc::new(SpyEngine::default());
        let result = Dispatcher::new(spy.clone()).execute(&OperationRequest::new(OperationKind::Simplify, "  ", "x"));
        assert!(matches!(result, OperationResult::Failure { kind: FailureKind::Validation, .. }));
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_malformed_parameter_makes_no_engine_call() {
        let spy = Arc::new(SpyEngine::default());
        let dispatcher = Dispatcher::new(spy.clone());
        for (kind, parameter) in [
            (OperationKind::Substitute, "x2"),
            (OperationKind::Substitute, "x="),
            (OperationKind::Substitute, "=3"),
            (OperationKind::Substitute, ""),
            (OperationKind::Evaluate, ""),
            (OperationKind::Evaluate, " ; "),
            (OperationKind::Evaluate, "x 2"),
            (OperationKind::Evaluate, "2=3"),
        ] {
            let request = OperationRequest::new(kind, "x^2 + 1", "x").with_parameter(parameter);
            let result = dispatcher.execute(&request);
            assert!(
                matches!(result, OperationResult::Failure { kind: FailureKind::Validation, .. }),
                "{:?} {:?} gave {:?}",
                kind,
                parameter,
                result
            );
        }
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_substitute_and_evaluate() {
        let dispatcher = dispatcher();
        let substituted = dispatcher.execute(
            &OperationRequest::new(OperationKind::Substitute, "x^2 + y", "x").with_parameter("x=3"),
        );
        assert_eq!(substituted, OperationResult::RenderableExpression("y + 9".to_string()));

        let evaluated = dispatcher.execute(
            &OperationRequest::new(OperationKind::Evaluate, "x^2 + y", "x").with_parameter("x=3; y=\\frac{1}{2}"),
        );
        assert_eq!(evaluated, OperationResult::EvaluatedValue("9.5".to_string()));

        let constant = dispatcher
            .execute(&OperationRequest::new(OperationKind::Evaluate, "2^{10}", "x").with_parameter("x=0"));
        assert_eq!(constant, OperationResult::EvaluatedValue("1024".to_string()));
    }

    #[test]
    fn test_evaluate_requires_assignment() {
        let spy = Arc::new(SpyEngine::default());
        let result = Dispatcher::new(spy.clone()).execute(&OperationRequest::new(OperationKind::Evaluate, "2^{10}", "x"));
        match result {
            OperationResult::Failure { kind, message } => {
                assert_eq!(kind, FailureKind::Validation);
                assert!(message.contains("x=2"), "{}", message);
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_hostile_inputs_fail_cleanly() {
        let nested = format!("{}x{}", "(".repeat(50_000), ")".repeat(50_000));
        for (kind, formula) in [
            (OperationKind::Solve, "x^{4000000000} - 1".to_string()),
            (OperationKind::Solve, "x^{9223372036854775807}".to_string()),
            (OperationKind::Factor, "x^{100000} + 1".to_string()),
            (OperationKind::Simplify, nested.clone()),
            (OperationKind::Differentiate, nested),
            (OperationKind::Integrate, "x^{-9223372036854775808}".to_string()),
            (OperationKind::Differentiate, "x^{2^{70}}".to_string()),
        ] {
            let result = run(kind, &formula);
            assert!(
                matches!(result, OperationResult::Failure { kind: FailureKind::Engine, .. }),
                "{:?} on {:.40} gave {:?}",
                kind,
                formula,
                result
            );
        }
    }

    #[test]
    fn test_tiny_decimal_is_not_rounded_to_zero() {
        match run(OperationKind::Simplify, "0.00000000000000000001x") {
            OperationResult::RenderableExpression(latex) => assert!(latex.contains("10^{-20}"), "{}", latex),
            other => panic!("expected an expression, got {:?}", other),
        }
    }

    #[test]
    fn test_engine_error_becomes_failure() {
        match run(OperationKind::Simplify, "1/0") {
            OperationResult::Failure { kind, message } => {
                assert_eq!(kind, FailureKind::Engine);
                assert_eq!(message, "division by zero");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_solve_display() {
        let result = run(OperationKind::Solve, "x^2 = 4");
        assert_eq!(result, OperationResult::SolutionSet(vec!["-2".to_string(), "2".to_string()]));
        assert_eq!(result.display_latex("x"), "x = -2, x = 2");
    }

    #[test]
    fn test_empty_solution_set_is_no_solution() {
        let engine = Arc::new(FixedSolve(SolveOutput::Multiple(Vec::new())));
        let result = Dispatcher::new(engine).execute(&OperationRequest::new(OperationKind::Solve, "x", "x"));
        assert_eq!(result, OperationResult::SolutionSet(Vec::new()));
        assert_eq!(result.display_latex("x"), NO_SOLUTION_LATEX);
        assert_eq!(OperationResult::SolutionSet(Vec::new()).display_latex("t"), NO_SOLUTION_LATEX);
    }

    #[test]
    fn test_single_and_unrepresentable_solve_shapes() {
        let single = Dispatcher::new(Arc::new(FixedSolve(SolveOutput::Single(Expr::int(3)))))
            .execute(&OperationRequest::new(OperationKind::Solve, "x", "t"));
        assert_eq!(single.display_latex("t"), "t = 3");

        let all = Dispatcher::new(Arc::new(FixedSolve(SolveOutput::Unrepresentable)))
            .execute(&OperationRequest::new(OperationKind::Solve, "x", "x"));
        assert_eq!(all.display_latex("x"), UNREPRESENTABLE_LATEX);
    }

    #[test]
    fn test_variable_defaults_and_normalizes() {
        assert_eq!(OperationRequest::new(OperationKind::Solve, "x", " ").variable_name(), "x");
        assert_eq!(OperationRequest::new(OperationKind::Solve, "x", "\\theta").variable_name(), "theta");
        assert_eq!(OperationRequest::new(OperationKind::Solve, "x", "x_{1}").variable_name(), "x_1");
        assert_eq!(dispatcher().variable_latex("theta"), "\\theta");
        assert_eq!(dispatcher().variable_latex("t"), "t");
    }
}
