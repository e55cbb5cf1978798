use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ast::{ChainOperator, ComparisonOperator};
use crate::error::{ExecutionError, ThornError};
use crate::interpreter::Interpreter;
use crate::parser;
use crate::runtime::value::Value;
use crate::runtime::variable::Variable;

/// Evaluates one relational pair. Operands must resolve to the same
/// comparable kind, except that `null` against anything has a defined
/// equality answer instead of an error. Instances compare by identity;
/// ordering is defined for numbers and strings only.
pub(crate) fn compare(
    op: ComparisonOperator,
    left: &Value,
    right: &Value,
) -> Result<Value, ExecutionError> {
    use ComparisonOperator::*;

    if matches!(op, Eq | Ne) {
        let equal = match (left, right) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Number(left), Value::Number(right)) => left == right,
            (Value::String(left), Value::String(right)) => left == right,
            (Value::Boolean(left), Value::Boolean(right)) => left == right,
            (Value::Instance(left), Value::Instance(right)) => Rc::ptr_eq(left, right),
            (Value::Function(left), Value::Function(right)) => Rc::ptr_eq(left, right),
            _ => {
                return Err(incomparable(left, right));
            }
        };
        let result = match op {
            Eq => equal,
            _ => !equal,
        };
        return Ok(Value::Boolean(result));
    }

    let ordering = match (left, right) {
        (Value::Number(left), Value::Number(right)) => left.partial_cmp(right),
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        _ => return Err(incomparable(left, right)),
    };
    let Some(ordering) = ordering else {
        // NaN against anything orders nowhere; every relational test fails.
        return Ok(Value::Boolean(false));
    };
    let result = match op {
        Lt => ordering.is_lt(),
        Gt => ordering.is_gt(),
        Le => ordering.is_le(),
        Ge => ordering.is_ge(),
        Eq | Ne => unreachable!("handled above"),
    };
    Ok(Value::Boolean(result))
}

fn incomparable(left: &Value, right: &Value) -> ExecutionError {
    ExecutionError::IncomparableTypes {
        left: left.type_name().to_string(),
        right: right.type_name().to_string(),
    }
}

/// Folds an interleaved boolean/chain-operator list strictly left-to-right.
/// The chain operators deliberately share one precedence level.
pub(crate) fn fold_chain(values: &[bool], operators: &[ChainOperator]) -> bool {
    debug_assert_eq!(values.len(), operators.len() + 1);
    let mut result = values[0];
    for (operator, value) in operators.iter().zip(&values[1..]) {
        result = match operator {
            ChainOperator::And => result && *value,
            ChainOperator::Or => result || *value,
            ChainOperator::Xor => result ^ *value,
        };
    }
    result
}

/// String entry point for ad-hoc boolean evaluation. The variable
/// environment is owned by this solver instance and seeds a fresh scope
/// on every call, so expression-local names never leak between calls.
#[derive(Debug, Default)]
pub struct BooleanSolver {
    variables: FxHashMap<String, Value>,
}

impl BooleanSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn undefine(&mut self, name: &str) {
        self.variables.remove(name);
    }

    pub fn solve(&self, expression: &str) -> Result<bool, ThornError> {
        let parsed = parser::parse_expression(expression)?;
        let mut interpreter = Interpreter::new();
        for (name, value) in &self.variables {
            interpreter
                .scope_mut()
                .define_variable(Variable::new(name.clone(), value.clone()));
        }
        match interpreter.eval(&parsed)? {
            Value::Boolean(value) => Ok(value),
            other => Err(ExecutionError::NonBooleanExpression {
                got: other.type_name().to_string(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompilationError;

    #[test]
    fn chains_fold_left_to_right_without_precedence() {
        let solver = BooleanSolver::new();
        // (true || false) && false, not true || (false && false).
        assert_eq!(
            solver.solve("true || false && false").expect("solve failed"),
            false
        );
        assert_eq!(
            solver.solve("false && false || true").expect("solve failed"),
            true
        );
        assert_eq!(
            solver.solve("true ^ true || true").expect("solve failed"),
            true
        );
    }

    #[test]
    fn parenthesized_subexpressions_resolve_first() {
        let solver = BooleanSolver::new();
        assert_eq!(
            solver.solve("(1 == 1) && (2 == 3)").expect("solve failed"),
            false
        );
        assert_eq!(
            solver
                .solve("true || (false && false)")
                .expect("solve failed"),
            true
        );
    }

    #[test]
    fn arithmetic_runs_resolve_before_comparison() {
        let solver = BooleanSolver::new();
        assert_eq!(solver.solve("1 + 2 * 3 == 7").expect("solve failed"), true);
        assert_eq!(solver.solve("10 - 4 < 5").expect("solve failed"), false);
    }

    #[test]
    fn single_identifier_resolves_from_the_environment() {
        let mut solver = BooleanSolver::new();
        solver.define("ready", Value::Boolean(true));
        assert_eq!(solver.solve("ready").expect("solve failed"), true);
        assert_eq!(solver.solve("!ready").expect("solve failed"), false);
    }

    #[test]
    fn defined_names_persist_and_undefined_names_do_not_leak() {
        let mut solver = BooleanSolver::new();
        solver.define("flag", Value::Boolean(true));
        assert_eq!(solver.solve("flag || false").expect("solve failed"), true);

        solver.undefine("flag");
        let error = solver.solve("flag").expect_err("expected undeclared");
        assert_eq!(
            error,
            ThornError::Compilation(CompilationError::UndeclaredIdentifier {
                name: "flag".to_string()
            })
        );
    }

    #[test]
    fn separate_solvers_share_nothing() {
        let mut first = BooleanSolver::new();
        first.define("a", Value::Boolean(true));
        let second = BooleanSolver::new();
        assert!(second.solve("a").is_err());
    }

    #[test]
    fn null_compares_without_error() {
        let solver = BooleanSolver::new();
        assert_eq!(solver.solve("null == null").expect("solve failed"), true);
        assert_eq!(solver.solve("null != null").expect("solve failed"), false);
        assert_eq!(solver.solve("1 == null").expect("solve failed"), false);
        assert_eq!(solver.solve("null != 1").expect("solve failed"), true);
    }

    #[test]
    fn ordering_null_is_an_error() {
        let solver = BooleanSolver::new();
        let error = solver.solve("null < 1").expect_err("expected incomparable");
        assert!(matches!(
            error,
            ThornError::Execution(ExecutionError::IncomparableTypes { .. })
        ));
    }

    #[test]
    fn mismatched_kinds_are_incomparable() {
        let error = compare(
            ComparisonOperator::Eq,
            &Value::Number(1.0),
            &Value::String("1".to_string()),
        )
        .expect_err("expected incomparable");
        assert!(matches!(error, ExecutionError::IncomparableTypes { .. }));
    }

    #[test]
    fn non_boolean_results_are_rejected() {
        let solver = BooleanSolver::new();
        let error = solver.solve("1 + 1").expect_err("expected non-boolean");
        assert!(matches!(
            error,
            ThornError::Execution(ExecutionError::NonBooleanExpression { .. })
        ));
    }
}
