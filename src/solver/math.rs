use rustc_hash::FxHashMap;

use crate::ast::BinaryOperator;
use crate::error::{ExecutionError, ThornError};
use crate::interpreter::Interpreter;
use crate::parser;
use crate::runtime::value::Value;
use crate::runtime::variable::Variable;

/// Applies one arithmetic operator to two resolved operands. A string on
/// the left turns `+` into concatenation; every other operator is invalid
/// in that position.
pub(crate) fn apply(
    op: BinaryOperator,
    left: &Value,
    right: &Value,
) -> Result<Value, ExecutionError> {
    match (left, op) {
        (Value::String(text), BinaryOperator::Add) => {
            Ok(Value::String(format!("{}{}", text, right.to_display())))
        }
        (Value::String(_), other) => Err(ExecutionError::InvalidConcatenation {
            operator: other.symbol().to_string(),
        }),
        _ => match (left, right) {
            (Value::Number(left), Value::Number(right)) => {
                let result = match op {
                    BinaryOperator::Add => left + right,
                    BinaryOperator::Sub => left - right,
                    BinaryOperator::Mul => left * right,
                    BinaryOperator::Div => left / right,
                    BinaryOperator::Mod => left % right,
                };
                Ok(Value::Number(result))
            }
            (left, right) => Err(ExecutionError::InvalidOperands {
                operator: op.symbol().to_string(),
                left: left.type_name().to_string(),
                right: right.type_name().to_string(),
            }),
        },
    }
}

/// String entry point for ad-hoc arithmetic evaluation. The variable
/// environment is owned by this solver instance; nothing is shared
/// between solvers or calls beyond explicitly defined names.
#[derive(Debug, Default)]
pub struct MathSolver {
    variables: FxHashMap<String, Value>,
}

impl MathSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn undefine(&mut self, name: &str) {
        self.variables.remove(name);
    }

    pub fn solve(&self, expression: &str) -> Result<f64, ThornError> {
        let parsed = parser::parse_expression(expression)?;
        let mut interpreter = Interpreter::new();
        for (name, value) in &self.variables {
            interpreter
                .scope_mut()
                .define_variable(Variable::new(name.clone(), value.clone()));
        }
        match interpreter.eval(&parsed)? {
            Value::Number(value) => Ok(value),
            other => Err(ExecutionError::NonNumericExpression {
                got: other.type_name().to_string(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respects_standard_precedence_and_parentheses() {
        let solver = MathSolver::new();
        assert_eq!(solver.solve("1 + 2 * 3").expect("solve failed"), 7.0);
        assert_eq!(solver.solve("(1 + 2) * 3").expect("solve failed"), 9.0);
        assert_eq!(solver.solve("10 % 4 + 6 / 2").expect("solve failed"), 5.0);
    }

    #[test]
    fn resolves_defined_variables() {
        let mut solver = MathSolver::new();
        solver.define("x", Value::Number(4.0));
        assert_eq!(solver.solve("x * x").expect("solve failed"), 16.0);

        solver.undefine("x");
        let error = solver.solve("x * x").expect_err("expected undefined");
        assert!(matches!(
            error,
            ThornError::Compilation(crate::error::CompilationError::UndeclaredIdentifier { .. })
        ));
    }

    #[test]
    fn rejects_non_numeric_results() {
        let solver = MathSolver::new();
        let error = solver.solve("1 == 1").expect_err("expected non-numeric");
        assert!(matches!(
            error,
            ThornError::Execution(ExecutionError::NonNumericExpression { .. })
        ));
    }

    #[test]
    fn string_left_operand_only_concatenates() {
        let left = Value::String("a".to_string());
        let joined = apply(BinaryOperator::Add, &left, &Value::Number(2.0))
            .expect("concatenation failed");
        assert_eq!(joined, Value::String("a2".to_string()));

        let error = apply(BinaryOperator::Sub, &left, &Value::Number(2.0))
            .expect_err("expected invalid concatenation");
        assert_eq!(
            error,
            ExecutionError::InvalidConcatenation {
                operator: "-".to_string()
            }
        );
    }

    #[test]
    fn rejects_mixed_operand_kinds() {
        let error = apply(
            BinaryOperator::Add,
            &Value::Number(1.0),
            &Value::Boolean(true),
        )
        .expect_err("expected invalid operands");
        assert!(matches!(error, ExecutionError::InvalidOperands { .. }));
    }
}
