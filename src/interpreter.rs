use rustc_hash::FxHashMap;

use crate::ast::{AssignTarget, Expression, Program, Statement};
use crate::error::{CompilationError, ExecutionError, ThornError};
use crate::runtime::class::Instance;
use crate::runtime::function::{Function, FunctionBody};
use crate::runtime::scope::Scope;
use crate::runtime::value::Value;
use crate::runtime::variable::{AccessControl, Variable};
use crate::solver::{boolean, math};
use std::rc::Rc;

/// Result of evaluating one statement or block, checked explicitly by
/// every enclosing evaluator instead of threading sentinel values.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ControlFlow {
    /// Fell off the end; carries the running last-expression value.
    Completed(Value),
    Returned(Value),
    /// `break`, carrying the number of block scopes between the statement
    /// and its innermost enclosing loop. A loop consumes the signal at
    /// `levels <= 1`; deeper counts terminate the loop and keep unwinding,
    /// one loop per remaining level.
    Broke(usize),
    /// `continue`, counted the same way as `Broke`.
    Continued(usize),
    /// `goto`, propagating outward until a block owning the label
    /// satisfies it.
    Jumped(String),
}

/// Tree-walking evaluator over one program body. The host populates the
/// global scope frame with variables, functions and classes before
/// running; the `Collection` class backing `[…]` literals is built in.
#[derive(Debug)]
pub struct Interpreter {
    scope: Scope,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            scope: Scope::new(),
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }

    /// Executes a program body. The result is the value of an explicit
    /// `return`, else the value of the last evaluated expression
    /// statement, else `Null`.
    pub fn run(&mut self, program: &Program) -> Result<Value, ThornError> {
        match self.exec_block(&program.body, 0)? {
            ControlFlow::Completed(value) | ControlFlow::Returned(value) => Ok(value),
            ControlFlow::Broke(_) | ControlFlow::Continued(_) => Ok(Value::Null),
            // Unknown labels are rejected by the parser; a jump can only
            // surface here through a hand-built program.
            ControlFlow::Jumped(label) => {
                Err(CompilationError::UnknownLabel { name: label }.into())
            }
        }
    }

    /// Executes the statements of one block. `depth` counts block scopes
    /// since the innermost enclosing loop body and feeds the counted
    /// break/continue unwinding.
    fn exec_block(
        &mut self,
        body: &[Statement],
        depth: usize,
    ) -> Result<ControlFlow, ThornError> {
        let labels: FxHashMap<&str, usize> = body
            .iter()
            .enumerate()
            .filter_map(|(position, statement)| match statement {
                Statement::Label(name) => Some((name.as_str(), position)),
                _ => None,
            })
            .collect();

        let mut last = Value::Null;
        let mut index = 0;
        while index < body.len() {
            let statement = &body[index];
            match self.exec_statement(statement, depth)? {
                ControlFlow::Completed(value) => {
                    if matches!(statement, Statement::Expr(_) | Statement::Assign { .. }) {
                        last = value;
                    }
                    index += 1;
                }
                ControlFlow::Jumped(label) => match labels.get(label.as_str()) {
                    Some(&position) => index = position + 1,
                    None => return Ok(ControlFlow::Jumped(label)),
                },
                other => return Ok(other),
            }
        }
        Ok(ControlFlow::Completed(last))
    }

    fn exec_statement(
        &mut self,
        statement: &Statement,
        depth: usize,
    ) -> Result<ControlFlow, ThornError> {
        match statement {
            Statement::Assign { target, value } => {
                let value = self.eval(value)?;
                self.assign(target, value.clone())?;
                Ok(ControlFlow::Completed(value))
            }
            Statement::If {
                condition,
                then_body,
                else_body,
            } => {
                let chosen = match self.eval(condition)? {
                    Value::Boolean(true) => then_body,
                    Value::Boolean(false) => else_body,
                    other => {
                        return Err(CompilationError::IfConditionNotBoolean {
                            got: other.type_name().to_string(),
                        }
                        .into());
                    }
                };
                self.scope.push();
                let flow = self.exec_block(chosen, depth + 1);
                self.scope.pop();
                flow
            }
            Statement::While { condition, body } => self.exec_while(condition, body),
            Statement::For {
                binding,
                source,
                steps,
                body,
            } => self.exec_for(binding, source, steps.as_ref(), body),
            Statement::Block(body) => {
                self.scope.push();
                let flow = self.exec_block(body, depth + 1);
                self.scope.pop();
                flow
            }
            Statement::Return(value) => {
                let value = match value {
                    Some(expression) => self.eval(expression)?,
                    None => Value::Null,
                };
                Ok(ControlFlow::Returned(value))
            }
            Statement::Break => Ok(ControlFlow::Broke(depth)),
            Statement::Continue => Ok(ControlFlow::Continued(depth)),
            Statement::Label(_) => Ok(ControlFlow::Completed(Value::Null)),
            Statement::Goto(name) => Ok(ControlFlow::Jumped(name.clone())),
            Statement::Expr(expression) => {
                Ok(ControlFlow::Completed(self.eval(expression)?))
            }
        }
    }

    fn exec_while(
        &mut self,
        condition: &Expression,
        body: &[Statement],
    ) -> Result<ControlFlow, ThornError> {
        loop {
            let keep_going = match self.eval(condition)? {
                Value::Boolean(value) => value,
                other => {
                    return Err(CompilationError::WhileConditionNotBoolean {
                        got: other.type_name().to_string(),
                    }
                    .into());
                }
            };
            if !keep_going {
                return Ok(ControlFlow::Completed(Value::Null));
            }

            self.scope.push();
            let flow = self.exec_block(body, 0);
            self.scope.pop();
            match flow? {
                ControlFlow::Completed(_) => {}
                ControlFlow::Returned(value) => return Ok(ControlFlow::Returned(value)),
                ControlFlow::Broke(levels) => {
                    return if levels <= 1 {
                        Ok(ControlFlow::Completed(Value::Null))
                    } else {
                        Ok(ControlFlow::Broke(levels - 1))
                    };
                }
                ControlFlow::Continued(levels) => {
                    if levels <= 1 {
                        continue;
                    }
                    return Ok(ControlFlow::Continued(levels - 1));
                }
                ControlFlow::Jumped(label) => return Ok(ControlFlow::Jumped(label)),
            }
        }
    }

    /// Visits indices `0, step, 2*step, …` while `index < size`. Element
    /// list and step are captured once at loop entry.
    fn exec_for(
        &mut self,
        binding: &str,
        source: &Expression,
        steps: Option<&Expression>,
        body: &[Statement],
    ) -> Result<ControlFlow, ThornError> {
        let source_value = self.eval(source)?;
        let items = match &source_value {
            Value::Instance(instance) => instance.borrow().collection_items(),
            _ => None,
        }
        .ok_or_else(|| ExecutionError::ForSourceNotCollection {
            got: source_value.type_name().to_string(),
        })?;

        let step = match steps {
            Some(expression) => match self.eval(expression)? {
                Value::Number(value) if value >= 1.0 => value as usize,
                other => {
                    return Err(ExecutionError::InvalidForSteps {
                        got: other.to_display(),
                    }
                    .into());
                }
            },
            None => 1,
        };

        let size = items.len();
        let mut index = 0;
        while index < size {
            self.scope.push();
            self.scope
                .define_variable(Variable::new(binding, items[index].clone()));
            let flow = self.exec_block(body, 0);
            self.scope.pop();
            match flow? {
                ControlFlow::Completed(_) => {}
                ControlFlow::Returned(value) => return Ok(ControlFlow::Returned(value)),
                ControlFlow::Broke(levels) => {
                    return if levels <= 1 {
                        Ok(ControlFlow::Completed(Value::Null))
                    } else {
                        Ok(ControlFlow::Broke(levels - 1))
                    };
                }
                ControlFlow::Continued(levels) => {
                    if levels > 1 {
                        return Ok(ControlFlow::Continued(levels - 1));
                    }
                }
                ControlFlow::Jumped(label) => return Ok(ControlFlow::Jumped(label)),
            }
            index += step;
        }
        Ok(ControlFlow::Completed(Value::Null))
    }

    fn assign(&mut self, target: &AssignTarget, value: Value) -> Result<(), ThornError> {
        match target {
            AssignTarget::Name(name) => {
                self.scope.assign(name, value);
                Ok(())
            }
            AssignTarget::Attribute { object, name } => {
                let through_this = matches!(object, Expression::This);
                let receiver = self.eval(object)?;
                match receiver {
                    Value::Instance(instance) => {
                        let hidden = instance
                            .borrow()
                            .field(name)
                            .is_some_and(|field| field_hidden(field, through_this));
                        if hidden {
                            return Err(unknown_member(&instance.borrow(), name));
                        }
                        instance.borrow_mut().set_field(name, value)?;
                        Ok(())
                    }
                    Value::Null => Err(ExecutionError::NullAccess {
                        member: name.clone(),
                    }
                    .into()),
                    other => Err(ExecutionError::AccessorOnNonInstance {
                        member: name.clone(),
                        type_name: other.type_name().to_string(),
                    }
                    .into()),
                }
            }
        }
    }

    /// Evaluates one expression against the current scope.
    pub fn eval(&mut self, expression: &Expression) -> Result<Value, ThornError> {
        match expression {
            Expression::Number(value) => Ok(Value::Number(*value)),
            Expression::String(value) => Ok(Value::String(value.clone())),
            Expression::Boolean(value) => Ok(Value::Boolean(*value)),
            Expression::Null => Ok(Value::Null),
            Expression::Identifier(name) => self.resolve_identifier(name),
            Expression::This => Ok(self
                .scope
                .get("this")
                .map(|variable| variable.value.clone())
                .unwrap_or(Value::Null)),
            Expression::Not(inner) => match self.eval(inner)? {
                Value::Boolean(value) => Ok(Value::Boolean(!value)),
                other => Err(ExecutionError::InvalidUnaryOperand {
                    operator: "!".to_string(),
                    expected: "boolean".to_string(),
                    got: other.type_name().to_string(),
                }
                .into()),
            },
            Expression::Negate(inner) => match self.eval(inner)? {
                Value::Number(value) => Ok(Value::Number(-value)),
                other => Err(ExecutionError::InvalidUnaryOperand {
                    operator: "-".to_string(),
                    expected: "number".to_string(),
                    got: other.type_name().to_string(),
                }
                .into()),
            },
            Expression::BinaryOp { left, op, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(math::apply(*op, &left, &right)?)
            }
            Expression::Comparison { left, op, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(boolean::compare(*op, &left, &right)?)
            }
            Expression::LogicalChain { first, rest } => {
                // Every operand resolves before the fold; the chain is not
                // short-circuiting.
                let mut values = vec![self.chain_operand(first)?];
                let mut operators = Vec::with_capacity(rest.len());
                for (operator, operand) in rest {
                    operators.push(*operator);
                    values.push(self.chain_operand(operand)?);
                }
                Ok(Value::Boolean(boolean::fold_chain(&values, &operators)))
            }
            Expression::Call { callee, args } => self.eval_call(callee, args),
            Expression::Attribute { object, name } => {
                let through_this = matches!(**object, Expression::This);
                let receiver = self.eval(object)?;
                self.read_member(&receiver, name, through_this)
            }
            Expression::New { class, args } => self.eval_new(class, args),
        }
    }

    fn chain_operand(&mut self, operand: &Expression) -> Result<bool, ThornError> {
        match self.eval(operand)? {
            Value::Boolean(value) => Ok(value),
            other => Err(ExecutionError::InvalidChainOperand {
                got: other.type_name().to_string(),
            }
            .into()),
        }
    }

    fn resolve_identifier(&mut self, name: &str) -> Result<Value, ThornError> {
        if let Some(variable) = self.scope.get(name) {
            return Ok(variable.value.clone());
        }
        if let Some(function) = self.scope.lookup_function(name) {
            return Ok(Value::Function(function));
        }
        Err(CompilationError::UndeclaredIdentifier {
            name: name.to_string(),
        }
        .into())
    }

    fn eval_args(&mut self, args: &[Expression]) -> Result<Vec<Value>, ThornError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg)?);
        }
        Ok(values)
    }

    fn eval_call(
        &mut self,
        callee: &Expression,
        args: &[Expression],
    ) -> Result<Value, ThornError> {
        match callee {
            Expression::Identifier(name) => {
                // A variable holding a function shadows the function table.
                let variable = self.scope.get(name).map(|variable| variable.value.clone());
                if let Some(value) = variable {
                    return match value {
                        Value::Function(function) => {
                            let args = self.eval_args(args)?;
                            self.call_function(&function, args, None)
                        }
                        other => Err(ExecutionError::NotCallable {
                            type_name: other.type_name().to_string(),
                        }
                        .into()),
                    };
                }
                if let Some(function) = self.scope.lookup_function(name) {
                    let args = self.eval_args(args)?;
                    return self.call_function(&function, args, None);
                }
                Err(CompilationError::UndefinedFunction {
                    name: name.to_string(),
                }
                .into())
            }
            Expression::Attribute { object, name } => {
                let through_this = matches!(**object, Expression::This);
                let receiver = self.eval(object)?;
                let args = self.eval_args(args)?;
                self.call_member(&receiver, name, args, through_this)
            }
            other => {
                let callee = self.eval(other)?;
                match callee {
                    Value::Function(function) => {
                        let args = self.eval_args(args)?;
                        self.call_function(&function, args, None)
                    }
                    other => Err(ExecutionError::NotCallable {
                        type_name: other.type_name().to_string(),
                    }
                    .into()),
                }
            }
        }
    }

    fn call_member(
        &mut self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
        through_this: bool,
    ) -> Result<Value, ThornError> {
        match receiver {
            Value::Null => Err(ExecutionError::NullAccess {
                member: name.to_string(),
            }
            .into()),
            Value::Instance(instance) => {
                let built_in = instance.borrow_mut().collection_call(name, &args);
                if let Some(result) = built_in {
                    return result;
                }
                let method = instance.borrow().method(name);
                if let Some(method) = method {
                    return self.call_function(
                        &method,
                        args,
                        Some(Value::Instance(instance.clone())),
                    );
                }
                let field_value = instance.borrow().field(name).map(|variable| {
                    (
                        field_hidden(variable, through_this),
                        variable.value.clone(),
                    )
                });
                match field_value {
                    Some((true, _)) => Err(unknown_member(&instance.borrow(), name)),
                    Some((false, Value::Function(function))) => self.call_function(
                        &function,
                        args,
                        Some(Value::Instance(instance.clone())),
                    ),
                    Some((false, other)) => Err(ExecutionError::NotCallable {
                        type_name: other.type_name().to_string(),
                    }
                    .into()),
                    None => Err(unknown_member(&instance.borrow(), name)),
                }
            }
            other => Err(ExecutionError::AccessorOnNonInstance {
                member: name.to_string(),
                type_name: other.type_name().to_string(),
            }
            .into()),
        }
    }

    fn read_member(
        &mut self,
        receiver: &Value,
        name: &str,
        through_this: bool,
    ) -> Result<Value, ThornError> {
        match receiver {
            Value::Null => Err(ExecutionError::NullAccess {
                member: name.to_string(),
            }
            .into()),
            Value::Instance(instance) => {
                let borrowed = instance.borrow();
                if let Some(variable) = borrowed.field(name) {
                    if field_hidden(variable, through_this) {
                        return Err(unknown_member(&borrowed, name));
                    }
                    return Ok(variable.value.clone());
                }
                if let Some(method) = borrowed.method(name) {
                    return Ok(Value::Function(method));
                }
                Err(unknown_member(&borrowed, name))
            }
            other => Err(ExecutionError::AccessorOnNonInstance {
                member: name.to_string(),
                type_name: other.type_name().to_string(),
            }
            .into()),
        }
    }

    fn eval_new(&mut self, class: &str, args: &[Expression]) -> Result<Value, ThornError> {
        let args = self.eval_args(args)?;
        if class == "Collection" {
            return Ok(Value::Instance(Instance::collection(args)));
        }
        let class_rc =
            self.scope
                .lookup_class(class)
                .ok_or_else(|| CompilationError::UnknownClass {
                    name: class.to_string(),
                })?;
        let instance = Instance::object(class_rc.clone());
        match class_rc.constructor() {
            Some(constructor) => {
                self.call_function(
                    &constructor.clone(),
                    args,
                    Some(Value::Instance(instance.clone())),
                )?;
            }
            None if !args.is_empty() => {
                return Err(CompilationError::ConstructorArityMismatch {
                    name: class.to_string(),
                    expected: 0,
                    found: args.len(),
                }
                .into());
            }
            None => {}
        }
        Ok(Value::Instance(instance))
    }

    /// Invokes a function value. Arity is validated for every function;
    /// declared parameter types only for script bodies. Methods receive
    /// the receiver bound as `this` in their local frame.
    fn call_function(
        &mut self,
        function: &Rc<Function>,
        args: Vec<Value>,
        this: Option<Value>,
    ) -> Result<Value, ThornError> {
        if args.len() != function.parameters.len() {
            return Err(CompilationError::FunctionArityMismatch {
                name: function.name.clone(),
                expected: function.parameters.len(),
                found: args.len(),
            }
            .into());
        }

        match &function.body {
            FunctionBody::Native(native) => {
                let result = native(&args)?;
                Ok(if function.returns_value {
                    result
                } else {
                    Value::Null
                })
            }
            FunctionBody::Script(body) => {
                for (parameter, argument) in function.parameters.iter().zip(&args) {
                    if let Some(declared) = &parameter.declared_type
                        && !argument.matches_declared_type(declared)
                    {
                        let got = argument
                            .class_name()
                            .unwrap_or_else(|| argument.type_name().to_string());
                        return Err(CompilationError::ParameterTypeMismatch {
                            name: function.name.clone(),
                            parameter: parameter.name.clone(),
                            expected: declared.clone(),
                            got,
                        }
                        .into());
                    }
                }

                self.scope.push_function_frame();
                if let Some(this) = this {
                    self.scope.define_variable(Variable::new("this", this));
                }
                for (parameter, argument) in function.parameters.iter().zip(args) {
                    let variable = match &parameter.declared_type {
                        Some(declared) => Variable::new(parameter.name.clone(), argument)
                            .with_type(declared.clone()),
                        None => Variable::new(parameter.name.clone(), argument),
                    };
                    self.scope.define_variable(variable);
                }
                let flow = self.exec_block(body, 0);
                self.scope.pop();

                let value = match flow? {
                    ControlFlow::Returned(value) => value,
                    ControlFlow::Completed(_)
                    | ControlFlow::Broke(_)
                    | ControlFlow::Continued(_)
                    | ControlFlow::Jumped(_) => Value::Null,
                };
                Ok(if function.returns_value {
                    value
                } else {
                    Value::Null
                })
            }
        }
    }
}

fn field_hidden(field: &Variable, through_this: bool) -> bool {
    field.access == AccessControl::Private && !through_this
}

/// Private fields are indistinguishable from missing ones when reached
/// from outside the class's own methods.
fn unknown_member(instance: &Instance, name: &str) -> ThornError {
    ExecutionError::UnknownMember {
        member: name.to_string(),
        class: instance.class_name.clone(),
    }
    .into()
}
