use std::fmt;
use std::rc::Rc;

use crate::ast::Statement;
use crate::error::ExecutionError;
use crate::runtime::value::Value;

/// Host-side function bridge: a native Rust closure callable from script.
pub type NativeFunction = Rc<dyn Fn(&[Value]) -> Result<Value, ExecutionError>>;

pub enum FunctionBody {
    Script(Vec<Statement>),
    Native(NativeFunction),
}

impl fmt::Debug for FunctionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionBody::Script(body) => f.debug_tuple("Script").field(body).finish(),
            FunctionBody::Native(_) => f.write_str("Native(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub declared_type: Option<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: None,
        }
    }

    pub fn typed(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: Some(declared_type.into()),
        }
    }
}

/// A callable: either a script body declared by the host from parsed
/// source, or a bridged native closure. Native functions skip declared
/// parameter-type validation; arity is checked for both.
#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub returns_value: bool,
    pub body: FunctionBody,
}

impl Function {
    pub fn script(
        name: impl Into<String>,
        parameters: Vec<Parameter>,
        returns_value: bool,
        body: Vec<Statement>,
    ) -> Self {
        Self {
            name: name.into(),
            parameters,
            returns_value,
            body: FunctionBody::Script(body),
        }
    }

    pub fn native(
        name: impl Into<String>,
        parameters: Vec<Parameter>,
        returns_value: bool,
        body: impl Fn(&[Value]) -> Result<Value, ExecutionError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            parameters,
            returns_value,
            body: FunctionBody::Native(Rc::new(body)),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self.body, FunctionBody::Native(_))
    }
}
