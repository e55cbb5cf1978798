use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::{CompilationError, ExecutionError, ThornError};
use crate::runtime::function::Function;
use crate::runtime::value::Value;
use crate::runtime::variable::{AccessControl, Variable};

/// A class declaration: field defaults plus methods. A method named like
/// the class is its constructor.
#[derive(Debug)]
pub struct Class {
    pub name: String,
    fields: Vec<FieldDefinition>,
    methods: FxHashMap<String, Rc<Function>>,
}

#[derive(Debug)]
struct FieldDefinition {
    name: String,
    declared_type: Option<String>,
    default: Value,
    access: AccessControl,
}

impl Class {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            methods: FxHashMap::default(),
        }
    }

    pub fn with_field(
        mut self,
        name: impl Into<String>,
        declared_type: Option<&str>,
        default: Value,
    ) -> Self {
        self.fields.push(FieldDefinition {
            name: name.into(),
            declared_type: declared_type.map(str::to_string),
            default,
            access: AccessControl::Public,
        });
        self
    }

    /// A private field is only reachable through `this`, from inside the
    /// class's own methods.
    pub fn with_private_field(
        mut self,
        name: impl Into<String>,
        declared_type: Option<&str>,
        default: Value,
    ) -> Self {
        self.fields.push(FieldDefinition {
            name: name.into(),
            declared_type: declared_type.map(str::to_string),
            default,
            access: AccessControl::Private,
        });
        self
    }

    pub fn with_method(mut self, function: Function) -> Self {
        self.methods.insert(function.name.clone(), Rc::new(function));
        self
    }

    pub fn method(&self, name: &str) -> Option<&Rc<Function>> {
        self.methods.get(name)
    }

    /// The constructor is the method sharing the class name, when present.
    pub fn constructor(&self) -> Option<&Rc<Function>> {
        self.methods.get(&self.name)
    }

    pub(crate) fn instantiate_fields(&self) -> FxHashMap<String, Variable> {
        self.fields
            .iter()
            .map(|field| {
                let mut variable = Variable::new(field.name.clone(), field.default.clone())
                    .with_access(field.access);
                variable.declared_type = field.declared_type.clone();
                (field.name.clone(), variable)
            })
            .collect()
    }
}

pub type InstanceRef = Rc<RefCell<Instance>>;

/// A live object. Collections are the built-in backing of `[…]` literals
/// with native methods; everything else carries the declaring class and a
/// field table.
#[derive(Debug)]
pub struct Instance {
    pub class_name: String,
    pub kind: InstanceKind,
}

#[derive(Debug)]
pub enum InstanceKind {
    Collection(Vec<Value>),
    Object {
        class: Rc<Class>,
        fields: FxHashMap<String, Variable>,
    },
}

impl Instance {
    pub fn collection(items: Vec<Value>) -> InstanceRef {
        Rc::new(RefCell::new(Self {
            class_name: "Collection".to_string(),
            kind: InstanceKind::Collection(items),
        }))
    }

    pub fn object(class: Rc<Class>) -> InstanceRef {
        let fields = class.instantiate_fields();
        Rc::new(RefCell::new(Self {
            class_name: class.name.clone(),
            kind: InstanceKind::Object { class, fields },
        }))
    }

    pub fn field(&self, name: &str) -> Option<&Variable> {
        match &self.kind {
            InstanceKind::Collection(_) => None,
            InstanceKind::Object { fields, .. } => fields.get(name),
        }
    }

    pub fn set_field(&mut self, name: &str, value: Value) -> Result<(), ExecutionError> {
        match &mut self.kind {
            InstanceKind::Collection(_) => Err(ExecutionError::UnknownMember {
                member: name.to_string(),
                class: self.class_name.clone(),
            }),
            InstanceKind::Object { fields, .. } => match fields.get_mut(name) {
                Some(variable) => {
                    variable.value = value;
                    Ok(())
                }
                None => Err(ExecutionError::UnknownMember {
                    member: name.to_string(),
                    class: self.class_name.clone(),
                }),
            },
        }
    }

    pub fn method(&self, name: &str) -> Option<Rc<Function>> {
        match &self.kind {
            InstanceKind::Collection(_) => None,
            InstanceKind::Object { class, .. } => class.method(name).cloned(),
        }
    }

    /// Dispatches the built-in collection methods. Returns `None` when the
    /// receiver is not a collection or the name is not one of them.
    pub(crate) fn collection_call(
        &mut self,
        method: &str,
        args: &[Value],
    ) -> Option<Result<Value, ThornError>> {
        let InstanceKind::Collection(items) = &mut self.kind else {
            return None;
        };
        let result = match method {
            "Get" => match check_arity(method, 1, args.len()) {
                Err(error) => Err(error),
                Ok(()) => collection_index(&args[0], items.len())
                    .map(|index| items[index].clone())
                    .map_err(ThornError::from),
            },
            "Set" => match check_arity(method, 2, args.len()) {
                Err(error) => Err(error),
                Ok(()) => match collection_index(&args[0], items.len()) {
                    Ok(index) => {
                        items[index] = args[1].clone();
                        Ok(Value::Null)
                    }
                    Err(error) => Err(error.into()),
                },
            },
            "Add" => match check_arity(method, 1, args.len()) {
                Err(error) => Err(error),
                Ok(()) => {
                    items.push(args[0].clone());
                    Ok(Value::Null)
                }
            },
            "Size" => match check_arity(method, 0, args.len()) {
                Err(error) => Err(error),
                Ok(()) => Ok(Value::Number(items.len() as f64)),
            },
            _ => return None,
        };
        Some(result)
    }

    pub(crate) fn collection_items(&self) -> Option<Vec<Value>> {
        match &self.kind {
            InstanceKind::Collection(items) => Some(items.clone()),
            InstanceKind::Object { .. } => None,
        }
    }
}

fn check_arity(method: &str, expected: usize, found: usize) -> Result<(), ThornError> {
    if expected == found {
        Ok(())
    } else {
        Err(CompilationError::FunctionArityMismatch {
            name: method.to_string(),
            expected,
            found,
        }
        .into())
    }
}

fn collection_index(value: &Value, size: usize) -> Result<usize, ExecutionError> {
    let index = match value {
        Value::Number(number) if *number >= 0.0 && number.fract() == 0.0 => *number as usize,
        other => {
            return Err(ExecutionError::InvalidIndex {
                got: other.to_display(),
            });
        }
    };
    if index >= size {
        return Err(ExecutionError::IndexOutOfBounds { index, size });
    }
    Ok(index)
}
