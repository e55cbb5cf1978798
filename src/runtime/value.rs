use std::rc::Rc;

use crate::runtime::class::{InstanceKind, InstanceRef};
use crate::runtime::function::Function;

/// Runtime value of the dynamically typed language: a closed sum type,
/// matched totally at every consumption site.
#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    String(String),
    Boolean(bool),
    Instance(InstanceRef),
    Function(Rc<Function>),
    Null,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Instance(_) => "instance",
            Value::Function(_) => "function",
            Value::Null => "null",
        }
    }

    /// Class name of an instance value, if it is one.
    pub fn class_name(&self) -> Option<String> {
        match self {
            Value::Instance(instance) => Some(instance.borrow().class_name.clone()),
            Value::Number(_)
            | Value::String(_)
            | Value::Boolean(_)
            | Value::Function(_)
            | Value::Null => None,
        }
    }

    /// True when a declared parameter type accepts this value. Primitive
    /// type names match the value kind; any other name matches a class
    /// instance of that class.
    pub fn matches_declared_type(&self, declared: &str) -> bool {
        match declared {
            "number" | "string" | "boolean" | "function" | "null" => {
                self.type_name() == declared
            }
            class_name => self
                .class_name()
                .is_some_and(|name| name == class_name),
        }
    }

    /// Rendering used by string concatenation and host output. Whole
    /// numbers drop the trailing `.0`.
    pub fn to_display(&self) -> String {
        match self {
            Value::Number(value) => {
                if value.fract() == 0.0 && value.is_finite() {
                    format!("{}", *value as i64)
                } else {
                    value.to_string()
                }
            }
            Value::String(value) => value.clone(),
            Value::Boolean(value) => value.to_string(),
            Value::Instance(instance) => {
                let borrowed = instance.borrow();
                match &borrowed.kind {
                    InstanceKind::Collection(items) => {
                        let rendered = items
                            .iter()
                            .map(Value::to_display)
                            .collect::<Vec<_>>()
                            .join(", ");
                        format!("[{rendered}]")
                    }
                    InstanceKind::Object { .. } => {
                        format!("<{} instance>", borrowed.class_name)
                    }
                }
            }
            Value::Function(function) => format!("<function {}>", function.name),
            Value::Null => "null".to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(left), Value::Number(right)) => left == right,
            (Value::String(left), Value::String(right)) => left == right,
            (Value::Boolean(left), Value::Boolean(right)) => left == right,
            // Instances and functions compare by identity.
            (Value::Instance(left), Value::Instance(right)) => Rc::ptr_eq(left, right),
            (Value::Function(left), Value::Function(right)) => Rc::ptr_eq(left, right),
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::class::Instance;

    #[test]
    fn whole_numbers_render_without_decimal_point() {
        assert_eq!(Value::Number(3.0).to_display(), "3");
        assert_eq!(Value::Number(1.5).to_display(), "1.5");
        assert_eq!(Value::Number(-2.0).to_display(), "-2");
    }

    #[test]
    fn collections_render_their_items() {
        let collection = Instance::collection(vec![
            Value::Number(1.0),
            Value::String("a".to_string()),
        ]);
        assert_eq!(Value::Instance(collection).to_display(), "[1, a]");
    }

    #[test]
    fn declared_type_matching_covers_primitives_and_classes() {
        assert!(Value::Number(1.0).matches_declared_type("number"));
        assert!(!Value::Number(1.0).matches_declared_type("string"));
        let collection = Instance::collection(vec![]);
        assert!(Value::Instance(collection).matches_declared_type("Collection"));
    }

    #[test]
    fn instances_compare_by_identity() {
        let a = Instance::collection(vec![]);
        let b = Instance::collection(vec![]);
        assert_eq!(Value::Instance(a.clone()), Value::Instance(a.clone()));
        assert_ne!(Value::Instance(a), Value::Instance(b));
    }
}
