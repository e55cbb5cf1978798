use crate::runtime::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessControl {
    #[default]
    Public,
    Private,
}

/// A declared name: its value, optional declared type and access level.
/// Mutated in place by assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub declared_type: Option<String>,
    pub value: Value,
    pub access: AccessControl,
}

impl Variable {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            declared_type: None,
            value,
            access: AccessControl::Public,
        }
    }

    pub fn with_type(mut self, declared_type: impl Into<String>) -> Self {
        self.declared_type = Some(declared_type.into());
        self
    }

    pub fn with_access(mut self, access: AccessControl) -> Self {
        self.access = access;
        self
    }
}
