pub mod class;
pub mod function;
pub mod scope;
pub mod value;
pub mod variable;
