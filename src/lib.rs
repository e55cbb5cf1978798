pub mod ast;
pub mod error;
pub mod fixtures;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod solver;
pub mod token;
