use thiserror::Error;

/// Errors determinable from token shape and declared types alone.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompilationError {
    #[error("Unexpected character '{character}' at line {line}, column {column}")]
    UnexpectedCharacter {
        character: char,
        line: usize,
        column: usize,
    },
    #[error("Unterminated string literal at line {line}, column {column}")]
    UnterminatedString { line: usize, column: usize },
    #[error("Unterminated block comment at line {line}, column {column}")]
    UnterminatedBlockComment { line: usize, column: usize },
    #[error("Invalid number literal '{literal}' at line {line}, column {column}")]
    InvalidNumberLiteral {
        literal: String,
        line: usize,
        column: usize,
    },
    #[error("Expected {expected}, got {found} at line {line}, column {column}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },
    #[error("Unmatched '{{' opened at line {line}, column {column}")]
    UnmatchedBrace { line: usize, column: usize },
    #[error("Undeclared identifier '{name}'")]
    UndeclaredIdentifier { name: String },
    #[error("Condition of 'if' must be a boolean, got {got}")]
    IfConditionNotBoolean { got: String },
    #[error("Condition of 'while' must be a boolean, got {got}")]
    WhileConditionNotBoolean { got: String },
    #[error("Function '{name}' expected {expected} arguments, got {found}")]
    FunctionArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Function '{name}' parameter '{parameter}' expects type {expected}, got {got}")]
    ParameterTypeMismatch {
        name: String,
        parameter: String,
        expected: String,
        got: String,
    },
    #[error("Undefined function '{name}'")]
    UndefinedFunction { name: String },
    #[error("Unknown class '{name}'")]
    UnknownClass { name: String },
    #[error("Constructor of class '{name}' expected {expected} arguments, got {found}")]
    ConstructorArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Unknown label '{name}'")]
    UnknownLabel { name: String },
    #[error("Duplicate label '{name}' in the same block")]
    DuplicateLabel { name: String },
}

impl CompilationError {
    /// Stable error code reported alongside the description.
    pub fn code(&self) -> &'static str {
        match self {
            CompilationError::UnexpectedCharacter { .. } => "WT-C001",
            CompilationError::UnterminatedString { .. } => "WT-C002",
            CompilationError::UnterminatedBlockComment { .. } => "WT-C003",
            CompilationError::InvalidNumberLiteral { .. } => "WT-C004",
            CompilationError::UnexpectedToken { .. } => "WT-C005",
            CompilationError::UnmatchedBrace { .. } => "WT-C006",
            CompilationError::UndeclaredIdentifier { .. } => "WT-C007",
            CompilationError::IfConditionNotBoolean { .. } => "WT-C008",
            CompilationError::WhileConditionNotBoolean { .. } => "WT-C009",
            CompilationError::FunctionArityMismatch { .. } => "WT-C010",
            CompilationError::ParameterTypeMismatch { .. } => "WT-C011",
            CompilationError::UndefinedFunction { .. } => "WT-C012",
            CompilationError::UnknownClass { .. } => "WT-C013",
            CompilationError::ConstructorArityMismatch { .. } => "WT-C014",
            CompilationError::UnknownLabel { .. } => "WT-C015",
            CompilationError::DuplicateLabel { .. } => "WT-C016",
        }
    }
}

/// Errors only observable from concrete runtime values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("Member '{member}' accessed on a null value")]
    NullAccess { member: String },
    #[error("Member '{member}' accessed on non-instance value of type {type_name}")]
    AccessorOnNonInstance { member: String, type_name: String },
    #[error("Unknown member '{member}' on instance of class {class}")]
    UnknownMember { member: String, class: String },
    #[error("Operator '{operator}' is not valid in a string concatenation")]
    InvalidConcatenation { operator: String },
    #[error("Operator '{operator}' is not supported for {left} and {right}")]
    InvalidOperands {
        operator: String,
        left: String,
        right: String,
    },
    #[error("Boolean chain operand must be a boolean, got {got}")]
    InvalidChainOperand { got: String },
    #[error("Cannot compare {left} with {right}")]
    IncomparableTypes { left: String, right: String },
    #[error("Operand of '{operator}' must be {expected}, got {got}")]
    InvalidUnaryOperand {
        operator: String,
        expected: String,
        got: String,
    },
    #[error("Collection index must be a non-negative number, got {got}")]
    InvalidIndex { got: String },
    #[error("Collection index {index} out of bounds, size {size}")]
    IndexOutOfBounds { index: usize, size: usize },
    #[error("'for' source must be a collection, got {got}")]
    ForSourceNotCollection { got: String },
    #[error("'for' steps must be a positive number, got {got}")]
    InvalidForSteps { got: String },
    #[error("Value of type {type_name} is not callable")]
    NotCallable { type_name: String },
    #[error("Native function '{name}' failed: {message}")]
    NativeFunction { name: String, message: String },
    #[error("Expression did not evaluate to a boolean, got {got}")]
    NonBooleanExpression { got: String },
    #[error("Expression did not evaluate to a number, got {got}")]
    NonNumericExpression { got: String },
}

impl ExecutionError {
    /// Stable error code reported alongside the description.
    pub fn code(&self) -> &'static str {
        match self {
            ExecutionError::NullAccess { .. } => "WT-E001",
            ExecutionError::AccessorOnNonInstance { .. } => "WT-E002",
            ExecutionError::UnknownMember { .. } => "WT-E003",
            ExecutionError::InvalidConcatenation { .. } => "WT-E004",
            ExecutionError::InvalidOperands { .. } => "WT-E005",
            ExecutionError::InvalidChainOperand { .. } => "WT-E006",
            ExecutionError::IncomparableTypes { .. } => "WT-E007",
            ExecutionError::InvalidUnaryOperand { .. } => "WT-E008",
            ExecutionError::InvalidIndex { .. } => "WT-E009",
            ExecutionError::IndexOutOfBounds { .. } => "WT-E010",
            ExecutionError::ForSourceNotCollection { .. } => "WT-E011",
            ExecutionError::InvalidForSteps { .. } => "WT-E012",
            ExecutionError::NotCallable { .. } => "WT-E013",
            ExecutionError::NativeFunction { .. } => "WT-E014",
            ExecutionError::NonBooleanExpression { .. } => "WT-E015",
            ExecutionError::NonNumericExpression { .. } => "WT-E016",
        }
    }
}

/// Umbrella error returned by interpretation entry points.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ThornError {
    #[error(transparent)]
    Compilation(#[from] CompilationError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl ThornError {
    pub fn code(&self) -> &'static str {
        match self {
            ThornError::Compilation(error) => error.code(),
            ThornError::Execution(error) => error.code(),
        }
    }
}
