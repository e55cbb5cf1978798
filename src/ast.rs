#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
    Identifier(String),
    This,
    Not(Box<Expression>),
    Negate(Box<Expression>),
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    Comparison {
        left: Box<Expression>,
        op: ComparisonOperator,
        right: Box<Expression>,
    },
    /// Interleaved boolean chain, folded strictly left-to-right with no
    /// precedence between the chain operators.
    LogicalChain {
        first: Box<Expression>,
        rest: Vec<(ChainOperator, Expression)>,
    },
    Call {
        callee: Box<Expression>,
        args: Vec<Expression>,
    },
    Attribute {
        object: Box<Expression>,
        name: String,
    },
    New {
        class: String,
        args: Vec<Expression>,
    },
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ChainOperator {
    And,
    Or,
    Xor,
}

#[derive(Debug, PartialEq, Clone)]
pub enum AssignTarget {
    Name(String),
    Attribute {
        object: Expression,
        name: String,
    },
}

#[derive(Debug, PartialEq, Clone)]
pub enum Statement {
    Assign {
        target: AssignTarget,
        value: Expression,
    },
    If {
        condition: Expression,
        then_body: Vec<Statement>,
        else_body: Vec<Statement>,
    },
    While {
        condition: Expression,
        body: Vec<Statement>,
    },
    For {
        binding: String,
        source: Expression,
        steps: Option<Expression>,
        body: Vec<Statement>,
    },
    Block(Vec<Statement>),
    Return(Option<Expression>),
    Break,
    Continue,
    Label(String),
    Goto(String),
    Expr(Expression),
}

#[derive(Debug, PartialEq, Clone)]
pub struct Program {
    pub body: Vec<Statement>,
}
