#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind<'a> {
    Identifier(&'a str),
    Number(f64),
    String(&'a str),
    True,
    False,
    Null,

    // Keywords
    If,
    Else,
    While,
    For,
    Foreach,
    In,
    Steps,
    Return,
    Break,
    Continue,
    Goto,
    New,
    This,
    Function,
    Class,
    Namespace,
    Public,
    Private,

    // Operators
    Equal,        // =
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Percent,      // %
    PlusPlus,     // ++
    MinusMinus,   // --
    EqualEqual,   // ==
    NotEqual,     // !=
    Less,         // <
    Greater,      // >
    LessEqual,    // <=
    GreaterEqual, // >=
    AndAnd,       // &&
    OrOr,         // ||
    Caret,        // ^
    Bang,         // !
    Dot,          // .

    // Delimiters
    LBrace,    // {
    RBrace,    // }
    LParen,    // (
    RParen,    // )
    LBracket,  // [
    RBracket,  // ]
    Comma,     // ,
    Semicolon, // ;
    Colon,     // :

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind<'a>, span: Span) -> Self {
        Self { kind, span }
    }
}

impl<'a> TokenKind<'a> {
    /// Keyword lookup for an identifier-shaped word.
    pub(crate) fn keyword(word: &str) -> Option<TokenKind<'static>> {
        let kind = match word {
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "foreach" => TokenKind::Foreach,
            "in" => TokenKind::In,
            "steps" => TokenKind::Steps,
            "return" => TokenKind::Return,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "goto" => TokenKind::Goto,
            "new" => TokenKind::New,
            "this" => TokenKind::This,
            "function" => TokenKind::Function,
            "class" => TokenKind::Class,
            "namespace" => TokenKind::Namespace,
            "public" => TokenKind::Public,
            "private" => TokenKind::Private,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => return None,
        };
        Some(kind)
    }

    /// Human-readable rendering used by parser error messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::Identifier(name) => format!("identifier '{name}'"),
            TokenKind::Number(value) => format!("number {value}"),
            TokenKind::String(value) => format!("string \"{value}\""),
            TokenKind::Eof => "end of input".to_string(),
            other => format!("{other:?}"),
        }
    }
}
