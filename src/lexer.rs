use std::{iter::Peekable, str::CharIndices};

use crate::error::CompilationError;
use crate::token::{Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 1,
            column: 0,
        }
    }

    pub fn next_token(&mut self) -> Result<Token<'a>, CompilationError> {
        self.skip_trivia()?;

        let (start_idx, ch) = match self.chars.peek() {
            Some(&(idx, c)) => (idx, c),
            None => {
                let index = self.input.len();
                return Ok(Token::new(
                    TokenKind::Eof,
                    Span {
                        start: index,
                        end: index,
                        line: self.line,
                        column: self.column,
                    },
                ));
            }
        };

        let start_line = self.line;
        let start_column = self.column;

        match ch {
            '"' => self.read_string(start_idx, start_line, start_column),
            c if c.is_alphabetic() || c == '_' => {
                Ok(self.read_identifier(start_idx, start_line, start_column))
            }
            c if c.is_ascii_digit() => self.read_number(start_idx, start_line, start_column),
            _ => self.read_operator(start_idx, ch, start_line, start_column),
        }
    }

    /// Skips whitespace and both comment forms. Line breaks and tabs are
    /// plain separators; `//` runs to end of line, `/* */` may span lines.
    fn skip_trivia(&mut self) -> Result<(), CompilationError> {
        loop {
            while let Some(&(_, c)) = self.chars.peek() {
                if c == ' ' || c == '\t' || c == '\r' || c == '\n' {
                    self.advance_char();
                } else {
                    break;
                }
            }

            let mut lookahead = self.chars.clone();
            match (lookahead.next(), lookahead.peek()) {
                (Some((_, '/')), Some((_, '/'))) => {
                    while let Some(&(_, c)) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance_char();
                    }
                }
                (Some((_, '/')), Some((_, '*'))) => {
                    let line = self.line;
                    let column = self.column;
                    self.advance_char();
                    self.advance_char();
                    loop {
                        match self.advance_char() {
                            Some((_, '*')) => {
                                if let Some(&(_, '/')) = self.chars.peek() {
                                    self.advance_char();
                                    break;
                                }
                            }
                            Some(_) => {}
                            None => {
                                return Err(CompilationError::UnterminatedBlockComment {
                                    line,
                                    column,
                                });
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn read_identifier(&mut self, start: usize, line: usize, column: usize) -> Token<'a> {
        self.advance_char();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance_char();
            } else {
                break;
            }
        }

        let end_idx = self.current_index();
        let word = &self.input[start..end_idx];
        let kind = TokenKind::keyword(word).unwrap_or(TokenKind::Identifier(word));
        Token::new(
            kind,
            Span {
                start,
                end: end_idx,
                line,
                column,
            },
        )
    }

    fn read_number(
        &mut self,
        start: usize,
        line: usize,
        column: usize,
    ) -> Result<Token<'a>, CompilationError> {
        self.advance_char();
        let mut seen_dot = false;
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                self.advance_char();
            } else if c == '.' && !seen_dot {
                // Only consume the dot when a digit follows, so that
                // `1.Get()` keeps the dot as an accessor.
                let mut lookahead = self.chars.clone();
                lookahead.next();
                match lookahead.peek() {
                    Some(&(_, next)) if next.is_ascii_digit() => {
                        seen_dot = true;
                        self.advance_char();
                    }
                    _ => break,
                }
            } else {
                break;
            }
        }

        let end_idx = self.current_index();
        let literal = &self.input[start..end_idx];
        let value = literal
            .parse::<f64>()
            .map_err(|_| CompilationError::InvalidNumberLiteral {
                literal: literal.to_string(),
                line,
                column,
            })?;
        Ok(Token::new(
            TokenKind::Number(value),
            Span {
                start,
                end: end_idx,
                line,
                column,
            },
        ))
    }

    fn read_string(
        &mut self,
        start: usize,
        line: usize,
        column: usize,
    ) -> Result<Token<'a>, CompilationError> {
        self.advance_char(); // opening quote
        let content_start = (start + 1).min(self.input.len());
        while let Some(&(idx, c)) = self.chars.peek() {
            if c == '"' {
                self.advance_char(); // closing quote
                return Ok(Token::new(
                    TokenKind::String(&self.input[content_start..idx]),
                    Span {
                        start,
                        end: idx + 1,
                        line,
                        column,
                    },
                ));
            }
            if c == '\n' {
                return Err(CompilationError::UnterminatedString { line, column });
            }
            self.advance_char();
        }
        Err(CompilationError::UnterminatedString { line, column })
    }

    fn read_operator(
        &mut self,
        start: usize,
        first: char,
        line: usize,
        column: usize,
    ) -> Result<Token<'a>, CompilationError> {
        self.advance_char();
        let second = self.chars.peek().map(|&(_, c)| c);

        // Greedy two-character match first.
        let two = match (first, second) {
            ('+', Some('+')) => Some(TokenKind::PlusPlus),
            ('-', Some('-')) => Some(TokenKind::MinusMinus),
            ('=', Some('=')) => Some(TokenKind::EqualEqual),
            ('!', Some('=')) => Some(TokenKind::NotEqual),
            ('<', Some('=')) => Some(TokenKind::LessEqual),
            ('>', Some('=')) => Some(TokenKind::GreaterEqual),
            ('&', Some('&')) => Some(TokenKind::AndAnd),
            ('|', Some('|')) => Some(TokenKind::OrOr),
            _ => None,
        };
        if let Some(kind) = two {
            self.advance_char();
            return Ok(Token::new(
                kind,
                Span {
                    start,
                    end: start + 2,
                    line,
                    column,
                },
            ));
        }

        let kind = match first {
            '=' => TokenKind::Equal,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '<' => TokenKind::Less,
            '>' => TokenKind::Greater,
            '^' => TokenKind::Caret,
            '!' => TokenKind::Bang,
            '.' => TokenKind::Dot,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            other => {
                return Err(CompilationError::UnexpectedCharacter {
                    character: other,
                    line,
                    column,
                });
            }
        };
        Ok(Token::new(
            kind,
            Span {
                start,
                end: start + 1,
                line,
                column,
            },
        ))
    }

    fn advance_char(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn current_index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.input.len())
    }
}

pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, CompilationError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = matches!(token.kind, TokenKind::Eof);
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}
