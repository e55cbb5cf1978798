use rustc_hash::FxHashSet;

use crate::ast::{
    AssignTarget, BinaryOperator, ChainOperator, ComparisonOperator, Expression, Program,
    Statement,
};
use crate::error::CompilationError;
use crate::lexer;
use crate::token::{Span, Token, TokenKind};

/// Parses one executable body into a `Program`, applying all structural
/// desugaring: `[…]` literals, indexer get/set, `x++`/`x--`, `foreach`,
/// and dotted accessor chains. Labels and `goto` targets are validated
/// statically; a `goto` may only name a label in its own or an enclosing
/// block.
pub fn parse(input: &str) -> Result<Program, CompilationError> {
    let tokens = lexer::tokenize(input)?;
    let program = Parser::new(tokens).parse_program()?;
    validate_labels(&program.body, &mut Vec::new())?;
    Ok(program)
}

/// Parses a single expression, as consumed by the solver string entry
/// points. Trailing tokens are rejected.
pub fn parse_expression(input: &str) -> Result<Expression, CompilationError> {
    let tokens = lexer::tokenize(input)?;
    let mut parser = Parser::new(tokens);
    let expression = parser.parse_expression()?;
    parser.expect(TokenKind::Eof, "end of input")?;
    Ok(expression)
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    position: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<Token<'a>>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    fn parse_program(mut self) -> Result<Program, CompilationError> {
        let mut body = Vec::new();
        while !matches!(self.current(), TokenKind::Eof) {
            body.push(self.parse_statement()?);
        }
        Ok(Program { body })
    }

    fn parse_statement(&mut self) -> Result<Statement, CompilationError> {
        match self.current() {
            TokenKind::LBrace => Ok(Statement::Block(self.parse_block()?)),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(false),
            TokenKind::Foreach => self.parse_for(true),
            TokenKind::Return => self.parse_return(),
            TokenKind::Break => {
                self.advance();
                self.expect_semicolon()?;
                Ok(Statement::Break)
            }
            TokenKind::Continue => {
                self.advance();
                self.expect_semicolon()?;
                Ok(Statement::Continue)
            }
            TokenKind::Goto => {
                self.advance();
                let name = self.expect_identifier()?;
                self.expect_semicolon()?;
                Ok(Statement::Goto(name))
            }
            TokenKind::Identifier(_) if matches!(self.peek(), TokenKind::Colon) => {
                let name = self.expect_identifier()?;
                self.advance(); // colon
                Ok(Statement::Label(name))
            }
            TokenKind::Identifier(_)
                if matches!(self.peek(), TokenKind::PlusPlus | TokenKind::MinusMinus) =>
            {
                self.parse_increment()
            }
            _ if self.statement_is_assignment() => self.parse_assignment(),
            _ => {
                let expr = self.parse_expression()?;
                self.expect_semicolon()?;
                Ok(Statement::Expr(expr))
            }
        }
    }

    /// `x++;` and `x--;` lower to the same tree as `x = x + 1;` / `x = x - 1;`.
    fn parse_increment(&mut self) -> Result<Statement, CompilationError> {
        let name = self.expect_identifier()?;
        let op = match self.current() {
            TokenKind::PlusPlus => BinaryOperator::Add,
            _ => BinaryOperator::Sub,
        };
        self.advance();
        self.expect_semicolon()?;
        Ok(Statement::Assign {
            target: AssignTarget::Name(name.clone()),
            value: Expression::BinaryOp {
                left: Box::new(Expression::Identifier(name)),
                op,
                right: Box::new(Expression::Number(1.0)),
            },
        })
    }

    /// True when the tokens up to the statement's `;` contain a bare `=`
    /// outside any bracket nesting.
    fn statement_is_assignment(&self) -> bool {
        let mut depth = 0usize;
        for token in &self.tokens[self.position..] {
            match token.kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    if depth == 0 {
                        return false;
                    }
                    depth -= 1;
                }
                TokenKind::Equal if depth == 0 => return true,
                TokenKind::Semicolon if depth == 0 => return false,
                TokenKind::Eof => return false,
                _ => {}
            }
        }
        false
    }

    fn parse_assignment(&mut self) -> Result<Statement, CompilationError> {
        let head = match self.current() {
            TokenKind::This => {
                self.advance();
                Expression::This
            }
            TokenKind::Identifier(name) => {
                let name = name.to_string();
                self.advance();
                Expression::Identifier(name)
            }
            other => {
                let found = other.describe();
                return Err(self.unexpected("assignment target", &found));
            }
        };

        // Walk the postfix chain, keeping a trailing indexer unfolded so
        // that `x[i] = v` becomes `x.Set(i, v)` instead of a `Get`.
        let mut object = head;
        let mut pending_index: Option<Expression> = None;
        loop {
            match self.current() {
                TokenKind::Dot => {
                    object = Self::fold_index(object, pending_index.take());
                    self.advance();
                    let name = self.expect_identifier()?;
                    object = Expression::Attribute {
                        object: Box::new(object),
                        name,
                    };
                }
                TokenKind::LBracket => {
                    object = Self::fold_index(object, pending_index.take());
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RBracket, "]")?;
                    pending_index = Some(index);
                }
                TokenKind::LParen => {
                    object = Self::fold_index(object, pending_index.take());
                    let args = self.parse_call_args()?;
                    object = Expression::Call {
                        callee: Box::new(object),
                        args,
                    };
                }
                _ => break,
            }
        }

        self.expect(TokenKind::Equal, "=")?;
        let value = self.parse_expression()?;
        self.expect_semicolon()?;

        if let Some(index) = pending_index {
            // Indexer write: x[i] = v  =>  x.Set(i, v);
            return Ok(Statement::Expr(Expression::Call {
                callee: Box::new(Expression::Attribute {
                    object: Box::new(object),
                    name: "Set".to_string(),
                }),
                args: vec![index, value],
            }));
        }

        let target = match object {
            Expression::Identifier(name) => AssignTarget::Name(name),
            Expression::Attribute { object, name } => AssignTarget::Attribute {
                object: *object,
                name,
            },
            other => {
                return Err(self.unexpected("assignment target", &format!("{other:?}")));
            }
        };
        Ok(Statement::Assign { target, value })
    }

    fn fold_index(object: Expression, index: Option<Expression>) -> Expression {
        match index {
            Some(index) => Expression::Call {
                callee: Box::new(Expression::Attribute {
                    object: Box::new(object),
                    name: "Get".to_string(),
                }),
                args: vec![index],
            },
            None => object,
        }
    }

    fn parse_if(&mut self) -> Result<Statement, CompilationError> {
        self.advance(); // if
        let condition = self.parse_expression()?;
        let then_body = self.parse_block()?;
        let else_body = if matches!(self.current(), TokenKind::Else) {
            self.advance();
            if matches!(self.current(), TokenKind::If) {
                vec![self.parse_if()?]
            } else {
                self.parse_block()?
            }
        } else {
            Vec::new()
        };
        Ok(Statement::If {
            condition,
            then_body,
            else_body,
        })
    }

    fn parse_while(&mut self) -> Result<Statement, CompilationError> {
        self.advance(); // while
        let condition = self.parse_expression()?;
        let body = self.parse_block()?;
        Ok(Statement::While { condition, body })
    }

    /// `for x in source [steps n] { … }`; `foreach` is the same loop with
    /// an implied step of 1.
    fn parse_for(&mut self, foreach: bool) -> Result<Statement, CompilationError> {
        self.advance(); // for / foreach
        let binding = self.expect_identifier()?;
        self.expect(TokenKind::In, "in")?;
        let source = self.parse_expression()?;
        let steps = if !foreach && matches!(self.current(), TokenKind::Steps) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        Ok(Statement::For {
            binding,
            source,
            steps,
            body,
        })
    }

    fn parse_return(&mut self) -> Result<Statement, CompilationError> {
        self.advance(); // return
        if matches!(self.current(), TokenKind::Semicolon) {
            self.advance();
            return Ok(Statement::Return(None));
        }
        let value = self.parse_expression()?;
        self.expect_semicolon()?;
        Ok(Statement::Return(Some(value)))
    }

    fn parse_block(&mut self) -> Result<Vec<Statement>, CompilationError> {
        let open_span = self.current_span();
        self.expect(TokenKind::LBrace, "{")?;
        let mut body = Vec::new();
        loop {
            match self.current() {
                TokenKind::RBrace => {
                    self.advance();
                    return Ok(body);
                }
                TokenKind::Eof => {
                    return Err(CompilationError::UnmatchedBrace {
                        line: open_span.line,
                        column: open_span.column,
                    });
                }
                _ => body.push(self.parse_statement()?),
            }
        }
    }

    // Expression grammar, loosest binding first. The logical chain level is
    // deliberately flat: `&&`, `||` and `^` share one precedence and fold
    // strictly left-to-right.
    fn parse_expression(&mut self) -> Result<Expression, CompilationError> {
        let first = self.parse_comparison()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.current() {
                TokenKind::AndAnd => ChainOperator::And,
                TokenKind::OrOr => ChainOperator::Or,
                TokenKind::Caret => ChainOperator::Xor,
                _ => break,
            };
            self.advance();
            rest.push((op, self.parse_comparison()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expression::LogicalChain {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn parse_comparison(&mut self) -> Result<Expression, CompilationError> {
        let left = self.parse_additive()?;
        let op = match self.current() {
            TokenKind::EqualEqual => ComparisonOperator::Eq,
            TokenKind::NotEqual => ComparisonOperator::Ne,
            TokenKind::Less => ComparisonOperator::Lt,
            TokenKind::Greater => ComparisonOperator::Gt,
            TokenKind::LessEqual => ComparisonOperator::Le,
            TokenKind::GreaterEqual => ComparisonOperator::Ge,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_additive()?;
        Ok(Expression::Comparison {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    fn parse_additive(&mut self) -> Result<Expression, CompilationError> {
        let mut expr = self.parse_multiplicative()?;
        loop {
            let op = match self.current() {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            expr = Expression::BinaryOp {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, CompilationError> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.current() {
                TokenKind::Star => BinaryOperator::Mul,
                TokenKind::Slash => BinaryOperator::Div,
                TokenKind::Percent => BinaryOperator::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            expr = Expression::BinaryOp {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expression, CompilationError> {
        match self.current() {
            TokenKind::Bang => {
                self.advance();
                Ok(Expression::Not(Box::new(self.parse_unary()?)))
            }
            TokenKind::Minus => {
                self.advance();
                Ok(Expression::Negate(Box::new(self.parse_unary()?)))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expression, CompilationError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current() {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_identifier()?;
                    expr = Expression::Attribute {
                        object: Box::new(expr),
                        name,
                    };
                }
                TokenKind::LParen => {
                    let args = self.parse_call_args()?;
                    expr = Expression::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                TokenKind::LBracket => {
                    // Indexer read: x[i]  =>  x.Get(i)
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RBracket, "]")?;
                    expr = Expression::Call {
                        callee: Box::new(Expression::Attribute {
                            object: Box::new(expr),
                            name: "Get".to_string(),
                        }),
                        args: vec![index],
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expression, CompilationError> {
        match self.current() {
            TokenKind::Number(value) => {
                let value = *value;
                self.advance();
                Ok(Expression::Number(value))
            }
            TokenKind::String(value) => {
                let value = value.to_string();
                self.advance();
                Ok(Expression::String(value))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expression::Boolean(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expression::Boolean(false))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expression::Null)
            }
            TokenKind::This => {
                self.advance();
                Ok(Expression::This)
            }
            TokenKind::Identifier(name) => {
                let name = name.to_string();
                self.advance();
                Ok(Expression::Identifier(name))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen, ")")?;
                Ok(expr)
            }
            TokenKind::LBracket => self.parse_collection_literal(),
            TokenKind::New => self.parse_new(),
            other => {
                let found = other.describe();
                Err(self.unexpected("expression", &found))
            }
        }
    }

    /// `[a, b, c]` lowers to the same tree as `new Collection(a, b, c)`.
    fn parse_collection_literal(&mut self) -> Result<Expression, CompilationError> {
        self.advance(); // [
        let mut args = Vec::new();
        if !matches!(self.current(), TokenKind::RBracket) {
            loop {
                args.push(self.parse_expression()?);
                if matches!(self.current(), TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBracket, "]")?;
        Ok(Expression::New {
            class: "Collection".to_string(),
            args,
        })
    }

    fn parse_new(&mut self) -> Result<Expression, CompilationError> {
        self.advance(); // new
        let class = self.expect_identifier()?;
        let args = self.parse_call_args()?;
        Ok(Expression::New { class, args })
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expression>, CompilationError> {
        self.expect(TokenKind::LParen, "(")?;
        let mut args = Vec::new();
        if !matches!(self.current(), TokenKind::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if matches!(self.current(), TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, ")")?;
        Ok(args)
    }

    fn current(&self) -> &TokenKind<'a> {
        &self.tokens[self.position].kind
    }

    fn current_span(&self) -> Span {
        self.tokens[self.position].span
    }

    fn peek(&self) -> &TokenKind<'a> {
        let next = (self.position + 1).min(self.tokens.len() - 1);
        &self.tokens[next].kind
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn expect(&mut self, kind: TokenKind<'_>, display: &str) -> Result<(), CompilationError> {
        if std::mem::discriminant(self.current()) == std::mem::discriminant(&kind) {
            self.advance();
            Ok(())
        } else {
            let found = self.current().describe();
            Err(self.unexpected(display, &found))
        }
    }

    fn expect_semicolon(&mut self) -> Result<(), CompilationError> {
        self.expect(TokenKind::Semicolon, ";")
    }

    fn expect_identifier(&mut self) -> Result<String, CompilationError> {
        if let TokenKind::Identifier(name) = self.current() {
            let name = name.to_string();
            self.advance();
            Ok(name)
        } else {
            let found = self.current().describe();
            Err(self.unexpected("identifier", &found))
        }
    }

    fn unexpected(&self, expected: &str, found: &str) -> CompilationError {
        let span = self.current_span();
        CompilationError::UnexpectedToken {
            expected: expected.to_string(),
            found: found.to_string(),
            line: span.line,
            column: span.column,
        }
    }
}

/// Checks label uniqueness per block and that every `goto` can reach its
/// label by searching the current block and then outward through enclosing
/// blocks. Labels are never visible to sibling or inner blocks.
fn validate_labels(
    body: &[Statement],
    stack: &mut Vec<FxHashSet<String>>,
) -> Result<(), CompilationError> {
    let mut labels = FxHashSet::default();
    for statement in body {
        if let Statement::Label(name) = statement {
            if !labels.insert(name.clone()) {
                return Err(CompilationError::DuplicateLabel { name: name.clone() });
            }
        }
    }
    stack.push(labels);

    for statement in body {
        match statement {
            Statement::Goto(name) => {
                if !stack.iter().any(|labels| labels.contains(name)) {
                    return Err(CompilationError::UnknownLabel { name: name.clone() });
                }
            }
            Statement::If {
                then_body,
                else_body,
                ..
            } => {
                validate_labels(then_body, stack)?;
                validate_labels(else_body, stack)?;
            }
            Statement::While { body, .. }
            | Statement::For { body, .. }
            | Statement::Block(body) => {
                validate_labels(body, stack)?;
            }
            _ => {}
        }
    }

    stack.pop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn parses_assignment_and_call() {
        let program = parse("n = 1 + 2; Print(n);").expect("parse failed");
        assert_eq!(
            program.body,
            vec![
                Statement::Assign {
                    target: AssignTarget::Name("n".to_string()),
                    value: Expression::BinaryOp {
                        left: Box::new(Expression::Number(1.0)),
                        op: BinaryOperator::Add,
                        right: Box::new(Expression::Number(2.0)),
                    },
                },
                Statement::Expr(Expression::Call {
                    callee: Box::new(Expression::Identifier("Print".to_string())),
                    args: vec![Expression::Identifier("n".to_string())],
                }),
            ]
        );
    }

    #[test]
    fn collection_literal_matches_new_collection() {
        let literal = parse("x = [1, 2, 3];").expect("parse failed");
        let spelled = parse("x = new Collection(1, 2, 3);").expect("parse failed");
        assert_eq!(literal, spelled);
    }

    #[test]
    fn increment_matches_spelled_out_assignment() {
        let increment = parse("x++;").expect("parse failed");
        let spelled = parse("x = x + 1;").expect("parse failed");
        assert_eq!(increment, spelled);

        let decrement = parse("x--;").expect("parse failed");
        let spelled = parse("x = x - 1;").expect("parse failed");
        assert_eq!(decrement, spelled);
    }

    #[test]
    fn indexer_read_lowers_to_get() {
        let indexed = parse("y = x[i];").expect("parse failed");
        let spelled = parse("y = x.Get(i);").expect("parse failed");
        assert_eq!(indexed, spelled);
    }

    #[test]
    fn indexer_write_lowers_to_set() {
        let indexed = parse("x[2] = v;").expect("parse failed");
        let spelled = parse("x.Set(2, v);").expect("parse failed");
        assert_eq!(indexed, spelled);
    }

    #[test]
    fn foreach_is_for_with_unit_steps() {
        let foreach = parse("foreach x in items { Print(x); }").expect("parse failed");
        let Statement::For { binding, steps, .. } = &foreach.body[0] else {
            panic!("expected for statement, got {:?}", foreach.body[0]);
        };
        assert_eq!(binding, "x");
        assert_eq!(*steps, None);
    }

    #[test]
    fn for_with_steps_keeps_step_expression() {
        let program = parse("for x in items steps 2 { Print(x); }").expect("parse failed");
        let Statement::For { steps, .. } = &program.body[0] else {
            panic!("expected for statement");
        };
        assert_eq!(*steps, Some(Expression::Number(2.0)));
    }

    #[test]
    fn logical_chain_is_flat_and_left_to_right() {
        let program = parse("b = true || false && false;").expect("parse failed");
        let Statement::Assign { value, .. } = &program.body[0] else {
            panic!("expected assignment");
        };
        assert_eq!(
            *value,
            Expression::LogicalChain {
                first: Box::new(Expression::Boolean(true)),
                rest: vec![
                    (ChainOperator::Or, Expression::Boolean(false)),
                    (ChainOperator::And, Expression::Boolean(false)),
                ],
            }
        );
    }

    #[test]
    fn arithmetic_binds_tighter_than_comparison_and_chain() {
        let program = parse("b = 1 + 2 * 3 == 7 && x < 2;").expect("parse failed");
        let Statement::Assign { value, .. } = &program.body[0] else {
            panic!("expected assignment");
        };
        let Expression::LogicalChain { first, rest } = value else {
            panic!("expected logical chain, got {value:?}");
        };
        assert!(matches!(**first, Expression::Comparison { .. }));
        assert_eq!(rest.len(), 1);
        assert!(matches!(rest[0].1, Expression::Comparison { .. }));
    }

    #[test]
    fn dotted_chain_parses_to_nested_attributes() {
        let program = parse("v = a.b.c(1);").expect("parse failed");
        let Statement::Assign { value, .. } = &program.body[0] else {
            panic!("expected assignment");
        };
        assert_eq!(
            *value,
            Expression::Call {
                callee: Box::new(Expression::Attribute {
                    object: Box::new(Expression::Attribute {
                        object: Box::new(Expression::Identifier("a".to_string())),
                        name: "b".to_string(),
                    }),
                    name: "c".to_string(),
                }),
                args: vec![Expression::Number(1.0)],
            }
        );
    }

    #[test]
    fn attribute_assignment_targets_the_field() {
        let program = parse("this.value = 7;").expect("parse failed");
        assert_eq!(
            program.body,
            vec![Statement::Assign {
                target: AssignTarget::Attribute {
                    object: Expression::This,
                    name: "value".to_string(),
                },
                value: Expression::Number(7.0),
            }]
        );
    }

    #[test]
    fn parses_labels_and_goto() {
        let input = indoc! {"
            top:
            n = n + 1;
            goto top;
        "};
        let program = parse(input).expect("parse failed");
        assert_eq!(program.body[0], Statement::Label("top".to_string()));
        assert_eq!(program.body[2], Statement::Goto("top".to_string()));
    }

    #[test]
    fn goto_sees_labels_of_enclosing_blocks() {
        let input = indoc! {"
            top:
            {
                { goto top; }
            }
        "};
        parse(input).expect("outer label should be visible from nested block");
    }

    #[test]
    fn errors_on_goto_into_sibling_block() {
        let input = indoc! {"
            { inner: n = 1; }
            { goto inner; }
        "};
        let error = parse(input).expect_err("expected unknown label");
        assert_eq!(
            error,
            CompilationError::UnknownLabel {
                name: "inner".to_string()
            }
        );
    }

    #[test]
    fn errors_on_duplicate_label_in_one_block() {
        let error = parse("a: n = 1; a: n = 2;").expect_err("expected duplicate label");
        assert_eq!(
            error,
            CompilationError::DuplicateLabel {
                name: "a".to_string()
            }
        );
    }

    #[test]
    fn errors_on_unmatched_brace() {
        let error = parse("while a { n = 1;").expect_err("expected unmatched brace");
        assert!(matches!(error, CompilationError::UnmatchedBrace { .. }));
    }

    #[test]
    fn errors_on_missing_semicolon() {
        let error = parse("n = 1").expect_err("expected missing semicolon");
        assert!(matches!(error, CompilationError::UnexpectedToken { .. }));
    }

    #[test]
    fn not_wraps_the_condition() {
        let program = parse("if !done { Print(1); }").expect("parse failed");
        let Statement::If { condition, .. } = &program.body[0] else {
            panic!("expected if");
        };
        assert_eq!(
            *condition,
            Expression::Not(Box::new(Expression::Identifier("done".to_string())))
        );
    }
}
