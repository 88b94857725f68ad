use std::iter::Peekable;

use crate::error::{Error, Result};
use crate::sql::parser::ast::{BinaryOperator, Consts, Expression, SelectItem, TableName, UnaryOperator};
use crate::sql::parser::lexer::{Keyword, Lexer, Token};
use crate::sql::types::Value;

pub mod ast;
mod lexer;

/// Operator precedence levels, lowest binding first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Or,
    And,
    Not,
    Comparison,
    AddSub,
    MulDiv,
    Unary,
}

impl Precedence {
    fn next(self) -> Self {
        match self {
            Precedence::Lowest => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Not,
            Precedence::Not => Precedence::Comparison,
            Precedence::Comparison => Precedence::AddSub,
            Precedence::AddSub => Precedence::MulDiv,
            Precedence::MulDiv | Precedence::Unary => Precedence::Unary,
        }
    }
}

/// SQL Parser - Converts tokens into Abstract Syntax Tree (AST)
pub struct Parser<'a> {
    lexer: Peekable<Lexer<'a>>,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given SQL input
    pub fn new(input: &'a str) -> Self {
        Parser {
            lexer: Lexer::new(input).peekable(),
        }
    }

    /// Parses the input SQL statement into an AST. The trailing semicolon is optional.
    pub fn parse(&mut self) -> Result<ast::Statement> {
        let stmt = self.parse_statement()?;
        self.next_if_token(Token::Semicolon);
        if let Some(token) = self.peek()? {
            return Err(Error::Syntax(format!("[Parser] Unexpected token {}", token)));
        }
        Ok(stmt)
    }

    /// Parses a statement based on the first token
    fn parse_statement(&mut self) -> Result<ast::Statement> {
        match self.peek()? {
            Some(Token::Keyword(Keyword::Select)) => self.parse_select(),
            Some(t) => Err(Error::Syntax(format!("[Parser] Unexpected token {}", t))),
            None => Err(Error::Syntax("[Parser] Unexpected end of input".into())),
        }
    }

    /// Parses SELECT <items> [FROM <table>] [WHERE <expr>] [LIMIT <expr>]
    fn parse_select(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Select))?;

        let mut select = Vec::new();
        loop {
            select.push(self.parse_select_item()?);
            if self.next_if_token(Token::Comma).is_none() {
                break;
            }
        }

        let from = match self.next_if_token(Token::Keyword(Keyword::From)) {
            Some(_) => Some(self.parse_table_name()?),
            None => None,
        };
        let where_clause = match self.next_if_token(Token::Keyword(Keyword::Where)) {
            Some(_) => Some(self.parse_expression()?),
            None => None,
        };
        let limit = match self.next_if_token(Token::Keyword(Keyword::Limit)) {
            Some(_) => Some(self.parse_expression()?),
            None => None,
        };

        Ok(ast::Statement::Select {
            select,
            from,
            where_clause,
            limit,
        })
    }

    /// Parses `*` or `<expr> [[AS] alias]`
    fn parse_select_item(&mut self) -> Result<SelectItem> {
        if self.next_if_token(Token::Asterisk).is_some() {
            return Ok(SelectItem::Wildcard);
        }
        let expr = self.parse_expression()?;
        let alias = if self.next_if_token(Token::Keyword(Keyword::As)).is_some() {
            Some(self.next_ident()?)
        } else if matches!(self.peek()?, Some(Token::Ident(_) | Token::QuotedIdent(_))) {
            Some(self.next_ident()?)
        } else {
            None
        };
        Ok(SelectItem::Expression(expr, alias))
    }

    /// Parses a table path: `table`, `dataset.table`, `project.dataset.table`,
    /// `project:dataset.table`, or any of those inside backticks.
    fn parse_table_name(&mut self) -> Result<TableName> {
        let mut project = None;
        let mut parts: Vec<String> = Vec::new();
        loop {
            match self.next()? {
                Token::Ident(ident) => parts.push(ident),
                Token::QuotedIdent(path) => {
                    let rest = match path.split_once(':') {
                        Some((p, rest)) if project.is_none() && parts.is_empty() => {
                            project = Some(p.to_string());
                            rest.to_string()
                        }
                        Some(_) => {
                            return Err(Error::Syntax(format!("[Parser] Invalid table name {}", path)));
                        }
                        None => path.clone(),
                    };
                    parts.extend(rest.split('.').map(str::to_string));
                }
                token => {
                    return Err(Error::Syntax(format!(
                        "[Parser] Expected table name, got token {}",
                        token
                    )));
                }
            }
            match self.peek()? {
                Some(Token::Period) => {
                    self.next()?;
                }
                Some(Token::Colon) if project.is_none() && parts.len() == 1 => {
                    self.next()?;
                    project = parts.pop();
                }
                _ => break,
            }
        }

        if parts.iter().any(|p| p.is_empty()) {
            return Err(Error::Syntax("[Parser] Empty table name component".into()));
        }
        let mut parts = parts.into_iter();
        let name = match (project.is_some(), parts.len()) {
            (true, 2) | (false, 2) => TableName {
                project,
                dataset: parts.next(),
                table: parts.next().unwrap_or_default(),
            },
            (false, 3) => TableName {
                project: parts.next(),
                dataset: parts.next(),
                table: parts.next().unwrap_or_default(),
            },
            (false, 1) => TableName {
                project: None,
                dataset: None,
                table: parts.next().unwrap_or_default(),
            },
            _ => return Err(Error::Syntax("[Parser] Invalid table name".into())),
        };
        Ok(name)
    }

    /// Parses an expression
    fn parse_expression(&mut self) -> Result<Expression> {
        self.parse_expression_with_precedence(Precedence::Lowest)
    }

    /// Precedence climbing: binary operators bind left-associatively
    fn parse_expression_with_precedence(&mut self, min_prec: Precedence) -> Result<Expression> {
        let mut left = self.parse_prefix()?;

        loop {
            if min_prec <= Precedence::Comparison
                && self.next_if_token(Token::Keyword(Keyword::Is)).is_some()
            {
                let negated = self.next_if_token(Token::Keyword(Keyword::Not)).is_some();
                self.next_expect(Token::Keyword(Keyword::Null))?;
                left = Expression::IsNull {
                    expr: Box::new(left),
                    negated,
                };
                continue;
            }

            let Some((op, prec)) = self.peek_binary_op()? else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.next()?;
            let right = self.parse_expression_with_precedence(prec.next())?;
            left = Expression::binary(op, left, right);
        }

        Ok(left)
    }

    /// Parses unary operators (NOT, -, +) or a primary expression
    fn parse_prefix(&mut self) -> Result<Expression> {
        if self.next_if_token(Token::Keyword(Keyword::Not)).is_some() {
            let expr = self.parse_expression_with_precedence(Precedence::Not)?;
            return Ok(Expression::Unary {
                op: UnaryOperator::Not,
                expr: Box::new(expr),
            });
        }
        if self.next_if_token(Token::Minus).is_some() {
            // Fold the sign into negative numeric literals
            if let Some(Token::Number(n)) = self.next_if(|t| matches!(t, Token::Number(_))) {
                return Self::parse_number(&format!("-{}", n));
            }
            let expr = self.parse_expression_with_precedence(Precedence::Unary)?;
            return Ok(Expression::Unary {
                op: UnaryOperator::Minus,
                expr: Box::new(expr),
            });
        }
        if self.next_if_token(Token::Plus).is_some() {
            let expr = self.parse_expression_with_precedence(Precedence::Unary)?;
            return Ok(Expression::Unary {
                op: UnaryOperator::Plus,
                expr: Box::new(expr),
            });
        }
        self.parse_primary()
    }

    /// Parses literals, field references and parenthesized expressions
    fn parse_primary(&mut self) -> Result<Expression> {
        Ok(match self.next()? {
            Token::Number(n) => Self::parse_number(&n)?,
            Token::String(s) => Consts::String(s).into(),
            Token::Keyword(Keyword::True) => Consts::Boolean(true).into(),
            Token::Keyword(Keyword::False) => Consts::Boolean(false).into(),
            Token::Keyword(Keyword::Null) => Consts::Null.into(),
            // TIMESTAMP is a literal prefix only before a string, otherwise a field name
            Token::Ident(ident)
                if ident.eq_ignore_ascii_case("timestamp")
                    && matches!(self.peek()?, Some(Token::String(_))) =>
            {
                match self.next()? {
                    Token::String(s) if Value::parse_timestamp(&s).is_some() => Consts::Timestamp(s).into(),
                    t => {
                        return Err(Error::Syntax(format!("[Parser] Invalid timestamp literal '{}'", t)));
                    }
                }
            }
            Token::OpenParen => {
                let expr = self.parse_expression()?;
                self.next_expect(Token::CloseParen)?;
                expr
            }
            Token::Ident(ident) | Token::QuotedIdent(ident) => {
                let mut parts = vec![ident];
                while self.next_if_token(Token::Period).is_some() {
                    parts.push(self.next_ident()?);
                }
                let name = parts.pop().unwrap_or_default();
                Expression::Field {
                    qualifier: parts,
                    name,
                }
            }
            t => {
                return Err(Error::Syntax(format!(
                    "[Parser] Unexpected expression token {}",
                    t
                )));
            }
        })
    }

    /// Parses a numeric literal; the lexer scans both 123 and 123.45 as Token::Number
    fn parse_number(n: &str) -> Result<Expression> {
        let digits = n.strip_prefix('-').unwrap_or(n);
        Ok(if digits.chars().all(|c| c.is_ascii_digit()) {
            Consts::Integer(n.parse()?).into()
        } else {
            Consts::Float(n.parse()?).into()
        })
    }

    /// Maps the next token to a binary operator, without consuming it
    fn peek_binary_op(&mut self) -> Result<Option<(BinaryOperator, Precedence)>> {
        Ok(Some(match self.peek()? {
            Some(Token::Keyword(Keyword::Or)) => (BinaryOperator::Or, Precedence::Or),
            Some(Token::Keyword(Keyword::And)) => (BinaryOperator::And, Precedence::And),
            Some(Token::Equal) => (BinaryOperator::Equal, Precedence::Comparison),
            Some(Token::NotEqual) => (BinaryOperator::NotEqual, Precedence::Comparison),
            Some(Token::LessThan) => (BinaryOperator::LessThan, Precedence::Comparison),
            Some(Token::LessThanOrEqual) => (BinaryOperator::LessThanOrEqual, Precedence::Comparison),
            Some(Token::GreaterThan) => (BinaryOperator::GreaterThan, Precedence::Comparison),
            Some(Token::GreaterThanOrEqual) => (BinaryOperator::GreaterThanOrEqual, Precedence::Comparison),
            Some(Token::Plus) => (BinaryOperator::Add, Precedence::AddSub),
            Some(Token::Minus) => (BinaryOperator::Subtract, Precedence::AddSub),
            Some(Token::Asterisk) => (BinaryOperator::Multiply, Precedence::MulDiv),
            Some(Token::Slash) => (BinaryOperator::Divide, Precedence::MulDiv),
            Some(Token::Percent) => (BinaryOperator::Modulo, Precedence::MulDiv),
            _ => return Ok(None),
        }))
    }

    /// Peeks at the next token
    fn peek(&mut self) -> Result<Option<Token>> {
        self.lexer.peek().cloned().transpose()
    }

    /// Consumes and returns the next token
    fn next(&mut self) -> Result<Token> {
        self.lexer
            .next()
            .unwrap_or_else(|| Err(Error::Syntax("[Parser] Unexpected end of input".into())))
    }

    /// Expects and consumes an identifier (plain or backtick-quoted)
    fn next_ident(&mut self) -> Result<String> {
        match self.next()? {
            Token::Ident(ident) | Token::QuotedIdent(ident) => Ok(ident),
            token => Err(Error::Syntax(format!(
                "[Parser] Expected ident, got token {}",
                token
            ))),
        }
    }

    /// Expects a specific token, returns error if different
    fn next_expect(&mut self, expect: Token) -> Result<()> {
        let token = self.next()?;
        if token != expect {
            return Err(Error::Syntax(format!(
                "[Parser] Expected token {}, got {}",
                expect, token
            )));
        }
        Ok(())
    }

    /// Consumes next token if it satisfies the predicate
    fn next_if<F: Fn(&Token) -> bool>(&mut self, predicate: F) -> Option<Token> {
        self.peek().unwrap_or(None).filter(|t| predicate(t))?;
        self.next().ok()
    }

    /// Consumes next token if it matches the given token
    fn next_if_token(&mut self, token: Token) -> Option<Token> {
        self.next_if(|t| t == &token)
    }
}
