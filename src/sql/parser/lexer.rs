//! SQL Lexer - Tokenizes SQL input text into a stream of tokens

use std::{fmt::Display, iter::Peekable, str::Chars};

use crate::error::{Error, Result};

/// Represents a single lexical token in the SQL input
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// SQL reserved keyword
    Keyword(Keyword),
    /// Identifier such as table name or field name
    Ident(String),
    /// Backtick-quoted identifier or path, e.g. `my-project.dataset.table`
    QuotedIdent(String),
    /// String literal
    String(String),
    /// Numeric literal (integer or floating-point)
    Number(String),
    /// Operators and punctuation
    OpenParen,
    CloseParen,
    Comma,
    Semicolon,
    Period,
    Colon,
    Asterisk,
    Plus,
    Minus,
    Slash,
    Percent,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Token::Keyword(keyword) => keyword.to_str(),
            Token::Ident(ident) => ident,
            Token::QuotedIdent(ident) => ident,
            Token::String(v) => v,
            Token::Number(n) => n,
            Token::OpenParen => "(",
            Token::CloseParen => ")",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::Period => ".",
            Token::Colon => ":",
            Token::Asterisk => "*",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Equal => "=",
            Token::NotEqual => "!=",
            Token::LessThan => "<",
            Token::LessThanOrEqual => "<=",
            Token::GreaterThan => ">",
            Token::GreaterThanOrEqual => ">=",
        })
    }
}

/// SQL reserved keywords
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Keyword {
    Select,
    From,
    Where,
    Limit,
    As,
    And,
    Or,
    Not,
    Is,
    Null,
    True,
    False,
}

impl Keyword {
    /// Converts a string to a keyword (case-insensitive)
    pub fn from_str(ident: &str) -> Option<Self> {
        Some(match ident.to_uppercase().as_ref() {
            "SELECT" => Keyword::Select,
            "FROM" => Keyword::From,
            "WHERE" => Keyword::Where,
            "LIMIT" => Keyword::Limit,
            "AS" => Keyword::As,
            "AND" => Keyword::And,
            "OR" => Keyword::Or,
            "NOT" => Keyword::Not,
            "IS" => Keyword::Is,
            "NULL" => Keyword::Null,
            "TRUE" => Keyword::True,
            "FALSE" => Keyword::False,
            _ => return None,
        })
    }

    /// Returns the uppercase string representation of the keyword
    pub fn to_str(&self) -> &str {
        match self {
            Keyword::Select => "SELECT",
            Keyword::From => "FROM",
            Keyword::Where => "WHERE",
            Keyword::Limit => "LIMIT",
            Keyword::As => "AS",
            Keyword::And => "AND",
            Keyword::Or => "OR",
            Keyword::Not => "NOT",
            Keyword::Is => "IS",
            Keyword::Null => "NULL",
            Keyword::True => "TRUE",
            Keyword::False => "FALSE",
        }
    }
}

impl Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_str())
    }
}

/// SQL lexical analyzer (lexer/tokenizer)
pub struct Lexer<'a> {
    iter: Peekable<Chars<'a>>,
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.scan() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => self
                .iter
                .peek()
                .map(|c| Err(Error::Syntax(format!("[Lexer] Unexpected character {}", c)))),
            Err(err) => Some(Err(err)),
        }
    }
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given SQL text
    pub fn new(sql_text: &'a str) -> Self {
        Self {
            iter: sql_text.chars().peekable(),
        }
    }

    /// Consumes the next character if it satisfies the predicate
    fn next_if<F: Fn(char) -> bool>(&mut self, predicate: F) -> Option<char> {
        self.iter.peek().filter(|&c| predicate(*c))?;
        self.iter.next()
    }

    /// Consumes consecutive characters while they satisfy the predicate
    fn next_while<F: Fn(char) -> bool>(&mut self, predicate: F) -> Option<String> {
        let mut value = String::new();
        while let Some(c) = self.next_if(&predicate) {
            value.push(c);
        }
        Some(value).filter(|v| !v.is_empty())
    }

    /// Removes whitespace from the input stream
    fn erase_whitespace(&mut self) {
        self.next_while(|c| c.is_whitespace());
    }

    /// Scans and returns the next token
    fn scan(&mut self) -> Result<Option<Token>> {
        self.erase_whitespace();
        match self.iter.peek() {
            Some('\'') | Some('"') => self.scan_string(),
            Some('`') => self.scan_quoted_ident(),
            Some('!') => {
                self.iter.next();
                match self.next_if(|c| c == '=') {
                    Some(_) => Ok(Some(Token::NotEqual)),
                    None => Err(Error::Syntax("[Lexer] Unexpected character !".into())),
                }
            }
            Some(c) if c.is_ascii_digit() => self.scan_number(),
            Some(c) if c.is_alphabetic() || *c == '_' => Ok(self.scan_ident()),
            Some(_) => Ok(self.scan_symbol()),
            None => Ok(None),
        }
    }

    /// Scans a string literal enclosed in single or double quotes.
    /// A backslash escapes the next character.
    fn scan_string(&mut self) -> Result<Option<Token>> {
        let Some(quote) = self.iter.next() else {
            return Ok(None);
        };
        let mut val = String::new();
        loop {
            match self.iter.next() {
                Some(c) if c == quote => break,
                Some('\\') => match self.iter.next() {
                    Some('n') => val.push('\n'),
                    Some('t') => val.push('\t'),
                    Some(c) => val.push(c),
                    None => return Err(Error::Syntax("[Lexer] Unexpected end of string".into())),
                },
                Some(c) => val.push(c),
                None => return Err(Error::Syntax("[Lexer] Unexpected end of string".into())),
            }
        }
        Ok(Some(Token::String(val)))
    }

    fn scan_quoted_ident(&mut self) -> Result<Option<Token>> {
        self.iter.next();
        let mut val = String::new();
        loop {
            match self.iter.next() {
                Some('`') => break,
                Some(c) => val.push(c),
                None => {
                    return Err(Error::Syntax(
                        "[Lexer] Unexpected end of quoted identifier".into(),
                    ));
                }
            }
        }
        if val.is_empty() {
            return Err(Error::Syntax("[Lexer] Empty quoted identifier".into()));
        }
        Ok(Some(Token::QuotedIdent(val)))
    }

    /// Scans a numeric literal: digits, an optional fraction and exponent
    fn scan_number(&mut self) -> Result<Option<Token>> {
        let Some(mut val) = self.next_while(|c| c.is_ascii_digit()) else {
            return Ok(None);
        };
        if let Some(sep) = self.next_if(|c| c == '.') {
            val.push(sep);
            while let Some(c) = self.next_if(|c| c.is_ascii_digit()) {
                val.push(c);
            }
        }
        if let Some(e) = self.next_if(|c| c == 'e' || c == 'E') {
            val.push(e);
            if let Some(sign) = self.next_if(|c| c == '+' || c == '-') {
                val.push(sign);
            }
            match self.next_while(|c| c.is_ascii_digit()) {
                Some(digits) => val.push_str(&digits),
                None => return Err(Error::Syntax(format!("[Lexer] Malformed number {}", val))),
            }
        }
        if let Some(c) = self.next_if(|c| c.is_alphanumeric() || c == '_') {
            val.push(c);
            return Err(Error::Syntax(format!("[Lexer] Malformed number {}", val)));
        }
        Ok(Some(Token::Number(val)))
    }

    /// Scans an identifier or keyword
    fn scan_ident(&mut self) -> Option<Token> {
        let mut val = self.next_if(|c| c.is_alphabetic() || c == '_')?.to_string();
        while let Some(c) = self.next_if(|c| c.is_alphanumeric() || c == '_') {
            val.push(c);
        }
        // Keywords are case-insensitive, identifiers keep their case
        Some(Keyword::from_str(&val).map_or(Token::Ident(val), Token::Keyword))
    }

    /// Scans a one- or two-character symbol token
    fn scan_symbol(&mut self) -> Option<Token> {
        let token = match self.iter.peek()? {
            '*' => Token::Asterisk,
            '(' => Token::OpenParen,
            ')' => Token::CloseParen,
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            '.' => Token::Period,
            ':' => Token::Colon,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '=' => Token::Equal,
            '<' => {
                self.iter.next();
                return Some(match self.next_if(|c| c == '=' || c == '>') {
                    Some('=') => Token::LessThanOrEqual,
                    Some(_) => Token::NotEqual,
                    None => Token::LessThan,
                });
            }
            '>' => {
                self.iter.next();
                return Some(match self.next_if(|c| c == '=') {
                    Some(_) => Token::GreaterThanOrEqual,
                    None => Token::GreaterThan,
                });
            }
            _ => return None,
        };
        self.iter.next();
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::Lexer;
    use crate::{
        error::Result,
        sql::parser::lexer::{Keyword, Token},
    };

    #[test]
    fn test_lexer_select_literal() -> Result<()> {
        let tokens = Lexer::new("SELECT 7 as foo")
            .peekable()
            .collect::<Result<Vec<_>>>()?;

        assert_eq!(
            tokens,
            vec![
                Token::Keyword(Keyword::Select),
                Token::Number("7".to_string()),
                Token::Keyword(Keyword::As),
                Token::Ident("foo".to_string()),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_lexer_select_from() -> Result<()> {
        let tokens = Lexer::new("select Foo, bar >= 2.5e3 from test_dataset.table2;")
            .collect::<Result<Vec<_>>>()?;

        assert_eq!(
            tokens,
            vec![
                Token::Keyword(Keyword::Select),
                Token::Ident("Foo".to_string()),
                Token::Comma,
                Token::Ident("bar".to_string()),
                Token::GreaterThanOrEqual,
                Token::Number("2.5e3".to_string()),
                Token::Keyword(Keyword::From),
                Token::Ident("test_dataset".to_string()),
                Token::Period,
                Token::Ident("table2".to_string()),
                Token::Semicolon,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_lexer_operators_and_strings() -> Result<()> {
        let tokens = Lexer::new("a <> 'it\\'s' != \"x\" <= % `my-project.ds.t`")
            .collect::<Result<Vec<_>>>()?;

        assert_eq!(
            tokens,
            vec![
                Token::Ident("a".to_string()),
                Token::NotEqual,
                Token::String("it's".to_string()),
                Token::NotEqual,
                Token::String("x".to_string()),
                Token::LessThanOrEqual,
                Token::Percent,
                Token::QuotedIdent("my-project.ds.t".to_string()),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_lexer_errors() {
        assert!(Lexer::new("'abc").collect::<Result<Vec<_>>>().is_err());
        assert!(Lexer::new("1e").collect::<Result<Vec<_>>>().is_err());
        assert!(Lexer::new("1abc").collect::<Result<Vec<_>>>().is_err());
        assert!(Lexer::new("2.5e3x").collect::<Result<Vec<_>>>().is_err());
        assert!(Lexer::new("a ! b").collect::<Result<Vec<_>>>().is_err());
        assert!(Lexer::new("a !").collect::<Result<Vec<_>>>().is_err());
        assert!(Lexer::new("a # b").collect::<Result<Vec<_>>>().is_err());
    }
}
