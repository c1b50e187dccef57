//! Lexer for expressions
use std::iter::Peekable;

use crate::{Error, Result};

/// Parsed Tokens from String
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Name(String),
    ParenLeft,
    ParenRight,
    BracketLeft,
    BracketRight,
    Comma,
    Dot,
    Assign,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    In,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Nil => write!(f, "None"),
            Token::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Token::Int(i) => write!(f, "{}", i),
            Token::Float(x) => write!(f, "{}", x),
            Token::String(s) => write!(f, "{:?}", s),
            Token::Name(s) => write!(f, "{}", s),
            Token::ParenLeft => write!(f, "("),
            Token::ParenRight => write!(f, ")"),
            Token::BracketLeft => write!(f, "["),
            Token::BracketRight => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Assign => write!(f, "="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::StarStar => write!(f, "**"),
            Token::Slash => write!(f, "/"),
            Token::SlashSlash => write!(f, "//"),
            Token::Percent => write!(f, "%"),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::In => write!(f, "in"),
        }
    }
}

/// Tokenize entire expression as vector
pub(crate) fn lex(expr: &str) -> Result<Vec<Token>> {
    Tokens::new(expr).collect()
}

/// An iterator over Tokens
struct Tokens<'a> {
    inner: Peekable<std::str::Chars<'a>>,
}

impl Tokens<'_> {
    /// Create Tokens iterator from &str
    fn new(expr: &str) -> Tokens<'_> {
        Tokens {
            inner: expr.chars().peekable(),
        }
    }

    /// Parse next name or word operator
    fn next_name(&mut self) -> Result<Token> {
        let word: String =
            std::iter::from_fn(|| self.inner.next_if(|ch| is_name_char(*ch))).collect();
        let token = match word.as_str() {
            "True" => Token::Bool(true),
            "False" => Token::Bool(false),
            "None" => Token::Nil,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "in" => Token::In,
            _ => Token::Name(word),
        };
        Ok(token)
    }

    /// Parse the next int or float
    fn next_number(&mut self) -> Result<Token> {
        let mut expr: String =
            std::iter::from_fn(|| self.inner.next_if(|ch| ch.is_ascii_digit())).collect();
        let mut is_float = false;

        if self.inner.next_if_eq(&'.').is_some() {
            is_float = true;
            expr.push('.');
            expr.extend(std::iter::from_fn(|| {
                self.inner.next_if(|ch| ch.is_ascii_digit())
            }));
        }

        if let Some(e) = self.inner.next_if(|ch| *ch == 'e' || *ch == 'E') {
            is_float = true;
            expr.push(e);
            if let Some(sign) = self.inner.next_if(|ch| *ch == '+' || *ch == '-') {
                expr.push(sign);
            }
            expr.extend(std::iter::from_fn(|| {
                self.inner.next_if(|ch| ch.is_ascii_digit())
            }));
        }

        if is_float {
            let num = expr
                .parse::<f64>()
                .map_err(|_| Error::InvalidExpression(format!("Unable to parse float - {expr}")))?;
            Ok(Token::Float(num))
        } else {
            let num = expr.parse::<i64>().map_err(|_| {
                Error::InvalidExpression(format!("Unable to parse integer - {expr}"))
            })?;
            Ok(Token::Int(num))
        }
    }

    /// Parse next string, single or triple quoted
    fn next_string(&mut self) -> Result<Token> {
        let quote = self.inner.next().ok_or(Error::InvalidExpression(
            "Expected opening string quotation".to_string(),
        ))?;

        let mut ahead = self.inner.clone();
        let triple = ahead.next() == Some(quote) && ahead.next() == Some(quote);
        if triple {
            self.inner.next();
            self.inner.next();
        }

        let mut result = String::new();
        loop {
            let ch = self.inner.next().ok_or_else(|| {
                Error::InvalidExpression("Expected closing string quotation".to_string())
            })?;
            match ch {
                '\\' => {
                    let escaped = self.inner.next().ok_or_else(|| {
                        Error::InvalidExpression("Unterminated escape sequence".to_string())
                    })?;
                    result.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                }
                c if c == quote && !triple => break,
                c if c == quote => {
                    let mut ahead = self.inner.clone();
                    if ahead.next() == Some(quote) && ahead.next() == Some(quote) {
                        self.inner.next();
                        self.inner.next();
                        break;
                    }
                    result.push(c);
                }
                c => result.push(c),
            }
        }
        Ok(Token::String(result))
    }

    /// Parse next punctuation or operator
    fn next_punct(&mut self) -> Result<Token> {
        let ch = self.inner.next().ok_or(Error::InvalidExpression(
            "Expected punctuation".to_string(),
        ))?;
        let token = match ch {
            '(' => Token::ParenLeft,
            ')' => Token::ParenRight,
            '[' => Token::BracketLeft,
            ']' => Token::BracketRight,
            ',' => Token::Comma,
            '.' => Token::Dot,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '%' => Token::Percent,
            '*' if self.inner.next_if_eq(&'*').is_some() => Token::StarStar,
            '*' => Token::Star,
            '/' if self.inner.next_if_eq(&'/').is_some() => Token::SlashSlash,
            '/' => Token::Slash,
            '=' if self.inner.next_if_eq(&'=').is_some() => Token::EqEq,
            '=' => Token::Assign,
            '!' if self.inner.next_if_eq(&'=').is_some() => Token::NotEq,
            '<' if self.inner.next_if_eq(&'=').is_some() => Token::Le,
            '<' => Token::Lt,
            '>' if self.inner.next_if_eq(&'=').is_some() => Token::Ge,
            '>' => Token::Gt,
            _ => {
                return Err(Error::InvalidExpression(format!(
                    "Unexpected character - {ch}"
                )))
            }
        };
        Ok(token)
    }
}

impl Iterator for Tokens<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(ch) = self.inner.peek() {
            if ch.is_whitespace() {
                let _ = self.inner.next();
                continue;
            }
            let token = match ch {
                '\'' | '"' => self.next_string(),
                _ if ch.is_ascii_digit() => self.next_number(),
                _ if is_name_char(*ch) => self.next_name(),
                _ => self.next_punct(),
            };
            return Some(token);
        }
        None
    }
}

/// Return whether or not a given character can be part of a name
fn is_name_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}
