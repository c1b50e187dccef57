//! Parser from tokens to expression tree
use super::lex::{lex, Token};
use crate::{Error, Result, Val};

/// Parsed expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Const(Val),
    /// Possibly dotted name, e.g. `scan.data`
    Name(String),
    List(Vec<Node>),
    Index(Box<Node>, Vec<Node>),
    Call(Box<Node>, Vec<Arg>),
    Unary(UnaryOp, Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
}

/// Argument in a call expression
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Pos(Node),
    Kw(String, Node),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

/// Parse expression text into a [Node]
pub fn parse(text: &str) -> Result<Node> {
    let tokens = lex(text)?;
    if tokens.is_empty() {
        return Err(Error::InvalidExpression("empty expression".to_string()));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let node = parser.expr()?;
    match parser.peek() {
        None => Ok(node),
        Some(t) => Err(Error::InvalidExpression(format!(
            "unexpected token '{t}' in '{text}'"
        ))),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.next() {
            Some(t) if &t == expected => Ok(()),
            Some(t) => Err(Error::InvalidExpression(format!(
                "expected '{expected}' - found '{t}'"
            ))),
            None => Err(Error::InvalidExpression(format!(
                "expected '{expected}' - found end of expression"
            ))),
        }
    }

    fn expr(&mut self) -> Result<Node> {
        self.or()
    }

    fn or(&mut self) -> Result<Node> {
        let mut lhs = self.and()?;
        while self.eat(&Token::Or) {
            let rhs = self.and()?;
            lhs = Node::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Node> {
        let mut lhs = self.not()?;
        while self.eat(&Token::And) {
            let rhs = self.not()?;
            lhs = Node::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Node> {
        if self.eat(&Token::Not) {
            let operand = self.not()?;
            return Ok(Node::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Node> {
        let mut lhs = self.arith()?;
        loop {
            let op = match (self.peek(), self.peek_nth(1)) {
                (Some(Token::EqEq), _) => BinaryOp::Eq,
                (Some(Token::NotEq), _) => BinaryOp::Ne,
                (Some(Token::Lt), _) => BinaryOp::Lt,
                (Some(Token::Le), _) => BinaryOp::Le,
                (Some(Token::Gt), _) => BinaryOp::Gt,
                (Some(Token::Ge), _) => BinaryOp::Ge,
                (Some(Token::In), _) => BinaryOp::In,
                (Some(Token::Not), Some(Token::In)) => {
                    self.pos += 1;
                    BinaryOp::NotIn
                }
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.arith()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn arith(&mut self) -> Result<Node> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<Node> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::SlashSlash) => BinaryOp::FloorDiv,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Node> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Pos,
            _ => return self.power(),
        };
        self.pos += 1;
        let operand = self.unary()?;
        Ok(Node::Unary(op, Box::new(operand)))
    }

    fn power(&mut self) -> Result<Node> {
        let base = self.postfix()?;
        if self.eat(&Token::StarStar) {
            let exp = self.unary()?;
            return Ok(Node::Binary(BinaryOp::Pow, Box::new(base), Box::new(exp)));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Node> {
        let mut node = self.primary()?;
        loop {
            if self.eat(&Token::ParenLeft) {
                let args = self.args()?;
                node = Node::Call(Box::new(node), args);
            } else if self.eat(&Token::BracketLeft) {
                let indices = self.items(&Token::BracketRight)?;
                if indices.is_empty() {
                    return Err(Error::InvalidExpression("empty index".to_string()));
                }
                node = Node::Index(Box::new(node), indices);
            } else {
                return Ok(node);
            }
        }
    }

    fn primary(&mut self) -> Result<Node> {
        let token = self.next().ok_or(Error::InvalidExpression(
            "unexpected end of expression".to_string(),
        ))?;
        let node = match token {
            Token::Nil => Node::Const(Val::Nil),
            Token::Bool(b) => Node::Const(Val::Bool(b)),
            Token::Int(i) => Node::Const(Val::Int(i)),
            Token::Float(x) => Node::Const(Val::Float(x)),
            Token::String(s) => Node::Const(Val::String(s)),
            Token::Name(name) => {
                let mut name = name;
                while self.peek() == Some(&Token::Dot) {
                    self.pos += 1;
                    match self.next() {
                        Some(Token::Name(member)) => {
                            name.push('.');
                            name.push_str(&member);
                        }
                        _ => {
                            return Err(Error::InvalidExpression(format!(
                                "expected member name after '{name}.'"
                            )))
                        }
                    }
                }
                Node::Name(name)
            }
            Token::BracketLeft => Node::List(self.items(&Token::BracketRight)?),
            Token::ParenLeft => {
                if self.eat(&Token::ParenRight) {
                    return Ok(Node::List(vec![]));
                }
                let first = self.expr()?;
                if self.eat(&Token::ParenRight) {
                    return Ok(first);
                }
                self.expect(&Token::Comma)?;
                let mut items = vec![first];
                items.extend(self.items(&Token::ParenRight)?);
                Node::List(items)
            }
            t => {
                return Err(Error::InvalidExpression(format!("unexpected token '{t}'")));
            }
        };
        Ok(node)
    }

    /// Comma separated expressions up to closing token, allowing a trailing comma
    fn items(&mut self, close: &Token) -> Result<Vec<Node>> {
        let mut items = vec![];
        loop {
            if self.eat(close) {
                return Ok(items);
            }
            items.push(self.expr()?);
            if !self.eat(&Token::Comma) {
                self.expect(close)?;
                return Ok(items);
            }
        }
    }

    fn args(&mut self) -> Result<Vec<Arg>> {
        let mut args = vec![];
        loop {
            if self.eat(&Token::ParenRight) {
                return Ok(args);
            }
            let arg = match (self.peek(), self.peek_nth(1)) {
                (Some(Token::Name(name)), Some(Token::Assign)) => {
                    let name = name.clone();
                    self.pos += 2;
                    Arg::Kw(name, self.expr()?)
                }
                _ => {
                    if matches!(args.last(), Some(Arg::Kw(..))) {
                        return Err(Error::InvalidExpression(
                            "positional argument follows keyword argument".to_string(),
                        ));
                    }
                    Arg::Pos(self.expr()?)
                }
            };
            args.push(arg);
            if !self.eat(&Token::Comma) {
                self.expect(&Token::ParenRight)?;
                return Ok(args);
            }
        }
    }
}
