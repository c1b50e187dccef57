//! Compiler from expression tree to opcode sequence
use super::parse::{Arg, BinaryOp, Node, UnaryOp};
use crate::{Error, Result, Val};

/// Opcodes of the expression stack machine
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Push constant value onto stack
    Push(Val),
    /// Push value bound to given name onto stack
    Load(String),
    /// Pop N values and push them as a list
    MakeList(usize),
    /// Pop N indices and the indexed value, push the element
    Index(usize),
    /// Call function with N positional arguments followed by named keyword arguments
    Call(usize, Vec<String>),
    Unary(UnaryOp),
    Binary(BinaryOp),
    /// Jump forward N ops if TOS is false, otherwise pop TOS
    JumpIfFalseOrPop(usize),
    /// Jump forward N ops if TOS is true, otherwise pop TOS
    JumpIfTrueOrPop(usize),
}

/// A compiled expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    ops: Vec<Op>,
    source: String,
}

impl Expr {
    /// Compile an expression tree
    pub fn from_node(node: &Node, source: &str) -> Result<Self> {
        Ok(Self {
            ops: compile(node)?,
            source: source.trim().to_string(),
        })
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Source text expression was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Outermost op, i.e. the last one executed
    pub fn last(&self) -> Option<&Op> {
        self.ops.last()
    }

    /// Name if expression is a single variable reference
    pub fn as_name(&self) -> Option<&str> {
        match &self.ops[..] {
            [Op::Load(name)] => Some(name),
            _ => None,
        }
    }

    /// String if expression is a single string literal
    pub fn as_str_literal(&self) -> Option<&str> {
        match &self.ops[..] {
            [Op::Push(Val::String(s))] => Some(s),
            _ => None,
        }
    }
}

/// Compile expression tree to ops
fn compile(node: &Node) -> Result<Vec<Op>> {
    let ops = match node {
        Node::Const(v) => vec![Op::Push(v.clone())],
        Node::Name(name) => vec![Op::Load(name.clone())],
        Node::List(items) => {
            let mut ops = compile_all(items)?;
            ops.push(Op::MakeList(items.len()));
            ops
        }
        Node::Index(target, indices) => {
            let mut ops = compile(target)?;
            ops.extend(compile_all(indices)?);
            ops.push(Op::Index(indices.len()));
            ops
        }
        Node::Call(func, args) => compile_call(func, args)?,
        Node::Unary(op, operand) => {
            let mut ops = compile(operand)?;
            ops.push(Op::Unary(*op));
            ops
        }
        Node::Binary(op, lhs, rhs) => {
            let mut ops = compile(lhs)?;
            ops.extend(compile(rhs)?);
            ops.push(Op::Binary(*op));
            ops
        }
        Node::And(lhs, rhs) => {
            let rhs = compile(rhs)?;
            let mut ops = compile(lhs)?;
            ops.push(Op::JumpIfFalseOrPop(rhs.len()));
            ops.extend(rhs);
            ops
        }
        Node::Or(lhs, rhs) => {
            let rhs = compile(rhs)?;
            let mut ops = compile(lhs)?;
            ops.push(Op::JumpIfTrueOrPop(rhs.len()));
            ops.extend(rhs);
            ops
        }
    };
    Ok(ops)
}

fn compile_all(nodes: &[Node]) -> Result<Vec<Op>> {
    Ok(nodes
        .iter()
        .map(compile)
        .collect::<Result<Vec<_>>>()?
        .concat())
}

/// Compile function calls
fn compile_call(func: &Node, args: &[Arg]) -> Result<Vec<Op>> {
    let mut ops = compile(func)?;
    let mut nargs = 0;
    let mut kwnames: Vec<String> = vec![];

    for arg in args {
        match arg {
            Arg::Pos(node) => {
                if !kwnames.is_empty() {
                    return Err(Error::InvalidExpression(
                        "positional argument follows keyword argument".to_string(),
                    ));
                }
                nargs += 1;
                ops.extend(compile(node)?);
            }
            Arg::Kw(name, node) => {
                if kwnames.contains(name) {
                    return Err(Error::InvalidExpression(format!(
                        "keyword argument repeated - {name}"
                    )));
                }
                kwnames.push(name.clone());
                ops.extend(compile(node)?);
            }
        }
    }

    ops.push(Op::Call(nargs, kwnames));
    Ok(ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse;

    fn ops(text: &str) -> Vec<Op> {
        Expr::from_node(&parse(text).unwrap(), text).unwrap().ops
    }

    #[test]
    fn compile_const() {
        assert_eq!(ops("5"), vec![Op::Push(Val::Int(5))]);
    }

    #[test]
    fn compile_binary() {
        assert_eq!(
            ops("x + 1"),
            vec![
                Op::Load("x".to_string()),
                Op::Push(Val::Int(1)),
                Op::Binary(BinaryOp::Add)
            ]
        );
    }

    #[test]
    fn compile_call_kwargs() {
        assert_eq!(
            ops("f(1, y=2)"),
            vec![
                Op::Load("f".to_string()),
                Op::Push(Val::Int(1)),
                Op::Push(Val::Int(2)),
                Op::Call(1, vec!["y".to_string()]),
            ]
        );
    }

    #[test]
    fn compile_short_circuit() {
        assert_eq!(
            ops("a and b"),
            vec![
                Op::Load("a".to_string()),
                Op::JumpIfFalseOrPop(1),
                Op::Load("b".to_string()),
            ]
        );
    }

    #[test]
    fn inspect_shape() {
        let e = Expr::from_node(&parse("x").unwrap(), "x").unwrap();
        assert_eq!(e.as_name(), Some("x"));
        let e = Expr::from_node(&parse("'doc'").unwrap(), "'doc'").unwrap();
        assert_eq!(e.as_str_literal(), Some("doc"));
        assert_eq!(e.as_name(), None);
        let e = Expr::from_node(&parse("x[0]").unwrap(), "x[0]").unwrap();
        assert_eq!(e.last(), Some(&Op::Index(1)));
    }
}
