//! Expression engine: turns expression text into an opcode sequence and
//! evaluates it against a [Host].
//!
//! Statements only rely on [compile] producing an inspectable [Expr] (see
//! [Expr::as_name] and friends), on [parse] for shape checks of assignment
//! targets and parameter lists, and on [eval] calling back into the host for
//! every name lookup and procedure call.
mod codegen;
mod lex;
mod machine;
mod parse;

pub use codegen::{Expr, Op};
pub use machine::{eval, Host};
pub use parse::{parse, Arg, BinaryOp, Node, UnaryOp};

pub(crate) use machine::{binary, index_mut, MAX_SEQUENCE_LEN};

use crate::Result;

/// Compile expression text
pub fn compile(text: &str) -> Result<Expr> {
    Expr::from_node(&parse(text)?, text)
}
