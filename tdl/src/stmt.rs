//! Compiled statement tree
use crate::expr::Expr;
use std::sync::Arc;

/// A compiled statement
#[derive(Debug, Clone)]
pub enum Stmt {
    /// Expression evaluated for its value. Command-style calls have their
    /// value suppressed at top level.
    Eval { expr: Expr, command: bool },
    Assign { target: Target, value: Expr },
    /// `def name = expr`
    DefVar { name: String, expr: Expr },
    /// `def name(params): ...`
    Def(Arc<ProcDef>),
    /// Ordered (condition, body) branches. `else` has an always-true condition
    If(Vec<(Expr, Vec<Stmt>)>),
    While { cond: Expr, body: Vec<Stmt> },
    For { var: String, iter: Expr, body: Vec<Stmt> },
    Try { body: Vec<Stmt>, except: Vec<Stmt> },
    Del(Vec<String>),
    /// Optional expression producing list of items to print
    Print(Option<Expr>),
    /// Optional expression producing list of values to return
    Return(Option<Expr>),
    Break,
    Continue,
    Import(Vec<Import>),
    /// End of input
    Eof,
}

/// Left hand side of an assignment
#[derive(Debug, Clone)]
pub struct Target {
    /// Possibly dotted name
    pub name: String,
    /// Index groups applied in order, e.g. `m[0][1, 2]` is `[[0], [1, 2]]`
    pub path: Vec<Vec<Expr>>,
}

/// Procedure definition as compiled. Defaults are evaluated when the `def`
/// statement executes.
#[derive(Debug)]
pub struct ProcDef {
    pub name: String,
    pub params: Vec<String>,
    pub kwargs: Vec<(String, Expr)>,
    pub body: Arc<Vec<Stmt>>,
    pub doc: Option<String>,
}

/// A single module import
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub module: String,
    /// Name to bind module to. Defaults to module name
    pub alias: Option<String>,
    /// Members copied into importing scope instead of binding the module
    pub names: Option<Vec<String>>,
}
