//! Values manipulated by the interpreter
use crate::eval::Frame;
use crate::expr::Expr;
use crate::{Error, GroupRef, Result, Stmt};
use std::sync::Arc;

/// All values that can be bound to a name
#[derive(Clone)]
pub enum Val {
    /// No value
    Nil,
    /// True or false
    Bool(bool),
    /// Integers
    Int(i64),
    /// Floating point numbers
    Float(f64),
    /// Strings
    String(String),
    /// Ordered sequence of values
    List(Vec<Val>),
    /// Shared handle to a namespace container
    Group(GroupRef),
    /// Procedure defined in script
    Proc(Arc<Procedure>),
    /// Procedure provided by the host
    Native(NativeFn),
    /// Name bound to a live expression, recomputed on every read
    Defined(Arc<DefinedVar>),
}

/// A procedure record created by `def`
#[derive(Debug)]
pub struct Procedure {
    pub name: String,
    /// Positional parameter names
    pub params: Vec<String>,
    /// Keyword parameters with defaults evaluated at definition time
    pub kwargs: Vec<(String, Val)>,
    pub body: Arc<Vec<Stmt>>,
    pub doc: Option<String>,
}

/// A defined variable created by `def name = expr`
#[derive(Debug)]
pub struct DefinedVar {
    pub expr: Expr,
    pub source: String,
}

/// A native function bound to given symbol
#[derive(Clone)]
pub struct NativeFn {
    pub name: &'static str,
    pub doc: String,
    pub func: fn(&mut Frame<'_>, &[Val]) -> Result<Val>,
}

/// Sink receiving `print` output and diagnostics
pub type Writer = Arc<dyn Fn(&str) + Send + Sync>;

/// Writer that forwards to stdout
pub fn stdout_writer() -> Writer {
    Arc::new(|s: &str| print!("{s}"))
}

impl Val {
    /// Shorhand for constructing [Val::String]
    pub fn string(s: &str) -> Self {
        Self::String(String::from(s))
    }

    /// Whether or not val is a callable procedure
    pub fn is_callable(&self) -> bool {
        matches!(self, Val::Proc(_) | Val::Native(_))
    }

    pub fn as_group(&self) -> Option<&GroupRef> {
        match self {
            Val::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Val::String(s) => Ok(s),
            v => Err(Error::UnexpectedArguments(format!(
                "expected string - got {}",
                v.type_name()
            ))),
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Val::Int(i) => Ok(*i),
            Val::Bool(b) => Ok(*b as i64),
            Val::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
            v => Err(Error::UnexpectedArguments(format!(
                "expected integer - got {}",
                v.type_name()
            ))),
        }
    }

    pub fn as_float(&self) -> Result<f64> {
        match self {
            Val::Int(i) => Ok(*i as f64),
            Val::Float(f) => Ok(*f),
            Val::Bool(b) => Ok(*b as i64 as f64),
            v => Err(Error::UnexpectedArguments(format!(
                "expected number - got {}",
                v.type_name()
            ))),
        }
    }

    /// Defines true values
    pub fn is_true(&self) -> bool {
        match self {
            Val::Nil => false,
            Val::Bool(b) => *b,
            Val::Int(i) => *i != 0,
            Val::Float(f) => *f != 0.0,
            Val::String(s) => !s.is_empty(),
            Val::List(l) => !l.is_empty(),
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Nil => "None",
            Val::Bool(_) => "bool",
            Val::Int(_) => "int",
            Val::Float(_) => "float",
            Val::String(_) => "string",
            Val::List(_) => "list",
            Val::Group(_) => "group",
            Val::Proc(_) => "procedure",
            Val::Native(_) => "builtin",
            Val::Defined(_) => "defvar",
        }
    }

    /// Representation used inside sequences, where strings are quoted
    pub fn repr(&self) -> String {
        match self {
            Val::String(s) => {
                let escaped = s
                    .replace('\\', "\\\\")
                    .replace('\'', "\\'")
                    .replace('\n', "\\n");
                format!("'{escaped}'")
            }
            v => v.to_string(),
        }
    }
}

impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Val::Nil, Val::Nil) => true,
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Int(a), Val::Int(b)) => a == b,
            (Val::Float(a), Val::Float(b)) => a == b,
            (Val::String(a), Val::String(b)) => a == b,
            (Val::List(a), Val::List(b)) => a == b,
            (Val::Group(a), Val::Group(b)) => a.ptr_eq(b),
            (Val::Proc(a), Val::Proc(b)) => Arc::ptr_eq(a, b),
            (Val::Native(a), Val::Native(b)) => a.name == b.name,
            (Val::Defined(a), Val::Defined(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Display for Val {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Val::Nil => write!(f, "None"),
            Val::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Val::Int(i) => write!(f, "{}", i),
            Val::Float(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 => {
                write!(f, "{:.1}", x)
            }
            Val::Float(x) => write!(f, "{}", x),
            Val::String(s) => write!(f, "{}", s),
            Val::List(l) => write!(
                f,
                "[{}]",
                l.iter().map(Val::repr).collect::<Vec<_>>().join(", ")
            ),
            Val::Group(g) => write!(f, "{g}"),
            Val::Proc(p) => write!(f, "<procedure {}({})>", p.name, p.params.join(", ")),
            Val::Native(n) => write!(f, "<builtin {}>", n.name),
            Val::Defined(d) => write!(f, "<defvar {}>", d.source),
        }
    }
}

impl std::fmt::Debug for Val {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Val::Nil => write!(f, "Nil"),
            Val::Bool(b) => write!(f, "Bool({b})"),
            Val::Int(i) => write!(f, "Int({i})"),
            Val::Float(x) => write!(f, "Float({x})"),
            Val::String(s) => write!(f, "String({s:?})"),
            Val::List(l) => f.debug_tuple("List").field(l).finish(),
            // don't walk groups, they may reference themselves
            v => write!(f, "{v}"),
        }
    }
}

impl std::fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeFn({})", self.name)
    }
}

impl From<bool> for Val {
    fn from(value: bool) -> Self {
        Val::Bool(value)
    }
}

impl From<i64> for Val {
    fn from(value: i64) -> Self {
        Val::Int(value)
    }
}

impl From<f64> for Val {
    fn from(value: f64) -> Self {
        Val::Float(value)
    }
}

impl From<&str> for Val {
    fn from(value: &str) -> Self {
        Val::string(value)
    }
}

impl From<String> for Val {
    fn from(value: String) -> Self {
        Val::String(value)
    }
}

impl From<Vec<Val>> for Val {
    fn from(value: Vec<Val>) -> Self {
        Val::List(value)
    }
}

impl From<GroupRef> for Val {
    fn from(value: GroupRef) -> Self {
        Val::Group(value)
    }
}
