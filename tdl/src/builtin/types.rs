//! Builtins for types
use super::arity;
use crate::{Error, NativeFn, Val};

pub(crate) fn int_fn() -> NativeFn {
    NativeFn {
        name: "int",
        doc: "int(X) - Returns X converted to an integer. Floats are truncated.".to_string(),
        func: |_, args| {
            arity("int", args, 1)?;
            let v = match &args[0] {
                Val::Int(i) => *i,
                Val::Bool(b) => *b as i64,
                Val::Float(x) if x.is_finite() => x.trunc() as i64,
                Val::String(s) => s.trim().parse::<i64>().map_err(|_| {
                    Error::EvaluationFailure(format!("invalid literal for int - '{s}'"))
                })?,
                v => {
                    return Err(Error::EvaluationFailure(format!(
                        "cannot convert {} to int",
                        v.type_name()
                    )))
                }
            };
            Ok(Val::Int(v))
        },
    }
}

pub(crate) fn float_fn() -> NativeFn {
    NativeFn {
        name: "float",
        doc: "float(X) - Returns X converted to a floating point number".to_string(),
        func: |_, args| {
            arity("float", args, 1)?;
            let v = match &args[0] {
                Val::String(s) => s.trim().parse::<f64>().map_err(|_| {
                    Error::EvaluationFailure(format!("invalid literal for float - '{s}'"))
                })?,
                v => v.as_float().map_err(|_| {
                    Error::EvaluationFailure(format!("cannot convert {} to float", v.type_name()))
                })?,
            };
            Ok(Val::Float(v))
        },
    }
}

pub(crate) fn type_fn() -> NativeFn {
    NativeFn {
        name: "type",
        doc: "type(X) - Returns name of type of X".to_string(),
        func: |_, args| {
            arity("type", args, 1)?;
            Ok(Val::string(args[0].type_name()))
        },
    }
}

pub(crate) fn isgroup_fn() -> NativeFn {
    NativeFn {
        name: "isgroup",
        doc: "isgroup(X) - Returns True if X is a group".to_string(),
        func: |_, args| {
            arity("isgroup", args, 1)?;
            Ok(Val::Bool(matches!(args[0], Val::Group(_))))
        },
    }
}

pub(crate) fn callable_fn() -> NativeFn {
    NativeFn {
        name: "callable",
        doc: "callable(X) - Returns True if X is a procedure or builtin".to_string(),
        func: |_, args| {
            arity("callable", args, 1)?;
            Ok(Val::Bool(args[0].is_callable()))
        },
    }
}
