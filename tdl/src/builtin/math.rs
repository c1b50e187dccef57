//! Math builtins
use super::arity;
use crate::expr::{binary, BinaryOp};
use crate::{Error, NativeFn, Result, Val};

/// Single numeric argument of builtin `name`
fn number(name: &str, args: &[Val]) -> Result<f64> {
    arity(name, args, 1)?;
    args[0].as_float()
}

/// Native binding for `abs`
pub fn abs_fn() -> NativeFn {
    NativeFn {
        name: "abs",
        doc: "abs(X) - Returns absolute value of number X".to_string(),
        func: |_, args| {
            arity("abs", args, 1)?;
            match &args[0] {
                Val::Int(i) => i
                    .checked_abs()
                    .map(Val::Int)
                    .ok_or(Error::EvaluationFailure("integer overflow".to_string())),
                v => Ok(Val::Float(v.as_float()?.abs())),
            }
        },
    }
}

pub fn sqrt_fn() -> NativeFn {
    NativeFn {
        name: "sqrt",
        doc: "sqrt(X) - Returns square root of X".to_string(),
        func: |_, args| {
            let x = number("sqrt", args)?;
            if x < 0.0 {
                return Err(Error::EvaluationFailure("math domain error".to_string()));
            }
            Ok(Val::Float(x.sqrt()))
        },
    }
}

pub fn exp_fn() -> NativeFn {
    NativeFn {
        name: "exp",
        doc: "exp(X) - Returns e raised to power X".to_string(),
        func: |_, args| Ok(Val::Float(number("exp", args)?.exp())),
    }
}

pub fn log_fn() -> NativeFn {
    NativeFn {
        name: "log",
        doc: "log(X) - Returns natural logarithm of X".to_string(),
        func: |_, args| {
            let x = number("log", args)?;
            if x <= 0.0 {
                return Err(Error::EvaluationFailure("math domain error".to_string()));
            }
            Ok(Val::Float(x.ln()))
        },
    }
}

pub fn log10_fn() -> NativeFn {
    NativeFn {
        name: "log10",
        doc: "log10(X) - Returns base 10 logarithm of X".to_string(),
        func: |_, args| {
            let x = number("log10", args)?;
            if x <= 0.0 {
                return Err(Error::EvaluationFailure("math domain error".to_string()));
            }
            Ok(Val::Float(x.log10()))
        },
    }
}

pub fn sin_fn() -> NativeFn {
    NativeFn {
        name: "sin",
        doc: "sin(X) - Returns sine of X radians".to_string(),
        func: |_, args| Ok(Val::Float(number("sin", args)?.sin())),
    }
}

pub fn cos_fn() -> NativeFn {
    NativeFn {
        name: "cos",
        doc: "cos(X) - Returns cosine of X radians".to_string(),
        func: |_, args| Ok(Val::Float(number("cos", args)?.cos())),
    }
}

pub fn tan_fn() -> NativeFn {
    NativeFn {
        name: "tan",
        doc: "tan(X) - Returns tangent of X radians".to_string(),
        func: |_, args| Ok(Val::Float(number("tan", args)?.tan())),
    }
}

pub fn floor_fn() -> NativeFn {
    NativeFn {
        name: "floor",
        doc: "floor(X) - Returns largest integer not greater than X".to_string(),
        func: |_, args| Ok(Val::Int(number("floor", args)?.floor() as i64)),
    }
}

pub fn ceil_fn() -> NativeFn {
    NativeFn {
        name: "ceil",
        doc: "ceil(X) - Returns smallest integer not less than X".to_string(),
        func: |_, args| Ok(Val::Int(number("ceil", args)?.ceil() as i64)),
    }
}

pub fn pow_fn() -> NativeFn {
    NativeFn {
        name: "pow",
        doc: "pow(X, Y) - Returns X raised to power Y".to_string(),
        func: |_, args| {
            arity("pow", args, 2)?;
            binary(BinaryOp::Pow, &args[0], &args[1])
        },
    }
}
