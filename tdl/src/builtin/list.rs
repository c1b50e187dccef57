//! List builtins
use super::arity;
use crate::expr::{binary, BinaryOp, MAX_SEQUENCE_LEN};
use crate::{Error, NativeFn, Result, Val};

/// Language binding for `len`
pub fn len_fn() -> NativeFn {
    NativeFn {
        name: "len",
        doc: "len(X) - Returns number of items in list, characters in string, or members of group X"
            .to_string(),
        func: |_, args| {
            arity("len", args, 1)?;
            let len = match &args[0] {
                Val::List(l) => l.len(),
                Val::String(s) => s.chars().count(),
                Val::Group(g) => g.len(),
                v => {
                    return Err(Error::UnexpectedArguments(format!(
                        "len expects list, string, or group - got {}",
                        v.type_name()
                    )))
                }
            };
            Ok(Val::Int(len as i64))
        },
    }
}

/// Language binding for `range`
pub fn range_fn() -> NativeFn {
    NativeFn {
        name: "range",
        doc: "range(STOP), range(START, STOP), range(START, STOP, STEP) - Returns list of integers from START up to but excluding STOP"
            .to_string(),
        func: |_, args| {
            let (start, stop, step) = match args {
                [stop] => (0, stop.as_int()?, 1),
                [start, stop] => (start.as_int()?, stop.as_int()?, 1),
                [start, stop, step] => (start.as_int()?, stop.as_int()?, step.as_int()?),
                _ => {
                    return Err(Error::UnexpectedArguments(
                        "range expects 1 to 3 integer arguments".to_string(),
                    ))
                }
            };
            if step == 0 {
                return Err(Error::UnexpectedArguments(
                    "range step must not be zero".to_string(),
                ));
            }
            let span = (stop as i128 - start as i128 + step as i128 - step.signum() as i128)
                / step as i128;
            let count = usize::try_from(span.max(0)).unwrap_or(usize::MAX);
            if count > MAX_SEQUENCE_LEN {
                return Err(Error::EvaluationFailure(format!(
                    "range of {span} items is too long"
                )));
            }
            let mut items = Vec::with_capacity(count);
            let mut i = Some(start);
            while let Some(n) = i.filter(|n| (step > 0 && *n < stop) || (step < 0 && *n > stop)) {
                items.push(Val::Int(n));
                i = n.checked_add(step);
            }
            Ok(Val::List(items))
        },
    }
}

/// Items of a single list argument, or the arguments themselves
fn operands<'a>(name: &str, args: &'a [Val]) -> Result<&'a [Val]> {
    let items = match args {
        [Val::List(l)] => l.as_slice(),
        args => args,
    };
    if items.is_empty() {
        return Err(Error::UnexpectedArguments(format!(
            "{name} expects at least one value"
        )));
    }
    Ok(items)
}

fn extreme(name: &str, args: &[Val], op: BinaryOp) -> Result<Val> {
    let items = operands(name, args)?;
    let mut best = &items[0];
    for item in &items[1..] {
        if binary(op, item, best)?.is_true() {
            best = item;
        }
    }
    Ok(best.clone())
}

/// Language binding for `min`
pub fn min_fn() -> NativeFn {
    NativeFn {
        name: "min",
        doc: "min(LIST) or min(A, B, ...) - Returns smallest value".to_string(),
        func: |_, args| extreme("min", args, BinaryOp::Lt),
    }
}

/// Language binding for `max`
pub fn max_fn() -> NativeFn {
    NativeFn {
        name: "max",
        doc: "max(LIST) or max(A, B, ...) - Returns largest value".to_string(),
        func: |_, args| extreme("max", args, BinaryOp::Gt),
    }
}

/// Language binding for `sum`
pub fn sum_fn() -> NativeFn {
    NativeFn {
        name: "sum",
        doc: "sum(LIST) or sum(LIST, START) - Returns START (default 0) plus all items of LIST"
            .to_string(),
        func: |_, args| {
            let (items, start) = match args {
                [Val::List(l)] => (l, Val::Int(0)),
                [Val::List(l), start] => (l, start.clone()),
                _ => {
                    return Err(Error::UnexpectedArguments(
                        "sum expects a list and optional start value".to_string(),
                    ))
                }
            };
            items
                .iter()
                .try_fold(start, |acc, item| binary(BinaryOp::Add, &acc, item))
        },
    }
}
