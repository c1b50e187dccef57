//! Stack machine executing compiled expressions
use super::codegen::{Expr, Op};
use super::parse::{BinaryOp, UnaryOp};
use crate::{Error, Result, Val};
use std::cmp::Ordering;

/// Callbacks the machine uses to resolve names and invoke procedures
pub trait Host {
    /// Value bound to (possibly dotted) name
    fn lookup(&mut self, name: &str) -> Result<Val>;

    /// Invoke callable value
    fn call(&mut self, func: Val, args: Vec<Val>, kwargs: Vec<(String, Val)>) -> Result<Val>;
}

/// Evaluate compiled expression
pub fn eval(expr: &Expr, host: &mut dyn Host) -> Result<Val> {
    let ops = expr.ops();
    let mut stack: Vec<Val> = vec![];
    let mut ip = 0;

    while let Some(op) = ops.get(ip) {
        ip += 1;
        match op {
            Op::Push(v) => stack.push(v.clone()),
            Op::Load(name) => stack.push(host.lookup(name)?),
            Op::MakeList(n) => {
                let items = pop_n(&mut stack, *n)?;
                stack.push(Val::List(items));
            }
            Op::Index(n) => {
                let indices = pop_n(&mut stack, *n)?;
                let mut value = pop(&mut stack)?;
                for idx in &indices {
                    value = index(&value, idx)?;
                }
                stack.push(value);
            }
            Op::Call(nargs, kwnames) => {
                let kwvals = pop_n(&mut stack, kwnames.len())?;
                let args = pop_n(&mut stack, *nargs)?;
                let func = pop(&mut stack)?;
                let kwargs = kwnames.iter().cloned().zip(kwvals).collect();
                stack.push(host.call(func, args, kwargs)?);
            }
            Op::Unary(op) => {
                let v = pop(&mut stack)?;
                stack.push(unary(*op, &v)?);
            }
            Op::Binary(op) => {
                let rhs = pop(&mut stack)?;
                let lhs = pop(&mut stack)?;
                stack.push(binary(*op, &lhs, &rhs)?);
            }
            Op::JumpIfFalseOrPop(n) => {
                if top(&stack)?.is_true() {
                    stack.pop();
                } else {
                    ip += n;
                }
            }
            Op::JumpIfTrueOrPop(n) => {
                if top(&stack)?.is_true() {
                    ip += n;
                } else {
                    stack.pop();
                }
            }
        }
    }

    let result = pop(&mut stack)?;
    if !stack.is_empty() {
        return Err(Error::EvaluationFailure(format!(
            "expression '{}' left {} values on stack",
            expr.source(),
            stack.len()
        )));
    }
    Ok(result)
}

fn pop(stack: &mut Vec<Val>) -> Result<Val> {
    stack
        .pop()
        .ok_or(Error::EvaluationFailure("expression stack is empty".to_string()))
}

fn top(stack: &[Val]) -> Result<&Val> {
    stack
        .last()
        .ok_or(Error::EvaluationFailure("expression stack is empty".to_string()))
}

fn pop_n(stack: &mut Vec<Val>, n: usize) -> Result<Vec<Val>> {
    if stack.len() < n {
        return Err(Error::EvaluationFailure(format!(
            "expected {n} values on expression stack"
        )));
    }
    Ok(stack.split_off(stack.len() - n))
}

/// Resolve a possibly negative sequence index
fn position(len: usize, idx: &Val) -> Result<usize> {
    let i = match idx {
        Val::Int(i) => *i,
        v => {
            return Err(Error::InvalidTarget(format!(
                "index must be an integer - got {}",
                v.type_name()
            )))
        }
    };
    let pos = if i < 0 { i + len as i64 } else { i };
    if pos < 0 || pos >= len as i64 {
        return Err(Error::EvaluationFailure(format!(
            "index {i} out of range for length {len}"
        )));
    }
    Ok(pos as usize)
}

/// Element of `value` at `idx`
pub(crate) fn index(value: &Val, idx: &Val) -> Result<Val> {
    match value {
        Val::List(l) => Ok(l[position(l.len(), idx)?].clone()),
        Val::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Val::String(chars[position(chars.len(), idx)?].to_string()))
        }
        Val::Group(g) => g.get(idx.as_str()?),
        v => Err(Error::InvalidTarget(format!("cannot index {}", v.type_name()))),
    }
}

/// Mutable element of `value` at `idx`
pub(crate) fn index_mut<'a>(value: &'a mut Val, idx: &Val) -> Result<&'a mut Val> {
    match value {
        Val::List(l) => {
            let pos = position(l.len(), idx)?;
            Ok(&mut l[pos])
        }
        v => Err(Error::InvalidTarget(format!(
            "cannot assign into element of {}",
            v.type_name()
        ))),
    }
}

fn unary(op: UnaryOp, v: &Val) -> Result<Val> {
    match (op, v) {
        (UnaryOp::Not, v) => Ok(Val::Bool(!v.is_true())),
        (UnaryOp::Neg, Val::Int(i)) => i
            .checked_neg()
            .map(Val::Int)
            .ok_or_else(|| Error::EvaluationFailure("integer overflow".to_string())),
        (UnaryOp::Neg, Val::Float(x)) => Ok(Val::Float(-x)),
        (UnaryOp::Pos, Val::Int(_) | Val::Float(_)) => Ok(v.clone()),
        (_, v) => Err(Error::EvaluationFailure(format!(
            "bad operand type for unary operator - {}",
            v.type_name()
        ))),
    }
}

/// Apply binary operator
pub(crate) fn binary(op: BinaryOp, lhs: &Val, rhs: &Val) -> Result<Val> {
    use BinaryOp::*;
    let v = match (op, lhs, rhs) {
        (Eq, a, b) => Val::Bool(equals(a, b)),
        (Ne, a, b) => Val::Bool(!equals(a, b)),
        (Lt | Le | Gt | Ge, a, b) => {
            let ord = compare(a, b)?;
            Val::Bool(match op {
                Lt => ord == Ordering::Less,
                Le => ord != Ordering::Greater,
                Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            })
        }
        (In, a, b) => Val::Bool(contains(b, a)?),
        (NotIn, a, b) => Val::Bool(!contains(b, a)?),
        (Add, Val::String(a), Val::String(b)) => Val::String(format!("{a}{b}")),
        (Add, Val::List(a), Val::List(b)) => Val::List(a.iter().chain(b).cloned().collect()),
        (Mul, Val::String(s), Val::Int(n)) | (Mul, Val::Int(n), Val::String(s)) => {
            Val::String(s.repeat(repeat_count(s.len(), *n)?))
        }
        (Mul, Val::List(l), Val::Int(n)) | (Mul, Val::Int(n), Val::List(l)) => {
            let n = repeat_count(l.len(), *n)?;
            Val::List(std::iter::repeat(l.iter().cloned()).take(n).flatten().collect())
        }
        (_, Val::Int(a), Val::Int(b)) => int_arith(op, *a, *b)?,
        (_, a, b) if is_number(a) && is_number(b) => {
            float_arith(op, a.as_float()?, b.as_float()?)?
        }
        (_, a, b) => {
            return Err(Error::EvaluationFailure(format!(
                "unsupported operand types for {op:?} - {} and {}",
                a.type_name(),
                b.type_name()
            )))
        }
    };
    Ok(v)
}

/// Longest string or list repetition and `range` may build
pub(crate) const MAX_SEQUENCE_LEN: usize = 1 << 24;

/// Times a sequence of `len` items is repeated by `* n`
fn repeat_count(len: usize, n: i64) -> Result<usize> {
    let n = usize::try_from(n.max(0))
        .map_err(|_| Error::EvaluationFailure("repeat count too large".to_string()))?;
    match len.checked_mul(n) {
        Some(total) if total <= MAX_SEQUENCE_LEN => Ok(n),
        _ => Err(Error::EvaluationFailure(format!(
            "sequence repeated {n} times is too long"
        ))),
    }
}

fn is_number(v: &Val) -> bool {
    matches!(v, Val::Int(_) | Val::Float(_) | Val::Bool(_))
}

fn int_arith(op: BinaryOp, a: i64, b: i64) -> Result<Val> {
    use BinaryOp::*;
    let overflow = || Error::EvaluationFailure("integer overflow".to_string());
    let v = match op {
        Add => Val::Int(a.checked_add(b).ok_or_else(overflow)?),
        Sub => Val::Int(a.checked_sub(b).ok_or_else(overflow)?),
        Mul => Val::Int(a.checked_mul(b).ok_or_else(overflow)?),
        Div => return float_arith(op, a as f64, b as f64),
        FloorDiv | Mod if b == 0 => {
            return Err(Error::EvaluationFailure("division by zero".to_string()))
        }
        FloorDiv => {
            let q = a.checked_div(b).ok_or_else(overflow)?;
            Val::Int(if a % b != 0 && (a < 0) != (b < 0) { q - 1 } else { q })
        }
        Mod => {
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            Val::Int(if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
        }
        Pow if b >= 0 => {
            let exp = u32::try_from(b).map_err(|_| overflow())?;
            Val::Int(a.checked_pow(exp).ok_or_else(overflow)?)
        }
        Pow => Val::Float((a as f64).powf(b as f64)),
        _ => return float_arith(op, a as f64, b as f64),
    };
    Ok(v)
}

fn float_arith(op: BinaryOp, a: f64, b: f64) -> Result<Val> {
    use BinaryOp::*;
    if matches!(op, Div | FloorDiv | Mod) && b == 0.0 {
        return Err(Error::EvaluationFailure("division by zero".to_string()));
    }
    let v = match op {
        Add => a + b,
        Sub => a - b,
        Mul => a * b,
        Div => a / b,
        FloorDiv => (a / b).floor(),
        Mod => a - b * (a / b).floor(),
        Pow => a.powf(b),
        _ => {
            return Err(Error::EvaluationFailure(format!(
                "unsupported numeric operator {op:?}"
            )))
        }
    };
    Ok(Val::Float(v))
}

/// Structural equality, treating ints and floats as numbers
pub(crate) fn equals(a: &Val, b: &Val) -> bool {
    match (a, b) {
        (Val::List(x), Val::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| equals(a, b))
        }
        (Val::Int(_), Val::Float(_)) | (Val::Float(_), Val::Int(_)) => {
            a.as_float().ok() == b.as_float().ok()
        }
        (a, b) => a == b,
    }
}

fn compare(a: &Val, b: &Val) -> Result<Ordering> {
    match (a, b) {
        (Val::Int(x), Val::Int(y)) => Ok(x.cmp(y)),
        (Val::String(x), Val::String(y)) => Ok(x.cmp(y)),
        (Val::List(x), Val::List(y)) => {
            for (a, b) in x.iter().zip(y) {
                match compare(a, b)? {
                    Ordering::Equal => continue,
                    ord => return Ok(ord),
                }
            }
            Ok(x.len().cmp(&y.len()))
        }
        (a, b) if is_number(a) && is_number(b) => a
            .as_float()?
            .partial_cmp(&b.as_float()?)
            .ok_or(Error::EvaluationFailure("cannot compare NaN".to_string())),
        (a, b) => Err(Error::EvaluationFailure(format!(
            "cannot compare {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn contains(container: &Val, item: &Val) -> Result<bool> {
    match (container, item) {
        (Val::List(l), item) => Ok(l.iter().any(|e| equals(e, item))),
        (Val::String(s), Val::String(sub)) => Ok(s.contains(sub.as_str())),
        (Val::Group(g), Val::String(name)) => Ok(g.has(name)),
        (c, _) => Err(Error::EvaluationFailure(format!(
            "'in' is not supported for {}",
            c.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::compile;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    /// Host with fixed variables, and `add` as the only callable
    #[derive(Default)]
    struct TestHost {
        vars: HashMap<String, Val>,
        calls: usize,
    }

    impl Host for TestHost {
        fn lookup(&mut self, name: &str) -> Result<Val> {
            self.vars
                .get(name)
                .cloned()
                .ok_or_else(|| Error::UnresolvedSymbol(name.to_string()))
        }

        fn call(&mut self, func: Val, args: Vec<Val>, kwargs: Vec<(String, Val)>) -> Result<Val> {
            self.calls += 1;
            assert_eq!(func, Val::string("add"));
            let mut total = args.iter().map(|a| a.as_int().unwrap()).sum::<i64>();
            total += kwargs.iter().map(|(_, v)| v.as_int().unwrap()).sum::<i64>();
            Ok(Val::Int(total))
        }
    }

    fn eval_expr(text: &str) -> Result<Val> {
        let mut host = TestHost::default();
        host.vars.insert("x".to_string(), Val::Int(4));
        host.vars.insert("add".to_string(), Val::string("add"));
        host.vars
            .insert("l".to_string(), Val::List(vec![Val::Int(1), Val::Int(2), Val::Int(3)]));
        eval(&compile(text)?, &mut host)
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval_expr("1 + 2 * 3"), Ok(Val::Int(7)));
        assert_eq!(eval_expr("7 / 2"), Ok(Val::Float(3.5)));
        assert_eq!(eval_expr("-7 // 2"), Ok(Val::Int(-4)));
        assert_eq!(eval_expr("-7 % 3"), Ok(Val::Int(2)));
        assert_eq!(eval_expr("2 ** 10"), Ok(Val::Int(1024)));
        assert_eq!(eval_expr("x * 0.5"), Ok(Val::Float(2.0)));
        assert_matches!(eval_expr("1 / 0"), Err(Error::EvaluationFailure(_)));
    }

    #[test]
    fn strings_and_lists() {
        assert_eq!(eval_expr("'ab' + 'cd'"), Ok(Val::string("abcd")));
        assert_eq!(eval_expr("'ab' * 2"), Ok(Val::string("abab")));
        assert_eq!(
            eval_expr("[1] + [x]"),
            Ok(Val::List(vec![Val::Int(1), Val::Int(4)]))
        );
        assert_eq!(
            eval_expr("2 * [1, x]"),
            Ok(Val::List(vec![Val::Int(1), Val::Int(4), Val::Int(1), Val::Int(4)]))
        );
        assert_eq!(eval_expr("[1] * -1"), Ok(Val::List(vec![])));
        assert_eq!(eval_expr("'ab' * 0"), Ok(Val::string("")));
        assert_matches!(
            eval_expr("'ab' * 9223372036854775807"),
            Err(Error::EvaluationFailure(_))
        );
        assert_matches!(eval_expr("l * 10000000"), Err(Error::EvaluationFailure(_)));
    }

    #[test]
    fn integer_overflow() {
        let min = "(-9223372036854775807 - 1)";
        assert_matches!(eval_expr(&format!("-{min}")), Err(Error::EvaluationFailure(_)));
        assert_matches!(eval_expr(&format!("{min} // -1")), Err(Error::EvaluationFailure(_)));
        assert_matches!(eval_expr(&format!("{min} % -1")), Err(Error::EvaluationFailure(_)));
        assert_eq!(eval_expr(&format!("{min} // 1")), Ok(Val::Int(i64::MIN)));
        assert_matches!(
            eval_expr("9223372036854775807 + 1"),
            Err(Error::EvaluationFailure(_))
        );
    }

    #[test]
    fn comparisons() {
        assert_eq!(eval_expr("1 == 1.0"), Ok(Val::Bool(true)));
        assert_eq!(eval_expr("x >= 4 and x < 5"), Ok(Val::Bool(true)));
        assert_eq!(eval_expr("2 in l"), Ok(Val::Bool(true)));
        assert_eq!(eval_expr("9 not in l"), Ok(Val::Bool(true)));
        assert_eq!(eval_expr("'b' in 'abc'"), Ok(Val::Bool(true)));
        assert_matches!(eval_expr("'a' < 1"), Err(Error::EvaluationFailure(_)));
    }

    #[test]
    fn indexing() {
        assert_eq!(eval_expr("l[0]"), Ok(Val::Int(1)));
        assert_eq!(eval_expr("l[-1]"), Ok(Val::Int(3)));
        assert_eq!(eval_expr("'abc'[1]"), Ok(Val::string("b")));
        assert_matches!(eval_expr("l[3]"), Err(Error::EvaluationFailure(_)));
        assert_matches!(eval_expr("x[0]"), Err(Error::InvalidTarget(_)));
    }

    #[test]
    fn calls() {
        assert_eq!(eval_expr("add(1, 2, z=3)"), Ok(Val::Int(6)));
    }

    #[test]
    fn short_circuit_skips_rhs() {
        let mut host = TestHost::default();
        host.vars.insert("add".to_string(), Val::string("add"));
        let v = eval(&compile("0 and add(1)").unwrap(), &mut host);
        assert_eq!(v, Ok(Val::Int(0)));
        assert_eq!(host.calls, 0);
        let v = eval(&compile("1 or add(1)").unwrap(), &mut host);
        assert_eq!(v, Ok(Val::Int(1)));
        assert_eq!(host.calls, 0);
    }

    #[test]
    fn undefined_name() {
        assert_matches!(eval_expr("nope + 1"), Err(Error::UnresolvedSymbol(_)));
    }
}
