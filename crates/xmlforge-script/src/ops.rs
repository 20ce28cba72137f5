//! Operator semantics shared by the interpreter and native functions.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::ast::BinaryOp;
use crate::error::{RuntimeError, RuntimeErrorKind, RuntimeResult};
use crate::runtime::Runtime;
use crate::value::Value;

pub fn binary(rt: &mut Runtime, op: BinaryOp, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
    match op {
        BinaryOp::Add => add(rt, lhs, rhs),
        BinaryOp::Sub => arithmetic(op, lhs, rhs, i64::checked_sub, |a, b| a - b),
        BinaryOp::Mul => multiply(rt, lhs, rhs),
        BinaryOp::Div => divide(lhs, rhs),
        BinaryOp::Rem => remainder(lhs, rhs),
        BinaryOp::Eq => Ok(Value::Bool(values_equal(rt, lhs, rhs)?)),
        BinaryOp::NotEq => Ok(Value::Bool(!values_equal(rt, lhs, rhs)?)),
        BinaryOp::Lt => Ok(Value::Bool(compare(op, lhs, rhs)? == Ordering::Less)),
        BinaryOp::Le => Ok(Value::Bool(compare(op, lhs, rhs)? != Ordering::Greater)),
        BinaryOp::Gt => Ok(Value::Bool(compare(op, lhs, rhs)? == Ordering::Greater)),
        BinaryOp::Ge => Ok(Value::Bool(compare(op, lhs, rhs)? != Ordering::Less)),
    }
}

fn unsupported(op: BinaryOp, lhs: &Value, rhs: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "unsupported operand types for {}: '{}' and '{}'",
        op.symbol(),
        lhs.type_name(),
        rhs.type_name()
    ))
}

fn overflow() -> RuntimeError {
    RuntimeError::value_error("integer overflow")
}

fn add(rt: &mut Runtime, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
    match (lhs, rhs) {
        (Value::Str(_), _) | (_, Value::Str(_)) => {
            let limit = rt.limits().max_value_len;
            let left = lhs.render(limit)?;
            let right = rhs.render(limit)?;
            rt.check_len(left.len() + right.len())?;
            rt.charge((left.len() + right.len()) as u64 / 64)?;
            Ok(Value::str(left + &right))
        }
        (Value::List(a), Value::List(b)) => {
            rt.check_len(a.len() + b.len())?;
            rt.charge((a.len() + b.len()) as u64 / 8)?;
            let mut items = Vec::with_capacity(a.len() + b.len());
            items.extend(a.iter().cloned());
            items.extend(b.iter().cloned());
            Ok(Value::list(items))
        }
        _ => arithmetic(BinaryOp::Add, lhs, rhs, i64::checked_add, |a, b| a + b),
    }
}

fn arithmetic(
    op: BinaryOp,
    lhs: &Value,
    rhs: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> RuntimeResult<Value> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => int_op(*a, *b).map(Value::Int).ok_or_else(overflow),
        _ => match (lhs.as_number(), rhs.as_number()) {
            (Some(a), Some(b)) => Ok(Value::Float(float_op(a, b))),
            _ => Err(unsupported(op, lhs, rhs)),
        },
    }
}

fn multiply(rt: &mut Runtime, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
    match (lhs, rhs) {
        (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
            let count = usize::try_from(*n).unwrap_or(0);
            rt.check_projected_len(s.len().checked_mul(count))?;
            rt.charge((s.len() * count) as u64 / 64)?;
            Ok(Value::str(s.repeat(count)))
        }
        (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items)) => {
            if items.is_empty() {
                return Ok(Value::list(Vec::new()));
            }
            let count = usize::try_from(*n).unwrap_or(0);
            rt.check_projected_len(items.len().checked_mul(count))?;
            rt.charge((items.len() * count) as u64 / 8)?;
            let mut out = Vec::with_capacity(items.len() * count);
            for _ in 0..count {
                out.extend(items.iter().cloned());
            }
            Ok(Value::list(out))
        }
        _ => arithmetic(BinaryOp::Mul, lhs, rhs, i64::checked_mul, |a, b| a * b),
    }
}

fn divide(lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
    match (lhs.as_number(), rhs.as_number()) {
        (Some(_), Some(b)) if b == 0.0 => Err(RuntimeError::new(
            RuntimeErrorKind::ZeroDivision,
            "division by zero",
        )),
        (Some(a), Some(b)) => Ok(Value::Float(a / b)),
        _ => Err(unsupported(BinaryOp::Div, lhs, rhs)),
    }
}

/// Remainder takes the sign of the divisor.
fn remainder(lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
    let zero = || RuntimeError::new(RuntimeErrorKind::ZeroDivision, "modulo by zero");
    match (lhs, rhs) {
        (Value::Int(_), Value::Int(0)) => Err(zero()),
        (Value::Int(a), Value::Int(b)) => {
            let r = a.checked_rem(*b).ok_or_else(overflow)?;
            if r != 0 && (r < 0) != (*b < 0) {
                Ok(Value::Int(r + b))
            } else {
                Ok(Value::Int(r))
            }
        }
        _ => match (lhs.as_number(), rhs.as_number()) {
            (Some(_), Some(b)) if b == 0.0 => Err(zero()),
            (Some(a), Some(b)) => {
                let r = a % b;
                if r != 0.0 && (r < 0.0) != (b < 0.0) {
                    Ok(Value::Float(r + b))
                } else {
                    Ok(Value::Float(r))
                }
            }
            _ => Err(unsupported(BinaryOp::Rem, lhs, rhs)),
        },
    }
}

/// Structural equality; every container element visited costs one operation.
pub fn values_equal(rt: &mut Runtime, lhs: &Value, rhs: &Value) -> RuntimeResult<bool> {
    Ok(match (lhs, rhs) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Node(a), Value::Node(b)) => Rc::ptr_eq(a, b),
        (Value::List(a), Value::List(b)) => {
            if Rc::ptr_eq(a, b) {
                return Ok(true);
            }
            if a.len() != b.len() {
                return Ok(false);
            }
            for (x, y) in a.iter().zip(b.iter()) {
                rt.tick()?;
                if !values_equal(rt, x, y)? {
                    return Ok(false);
                }
            }
            true
        }
        (Value::Map(a), Value::Map(b)) => {
            if Rc::ptr_eq(a, b) {
                return Ok(true);
            }
            if a.len() != b.len() {
                return Ok(false);
            }
            for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                rt.tick()?;
                if ka != kb || !values_equal(rt, va, vb)? {
                    return Ok(false);
                }
            }
            true
        }
        _ => match (lhs.as_number(), rhs.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    })
}

/// Ordering between two numbers or two strings.
pub fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> RuntimeResult<Ordering> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ => match (lhs.as_number(), rhs.as_number()) {
            (Some(a), Some(b)) => a
                .partial_cmp(&b)
                .ok_or_else(|| RuntimeError::value_error("cannot order nan")),
            _ => Err(RuntimeError::type_error(format!(
                "'{}' not supported between '{}' and '{}'",
                op.symbol(),
                lhs.type_name(),
                rhs.type_name()
            ))),
        },
    }
}
