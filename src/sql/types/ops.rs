//! Type rules: implicit coercion, operator result types, comparison and
//! operator application over runtime values.
//!
//! A `None` operand type stands for an untyped `NULL` literal, which takes on
//! whatever type the other operand demands.

use std::cmp::Ordering;

use crate::{
    error::{Error, Result},
    sql::{
        parser::ast::{BinaryOperator, UnaryOperator},
        types::{DataType, Value},
    },
};

/// Converts a value to the target type. Only INTEGER widens to FLOAT; NULL
/// fits every type.
pub fn coerce(value: Value, target: DataType) -> Result<Value> {
    match (value, target) {
        (Value::Null, _) => Ok(Value::Null),
        (Value::Integer(i), DataType::Float) => Ok(Value::Float(i as f64)),
        (v, t) if v.datatype() == Some(t) => Ok(v),
        (v, t) => Err(Error::Type(format!(
            "cannot coerce {} value {} to {}",
            v.datatype().map_or("NULL", |d| d.as_str()),
            v,
            t
        ))),
    }
}

fn mismatch(op: &BinaryOperator, left: Option<DataType>, right: Option<DataType>) -> Error {
    Error::Type(format!(
        "no matching signature for operator {} for argument types {}, {}",
        op,
        left.map_or("NULL", |t| t.as_str()),
        right.map_or("NULL", |t| t.as_str()),
    ))
}

/// Infers the result type of a binary operator at planning time
pub fn result_type_of(
    op: &BinaryOperator,
    left: Option<DataType>,
    right: Option<DataType>,
) -> Result<DataType> {
    let numeric = |t: Option<DataType>| t.is_none_or(|t| t.is_numeric());
    match op {
        BinaryOperator::Add | BinaryOperator::Subtract | BinaryOperator::Multiply => {
            if !numeric(left) || !numeric(right) {
                return Err(mismatch(op, left, right));
            }
            Ok(match (left, right) {
                (Some(DataType::Float), _) | (_, Some(DataType::Float)) => DataType::Float,
                _ => DataType::Integer,
            })
        }
        BinaryOperator::Divide => {
            if !numeric(left) || !numeric(right) {
                return Err(mismatch(op, left, right));
            }
            Ok(DataType::Float)
        }
        BinaryOperator::Modulo => {
            let integer = |t: Option<DataType>| t.is_none_or(|t| t == DataType::Integer);
            if !integer(left) || !integer(right) {
                return Err(mismatch(op, left, right));
            }
            Ok(DataType::Integer)
        }
        BinaryOperator::And | BinaryOperator::Or => {
            let boolean = |t: Option<DataType>| t.is_none_or(|t| t == DataType::Boolean);
            if !boolean(left) || !boolean(right) {
                return Err(mismatch(op, left, right));
            }
            Ok(DataType::Boolean)
        }
        _ => match (left, right) {
            (Some(l), Some(r)) if l != r && !(l.is_numeric() && r.is_numeric()) => {
                Err(mismatch(op, left, right))
            }
            _ => Ok(DataType::Boolean),
        },
    }
}

/// Infers the result type of a unary operator at planning time
pub fn unary_result_type(op: &UnaryOperator, operand: Option<DataType>) -> Result<DataType> {
    match (op, operand) {
        (UnaryOperator::Not, None | Some(DataType::Boolean)) => Ok(DataType::Boolean),
        (UnaryOperator::Minus | UnaryOperator::Plus, None) => Ok(DataType::Integer),
        (UnaryOperator::Minus | UnaryOperator::Plus, Some(t)) if t.is_numeric() => Ok(t),
        (op, t) => Err(Error::Type(format!(
            "no matching signature for unary operator {} for argument type {}",
            op,
            t.map_or("NULL", |t| t.as_str())
        ))),
    }
}

/// Compares two values. `Ok(None)` means one side is NULL and the comparison
/// itself is NULL.
pub fn compare(a: &Value, b: &Value) -> Result<Option<Ordering>> {
    Ok(Some(match (a, b) {
        (Value::Null, _) | (_, Value::Null) => return Ok(None),
        (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
        (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
        (Value::Integer(a), Value::Float(b)) => (*a as f64).total_cmp(b),
        (Value::Float(a), Value::Integer(b)) => a.total_cmp(&(*b as f64)),
        (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
        (a, b) => {
            return Err(Error::Type(format!("cannot compare {} with {}", a, b)));
        }
    }))
}

fn as_bool(v: &Value) -> Result<Option<bool>> {
    match v {
        Value::Null => Ok(None),
        Value::Boolean(b) => Ok(Some(*b)),
        v => Err(Error::Type(format!("expected BOOLEAN, got {}", v))),
    }
}

fn overflow(op: &BinaryOperator, a: i64, b: i64) -> Error {
    Error::Evaluation(format!("integer overflow: {} {} {}", a, op, b))
}

/// Applies a binary operator to two runtime values
pub fn apply_binary(op: &BinaryOperator, left: &Value, right: &Value) -> Result<Value> {
    // Three-valued logic: a decided side wins over NULL
    match op {
        BinaryOperator::And => {
            return Ok(match (as_bool(left)?, as_bool(right)?) {
                (Some(false), _) | (_, Some(false)) => Value::Boolean(false),
                (Some(true), Some(true)) => Value::Boolean(true),
                _ => Value::Null,
            });
        }
        BinaryOperator::Or => {
            return Ok(match (as_bool(left)?, as_bool(right)?) {
                (Some(true), _) | (_, Some(true)) => Value::Boolean(true),
                (Some(false), Some(false)) => Value::Boolean(false),
                _ => Value::Null,
            });
        }
        _ => {}
    }

    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }

    if op.is_comparison() {
        let ord = match compare(left, right)? {
            Some(ord) => ord,
            None => return Ok(Value::Null),
        };
        return Ok(Value::Boolean(match op {
            BinaryOperator::Equal => ord == Ordering::Equal,
            BinaryOperator::NotEqual => ord != Ordering::Equal,
            BinaryOperator::LessThan => ord == Ordering::Less,
            BinaryOperator::LessThanOrEqual => ord != Ordering::Greater,
            BinaryOperator::GreaterThan => ord == Ordering::Greater,
            _ => ord != Ordering::Less,
        }));
    }

    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => {
            let (a, b) = (*a, *b);
            match op {
                BinaryOperator::Add => a.checked_add(b).map(Value::Integer).ok_or_else(|| overflow(op, a, b)),
                BinaryOperator::Subtract => a.checked_sub(b).map(Value::Integer).ok_or_else(|| overflow(op, a, b)),
                BinaryOperator::Multiply => a.checked_mul(b).map(Value::Integer).ok_or_else(|| overflow(op, a, b)),
                BinaryOperator::Divide => divide(a as f64, b as f64),
                BinaryOperator::Modulo => {
                    if b == 0 {
                        return Err(Error::Evaluation(format!("division by zero: {} % {}", a, b)));
                    }
                    a.checked_rem(b).map(Value::Integer).ok_or_else(|| overflow(op, a, b))
                }
                _ => Err(mismatch(op, left.datatype(), right.datatype())),
            }
        }
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            let a = as_float(left)?;
            let b = as_float(right)?;
            match op {
                BinaryOperator::Add => Ok(Value::Float(a + b)),
                BinaryOperator::Subtract => Ok(Value::Float(a - b)),
                BinaryOperator::Multiply => Ok(Value::Float(a * b)),
                BinaryOperator::Divide => divide(a, b),
                _ => Err(mismatch(op, left.datatype(), right.datatype())),
            }
        }
        _ => Err(mismatch(op, left.datatype(), right.datatype())),
    }
}

fn as_float(v: &Value) -> Result<f64> {
    match coerce(v.clone(), DataType::Float)? {
        Value::Float(f) => Ok(f),
        v => Err(Error::Internal(format!("coercion to FLOAT produced {}", v))),
    }
}

fn divide(a: f64, b: f64) -> Result<Value> {
    if b == 0.0 {
        return Err(Error::Evaluation(format!("division by zero: {} / {}", a, b)));
    }
    Ok(Value::Float(a / b))
}

/// Applies a unary operator to a runtime value
pub fn apply_unary(op: &UnaryOperator, value: &Value) -> Result<Value> {
    match (op, value) {
        (_, Value::Null) => Ok(Value::Null),
        (UnaryOperator::Minus, Value::Integer(i)) => i
            .checked_neg()
            .map(Value::Integer)
            .ok_or_else(|| Error::Evaluation(format!("integer overflow: -{}", i))),
        (UnaryOperator::Minus, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOperator::Plus, Value::Integer(_) | Value::Float(_)) => Ok(value.clone()),
        (UnaryOperator::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        (op, v) => Err(Error::Type(format!("cannot apply {} to {}", op, v))),
    }
}
