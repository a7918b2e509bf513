//! Arithmetic and numeric comparison
//!
//! The promotion rule: when the left side is integral and the right side
//! floats, both promote to float and the result follows. Otherwise the
//! left side's kind picks the operator and the right side is coerced
//! through it (strings parse base-10, per the coercion rules).

use crate::ast::{AddOp, AdditiveNode, CmpOp, CompareNode, MulOp, MultiplicativeNode, Pos};
use crate::error::{Error, EvalErrorKind, Result};
use crate::runtime::Runtime;
use crate::value::{to_float, to_int, to_uint, Value};

use super::Evaluate;

fn at(pos: Pos) -> impl FnOnce(EvalErrorKind) -> Error {
    move |kind| Error::eval(kind, pos)
}

fn non_numeric(context: &'static str, v: &Value, pos: Pos) -> Error {
    Error::eval(
        EvalErrorKind::NonNumericOperand {
            context,
            type_name: v.type_name(),
        },
        pos,
    )
}

// ═══════════════════════════════════════════════════════════════════════
// Additive
// ═══════════════════════════════════════════════════════════════════════

pub(super) fn eval_additive(rt: &mut Runtime<'_>, node: &AdditiveNode) -> Result<Value> {
    let pos = node.pos;
    let additive = node.op == AddOp::Add;

    // a nil left side is the unary +/- form
    let left_expr = match &node.left {
        Some(expr) => expr,
        None => {
            let right = node.right.eval(rt)?;
            return match (&node.op, &right) {
                (AddOp::Add, Value::Int(_) | Value::Uint(_) | Value::Float(_)) => Ok(right),
                (AddOp::Sub, Value::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
                (AddOp::Sub, Value::Uint(n)) => Ok(Value::Int((*n as i64).wrapping_neg())),
                (AddOp::Sub, Value::Float(x)) => Ok(Value::Float(-x)),
                (_, other) => Err(non_numeric("additive", other, pos)),
            };
        }
    };

    let left = left_expr.eval(rt)?;
    let right = node.right.eval(rt)?;
    // strings concatenate; they never take part in float promotion
    let promote = !left.is_float() && !matches!(left, Value::String(_)) && right.is_float();

    match &left {
        Value::String(s) => {
            if additive {
                Ok(Value::string(format!("{}{}", s, right)))
            } else {
                Err(Error::eval(EvalErrorKind::MinusOnStrings, pos))
            }
        }
        Value::Int(a) => {
            if promote {
                let b = to_float(&right).map_err(at(pos))?;
                Ok(Value::Float(if additive {
                    *a as f64 + b
                } else {
                    *a as f64 - b
                }))
            } else {
                let b = to_int(&right).map_err(at(pos))?;
                Ok(Value::Int(if additive {
                    a.wrapping_add(b)
                } else {
                    a.wrapping_sub(b)
                }))
            }
        }
        Value::Uint(a) => {
            if promote {
                let b = to_float(&right).map_err(at(pos))?;
                Ok(Value::Float(if additive {
                    *a as f64 + b
                } else {
                    *a as f64 - b
                }))
            } else {
                let b = to_uint(&right).map_err(at(pos))?;
                Ok(Value::Uint(if additive {
                    a.wrapping_add(b)
                } else {
                    a.wrapping_sub(b)
                }))
            }
        }
        Value::Float(a) => {
            let b = to_float(&right).map_err(at(pos))?;
            Ok(Value::Float(if additive { a + b } else { a - b }))
        }
        other => Err(non_numeric("additive", other, pos)),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Multiplicative
// ═══════════════════════════════════════════════════════════════════════

pub(super) fn eval_multiplicative(
    rt: &mut Runtime<'_>,
    node: &MultiplicativeNode,
) -> Result<Value> {
    let pos = node.pos;
    let left = node.left.eval(rt)?;
    let right = node.right.eval(rt)?;
    let promote = !left.is_float() && right.is_float();

    match node.op {
        MulOp::Mul => match &left {
            Value::Int(a) => {
                if promote {
                    let b = to_float(&right).map_err(at(pos))?;
                    Ok(Value::Float(*a as f64 * b))
                } else {
                    let b = to_int(&right).map_err(at(pos))?;
                    Ok(Value::Int(a.wrapping_mul(b)))
                }
            }
            Value::Uint(a) => {
                if promote {
                    let b = to_float(&right).map_err(at(pos))?;
                    Ok(Value::Float(*a as f64 * b))
                } else {
                    let b = to_uint(&right).map_err(at(pos))?;
                    Ok(Value::Uint(a.wrapping_mul(b)))
                }
            }
            Value::Float(a) => {
                let b = to_float(&right).map_err(at(pos))?;
                Ok(Value::Float(a * b))
            }
            other => Err(non_numeric("multiplicative", other, pos)),
        },

        MulOp::Div => match &left {
            Value::Int(a) => {
                if promote {
                    let b = to_float(&right).map_err(at(pos))?;
                    Ok(Value::Float(*a as f64 / b))
                } else {
                    let b = to_int(&right).map_err(at(pos))?;
                    if b == 0 {
                        return Err(Error::eval(EvalErrorKind::DivisionByZero, pos));
                    }
                    Ok(Value::Int(a.wrapping_div(b)))
                }
            }
            Value::Uint(a) => {
                if promote {
                    let b = to_float(&right).map_err(at(pos))?;
                    Ok(Value::Float(*a as f64 / b))
                } else {
                    let b = to_uint(&right).map_err(at(pos))?;
                    if b == 0 {
                        return Err(Error::eval(EvalErrorKind::DivisionByZero, pos));
                    }
                    Ok(Value::Uint(a / b))
                }
            }
            Value::Float(a) => {
                // float division follows IEEE semantics
                let b = to_float(&right).map_err(at(pos))?;
                Ok(Value::Float(a / b))
            }
            other => Err(non_numeric("multiplicative", other, pos)),
        },

        // a float left operand truncates to integer before the remainder
        MulOp::Rem => match &left {
            Value::Int(a) => {
                let b = to_int(&right).map_err(at(pos))?;
                if b == 0 {
                    return Err(Error::eval(EvalErrorKind::DivisionByZero, pos));
                }
                Ok(Value::Int(a.wrapping_rem(b)))
            }
            Value::Float(a) => {
                let b = to_int(&right).map_err(at(pos))?;
                if b == 0 {
                    return Err(Error::eval(EvalErrorKind::DivisionByZero, pos));
                }
                Ok(Value::Int((*a as i64).wrapping_rem(b)))
            }
            Value::Uint(a) => {
                let b = to_uint(&right).map_err(at(pos))?;
                if b == 0 {
                    return Err(Error::eval(EvalErrorKind::DivisionByZero, pos));
                }
                Ok(Value::Uint(a % b))
            }
            other => Err(non_numeric("multiplicative", other, pos)),
        },
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Numeric Comparison
// ═══════════════════════════════════════════════════════════════════════

pub(super) fn eval_compare(rt: &mut Runtime<'_>, node: &CompareNode) -> Result<Value> {
    let pos = node.pos;
    let left = node.left.eval(rt)?;
    let right = node.right.eval(rt)?;
    let promote = !left.is_float() && right.is_float();

    let ordering_holds = match &left {
        Value::Int(a) => {
            if promote {
                let b = to_float(&right).map_err(at(pos))?;
                cmp_f64(*a as f64, b, node.op)
            } else {
                let b = to_int(&right).map_err(at(pos))?;
                cmp_i64(*a, b, node.op)
            }
        }
        Value::Uint(a) => {
            if promote {
                let b = to_float(&right).map_err(at(pos))?;
                cmp_f64(*a as f64, b, node.op)
            } else {
                let b = to_uint(&right).map_err(at(pos))?;
                cmp_u64(*a, b, node.op)
            }
        }
        Value::Float(a) => {
            let b = to_float(&right).map_err(at(pos))?;
            cmp_f64(*a, b, node.op)
        }
        other => return Err(non_numeric("numeric comparative", other, pos)),
    };
    Ok(Value::Bool(ordering_holds))
}

fn cmp_i64(a: i64, b: i64, op: CmpOp) -> bool {
    match op {
        CmpOp::Lt => a < b,
        CmpOp::Le => a <= b,
        CmpOp::Gt => a > b,
        CmpOp::Ge => a >= b,
    }
}

fn cmp_u64(a: u64, b: u64, op: CmpOp) -> bool {
    match op {
        CmpOp::Lt => a < b,
        CmpOp::Le => a <= b,
        CmpOp::Gt => a > b,
        CmpOp::Ge => a >= b,
    }
}

fn cmp_f64(a: f64, b: f64, op: CmpOp) -> bool {
    match op {
        CmpOp::Lt => a < b,
        CmpOp::Le => a <= b,
        CmpOp::Gt => a > b,
        CmpOp::Ge => a >= b,
    }
}
