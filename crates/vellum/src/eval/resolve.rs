//! Field, index and slice resolution
//!
//! One lookup routine serves field access, bracket indexing and chain
//! segments: method probe first for string indices, then a dispatch on
//! the base kind. Missing mapping keys resolve to `Invalid`; everything
//! else that misses is a descriptive failure.

use crate::ast::SliceNode;
use crate::error::{Error, EvalErrorKind, Result};
use crate::runtime::Runtime;
use crate::value::{MapKey, Value};

use super::Evaluate;

/// Resolve `base[index]` / `base.index` to a value.
///
/// Rules, in order: nil bases fail; a string index probes record
/// methods and binds the receiver on a hit; otherwise sequences and
/// strings take bounds-checked integral indices, records take field
/// names, and mappings take keys (a missing key is `Invalid`, not a
/// failure).
pub(crate) fn resolve_index(
    base: &Value,
    index: &Value,
) -> std::result::Result<Value, EvalErrorKind> {
    if base.is_invalid() {
        return Err(EvalErrorKind::NoFieldOrMethod {
            name: index.to_string(),
            type_name: base.type_name(),
        });
    }
    if base.is_nil() {
        return Err(EvalErrorKind::NilAccess {
            index: index.to_string(),
        });
    }

    // method probe before field dispatch
    if let (Value::Record(record), Value::String(name)) = (base, index) {
        if let Some(method) = record.method(name) {
            return Ok(Value::Func(method.bind(record.clone())));
        }
    }

    match base {
        Value::Sequence(seq) => {
            let i = index_arg(index, seq.len())?;
            Ok(seq[i].clone())
        }
        Value::String(s) => {
            let len = s.chars().count();
            let i = index_arg(index, len)?;
            let c = s.chars().nth(i).unwrap_or_default();
            Ok(Value::string(c.to_string()))
        }
        Value::Record(record) => match index {
            Value::String(name) => record.field(name).cloned().ok_or_else(|| {
                EvalErrorKind::NoFieldOrMethod {
                    name: name.to_string(),
                    type_name: base.type_name(),
                }
            }),
            other => Err(EvalErrorKind::CannotIndex {
                index: other.to_string(),
                type_name: base.type_name(),
            }),
        },
        Value::Mapping(map) => match MapKey::from_value(index) {
            Some(key) => Ok(map.get(&key).cloned().unwrap_or(Value::Invalid)),
            None => Err(EvalErrorKind::BadMapKey {
                type_name: index.type_name(),
            }),
        },
        other => Err(EvalErrorKind::CannotIndex {
            index: index.to_string(),
            type_name: other.type_name(),
        }),
    }
}

/// Check that a value is usable as a sequence/string index and
/// bounds-check it.
fn index_arg(index: &Value, len: usize) -> std::result::Result<usize, EvalErrorKind> {
    let x = match index {
        Value::Int(n) => *n,
        Value::Uint(n) => *n as i64,
        Value::Float(f) => *f as i64,
        Value::Invalid | Value::Nil => return Err(EvalErrorKind::NilIndex),
        other => {
            return Err(EvalErrorKind::NonNumericIndex {
                type_name: other.type_name(),
            })
        }
    };
    if x < 0 || x as usize >= len {
        return Err(EvalErrorKind::IndexOutOfRange { index: x });
    }
    Ok(x as usize)
}

/// Evaluate `base[lo:hi]`; `lo` defaults to 0, `hi` to the length.
pub(super) fn eval_slice(rt: &mut Runtime<'_>, node: &SliceNode) -> Result<Value> {
    let pos = node.pos;
    let base = node.base.eval(rt)?;

    let lo = match &node.lo {
        Some(expr) => slice_bound(rt, expr)?,
        None => 0,
    };
    let len = match &base {
        Value::Sequence(seq) => seq.len(),
        Value::String(s) => s.chars().count(),
        other => {
            return Err(Error::eval(
                EvalErrorKind::CannotSlice {
                    type_name: other.type_name(),
                },
                pos,
            ))
        }
    };
    let hi = match &node.hi {
        Some(expr) => slice_bound(rt, expr)?,
        None => len as i64,
    };

    if lo < 0 || hi < lo || hi as usize > len {
        return Err(Error::eval(
            EvalErrorKind::SliceOutOfRange { lo, hi, len },
            pos,
        ));
    }

    match base {
        Value::Sequence(seq) => Ok(Value::sequence(
            seq[lo as usize..hi as usize].to_vec(),
        )),
        Value::String(s) => Ok(Value::string(
            s.chars()
                .skip(lo as usize)
                .take((hi - lo) as usize)
                .collect::<String>(),
        )),
        _ => unreachable!("length dispatch covered the kinds"),
    }
}

fn slice_bound(rt: &mut Runtime<'_>, expr: &crate::ast::Expr) -> Result<i64> {
    let v = expr.eval(rt)?;
    match v {
        Value::Int(n) => Ok(n),
        Value::Uint(n) => Ok(n as i64),
        Value::Float(f) => Ok(f as i64),
        other => Err(Error::eval(
            EvalErrorKind::NonNumericIndex {
                type_name: other.type_name(),
            },
            expr.pos(),
        )),
    }
}
