//! Expression evaluation
//!
//! The evaluator is a recursive dispatch on AST node kind. Every
//! expression yields a [`Value`], possibly `Value::Invalid`; failures
//! abort the enclosing statement with a positioned error.

mod arith;
mod call;
mod resolve;

pub(crate) use call::{eval_call, eval_pipeline};
pub(crate) use resolve::resolve_index;

use crate::ast::{ChainNode, Expr, Number};
use crate::error::{Error, EvalErrorKind, Result};
use crate::runtime::Runtime;
use crate::value::{is_true, Value};

/// Evaluating an AST node against a runtime.
pub(crate) trait Evaluate {
    /// Evaluate this node to a value.
    fn eval(&self, rt: &mut Runtime<'_>) -> Result<Value>;
}

// ═══════════════════════════════════════════════════════════════════════
// Main Expression Dispatcher
// ═══════════════════════════════════════════════════════════════════════

impl Evaluate for Expr {
    fn eval(&self, rt: &mut Runtime<'_>) -> Result<Value> {
        match self {
            Expr::Additive(node) => arith::eval_additive(rt, node),
            Expr::Multiplicative(node) => arith::eval_multiplicative(rt, node),
            Expr::Compare(node) => arith::eval_compare(rt, node),

            Expr::Equality(node) => {
                let left = node.left.eval(rt)?;
                let right = node.right.eval(rt)?;
                let equal = crate::value::values_equal(&left, &right);
                Ok(Value::Bool(equal != node.negated))
            }

            Expr::Logical(node) => {
                let left = is_true(&node.left.eval(rt)?);
                let truthy = if node.and {
                    left && is_true(&node.right.eval(rt)?)
                } else {
                    left || is_true(&node.right.eval(rt)?)
                };
                Ok(Value::Bool(truthy))
            }

            Expr::Not(operand, _) => Ok(Value::Bool(!is_true(&operand.eval(rt)?))),

            Expr::Ternary(node) => {
                if is_true(&node.cond.eval(rt)?) {
                    node.then_expr.eval(rt)
                } else {
                    node.else_expr.eval(rt)
                }
            }

            Expr::Call(node) => {
                let callee = node.base.eval(rt)?;
                match callee {
                    Value::Func(f) => eval_call(rt, &f, &node.args, None, node.pos),
                    other => Err(Error::eval(
                        EvalErrorKind::NotAFunction {
                            type_name: other.type_name(),
                        },
                        node.base.pos(),
                    )),
                }
            }

            Expr::Index(node) => {
                let base = node.base.eval(rt)?;
                let index = node.index.eval(rt)?;
                resolve_index(&base, &index).map_err(|kind| Error::eval(kind, node.pos))
            }

            Expr::Slice(node) => resolve::eval_slice(rt, node),

            _ => eval_base(rt, self),
        }
    }
}

/// Literals, identifiers, fields and chains.
fn eval_base(rt: &mut Runtime<'_>, expr: &Expr) -> Result<Value> {
    match expr {
        Expr::Nil(_) => Ok(Value::Nil),
        Expr::Bool(b, _) => Ok(Value::Bool(*b)),
        Expr::Str(s, _) => Ok(Value::String(s.clone())),
        Expr::Number(n, _) => Ok(match n {
            Number::Int(v) => Value::Int(*v),
            Number::Uint(v) => Value::Uint(*v),
            Number::Float(v) => Value::Float(*v),
        }),

        Expr::Ident(node) => {
            let resolved = rt.resolve(&node.name);
            if resolved.is_invalid() {
                return Err(Error::eval(
                    EvalErrorKind::UndefinedIdentifier {
                        name: node.name.clone(),
                    },
                    node.pos,
                ));
            }
            Ok(resolved)
        }

        Expr::Field(node) => {
            let mut resolved = rt.context.clone();
            for name in &node.names {
                let base_type = resolved.type_name();
                let field = resolve_index(&resolved, &Value::string(name))
                    .map_err(|kind| Error::eval(kind, node.pos))?;
                if field.is_invalid() {
                    return Err(Error::eval(
                        EvalErrorKind::NoFieldOrMethod {
                            name: name.clone(),
                            type_name: base_type,
                        },
                        node.pos,
                    ));
                }
                resolved = field;
            }
            Ok(resolved)
        }

        Expr::Chain(node) => eval_chain(rt, node),

        // dispatched above
        _ => unreachable!("expression dispatched twice"),
    }
}

/// Evaluate `base.a.b`. A missing final segment on a mapping base
/// resolves to `Invalid` instead of failing.
pub(crate) fn eval_chain(rt: &mut Runtime<'_>, node: &ChainNode) -> Result<Value> {
    let mut resolved = node.base.eval(rt)?;
    for (i, name) in node.fields.iter().enumerate() {
        let base_is_mapping = matches!(resolved, Value::Mapping(_));
        let base_type = resolved.type_name();
        let field = resolve_index(&resolved, &Value::string(name))
            .map_err(|kind| Error::eval(kind, node.pos))?;
        if field.is_invalid() {
            if base_is_mapping && i == node.fields.len() - 1 {
                return Ok(Value::Invalid);
            }
            return Err(Error::eval(
                EvalErrorKind::NoFieldOrMethod {
                    name: name.clone(),
                    type_name: base_type,
                },
                node.pos,
            ));
        }
        resolved = field;
    }
    Ok(resolved)
}

/// `isset` semantics: true iff every segment of the expression resolves
/// to a valid, non-nil value. Never raises; resolution failures become
/// `false`. Expressions that are not lookups (literals, arithmetic,
/// calls) are set by definition.
pub(crate) fn is_set(rt: &mut Runtime<'_>, expr: &Expr) -> bool {
    match expr {
        Expr::Index(node) => {
            if !is_set(rt, &node.base) || !is_set(rt, &node.index) {
                return false;
            }
            let base = match node.base.eval(rt) {
                Ok(v) => v,
                Err(_) => return false,
            };
            let index = match node.index.eval(rt) {
                Ok(v) => v,
                Err(_) => return false,
            };
            resolve_index(&base, &index)
                .map(|v| not_nil(&v))
                .unwrap_or(false)
        }
        Expr::Ident(node) => not_nil(&rt.resolve(&node.name)),
        Expr::Field(node) => {
            let mut resolved = rt.context.clone();
            for name in &node.names {
                match resolve_index(&resolved, &Value::string(name)) {
                    Ok(v) if not_nil(&v) => resolved = v,
                    _ => return false,
                }
            }
            true
        }
        Expr::Chain(node) => eval_chain(rt, node).map(|v| not_nil(&v)).unwrap_or(false),
        _ => true,
    }
}

fn not_nil(v: &Value) -> bool {
    !matches!(v, Value::Invalid | Value::Nil)
}
