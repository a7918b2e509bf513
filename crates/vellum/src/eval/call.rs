//! Call and pipeline evaluation
//!
//! Fast callables receive the unevaluated argument expressions through
//! an [`Arguments`] view; native callables get eagerly evaluated,
//! kind-coerced argument values. A pipeline threads each command's
//! result into the next command as its trailing argument; an escape
//! function terminates the pipeline by writing directly to the output.

use crate::ast::{CommandNode, Expr, PipeNode, Pos};
use crate::error::{Error, EvalErrorKind, Result};
use crate::escape::{print_value, EscapeFn, EscapeWriter};
use crate::runtime::Runtime;
use crate::value::{to_float, to_int, to_uint, Arguments, Function, NativeFn, ParamKind, Value};

use super::Evaluate;

/// Invoke a callable with expression arguments and an optional piped
/// value (always trailing).
pub(crate) fn eval_call(
    rt: &mut Runtime<'_>,
    func: &Function,
    args: &[Expr],
    piped: Option<Value>,
    pos: Pos,
) -> Result<Value> {
    match func {
        Function::Fast(fast) => {
            let piped_vals: Vec<Value> = piped.into_iter().collect();
            let f = fast.f.clone();
            let mut arguments = Arguments {
                rt,
                exprs: args,
                vals: &piped_vals,
                name: &fast.name,
                pos,
            };
            f(&mut arguments)
        }
        Function::Native(native) => {
            let mut evaluated = Vec::with_capacity(args.len() + 1);
            for arg in args {
                evaluated.push(arg.eval(rt)?);
            }
            if let Some(v) = piped {
                evaluated.push(v);
            }
            call_native(native, &evaluated, pos)
        }
    }
}

/// Arity-check, coerce per declared parameter kind, and invoke.
fn call_native(native: &NativeFn, args: &[Value], pos: Pos) -> Result<Value> {
    let fixed = native.params.len();
    let arity_ok = if native.variadic.is_some() {
        args.len() >= fixed
    } else {
        args.len() == fixed
    };
    if !arity_ok {
        return Err(Error::eval(
            EvalErrorKind::ArgumentCount {
                name: native.name.to_string(),
            },
            pos,
        ));
    }

    let mut coerced = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
        let kind = if i < fixed {
            native.params[i]
        } else {
            // arity check above guarantees the variadic tail exists
            native.variadic.unwrap_or(ParamKind::Any)
        };
        coerced.push(coerce_param(arg, kind).map_err(|kind| Error::eval(kind, pos))?);
    }

    (native.f)(&coerced).map_err(|message| {
        Error::eval(
            EvalErrorKind::Function {
                name: native.name.to_string(),
                message,
            },
            pos,
        )
    })
}

fn coerce_param(v: &Value, kind: ParamKind) -> std::result::Result<Value, EvalErrorKind> {
    match kind {
        ParamKind::Any => Ok(v.clone()),
        ParamKind::String => Ok(match v {
            Value::String(_) => v.clone(),
            other => Value::string(other.to_string()),
        }),
        ParamKind::Int => to_int(v).map(Value::Int),
        ParamKind::Uint => to_uint(v).map(Value::Uint),
        ParamKind::Float => to_float(v).map(Value::Float),
        ParamKind::Bool => Ok(Value::Bool(v.is_truthy())),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Pipelines
// ═══════════════════════════════════════════════════════════════════════

/// Evaluate a pipeline. Returns the final value and the safe-writer
/// flag: true when an escape command already wrote the output, so the
/// executor must not print again.
pub(crate) fn eval_pipeline(rt: &mut Runtime<'_>, pipe: &PipeNode) -> Result<(Value, bool)> {
    let (mut value, mut safe_writer) = eval_first_command(rt, &pipe.cmds[0])?;
    for cmd in &pipe.cmds[1..] {
        if safe_writer {
            return Err(Error::eval(EvalErrorKind::CommandAfterWriter, cmd.pos));
        }
        let (v, safe) = eval_pipe_command(rt, cmd, value)?;
        value = v;
        safe_writer = safe;
    }
    Ok((value, safe_writer))
}

/// Split a command into callee + arguments when it is one of the two
/// call spellings (`f: a, b` or `f(a, b)`).
fn call_parts<'n>(cmd: &'n CommandNode) -> Option<(&'n Expr, &'n [Expr])> {
    if cmd.call {
        return Some((&cmd.base, &cmd.args));
    }
    if let Expr::Call(call) = &cmd.base {
        return Some((&call.base, &call.args));
    }
    None
}

/// The first command of a pipeline: a call invokes, anything else is a
/// plain expression.
fn eval_first_command(rt: &mut Runtime<'_>, cmd: &CommandNode) -> Result<(Value, bool)> {
    match call_parts(cmd) {
        Some((callee, args)) => {
            let term = callee.eval(rt)?;
            match term {
                Value::Escape(escape) => {
                    eval_escape(rt, escape, args, None)?;
                    Ok((Value::Invalid, true))
                }
                Value::Func(func) => Ok((eval_call(rt, &func, args, None, cmd.pos)?, false)),
                other => Err(Error::eval(
                    EvalErrorKind::NotAFunction {
                        type_name: other.type_name(),
                    },
                    cmd.pos,
                )),
            }
        }
        None => Ok((cmd.base.eval(rt)?, false)),
    }
}

/// A downstream command: must resolve to a callable; the piped value is
/// appended as the trailing argument.
fn eval_pipe_command(
    rt: &mut Runtime<'_>,
    cmd: &CommandNode,
    piped: Value,
) -> Result<(Value, bool)> {
    let (callee, args) = call_parts(cmd).unwrap_or((&cmd.base, &[][..]));
    let term = callee.eval(rt)?;
    match term {
        Value::Escape(escape) => {
            eval_escape(rt, escape, args, Some(piped))?;
            Ok((Value::Invalid, true))
        }
        Value::Func(func) => Ok((eval_call(rt, &func, args, Some(piped), cmd.pos)?, false)),
        other => Err(Error::eval(
            EvalErrorKind::NotAFunction {
                type_name: other.type_name(),
            },
            cmd.pos,
        )),
    }
}

/// Write the command's values through an escape writer over the current
/// output.
fn eval_escape(
    rt: &mut Runtime<'_>,
    escape: EscapeFn,
    args: &[Expr],
    piped: Option<Value>,
) -> Result<()> {
    let mut values = Vec::with_capacity(args.len() + 1);
    for arg in args {
        values.push(arg.eval(rt)?);
    }
    if let Some(v) = piped {
        values.push(v);
    }
    let mut ew = EscapeWriter::new(&mut *rt.writer, escape);
    for v in &values {
        print_value(&mut ew, v)?;
    }
    Ok(())
}
