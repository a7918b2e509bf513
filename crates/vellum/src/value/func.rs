//! Callable value types and the argument view passed to fast functions

use std::fmt;
use std::io;
use std::sync::Arc;

use crate::ast::{Expr, Pos};
use crate::error::{Error, EvalErrorKind, Result};
use crate::eval::Evaluate;
use crate::ranger::Ranger;
use crate::runtime::Runtime;

use super::{Record, Value};

/// Pointer type for fast functions.
pub type FastFnPtr =
    Arc<dyn Fn(&mut Arguments<'_, '_>) -> Result<Value> + Send + Sync>;

/// Pointer type for native functions and methods.
pub type NativeFnPtr =
    Arc<dyn Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync>;

/// A callable template value.
///
/// Callables come in two flavors. A [`Fast`](Function::Fast) function
/// receives an [`Arguments`] view carrying the unevaluated argument
/// expressions plus the runtime, so it can evaluate lazily, inspect
/// `isset`-ness, or drive template execution itself. A
/// [`Native`](Function::Native) function declares its parameter kinds;
/// the evaluator evaluates and coerces arguments eagerly before the call.
#[derive(Clone)]
pub enum Function {
    /// Arguments-driven callable
    Fast(FastFn),
    /// Eager callable with declared parameter kinds
    Native(NativeFn),
}

impl Function {
    /// Wrap a fast function.
    pub fn fast<F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(&mut Arguments<'_, '_>) -> Result<Value> + Send + Sync + 'static,
    {
        Function::Fast(FastFn {
            name: name.into(),
            f: Arc::new(f),
        })
    }

    /// Wrap a native function with fixed parameters.
    pub fn native<F>(name: impl Into<Arc<str>>, params: &[ParamKind], f: F) -> Self
    where
        F: Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        Function::Native(NativeFn {
            name: name.into(),
            params: params.into(),
            variadic: None,
            f: Arc::new(f),
        })
    }

    /// Wrap a variadic native function: `params` is the fixed prefix,
    /// trailing arguments are coerced to `rest`.
    pub fn variadic<F>(
        name: impl Into<Arc<str>>,
        params: &[ParamKind],
        rest: ParamKind,
        f: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        Function::Native(NativeFn {
            name: name.into(),
            params: params.into(),
            variadic: Some(rest),
            f: Arc::new(f),
        })
    }

    /// The callable's name, for error messages.
    pub fn name(&self) -> &str {
        match self {
            Function::Fast(f) => &f.name,
            Function::Native(f) => &f.name,
        }
    }
}

/// Declared parameter kind of a native callable; eager arguments are
/// coerced to it before the call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    /// No coercion
    Any,
    /// Default textual representation
    String,
    /// Signed integer coercion
    Int,
    /// Unsigned integer coercion
    Uint,
    /// Float coercion
    Float,
    /// Truthiness
    Bool,
}

/// A fast callable: receives [`Arguments`] directly.
#[derive(Clone)]
pub struct FastFn {
    pub(crate) name: Arc<str>,
    pub(crate) f: FastFnPtr,
}

impl fmt::Debug for FastFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FastFn({})", self.name)
    }
}

/// A native callable with declared parameter kinds and a variadic flag.
#[derive(Clone)]
pub struct NativeFn {
    pub(crate) name: Arc<str>,
    pub(crate) params: Arc<[ParamKind]>,
    pub(crate) variadic: Option<ParamKind>,
    pub(crate) f: NativeFnPtr,
}

impl NativeFn {
    /// True when trailing arguments beyond the fixed prefix are accepted.
    pub fn is_variadic(&self) -> bool {
        self.variadic.is_some()
    }

    /// Number of fixed parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFn({}/{})", self.name, self.params.len())
    }
}

/// A record method. Resolving it through field access binds the receiver
/// and yields a variadic callable.
#[derive(Clone)]
pub struct Method {
    name: Arc<str>,
    f: Arc<dyn Fn(&Record, &[Value]) -> std::result::Result<Value, String> + Send + Sync>,
}

impl Method {
    pub(crate) fn new<F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(&Record, &[Value]) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        Method {
            name: name.into(),
            f: Arc::new(f),
        }
    }

    /// Bind the receiver, producing a callable value.
    pub(crate) fn bind(&self, recv: Arc<Record>) -> Function {
        let f = self.f.clone();
        Function::Native(NativeFn {
            name: self.name.clone(),
            params: Arc::from([]),
            variadic: Some(ParamKind::Any),
            f: Arc::new(move |args| f(&recv, args)),
        })
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Method({})", self.name)
    }
}

/// A value that renders itself. An action whose pipeline produces a
/// renderer invokes it instead of printing through the escape writer.
pub trait Renderer: Send + Sync {
    /// Write the rendered form to the output.
    fn render(&self, out: &mut dyn io::Write) -> io::Result<()>;

    /// Truthiness override; renderers default to truthy.
    fn is_truthy(&self) -> bool {
        true
    }
}

/// A value that can be ranged over. Each `range` statement obtains a
/// fresh, single-pass [`Ranger`].
pub trait Iterable: Send + Sync {
    /// Produce a fresh cursor positioned before the first element.
    fn ranger(&self) -> Box<dyn Ranger>;
}

/// The argument view handed to fast functions.
///
/// Holds the unevaluated argument expressions, any value piped in by the
/// enclosing pipeline (always trailing), and the runtime itself.
pub struct Arguments<'a, 'r> {
    pub(crate) rt: &'a mut Runtime<'r>,
    pub(crate) exprs: &'a [Expr],
    pub(crate) vals: &'a [Value],
    pub(crate) name: &'a str,
    pub(crate) pos: Pos,
}

impl<'a, 'r> Arguments<'a, 'r> {
    /// Evaluate and return the i-th argument. Out-of-range indices
    /// produce `Value::Invalid`.
    pub fn get(&mut self, i: usize) -> Result<Value> {
        if i < self.exprs.len() {
            return self.exprs[i].eval(self.rt);
        }
        Ok(self
            .vals
            .get(i - self.exprs.len())
            .cloned()
            .unwrap_or(Value::Invalid))
    }

    /// Total number of arguments, piped value included.
    pub fn num_of_arguments(&self) -> usize {
        self.exprs.len() + self.vals.len()
    }

    /// Whether the i-th argument resolves to a valid, non-nil value.
    /// Behaves like the `isset` builtin; never raises.
    pub fn is_set(&mut self, i: usize) -> bool {
        if i < self.exprs.len() {
            return crate::eval::is_set(self.rt, &self.exprs[i]);
        }
        match self.vals.get(i - self.exprs.len()) {
            Some(v) => !matches!(v, Value::Invalid | Value::Nil),
            None => false,
        }
    }

    /// Fail unless the argument count is within `[min, max]`; pass -1
    /// for an unbounded side.
    pub fn require_num_of_arguments(&self, name: &str, min: i32, max: i32) -> Result<()> {
        let n = self.num_of_arguments() as i32;
        if (min >= 0 && n < min) || (max >= 0 && n > max) {
            return Err(Error::eval(
                EvalErrorKind::ArgumentCount {
                    name: name.to_string(),
                },
                self.pos,
            ));
        }
        Ok(())
    }

    /// The runtime executing the enclosing template.
    pub fn runtime(&mut self) -> &mut Runtime<'r> {
        &mut *self.rt
    }

    /// Build a positioned error blaming this call.
    pub fn error(&self, message: impl Into<String>) -> Error {
        Error::eval(
            EvalErrorKind::Function {
                name: self.name.to_string(),
                message: message.into(),
            },
            self.pos,
        )
    }
}
