//! # Vellum
//!
//! A composable text-templating engine: a tree-walking runtime that
//! evaluates expressions over caller-supplied data, resolves template
//! composition (extension, inclusion, imports, blocks, yields) and
//! streams rendered output into any writer.
//!
//! ## Quick start
//!
//! ```
//! use vellum::{Set, Value, VarMap};
//!
//! let set = Set::new();
//! set.cache("/hello", "Hello {{ name }}!").unwrap();
//!
//! let tmpl = set.get_template("/hello").unwrap();
//! let mut out = Vec::new();
//! tmpl.execute(&mut out, &VarMap::new().with("name", "world"), Value::Nil)
//!     .unwrap();
//! assert_eq!(out, b"Hello world!");
//! ```
//!
//! ## Architecture
//!
//! - **Value model**: a dynamic tagged union ([`Value`]) with numeric
//!   widening, structural equality and kind-zero truthiness
//! - **Scope chain**: an index-linked frame arena with a globals table
//!   and a read-only defaults layer
//! - **Evaluator**: recursive dispatch on expression node kind, with a
//!   unified field/index resolver and pipeline composition
//! - **Executor**: statement interpretation, block overriding through
//!   the extends chain, and content-yielding continuations
//! - **Escape pipeline**: a writer wrapper with a pluggable transform,
//!   selectable per-expression (`{{ v | safeHtml }}`)

#![warn(missing_docs)]
#![warn(clippy::all)]

mod ast;
mod builtins;
mod error;
mod escape;
mod eval;
mod exec;
mod lexer;
mod parser;
mod ranger;
mod runtime;
mod scope;
mod template;
mod value;

pub use ast::Pos;
pub use error::{Error, EvalError, EvalErrorKind, ParseError, Result};
pub use escape::{noop_escape, safe_html, safe_js, EscapeFn, EscapeWriter};
pub use ranger::Ranger;
pub use runtime::Runtime;
pub use template::{Set, SetBuilder, Template, VarMap};
pub use value::{
    Arguments, FastFn, Function, Iterable, MapKey, NativeFn, ParamKind, Record, Renderer, Value,
    ValueMap,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
