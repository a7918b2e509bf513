//! Error types for template parsing and rendering

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::ast::Pos;

/// Result type alias for vellum operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type returned by [`Set`](crate::Set) and
/// [`Template::execute`](crate::Template::execute).
#[derive(Error, Debug)]
pub enum Error {
    /// The requested template is not cached and could not be loaded.
    ///
    /// This is the only error the `includeIfExists` builtin recovers from.
    #[error("template {path:?} could not be found")]
    TemplateNotFound {
        /// The path as requested (before suffix trials)
        path: String,
    },

    /// The template source failed to parse.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// An expression or statement failed during rendering.
    #[error(transparent)]
    Eval(#[from] EvalError),

    /// The output writer reported an I/O failure.
    #[error("error writing rendered output: {0}")]
    Write(#[from] std::io::Error),

    /// A user-supplied template function panicked.
    #[error("panic in template function: {0}")]
    UserPanic(String),

    /// The [`Set`](crate::Set) owning this template was dropped.
    #[error("the set owning this template was dropped before execution")]
    SetReleased,
}

impl Error {
    pub(crate) fn eval(kind: EvalErrorKind, pos: Pos) -> Self {
        Error::Eval(EvalError {
            kind,
            pos: Some(pos),
            template: None,
        })
    }

    /// Attach the owning template path to a positioned evaluation error
    /// that does not carry one yet.
    pub(crate) fn in_template(mut self, path: &Arc<str>) -> Self {
        if let Error::Eval(err) = &mut self {
            if err.template.is_none() {
                err.template = Some(path.clone());
            }
        }
        self
    }
}

/// A syntax error produced by the template parser.
#[derive(Error, Debug, Clone)]
#[error("{path}:{line}:{column}: {message}")]
pub struct ParseError {
    /// Path of the template being parsed
    pub path: String,
    /// 1-based source line
    pub line: u32,
    /// 1-based source column
    pub column: u32,
    /// What went wrong
    pub message: String,
}

/// A runtime error raised while evaluating an expression or statement.
///
/// Carries the node position and, once it crosses a template boundary,
/// the path of the template it was raised in.
#[derive(Debug)]
pub struct EvalError {
    /// The failure itself
    pub kind: EvalErrorKind,
    /// Position of the offending node, when available
    pub pos: Option<Pos>,
    /// Path of the template the node belongs to
    pub template: Option<Arc<str>>,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(template) = &self.template {
            write!(f, "{}:", template)?;
        }
        if let Some(pos) = self.pos {
            write!(f, "{}:{}: ", pos.line, pos.column)?;
        }
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for EvalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// The individual failure kinds of an [`EvalError`].
#[derive(Error, Debug)]
pub enum EvalErrorKind {
    /// Identifier resolution came up empty outside an `isset` clause
    #[error("identifier {name:?} is not available in the current scope")]
    UndefinedIdentifier {
        /// The unresolved name
        name: String,
    },

    /// A non-numeric operand reached an arithmetic or comparison operator
    #[error("non-numeric value of type {type_name} in {context} expression")]
    NonNumericOperand {
        /// Which operator family rejected it
        context: &'static str,
        /// Type of the offending value
        type_name: &'static str,
    },

    /// A value could not be coerced to the required numeric kind
    #[error("type {type_name} can't be converted to {target}")]
    CannotConvert {
        /// Type of the value
        type_name: &'static str,
        /// Target kind
        target: &'static str,
    },

    /// A string failed to parse as a number during coercion
    #[error("string {text:?} can't be parsed as {target}")]
    NumberParse {
        /// The string that failed to parse
        text: String,
        /// Target kind
        target: &'static str,
    },

    /// Integer or unsigned division/remainder by zero
    #[error("division by zero")]
    DivisionByZero,

    /// `-` applied to a string operand
    #[error("minus sign is not allowed with strings")]
    MinusOnStrings,

    /// A pipeline or call command resolved to a non-callable value
    #[error("command of type {type_name} is not callable")]
    NotAFunction {
        /// Type of the value found in command position
        type_name: &'static str,
    },

    /// A command followed an escape-function command in the same pipeline
    #[error("unexpected command after a writer command; the writer command must be last")]
    CommandAfterWriter,

    /// `yield`/`block` named a block that no scope frame provides
    #[error("unresolved block {name:?}")]
    UnresolvedBlock {
        /// The missing block name
        name: String,
    },

    /// Field or index access through a nil value
    #[error("nil pointer evaluating nil.{index}")]
    NilAccess {
        /// The index that was being resolved
        index: String,
    },

    /// A named field or method does not exist on the base value
    #[error("there is no field or method {name:?} in {type_name}")]
    NoFieldOrMethod {
        /// The requested member
        name: String,
        /// Type of the base value
        type_name: &'static str,
    },

    /// The index value cannot serve as a key for this base
    #[error("can't evaluate index {index} in type {type_name}")]
    CannotIndex {
        /// Printable form of the index
        index: String,
        /// Type of the base value
        type_name: &'static str,
    },

    /// The index value cannot be used as a map key
    #[error("can't use a value of type {type_name} as a map key")]
    BadMapKey {
        /// Type of the index value
        type_name: &'static str,
    },

    /// Sequence or string index outside `0..len`
    #[error("index out of range: {index}")]
    IndexOutOfRange {
        /// The requested index
        index: i64,
    },

    /// Indexing a sequence or string with a nil value
    #[error("cannot index a sequence or string with nil")]
    NilIndex,

    /// Indexing a sequence or string with a non-numeric value
    #[error("cannot index a sequence or string with a value of type {type_name}")]
    NonNumericIndex {
        /// Type of the index value
        type_name: &'static str,
    },

    /// Slice bounds violate `0 <= lo <= hi <= len`
    #[error("slice bounds out of range [{lo}:{hi}] with length {len}")]
    SliceOutOfRange {
        /// Lower bound
        lo: i64,
        /// Upper bound
        hi: i64,
        /// Length of the sliced value
        len: usize,
    },

    /// Slicing a value that is neither a sequence nor a string
    #[error("can't slice a value of type {type_name}")]
    CannotSlice {
        /// Type of the base value
        type_name: &'static str,
    },

    /// `range` over a value with no iteration protocol
    #[error("type {type_name} is not rangeable")]
    NotRangeable {
        /// Type of the value
        type_name: &'static str,
    },

    /// Call arity outside the callable's declared bounds
    #[error("unexpected number of arguments in a call to {name}")]
    ArgumentCount {
        /// The callable's name
        name: String,
    },

    /// A native or fast function reported a failure
    #[error("in call to {name}: {message}")]
    Function {
        /// The callable's name
        name: String,
        /// Its error message
        message: String,
    },

    /// `include` path expression produced a non-string value
    #[error("unexpected expression of type {type_name} in include path")]
    IncludePath {
        /// Type of the evaluated path value
        type_name: &'static str,
    },

    /// Assignment target is not an identifier, field, or chain path
    #[error("cannot assign to this expression")]
    BadAssignTarget,

    /// Assignment through a path segment that does not support it
    #[error("cannot assign through a value of type {type_name}")]
    BadAssignPath {
        /// Type of the segment value
        type_name: &'static str,
    },
}
