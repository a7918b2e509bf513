//! Dynamic value representation for template data

mod coerce;
mod display;
mod func;
mod impls;
mod key;
mod ser;

pub use func::{Arguments, FastFn, Function, Iterable, NativeFn, ParamKind, Renderer};
pub use key::MapKey;

pub(crate) use coerce::{is_true, to_float, to_int, to_uint};
pub(crate) use impls::values_equal;

use std::sync::Arc;

use indexmap::IndexMap;

use crate::escape::EscapeFn;

/// The keyed mapping payload: insertion-ordered, hashable-key subset.
pub type ValueMap = IndexMap<MapKey, Value>;

/// A dynamically-typed template value.
///
/// Values come in three tiers:
/// - inline scalars (no allocation),
/// - `Arc`-wrapped composites (cheap to clone, safe to share across
///   runtimes through a set's globals),
/// - capabilities: callables, escape functions, renderers, iterables.
///
/// `Invalid` is the absence of a value — the result of a missing map key
/// or an unresolved name — and is distinct from `Nil`, which is a value.
#[derive(Clone)]
pub enum Value {
    /// The absence of a value; never printed by an action
    Invalid,

    /// The nil value
    Nil,

    /// Boolean
    Bool(bool),

    /// Signed 64-bit integer
    Int(i64),

    /// Unsigned 64-bit integer
    Uint(u64),

    /// 64-bit float
    Float(f64),

    /// Immutable string
    String(Arc<str>),

    /// Ordered, indexable sequence
    Sequence(Arc<Vec<Value>>),

    /// Keyed mapping; iteration order is stable within one pass
    Mapping(Arc<ValueMap>),

    /// Named fields with optional methods
    Record(Arc<Record>),

    /// A callable (fast or native flavor)
    Func(Function),

    /// An escape transform, selectable as the terminal pipeline command
    Escape(EscapeFn),

    /// A value that writes itself instead of being printed
    Renderer(Arc<dyn Renderer>),

    /// A value that produces its own ranger for `range` statements
    Iterable(Arc<dyn Iterable>),
}

/// A record: a named type with ordered fields and optional methods.
///
/// Records are how host data with behavior enters the template: fields
/// resolve through `.name` access, methods resolve first and bind the
/// receiver, producing a callable.
#[derive(Clone)]
pub struct Record {
    type_name: Arc<str>,
    fields: IndexMap<String, Value>,
    methods: IndexMap<String, func::Method>,
}

impl Record {
    /// Create an empty record of the given type name.
    pub fn new(type_name: impl Into<Arc<str>>) -> Self {
        Record {
            type_name: type_name.into(),
            fields: IndexMap::new(),
            methods: IndexMap::new(),
        }
    }

    /// Add a field, builder style.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Add a method, builder style. The closure receives the record the
    /// method was resolved on and the evaluated call arguments.
    pub fn with_method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Record, &[Value]) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        let name = name.into();
        self.methods
            .insert(name.clone(), func::Method::new(name, f));
        self
    }

    /// The record's type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Number of fields.
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub(crate) fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    pub(crate) fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    pub(crate) fn method(&self, name: &str) -> Option<&func::Method> {
        self.methods.get(name)
    }
}

impl Value {
    /// A short type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Invalid => "<invalid>",
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
            Value::Record(_) => "record",
            Value::Func(_) => "function",
            Value::Escape(_) => "escape function",
            Value::Renderer(_) => "renderer",
            Value::Iterable(_) => "iterable",
        }
    }
}
