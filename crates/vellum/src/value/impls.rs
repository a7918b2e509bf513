//! Value constructors, predicates, extractors, From traits, PartialEq

use std::sync::Arc;

use super::coerce::{is_true, to_float, to_int, to_uint};
use super::{MapKey, Record, Value, ValueMap};

// ═══════════════════════════════════════════════════════════════════
// Convenience Constructors
// ═══════════════════════════════════════════════════════════════════

impl Value {
    /// Create a string value.
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    /// Create a sequence value.
    pub fn sequence(items: Vec<Value>) -> Self {
        Value::Sequence(Arc::new(items))
    }

    /// Create a mapping value from key/value pairs.
    pub fn mapping(entries: impl IntoIterator<Item = (MapKey, Value)>) -> Self {
        Value::Mapping(Arc::new(entries.into_iter().collect::<ValueMap>()))
    }

    /// Create a record value.
    pub fn record(record: Record) -> Self {
        Value::Record(Arc::new(record))
    }

    /// Create a renderer value.
    pub fn renderer(r: impl super::Renderer + 'static) -> Self {
        Value::Renderer(Arc::new(r))
    }

    /// Create an iterable value.
    pub fn iterable(it: impl super::Iterable + 'static) -> Self {
        Value::Iterable(Arc::new(it))
    }

    // ═══════════════════════════════════════════════════════════════════
    // Predicates
    // ═══════════════════════════════════════════════════════════════════

    /// True for `Invalid` — the absence of a value.
    pub fn is_invalid(&self) -> bool {
        matches!(self, Value::Invalid)
    }

    /// True for `Nil`.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// True for any numeric kind.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Uint(_) | Value::Float(_))
    }

    /// True for the float kind specifically.
    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    /// Truthiness: not the zero value of the kind.
    pub fn is_truthy(&self) -> bool {
        is_true(self)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Extractors
    // ═══════════════════════════════════════════════════════════════════

    /// View as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// View as a sequence slice.
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Extract a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract a signed integer without coercion.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Uint(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Extract a float, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            Value::Uint(n) => Some(*n as f64),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// From Conversions
// ═══════════════════════════════════════════════════════════════════

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Uint(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::record(r)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::sequence(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Nil,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Structural Equality
// ═══════════════════════════════════════════════════════════════════

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        values_equal(self, other)
    }
}

/// Structural equality with left-kind numeric coercion: the left side's
/// kind picks the comparison, the right side is coerced through it.
/// Callables never compare equal.
pub(crate) fn values_equal(left: &Value, right: &Value) -> bool {
    match left {
        Value::Invalid => right.is_invalid(),
        Value::Nil => right.is_nil(),
        Value::Int(a) => to_int(right).map(|b| *a == b).unwrap_or(false),
        Value::Uint(a) => to_uint(right).map(|b| *a == b).unwrap_or(false),
        Value::Float(a) => to_float(right).map(|b| *a == b).unwrap_or(false),
        Value::Bool(a) => *a == is_true(right),
        Value::String(a) => match right {
            Value::String(b) => a == b,
            _ => false,
        },
        Value::Sequence(a) => match right {
            Value::Sequence(b) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
            }
            _ => false,
        },
        Value::Mapping(a) => match right {
            Value::Mapping(b) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).map(|w| values_equal(v, w)).unwrap_or(false))
            }
            _ => false,
        },
        Value::Record(a) => match right {
            Value::Record(b) => {
                a.type_name() == b.type_name()
                    && a.fields().len() == b.fields().len()
                    && a.fields().iter().all(|(name, v)| {
                        b.field(name).map(|w| values_equal(v, w)).unwrap_or(false)
                    })
            }
            _ => false,
        },
        Value::Func(_) => false,
        Value::Escape(a) => match right {
            Value::Escape(b) => std::ptr::fn_addr_eq(*a, *b),
            _ => false,
        },
        Value::Renderer(a) => match right {
            Value::Renderer(b) => Arc::ptr_eq(a, b),
            _ => false,
        },
        Value::Iterable(a) => match right {
            Value::Iterable(b) => Arc::ptr_eq(a, b),
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_equality_coerces_through_left_kind() {
        assert_eq!(Value::Int(3), Value::Uint(3));
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_eq!(Value::Float(3.5), Value::Float(3.5));
        assert_eq!(Value::Int(3), Value::string("3"));
        assert_ne!(Value::Int(3), Value::Int(4));
    }

    #[test]
    fn string_equality_is_exact() {
        assert_eq!(Value::string("a"), Value::string("a"));
        assert_ne!(Value::string("3"), Value::Int(3));
    }

    #[test]
    fn bool_compares_against_truthiness() {
        assert_eq!(Value::Bool(true), Value::Int(1));
        assert_eq!(Value::Bool(false), Value::string(""));
    }

    #[test]
    fn sequences_compare_elementwise() {
        let a = Value::sequence(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::sequence(vec![Value::Int(1), Value::Int(2)]);
        let c = Value::sequence(vec![Value::Int(1)]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn mappings_compare_by_key() {
        let a = Value::mapping([(MapKey::from("x"), Value::Int(1))]);
        let b = Value::mapping([(MapKey::from("x"), Value::Int(1))]);
        let c = Value::mapping([(MapKey::from("y"), Value::Int(1))]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn records_compare_by_type_and_fields() {
        let a = Value::record(Record::new("User").with_field("Name", "Ann"));
        let b = Value::record(Record::new("User").with_field("Name", "Ann"));
        let c = Value::record(Record::new("Account").with_field("Name", "Ann"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn callables_never_compare_equal() {
        let f = Value::Func(crate::value::Function::native(
            "id",
            &[crate::value::ParamKind::Any],
            |args| Ok(args[0].clone()),
        ));
        assert_ne!(f.clone(), f);
    }

    #[test]
    fn invalid_and_nil_are_distinct() {
        assert_eq!(Value::Invalid, Value::Invalid);
        assert_eq!(Value::Nil, Value::Nil);
        assert_ne!(Value::Invalid, Value::Nil);
    }
}
