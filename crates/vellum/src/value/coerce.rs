//! Numeric coercion and truthiness

use crate::error::EvalErrorKind;

use super::Value;

type CoerceResult<T> = std::result::Result<T, EvalErrorKind>;

/// Coerce a value to a signed integer.
///
/// The boolean mapping (true → 0, false → 1) is inherited from the
/// engine this one descends from and is kept as-is.
pub(crate) fn to_int(v: &Value) -> CoerceResult<i64> {
    match v {
        Value::Int(n) => Ok(*n),
        Value::Uint(n) => Ok(*n as i64),
        Value::Float(f) => Ok(*f as i64),
        Value::String(s) => s.parse().map_err(|_| EvalErrorKind::NumberParse {
            text: s.to_string(),
            target: "int",
        }),
        Value::Bool(b) => Ok(if *b { 0 } else { 1 }),
        other => Err(EvalErrorKind::CannotConvert {
            type_name: other.type_name(),
            target: "int",
        }),
    }
}

/// Coerce a value to an unsigned integer. See [`to_int`] for the
/// boolean mapping.
pub(crate) fn to_uint(v: &Value) -> CoerceResult<u64> {
    match v {
        Value::Uint(n) => Ok(*n),
        Value::Int(n) => Ok(*n as u64),
        Value::Float(f) => Ok(*f as u64),
        Value::String(s) => s.parse().map_err(|_| EvalErrorKind::NumberParse {
            text: s.to_string(),
            target: "uint",
        }),
        Value::Bool(b) => Ok(if *b { 0 } else { 1 }),
        other => Err(EvalErrorKind::CannotConvert {
            type_name: other.type_name(),
            target: "uint",
        }),
    }
}

/// Coerce a value to a float. See [`to_int`] for the boolean mapping.
pub(crate) fn to_float(v: &Value) -> CoerceResult<f64> {
    match v {
        Value::Float(f) => Ok(*f),
        Value::Int(n) => Ok(*n as f64),
        Value::Uint(n) => Ok(*n as f64),
        Value::String(s) => s.parse().map_err(|_| EvalErrorKind::NumberParse {
            text: s.to_string(),
            target: "float",
        }),
        Value::Bool(b) => Ok(if *b { 0.0 } else { 1.0 }),
        other => Err(EvalErrorKind::CannotConvert {
            type_name: other.type_name(),
            target: "float",
        }),
    }
}

/// Truthiness: a value is truthy iff it is valid and not the zero value
/// of its kind.
pub(crate) fn is_true(v: &Value) -> bool {
    match v {
        Value::Invalid => false,
        Value::Nil => false,
        Value::Bool(b) => *b,
        Value::Int(n) => *n != 0,
        Value::Uint(n) => *n != 0,
        Value::Float(f) => *f != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Sequence(s) => !s.is_empty(),
        Value::Mapping(m) => !m.is_empty(),
        Value::Record(_) => true,
        Value::Func(_) => true,
        Value::Escape(_) => true,
        Value::Renderer(r) => r.is_truthy(),
        Value::Iterable(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::MapKey;
    use std::sync::Arc;

    #[test]
    fn truthiness_tracks_zero_values() {
        assert!(!is_true(&Value::Invalid));
        assert!(!is_true(&Value::Nil));
        assert!(!is_true(&Value::Bool(false)));
        assert!(!is_true(&Value::Int(0)));
        assert!(!is_true(&Value::Uint(0)));
        assert!(!is_true(&Value::Float(0.0)));
        assert!(!is_true(&Value::string("")));
        assert!(!is_true(&Value::sequence(vec![])));

        assert!(is_true(&Value::Bool(true)));
        assert!(is_true(&Value::Int(-1)));
        assert!(is_true(&Value::Float(0.5)));
        assert!(is_true(&Value::string("x")));
        assert!(is_true(&Value::sequence(vec![Value::Nil])));
    }

    #[test]
    fn empty_mapping_is_falsy() {
        let empty = Value::Mapping(Arc::new(Default::default()));
        assert!(!is_true(&empty));

        let mut m = crate::value::ValueMap::default();
        m.insert(MapKey::from("k"), Value::Int(1));
        assert!(is_true(&Value::Mapping(Arc::new(m))));
    }

    #[test]
    fn string_parses_base_10() {
        assert_eq!(to_int(&Value::string("42")).unwrap(), 42);
        assert_eq!(to_float(&Value::string("1.5")).unwrap(), 1.5);
        assert_eq!(to_uint(&Value::string("7")).unwrap(), 7);
        assert!(to_int(&Value::string("x")).is_err());
    }

    #[test]
    fn bool_coercion_keeps_inherited_mapping() {
        assert_eq!(to_int(&Value::Bool(true)).unwrap(), 0);
        assert_eq!(to_int(&Value::Bool(false)).unwrap(), 1);
        assert_eq!(to_float(&Value::Bool(true)).unwrap(), 0.0);
    }

    #[test]
    fn numeric_widening() {
        assert_eq!(to_float(&Value::Int(4)).unwrap(), 4.0);
        assert_eq!(to_int(&Value::Float(4.9)).unwrap(), 4);
        assert_eq!(to_uint(&Value::Int(3)).unwrap(), 3);
    }

    #[test]
    fn composites_do_not_convert() {
        assert!(to_int(&Value::sequence(vec![])).is_err());
        assert!(to_float(&Value::Nil).is_err());
    }
}
