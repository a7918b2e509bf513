//! Display and Debug implementations for Value
//!
//! `Display` is the value-to-text printer used by actions; `Debug` quotes
//! strings and tags the absence kinds for diagnostics.

use std::fmt;

use super::Value;

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Invalid => write!(f, "<invalid>"),
            Value::Nil => write!(f, "<nil>"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Uint(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),

            Value::Sequence(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }

            Value::Mapping(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }

            Value::Record(r) => {
                write!(f, "{} {{", r.type_name())?;
                for (i, (k, v)) in r.fields().iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: {}", k, v)?;
                }
                write!(f, " }}")
            }

            Value::Func(func) => write!(f, "<function {}>", func.name()),
            Value::Escape(_) => write!(f, "<escape function>"),
            Value::Renderer(_) => write!(f, "<renderer>"),
            Value::Iterable(_) => write!(f, "<iterable>"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s.as_ref()),
            Value::Sequence(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}", item)?;
                }
                write!(f, "]")
            }
            Value::Mapping(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {:?}", k, v)?;
                }
                write!(f, "}}")
            }
            other => fmt::Display::fmt(other, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::MapKey;

    #[test]
    fn scalars() {
        assert_eq!(Value::Invalid.to_string(), "<invalid>");
        assert_eq!(Value::Nil.to_string(), "<nil>");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::Uint(3).to_string(), "3");
        assert_eq!(Value::string("hi").to_string(), "hi");
    }

    #[test]
    fn floats_print_shortest_form() {
        assert_eq!(Value::Float(4.92).to_string(), "4.92");
        assert_eq!(Value::Float(4.0).to_string(), "4");
    }

    #[test]
    fn composites() {
        let seq = Value::sequence(vec![Value::Int(1), Value::string("a")]);
        assert_eq!(seq.to_string(), "[1, a]");

        let map = Value::mapping([(MapKey::from("k"), Value::Int(1))]);
        assert_eq!(map.to_string(), "{k: 1}");
    }

    #[test]
    fn debug_quotes_strings() {
        assert_eq!(format!("{:?}", Value::string("hi")), "\"hi\"");
        let seq = Value::sequence(vec![Value::string("a")]);
        assert_eq!(format!("{:?}", seq), "[\"a\"]");
    }

    #[test]
    fn record_display() {
        let user = Value::record(
            crate::value::Record::new("User")
                .with_field("Name", "Ann")
                .with_field("Age", 31i64),
        );
        assert_eq!(user.to_string(), "User { Name: Ann, Age: 31 }");
    }
}
