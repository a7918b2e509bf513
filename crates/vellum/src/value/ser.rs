//! serde support for Value, backing the `json` and `writeJson` builtins

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::Value;

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Invalid | Value::Nil => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Uint(n) => serializer.serialize_u64(*n),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::String(s) => serializer.serialize_str(s),
            Value::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Mapping(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map.iter() {
                    m.serialize_entry(&k.to_string(), v)?;
                }
                m.end()
            }
            Value::Record(r) => {
                let mut m = serializer.serialize_map(Some(r.fields().len()))?;
                for (k, v) in r.fields().iter() {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
            // Capabilities have no data representation
            Value::Func(_) | Value::Escape(_) | Value::Renderer(_) | Value::Iterable(_) => {
                serializer.serialize_unit()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{MapKey, Record};

    #[test]
    fn scalars_encode() {
        assert_eq!(serde_json::to_string(&Value::Nil).unwrap(), "null");
        assert_eq!(serde_json::to_string(&Value::Int(-2)).unwrap(), "-2");
        assert_eq!(
            serde_json::to_string(&Value::string("a\"b")).unwrap(),
            r#""a\"b""#
        );
    }

    #[test]
    fn composites_encode() {
        let seq = Value::sequence(vec![Value::Int(1), Value::Bool(true)]);
        assert_eq!(serde_json::to_string(&seq).unwrap(), "[1,true]");

        let map = Value::mapping([(MapKey::from("k"), Value::Int(1))]);
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"k":1}"#);
    }

    #[test]
    fn records_encode_as_objects() {
        let user = Value::record(
            Record::new("User")
                .with_field("Name", "Mario Santos")
                .with_field("Email", "mario@gmail.com"),
        );
        assert_eq!(
            serde_json::to_string(&user).unwrap(),
            r#"{"Name":"Mario Santos","Email":"mario@gmail.com"}"#
        );
    }
}
