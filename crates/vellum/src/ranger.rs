//! The iteration protocol behind `range` statements

use std::sync::Arc;

use crate::error::EvalErrorKind;
use crate::value::{Value, ValueMap};

/// A single-pass cursor over an iterable value.
///
/// Each call yields the next `(index, value)` pair; `None` ends the
/// iteration. A ranger is obtained fresh per `range` statement and is
/// never rewound.
pub trait Ranger {
    /// Advance and return the next pair, or `None` when exhausted.
    fn next(&mut self) -> Option<(Value, Value)>;
}

/// Obtain a ranger for a value, dispatching on its kind.
pub(crate) fn get_ranger(v: &Value) -> Result<Box<dyn Ranger>, EvalErrorKind> {
    match v {
        Value::Sequence(seq) => Ok(Box::new(SequenceRanger {
            seq: seq.clone(),
            next: 0,
        })),
        Value::Mapping(map) => Ok(Box::new(MappingRanger {
            map: map.clone(),
            next: 0,
        })),
        Value::Iterable(it) => Ok(it.ranger()),
        other => Err(EvalErrorKind::NotRangeable {
            type_name: other.type_name(),
        }),
    }
}

/// Ranges a sequence: indices 0..len, values element-at-index.
struct SequenceRanger {
    seq: Arc<Vec<Value>>,
    next: usize,
}

impl Ranger for SequenceRanger {
    fn next(&mut self) -> Option<(Value, Value)> {
        let i = self.next;
        let value = self.seq.get(i)?.clone();
        self.next += 1;
        Some((Value::Int(i as i64), value))
    }
}

/// Ranges a mapping in its stored order: (key, value) pairs.
struct MappingRanger {
    map: Arc<ValueMap>,
    next: usize,
}

impl Ranger for MappingRanger {
    fn next(&mut self) -> Option<(Value, Value)> {
        let (k, v) = self.map.get_index(self.next)?;
        self.next += 1;
        Some((k.to_value(), v.clone()))
    }
}
