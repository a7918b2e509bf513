//! Default builtins available to every template
//!
//! The table is populated once at first use and read-only afterwards;
//! name resolution falls through to it after the scope chain and the
//! set's globals.

use std::collections::HashMap;
use std::io;
use std::sync::LazyLock;

use crate::error::Error;
use crate::escape::{html_escape_str, noop_escape, safe_html, safe_js, url_query_escape};
use crate::value::{Function, MapKey, ParamKind, Renderer, Value, ValueMap};

static DEFAULTS: LazyLock<HashMap<&'static str, Value>> = LazyLock::new(build_defaults);

/// Look up a default builtin by name.
pub(crate) fn default_variable(name: &str) -> Option<Value> {
    DEFAULTS.get(name).cloned()
}

fn native<F>(name: &'static str, params: &[ParamKind], f: F) -> Value
where
    F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
{
    Value::Func(Function::native(name, params, f))
}

fn fast<F>(name: &'static str, f: F) -> Value
where
    F: Fn(&mut crate::value::Arguments<'_, '_>) -> crate::error::Result<Value>
        + Send
        + Sync
        + 'static,
{
    Value::Func(Function::fast(name, f))
}

fn arg_str(v: &Value) -> &str {
    v.as_str().unwrap_or_default()
}

fn build_defaults() -> HashMap<&'static str, Value> {
    use ParamKind::{Any, Int, String as Str};

    let mut m = HashMap::new();

    m.insert(
        "lower",
        native("lower", &[Str], |args| {
            Ok(Value::string(arg_str(&args[0]).to_lowercase()))
        }),
    );
    m.insert(
        "upper",
        native("upper", &[Str], |args| {
            Ok(Value::string(arg_str(&args[0]).to_uppercase()))
        }),
    );
    m.insert(
        "hasPrefix",
        native("hasPrefix", &[Str, Str], |args| {
            Ok(Value::Bool(arg_str(&args[0]).starts_with(arg_str(&args[1]))))
        }),
    );
    m.insert(
        "hasSuffix",
        native("hasSuffix", &[Str, Str], |args| {
            Ok(Value::Bool(arg_str(&args[0]).ends_with(arg_str(&args[1]))))
        }),
    );
    m.insert(
        "repeat",
        native("repeat", &[Str, Int], |args| {
            let n = args[1].as_int().unwrap_or_default();
            if n < 0 {
                return Err("negative repeat count".to_string());
            }
            Ok(Value::string(arg_str(&args[0]).repeat(n as usize)))
        }),
    );
    m.insert(
        "replace",
        native("replace", &[Str, Str, Str, Int], |args| {
            let s = arg_str(&args[0]);
            let old = arg_str(&args[1]);
            let new = arg_str(&args[2]);
            let n = args[3].as_int().unwrap_or_default();
            let replaced = if n < 0 {
                s.replace(old, new)
            } else {
                s.replacen(old, new, n as usize)
            };
            Ok(Value::string(replaced))
        }),
    );
    m.insert(
        "split",
        native("split", &[Str, Str], |args| {
            let s = arg_str(&args[0]);
            let sep = arg_str(&args[1]);
            let parts: Vec<Value> = if sep.is_empty() {
                s.chars().map(|c| Value::string(c.to_string())).collect()
            } else {
                s.split(sep).map(Value::string).collect()
            };
            Ok(Value::sequence(parts))
        }),
    );
    m.insert(
        "trimSpace",
        native("trimSpace", &[Str], |args| {
            Ok(Value::string(arg_str(&args[0]).trim()))
        }),
    );

    m.insert(
        "map",
        Value::Func(Function::variadic("map", &[], Any, |args| {
            if args.len() % 2 != 0 {
                return Err(format!(
                    "expected an even number of arguments, but got {}",
                    args.len()
                ));
            }
            let mut entries = ValueMap::default();
            for pair in args.chunks(2) {
                entries.insert(MapKey::from(pair[0].to_string()), pair[1].clone());
            }
            Ok(Value::Mapping(entries.into()))
        })),
    );

    m.insert(
        "html",
        native("html", &[Str], |args| {
            Ok(Value::string(html_escape_str(arg_str(&args[0]))))
        }),
    );
    m.insert(
        "url",
        native("url", &[Str], |args| {
            Ok(Value::string(url_query_escape(arg_str(&args[0]))))
        }),
    );

    m.insert("safeHtml", Value::Escape(safe_html));
    m.insert("safeJs", Value::Escape(safe_js));
    m.insert("raw", Value::Escape(noop_escape));
    m.insert("unsafe", Value::Escape(noop_escape));

    m.insert(
        "writeJson",
        native("writeJson", &[Any], |args| {
            Ok(Value::renderer(JsonRenderer(args[0].clone())))
        }),
    );
    m.insert(
        "json",
        native("json", &[Any], |args| {
            serde_json::to_string(&args[0])
                .map(Value::string)
                .map_err(|err| err.to_string())
        }),
    );

    m.insert(
        "len",
        fast("len", |a| {
            a.require_num_of_arguments("len", 1, 1)?;
            let value = a.get(0)?;
            let len = match &value {
                Value::String(s) => s.chars().count(),
                Value::Sequence(seq) => seq.len(),
                Value::Mapping(map) => map.len(),
                Value::Record(record) => record.num_fields(),
                other => {
                    return Err(
                        a.error(format!("invalid value type {} in len builtin", other.type_name()))
                    )
                }
            };
            Ok(Value::Int(len as i64))
        }),
    );

    m.insert(
        "isset",
        fast("isset", |a| {
            a.require_num_of_arguments("isset", 1, -1)?;
            for i in 0..a.num_of_arguments() {
                if !a.is_set(i) {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }),
    );

    m.insert(
        "includeIfExists",
        fast("includeIfExists", |a| {
            a.require_num_of_arguments("includeIfExists", 1, 2)?;
            let path_value = a.get(0)?;
            let path = match path_value.as_str() {
                Some(s) => s.to_string(),
                None => return Err(a.error("path must be a string")),
            };
            let context = if a.num_of_arguments() > 1 {
                Some(a.get(1)?)
            } else {
                None
            };
            match a.runtime().execute_template(&path, context) {
                Ok(_) => Ok(Value::renderer(HiddenBool(true))),
                Err(Error::TemplateNotFound { .. }) => Ok(Value::renderer(HiddenBool(false))),
                // the template exists but failed: surface it
                Err(err) => Err(err),
            }
        }),
    );

    m.insert(
        "exec",
        fast("exec", |a| {
            a.require_num_of_arguments("exec", 1, 2)?;
            let path_value = a.get(0)?;
            let path = match path_value.as_str() {
                Some(s) => s.to_string(),
                None => return Err(a.error("path must be a string")),
            };
            let context = if a.num_of_arguments() > 1 {
                Some(a.get(1)?)
            } else {
                None
            };
            let returned = a.runtime().execute_template_discarding(&path, context)?;
            Ok(returned.unwrap_or(Value::Invalid))
        }),
    );

    m
}

/// The truthy/falsy marker `includeIfExists` yields: renders nothing,
/// carries its own truth.
struct HiddenBool(bool);

impl Renderer for HiddenBool {
    fn render(&self, _out: &mut dyn io::Write) -> io::Result<()> {
        Ok(())
    }

    fn is_truthy(&self) -> bool {
        self.0
    }
}

/// Renderer returned by `writeJson`: encodes straight into the output
/// writer, newline-terminated.
struct JsonRenderer(Value);

impl Renderer for JsonRenderer {
    fn render(&self, out: &mut dyn io::Write) -> io::Result<()> {
        serde_json::to_writer(&mut *out, &self.0).map_err(io::Error::other)?;
        out.write_all(b"\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_by_name() {
        assert!(default_variable("lower").is_some());
        assert!(default_variable("safeHtml").is_some());
        assert!(default_variable("nope").is_none());
    }

    #[test]
    fn escape_defaults_are_escape_values() {
        assert!(matches!(default_variable("raw"), Some(Value::Escape(_))));
        assert!(matches!(default_variable("unsafe"), Some(Value::Escape(_))));
        assert!(matches!(
            default_variable("safeJs"),
            Some(Value::Escape(_))
        ));
    }

    #[test]
    fn hidden_bool_truthiness() {
        assert!(Value::renderer(HiddenBool(true)).is_truthy());
        assert!(!Value::renderer(HiddenBool(false)).is_truthy());
    }
}
