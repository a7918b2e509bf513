//! Escape functions and the escape-wrapping output writer

use std::io::{self, Write};

use crate::value::Value;

/// An output transform. Escape functions are plain function pointers so
/// they are `Copy`, comparable, and selectable as values inside a
/// pipeline (`{{ v | safeHtml }}`).
pub type EscapeFn = fn(&mut dyn Write, &[u8]) -> io::Result<()>;

/// Pass-through escape; the default for plain sets.
pub fn noop_escape(w: &mut dyn Write, b: &[u8]) -> io::Result<()> {
    w.write_all(b)
}

/// HTML escape: `< > & ' "` become entities.
pub fn safe_html(w: &mut dyn Write, b: &[u8]) -> io::Result<()> {
    let mut start = 0;
    for (i, byte) in b.iter().enumerate() {
        let entity: &[u8] = match byte {
            b'<' => b"&lt;",
            b'>' => b"&gt;",
            b'&' => b"&amp;",
            b'\'' => b"&#39;",
            b'"' => b"&#34;",
            _ => continue,
        };
        w.write_all(&b[start..i])?;
        w.write_all(entity)?;
        start = i + 1;
    }
    w.write_all(&b[start..])
}

/// JavaScript string escape: quotes and backslashes are
/// backslash-escaped, `< > &` and non-printable input become `\uXXXX`
/// sequences so the output is safe inside a script context.
pub fn safe_js(w: &mut dyn Write, b: &[u8]) -> io::Result<()> {
    let text = String::from_utf8_lossy(b);
    for c in text.chars() {
        match c {
            '\\' => w.write_all(b"\\\\")?,
            '\'' => w.write_all(b"\\'")?,
            '"' => w.write_all(b"\\\"")?,
            '\n' => w.write_all(b"\\n")?,
            '\r' => w.write_all(b"\\r")?,
            '\t' => w.write_all(b"\\t")?,
            '<' => w.write_all(b"\\u003C")?,
            '>' => w.write_all(b"\\u003E")?,
            '&' => w.write_all(b"\\u0026")?,
            c if c.is_ascii_graphic() || c == ' ' => {
                let mut buf = [0u8; 4];
                w.write_all(c.encode_utf8(&mut buf).as_bytes())?;
            }
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    write!(w, "\\u{:04X}", unit)?;
                }
            }
        }
    }
    Ok(())
}

/// Percent-encode a string for use inside a query component: unreserved
/// characters pass, space becomes `+`, everything else `%XX`.
pub(crate) fn url_query_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// HTML-escape into an owned string (the `html` builtin).
pub(crate) fn html_escape_str(s: &str) -> String {
    let mut out = Vec::with_capacity(s.len());
    // Writing to a Vec cannot fail
    let _ = safe_html(&mut out, s.as_bytes());
    String::from_utf8(out).unwrap_or_default()
}

/// A writer that routes everything through an escape function before it
/// reaches the underlying sink.
pub struct EscapeWriter<'a> {
    w: &'a mut dyn Write,
    escape: EscapeFn,
}

impl<'a> EscapeWriter<'a> {
    /// Wrap a sink with an escape transform.
    pub fn new(w: &'a mut dyn Write, escape: EscapeFn) -> Self {
        EscapeWriter { w, escape }
    }
}

impl Write for EscapeWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (self.escape)(self.w, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.w.flush()
    }
}

/// Print a value into a writer using its default textual representation.
/// Strings skip the formatting machinery; `Invalid` prints nothing.
pub(crate) fn print_value(w: &mut dyn Write, v: &Value) -> io::Result<()> {
    match v {
        Value::Invalid => Ok(()),
        Value::String(s) => w.write_all(s.as_bytes()),
        other => write!(w, "{}", other),
    }
}
