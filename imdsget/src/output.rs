use std::io;

use anyhow::Result;
use serde::Serialize;
use serde_json::{
  ser::{Formatter, PrettyFormatter},
  Map, Value,
};

const INDENT: &[u8] = b"    ";

/// The JSON body printed in place of metadata when any step fails
#[derive(Debug, Serialize)]
pub struct ErrorValue {
  #[serde(rename = "Error")]
  pub error: String,
}

/// Pretty printer that indents with 4 spaces and escapes everything outside printable ASCII
///
/// Non-ASCII characters are written as `\uXXXX` escapes, using surrogate pairs for characters
/// outside of the basic multilingual plane
struct AsciiFormatter<'a> {
  inner: PrettyFormatter<'a>,
}

impl<'a> AsciiFormatter<'a> {
  fn new() -> Self {
    Self {
      inner: PrettyFormatter::with_indent(INDENT),
    }
  }
}

impl<'a> Formatter for AsciiFormatter<'a> {
  fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
    self.inner.begin_array(writer)
  }

  fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
    self.inner.end_array(writer)
  }

  fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
    self.inner.begin_array_value(writer, first)
  }

  fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
    self.inner.end_array_value(writer)
  }

  fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
    self.inner.begin_object(writer)
  }

  fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
    self.inner.end_object(writer)
  }

  fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
    self.inner.begin_object_key(writer, first)
  }

  fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
    self.inner.begin_object_value(writer)
  }

  fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
    self.inner.end_object_value(writer)
  }

  fn write_string_fragment<W: ?Sized + io::Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
    let mut units = [0u16; 2];
    for c in fragment.chars() {
      if c.is_ascii() && c != '\x7f' {
        writer.write_all(&[c as u8])?;
      } else {
        for unit in c.encode_utf16(&mut units) {
          write!(writer, "\\u{unit:04x}")?;
        }
      }
    }

    Ok(())
  }
}

/// Serialize a value as 4-space indented, ASCII-only JSON
pub fn to_string_pretty<T: Serialize + ?Sized>(value: &T) -> Result<String> {
  let mut buf = Vec::new();
  let mut ser = serde_json::Serializer::with_formatter(&mut buf, AsciiFormatter::new());
  value.serialize(&mut ser)?;

  Ok(String::from_utf8(buf)?)
}

/// Render the error value for the given message
pub fn error_value(message: impl Into<String>) -> String {
  let value = ErrorValue { error: message.into() };

  // A struct holding a single string cannot fail to serialize
  to_string_pretty(&value).unwrap_or_default()
}

/// Produce the text printed to stdout for the fetched metadata
///
/// When a key was requested and the metadata contains it, only that entry is re-rendered.
/// Anything else (including an error value, or text that is not valid JSON) is passed through as-is.
pub fn render(key: Option<&str>, metadata: &str) -> String {
  let key = match key {
    Some(key) if !key.is_empty() => key,
    _ => return metadata.to_owned(),
  };

  let parsed: Value = match serde_json::from_str(metadata) {
    Ok(parsed) => parsed,
    Err(_) => return metadata.to_owned(),
  };

  match parsed.get(key) {
    Some(value) => {
      let mut entry = Map::new();
      entry.insert(key.to_owned(), value.clone());
      to_string_pretty(&entry).unwrap_or_else(|_| metadata.to_owned())
    }
    None => metadata.to_owned(),
  }
}
