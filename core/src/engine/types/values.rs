//! Runtime value types

use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Runtime value type
///
/// Whether a value is a stream is decided by whoever produced it (see
/// [`StreamValue::channel`]), never inferred from its shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Obj(HashMap<String, Val>),
    Stream(StreamValue),
}

impl Val {
    /// Check if value is truthy (for conditionals)
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Null => false,
            Val::Bool(b) => *b,
            Val::Num(n) => *n != 0.0 && !n.is_nan(),
            Val::Str(s) => !s.is_empty(),
            Val::Obj(_) | Val::Stream(_) => true,
        }
    }

    /// Empty object, the usual first step before setting nested fields
    pub fn obj() -> Self {
        Val::Obj(HashMap::new())
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Val::Null | Val::Stream(_) => JsonValue::Null,
            Val::Bool(b) => JsonValue::Bool(*b),
            Val::Num(n) if n.fract() == 0.0 && n.abs() < 1e15 => JsonValue::from(*n as i64),
            Val::Num(n) => serde_json::Number::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Val::Str(s) => JsonValue::String(s.clone()),
            Val::Obj(map) => {
                // Sorted so output never depends on hash or feature-driven map order
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
                JsonValue::Object(
                    entries
                        .into_iter()
                        .map(|(k, v)| (k.clone(), v.to_json()))
                        .collect(),
                )
            }
        }
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Null => f.write_str("null"),
            Val::Bool(b) => write!(f, "{}", b),
            Val::Num(n) => f.write_str(&format_num(*n)),
            Val::Str(s) => f.write_str(s),
            Val::Obj(_) => write!(f, "{}", self.to_json()),
            Val::Stream(_) => f.write_str("[stream]"),
        }
    }
}

/// Integral numbers print without a fractional part
pub(crate) fn format_num(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/* ===================== Conversions ===================== */

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::Str(s.to_string())
    }
}

impl From<String> for Val {
    fn from(s: String) -> Self {
        Val::Str(s)
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Self {
        Val::Bool(b)
    }
}

impl From<f64> for Val {
    fn from(n: f64) -> Self {
        Val::Num(n)
    }
}

impl From<i64> for Val {
    fn from(n: i64) -> Self {
        Val::Num(n as f64)
    }
}

impl From<i32> for Val {
    fn from(n: i32) -> Self {
        Val::Num(n as f64)
    }
}

impl From<HashMap<String, Val>> for Val {
    fn from(map: HashMap<String, Val>) -> Self {
        Val::Obj(map)
    }
}

/// JSON arrays become objects keyed by index, so `items.0` addresses the
/// first element.
impl From<JsonValue> for Val {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Val::Null,
            JsonValue::Bool(b) => Val::Bool(b),
            JsonValue::Number(n) => n.as_f64().map(Val::Num).unwrap_or(Val::Null),
            JsonValue::String(s) => Val::Str(s),
            JsonValue::Array(items) => Val::Obj(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), Val::from(v)))
                    .collect(),
            ),
            JsonValue::Object(map) => {
                Val::Obj(map.into_iter().map(|(k, v)| (k, Val::from(v))).collect())
            }
        }
    }
}

/* ===================== Streams ===================== */

/// Producer of a lazy sequence of text chunks
///
/// Cloning shares the same underlying stream; it can be piped only once.
#[derive(Clone)]
pub struct StreamValue {
    reader: Arc<Mutex<Option<UnboundedReceiver<String>>>>,
}

impl StreamValue {
    /// Create a stream value and the writer that feeds it
    pub fn channel() -> (StreamWriter, Val) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = StreamValue {
            reader: Arc::new(Mutex::new(Some(rx))),
        };
        (StreamWriter { tx }, Val::Stream(stream))
    }

    /// Take the reading end; `None` once it has been taken
    pub(crate) fn take_reader(&self) -> Option<UnboundedReceiver<String>> {
        self.reader.lock().ok().and_then(|mut reader| reader.take())
    }
}

impl fmt::Debug for StreamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StreamValue")
    }
}

impl PartialEq for StreamValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.reader, &other.reader)
    }
}

/// Writing end of a [`StreamValue`]
///
/// The stream ends when the writer is ended or dropped.
#[derive(Debug)]
pub struct StreamWriter {
    tx: UnboundedSender<String>,
}

impl StreamWriter {
    /// Push a chunk; returns false if the reading side is gone
    pub fn write(&self, chunk: impl Into<String>) -> bool {
        self.tx.send(chunk.into()).is_ok()
    }

    pub fn end(self) {}
}
