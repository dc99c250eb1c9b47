use bytes::Bytes;

use crate::frame::{single_line, Frame};

/// The single value type crossing the scripting boundary. Bridge commands produce it, the
/// interpreter adapter converts to and from it, and replies are built from it.
#[derive(Clone, Debug, PartialEq)]
pub enum ScriptValue {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Bytes),
    Array(Vec<ScriptValue>),
    /// `{ok = "..."}` tables, replied as simple strings.
    Status(String),
    /// `{err = "..."}` tables, replied as errors.
    Error(String),
    /// Values with no wire representation (functions, userdata, threads).
    Unsupported(&'static str),
}

impl ScriptValue {
    pub fn str(s: impl Into<String>) -> Self {
        ScriptValue::Str(Bytes::from(s.into()))
    }

    pub fn ok() -> Self {
        ScriptValue::str("OK")
    }
}

impl From<bool> for ScriptValue {
    fn from(b: bool) -> Self {
        ScriptValue::Int(b as i64)
    }
}

impl From<usize> for ScriptValue {
    fn from(n: usize) -> Self {
        ScriptValue::Int(n as i64)
    }
}

impl From<Option<Bytes>> for ScriptValue {
    fn from(value: Option<Bytes>) -> Self {
        value.map_or(ScriptValue::Nil, ScriptValue::Str)
    }
}

impl From<ScriptValue> for Frame {
    fn from(value: ScriptValue) -> Self {
        match value {
            ScriptValue::Nil => Frame::Null,
            ScriptValue::Bool(b) => Frame::Integer(b as i64),
            ScriptValue::Int(i) => Frame::Integer(i),
            ScriptValue::Float(f) => match as_integer(f) {
                Some(i) => Frame::Integer(i),
                None => Frame::Bulk(Bytes::from(f.to_string())),
            },
            ScriptValue::Str(s) => Frame::Bulk(s),
            ScriptValue::Array(values) => {
                Frame::Array(values.into_iter().map(Frame::from).collect())
            }
            ScriptValue::Status(s) => Frame::Simple(single_line(&s).into_owned()),
            ScriptValue::Error(s) => Frame::Error(single_line(&s).into_owned()),
            ScriptValue::Unsupported(_) => Frame::Bulk(Bytes::new()),
        }
    }
}

/// Floats without a fractional part that fit an `i64`.
fn as_integer(f: f64) -> Option<i64> {
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then_some(f as i64)
}
