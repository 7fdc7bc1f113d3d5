//! The `text/x-turbo` streaming serialization format.
//!
//! A turbo stream is a sequence of newline separated lines.  The first
//! line describes the root value as a flattened table of entries where
//! containers refer to their members by index, which allows repeated
//! strings to be shared.  Values that are not known when the first line is
//! written are sent as promises, and later lines of the form `P<id>:...`
//! or `E<id>:...` resolve or reject them, extending the same table.
//!
//! Decoding is pull-driven: [`decode`] returns as soon as the root line is
//! available, and awaiting a [`Deferred`] found inside the root reads as
//! many further lines as required for that promise to settle.

use std::{fmt, rc::Rc};

use indexmap::IndexMap;

mod decode;
mod encode;

pub use decode::{decode, DecodeError, Decoded, Deferred, Settled};
pub use encode::{encode, EncodeError};

pub(crate) const HOLE: i64 = -1;
pub(crate) const NAN: i64 = -2;
pub(crate) const NEGATIVE_INFINITY: i64 = -3;
pub(crate) const NEGATIVE_ZERO: i64 = -4;
pub(crate) const NULL: i64 = -5;
pub(crate) const POSITIVE_INFINITY: i64 = -6;
pub(crate) const UNDEFINED: i64 = -7;

pub(crate) const TYPE_BIGINT: &str = "B";
pub(crate) const TYPE_DATE: &str = "D";
pub(crate) const TYPE_ERROR: &str = "E";
pub(crate) const TYPE_MAP: &str = "M";
pub(crate) const TYPE_NULL_OBJECT: &str = "N";
pub(crate) const TYPE_PROMISE: &str = "P";
pub(crate) const TYPE_REGEXP: &str = "R";
pub(crate) const TYPE_SET: &str = "S";
pub(crate) const TYPE_URL: &str = "U";
pub(crate) const TYPE_SYMBOL: &str = "Y";
pub(crate) const TYPE_PREVIOUS_RESOLVED: &str = "Z";

/// A value carried by a turbo stream.
///
/// This is a superset of what JSON can describe: it distinguishes
/// `undefined` from `null`, keeps non-finite numbers, and has variants for
/// the structured types the format knows about, including promises that
/// settle later in the stream.
///
/// Containers are reference counted: an entry the stream refers to from
/// several places is decoded once and shared by every referrer.
#[derive(Debug, Clone, Default)]
pub enum TurboValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Decimal digits of an arbitrary precision integer.
    BigInt(String),
    /// Milliseconds since the epoch.
    Date(f64),
    RegExp {
        source: String,
        flags: String,
    },
    /// The description of a registered symbol.
    Symbol(String),
    Url(String),
    Error {
        message: String,
        /// The constructor name for errors other than a plain `Error`,
        /// e.g. `TypeError`.
        kind: Option<String>,
    },
    Array(Rc<Vec<TurboValue>>),
    Object(Rc<IndexMap<String, TurboValue>>),
    Map(Rc<Vec<(TurboValue, TurboValue)>>),
    Set(Rc<Vec<TurboValue>>),
    Promise(Deferred),
}

impl TurboValue {
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, TurboValue)>,
    {
        Self::Object(Rc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn array(items: impl IntoIterator<Item = TurboValue>) -> Self {
        Self::Array(Rc::new(items.into_iter().collect()))
    }

    pub fn set(items: impl IntoIterator<Item = TurboValue>) -> Self {
        Self::Set(Rc::new(items.into_iter().collect()))
    }

    pub fn map(entries: impl IntoIterator<Item = (TurboValue, TurboValue)>) -> Self {
        Self::Map(Rc::new(entries.into_iter().collect()))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            kind: None,
        }
    }

    /// Look up a key of an object.
    pub fn get(&self, key: &str) -> Option<&TurboValue> {
        match self {
            Self::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, TurboValue>> {
        match self {
            Self::Object(map) => Some(&**map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Whether the value is `null` or `undefined`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Truthiness as a script would see it, used for the boolean flags of
    /// redirect results.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) | Self::BigInt(s) => !s.is_empty() && s != "0",
            _ => true,
        }
    }

    /// A lossy conversion into JSON.  Values without a JSON counterpart
    /// become `null`, structured values become their closest JSON shape.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::Undefined | Self::Null | Self::Symbol(_) | Self::Promise(_) => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::String(s) | Self::BigInt(s) | Self::Url(s) => Value::String(s.clone()),
            Self::Date(ms) => serde_json::Number::from_f64(*ms)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::RegExp { source, flags } => Value::String(format!("/{source}/{flags}")),
            Self::Error { message, .. } => Value::String(message.clone()),
            Self::Array(items) | Self::Set(items) => {
                Value::Array(items.iter().map(TurboValue::to_json).collect())
            }
            Self::Map(entries) => Value::Array(
                entries
                    .iter()
                    .map(|(k, v)| Value::Array(vec![k.to_json(), v.to_json()]))
                    .collect(),
            ),
            Self::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for TurboValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::array(items.into_iter().map(Into::into)),
            Value::Object(map) => Self::object(map.into_iter().map(|(k, v)| (k, v.into()))),
        }
    }
}

impl From<&str> for TurboValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for TurboValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for TurboValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for TurboValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

// Promises never compare equal unless they sit in the same shared
// container; everything else compares structurally, with numbers compared
// by bit pattern so that NaN and -0 round trip.
impl PartialEq for TurboValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) | (Self::Date(a), Self::Date(b)) => {
                a.to_bits() == b.to_bits() || a == b && *a != 0.0
            }
            (Self::String(a), Self::String(b))
            | (Self::BigInt(a), Self::BigInt(b))
            | (Self::Symbol(a), Self::Symbol(b))
            | (Self::Url(a), Self::Url(b)) => a == b,
            (
                Self::RegExp { source, flags },
                Self::RegExp {
                    source: source_b,
                    flags: flags_b,
                },
            ) => source == source_b && flags == flags_b,
            (
                Self::Error { message, kind },
                Self::Error {
                    message: message_b,
                    kind: kind_b,
                },
            ) => message == message_b && kind == kind_b,
            (Self::Array(a), Self::Array(b)) | (Self::Set(a), Self::Set(b)) => {
                Rc::ptr_eq(a, b) || a == b
            }
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b) || a == b,
            (Self::Map(a), Self::Map(b)) => Rc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl fmt::Display for TurboValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Error {
                message,
                kind: Some(kind),
            } => write!(f, "{kind}: {message}"),
            Self::Error { message, kind: None } => write!(f, "Error: {message}"),
            Self::String(s) => f.write_str(s),
            Self::BigInt(s) => write!(f, "{s}n"),
            Self::Symbol(s) => write!(f, "Symbol({s})"),
            Self::Promise(deferred) => write!(f, "[Promise {}]", deferred.id()),
            other => write!(f, "{}", other.to_json()),
        }
    }
}
