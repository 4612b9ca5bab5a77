use super::core::{Array, Document};
use chrono::Utc;
use std::fmt;

/// Binary data with its BSON subtype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary {
    pub subtype: u8,
    pub bytes: Vec<u8>,
}

/// 12-byte object identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub [u8; 12]);

impl ObjectId {
    /// Generates a fresh identifier (timestamp + process-unique + counter).
    #[must_use]
    pub fn new() -> Self {
        Self(bson::oid::ObjectId::new().bytes())
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        bson::oid::ObjectId::from_bytes(self.0).to_hex()
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateTime(pub i64);

impl DateTime {
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regex {
    pub pattern: String,
    pub options: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub time: u32,
    pub increment: u32,
}

impl Timestamp {
    #[must_use]
    pub fn now() -> Self {
        let secs = u32::try_from(Utc::now().timestamp()).unwrap_or(u32::MAX);
        Self { time: secs, increment: 1 }
    }
}

/// A single value inside a document.
#[derive(Debug, Clone)]
pub enum Value {
    Document(Document),
    Array(Array),
    Double(f64),
    String(String),
    Binary(Binary),
    ObjectId(ObjectId),
    Bool(bool),
    DateTime(DateTime),
    Null,
    Regex(Regex),
    Int32(i32),
    Timestamp(Timestamp),
    Int64(i64),
}

impl Value {
    /// Type alias as used by `$type` and error messages.
    #[must_use]
    pub const fn type_alias(&self) -> &'static str {
        match self {
            Self::Document(_) => "object",
            Self::Array(_) => "array",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Binary(_) => "binData",
            Self::ObjectId(_) => "objectId",
            Self::Bool(_) => "bool",
            Self::DateTime(_) => "date",
            Self::Null => "null",
            Self::Regex(_) => "regex",
            Self::Int32(_) => "int",
            Self::Timestamp(_) => "timestamp",
            Self::Int64(_) => "long",
        }
    }

    /// Numeric BSON type code.
    #[must_use]
    pub const fn type_code(&self) -> i32 {
        match self {
            Self::Double(_) => 1,
            Self::String(_) => 2,
            Self::Document(_) => 3,
            Self::Array(_) => 4,
            Self::Binary(_) => 5,
            Self::ObjectId(_) => 7,
            Self::Bool(_) => 8,
            Self::DateTime(_) => 9,
            Self::Null => 10,
            Self::Regex(_) => 11,
            Self::Int32(_) => 16,
            Self::Timestamp(_) => 17,
            Self::Int64(_) => 18,
        }
    }

    #[must_use]
    pub const fn is_number(&self) -> bool {
        matches!(self, Self::Double(_) | Self::Int32(_) | Self::Int64(_))
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(f) => Some(*f),
            Self::Int32(i) => Some(f64::from(*i)),
            Self::Int64(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Document(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Document(a), Self::Document(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Binary(a), Self::Binary(b)) => a == b,
            (Self::ObjectId(a), Self::ObjectId(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::Null, Self::Null) => true,
            (Self::Regex(a), Self::Regex(b)) => a == b,
            (Self::Int32(a), Self::Int32(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Document> for Value {
    fn from(d: Document) -> Self {
        Self::Document(d)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Self::Array(a)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Double(f)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int32(i)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int64(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Self::ObjectId(id)
    }
}

// Shell-like rendering used in error messages, e.g. `{ _id: 1, a: "x" }`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document(d) => write!(f, "{d}"),
            Self::Array(a) => {
                if a.is_empty() {
                    return f.write_str("[]");
                }
                f.write_str("[ ")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str(" ]")
            }
            Self::Double(d) => {
                if d.is_finite() && d.fract() == 0.0 {
                    write!(f, "{d:.1}")
                } else {
                    write!(f, "{d}")
                }
            }
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Binary(b) => write!(f, "BinData({}, {} bytes)", b.subtype, b.bytes.len()),
            Self::ObjectId(id) => write!(f, "ObjectId('{}')", id.to_hex()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::DateTime(dt) => write!(f, "new Date({})", dt.0),
            Self::Null => f.write_str("null"),
            Self::Regex(r) => write!(f, "/{}/{}", r.pattern, r.options),
            Self::Int32(i) => write!(f, "{i}"),
            Self::Timestamp(ts) => write!(f, "Timestamp({}, {})", ts.time, ts.increment),
            Self::Int64(i) => write!(f, "{i}"),
        }
    }
}
