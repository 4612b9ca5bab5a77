//! Exhaustive mapping between the `bson` crate's values and [`Value`].
//!
//! BSON types outside the supported set are rejected rather than coerced.

use super::core::{Array, Document};
use super::types::{Binary, DateTime, ObjectId, Regex, Timestamp, Value};
use crate::errors::DbError;
use bson::Bson;

fn unsupported(name: &str) -> DbError {
    DbError::bad_value(format!("unsupported BSON type: {name}"))
}

impl TryFrom<Bson> for Value {
    type Error = DbError;

    fn try_from(b: Bson) -> Result<Self, Self::Error> {
        Ok(match b {
            Bson::Double(f) => Self::Double(f),
            Bson::String(s) => Self::String(s),
            Bson::Array(items) => Self::Array(
                items.into_iter().map(Self::try_from).collect::<Result<Array, _>>()?,
            ),
            Bson::Document(d) => Self::Document(Document::try_from(d)?),
            Bson::Boolean(v) => Self::Bool(v),
            Bson::Null => Self::Null,
            Bson::RegularExpression(r) => {
                Self::Regex(Regex { pattern: r.pattern, options: r.options })
            }
            Bson::Int32(i) => Self::Int32(i),
            Bson::Int64(i) => Self::Int64(i),
            Bson::Timestamp(ts) => {
                Self::Timestamp(Timestamp { time: ts.time, increment: ts.increment })
            }
            Bson::Binary(bin) => {
                Self::Binary(Binary { subtype: u8::from(bin.subtype), bytes: bin.bytes })
            }
            Bson::ObjectId(oid) => Self::ObjectId(ObjectId(oid.bytes())),
            Bson::DateTime(dt) => Self::DateTime(DateTime(dt.timestamp_millis())),
            Bson::JavaScriptCode(_) => return Err(unsupported("javascript")),
            Bson::JavaScriptCodeWithScope(_) => return Err(unsupported("javascriptWithScope")),
            Bson::Symbol(_) => return Err(unsupported("symbol")),
            Bson::Decimal128(_) => return Err(unsupported("decimal")),
            Bson::Undefined => return Err(unsupported("undefined")),
            Bson::MaxKey => return Err(unsupported("maxKey")),
            Bson::MinKey => return Err(unsupported("minKey")),
            Bson::DbPointer(_) => return Err(unsupported("dbPointer")),
        })
    }
}

impl TryFrom<bson::Document> for Document {
    type Error = DbError;

    fn try_from(d: bson::Document) -> Result<Self, Self::Error> {
        let mut out = Self::new();
        for (k, v) in d {
            out.set(k, Value::try_from(v)?);
        }
        Ok(out)
    }
}

impl From<Value> for Bson {
    fn from(v: Value) -> Self {
        match v {
            Value::Document(d) => Self::Document(d.into()),
            Value::Array(a) => Self::Array(a.into_iter().map(Self::from).collect()),
            Value::Double(f) => Self::Double(f),
            Value::String(s) => Self::String(s),
            Value::Binary(b) => Self::Binary(bson::Binary {
                subtype: bson::spec::BinarySubtype::from(b.subtype),
                bytes: b.bytes,
            }),
            Value::ObjectId(id) => Self::ObjectId(bson::oid::ObjectId::from_bytes(id.0)),
            Value::Bool(b) => Self::Boolean(b),
            Value::DateTime(dt) => Self::DateTime(bson::DateTime::from_millis(dt.0)),
            Value::Null => Self::Null,
            Value::Regex(r) => {
                Self::RegularExpression(bson::Regex { pattern: r.pattern, options: r.options })
            }
            Value::Int32(i) => Self::Int32(i),
            Value::Timestamp(ts) => {
                Self::Timestamp(bson::Timestamp { time: ts.time, increment: ts.increment })
            }
            Value::Int64(i) => Self::Int64(i),
        }
    }
}

impl From<Document> for bson::Document {
    fn from(d: Document) -> Self {
        d.into_iter().map(|(k, v)| (k, Bson::from(v))).collect()
    }
}

impl Document {
    /// Decodes a single BSON document from its binary form.
    ///
    /// # Errors
    /// Returns an error if the bytes are not a valid BSON document or contain unsupported types.
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self, DbError> {
        let raw = bson::Document::from_reader(&mut bytes)?;
        Self::try_from(raw)
    }

    /// Encodes the document to its BSON binary form.
    ///
    /// # Errors
    /// Returns an error if the document cannot be serialized.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DbError> {
        let raw: bson::Document = self.clone().into();
        let mut buf = Vec::new();
        raw.to_writer(&mut buf)?;
        Ok(buf)
    }
}
