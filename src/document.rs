//! Value model: ordered documents, arrays and the closed set of scalar types
//! the write engine understands.

pub mod convert;
pub mod core;
pub mod types;

pub use self::core::{Array, Document};
pub use self::types::{Binary, DateTime, ObjectId, Regex, Timestamp, Value};
