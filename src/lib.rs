//! nexuswire: a document-database command engine speaking the MongoDB wire
//! protocol. Commands are decoded by [`wire`], executed by a
//! [`command::Handler`] over a [`storage::StorageGateway`], and served over
//! TCP by [`server::Server`].

pub mod cancel;
pub mod command;
pub mod config;
pub mod document;
pub mod errors;
pub mod logger;
pub mod query;
pub mod server;
pub mod storage;
pub mod utils;
pub mod wire;

pub use command::Handler;
pub use document::{Document, Value};
pub use errors::{DbError, ErrorCode, ErrorKind};
pub use storage::{MemoryGateway, Namespace, StorageGateway};
