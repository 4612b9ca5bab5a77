use super::Handler;
use crate::document::{Array, DateTime, Document, Value};
use crate::storage::StorageGateway;

pub const MAX_BSON_OBJECT_SIZE: i32 = 16 * 1024 * 1024;
pub const MAX_WRITE_BATCH_SIZE: i32 = 100_000;
pub const MIN_WIRE_VERSION: i32 = 0;
pub const MAX_WIRE_VERSION: i32 = 13;

/// Server version reported to drivers.
const COMPAT_VERSION: [i32; 3] = [5, 0, 42];

impl<G: StorageGateway> Handler<G> {
    /// Replies to `hello` and its legacy spellings. `hello` reports
    /// `isWritablePrimary`; `isMaster`/`ismaster` report `ismaster`.
    #[must_use]
    pub fn msg_hello(&self, cmd: &Document) -> Document {
        let primary_key = if cmd.command() == Some("hello") { "isWritablePrimary" } else { "ismaster" };
        let max_message = i32::try_from(self.max_message_size()).unwrap_or(i32::MAX);
        let mut reply = Document::new();
        reply.set(primary_key, true);
        reply.set("maxBsonObjectSize", MAX_BSON_OBJECT_SIZE);
        reply.set("maxMessageSizeBytes", max_message);
        reply.set("maxWriteBatchSize", MAX_WRITE_BATCH_SIZE);
        reply.set("localTime", Value::DateTime(DateTime::now()));
        reply.set("minWireVersion", MIN_WIRE_VERSION);
        reply.set("maxWireVersion", MAX_WIRE_VERSION);
        reply.set("readOnly", false);
        reply.set("ok", 1.0);
        reply
    }

    #[must_use]
    pub fn msg_ping(&self) -> Document {
        std::iter::once(("ok", Value::Double(1.0))).collect()
    }

    #[must_use]
    pub fn msg_build_info(&self) -> Document {
        let [major, minor, patch] = COMPAT_VERSION;
        let version_array: Array = [major, minor, patch, 0].into_iter().map(Value::Int32).collect();
        let mut reply = Document::new();
        reply.set("version", format!("{major}.{minor}.{patch}"));
        reply.set("gitVersion", "");
        reply.set("versionArray", version_array);
        reply.set("bits", 64);
        reply.set("debug", cfg!(debug_assertions));
        reply.set("maxBsonObjectSize", MAX_BSON_OBJECT_SIZE);
        reply.set("nexuswireVersion", env!("CARGO_PKG_VERSION"));
        reply.set("ok", 1.0);
        reply
    }
}
