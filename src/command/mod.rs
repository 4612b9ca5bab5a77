//! Command execution against a [`StorageGateway`].
//!
//! A [`Handler`] owns the gateway handle and the cancellation signal for the
//! connection it serves; commands are dispatched on the first key of the
//! command document.

mod find;
mod handshake;
mod insert;
pub mod params;
mod update;

pub use handshake::{MAX_BSON_OBJECT_SIZE, MAX_WIRE_VERSION, MAX_WRITE_BATCH_SIZE, MIN_WIRE_VERSION};

use crate::cancel::CancelSignal;
use crate::document::{Document, Value};
use crate::errors::{DbError, ErrorCode};
use crate::storage::StorageGateway;
use crate::wire::DEFAULT_MAX_MESSAGE_SIZE;
use std::future::Future;
use std::sync::Arc;

#[derive(Debug)]
pub struct Handler<G> {
    gateway: Arc<G>,
    cancel: CancelSignal,
    max_message_size: usize,
}

impl<G> Clone for Handler<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            cancel: self.cancel.clone(),
            max_message_size: self.max_message_size,
        }
    }
}

impl<G: StorageGateway> Handler<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway, cancel: CancelSignal::never(), max_message_size: DEFAULT_MAX_MESSAGE_SIZE }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub const fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Runs a gateway call under this handler's cancellation signal.
    async fn guard<T>(&self, fut: impl Future<Output = Result<T, DbError>>) -> Result<T, DbError> {
        self.cancel.guard(fut).await
    }

    /// Executes one command document and returns its reply.
    ///
    /// # Errors
    /// Any error aborts the command; no partial reply is produced.
    pub async fn execute(&self, cmd: &Document) -> Result<Document, DbError> {
        let Some(name) = cmd.command() else {
            return Err(DbError::command(ErrorCode::CommandNotFound, "no such command: ''"));
        };
        let scoped = match params::max_time(cmd)? {
            Some(limit) => Self { cancel: self.cancel.with_timeout(limit), ..self.clone() },
            None => self.clone(),
        };
        log::debug!("executing command {name}");
        match name {
            "update" => scoped.msg_update(cmd).await,
            "insert" => scoped.msg_insert(cmd).await,
            "find" => scoped.msg_find(cmd).await,
            "hello" | "isMaster" | "ismaster" => Ok(scoped.msg_hello(cmd)),
            "ping" => Ok(scoped.msg_ping()),
            "buildInfo" | "buildinfo" => Ok(scoped.msg_build_info()),
            other => Err(DbError::command(ErrorCode::CommandNotFound, format!("no such command: '{other}'"))),
        }
    }

    /// Like [`Handler::execute`], but renders failures as error replies.
    pub async fn handle(&self, cmd: &Document) -> Document {
        match self.execute(cmd).await {
            Ok(reply) => reply,
            Err(err) => {
                log::warn!("command {} failed: {err}", cmd.command().unwrap_or_default());
                error_reply(&err)
            }
        }
    }
}

/// `{ok: 0.0, errmsg, code, codeName}` for a failed command.
#[must_use]
pub fn error_reply(err: &DbError) -> Document {
    let code = err.code();
    let mut reply = Document::new();
    reply.set("ok", 0.0);
    reply.set("errmsg", err.to_string());
    reply.set("code", code.code());
    reply.set("codeName", code.name());
    reply
}

/// The collection addressed by a command: the value of its first field.
pub(crate) fn collection_name(cmd: &Document) -> Result<&str, DbError> {
    let value = cmd.command().and_then(|name| cmd.get(name)).unwrap_or(&Value::Null);
    value.as_str().ok_or_else(|| {
        DbError::bad_value(format!("collection name has invalid type {}", value.type_alias()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::storage::MemoryGateway;

    fn handler() -> Handler<MemoryGateway> {
        Handler::new(Arc::new(MemoryGateway::new()))
    }

    fn d(pairs: Vec<(&str, Value)>) -> Document {
        pairs.into_iter().collect()
    }

    #[tokio::test]
    async fn unknown_command() {
        let err = handler().execute(&d(vec![("frobnicate", 1.into())])).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::CommandNotFound);
        assert_eq!(err.to_string(), "no such command: 'frobnicate'");
    }

    #[tokio::test]
    async fn error_reply_shape() {
        let reply = handler().handle(&d(vec![("update", 5.into()), ("$db", "db".into())])).await;
        assert_eq!(reply.keys().collect::<Vec<_>>(), vec!["ok", "errmsg", "code", "codeName"]);
        assert_eq!(reply.get("errmsg"), Some(&Value::from("collection name has invalid type int")));
        assert_eq!(reply.get("code"), Some(&Value::Int32(2)));
        assert_eq!(reply.get("codeName"), Some(&Value::from("BadValue")));
    }

    #[tokio::test]
    async fn let_is_unimplemented() {
        let cmd = d(vec![("update", "c".into()), ("$db", "db".into()), ("let", Value::Document(Document::new()))]);
        let err = handler().execute(&cmd).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unimplemented);
        assert_eq!(err.to_string(), "let: support for field \"let\" is not implemented yet");
    }

    #[tokio::test]
    async fn db_is_required() {
        let err = handler().execute(&d(vec![("update", "c".into())])).await.unwrap_err();
        assert_eq!(err.to_string(), "required parameter \"$db\" is missing");
    }

    #[tokio::test]
    async fn ping_and_hello() {
        let h = handler();
        assert_eq!(h.execute(&d(vec![("ping", 1.into())])).await.unwrap().get("ok"), Some(&Value::Double(1.0)));
        let hello = h.execute(&d(vec![("hello", 1.into())])).await.unwrap();
        assert_eq!(hello.get("isWritablePrimary"), Some(&Value::Bool(true)));
        let legacy = h.execute(&d(vec![("isMaster", 1.into())])).await.unwrap();
        assert_eq!(legacy.get("ismaster"), Some(&Value::Bool(true)));
        assert_eq!(legacy.get("maxMessageSizeBytes"), Some(&Value::Int32(48_000_000)));
    }

    #[tokio::test]
    async fn cancelled_handler_aborts_before_storage() {
        let cancel = crate::cancel::CancelHandle::new();
        let h = handler().with_cancel(cancel.signal());
        cancel.cancel();
        let cmd = d(vec![("insert", "c".into()), ("$db", "db".into())]);
        let err = h.execute(&cmd).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Interrupted);
        assert!(h.gateway().collection_names().is_empty());
    }
}
