//! TCP front end: one task per connection, messages processed in order.

use crate::cancel::{CancelHandle, CancelSignal};
use crate::command::{Handler, error_reply};
use crate::errors::{DbError, ErrorKind};
use crate::storage::StorageGateway;
use crate::wire::{MORE_TO_COME, Message, MsgHeader, OpCode, OpMsg, OpReply, decode_body, read_frame, write_message};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::{TcpListener, ToSocketAddrs};

pub struct Server<G> {
    listener: TcpListener,
    handler: Handler<G>,
    shutdown: Arc<CancelHandle>,
}

impl<G: StorageGateway + 'static> Server<G> {
    /// Binds the listener. Nothing is accepted until [`Server::run`].
    ///
    /// # Errors
    /// Returns an I/O error when the address cannot be bound.
    pub async fn bind(
        addr: impl ToSocketAddrs,
        gateway: Arc<G>,
        max_message_size: usize,
    ) -> Result<Self, DbError> {
        let listener = TcpListener::bind(addr).await?;
        let shutdown = Arc::new(CancelHandle::new());
        let handler = Handler::new(gateway)
            .with_cancel(shutdown.signal())
            .with_max_message_size(max_message_size);
        log::info!("listening on {}", listener.local_addr()?);
        Ok(Self { listener, handler, shutdown })
    }

    /// # Errors
    /// Returns an I/O error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, DbError> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle used to stop the server; in-flight commands are interrupted.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<CancelHandle> {
        Arc::clone(&self.shutdown)
    }

    /// Accepts connections until shutdown is signalled.
    ///
    /// # Errors
    /// Never fails once bound; accept errors are logged and skipped.
    pub async fn run(self) -> Result<(), DbError> {
        let stop = self.shutdown.signal();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        log::info!("accepted connection from {peer}");
                        if let Err(e) = stream.set_nodelay(true) {
                            log::debug!("set_nodelay failed for {peer}: {e}");
                        }
                        let handler = self.handler.clone();
                        let stop = self.shutdown.signal();
                        tokio::spawn(async move {
                            let (rd, wr) = stream.into_split();
                            match serve_connection(rd, wr, &handler, &stop).await {
                                Ok(()) => log::debug!("connection {peer} closed"),
                                Err(e) => log::warn!("connection {peer} closed: {e}"),
                            }
                        });
                    }
                    Err(e) => log::error!("failed to accept connection: {e}"),
                },
                _ = stop.fired() => {
                    log::info!("server shutting down");
                    break;
                }
            }
        }
        Ok(())
    }
}

static NEXT_REQUEST_ID: AtomicI32 = AtomicI32::new(1);

fn next_request_id() -> i32 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// The reply owed for a request whose body could not be turned into a
/// command, or `None` when the client asked for no reply.
fn rejection(header: &MsgHeader, body: &[u8], err: &DbError) -> Option<Message> {
    match header.op_code {
        OpCode::Msg => {
            let flags = OpMsg::peek_flags(body).unwrap_or_default();
            (flags & MORE_TO_COME == 0).then(|| Message::Msg(OpMsg::reply(error_reply(err))))
        }
        OpCode::Query => Some(Message::Reply(OpReply::single(error_reply(err)))),
        OpCode::Reply => None,
    }
}

/// Drives one connection: read a message, execute it, write the reply.
///
/// Returns `Ok(())` when the peer disconnects or shutdown is signalled.
///
/// # Errors
/// Framing and I/O errors end the connection without a reply.
pub async fn serve_connection<G, R, W>(
    reader: R,
    mut writer: W,
    handler: &Handler<G>,
    stop: &CancelSignal,
) -> Result<(), DbError>
where
    G: StorageGateway,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let max = handler.max_message_size();
    loop {
        let next = tokio::select! {
            next = read_frame(&mut reader, max) => next?,
            _ = stop.fired() => return Ok(()),
        };
        let Some((header, body)) = next else {
            return Ok(());
        };
        let message = match decode_body(&header, &body) {
            Ok(message) => message,
            Err(err) if err.kind() == ErrorKind::Validation && header.op_code != OpCode::Reply => {
                log::warn!("rejected request {}: {err}", header.request_id);
                if let Some(out) = rejection(&header, &body, &err) {
                    write_message(&mut writer, next_request_id(), header.request_id, &out).await?;
                }
                continue;
            }
            Err(err) => return Err(err),
        };
        match message {
            Message::Msg(msg) => {
                let cmd = msg.document()?;
                let reply = handler.handle(&cmd).await;
                if msg.more_to_come() {
                    continue;
                }
                let out = Message::Msg(OpMsg::reply(reply));
                write_message(&mut writer, next_request_id(), header.request_id, &out).await?;
            }
            Message::Query(query) => {
                let reply = handler.handle(&query.command()).await;
                let out = Message::Reply(OpReply::single(reply));
                write_message(&mut writer, next_request_id(), header.request_id, &out).await?;
            }
            Message::Reply(_) => return Err(DbError::protocol("unexpected OP_REPLY from client")),
        }
    }
}
