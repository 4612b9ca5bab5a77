//! Framing and decoding of wire protocol messages.
//!
//! Every message starts with a 16-byte header (`messageLength`, `requestID`,
//! `responseTo`, `opCode`, all little-endian `i32`). `OP_MSG` carries
//! commands; `OP_QUERY`/`OP_REPLY` exist only for legacy handshakes.

mod primitives;
mod msg;
mod query;

pub use msg::{CHECKSUM_PRESENT, EXHAUST_ALLOWED, MORE_TO_COME, OpMsg, Section};
pub use query::{OpQuery, OpReply};

use crate::errors::DbError;
use primitives::{ByteReader, put_i32, wire_len};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const HEADER_LEN: usize = 16;
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 48_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Reply,
    Query,
    Msg,
}

impl OpCode {
    #[must_use]
    pub const fn from_i32(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Reply),
            2004 => Some(Self::Query),
            2013 => Some(Self::Msg),
            _ => None,
        }
    }

    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Reply => 1,
            Self::Query => 2004,
            Self::Msg => 2013,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgHeader {
    pub message_length: i32,
    pub request_id: i32,
    pub response_to: i32,
    pub op_code: OpCode,
}

impl MsgHeader {
    fn parse(raw: &[u8], max_size: usize) -> Result<Self, DbError> {
        let mut r = ByteReader::new(raw);
        let message_length = r.i32()?;
        let request_id = r.i32()?;
        let response_to = r.i32()?;
        let code = r.i32()?;
        let len_ok = usize::try_from(message_length).is_ok_and(|n| (HEADER_LEN..=max_size).contains(&n));
        if !len_ok {
            return Err(DbError::protocol(format!(
                "invalid message length {message_length}: must be between {HEADER_LEN} and {max_size}"
            )));
        }
        let op_code =
            OpCode::from_i32(code).ok_or_else(|| DbError::protocol(format!("unsupported op code {code}")))?;
        Ok(Self { message_length, request_id, response_to, op_code })
    }

    fn body_len(&self) -> usize {
        usize::try_from(self.message_length).map_or(0, |n| n.saturating_sub(HEADER_LEN))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Msg(OpMsg),
    Query(OpQuery),
    Reply(OpReply),
}

impl Message {
    #[must_use]
    pub const fn op_code(&self) -> OpCode {
        match self {
            Self::Msg(_) => OpCode::Msg,
            Self::Query(_) => OpCode::Query,
            Self::Reply(_) => OpCode::Reply,
        }
    }
}

/// Decodes the body of a message whose header was already read.
///
/// # Errors
/// Framing problems are protocol errors. A well-formed body holding an
/// unsupported BSON type fails with `BadValue` instead.
pub fn decode_body(header: &MsgHeader, body: &[u8]) -> Result<Message, DbError> {
    Ok(match header.op_code {
        OpCode::Msg => Message::Msg(OpMsg::decode(body)?),
        OpCode::Query => Message::Query(OpQuery::decode(body)?),
        OpCode::Reply => Message::Reply(OpReply::decode(body)?),
    })
}

/// Decodes one complete message (header included).
///
/// # Errors
/// Returns a protocol error on any framing problem.
pub fn decode_message(raw: &[u8]) -> Result<(MsgHeader, Message), DbError> {
    decode_message_with_limit(raw, DEFAULT_MAX_MESSAGE_SIZE)
}

/// [`decode_message`] with a custom upper bound on the message length.
///
/// # Errors
/// Returns a protocol error on any framing problem.
pub fn decode_message_with_limit(raw: &[u8], max_size: usize) -> Result<(MsgHeader, Message), DbError> {
    let head = raw.get(..HEADER_LEN).ok_or_else(|| DbError::protocol("message shorter than header"))?;
    let header = MsgHeader::parse(head, max_size)?;
    if header.body_len() + HEADER_LEN != raw.len() {
        return Err(DbError::protocol(format!(
            "message length {} does not match {} bytes received",
            header.message_length,
            raw.len()
        )));
    }
    let message = decode_body(&header, &raw[HEADER_LEN..])?;
    Ok((header, message))
}

/// Encodes a message with a freshly computed header.
///
/// # Errors
/// Returns an error when a document cannot be serialized.
pub fn encode_message(request_id: i32, response_to: i32, message: &Message) -> Result<Vec<u8>, DbError> {
    let mut out = vec![0_u8; 4];
    put_i32(&mut out, request_id);
    put_i32(&mut out, response_to);
    put_i32(&mut out, message.op_code().code());
    match message {
        Message::Msg(m) => m.encode(&mut out)?,
        Message::Query(q) => q.encode(&mut out)?,
        Message::Reply(r) => r.encode(&mut out)?,
    }
    let len = wire_len(out.len())?.to_le_bytes();
    out[..4].copy_from_slice(&len);
    Ok(out)
}

/// Reads one raw frame from `reader`: the parsed header and the undecoded body.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly between messages.
///
/// # Errors
/// I/O failures and bad headers surface as errors of kind `Protocol`.
pub async fn read_frame<R>(reader: &mut R, max_size: usize) -> Result<Option<(MsgHeader, Vec<u8>)>, DbError>
where
    R: AsyncRead + Unpin,
{
    let mut head = [0_u8; HEADER_LEN];
    let first = reader.read(&mut head).await?;
    if first == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut head[first..]).await?;
    let header = MsgHeader::parse(&head, max_size)?;
    let mut body = vec![0_u8; header.body_len()];
    reader.read_exact(&mut body).await?;
    Ok(Some((header, body)))
}

/// Reads and decodes one message from `reader`.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly between messages.
///
/// # Errors
/// See [`read_frame`] and [`decode_body`].
pub async fn read_message<R>(reader: &mut R, max_size: usize) -> Result<Option<(MsgHeader, Message)>, DbError>
where
    R: AsyncRead + Unpin,
{
    let Some((header, body)) = read_frame(reader, max_size).await? else {
        return Ok(None);
    };
    let message = decode_body(&header, &body)?;
    Ok(Some((header, message)))
}

/// Encodes and writes one message, flushing the writer.
///
/// # Errors
/// Serialization or I/O failures.
pub async fn write_message<W>(
    writer: &mut W,
    request_id: i32,
    response_to: i32,
    message: &Message,
) -> Result<(), DbError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encode_message(request_id, response_to, message)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, Value};

    fn cmd() -> Document {
        vec![("ping", Value::Int32(1)), ("$db", Value::from("admin"))].into_iter().collect()
    }

    #[test]
    fn op_msg_round_trip() {
        let msg = Message::Msg(OpMsg::reply(cmd()));
        let bytes = encode_message(7, 3, &msg).unwrap();
        assert_eq!(i32::from_le_bytes(bytes[..4].try_into().unwrap()) as usize, bytes.len());
        let (header, back) = decode_message(&bytes).unwrap();
        assert_eq!(header.request_id, 7);
        assert_eq!(header.response_to, 3);
        assert_eq!(header.op_code, OpCode::Msg);
        assert_eq!(back, msg);
    }

    #[test]
    fn sequences_merge_into_command() {
        let d: Document = vec![("_id", Value::Int32(1))].into_iter().collect();
        let body: Document =
            vec![("insert", Value::from("c")), ("$db", Value::from("db"))].into_iter().collect();
        let msg = OpMsg {
            flags: 0,
            sections: vec![
                Section::Body(body),
                Section::Sequence { identifier: "documents".into(), documents: vec![d.clone(), d] },
            ],
        };
        let bytes = encode_message(1, 0, &Message::Msg(msg)).unwrap();
        let (_, Message::Msg(back)) = decode_message(&bytes).unwrap() else { panic!("not OP_MSG") };
        let doc = back.document().unwrap();
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["insert", "$db", "documents"]);
        assert_eq!(doc.get("documents").and_then(Value::as_array).map(|a| a.len()), Some(2));
    }

    #[test]
    fn checksum_is_stripped() {
        let mut bytes = encode_message(1, 0, &Message::Msg(OpMsg::reply(cmd()))).unwrap();
        bytes[16] |= 1;
        bytes.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let len = i32::try_from(bytes.len()).unwrap().to_le_bytes();
        bytes[..4].copy_from_slice(&len);
        let (_, Message::Msg(m)) = decode_message(&bytes).unwrap() else { panic!("not OP_MSG") };
        assert_eq!(m.document().unwrap(), cmd());
    }

    #[test]
    fn unknown_required_flag_is_rejected() {
        let mut bytes = encode_message(1, 0, &Message::Msg(OpMsg::reply(cmd()))).unwrap();
        bytes[16] |= 1 << 3;
        assert!(matches!(decode_message(&bytes), Err(DbError::Protocol(_))));
    }

    #[test]
    fn unsupported_types_are_not_protocol_errors() {
        let raw = bson::doc! {"ping": 1, "d": bson::Decimal128::from_bytes([0; 16])};
        let mut doc_bytes = Vec::new();
        raw.to_writer(&mut doc_bytes).unwrap();
        let mut body = 0_u32.to_le_bytes().to_vec();
        body.push(0);
        body.extend_from_slice(&doc_bytes);
        let header = MsgHeader { message_length: 0, request_id: 1, response_to: 0, op_code: OpCode::Msg };
        let err = decode_body(&header, &body).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Validation);

        let truncated = &body[..body.len() - 1];
        assert_eq!(decode_body(&header, truncated).unwrap_err().kind(), crate::errors::ErrorKind::Protocol);
    }

    #[test]
    fn bad_lengths_and_op_codes() {
        let mut bytes = encode_message(1, 0, &Message::Msg(OpMsg::reply(cmd()))).unwrap();
        assert!(decode_message(&bytes[..10]).is_err());
        assert!(decode_message_with_limit(&bytes, 20).is_err());
        bytes[12..16].copy_from_slice(&2010_i32.to_le_bytes());
        assert!(matches!(decode_message(&bytes), Err(DbError::Protocol(_))));
    }

    #[test]
    fn two_bodies_is_an_error() {
        let msg = OpMsg { flags: 0, sections: vec![Section::Body(cmd()), Section::Body(cmd())] };
        assert!(msg.document().is_err());
    }

    #[test]
    fn op_query_handshake_round_trip() {
        let q = OpQuery {
            flags: 0,
            full_collection_name: "admin.$cmd".into(),
            number_to_skip: 0,
            number_to_return: -1,
            query: vec![("isMaster", Value::Int32(1))].into_iter().collect(),
            return_fields_selector: None,
        };
        let bytes = encode_message(5, 0, &Message::Query(q.clone())).unwrap();
        let (_, back) = decode_message(&bytes).unwrap();
        assert_eq!(back, Message::Query(q.clone()));
        assert_eq!(q.command().get("$db"), Some(&Value::from("admin")));

        let reply = Message::Reply(OpReply::single(cmd()));
        let bytes = encode_message(6, 5, &reply).unwrap();
        assert_eq!(decode_message(&bytes).unwrap().1, reply);
    }

    #[tokio::test]
    async fn async_read_write() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let msg = Message::Msg(OpMsg::reply(cmd()));
        write_message(&mut a, 9, 0, &msg).await.unwrap();
        drop(a);
        let (header, back) = read_message(&mut b, DEFAULT_MAX_MESSAGE_SIZE).await.unwrap().unwrap();
        assert_eq!(header.request_id, 9);
        assert_eq!(back, msg);
        assert!(read_message(&mut b, DEFAULT_MAX_MESSAGE_SIZE).await.unwrap().is_none());
    }
}
