//! Little-endian primitives shared by the op codecs.

use crate::document::Document;
use crate::errors::DbError;

/// Forward-only reader over a message body.
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], DbError> {
        if n > self.remaining() {
            return Err(DbError::protocol(format!(
                "unexpected end of message: wanted {n} bytes, {} left",
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DbError> {
        let mut out = [0_u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, DbError> {
        Ok(self.array::<1>()?[0])
    }

    pub(crate) fn i32(&mut self) -> Result<i32, DbError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, DbError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub(crate) fn i64(&mut self) -> Result<i64, DbError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub(crate) fn cstring(&mut self) -> Result<String, DbError> {
        let rest = &self.buf[self.pos..];
        let end = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| DbError::protocol("unterminated cstring"))?;
        let s = std::str::from_utf8(&rest[..end])
            .map_err(|e| DbError::protocol(format!("invalid UTF-8 in cstring: {e}")))?
            .to_owned();
        self.pos += end + 1;
        Ok(s)
    }

    /// Reads one length-prefixed BSON document.
    ///
    /// Malformed BSON is a protocol error. Well-formed BSON holding a type
    /// outside the value model is a `BadValue` error, so the caller can still
    /// answer the request.
    pub(crate) fn document(&mut self) -> Result<Document, DbError> {
        let rest = &self.buf[self.pos..];
        let Some(prefix) = rest.get(..4) else {
            return Err(DbError::protocol("truncated document length"));
        };
        let mut len = [0_u8; 4];
        len.copy_from_slice(prefix);
        let len = usize::try_from(i32::from_le_bytes(len))
            .ok()
            .filter(|n| *n >= 5)
            .ok_or_else(|| DbError::protocol("invalid document length"))?;
        let mut bytes = self.take(len)?;
        let raw = bson::Document::from_reader(&mut bytes)
            .map_err(|e| DbError::protocol(format!("invalid document: {e}")))?;
        Document::try_from(raw)
    }
}

pub(crate) fn put_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_i64(out: &mut Vec<u8>, v: i64) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_cstring(out: &mut Vec<u8>, s: &str) -> Result<(), DbError> {
    if s.as_bytes().contains(&0) {
        return Err(DbError::protocol("cstring contains NUL"));
    }
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    Ok(())
}

pub(crate) fn put_document(out: &mut Vec<u8>, doc: &Document) -> Result<(), DbError> {
    out.extend_from_slice(&doc.to_bytes()?);
    Ok(())
}

/// Converts a buffer length to the wire's `i32` length field.
pub(crate) fn wire_len(n: usize) -> Result<i32, DbError> {
    i32::try_from(n).map_err(|_| DbError::protocol(format!("length {n} does not fit in a message")))
}
