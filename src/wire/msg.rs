use super::primitives::{ByteReader, put_cstring, put_document, put_i32, put_u32, wire_len};
use crate::document::{Array, Document, Value};
use crate::errors::DbError;

pub const CHECKSUM_PRESENT: u32 = 1;
pub const MORE_TO_COME: u32 = 1 << 1;
pub const EXHAUST_ALLOWED: u32 = 1 << 16;

/// Bits 0-15 must be understood by the receiver.
const REQUIRED_MASK: u32 = 0xFFFF;
const KNOWN_FLAGS: u32 = CHECKSUM_PRESENT | MORE_TO_COME | EXHAUST_ALLOWED;

#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    /// Kind 0: the command body.
    Body(Document),
    /// Kind 1: a named sequence of documents.
    Sequence { identifier: String, documents: Vec<Document> },
}

/// An `OP_MSG` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct OpMsg {
    pub flags: u32,
    pub sections: Vec<Section>,
}

impl OpMsg {
    /// A reply message carrying a single body.
    #[must_use]
    pub fn reply(body: Document) -> Self {
        Self { flags: 0, sections: vec![Section::Body(body)] }
    }

    #[must_use]
    pub const fn more_to_come(&self) -> bool {
        self.flags & MORE_TO_COME != 0
    }

    /// The command document: the body with each document sequence appended as
    /// an array field named by its identifier.
    ///
    /// # Errors
    /// Fails when there is not exactly one body, or a sequence identifier
    /// collides with a body field.
    pub fn document(&self) -> Result<Document, DbError> {
        let mut bodies = self.sections.iter().filter_map(|s| match s {
            Section::Body(d) => Some(d),
            Section::Sequence { .. } => None,
        });
        let (Some(body), None) = (bodies.next(), bodies.next()) else {
            return Err(DbError::protocol("OP_MSG must contain exactly one body section"));
        };
        let mut doc = body.clone();
        for section in &self.sections {
            if let Section::Sequence { identifier, documents } = section {
                if doc.has(identifier) {
                    return Err(DbError::protocol(format!(
                        "duplicate field '{identifier}' in OP_MSG body and document sequence"
                    )));
                }
                let items: Array = documents.iter().cloned().map(Value::Document).collect();
                doc.set(identifier.clone(), items);
            }
        }
        Ok(doc)
    }

    /// Flag bits of an undecoded `OP_MSG` body, if it is long enough to have them.
    #[must_use]
    pub fn peek_flags(body: &[u8]) -> Option<u32> {
        ByteReader::new(body).u32().ok()
    }

    pub(crate) fn decode(body: &[u8]) -> Result<Self, DbError> {
        let mut r = ByteReader::new(body);
        let flags = r.u32()?;
        let unknown = flags & REQUIRED_MASK & !KNOWN_FLAGS;
        if unknown != 0 {
            return Err(DbError::protocol(format!("unsupported OP_MSG flag bits {unknown:#x}")));
        }
        let payload_len = if flags & CHECKSUM_PRESENT != 0 {
            r.remaining()
                .checked_sub(4)
                .ok_or_else(|| DbError::protocol("OP_MSG too short for checksum"))?
        } else {
            r.remaining()
        };
        let mut sections = Vec::new();
        let mut payload = ByteReader::new(r.take(payload_len)?);
        while !payload.is_empty() {
            match payload.u8()? {
                0 => sections.push(Section::Body(payload.document()?)),
                1 => {
                    let size = usize::try_from(payload.i32()?)
                        .ok()
                        .and_then(|n| n.checked_sub(4))
                        .ok_or_else(|| DbError::protocol("invalid document sequence size"))?;
                    let mut seq = ByteReader::new(payload.take(size)?);
                    let identifier = seq.cstring()?;
                    let mut documents = Vec::new();
                    while !seq.is_empty() {
                        documents.push(seq.document()?);
                    }
                    sections.push(Section::Sequence { identifier, documents });
                }
                kind => return Err(DbError::protocol(format!("unknown OP_MSG section kind {kind}"))),
            }
        }
        Ok(Self { flags, sections })
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<(), DbError> {
        // checksums are never produced
        put_u32(out, self.flags & !CHECKSUM_PRESENT);
        for section in &self.sections {
            match section {
                Section::Body(doc) => {
                    out.push(0);
                    put_document(out, doc)?;
                }
                Section::Sequence { identifier, documents } => {
                    out.push(1);
                    let mut seq = Vec::new();
                    put_cstring(&mut seq, identifier)?;
                    for doc in documents {
                        put_document(&mut seq, doc)?;
                    }
                    put_i32(out, wire_len(seq.len() + 4)?);
                    out.extend_from_slice(&seq);
                }
            }
        }
        Ok(())
    }
}
