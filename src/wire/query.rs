use super::primitives::{ByteReader, put_cstring, put_document, put_i32, put_i64, wire_len};
use crate::document::Document;
use crate::errors::DbError;

/// Legacy `OP_QUERY`; only used by drivers for the initial handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct OpQuery {
    pub flags: i32,
    pub full_collection_name: String,
    pub number_to_skip: i32,
    pub number_to_return: i32,
    pub query: Document,
    pub return_fields_selector: Option<Document>,
}

impl OpQuery {
    /// Database part of `full_collection_name` (`"admin.$cmd"` gives `"admin"`).
    #[must_use]
    pub fn database(&self) -> &str {
        self.full_collection_name.split('.').next().unwrap_or_default()
    }

    /// The command document with `$db` filled in from the collection name.
    ///
    /// Drivers may wrap the command as `{$query: {...}, ...}`; it is unwrapped.
    #[must_use]
    pub fn command(&self) -> Document {
        let mut cmd = match self.query.get("$query").and_then(|v| v.as_document()) {
            Some(inner) => inner.clone(),
            None => self.query.clone(),
        };
        if !cmd.has("$db") {
            cmd.set("$db", self.database());
        }
        cmd
    }

    pub(crate) fn decode(body: &[u8]) -> Result<Self, DbError> {
        let mut r = ByteReader::new(body);
        let flags = r.i32()?;
        let full_collection_name = r.cstring()?;
        let number_to_skip = r.i32()?;
        let number_to_return = r.i32()?;
        let query = r.document()?;
        let return_fields_selector = if r.is_empty() { None } else { Some(r.document()?) };
        if !r.is_empty() {
            return Err(DbError::protocol("trailing bytes after OP_QUERY"));
        }
        Ok(Self { flags, full_collection_name, number_to_skip, number_to_return, query, return_fields_selector })
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<(), DbError> {
        put_i32(out, self.flags);
        put_cstring(out, &self.full_collection_name)?;
        put_i32(out, self.number_to_skip);
        put_i32(out, self.number_to_return);
        put_document(out, &self.query)?;
        if let Some(sel) = &self.return_fields_selector {
            put_document(out, sel)?;
        }
        Ok(())
    }
}

/// `OP_REPLY`, the answer to an `OP_QUERY`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OpReply {
    pub response_flags: i32,
    pub cursor_id: i64,
    pub starting_from: i32,
    pub documents: Vec<Document>,
}

impl OpReply {
    #[must_use]
    pub fn single(doc: Document) -> Self {
        Self { documents: vec![doc], ..Self::default() }
    }

    pub(crate) fn decode(body: &[u8]) -> Result<Self, DbError> {
        let mut r = ByteReader::new(body);
        let response_flags = r.i32()?;
        let cursor_id = r.i64()?;
        let starting_from = r.i32()?;
        let number_returned = r.i32()?;
        let mut documents = Vec::new();
        while !r.is_empty() {
            documents.push(r.document()?);
        }
        if usize::try_from(number_returned).ok() != Some(documents.len()) {
            return Err(DbError::protocol(format!(
                "OP_REPLY announces {number_returned} documents but carries {}",
                documents.len()
            )));
        }
        Ok(Self { response_flags, cursor_id, starting_from, documents })
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<(), DbError> {
        put_i32(out, self.response_flags);
        put_i64(out, self.cursor_id);
        put_i32(out, self.starting_from);
        put_i32(out, wire_len(self.documents.len())?);
        for doc in &self.documents {
            put_document(out, doc)?;
        }
        Ok(())
    }
}
