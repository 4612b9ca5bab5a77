use super::params::{get_optional_param, get_required_param, ignored, unimplemented};
use super::{Handler, collection_name};
use crate::document::{Array, Document, Value};
use crate::errors::DbError;
use crate::query::{eval_filter, parse_filter};
use crate::storage::{Namespace, StorageGateway};

fn limit(cmd: &Document) -> Result<Option<usize>, DbError> {
    let n = match cmd.get("limit") {
        None => return Ok(None),
        Some(Value::Int32(n)) => i64::from(*n),
        Some(Value::Int64(n)) => *n,
        #[allow(clippy::cast_possible_truncation)]
        Some(Value::Double(f)) if f.fract() == 0.0 && f.is_finite() => *f as i64,
        Some(other) => {
            return Err(DbError::bad_value(format!(
                "BSON field 'limit' is the wrong type '{}', expected type 'long'",
                other.type_alias()
            )));
        }
    };
    let n = usize::try_from(n)
        .map_err(|_| DbError::bad_value(format!("BSON field 'limit' value must be >= 0, actual value '{n}'")))?;
    Ok((n > 0).then_some(n))
}

impl<G: StorageGateway> Handler<G> {
    /// Executes `{find: <collection>, filter?, limit?, $db}` as a full scan,
    /// returning every match in one batch.
    ///
    /// # Errors
    /// Validation, unimplemented-option, storage and cancellation errors.
    pub async fn msg_find(&self, cmd: &Document) -> Result<Document, DbError> {
        unimplemented(cmd, &["sort", "projection", "skip", "collation", "let"])?;
        ignored(cmd, &["batchSize", "singleBatch", "comment", "readConcern", "noCursorTimeout"]);

        let db: &str = get_required_param(cmd, "$db")?;
        let ns = Namespace::new(db, collection_name(cmd)?);
        let filter_doc: Option<&Document> = get_optional_param(cmd, "filter")?;
        let filter = match filter_doc {
            Some(f) => parse_filter(f)?,
            None => parse_filter(&Document::new())?,
        };
        let limit = limit(cmd)?;

        if self.guard(self.gateway().ensure_collection(&ns)).await? {
            log::info!("Created collection. namespace={ns}");
        }
        let fetched = self.guard(self.gateway().fetch_all(&ns)).await?;
        let batch: Array = fetched
            .into_iter()
            .filter(|doc| eval_filter(doc, &filter))
            .take(limit.unwrap_or(usize::MAX))
            .map(Value::Document)
            .collect();

        let mut cursor = Document::new();
        cursor.set("firstBatch", batch);
        cursor.set("id", Value::Int64(0));
        cursor.set("ns", ns.to_string());
        let mut reply = Document::new();
        reply.set("cursor", cursor);
        reply.set("ok", 1.0);
        Ok(reply)
    }
}
