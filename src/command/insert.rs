use super::params::{get_optional_param, get_required_param, ignored};
use super::{Handler, collection_name};
use crate::document::{Array, Document, ObjectId, Value};
use crate::errors::DbError;
use crate::storage::{Namespace, StorageGateway};

impl<G: StorageGateway> Handler<G> {
    /// Executes `{insert: <collection>, documents: [...], $db}`.
    ///
    /// Documents without `_id` get a fresh ObjectId as their first field.
    ///
    /// # Errors
    /// Validation, storage (including duplicate `_id`) and cancellation errors.
    pub async fn msg_insert(&self, cmd: &Document) -> Result<Document, DbError> {
        ignored(cmd, &["ordered", "writeConcern", "bypassDocumentValidation", "comment"]);

        let db: &str = get_required_param(cmd, "$db")?;
        let ns = Namespace::new(db, collection_name(cmd)?);
        let documents: Option<&Array> = get_optional_param(cmd, "documents")?;

        if self.guard(self.gateway().ensure_collection(&ns)).await? {
            log::info!("Created collection. namespace={ns}");
        }

        let mut inserted = 0_i32;
        for (i, value) in documents.into_iter().flatten().enumerate() {
            let Value::Document(doc) = value else {
                return Err(DbError::bad_value(format!(
                    "BSON field 'insert.documents.{i}' is the wrong type '{}', expected type 'object'",
                    value.type_alias()
                )));
            };
            let mut doc = doc.clone();
            if !doc.has("_id") {
                doc.set_first("_id", ObjectId::new());
            }
            self.guard(self.gateway().insert(&ns, &doc)).await?;
            inserted += 1;
        }

        let mut reply = Document::new();
        reply.set("n", inserted);
        reply.set("ok", 1.0);
        Ok(reply)
    }
}
