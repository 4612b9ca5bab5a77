use super::params::{get_optional_param, get_required_param, ignored, unimplemented};
use super::{Handler, collection_name};
use crate::document::{Array, Document, ObjectId, Value};
use crate::errors::DbError;
use crate::query::{apply_update, apply_upsert, eval_filter, parse_filter, parse_update};
use crate::storage::{Namespace, StorageGateway};
use std::time::Instant;

const STATEMENT_UNIMPLEMENTED: &[&str] = &["c", "multi", "collation", "arrayFilters", "hint"];

/// Running totals for one `update` command.
#[derive(Debug, Default)]
struct Outcome {
    matched: i32,
    modified: i32,
    upserted: Array,
}

impl Outcome {
    fn into_reply(self) -> Document {
        let mut reply = Document::new();
        reply.set("n", self.matched);
        reply.set("nModified", self.modified);
        if !self.upserted.is_empty() {
            reply.set("upserted", self.upserted);
        }
        reply.set("ok", 1.0);
        reply
    }
}

fn count(n: impl TryInto<i32>) -> Result<i32, DbError> {
    n.try_into().map_err(|_| DbError::bad_value("count does not fit in a 32-bit integer"))
}

impl<G: StorageGateway> Handler<G> {
    /// Executes `{update: <collection>, updates: [...], $db}`.
    ///
    /// Statements run in order; the first failure aborts the command without
    /// undoing statements already persisted.
    ///
    /// # Errors
    /// Validation, unimplemented-option, storage and cancellation errors.
    pub async fn msg_update(&self, cmd: &Document) -> Result<Document, DbError> {
        let started = Instant::now();
        unimplemented(cmd, &["let"])?;
        ignored(cmd, &["ordered", "writeConcern", "bypassDocumentValidation", "comment"]);

        let db: &str = get_required_param(cmd, "$db")?;
        let ns = Namespace::new(db, collection_name(cmd)?);
        let statements: Option<&Array> = get_optional_param(cmd, "updates")?;

        if self.guard(self.gateway().ensure_collection(&ns)).await? {
            log::info!("Created collection. namespace={ns}");
        }

        let mut outcome = Outcome::default();
        for (i, statement) in statements.into_iter().flatten().enumerate() {
            let Value::Document(statement) = statement else {
                return Err(DbError::bad_value(format!(
                    "BSON field 'update.updates.{i}' is the wrong type '{}', expected type 'object'",
                    statement.type_alias()
                )));
            };
            self.update_statement(&ns, statement, &mut outcome).await?;
        }

        crate::dev6!(
            "{}",
            serde_json::json!({
                "op": "update",
                "ns": ns.to_string(),
                "n": outcome.matched,
                "nModified": outcome.modified,
                "upserted": outcome.upserted.len(),
                "micros": u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
            })
        );
        Ok(outcome.into_reply())
    }

    async fn update_statement(
        &self,
        ns: &Namespace,
        statement: &Document,
        outcome: &mut Outcome,
    ) -> Result<(), DbError> {
        unimplemented(statement, STATEMENT_UNIMPLEMENTED)?;

        let q: Option<&Document> = get_optional_param(statement, "q")?;
        let u: Option<&Document> = get_optional_param(statement, "u")?;
        let upsert = get_optional_param::<bool>(statement, "upsert")?.unwrap_or(false);

        let empty = Document::new();
        let q = q.unwrap_or(&empty);
        let filter = parse_filter(q)?;
        let update = u.map(parse_update).transpose()?;

        let fetched = self.guard(self.gateway().fetch_all(ns)).await?;
        let matches: Vec<Document> = fetched.into_iter().filter(|doc| eval_filter(doc, &filter)).collect();

        if matches.is_empty() {
            if !upsert {
                return Ok(());
            }
            // the raw filter seeds the new document
            let mut doc = q.clone();
            if let Some(update) = &update {
                apply_upsert(&mut doc, update)?;
            }
            if !doc.has("_id") {
                doc.set("_id", ObjectId::new());
            }
            let id = doc.get("_id").cloned().unwrap_or(Value::Null);
            self.guard(self.gateway().insert(ns, &doc)).await?;
            let entry: Document = vec![("index", Value::Int32(0)), ("_id", id)].into_iter().collect();
            outcome.upserted.append(entry);
            outcome.matched += 1;
            return Ok(());
        }

        outcome.matched += count(matches.len())?;
        let Some(update) = update else {
            return Ok(());
        };
        for mut doc in matches {
            if !apply_update(&mut doc, &update)? {
                continue;
            }
            let affected = self.guard(self.gateway().update_by_id(ns, &doc)).await?;
            outcome.modified += count(affected)?;
        }
        Ok(())
    }
}
