mod common;

use bson::{Bson, doc};
use common::{COLL, DB, seeded, stored, to_doc};
use nexuswire::document::Document;
use nexuswire::errors::{DbError, ErrorCode};
use nexuswire::storage::{MemoryGateway, Namespace, StorageGateway};
use nexuswire::{ErrorKind, Handler};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn insert_generates_leading_ids() {
    let h = seeded(vec![]).await;
    let cmd = to_doc(doc! {"insert": COLL, "documents": [{"a": 1}, {"_id": "k", "a": 2}], "$db": DB});
    let reply = h.execute(&cmd).await.unwrap();
    assert_eq!(bson::Document::from(reply), doc! {"n": 2, "ok": 1.0});

    let all = stored(&h).await;
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].keys().next().map(String::as_str), Some("_id"));
    assert!(all[0].get_object_id("_id").is_ok());
    assert_eq!(all[1], doc! {"_id": "k", "a": 2});
}

#[tokio::test]
async fn duplicate_id_is_a_storage_error() {
    let h = seeded(vec![doc! {"_id": 1}]).await;
    let cmd = to_doc(doc! {"insert": COLL, "documents": [{"_id": 1}], "$db": DB});
    let err = h.execute(&cmd).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(err.code(), ErrorCode::InternalError);
}

#[tokio::test]
async fn find_filters_and_limits() {
    let h = seeded(vec![doc! {"_id": 1, "a": 1}, doc! {"_id": 2, "a": 2}, doc! {"_id": 3, "a": 3}]).await;
    let cmd = to_doc(doc! {"find": COLL, "filter": {"a": {"$gte": 2}}, "$db": DB});
    let reply = bson::Document::from(h.execute(&cmd).await.unwrap());
    let cursor = reply.get_document("cursor").unwrap();
    assert_eq!(cursor.get_i64("id").unwrap(), 0);
    assert_eq!(cursor.get_str("ns").unwrap(), format!("{DB}.{COLL}"));
    assert_eq!(
        cursor.get_array("firstBatch").unwrap(),
        &vec![Bson::Document(doc! {"_id": 2, "a": 2}), Bson::Document(doc! {"_id": 3, "a": 3})]
    );

    let cmd = to_doc(doc! {"find": COLL, "limit": 1, "$db": DB});
    let reply = bson::Document::from(h.execute(&cmd).await.unwrap());
    let batch = reply.get_document("cursor").unwrap().get_array("firstBatch").unwrap();
    assert_eq!(batch.len(), 1);
}

#[tokio::test]
async fn find_rejects_unsupported_options() {
    let h = seeded(vec![]).await;
    let cmd = to_doc(doc! {"find": COLL, "sort": {"a": 1}, "$db": DB});
    let err = h.execute(&cmd).await.unwrap_err();
    assert_eq!(err.to_string(), "sort: support for field \"sort\" is not implemented yet");
    assert_eq!(h.gateway().fetches(), 0);
}

#[tokio::test]
async fn unknown_and_empty_commands() {
    let h = seeded(vec![]).await;
    let err = h.execute(&to_doc(doc! {"drop": COLL, "$db": DB})).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::CommandNotFound);
    let err = h.execute(&Document::new()).await.unwrap_err();
    assert_eq!(err.to_string(), "no such command: ''");
}

#[tokio::test]
async fn error_replies_carry_code_and_name() {
    let h = seeded(vec![]).await;
    let reply = h
        .handle(&to_doc(doc! {"update": COLL, "updates": [{"q": {}, "u": {}}], "$db": DB}))
        .await;
    let reply = bson::Document::from(reply);
    assert_eq!(reply.get_f64("ok").unwrap(), 0.0);
    assert_eq!(reply.get_i32("code").unwrap(), 9);
    assert_eq!(reply.get_str("codeName").unwrap(), "FailedToParse");
}

#[tokio::test]
async fn max_time_ms_is_validated() {
    let h = seeded(vec![]).await;
    for bad in [Bson::Int32(-1), Bson::Double(1.5), Bson::String("10".into())] {
        let cmd = to_doc(doc! {"find": COLL, "maxTimeMS": bad, "$db": DB});
        assert_eq!(h.execute(&cmd).await.unwrap_err().code(), ErrorCode::BadValue);
    }
    let cmd = to_doc(doc! {"find": COLL, "maxTimeMS": 0, "$db": DB});
    assert!(h.execute(&cmd).await.is_ok());
}

/// Gateway whose scans take longer than any test deadline.
#[derive(Debug, Default)]
struct SlowGateway {
    inner: MemoryGateway,
}

impl StorageGateway for SlowGateway {
    fn ensure_collection(&self, ns: &Namespace) -> impl Future<Output = Result<bool, DbError>> + Send {
        self.inner.ensure_collection(ns)
    }

    fn fetch_all(&self, ns: &Namespace) -> impl Future<Output = Result<Vec<Document>, DbError>> + Send {
        let scan = self.inner.fetch_all(ns);
        async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            scan.await
        }
    }

    fn insert(&self, ns: &Namespace, doc: &Document) -> impl Future<Output = Result<(), DbError>> + Send {
        self.inner.insert(ns, doc)
    }

    fn update_by_id(&self, ns: &Namespace, doc: &Document) -> impl Future<Output = Result<u64, DbError>> + Send {
        self.inner.update_by_id(ns, doc)
    }
}

#[tokio::test]
async fn max_time_ms_interrupts_slow_storage() {
    let h = Handler::new(Arc::new(SlowGateway::default()));
    let cmd = to_doc(doc! {"find": COLL, "maxTimeMS": 20, "$db": DB});
    let err = h.execute(&cmd).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(err.code(), ErrorCode::MaxTimeMSExpired);
}

#[tokio::test]
async fn build_info_reports_versions() {
    let h = seeded(vec![]).await;
    let reply = bson::Document::from(h.execute(&to_doc(doc! {"buildInfo": 1, "$db": "admin"})).await.unwrap());
    assert_eq!(reply.get_f64("ok").unwrap(), 1.0);
    assert!(reply.get_str("version").is_ok());
}
